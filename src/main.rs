use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use variant_query::config::CliOverrides;
use variant_query::context::QueryContext;
use variant_query::executor::{Destination, OutputOptions, SelectRequest, VariantQuery};
use variant_query::output::HeaderMode;

/// vtq - select, exclude and output variants of an annotation project
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project description (YAML)
    #[arg(long, short = 'p', default_value = "vtq.yaml")]
    project: PathBuf,

    /// Compiler configuration (YAML); read from VTQ_* environment variables when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of selected samples below which genotype tables are queried inline
    #[arg(long)]
    inline_threshold: Option<usize>,

    /// Genotype tables scanned per statement when building the sample variant table
    #[arg(long)]
    batch_size: Option<usize>,

    /// Do not show progress bars
    #[arg(long)]
    no_progress: bool,

    /// More verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select variants matching all conditions
    Select(SelectArgs),
    /// Select variants that do not match the conditions
    Exclude(SelectArgs),
    /// Output fields of all variants in a table
    Output(OutputArgs),
}

#[derive(Args)]
struct SelectArgs {
    /// Variant table to select from
    from_table: String,

    /// Conditions over variant and annotation fields, joined with AND
    conditions: Vec<String>,

    /// Conditions on sample phenotypes; variants must be called in a matching sample
    #[arg(short, long, num_args = 1..)]
    samples: Vec<String>,

    /// Destination table and an optional description
    #[arg(short, long = "to_table", alias = "to-table", num_args = 1..)]
    to_table: Vec<String>,

    /// Print the number of matched variants
    #[arg(short, long)]
    count: bool,

    /// Output these fields of matched variants
    #[arg(short, long, num_args = 1..)]
    output: Vec<String>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Args)]
struct OutputArgs {
    /// Variant table to output
    table: String,

    /// Fields or expressions to output
    #[arg(required = true)]
    fields: Vec<String>,

    #[command(flatten)]
    format: FormatArgs,
}

#[derive(Args)]
struct FormatArgs {
    /// Header: no value derives names from fields, `-` copies a header block from stdin
    #[arg(long, num_args = 0..)]
    header: Option<Vec<String>>,

    /// Field delimiter; columns are aligned when absent
    #[arg(short, long)]
    delimiter: Option<String>,

    /// Placeholder for missing values
    #[arg(long)]
    na: Option<String>,

    /// Output at most this many records; negative means no limit
    #[arg(short, long, allow_hyphen_values = true)]
    limit: Option<i64>,

    /// Group output by these fields
    #[arg(short, long = "group_by", alias = "group-by", num_args = 1..)]
    group_by: Vec<String>,

    /// Order output by these fields, optionally followed by DESC
    #[arg(long = "order_by", alias = "order-by", num_args = 1..)]
    order_by: Vec<String>,

    /// Output every matching annotation record instead of one record per variant
    #[arg(short, long = "all")]
    all_matches: bool,

    /// Reference genome build of output coordinates
    #[arg(long)]
    build: Option<String>,
}

impl From<FormatArgs> for OutputOptions {
    fn from(args: FormatArgs) -> Self {
        OutputOptions {
            header: HeaderMode::from_args(args.header),
            delimiter: args.delimiter,
            na: args.na,
            limit: args.limit,
            group_by: args.group_by,
            order_by: args.order_by,
            all_matches: args.all_matches,
            build: args.build,
        }
    }
}

impl SelectArgs {
    fn into_request(self) -> anyhow::Result<SelectRequest> {
        Ok(SelectRequest {
            from_table: self.from_table,
            conditions: self.conditions,
            samples: self.samples,
            to_table: Destination::from_args(&self.to_table)?,
            count: self.count,
            output: self.output,
            options: self.format.into(),
        })
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = CliOverrides {
        inline_threshold: cli.inline_threshold,
        batch_size: cli.batch_size,
        na: None,
        no_progress: cli.no_progress,
    };
    let context = QueryContext::load(&cli.project, cli.config.as_deref(), overrides)
        .with_context(|| format!("Failed to load project {}", cli.project.display()))?;
    let (mut engine, mut catalog) = context.open()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    {
        let mut query = VariantQuery::new(&mut engine, &mut catalog, &context.config, &mut out)
            .with_header_input(Box::new(io::stdin().lock()));
        match cli.command {
            Command::Select(args) => {
                query.select(&args.into_request()?)?;
            }
            Command::Exclude(args) => {
                query.exclude(&args.into_request()?)?;
            }
            Command::Output(args) => {
                let options = OutputOptions::from(args.format);
                let records = query.output(&args.table, args.fields.as_slice(), &options)?;
                log::debug!("{} records written", records);
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}
