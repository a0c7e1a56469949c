//! Request execution
//!
//! [`VariantQuery`] runs `select`, `exclude` and `output` requests against one
//! engine and catalog: it compiles the request, picks an [`ExecutionMode`],
//! runs the statements and streams results to the output writer.
//!
//! `exclude` is `select` with the matched set reversed, so for any table `T`
//! and conditions `P`, `exclude(T, P)` and `select(T, P)` partition `T`.

mod mode;


use std::io::{self, BufRead, Write};

use crate::catalog::Catalog;
use crate::config::CompilerConfig;
use crate::engine::{Engine, EngineError};
use crate::output::{Delimiter, FormatOptions, OutputFormatter};
use crate::query_compiler::{
    compile_output, compile_selection, CompiledQuery, FieldResolver, Multiplicity, OutputSpec,
    QueryError, ResolveOptions, SampleFilter, SampleFilterSettings, SampleSetResolver, ToSql,
};
use crate::utils::table_name::{decode_backup_name, decode_table_name, encode_table_name};

pub use mode::{Destination, ExecutionMode, OutputOptions, SelectRequest};

/// Outcome of a select/exclude request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectReport {
    /// Mode that ran; `None` when the request asked for nothing.
    pub mode: Option<ExecutionMode>,
    /// Number of matched variants, when counted or materialized.
    pub count: Option<u64>,
    /// Name the previous destination table was renamed to.
    pub backup: Option<String>,
    /// Records written by an output step.
    pub records: Option<u64>,
}

pub struct VariantQuery<'a> {
    engine: &'a mut dyn Engine,
    catalog: &'a mut dyn Catalog,
    config: &'a CompilerConfig,
    out: &'a mut dyn Write,
    header_input: Box<dyn BufRead + 'a>,
}

impl<'a> VariantQuery<'a> {
    pub fn new(
        engine: &'a mut dyn Engine,
        catalog: &'a mut dyn Catalog,
        config: &'a CompilerConfig,
        out: &'a mut dyn Write,
    ) -> Self {
        VariantQuery {
            engine,
            catalog,
            config,
            out,
            header_input: Box::new(io::empty()),
        }
    }

    /// Source of the literal header block printed for `--header -`.
    pub fn with_header_input(mut self, input: Box<dyn BufRead + 'a>) -> Self {
        self.header_input = input;
        self
    }

    pub fn select(&mut self, request: &SelectRequest) -> Result<SelectReport, QueryError> {
        self.run(request, false)
    }

    pub fn exclude(&mut self, request: &SelectRequest) -> Result<SelectReport, QueryError> {
        self.run(request, true)
    }

    /// Output `fields` of every variant in `table`. Returns the number of records written.
    pub fn output<S: AsRef<str>>(
        &mut self,
        table: &str,
        fields: &[S],
        options: &OutputOptions,
    ) -> Result<u64, QueryError> {
        self.output_variants(table, fields, options, None, false)
    }

    fn run(&mut self, request: &SelectRequest, reverse: bool) -> Result<SelectReport, QueryError> {
        let mode = ExecutionMode::from_request(request)?;
        let table = encode_table_name(&request.from_table);
        if !self.catalog.is_variant_table(&table) {
            return Err(QueryError::missing_table(&request.from_table));
        }
        let Some(mode) = mode else {
            log::warn!("Neither --to_table and --output/--count is specified. Nothing to do.");
            return Ok(SelectReport::default());
        };

        let alt_build = self.uses_alt_build(&request.options);
        let mut selection =
            compile_selection(&*self.catalog, &table, request.conditions.as_slice(), alt_build)?;

        let sample_filter = if request.samples.is_empty() {
            None
        } else {
            let filter = self.sample_filter(&request.samples, &table)?;
            selection.filters.push(filter.predicate().to_string());
            Some(filter)
        };

        let result = self.execute_mode(&mode, request, &table, selection, reverse);

        if let Some(filter) = sample_filter {
            if let Err(e) = filter.release(&mut *self.engine) {
                if result.is_ok() {
                    return Err(e.into());
                }
                log::warn!("Failed to release sample filter: {}", e);
            }
        }
        let mut report = result?;
        report.mode = Some(mode);
        Ok(report)
    }

    fn sample_filter(
        &mut self,
        samples: &[String],
        table: &str,
    ) -> Result<SampleFilter, QueryError> {
        let predicate = samples
            .iter()
            .map(|s| format!("({})", s))
            .collect::<Vec<_>>()
            .join(" AND ");
        let resolver =
            SampleSetResolver::new(&*self.catalog, SampleFilterSettings::from(self.config));
        let set = resolver.resolve_samples(&mut *self.engine, &predicate)?;
        resolver.compile_sample_filter(&mut *self.engine, &set, table)
    }

    fn execute_mode(
        &mut self,
        mode: &ExecutionMode,
        request: &SelectRequest,
        table: &str,
        selection: CompiledQuery,
        reverse: bool,
    ) -> Result<SelectReport, QueryError> {
        match mode {
            ExecutionMode::Count => {
                let count = self.count_matched(table, selection, reverse)?;
                writeln!(self.out, "{}", count)?;
                Ok(SelectReport {
                    count: Some(count),
                    ..Default::default()
                })
            }
            ExecutionMode::Materialize {
                destination,
                count,
                output,
            } => {
                let mut report = self.materialize(destination, table, selection, reverse)?;
                if !output.is_empty() {
                    report.records = Some(self.output_variants(
                        &destination.name,
                        output.as_slice(),
                        &request.options,
                        None,
                        false,
                    )?);
                }
                if *count {
                    writeln!(self.out, "{}", report.count.unwrap_or(0))?;
                }
                Ok(report)
            }
            ExecutionMode::Stream { fields } => {
                let matched = selection.distinct().to_sql();
                let records = self.output_variants(
                    &request.from_table,
                    fields.as_slice(),
                    &request.options,
                    Some(matched),
                    reverse,
                )?;
                Ok(SelectReport {
                    records: Some(records),
                    ..Default::default()
                })
            }
        }
    }

    fn count_matched(
        &mut self,
        table: &str,
        selection: CompiledQuery,
        reverse: bool,
    ) -> Result<u64, QueryError> {
        let sql = selection
            .with_select(format!("COUNT(DISTINCT {}.variant_id)", table))
            .to_sql();
        log::debug!("Running query {}", sql);
        let matched = self
            .engine
            .query_scalar(&sql)
            .map_err(|e| QueryError::execution(&sql, e))?
            .as_i64()
            .unwrap_or(0)
            .max(0) as u64;
        if !reverse {
            return Ok(matched);
        }
        let total = self.engine.num_of_rows(table)?;
        Ok(total.saturating_sub(matched))
    }

    fn materialize(
        &mut self,
        destination: &Destination,
        table: &str,
        selection: CompiledQuery,
        reverse: bool,
    ) -> Result<SelectReport, QueryError> {
        let dest = encode_table_name(&destination.name);
        // Writing over the source table: build aside, then swap in.
        let in_place = dest.eq_ignore_ascii_case(table);
        let target = if in_place {
            format!("_{}_staging", dest)
        } else {
            dest.clone()
        };

        let mut backup = None;
        if !in_place && self.engine.has_table(&dest)? {
            backup = Some(self.backup(&dest)?);
        }
        if self.engine.has_table(&target)? {
            self.engine.execute(&format!("DROP TABLE {};", target))?;
        }
        self.engine.execute(&format!(
            "CREATE TABLE {} (variant_id INT NOT NULL PRIMARY KEY);",
            target
        ))?;

        let sql = if reverse {
            format!(
                "INSERT INTO {dest} SELECT DISTINCT {t}.variant_id FROM {t} WHERE {t}.variant_id NOT IN ({matched});",
                dest = target,
                t = table,
                matched = selection.to_sql()
            )
        } else {
            format!("INSERT INTO {} {};", target, selection.distinct().to_sql())
        };
        log::debug!("Running query {}", sql);
        if let Err(e) = self.engine.execute(&sql) {
            if in_place {
                if let Err(drop_err) = self
                    .engine
                    .execute(&format!("DROP TABLE IF EXISTS {};", target))
                {
                    log::warn!("Failed to drop {}: {}", target, drop_err);
                }
            }
            return Err(QueryError::execution(&sql, e));
        }

        if in_place {
            backup = Some(self.backup(&dest)?);
            self.engine
                .execute(&format!("ALTER TABLE {} RENAME TO {};", target, dest))?;
        }
        self.engine.describe_table(&dest, &destination.description)?;
        self.engine.commit()?;
        self.catalog.refresh(&mut *self.engine)?;

        let count = self.engine.num_of_rows(&dest)?;
        log::info!("{} variants selected.", count);
        Ok(SelectReport {
            count: Some(count),
            backup,
            ..Default::default()
        })
    }

    fn backup(&mut self, table: &str) -> Result<String, QueryError> {
        let renamed = self.engine.backup_table(table)?;
        log::warn!(
            "Existing table {} is renamed to {}.",
            decode_table_name(table),
            decode_backup_name(table, &renamed)
        );
        Ok(renamed)
    }

    fn uses_alt_build(&self, options: &OutputOptions) -> bool {
        match (&options.build, self.catalog.alt_build()) {
            (Some(build), Some(alt)) => build.eq_ignore_ascii_case(alt),
            _ => false,
        }
    }

    fn output_variants<S: AsRef<str>>(
        &mut self,
        table_name: &str,
        fields: &[S],
        options: &OutputOptions,
        matched: Option<String>,
        reverse: bool,
    ) -> Result<u64, QueryError> {
        let table = encode_table_name(table_name);
        if !self.catalog.is_variant_table(&table) {
            return Err(QueryError::missing_table(table_name));
        }
        let alt_build = self.uses_alt_build(options);
        let resolve = |exprs: &[String], alt_build: bool| {
            FieldResolver::new(&*self.catalog, &table)
                .with_options(ResolveOptions {
                    allow_aggregates: true,
                    alt_build,
                })
                .resolve(exprs)
        };
        let field_list: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        let spec = OutputSpec {
            primary: table.clone(),
            fields: resolve(&field_list, alt_build)?,
            group_by: resolve(&options.group_by[..], false)?,
            order_by: resolve(&options.order_by[..], false)?,
            filters: matched
                .map(|sql| {
                    format!(
                        "{}.variant_id {}IN ({})",
                        table,
                        if reverse { "NOT " } else { "" },
                        sql
                    )
                })
                .into_iter()
                .collect(),
            limit: options.limit(),
            multiplicity: if options.all_matches {
                Multiplicity::AllMatches
            } else {
                Multiplicity::OnePerVariant
            },
        };
        let sql = compile_output(&spec).to_sql();
        log::debug!("Running query {}", sql);

        let format = FormatOptions {
            header: options.header.clone(),
            delimiter: Delimiter::parse(options.delimiter.as_deref()),
            na: options.na.clone().unwrap_or_else(|| self.config.na.clone()),
            pretty_cache_rows: self.config.pretty_cache_rows,
        };
        let mut formatter = OutputFormatter::new(&mut *self.out, format);
        formatter.write_header(&field_list, &mut *self.header_input)?;
        let visited = self.engine.for_each_row(&sql, &mut |row| {
            formatter.write_record(row)?;
            Ok(())
        });
        match visited {
            Ok(_) => {}
            Err(EngineError::Sink(e)) => return Err(QueryError::Output(e)),
            Err(e) => return Err(QueryError::execution(&sql, e)),
        }
        Ok(formatter.finish()?)
    }
}
