//! Output of query results
//!
//! Rows are streamed from the result cursor to a writer; NULL values are
//! replaced by a placeholder. An optional header comes first, either derived
//! from the requested fields, given explicitly, or read verbatim from an input
//! stream.

mod printer;

use std::io::{self, BufRead, Read, Write};

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::CompilerConfig;
use crate::engine::Value;

pub use printer::{Delimiter, PrettyPrinter};

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"\W+").unwrap();
}

/// Header written before the records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HeaderMode {
    #[default]
    None,
    /// Names derived from the output fields.
    Derived,
    Explicit(Vec<String>),
    /// A literal header block read from the header input.
    FromInput,
}

impl HeaderMode {
    /// Interpret a `--header [NAME ...]` argument: absent, empty, `-`, or names.
    pub fn from_args(header: Option<Vec<String>>) -> Self {
        match header {
            None => HeaderMode::None,
            Some(names) if names.is_empty() => HeaderMode::Derived,
            Some(names) if names.len() == 1 && names[0] == "-" => HeaderMode::FromInput,
            Some(names) => HeaderMode::Explicit(names),
        }
    }
}

/// Column name derived from an output expression: `count(1)` -> `count_1`.
pub fn valid_field_name(expr: &str) -> String {
    let name = NON_WORD.replace_all(expr.trim(), "_");
    let name = name.trim_matches('_');
    match name.chars().next() {
        None => "_".to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{}", name),
        Some(_) => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub header: HeaderMode,
    pub delimiter: Delimiter,
    pub na: String,
    pub pretty_cache_rows: usize,
}

impl FormatOptions {
    pub fn from_config(config: &CompilerConfig) -> Self {
        FormatOptions {
            header: HeaderMode::None,
            delimiter: Delimiter::FixedWidth,
            na: config.na.clone(),
            pretty_cache_rows: config.pretty_cache_rows,
        }
    }
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions::from_config(&CompilerConfig::default())
    }
}

pub struct OutputFormatter<W: Write> {
    printer: PrettyPrinter<W>,
    header: HeaderMode,
    na: String,
    records: u64,
}

impl<W: Write> OutputFormatter<W> {
    pub fn new(out: W, options: FormatOptions) -> Self {
        OutputFormatter {
            printer: PrettyPrinter::new(out, options.delimiter, options.pretty_cache_rows),
            header: options.header,
            na: options.na,
            records: 0,
        }
    }

    /// Write the header for `fields`, reading it from `input` in [`HeaderMode::FromInput`].
    pub fn write_header<S: AsRef<str>>(
        &mut self,
        fields: &[S],
        input: &mut dyn BufRead,
    ) -> io::Result<()> {
        match &self.header {
            HeaderMode::None => Ok(()),
            HeaderMode::Derived => self.printer.write(
                fields
                    .iter()
                    .map(|f| valid_field_name(f.as_ref()))
                    .collect(),
            ),
            HeaderMode::Explicit(names) => {
                if names.len() != fields.len() {
                    log::warn!(
                        "User-provided header ({}) does not match number of fields ({})",
                        names.len(),
                        fields.len()
                    );
                }
                let names = names.clone();
                self.printer.write(names)
            }
            HeaderMode::FromInput => {
                let mut block = String::new();
                input.read_to_string(&mut block)?;
                self.printer.write_raw(block.trim_end())
            }
        }
    }

    pub fn write_record(&mut self, row: &[Value]) -> io::Result<()> {
        let values = row
            .iter()
            .map(|v| {
                if v.is_null() {
                    self.na.clone()
                } else {
                    v.to_string()
                }
            })
            .collect();
        self.records += 1;
        self.printer.write(values)
    }

    /// Flush buffered rows. Returns the number of records written.
    pub fn finish(mut self) -> io::Result<u64> {
        self.printer.write_rest()?;
        Ok(self.records)
    }
}
