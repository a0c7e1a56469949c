use std::io::{self, Write};

/// How columns are separated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// Space-padded columns whose widths come from the first cached rows.
    #[default]
    FixedWidth,
    Text(String),
}

impl Delimiter {
    /// Parse a user-supplied delimiter. `\t` is accepted as an escape for tab.
    pub fn parse(delimiter: Option<&str>) -> Self {
        match delimiter {
            None => Delimiter::FixedWidth,
            Some(d) => Delimiter::Text(d.replace("\\t", "\t")),
        }
    }
}

/// Row writer.
///
/// With [`Delimiter::FixedWidth`], the first `cache_rows` rows are buffered to
/// compute column widths; later rows are written immediately and widen a
/// column when they do not fit. The last column is never padded.
pub struct PrettyPrinter<W: Write> {
    out: W,
    delimiter: Delimiter,
    cache_rows: usize,
    cache: Vec<Vec<String>>,
    widths: Vec<usize>,
    streaming: bool,
}

impl<W: Write> PrettyPrinter<W> {
    pub fn new(out: W, delimiter: Delimiter, cache_rows: usize) -> Self {
        PrettyPrinter {
            out,
            delimiter,
            cache_rows: cache_rows.max(1),
            cache: Vec::new(),
            widths: Vec::new(),
            streaming: false,
        }
    }

    pub fn write(&mut self, row: Vec<String>) -> io::Result<()> {
        match &self.delimiter {
            Delimiter::Text(d) => {
                let line = row.join(d);
                writeln!(self.out, "{}", line)
            }
            Delimiter::FixedWidth => {
                self.widen(&row);
                if self.streaming {
                    return self.write_padded(&row);
                }
                self.cache.push(row);
                if self.cache.len() >= self.cache_rows {
                    self.flush_cache()?;
                    self.streaming = true;
                }
                Ok(())
            }
        }
    }

    /// Write out cached rows. Must be called once all rows are written.
    pub fn write_rest(&mut self) -> io::Result<()> {
        self.flush_cache()?;
        self.out.flush()
    }

    /// Write a line verbatim, bypassing column alignment.
    pub fn write_raw(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{}", line)
    }

    fn widen(&mut self, row: &[String]) {
        if self.widths.len() < row.len() {
            self.widths.resize(row.len(), 0);
        }
        for (width, value) in self.widths.iter_mut().zip(row) {
            *width = (*width).max(value.chars().count());
        }
    }

    fn flush_cache(&mut self) -> io::Result<()> {
        let cache = std::mem::take(&mut self.cache);
        for row in &cache {
            self.write_padded(row)?;
        }
        Ok(())
    }

    fn write_padded(&mut self, row: &[String]) -> io::Result<()> {
        let last = row.len().saturating_sub(1);
        let mut line = String::new();
        for (idx, value) in row.iter().enumerate() {
            if idx > 0 {
                line.push(' ');
            }
            if idx == last {
                line.push_str(value);
            } else {
                line.push_str(&format!("{:<width$}", value, width = self.widths[idx]));
            }
        }
        writeln!(self.out, "{}", line)
    }
}
