//! Expression scanning
//!
//! User expressions are free-form engine expressions (`pos - 1`,
//! `sift_score > 0.9 OR gene IS NULL`, `count(1)`). We do not parse them; we
//! only split them into pieces so that identifiers naming fields can be
//! replaced, and keep everything else byte-for-byte.

use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::catalog::QualifiedField;

lazy_static! {
    static ref SQL_KEYWORDS: HashSet<&'static str> = [
        "ABORT", "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CAST", "COLLATE", "CROSS",
        "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DESC", "DISTINCT", "ELSE", "END",
        "ESCAPE", "EXISTS", "FALSE", "FROM", "GLOB", "IN", "INT", "INTEGER", "IS", "ISNULL",
        "LIKE", "LIMIT", "MATCH", "NOCASE", "NOT", "NOTNULL", "NULL", "NUMERIC", "OR", "REAL",
        "REGEXP", "RTRIM", "SELECT", "TEXT", "THEN", "TRUE", "UNION", "WHEN", "WHERE", "FLOAT",
        "BLOB", "VARCHAR",
    ]
    .into_iter()
    .collect();
    static ref AGGREGATE_FUNCTIONS: HashSet<&'static str> =
        ["AVG", "COUNT", "GROUP_CONCAT", "MAX", "MIN", "SUM", "TOTAL"]
            .into_iter()
            .collect();
}

pub fn is_sql_keyword(word: &str) -> bool {
    SQL_KEYWORDS.contains(word.to_ascii_uppercase().as_str())
}

pub fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(name.to_ascii_uppercase().as_str())
}

/// One piece of a scanned expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Copied verbatim (operators, literals, keywords, whitespace).
    Text(String),
    /// Identifier directly followed by `(`.
    Function(String),
    /// Candidate field token, possibly qualified (`table.column`).
    Identifier(String),
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn push_text(pieces: &mut Vec<Piece>, text: &mut String) {
    if !text.is_empty() {
        pieces.push(Piece::Text(std::mem::take(text)));
    }
}

/// Split an expression into text, function names and field candidates.
pub fn scan(expr: &str) -> Vec<Piece> {
    let chars: Vec<char> = expr.chars().collect();
    let len = chars.len();
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c == '\'' || c == '"' {
            // String literal, doubled quote is an escaped quote.
            text.push(c);
            i += 1;
            while i < len {
                text.push(chars[i]);
                if chars[i] == c {
                    if i + 1 < len && chars[i + 1] == c {
                        text.push(c);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
        } else if c.is_ascii_digit() || (c == '.' && i + 1 < len && chars[i + 1].is_ascii_digit()) {
            // Numeric literal (1, 0.5, 1e-5)
            while i < len
                && (chars[i].is_ascii_alphanumeric()
                    || chars[i] == '.'
                    || ((chars[i] == '-' || chars[i] == '+')
                        && matches!(chars[i - 1], 'e' | 'E')))
            {
                text.push(chars[i]);
                i += 1;
            }
        } else if is_ident_start(c) {
            let start = i;
            while i < len && is_ident_char(chars[i]) {
                i += 1;
            }
            if i + 1 < len && chars[i] == '.' && is_ident_start(chars[i + 1]) {
                i += 1;
                while i < len && is_ident_char(chars[i]) {
                    i += 1;
                }
            }
            let word: String = chars[start..i].iter().collect();

            let mut j = i;
            while j < len && chars[j].is_whitespace() {
                j += 1;
            }
            if j < len && chars[j] == '(' {
                push_text(&mut pieces, &mut text);
                pieces.push(Piece::Function(word));
            } else if !word.contains('.') && is_sql_keyword(&word) {
                text.push_str(&word);
            } else {
                push_text(&mut pieces, &mut text);
                pieces.push(Piece::Identifier(word));
            }
        } else {
            text.push(c);
            i += 1;
        }
    }
    push_text(&mut pieces, &mut text);
    pieces
}

/// A resolved piece: literal text or a qualified field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Field(QualifiedField),
}

/// An expression whose field tokens have been replaced by qualified references.
///
/// Rendering goes through [`ResolvedExpr::render_with`], so rewriting a field
/// into an alias never touches text that merely looks like the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExpr {
    /// The expression as the user wrote it.
    pub source: String,
    segments: Vec<Segment>,
}

impl ResolvedExpr {
    pub fn new(source: impl Into<String>, segments: Vec<Segment>) -> Self {
        let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
        for segment in segments {
            if let Segment::Text(next) = &segment {
                if let Some(Segment::Text(prev)) = merged.last_mut() {
                    prev.push_str(next);
                    continue;
                }
            }
            merged.push(segment);
        }
        ResolvedExpr {
            source: source.into(),
            segments: merged,
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn fields(&self) -> impl Iterator<Item = &QualifiedField> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(f) => Some(f),
            Segment::Text(_) => None,
        })
    }

    /// Render with fully qualified `table.column` references.
    pub fn render(&self) -> String {
        self.render_with(|f| f.to_string())
    }

    /// Render with every field reference replaced by `rename(field)`.
    pub fn render_with<F>(&self, rename: F) -> String
    where
        F: Fn(&QualifiedField) -> String,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Field(f) => out.push_str(&rename(f)),
            }
        }
        out
    }
}
