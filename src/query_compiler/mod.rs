//! Query compilation
//!
//! Turns selection and output requests over a variant table into SQL:
//!
//! 1. [`field_resolver`]: qualify every field token of the user expressions
//! 2. [`join_builder`]: one `LEFT OUTER JOIN` per distinct link edge
//! 3. [`dedup_rewriter`]: collapse annotation matches to one row per variant
//! 4. [`sample_filter`]: turn a phenotype predicate into a variant id filter

pub mod dedup_rewriter;
pub mod errors;
pub mod expression;
pub mod field_resolver;
pub mod join_builder;
pub mod sample_filter;

#[cfg(test)]
pub(crate) mod tests;

use std::fmt;

use crate::catalog::Catalog;

pub use dedup_rewriter::{compile_output, no_annotation_involved, Multiplicity, OutputSpec};
pub use errors::{QueryError, ResolutionError};
pub use field_resolver::{FieldResolver, Resolution, ResolveOptions, ResolvedField};
pub use join_builder::{build_joins, JoinPlan};
pub use sample_filter::{
    SampleFilter, SampleFilterSettings, SampleSet, SampleSetResolver, SampleStrategy,
    SAMPLE_VARIANTS_TABLE,
};

pub trait ToSql {
    fn to_sql(&self) -> String;
}

/// An assembled SELECT statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub select: String,
    pub distinct: bool,
    /// Everything after `FROM` up to `WHERE`: table, joins, or a derived table.
    pub from: String,
    /// Terms joined with `AND`, each parenthesized.
    pub filters: Vec<String>,
    pub group_by: Option<String>,
    pub order_by: Option<String>,
    /// `None` means unlimited.
    pub limit: Option<u64>,
}

impl CompiledQuery {
    pub fn new(select: impl Into<String>, from: impl Into<String>) -> Self {
        CompiledQuery {
            select: select.into(),
            distinct: false,
            from: from.into(),
            filters: Vec::new(),
            group_by: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn filter(mut self, term: impl Into<String>) -> Self {
        self.filters.push(term.into());
        self
    }

    pub fn where_clause(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }
        Some(
            self.filters
                .iter()
                .map(|f| format!("({})", f))
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }
}

impl ToSql for CompiledQuery {
    fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select);
        sql.push_str(" FROM ");
        sql.push_str(&self.from);
        if let Some(where_clause) = self.where_clause() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if let Some(group_by) = &self.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT 0,{}", limit));
        }
        sql
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Compile selection conditions over `primary` into a query returning the
/// ids of matching variants (`SELECT primary.variant_id FROM ... WHERE ...`).
///
/// The result may list a variant several times when conditions involve
/// annotation sources; callers add `DISTINCT` or use it as an `IN` subquery.
pub fn compile_selection<S: AsRef<str>>(
    catalog: &dyn Catalog,
    primary: &str,
    conditions: &[S],
    alt_build: bool,
) -> Result<CompiledQuery, QueryError> {
    let resolution = FieldResolver::new(catalog, primary)
        .with_options(ResolveOptions {
            allow_aggregates: false,
            alt_build,
        })
        .resolve(conditions)?;
    let plan = build_joins(primary, &resolution.fields);
    let mut query = CompiledQuery::new(format!("{}.variant_id", primary), plan.from_clause());
    query.filters = resolution.exprs.iter().map(|e| e.render()).collect();
    Ok(query)
}
