//! Join graph building
//!
//! Collects the join edges of every resolved field into one ordered list.
//! An edge is admitted the first time its `(table, condition)` pair is seen
//! (case-insensitively), so a source used by several fields is joined once,
//! while two aliased uses of one source (different conditions) both stay.

use std::collections::HashSet;

use super::field_resolver::ResolvedField;
use super::ToSql;
use crate::catalog::JoinClause;

/// `FROM <primary> LEFT OUTER JOIN ...` of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    pub primary: String,
    pub joins: Vec<JoinClause>,
}

impl JoinPlan {
    pub fn new(primary: impl Into<String>) -> Self {
        JoinPlan {
            primary: primary.into(),
            joins: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Rendered clause without the `FROM` keyword.
    pub fn from_clause(&self) -> String {
        let mut sql = self.primary.clone();
        for join in &self.joins {
            sql.push_str(&format!(" LEFT OUTER JOIN {} ON {}", join.table, join.condition));
        }
        sql
    }
}

impl ToSql for JoinPlan {
    fn to_sql(&self) -> String {
        format!("FROM {}", self.from_clause())
    }
}

/// Build the deduplicated join list for `fields`, preserving discovery order.
pub fn build_joins<'a, I>(primary: &str, fields: I) -> JoinPlan
where
    I: IntoIterator<Item = &'a ResolvedField>,
{
    let mut plan = JoinPlan::new(primary);
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for field in fields {
        for edge in &field.joins {
            if seen.insert(edge.key()) {
                plan.joins.push(edge.clone());
            }
        }
    }
    log::debug!(
        "Join plan for {}: {} join(s)",
        primary,
        plan.joins.len()
    );
    plan
}
