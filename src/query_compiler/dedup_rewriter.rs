//! One-row-per-variant rewriting
//!
//! Left joining an annotation source that matches several rows for a variant
//! repeats the variant once per match. Unless all matches are requested, an
//! output query involving annotation fields is rewritten in two phases:
//!
//! ```sql
//! SELECT variant_chr, dbA_score
//! FROM (SELECT MIN(variant.variant_id) AS variant_variant_id,
//!              variant.chr AS variant_chr, dbA.score AS dbA_score
//!       FROM variant LEFT OUTER JOIN dbA ON ...
//!       WHERE ...
//!       GROUP BY variant.variant_id) AS tmp
//! ORDER BY ...
//! ```
//!
//! Which matching annotation row supplies the values of a variant with several
//! matches is unspecified: the engine picks one row per group. The choice is
//! stable for unchanged data but is neither the first nor the best match.

use std::collections::{HashMap, HashSet};

use super::field_resolver::{Resolution, ResolvedField};
use super::join_builder::build_joins;
use super::CompiledQuery;
use crate::catalog::QualifiedField;

/// Alias of the inner query; outer clauses refer to its columns.
pub const DEDUP_ALIAS: &str = "tmp";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Multiplicity {
    /// Exactly one output row per variant.
    #[default]
    OnePerVariant,
    /// One row per matching annotation row (at least one per variant).
    AllMatches,
}

/// A resolved output request against one variant table.
#[derive(Debug, Clone, Default)]
pub struct OutputSpec {
    pub primary: String,
    pub fields: Resolution,
    pub group_by: Resolution,
    pub order_by: Resolution,
    /// Rendered, already qualified WHERE terms (e.g. a membership subquery).
    pub filters: Vec<String>,
    pub limit: Option<u64>,
    pub multiplicity: Multiplicity,
}

impl OutputSpec {
    fn all_fields(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields
            .fields
            .iter()
            .chain(self.group_by.fields.iter())
            .chain(self.order_by.fields.iter())
    }
}

/// True when every field is owned by a variant table, so no join can repeat a variant.
pub fn no_annotation_involved<'a, I>(fields: I) -> bool
where
    I: IntoIterator<Item = &'a ResolvedField>,
{
    fields.into_iter().all(ResolvedField::is_one_to_one)
}

/// Compile an output request, rewriting it when annotation joins could repeat variants.
pub fn compile_output(spec: &OutputSpec) -> CompiledQuery {
    let plan = build_joins(&spec.primary, spec.all_fields());
    let mut query = CompiledQuery::new(spec.fields.select_clause(), plan.from_clause());
    query.filters = spec.filters.clone();
    query.limit = spec.limit;
    if !spec.group_by.exprs.is_empty() {
        query.group_by = Some(spec.group_by.select_clause());
    }
    if !spec.order_by.exprs.is_empty() {
        query.order_by = Some(spec.order_by.select_clause());
    }

    if spec.multiplicity == Multiplicity::AllMatches {
        log::debug!("All matches requested, output is not deduplicated");
        return query;
    }
    if no_annotation_involved(spec.all_fields()) {
        return query;
    }
    rewrite(spec, query)
}

fn rewrite(spec: &OutputSpec, plain: CompiledQuery) -> CompiledQuery {
    let primary_id = QualifiedField::new(spec.primary.clone(), "variant_id");
    let mut aliases = FlattenedAliases::new(&primary_id);

    let mut inner_select = vec![format!(
        "MIN({}) AS {}",
        primary_id,
        aliases.alias(&primary_id)
    )];
    for resolved in spec.all_fields() {
        if let Some(alias) = aliases.assign(&resolved.field) {
            inner_select.push(format!("{} AS {}", resolved.field, alias));
        }
    }

    let mut inner = CompiledQuery::new(inner_select.join(", "), plain.from);
    inner.filters = plain.filters;
    inner.group_by = Some(primary_id.to_string());

    let over_aliases = |resolution: &Resolution| {
        resolution
            .exprs
            .iter()
            .map(|e| e.render_with(|f| aliases.alias(f)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut outer = CompiledQuery::new(
        over_aliases(&spec.fields),
        format!("({}) AS {}", super::ToSql::to_sql(&inner), DEDUP_ALIAS),
    );
    if !spec.group_by.exprs.is_empty() {
        outer.group_by = Some(over_aliases(&spec.group_by));
    }
    if !spec.order_by.exprs.is_empty() {
        outer.order_by = Some(over_aliases(&spec.order_by));
    }
    outer.limit = plain.limit;
    outer
}

/// `table_column` aliases of the inner query, unique case-insensitively.
struct FlattenedAliases {
    by_key: HashMap<(String, String), String>,
    used: HashSet<String>,
}

impl FlattenedAliases {
    fn new(primary_id: &QualifiedField) -> Self {
        let mut aliases = FlattenedAliases {
            by_key: HashMap::new(),
            used: HashSet::new(),
        };
        aliases.assign(primary_id);
        aliases
    }

    /// Register `field`; returns its alias if it was not registered before.
    fn assign(&mut self, field: &QualifiedField) -> Option<String> {
        if self.by_key.contains_key(&field.key()) {
            return None;
        }
        let base = field.flattened();
        let mut alias = base.clone();
        let mut counter = 1;
        while !self.used.insert(alias.to_lowercase()) {
            alias = format!("{}_{}", base, counter);
            counter += 1;
        }
        self.by_key.insert(field.key(), alias.clone());
        Some(alias)
    }

    fn alias(&self, field: &QualifiedField) -> String {
        self.by_key
            .get(&field.key())
            .cloned()
            .unwrap_or_else(|| field.flattened())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{JoinClause, OwnerKind};
    use crate::query_compiler::expression::{ResolvedExpr, Segment};
    use crate::query_compiler::ToSql;

    fn resolution(items: &[(&str, &str, OwnerKind, &str)]) -> Resolution {
        let mut res = Resolution::default();
        for (table, column, kind, suffix) in items {
            let field = QualifiedField::new(*table, *column);
            let mut segments = vec![Segment::Field(field.clone())];
            if !suffix.is_empty() {
                segments.push(Segment::Text(suffix.to_string()));
            }
            res.exprs
                .push(ResolvedExpr::new(format!("{}{}", column, suffix), segments));
            let joins = match kind {
                OwnerKind::VariantTable => vec![],
                OwnerKind::Annotation => vec![JoinClause::new(
                    *table,
                    format!("{0}.chr = variant.chr AND {0}.pos = variant.pos", table),
                )],
            };
            if !res.fields.iter().any(|f| f.field.same_as(&field)) {
                res.fields.push(ResolvedField {
                    field,
                    kind: *kind,
                    joins,
                });
            }
        }
        res
    }

    #[test]
    fn test_variant_only_fields_are_not_rewritten() {
        let spec = OutputSpec {
            primary: "variant".into(),
            fields: resolution(&[
                ("variant", "chr", OwnerKind::VariantTable, ""),
                ("variant", "pos", OwnerKind::VariantTable, ""),
            ]),
            limit: Some(5),
            ..Default::default()
        };
        assert!(no_annotation_involved(spec.all_fields()));
        assert_eq!(
            compile_output(&spec).to_sql(),
            "SELECT variant.chr, variant.pos FROM variant LIMIT 0,5"
        );
    }

    #[test]
    fn test_annotation_fields_trigger_two_phase_query() {
        let spec = OutputSpec {
            primary: "variant".into(),
            fields: resolution(&[
                ("variant", "chr", OwnerKind::VariantTable, ""),
                ("dbA", "score", OwnerKind::Annotation, ""),
            ]),
            order_by: resolution(&[("dbA", "rank", OwnerKind::Annotation, " DESC")]),
            filters: vec!["variant.variant_id IN (SELECT variant_id FROM sel)".into()],
            ..Default::default()
        };
        let sql = compile_output(&spec).to_sql();
        assert_eq!(
            sql,
            "SELECT variant_chr, dbA_score FROM (SELECT MIN(variant.variant_id) AS variant_variant_id, \
             variant.chr AS variant_chr, dbA.score AS dbA_score, dbA.rank AS dbA_rank \
             FROM variant LEFT OUTER JOIN dbA ON dbA.chr = variant.chr AND dbA.pos = variant.pos \
             WHERE (variant.variant_id IN (SELECT variant_id FROM sel)) \
             GROUP BY variant.variant_id) AS tmp ORDER BY dbA_rank DESC"
        );
        assert_eq!(sql.matches("LEFT OUTER JOIN").count(), 1);
    }

    #[test]
    fn test_all_matches_skips_rewrite() {
        let spec = OutputSpec {
            primary: "variant".into(),
            fields: resolution(&[("dbA", "score", OwnerKind::Annotation, "")]),
            multiplicity: Multiplicity::AllMatches,
            ..Default::default()
        };
        assert_eq!(
            compile_output(&spec).to_sql(),
            "SELECT dbA.score FROM variant LEFT OUTER JOIN dbA ON dbA.chr = variant.chr AND dbA.pos = variant.pos"
        );
    }

    #[test]
    fn test_primary_variant_id_served_by_group_key() {
        let spec = OutputSpec {
            primary: "variant".into(),
            fields: resolution(&[
                ("variant", "variant_id", OwnerKind::VariantTable, ""),
                ("dbA", "score", OwnerKind::Annotation, ""),
            ]),
            ..Default::default()
        };
        let sql = compile_output(&spec).to_sql();
        assert!(sql.starts_with("SELECT variant_variant_id, dbA_score FROM (SELECT MIN(variant.variant_id) AS variant_variant_id, dbA.score AS dbA_score FROM"));
        assert_eq!(sql.matches("AS variant_variant_id").count(), 1);
    }

    #[test]
    fn test_colliding_flattened_aliases_get_suffix() {
        let mut aliases = FlattenedAliases::new(&QualifiedField::new("variant", "variant_id"));
        assert_eq!(
            aliases.assign(&QualifiedField::new("a_b", "c")),
            Some("a_b_c".to_string())
        );
        assert_eq!(
            aliases.assign(&QualifiedField::new("a", "b_c")),
            Some("a_b_c_1".to_string())
        );
        assert_eq!(aliases.assign(&QualifiedField::new("A", "B_C")), None);
        assert_eq!(aliases.alias(&QualifiedField::new("a", "b_c")), "a_b_c_1");
    }
}
