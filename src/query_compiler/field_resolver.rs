//! Field resolution
//!
//! Turns user expressions into [`ResolvedExpr`]s whose field tokens are fully
//! qualified, and records for every distinct field the join path that links
//! its owning table to the primary variant table.
//!
//! Resolution rules for a token:
//! 1. `table.column` - the named variant table or annotation source
//! 2. `column` - the primary variant table, then the master `variant` table,
//!    then the single annotation source defining it
//! 3. defined by several sources - [`ResolutionError::Ambiguous`]

use std::collections::HashSet;

use super::errors::{QueryError, ResolutionError};
use super::expression::{is_aggregate_function, scan, Piece, ResolvedExpr, Segment};
use crate::catalog::{Catalog, FieldLookup, FieldOwner, JoinClause, OwnerKind, QualifiedField};

/// A distinct field referenced by a set of expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub field: QualifiedField,
    pub kind: OwnerKind,
    /// Join edges linking the owner to the primary table (empty for the primary itself).
    pub joins: Vec<JoinClause>,
}

impl ResolvedField {
    /// Whether joining this field can never duplicate a variant row.
    pub fn is_one_to_one(&self) -> bool {
        self.kind == OwnerKind::VariantTable
    }
}

/// Result of resolving a list of expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub exprs: Vec<ResolvedExpr>,
    /// Distinct fields in discovery order.
    pub fields: Vec<ResolvedField>,
}

impl Resolution {
    /// Comma separated, fully qualified rendering (a select list).
    pub fn select_clause(&self) -> String {
        self.exprs
            .iter()
            .map(ResolvedExpr::render)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Allow aggregate calls such as `count(1)` or `sum(num)`.
    pub allow_aggregates: bool,
    /// Resolve variant `chr`/`pos` to `alt_chr`/`alt_pos` where available.
    pub alt_build: bool,
}

pub struct FieldResolver<'a> {
    catalog: &'a dyn Catalog,
    primary: &'a str,
    options: ResolveOptions,
}

impl<'a> FieldResolver<'a> {
    pub fn new(catalog: &'a dyn Catalog, primary: &'a str) -> Self {
        FieldResolver {
            catalog,
            primary,
            options: ResolveOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve every expression and collect the distinct fields they reference.
    pub fn resolve<S: AsRef<str>>(&self, exprs: &[S]) -> Result<Resolution, QueryError> {
        let mut resolution = Resolution::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for expr in exprs {
            let (resolved, owners) = self.resolve_expr(expr.as_ref())?;
            for owner in owners {
                if !seen.insert(owner.field.key()) {
                    continue;
                }
                let joins = self.catalog.link_path(&owner.field.table, self.primary)?;
                resolution.fields.push(ResolvedField {
                    field: owner.field,
                    kind: owner.kind,
                    joins,
                });
            }
            resolution.exprs.push(resolved);
        }
        log::debug!(
            "Resolved [{}] against {} -> {}",
            exprs.iter().map(|e| e.as_ref()).collect::<Vec<_>>().join(", "),
            self.primary,
            resolution.select_clause()
        );
        Ok(resolution)
    }

    /// Resolve one expression. Returns the owners of its fields in order of appearance.
    pub fn resolve_expr(&self, expr: &str) -> Result<(ResolvedExpr, Vec<FieldOwner>), QueryError> {
        let mut segments = Vec::new();
        let mut owners = Vec::new();
        for piece in scan(expr) {
            match piece {
                Piece::Text(text) => segments.push(Segment::Text(text)),
                Piece::Function(name) => {
                    if !self.options.allow_aggregates && is_aggregate_function(&name) {
                        return Err(ResolutionError::AggregateNotAllowed {
                            expression: expr.to_string(),
                        }
                        .into());
                    }
                    segments.push(Segment::Text(name));
                }
                Piece::Identifier(token) => {
                    let owner = self.lookup(&token)?;
                    segments.push(Segment::Field(owner.field.clone()));
                    owners.push(owner);
                }
            }
        }
        Ok((ResolvedExpr::new(expr, segments), owners))
    }

    fn lookup(&self, token: &str) -> Result<FieldOwner, QueryError> {
        match self.catalog.lookup_field(token, self.primary) {
            FieldLookup::Found(owner) => Ok(self.apply_build(owner)),
            FieldLookup::Ambiguous { candidates } => Err(ResolutionError::Ambiguous {
                field: token.to_string(),
                candidates,
            }
            .into()),
            FieldLookup::Undefined => Err(ResolutionError::Undefined {
                field: token.to_string(),
            }
            .into()),
            FieldLookup::UnknownTable(table) => Err(QueryError::Definition(format!(
                "Table or annotation source {} does not exist.",
                table
            ))),
        }
    }

    fn apply_build(&self, owner: FieldOwner) -> FieldOwner {
        if !self.options.alt_build || owner.kind != OwnerKind::VariantTable {
            return owner;
        }
        let column = owner.field.column.to_lowercase();
        if column != "chr" && column != "pos" {
            return owner;
        }
        let alt = format!("{}.alt_{}", owner.field.table, column);
        match self.catalog.lookup_field(&alt, self.primary) {
            FieldLookup::Found(alt_owner) => alt_owner,
            _ => owner,
        }
    }
}
