//! Field catalog
//!
//! Maps field tokens to the table that owns them, and owners to the join path
//! that links them to a variant table. The query compiler only sees the
//! [`Catalog`] trait; [`ProjectCatalog`] implements it for a project described
//! in YAML (see [`config`]).

pub mod config;
pub mod errors;
mod project;

use std::collections::BTreeSet;
use std::fmt;

use crate::engine::Engine;

pub use config::{AnnotationSourceConfig, GenotypeStoreConfig, LinkSpec, ProjectConfig};
pub use errors::CatalogError;
pub use project::ProjectCatalog;

/// Name of the master variant table.
pub const MASTER_VARIANT_TABLE: &str = "variant";

/// A fully qualified `table.column` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedField {
    pub table: String,
    pub column: String,
}

impl QualifiedField {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        QualifiedField {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Single-identifier form used as an inner-query alias (`table_column`).
    pub fn flattened(&self) -> String {
        format!("{}_{}", self.table, self.column)
    }

    /// Case-insensitive identity of the reference.
    pub fn key(&self) -> (String, String) {
        (self.table.to_lowercase(), self.column.to_lowercase())
    }

    pub fn same_as(&self, other: &QualifiedField) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Display for QualifiedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// One `LEFT OUTER JOIN <table> ON <condition>` edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    /// Table reference as it appears after `JOIN` (may carry an `AS` alias).
    pub table: String,
    pub condition: String,
}

impl JoinClause {
    pub fn new(table: impl Into<String>, condition: impl Into<String>) -> Self {
        JoinClause {
            table: table.into(),
            condition: condition.into(),
        }
    }

    /// Case-insensitive dedup key.
    pub fn key(&self) -> (String, String) {
        (self.table.to_lowercase(), self.condition.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    /// A variant table; joined 1:1 on `variant_id`.
    VariantTable,
    /// An annotation source; may match zero, one or many rows per variant.
    Annotation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOwner {
    pub field: QualifiedField,
    pub kind: OwnerKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLookup {
    Found(FieldOwner),
    /// Defined by several sources; the caller must qualify the token.
    Ambiguous { candidates: Vec<String> },
    Undefined,
    /// Qualified token whose qualifier names no variant table or source.
    UnknownTable(String),
}

/// What the query compiler needs to know about a project.
pub trait Catalog {
    /// Resolve a field token (`col` or `table.col`) relative to `primary`.
    fn lookup_field(&self, token: &str, primary: &str) -> FieldLookup;

    /// Join edges linking `owner_table` to `primary`, in the order they must be joined.
    /// Empty when `owner_table` is `primary` itself.
    fn link_path(&self, owner_table: &str, primary: &str) -> Result<Vec<JoinClause>, CatalogError>;

    fn is_variant_table(&self, name: &str) -> bool;

    /// Alternative reference genome build, if the project defines one.
    fn alt_build(&self) -> Option<&str>;

    /// Ids of samples satisfying a phenotype predicate.
    fn sample_ids_matching(
        &self,
        engine: &mut dyn Engine,
        predicate: &str,
    ) -> Result<BTreeSet<i64>, CatalogError>;

    /// Make per-sample genotype tables reachable (attach their store if needed).
    fn prepare_genotype_store(&self, engine: &mut dyn Engine) -> Result<(), CatalogError>;

    /// Table holding the variant ids called in one sample.
    fn genotype_table_name(&self, sample_id: i64) -> String;

    /// Rediscover variant tables, e.g. after a table was materialized or renamed.
    fn refresh(&mut self, engine: &mut dyn Engine) -> Result<(), CatalogError>;
}
