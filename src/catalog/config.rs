/// Project description management.
///
/// A project is described in YAML:
///
/// ```yaml
/// name: demo                  # project name
/// database: demo.proj         # SQLite file holding variant and sample tables
/// build: hg19                 # primary reference genome
/// alt_build: hg38             # optional alternative build (alt_chr / alt_pos)
/// genotype:                   # optional per-sample genotype store
///   schema: demo_genotype     # schema name the store is attached under
///   file: demo_genotype.db    # attached on demand before the first genotype scan
/// annotations:
///   - name: dbNSFP            # assigned name, used to qualify fields
///     file: dbNSFP.db         # attached under the assigned name
///     table: dbNSFP           # table inside the source (defaults to `source` or `name`)
///     build: hg19
///     link: { type: variant, columns: [chr, pos, ref, alt] }
///   - name: refGene
///     link: { type: range, columns: [chr, txStart, txEnd] }
///   - name: e1                # second use of a source bound with `as`
///     source: refGene
///     link: { type: field, columns: [name], fields: [refGene.name2] }
/// ```
///
/// Relative paths are resolved against the directory of the YAML file.
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::CatalogError;

fn default_sample_table() -> String {
    "sample".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    /// Project database file. Optional so a caller can hand in an already open engine.
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub build: Option<String>,

    #[serde(default)]
    pub alt_build: Option<String>,

    #[serde(default)]
    pub genotype: Option<GenotypeStoreConfig>,

    #[serde(default = "default_sample_table")]
    pub sample_table: String,

    #[serde(default)]
    pub annotations: Vec<AnnotationSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenotypeStoreConfig {
    /// Schema holding `genotype_<sample_id>` tables. `None` means the main schema.
    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotationSourceConfig {
    /// Assigned name (the `as` binding). Qualifies fields and aliases the joined table.
    pub name: String,

    /// Name of the underlying source when `name` is an alias of it.
    #[serde(default)]
    pub source: Option<String>,

    /// Table inside the source. Defaults to `source`, then `name`.
    #[serde(default)]
    pub table: Option<String>,

    /// Database file attached under `name`.
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub build: Option<String>,

    pub link: LinkSpec,

    /// Fields exposed by the source. Discovered from the table when empty.
    #[serde(default)]
    pub fields: Vec<String>,
}

/// How rows of an annotation source relate to variants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkSpec {
    /// Exact match of `chr, pos` or `chr, pos, ref, alt` against the master variant table.
    Variant { columns: Vec<String> },
    /// `chr, start, end`: the variant lies on `chr` within `[start, end]`.
    Range { columns: Vec<String> },
    /// Equality of the source's `columns` with other `fields`, pairwise.
    Field {
        columns: Vec<String>,
        fields: Vec<String>,
    },
}

impl LinkSpec {
    pub fn columns(&self) -> &[String] {
        match self {
            LinkSpec::Variant { columns }
            | LinkSpec::Range { columns }
            | LinkSpec::Field { columns, .. } => columns,
        }
    }
}

impl AnnotationSourceConfig {
    /// Table name inside the source database.
    pub fn table_name(&self) -> &str {
        self.table
            .as_deref()
            .or(self.source.as_deref())
            .unwrap_or(&self.name)
    }

    /// Fully qualified physical table reference.
    pub fn physical_table(&self) -> String {
        match self.file {
            Some(_) => format!("{}.{}", self.name, self.table_name()),
            None => self.table_name().to_string(),
        }
    }
}

impl ProjectConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let config: ProjectConfig =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::ConfigParseError {
                error: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: format!("{}: {}", path.display(), e),
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make relative file references relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(db) = self.database.as_mut() {
            join(db);
        }
        if let Some(file) = self.genotype.as_mut().and_then(|g| g.file.as_mut()) {
            join(file);
        }
        for source in &mut self.annotations {
            if let Some(file) = source.file.as_mut() {
                join(file);
            }
        }
    }

    /// Structural validation: unique source names and well-formed link specs.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidConfig {
                message: "project name cannot be empty".to_string(),
            });
        }
        let mut names = HashSet::new();
        for source in &self.annotations {
            if !names.insert(source.name.to_lowercase()) {
                return Err(CatalogError::source_config_error(
                    &source.name,
                    "defined more than once",
                ));
            }
            if source.name.eq_ignore_ascii_case("variant") {
                return Err(CatalogError::source_config_error(
                    &source.name,
                    "name is reserved for the master variant table",
                ));
            }
            match &source.link {
                LinkSpec::Variant { columns } if columns.len() != 2 && columns.len() != 4 => {
                    return Err(CatalogError::source_config_error(
                        &source.name,
                        "variant link needs chr, pos or chr, pos, ref, alt columns",
                    ));
                }
                LinkSpec::Range { columns } if columns.len() != 3 => {
                    return Err(CatalogError::source_config_error(
                        &source.name,
                        "range link needs chr, start, end columns",
                    ));
                }
                LinkSpec::Field { columns, fields }
                    if columns.is_empty() || columns.len() != fields.len() =>
                {
                    return Err(CatalogError::source_config_error(
                        &source.name,
                        "field link needs one field per linked column",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
