use std::collections::{BTreeSet, HashSet};

use super::config::{GenotypeStoreConfig, LinkSpec, ProjectConfig};
use super::errors::CatalogError;
use super::{
    Catalog, FieldLookup, FieldOwner, JoinClause, OwnerKind, QualifiedField, MASTER_VARIANT_TABLE,
};
use crate::engine::{Engine, Value, TABLE_INFO_TABLE};

#[derive(Debug, Clone)]
struct VariantTableInfo {
    name: String,
    columns: Vec<String>,
}

impl VariantTableInfo {
    fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct AnnotationSource {
    name: String,
    physical: String,
    build: Option<String>,
    link: LinkSpec,
    fields: Vec<String>,
}

impl AnnotationSource {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Table reference used after `JOIN`.
    fn join_table(&self) -> String {
        if self.physical == self.name {
            self.name.clone()
        } else {
            format!("{} AS {}", self.physical, self.name)
        }
    }
}

/// Catalog of one project: variant tables discovered from the store,
/// annotation sources declared in the project description.
#[derive(Debug, Clone)]
pub struct ProjectCatalog {
    alt_build: Option<String>,
    sample_table: String,
    genotype: Option<GenotypeStoreConfig>,
    variant_tables: Vec<VariantTableInfo>,
    sources: Vec<AnnotationSource>,
}

impl ProjectCatalog {
    /// Attach declared annotation databases, discover their fields and the
    /// project's variant tables.
    pub fn open(config: &ProjectConfig, engine: &mut dyn Engine) -> Result<Self, CatalogError> {
        config.validate()?;
        let mut sources = Vec::with_capacity(config.annotations.len());
        for source in &config.annotations {
            if let Some(file) = &source.file {
                if !engine.is_attached(&source.name)? {
                    engine.attach(file, &source.name)?;
                }
            }
            let physical = source.physical_table();
            let fields = if source.fields.is_empty() {
                engine.column_names(&physical).map_err(|e| {
                    CatalogError::source_config_error(
                        &source.name,
                        format!("cannot read columns of {}: {}", physical, e),
                    )
                })?
            } else {
                source.fields.clone()
            };
            log::debug!(
                "Annotation source {} ({}) provides {} fields",
                source.name,
                physical,
                fields.len()
            );
            sources.push(AnnotationSource {
                name: source.name.clone(),
                physical,
                build: source.build.clone(),
                link: source.link.clone(),
                fields,
            });
        }

        let mut catalog = ProjectCatalog {
            alt_build: config.alt_build.clone(),
            sample_table: config.sample_table.clone(),
            genotype: config.genotype.clone(),
            variant_tables: Vec::new(),
            sources,
        };
        catalog.refresh(engine)?;
        if !catalog.is_variant_table(MASTER_VARIANT_TABLE) {
            return Err(CatalogError::MissingMasterTable);
        }
        Ok(catalog)
    }

    /// Names of all known variant tables.
    pub fn variant_tables(&self) -> Vec<&str> {
        self.variant_tables.iter().map(|t| t.name.as_str()).collect()
    }

    fn variant_table(&self, name: &str) -> Option<&VariantTableInfo> {
        self.variant_tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn source(&self, name: &str) -> Option<&AnnotationSource> {
        self.sources.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn is_genotype_table(&self, name: &str) -> bool {
        let in_main_schema = self
            .genotype
            .as_ref()
            .map_or(true, |g| g.schema.is_none());
        in_main_schema
            && name
                .strip_prefix("genotype_")
                .is_some_and(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
    }

    /// Variant-side chr/pos columns for a source, honoring the alternative build.
    fn coordinate_columns(&self, source: &AnnotationSource) -> (&'static str, &'static str) {
        match (&self.alt_build, &source.build) {
            (Some(alt), Some(build)) if alt.eq_ignore_ascii_case(build) => ("alt_chr", "alt_pos"),
            _ => ("chr", "pos"),
        }
    }

    fn link_path_inner(
        &self,
        owner_table: &str,
        primary: &str,
        visiting: &mut Vec<String>,
    ) -> Result<Vec<JoinClause>, CatalogError> {
        if owner_table.eq_ignore_ascii_case(primary) {
            return Ok(Vec::new());
        }
        if let Some(table) = self.variant_table(owner_table) {
            return Ok(vec![JoinClause::new(
                table.name.clone(),
                format!("{}.variant_id = {}.variant_id", table.name, primary),
            )]);
        }
        let source = self
            .source(owner_table)
            .ok_or_else(|| CatalogError::UnknownTable(owner_table.to_string()))?;
        let key = source.name.to_lowercase();
        if visiting.contains(&key) {
            return Err(CatalogError::CyclicLink(source.name.clone()));
        }
        visiting.push(key);

        let mut path: Vec<JoinClause> = Vec::new();
        let s = &source.name;
        let condition = match &source.link {
            LinkSpec::Variant { columns } => {
                path.extend(self.link_path_inner(MASTER_VARIANT_TABLE, primary, visiting)?);
                let (chr, pos) = self.coordinate_columns(source);
                let mut terms = vec![
                    format!("{}.{} = {}.{}", s, columns[0], MASTER_VARIANT_TABLE, chr),
                    format!("{}.{} = {}.{}", s, columns[1], MASTER_VARIANT_TABLE, pos),
                ];
                if columns.len() == 4 {
                    terms.push(format!("{}.{} = {}.ref", s, columns[2], MASTER_VARIANT_TABLE));
                    terms.push(format!("{}.{} = {}.alt", s, columns[3], MASTER_VARIANT_TABLE));
                }
                terms.join(" AND ")
            }
            LinkSpec::Range { columns } => {
                path.extend(self.link_path_inner(MASTER_VARIANT_TABLE, primary, visiting)?);
                let (chr, pos) = self.coordinate_columns(source);
                format!(
                    "{s}.{c} = {v}.{chr} AND {v}.{pos} >= {s}.{start} AND {v}.{pos} <= {s}.{end}",
                    s = s,
                    v = MASTER_VARIANT_TABLE,
                    c = columns[0],
                    start = columns[1],
                    end = columns[2],
                    chr = chr,
                    pos = pos,
                )
            }
            LinkSpec::Field { columns, fields } => {
                let mut terms = Vec::with_capacity(columns.len());
                for (column, target) in columns.iter().zip(fields) {
                    let owner = match self.lookup_field(target, primary) {
                        FieldLookup::Found(owner) => owner,
                        FieldLookup::Ambiguous { candidates } => {
                            return Err(CatalogError::source_config_error(
                                s,
                                format!(
                                    "link field `{}` is ambiguous ({})",
                                    target,
                                    candidates.join(", ")
                                ),
                            ))
                        }
                        FieldLookup::Undefined | FieldLookup::UnknownTable(_) => {
                            return Err(CatalogError::UnlinkableSource {
                                source_name: s.clone(),
                                reason: format!("link field `{}` is not defined", target),
                            })
                        }
                    };
                    if owner.field.table.eq_ignore_ascii_case(s) {
                        return Err(CatalogError::CyclicLink(s.clone()));
                    }
                    for edge in self.link_path_inner(&owner.field.table, primary, visiting)? {
                        if !path.iter().any(|e| e.key() == edge.key()) {
                            path.push(edge);
                        }
                    }
                    terms.push(format!("{}.{} = {}", s, column, owner.field));
                }
                terms.join(" AND ")
            }
        };
        visiting.pop();
        path.push(JoinClause::new(source.join_table(), condition));
        Ok(path)
    }
}

impl Catalog for ProjectCatalog {
    fn lookup_field(&self, token: &str, primary: &str) -> FieldLookup {
        if let Some((qualifier, column)) = token.split_once('.') {
            if let Some(table) = self.variant_table(qualifier) {
                return match table.column(column) {
                    Some(col) => FieldLookup::Found(FieldOwner {
                        field: QualifiedField::new(table.name.clone(), col),
                        kind: OwnerKind::VariantTable,
                    }),
                    None => FieldLookup::Undefined,
                };
            }
            if let Some(source) = self.source(qualifier) {
                return match source.field(column) {
                    Some(col) => FieldLookup::Found(FieldOwner {
                        field: QualifiedField::new(source.name.clone(), col),
                        kind: OwnerKind::Annotation,
                    }),
                    None => FieldLookup::Undefined,
                };
            }
            return FieldLookup::UnknownTable(qualifier.to_string());
        }

        for table_name in [primary, MASTER_VARIANT_TABLE] {
            if let Some(table) = self.variant_table(table_name) {
                if let Some(col) = table.column(token) {
                    return FieldLookup::Found(FieldOwner {
                        field: QualifiedField::new(table.name.clone(), col),
                        kind: OwnerKind::VariantTable,
                    });
                }
            }
        }

        let mut matches: Vec<QualifiedField> = self
            .sources
            .iter()
            .filter_map(|s| s.field(token).map(|col| QualifiedField::new(s.name.clone(), col)))
            .collect();
        match matches.len() {
            0 => FieldLookup::Undefined,
            1 => FieldLookup::Found(FieldOwner {
                field: matches.remove(0),
                kind: OwnerKind::Annotation,
            }),
            _ => FieldLookup::Ambiguous {
                candidates: matches.iter().map(|f| f.to_string()).collect(),
            },
        }
    }

    fn link_path(&self, owner_table: &str, primary: &str) -> Result<Vec<JoinClause>, CatalogError> {
        let mut visiting = Vec::new();
        self.link_path_inner(owner_table, primary, &mut visiting)
    }

    fn is_variant_table(&self, name: &str) -> bool {
        self.variant_table(name).is_some()
    }

    fn alt_build(&self) -> Option<&str> {
        self.alt_build.as_deref()
    }

    fn sample_ids_matching(
        &self,
        engine: &mut dyn Engine,
        predicate: &str,
    ) -> Result<BTreeSet<i64>, CatalogError> {
        let sample = &self.sample_table;
        let mut sql = format!("SELECT {0}.sample_id FROM {0}", sample);
        let links_filename = engine.has_table("filename")?
            && engine
                .column_names(sample)?
                .iter()
                .any(|c| c.eq_ignore_ascii_case("file_id"));
        if links_filename {
            sql.push_str(&format!(
                " LEFT OUTER JOIN filename ON {}.file_id = filename.file_id",
                sample
            ));
        }
        if !predicate.trim().is_empty() {
            sql.push_str(&format!(" WHERE {}", predicate));
        }
        sql.push(';');
        log::debug!("Selecting samples: {}", sql);

        let mut ids = BTreeSet::new();
        engine
            .for_each_row(&sql, &mut |row| {
                if let Some(id) = row.first().and_then(Value::as_i64) {
                    ids.insert(id);
                }
                Ok(())
            })
            .map_err(|source| CatalogError::SampleQuery {
                predicate: predicate.to_string(),
                source,
            })?;
        Ok(ids)
    }

    fn prepare_genotype_store(&self, engine: &mut dyn Engine) -> Result<(), CatalogError> {
        if let Some(GenotypeStoreConfig {
            schema: Some(schema),
            file: Some(file),
        }) = &self.genotype
        {
            if !engine.is_attached(schema)? {
                engine.attach(file, schema)?;
            }
        }
        Ok(())
    }

    fn genotype_table_name(&self, sample_id: i64) -> String {
        match self.genotype.as_ref().and_then(|g| g.schema.as_deref()) {
            Some(schema) => format!("{}.genotype_{}", schema, sample_id),
            None => format!("genotype_{}", sample_id),
        }
    }

    fn refresh(&mut self, engine: &mut dyn Engine) -> Result<(), CatalogError> {
        let mut excluded: HashSet<String> = [
            self.sample_table.to_lowercase(),
            "filename".to_string(),
            TABLE_INFO_TABLE.to_string(),
        ]
        .into_iter()
        .collect();
        excluded.extend(self.sources.iter().map(|s| s.physical.to_lowercase()));

        let mut tables = Vec::new();
        for name in engine.table_names()? {
            if excluded.contains(&name.to_lowercase()) || self.is_genotype_table(&name) {
                continue;
            }
            let columns = engine.column_names(&name)?;
            if columns.iter().any(|c| c.eq_ignore_ascii_case("variant_id")) {
                tables.push(VariantTableInfo { name, columns });
            }
        }
        log::debug!(
            "Discovered variant tables: {:?}",
            tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );
        self.variant_tables = tables;
        Ok(())
    }
}
