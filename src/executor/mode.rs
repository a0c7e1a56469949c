use crate::output::HeaderMode;
use crate::query_compiler::QueryError;
use crate::catalog::MASTER_VARIANT_TABLE;

/// Table a selection is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub name: String,
    pub description: String,
}

impl Destination {
    pub fn new(name: impl Into<String>) -> Self {
        Destination {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Build from `--to_table NAME [DESCRIPTION]`.
    pub fn from_args(args: &[String]) -> Result<Option<Self>, QueryError> {
        match args {
            [] => Ok(None),
            [name] => Ok(Some(Destination::new(name.clone()))),
            [name, description] => Ok(Some(
                Destination::new(name.clone()).with_description(description.clone()),
            )),
            _ => Err(QueryError::Constraint(
                "Only a table name and an optional message is allowed for parameter to_table"
                    .to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.name.trim().is_empty() {
            return Err(QueryError::Constraint(
                "Destination table name cannot be empty.".to_string(),
            ));
        }
        if self.name.eq_ignore_ascii_case(MASTER_VARIANT_TABLE) {
            return Err(QueryError::Constraint(
                "Cannot overwrite the master variant table.".to_string(),
            ));
        }
        if self.name.contains('*') || self.name.contains('?') {
            log::warn!(
                "Use of wildcard character * or ? in table names is not recommended because \
                 such names can be expanded to include other tables in some commands."
            );
        }
        Ok(())
    }
}

/// Options shaping an output query and its formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub header: HeaderMode,
    /// `None` selects fixed-width columns.
    pub delimiter: Option<String>,
    /// Placeholder for NULL; `None` uses the configured one.
    pub na: Option<String>,
    /// Negative or absent means unlimited.
    pub limit: Option<i64>,
    pub group_by: Vec<String>,
    /// Expressions, optionally suffixed with `DESC`.
    pub order_by: Vec<String>,
    /// Output one row per matching annotation record instead of one per variant.
    pub all_matches: bool,
    /// Reference genome build of the output coordinates.
    pub build: Option<String>,
}

impl OutputOptions {
    pub fn limit(&self) -> Option<u64> {
        self.limit.filter(|l| *l >= 0).map(|l| l as u64)
    }
}

/// A `select` or `exclude` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectRequest {
    pub from_table: String,
    /// Conditions joined with `AND`.
    pub conditions: Vec<String>,
    /// Phenotype conditions joined with `AND`; variants must be called in a matching sample.
    pub samples: Vec<String>,
    pub to_table: Option<Destination>,
    pub count: bool,
    pub output: Vec<String>,
    pub options: OutputOptions,
}

impl SelectRequest {
    pub fn new(from_table: impl Into<String>) -> Self {
        SelectRequest {
            from_table: from_table.into(),
            ..Default::default()
        }
    }
}

/// What a select/exclude request does with the matched variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Print the number of matched variants.
    Count,
    /// Write matched variants to a table, then optionally output from it and count it.
    Materialize {
        destination: Destination,
        count: bool,
        output: Vec<String>,
    },
    /// Output fields of matched variants directly.
    Stream { fields: Vec<String> },
}

impl ExecutionMode {
    /// Pick the mode of a request. `None` means there is nothing to do.
    pub fn from_request(request: &SelectRequest) -> Result<Option<Self>, QueryError> {
        if let Some(destination) = &request.to_table {
            destination.validate()?;
            return Ok(Some(ExecutionMode::Materialize {
                destination: destination.clone(),
                count: request.count,
                output: request.output.clone(),
            }));
        }
        match (request.count, request.output.is_empty()) {
            (true, true) => Ok(Some(ExecutionMode::Count)),
            (true, false) => Err(QueryError::Constraint(
                "Options --count and --output cannot be used together without a destination table."
                    .to_string(),
            )),
            (false, false) => Ok(Some(ExecutionMode::Stream {
                fields: request.output.clone(),
            })),
            (false, true) => Ok(None),
        }
    }
}
