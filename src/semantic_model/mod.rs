pub mod index;
pub mod loader;
pub mod local_store;
pub mod store;

pub use index::MetadataIndex;
pub use loader::load;
pub use store::{SemanticModelStore, SemanticModelStoreError};

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A parsed semantic model. Immutable once loaded; a model switch replaces
/// it wholesale.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SemanticModel {
    pub name: String,
    pub description: String,
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    /// Free-form rules for the remote assistant, never interpreted here.
    pub custom_instructions: String,
}

impl SemanticModel {
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct BaseTable {
    pub database: String,
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub description: String,
    pub base_table: BaseTable,
    pub synonyms: Vec<String>,
    pub dimensions: Vec<Column>,
    pub time_dimensions: Vec<Column>,
    pub facts: Vec<Column>,
}

impl Table {
    /// All columns in declaration order, grouped by kind.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.dimensions
            .iter()
            .chain(self.time_dimensions.iter())
            .chain(self.facts.iter())
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    /// Business-friendly label: the description when present, else the name.
    pub fn label(&self) -> &str {
        label_or_name(&self.description, &self.name)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Dimension,
    TimeDimension,
    Fact,
}

impl ColumnKind {
    /// The YAML list a column of this kind is declared under.
    pub fn list_key(&self) -> &'static str {
        match self {
            ColumnKind::Dimension => "dimensions",
            ColumnKind::TimeDimension => "time_dimensions",
            ColumnKind::Fact => "facts",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Dimension => "dimension",
            ColumnKind::TimeDimension => "time_dimension",
            ColumnKind::Fact => "fact",
        };
        f.write_str(label)
    }
}

impl FromStr for ColumnKind {
    type Err = SemanticModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "dimension" | "dimensions" => Ok(ColumnKind::Dimension),
            "time_dimension" | "time_dimensions" => Ok(ColumnKind::TimeDimension),
            "fact" | "facts" => Ok(ColumnKind::Fact),
            other => Err(SemanticModelError::MalformedModel(format!(
                "unknown column kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub expr: String,
    pub kind: ColumnKind,
    pub data_type: String,
    pub description: String,
    pub synonyms: Vec<String>,
    /// Illustrative only.
    pub sample_values: Vec<String>,
    pub cortex_search_service: Option<String>,
}

impl Column {
    pub fn label(&self) -> &str {
        label_or_name(&self.description, &self.name)
    }

    /// The first `limit` sample values, as shown next to the column in a picker.
    pub fn sample_preview(&self, limit: usize) -> Vec<&str> {
        self.sample_values
            .iter()
            .take(limit)
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl FromStr for JoinType {
    type Err = SemanticModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" | "left_outer" => Ok(JoinType::Left),
            "right" | "right_outer" => Ok(JoinType::Right),
            "full" | "full_outer" => Ok(JoinType::Full),
            other => Err(SemanticModelError::MalformedModel(format!(
                "unknown join_type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl FromStr for Cardinality {
    type Err = SemanticModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one_to_one" => Ok(Cardinality::OneToOne),
            "one_to_many" => Ok(Cardinality::OneToMany),
            "many_to_one" => Ok(Cardinality::ManyToOne),
            "many_to_many" => Ok(Cardinality::ManyToMany),
            other => Err(SemanticModelError::MalformedModel(format!(
                "unknown relationship_type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ColumnPair {
    pub left_column: String,
    pub right_column: String,
}

/// Declarative join hint. Passed through to the remote SQL generator untouched.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub left_table: String,
    pub right_table: String,
    pub columns: Vec<ColumnPair>,
    pub join_type: JoinType,
    pub cardinality: Cardinality,
}

impl Relationship {
    pub fn involves(&self, table_name: &str) -> bool {
        self.left_table.eq_ignore_ascii_case(table_name)
            || self.right_table.eq_ignore_ascii_case(table_name)
    }
}

#[derive(Error, Debug)]
pub enum SemanticModelError {
    #[error("Malformed semantic model: {0}")]
    MalformedModel(String),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Cannot classify entry {position} under '{list}' of table '{table}': {detail}")]
    UnknownColumnKind {
        table: String,
        list: String,
        position: usize,
        detail: String,
    },
}

impl SemanticModelError {
    /// Unparseable YAML and structural problems are reported as one category.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            SemanticModelError::MalformedModel(_) | SemanticModelError::Yaml(_)
        )
    }
}

fn label_or_name<'a>(description: &'a str, name: &'a str) -> &'a str {
    let description = description.trim();
    if description.is_empty() {
        name
    } else {
        description
    }
}
