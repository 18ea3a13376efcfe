use super::{Column, ColumnKind, Relationship, SemanticModel, SemanticModelError, Table};
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identity of a column within a model: `TABLE.COLUMN`.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

impl FromStr for ColumnRef {
    type Err = SemanticModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                Ok(ColumnRef::new(table, column))
            }
            _ => Err(SemanticModelError::MalformedModel(format!(
                "expected TABLE.COLUMN, got '{}'",
                s
            ))),
        }
    }
}

/// A column together with the table that owns it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnEntry<'a> {
    pub table: &'a Table,
    pub column: &'a Column,
}

impl ColumnEntry<'_> {
    pub fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(&self.table.name, &self.column.name)
    }

    /// `"<table label> <column label>"`, preferring descriptions over identifiers.
    pub fn qualified_label(&self) -> String {
        format!("{} {}", self.table.label(), self.column.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    table: usize,
    column: usize,
}

/// Read-only lookups over a [`SemanticModel`].
///
/// Term lookups are case-insensitive. When a term matches more than one
/// column, a column whose *name* matches wins over one matching by synonym;
/// among equals the table declared first wins. Within a table, dimensions
/// come before time dimensions, which come before facts, whatever the order
/// of those lists in the YAML; each list keeps its declared order.
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    model: Arc<SemanticModel>,
    by_name: HashMap<String, Vec<Position>>,
    by_synonym: HashMap<String, Vec<Position>>,
    browse_order: Vec<(usize, Vec<usize>)>,
}

impl MetadataIndex {
    pub fn new(model: Arc<SemanticModel>) -> Self {
        let mut by_name: HashMap<String, Vec<Position>> = HashMap::new();
        let mut by_synonym: HashMap<String, Vec<Position>> = HashMap::new();

        for (table_idx, table) in model.tables.iter().enumerate() {
            for (column_idx, column) in table.columns().enumerate() {
                let position = Position {
                    table: table_idx,
                    column: column_idx,
                };
                by_name
                    .entry(column.name.to_lowercase())
                    .or_default()
                    .push(position);
                for synonym in &column.synonyms {
                    by_synonym
                        .entry(synonym.to_lowercase())
                        .or_default()
                        .push(position);
                }
            }
        }

        let mut browse_order: Vec<(usize, Vec<usize>)> = model
            .tables
            .iter()
            .enumerate()
            .map(|(table_idx, table)| {
                let columns: Vec<&Column> = table.columns().collect();
                let mut order: Vec<usize> = (0..columns.len()).collect();
                order.sort_by(|a, b| alphabetical(&columns[*a].name, &columns[*b].name));
                (table_idx, order)
            })
            .collect();
        browse_order
            .sort_by(|a, b| alphabetical(&model.tables[a.0].name, &model.tables[b.0].name));

        debug!(
            "Indexed {} column names and {} synonyms",
            by_name.len(),
            by_synonym.len()
        );

        Self {
            model,
            by_name,
            by_synonym,
            browse_order,
        }
    }

    pub fn model(&self) -> &SemanticModel {
        &self.model
    }

    /// Tables in declaration order.
    pub fn tables(&self) -> &[Table] {
        &self.model.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.model.get_table(name)
    }

    /// Resolve a column by name or synonym.
    pub fn find_column(&self, name_or_synonym: &str) -> Option<ColumnEntry<'_>> {
        let candidates = self.find_all(name_or_synonym);
        if candidates.len() > 1 {
            warn!(
                "Ambiguous column term '{}' matches {} columns, resolved to {}",
                name_or_synonym,
                candidates.len(),
                candidates[0].column_ref()
            );
        }
        candidates.into_iter().next()
    }

    /// Every column matching a term, in resolution order.
    pub fn find_all(&self, name_or_synonym: &str) -> Vec<ColumnEntry<'_>> {
        let key = name_or_synonym.trim().to_lowercase();
        let name_matches = self.by_name.get(&key).into_iter().flatten();
        let synonym_matches = self
            .by_synonym
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|position| {
                !self
                    .by_name
                    .get(&key)
                    .is_some_and(|names| names.contains(position))
            });

        name_matches
            .chain(synonym_matches)
            .map(|position| self.entry(*position))
            .collect()
    }

    /// Look up a column by its `TABLE.COLUMN` identity, case-insensitively.
    pub fn resolve(&self, column_ref: &ColumnRef) -> Option<ColumnEntry<'_>> {
        let table = self.model.get_table(&column_ref.table)?;
        let column = table.get_column(&column_ref.column)?;
        Some(ColumnEntry { table, column })
    }

    /// Tables alphabetically, and within each table its columns alphabetically.
    ///
    /// Comparison ignores ASCII case; names equal up to case fall back to byte order.
    pub fn columns_by_table(&self) -> Vec<(&str, Vec<&Column>)> {
        self.browse(|_| true)
            .into_iter()
            .map(|(table, columns)| {
                (
                    table.name.as_str(),
                    columns.into_iter().map(|entry| entry.column).collect(),
                )
            })
            .collect()
    }

    /// Same ordering as [`Self::columns_by_table`], restricted to one kind.
    /// Tables without such columns are left out.
    pub fn columns_of_kind(&self, kind: ColumnKind) -> Vec<(&str, Vec<&Column>)> {
        self.browse(|column| column.kind == kind)
            .into_iter()
            .filter(|(_, columns)| !columns.is_empty())
            .map(|(table, columns)| {
                (
                    table.name.as_str(),
                    columns.into_iter().map(|entry| entry.column).collect(),
                )
            })
            .collect()
    }

    /// Browse filter: substring match on column name or description among the
    /// given kinds, in browse order. An empty term matches everything.
    pub fn search(&self, term: &str, kinds: &[ColumnKind]) -> Vec<ColumnEntry<'_>> {
        let term = term.trim().to_lowercase();
        self.browse(|column| {
            kinds.contains(&column.kind)
                && (term.is_empty()
                    || column.name.to_lowercase().contains(&term)
                    || column.description.to_lowercase().contains(&term))
        })
        .into_iter()
        .flat_map(|(_, columns)| columns)
        .collect()
    }

    pub fn relationships_for(&self, table_name: &str) -> Vec<&Relationship> {
        self.model
            .relationships
            .iter()
            .filter(|relationship| relationship.involves(table_name))
            .collect()
    }

    fn browse<F>(&self, keep: F) -> Vec<(&Table, Vec<ColumnEntry<'_>>)>
    where
        F: Fn(&Column) -> bool,
    {
        self.browse_order
            .iter()
            .map(|(table_idx, order)| {
                let table = &self.model.tables[*table_idx];
                let columns: Vec<&Column> = table.columns().collect();
                let entries = order
                    .iter()
                    .map(|column_idx| columns[*column_idx])
                    .filter(|column| keep(*column))
                    .map(|column| ColumnEntry { table, column })
                    .collect();
                (table, entries)
            })
            .collect()
    }

    fn entry(&self, position: Position) -> ColumnEntry<'_> {
        let table = &self.model.tables[position.table];
        let column = table
            .columns()
            .nth(position.column)
            .unwrap_or_else(|| unreachable!("index positions come from the same model"));
        ColumnEntry { table, column }
    }
}

fn alphabetical(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
