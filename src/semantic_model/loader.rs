use super::{
    BaseTable, Cardinality, Column, ColumnKind, ColumnPair, JoinType, Relationship,
    SemanticModel, SemanticModelError, Table,
};
use log::debug;
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::collections::HashSet;

/// Parse a semantic model from YAML text.
///
/// The loader does no I/O; the text comes from a [`super::SemanticModelStore`].
/// Optional fields (`description`, `synonyms`, `sample_values`,
/// `cortex_search_service`, ...) default to empty values. A column's
/// [`ColumnKind`] is fixed by the list it is declared under.
pub fn load(raw_yaml: &str) -> Result<SemanticModel, SemanticModelError> {
    let root: YamlValue = serde_yaml::from_str(raw_yaml)?;

    let mapping = root.as_mapping().ok_or_else(|| {
        SemanticModelError::MalformedModel("root must be a mapping".to_string())
    })?;
    match mapping.get("tables") {
        Some(YamlValue::Sequence(_)) => {}
        Some(_) => {
            return Err(SemanticModelError::MalformedModel(
                "'tables' must be a list".to_string(),
            ))
        }
        None => {
            return Err(SemanticModelError::MalformedModel(
                "'tables' section is required".to_string(),
            ))
        }
    }

    let raw: RawModel = serde_yaml::from_value(root)
        .map_err(|e| SemanticModelError::MalformedModel(e.to_string()))?;

    let mut tables = Vec::with_capacity(raw.tables.len());
    let mut relationships = Vec::new();
    let mut table_names = HashSet::new();
    for (position, raw_table) in raw.tables.into_iter().enumerate() {
        let raw_table: RawTable = serde_yaml::from_value(raw_table).map_err(|e| {
            SemanticModelError::MalformedModel(format!("table {}: {}", position, e))
        })?;
        let (table, table_relationships) = convert_table(raw_table, position)?;
        if !table_names.insert(table.name.to_lowercase()) {
            return Err(SemanticModelError::MalformedModel(format!(
                "duplicate table '{}'",
                table.name
            )));
        }
        relationships.extend(table_relationships);
        tables.push(table);
    }

    for raw_relationship in raw.relationships {
        relationships.push(convert_relationship(raw_relationship, None)?);
    }

    let model = SemanticModel {
        name: raw.name.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        tables,
        relationships,
        custom_instructions: raw.custom_instructions.unwrap_or_default(),
    };

    debug!(
        "Loaded semantic model '{}': {} tables, {} relationships",
        model.name,
        model.tables.len(),
        model.relationships.len()
    );
    Ok(model)
}

#[derive(Deserialize)]
struct RawModel {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    tables: Vec<YamlValue>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
    custom_instructions: Option<String>,
}

#[derive(Deserialize)]
struct RawTable {
    name: Option<String>,
    description: Option<String>,
    base_table: Option<RawBaseTable>,
    synonyms: Option<Vec<YamlValue>>,
    dimensions: Option<Vec<YamlValue>>,
    time_dimensions: Option<Vec<YamlValue>>,
    facts: Option<Vec<YamlValue>>,
    relationships: Option<Vec<RawRelationship>>,
}

#[derive(Deserialize)]
struct RawBaseTable {
    database: Option<String>,
    schema: Option<String>,
    table: Option<String>,
}

#[derive(Deserialize)]
struct RawColumn {
    expr: Option<String>,
    data_type: Option<String>,
    description: Option<String>,
    synonyms: Option<Vec<YamlValue>>,
    sample_values: Option<Vec<YamlValue>>,
    cortex_search_service: Option<YamlValue>,
}

#[derive(Deserialize)]
struct RawRelationship {
    name: Option<String>,
    #[serde(alias = "from_table")]
    left_table: Option<String>,
    #[serde(alias = "to_table")]
    right_table: Option<String>,
    #[serde(default)]
    relationship_columns: Vec<RawColumnPair>,
    from_column: Option<String>,
    to_column: Option<String>,
    join_type: Option<String>,
    #[serde(alias = "cardinality")]
    relationship_type: Option<String>,
}

#[derive(Deserialize)]
struct RawColumnPair {
    left_column: String,
    right_column: String,
}

fn convert_table(
    raw: RawTable,
    position: usize,
) -> Result<(Table, Vec<Relationship>), SemanticModelError> {
    let name = raw
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            SemanticModelError::MalformedModel(format!(
                "table {} is missing required 'name' field",
                position
            ))
        })?;

    let dimensions = convert_columns(&name, raw.dimensions, ColumnKind::Dimension)?;
    let time_dimensions =
        convert_columns(&name, raw.time_dimensions, ColumnKind::TimeDimension)?;
    let facts = convert_columns(&name, raw.facts, ColumnKind::Fact)?;

    let mut seen = HashSet::new();
    for column in dimensions.iter().chain(&time_dimensions).chain(&facts) {
        if !seen.insert(column.name.to_lowercase()) {
            return Err(SemanticModelError::DuplicateColumn {
                table: name,
                column: column.name.clone(),
            });
        }
    }

    let base_table = raw
        .base_table
        .map(|base| BaseTable {
            database: base.database.unwrap_or_default(),
            schema: base.schema.unwrap_or_default(),
            table: base.table.unwrap_or_default(),
        })
        .unwrap_or_default();

    let relationships = raw
        .relationships
        .unwrap_or_default()
        .into_iter()
        .map(|relationship| convert_relationship(relationship, Some(&name)))
        .collect::<Result<Vec<_>, _>>()?;

    let table = Table {
        description: raw.description.unwrap_or_default(),
        base_table,
        synonyms: scalar_list(raw.synonyms),
        dimensions,
        time_dimensions,
        facts,
        name,
    };
    Ok((table, relationships))
}

fn convert_columns(
    table: &str,
    entries: Option<Vec<YamlValue>>,
    kind: ColumnKind,
) -> Result<Vec<Column>, SemanticModelError> {
    entries
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(position, entry)| {
            let unknown_kind = |detail: String| SemanticModelError::UnknownColumnKind {
                table: table.to_string(),
                list: kind.list_key().to_string(),
                position,
                detail,
            };
            if !entry.is_mapping() {
                return Err(unknown_kind("entry is not a mapping".to_string()));
            }
            let name = entry
                .get("name")
                .and_then(scalar_to_string)
                .filter(|name| !name.trim().is_empty())
                .ok_or_else(|| unknown_kind("column has no name".to_string()))?;
            let raw: RawColumn = serde_yaml::from_value(entry).map_err(|e| {
                SemanticModelError::MalformedModel(format!(
                    "column '{}' of table '{}': {}",
                    name, table, e
                ))
            })?;
            Ok(convert_column(name, raw, kind))
        })
        .collect()
}

fn convert_column(name: String, raw: RawColumn, kind: ColumnKind) -> Column {
    let expr = raw
        .expr
        .filter(|expr| !expr.trim().is_empty())
        .unwrap_or_else(|| name.clone());
    let sample_values = raw
        .sample_values
        .unwrap_or_default()
        .iter()
        .filter_map(scalar_to_string)
        .collect();
    let cortex_search_service = raw.cortex_search_service.and_then(|service| match service {
        YamlValue::Mapping(mapping) => mapping
            .get("service")
            .and_then(scalar_to_string),
        other => scalar_to_string(&other),
    });

    Column {
        name,
        expr,
        kind,
        data_type: raw.data_type.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        synonyms: scalar_list(raw.synonyms),
        sample_values,
        cortex_search_service,
    }
}

fn convert_relationship(
    raw: RawRelationship,
    owner: Option<&str>,
) -> Result<Relationship, SemanticModelError> {
    let left_table = raw
        .left_table
        .or_else(|| owner.map(str::to_string))
        .ok_or_else(|| {
            SemanticModelError::MalformedModel(format!(
                "relationship '{}' is missing 'left_table'",
                raw.name.as_deref().unwrap_or_default()
            ))
        })?;
    let right_table = raw.right_table.ok_or_else(|| {
        SemanticModelError::MalformedModel(format!(
            "relationship '{}' is missing 'right_table'",
            raw.name.as_deref().unwrap_or_default()
        ))
    })?;

    let mut columns: Vec<ColumnPair> = raw
        .relationship_columns
        .into_iter()
        .map(|pair| ColumnPair {
            left_column: pair.left_column,
            right_column: pair.right_column,
        })
        .collect();
    // Single-pair shorthand; a lone `to_column` joins on the same name.
    match (raw.from_column, raw.to_column) {
        (Some(left), Some(right)) => columns.push(ColumnPair {
            left_column: left,
            right_column: right,
        }),
        (Some(only), None) | (None, Some(only)) => columns.push(ColumnPair {
            left_column: only.clone(),
            right_column: only,
        }),
        (None, None) => {}
    }

    let join_type = match raw.join_type {
        Some(join_type) => join_type.parse()?,
        None => JoinType::Inner,
    };
    let cardinality = match raw.relationship_type {
        Some(cardinality) => cardinality.parse()?,
        None => Cardinality::ManyToOne,
    };

    let name = raw
        .name
        .unwrap_or_else(|| format!("{}_to_{}", left_table, right_table));

    Ok(Relationship {
        name,
        left_table,
        right_table,
        columns,
        join_type,
        cardinality,
    })
}

fn scalar_to_string(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Number(n) => Some(n.to_string()),
        YamlValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Scalars as strings, first spelling kept for case-insensitive repeats.
fn scalar_list(values: Option<Vec<YamlValue>>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .unwrap_or_default()
        .iter()
        .filter_map(scalar_to_string)
        .filter(|value| seen.insert(value.to_lowercase()))
        .collect()
}
