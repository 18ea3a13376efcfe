use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single cell of a tabular result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Rough in-memory footprint, used to size chart row limits.
    pub fn estimated_size(&self) -> usize {
        match self {
            Value::Null | Value::Boolean(_) => 1,
            Value::Int(_) | Value::Float(_) => 8,
            Value::String(s) => s.len() + 8,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// Semantic type of a result column as seen by the chart engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Date,
    Text,
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultColumn {
    pub name: String,
    pub column_type: ResultType,
    pub values: Vec<Value>,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, column_type: ResultType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// Type the column from its name and values.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Self {
        let name = name.into();
        let column_type = infer_type(&name, &values);
        Self {
            name,
            column_type,
            values,
        }
    }
}

/// Row-oriented query result as returned by the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Error, Debug)]
pub enum ResultSetError {
    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Invalid result JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResultSet {
    pub fn from_json(json: &str) -> Result<Self, ResultSetError> {
        let result: ResultSet = serde_json::from_str(json)?;
        result.validate()?;
        Ok(result)
    }

    pub fn validate(&self) -> Result<(), ResultSetError> {
        let expected = self.columns.len();
        match self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
        {
            Some((row, values)) => Err(ResultSetError::RaggedRow {
                row,
                found: values.len(),
                expected,
            }),
            None => Ok(()),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .map(Value::estimated_size)
            .sum()
    }

    /// Pivot into typed columns, in result order.
    pub fn typed_columns(&self) -> Vec<ResultColumn> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values = self
                    .rows
                    .iter()
                    .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                    .collect();
                ResultColumn::infer(name.clone(), values)
            })
            .collect()
    }
}

const TIME_NAME_HINTS: [&str; 5] = ["date", "time", "day", "month", "year"];

/// Infer a column's type.
///
/// Numeric when every non-null value is a number. Date when every non-null
/// value is a string holding an ISO date or timestamp; columns whose names
/// hint at time also accept a few looser date layouts. Anything else,
/// including an all-null column, is text.
pub fn infer_type(name: &str, values: &[Value]) -> ResultType {
    let mut non_null = values.iter().filter(|value| !value.is_null()).peekable();
    if non_null.peek().is_none() {
        return ResultType::Text;
    }

    let non_null: Vec<&Value> = non_null.collect();
    if non_null.iter().all(|value| value.as_f64().is_some()) {
        return ResultType::Numeric;
    }

    let lowered = name.to_lowercase();
    let time_hint = TIME_NAME_HINTS.iter().any(|hint| lowered.contains(hint));
    let all_dates = non_null.iter().all(|value| match value {
        Value::String(s) => parses_as_date(s, time_hint),
        _ => false,
    });
    if all_dates {
        ResultType::Date
    } else {
        ResultType::Text
    }
}

fn parses_as_date(text: &str, loose: bool) -> bool {
    let text = text.trim();
    if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
    {
        return true;
    }
    const TIMESTAMP_FORMATS: [&str; 3] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    if TIMESTAMP_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(text, format).is_ok())
    {
        return true;
    }
    if !loose {
        return false;
    }
    const LOOSE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%d-%b-%Y", "%Y/%m/%d"];
    LOOSE_FORMATS
        .iter()
        .any(|format| NaiveDate::parse_from_str(text, format).is_ok())
        || NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod test {
    use super::{infer_type, ResultSet, ResultSetError, ResultType, Value};
    use rstest::*;

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::String(v.to_string())).collect()
    }

    #[rstest]
    #[case::ints("amount", vec![Value::Int(1), Value::Null, Value::Int(3)], ResultType::Numeric)]
    #[case::mixed_numbers("amount", vec![Value::Int(1), Value::Float(2.5)], ResultType::Numeric)]
    #[case::iso_dates("anything", strings(&["2024-01-01", "2024-02-01"]), ResultType::Date)]
    #[case::timestamps("created", strings(&["2024-01-01 10:00:00", "2024-01-01T11:30:00"]), ResultType::Date)]
    #[case::loose_with_hint("order_month", strings(&["2024-01", "2024-02"]), ResultType::Date)]
    #[case::loose_without_hint("code", strings(&["2024-01", "2024-02"]), ResultType::Text)]
    #[case::us_dates_with_hint("ship_date", strings(&["01/31/2024"]), ResultType::Date)]
    #[case::text("region", strings(&["EMEA", "APAC"]), ResultType::Text)]
    #[case::booleans("flag", vec![Value::Boolean(true)], ResultType::Text)]
    #[case::all_null("empty", vec![Value::Null, Value::Null], ResultType::Text)]
    #[case::no_rows("empty", vec![], ResultType::Text)]
    fn test_infer_type(
        #[case] name: &str,
        #[case] values: Vec<Value>,
        #[case] expected: ResultType,
    ) {
        assert_eq!(infer_type(name, &values), expected);
    }

    #[test]
    fn test_result_set_from_json() {
        let result = ResultSet::from_json(
            r#"{"columns": ["REGION", "SALES"], "rows": [["EMEA", 10], ["APAC", 12.5], [null, null]]}"#,
        )
        .unwrap();

        assert_eq!(result.row_count(), 3);
        assert_eq!(result.rows[1][1], Value::Float(12.5));
        assert_eq!(result.rows[2][0], Value::Null);

        let columns = result.typed_columns();
        assert_eq!(columns[0].column_type, ResultType::Text);
        assert_eq!(columns[1].column_type, ResultType::Numeric);
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let err = ResultSet::from_json(r#"{"columns": ["A", "B"], "rows": [[1, 2], [3]]}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ResultSetError::RaggedRow {
                row: 1,
                found: 1,
                expected: 2
            }
        ));
    }
}
