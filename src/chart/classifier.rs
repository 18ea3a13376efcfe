use super::value::{ResultColumn, ResultSet, ResultType};
use crate::config::ChartConfig;
use log::{debug, warn};
use serde::Serialize;

const LATITUDE_TERMS: [&str; 2] = ["lat", "latitude"];
const LONGITUDE_TERMS: [&str; 2] = ["lon", "longitude"];
const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Columns used to plot a result on a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoPair {
    pub latitude: String,
    pub longitude: String,
}

/// Column-type composition of one tabular result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ShapeDescriptor {
    pub num_date_cols: usize,
    pub num_text_cols: usize,
    pub num_numeric_cols: usize,
    pub is_single_row: bool,
    pub has_valid_geo_pair: bool,
    pub row_count: usize,
    /// Column names per type, in result order.
    pub date_columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub geo_pair: Option<GeoPair>,
}

impl ShapeDescriptor {
    /// Shape from counts alone, with no column names attached.
    pub fn from_counts(dates: usize, text: usize, numeric: usize) -> Self {
        Self {
            num_date_cols: dates,
            num_text_cols: text,
            num_numeric_cols: numeric,
            ..Self::default()
        }
    }
}

/// Compute the shape of a result from already-typed columns.
///
/// The row count is taken from the longest column.
pub fn classify(columns: &[ResultColumn]) -> ShapeDescriptor {
    let row_count = columns
        .iter()
        .map(|column| column.values.len())
        .max()
        .unwrap_or(0);

    let names_of = |wanted: ResultType| -> Vec<String> {
        columns
            .iter()
            .filter(|column| column.column_type == wanted)
            .map(|column| column.name.clone())
            .collect()
    };
    let date_columns = names_of(ResultType::Date);
    let text_columns = names_of(ResultType::Text);
    let numeric_columns = names_of(ResultType::Numeric);

    let is_single_row = row_count == 1 && (1..=4).contains(&numeric_columns.len());
    let geo_pair = find_geo_pair(columns);

    let shape = ShapeDescriptor {
        num_date_cols: date_columns.len(),
        num_text_cols: text_columns.len(),
        num_numeric_cols: numeric_columns.len(),
        is_single_row,
        has_valid_geo_pair: geo_pair.is_some(),
        row_count,
        date_columns,
        text_columns,
        numeric_columns,
        geo_pair,
    };
    debug!(
        "Classified result: dates={}, text={}, numeric={}, rows={}, single_row={}, geo={}",
        shape.num_date_cols,
        shape.num_text_cols,
        shape.num_numeric_cols,
        shape.row_count,
        shape.is_single_row,
        shape.has_valid_geo_pair
    );
    shape
}

/// Type the columns of a raw result and classify it.
pub fn classify_result(result: &ResultSet) -> ShapeDescriptor {
    classify(&result.typed_columns())
}

/// How many rows of a result to hand to the chart renderer.
///
/// Aims for `target_bytes` of data based on the average row size, clamped
/// to `[min_rows, max_rows]`. An unknown (zero) size yields `min_rows`.
pub fn chart_row_limit(total_bytes: usize, row_count: usize, config: &ChartConfig) -> usize {
    if total_bytes == 0 || row_count == 0 {
        return config.min_rows;
    }
    let bytes_per_row = (total_bytes as f64 / row_count as f64).max(1.0);
    let fitting_rows = (config.target_bytes as f64 / bytes_per_row) as usize;
    fitting_rows.clamp(config.min_rows, config.max_rows.max(config.min_rows))
}

fn find_geo_pair(columns: &[ResultColumn]) -> Option<GeoPair> {
    let latitudes: Vec<&ResultColumn> = columns
        .iter()
        .filter(|column| is_coordinate(column, &LATITUDE_TERMS, LATITUDE_RANGE))
        .collect();
    let longitudes: Vec<&ResultColumn> = columns
        .iter()
        .filter(|column| is_coordinate(column, &LONGITUDE_TERMS, LONGITUDE_RANGE))
        .collect();

    latitudes.iter().find_map(|latitude| {
        longitudes
            .iter()
            .find(|longitude| longitude.name != latitude.name)
            .map(|longitude| GeoPair {
                latitude: latitude.name.clone(),
                longitude: longitude.name.clone(),
            })
    })
}

fn is_coordinate(column: &ResultColumn, terms: &[&str], (low, high): (f64, f64)) -> bool {
    let name = column.name.to_lowercase();
    if !terms.iter().any(|term| name.contains(term)) {
        return false;
    }
    if column.column_type != ResultType::Numeric {
        return false;
    }

    let mut seen_value = false;
    for value in column.values.iter().filter(|value| !value.is_null()) {
        match value.as_f64() {
            Some(v) if v >= low && v <= high => seen_value = true,
            _ => {
                warn!(
                    "Column '{}' looks like a coordinate but holds {} outside [{}, {}]",
                    column.name, value, low, high
                );
                return false;
            }
        }
    }
    seen_value
}

#[cfg(test)]
mod test {
    use super::{chart_row_limit, classify, GeoPair};
    use crate::chart::value::{ResultColumn, ResultType, Value};
    use crate::config::ChartConfig;
    use rstest::*;

    fn numeric(name: &str, values: &[f64]) -> ResultColumn {
        ResultColumn::new(
            name,
            ResultType::Numeric,
            values.iter().map(|v| Value::Float(*v)).collect(),
        )
    }

    fn text(name: &str, rows: usize) -> ResultColumn {
        ResultColumn::new(
            name,
            ResultType::Text,
            (0..rows).map(|i| Value::String(format!("v{i}"))).collect(),
        )
    }

    fn date(name: &str, rows: usize) -> ResultColumn {
        ResultColumn::new(
            name,
            ResultType::Date,
            (0..rows)
                .map(|i| Value::String(format!("2024-01-{:02}", i + 1)))
                .collect(),
        )
    }

    #[test]
    fn test_counts_by_type() {
        let shape = classify(&[
            date("ORDER_DATE", 3),
            text("REGION", 3),
            text("PRODUCT", 3),
            numeric("SALES", &[1.0, 2.0, 3.0]),
        ]);

        assert_eq!(shape.num_date_cols, 1);
        assert_eq!(shape.num_text_cols, 2);
        assert_eq!(shape.num_numeric_cols, 1);
        assert_eq!(shape.row_count, 3);
        assert!(!shape.is_single_row);
        assert!(!shape.has_valid_geo_pair);
        assert_eq!(shape.text_columns, vec!["REGION", "PRODUCT"]);
    }

    #[rstest]
    #[case::one_numeric(1, true)]
    #[case::four_numeric(4, true)]
    #[case::five_numeric(5, false)]
    #[case::no_numeric(0, false)]
    fn test_single_row_needs_one_to_four_numerics(#[case] numerics: usize, #[case] expected: bool) {
        let mut columns: Vec<ResultColumn> = (0..numerics)
            .map(|i| numeric(&format!("KPI_{i}"), &[i as f64]))
            .collect();
        columns.push(text("LABEL", 1));
        assert_eq!(classify(&columns).is_single_row, expected);
    }

    #[test]
    fn test_two_rows_is_not_single_row() {
        let shape = classify(&[numeric("TOTAL", &[1.0, 2.0])]);
        assert!(!shape.is_single_row);
    }

    #[test]
    fn test_geo_pair_detected() {
        let shape = classify(&[
            numeric("STORE_LATITUDE", &[59.9, 60.4]),
            numeric("STORE_LONGITUDE", &[10.7, 5.3]),
            numeric("SALES", &[100.0, 200.0]),
        ]);

        assert!(shape.has_valid_geo_pair);
        assert_eq!(
            shape.geo_pair,
            Some(GeoPair {
                latitude: "STORE_LATITUDE".to_string(),
                longitude: "STORE_LONGITUDE".to_string(),
            })
        );
        assert_eq!(shape.num_numeric_cols, 3);
    }

    #[rstest]
    #[case::latitude_out_of_range(numeric("LAT", &[91.0]), numeric("LON", &[10.0]))]
    #[case::longitude_out_of_range(numeric("LAT", &[45.0]), numeric("LON", &[-181.0]))]
    #[case::latitude_not_numeric(text("LAT", 1), numeric("LON", &[10.0]))]
    #[case::no_longitude(numeric("LAT", &[45.0]), numeric("HEIGHT", &[10.0]))]
    fn test_invalid_geo_pairs(#[case] lat: ResultColumn, #[case] lon: ResultColumn) {
        assert!(!classify(&[lat, lon]).has_valid_geo_pair);
    }

    #[test]
    fn test_single_column_cannot_be_both_coordinates() {
        let shape = classify(&[numeric("LATLON", &[10.0])]);
        assert!(!shape.has_valid_geo_pair);
    }

    #[test]
    fn test_all_null_coordinates_do_not_qualify() {
        let lat = ResultColumn::new("LAT", ResultType::Numeric, vec![Value::Null]);
        let lon = numeric("LON", &[10.0]);
        assert!(!classify(&[lat, lon]).has_valid_geo_pair);
    }

    #[rstest]
    #[case::unknown_size(0, 100, 3000)]
    #[case::small_rows(1_000_000, 100_000, 20000)]
    #[case::wide_rows(80_000_000, 20_000, 3000)]
    #[case::in_between(102_400, 100, 8192)]
    fn test_chart_row_limit(#[case] bytes: usize, #[case] rows: usize, #[case] expected: usize) {
        let config = ChartConfig {
            min_rows: 3000,
            max_rows: 20000,
            target_bytes: 8 * 1024 * 1024,
        };
        assert_eq!(chart_row_limit(bytes, rows, &config), expected);
    }
}
