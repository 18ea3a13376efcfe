use super::classifier::ShapeDescriptor;
use log::debug;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

/// Reason recorded when no archetype fits a result.
pub const NO_MATCH_REASON: &str = "no matching chart pattern";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartArchetype {
    LineBarByDate,
    DualAxisLine,
    StackedBarByDate,
    StackedBarWithSelector,
    Scatter,
    MultiDimensionScatter,
    Bubble,
    MultiDimensionBubble,
    BarWithSelectors,
    KpiTiles,
    GeospatialMap,
}

impl ChartArchetype {
    pub fn id(&self) -> u8 {
        match self {
            ChartArchetype::LineBarByDate => 1,
            ChartArchetype::DualAxisLine => 2,
            ChartArchetype::StackedBarByDate => 3,
            ChartArchetype::StackedBarWithSelector => 4,
            ChartArchetype::Scatter => 5,
            ChartArchetype::MultiDimensionScatter => 6,
            ChartArchetype::Bubble => 7,
            ChartArchetype::MultiDimensionBubble => 8,
            ChartArchetype::BarWithSelectors => 9,
            ChartArchetype::KpiTiles => 10,
            ChartArchetype::GeospatialMap => 11,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartArchetype::LineBarByDate => "Line/Bar Chart by Date",
            ChartArchetype::DualAxisLine => "Dual Axis Line Chart",
            ChartArchetype::StackedBarByDate => "Stacked Bar Chart by Date",
            ChartArchetype::StackedBarWithSelector => "Stacked Bar with Column Selector",
            ChartArchetype::Scatter => "Scatter Plot",
            ChartArchetype::MultiDimensionScatter => "Multi-Dimension Scatter",
            ChartArchetype::Bubble => "Bubble Chart",
            ChartArchetype::MultiDimensionBubble => "Multi-Dimension Bubble",
            ChartArchetype::BarWithSelectors => "Bar Chart with Selectors",
            ChartArchetype::KpiTiles => "KPI Tiles",
            ChartArchetype::GeospatialMap => "Geospatial Map",
        }
    }
}

/// What a result column is used for in the chosen chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartRole {
    Date,
    Text,
    Numeric,
    Latitude,
    Longitude,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub role: ChartRole,
    pub column: String,
}

/// Serialized with the numeric `archetype_id` (1..11, or null) the renderer
/// keys on, next to the archetype name.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartAssignment {
    pub archetype: Option<ChartArchetype>,
    pub reason: String,
    /// Result columns per role, in role order. Empty when no chart applies
    /// or when the shape carries no column names.
    pub bindings: Vec<ColumnBinding>,
}

impl ChartAssignment {
    pub fn archetype_id(&self) -> Option<u8> {
        self.archetype.map(|archetype| archetype.id())
    }

    pub fn columns_for(&self, role: ChartRole) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|binding| binding.role == role)
            .map(|binding| binding.column.as_str())
            .collect()
    }
}

impl Serialize for ChartAssignment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ChartAssignment", 5)?;
        state.serialize_field("archetype_id", &self.archetype_id())?;
        state.serialize_field("archetype", &self.archetype)?;
        state.serialize_field("title", &self.archetype.map(|archetype| archetype.title()))?;
        state.serialize_field("reason", &self.reason)?;
        state.serialize_field("bindings", &self.bindings)?;
        state.end()
    }
}

struct ChartRule {
    condition: &'static str,
    matches: fn(&ShapeDescriptor) -> bool,
    archetype: ChartArchetype,
}

/// Evaluated top to bottom; the first matching rule wins.
const RULES: &[ChartRule] = &[
    ChartRule {
        condition: "valid latitude/longitude pair",
        matches: |s| s.has_valid_geo_pair,
        archetype: ChartArchetype::GeospatialMap,
    },
    ChartRule {
        condition: "single row with 1-4 numeric columns",
        matches: |s| s.is_single_row,
        archetype: ChartArchetype::KpiTiles,
    },
    ChartRule {
        condition: "1 date, 0 text, 1 numeric",
        matches: |s| counts(s, 1, 0, 1),
        archetype: ChartArchetype::LineBarByDate,
    },
    ChartRule {
        condition: "1 date, 0 text, 2 numeric",
        matches: |s| counts(s, 1, 0, 2),
        archetype: ChartArchetype::DualAxisLine,
    },
    ChartRule {
        condition: "1 date, 1 text, 1 numeric",
        matches: |s| counts(s, 1, 1, 1),
        archetype: ChartArchetype::StackedBarByDate,
    },
    ChartRule {
        condition: "1 date, 2+ text, 1 numeric",
        matches: |s| s.num_date_cols == 1 && s.num_text_cols >= 2 && s.num_numeric_cols == 1,
        archetype: ChartArchetype::StackedBarWithSelector,
    },
    ChartRule {
        condition: "0 date, 1 text, 2 numeric",
        matches: |s| counts(s, 0, 1, 2),
        archetype: ChartArchetype::Scatter,
    },
    ChartRule {
        condition: "0 date, 2 text, 2 numeric",
        matches: |s| counts(s, 0, 2, 2),
        archetype: ChartArchetype::MultiDimensionScatter,
    },
    ChartRule {
        condition: "0 date, 1 text, 3 numeric",
        matches: |s| counts(s, 0, 1, 3),
        archetype: ChartArchetype::Bubble,
    },
    ChartRule {
        condition: "0 date, 2+ text, 3+ numeric",
        matches: |s| s.num_date_cols == 0 && s.num_text_cols >= 2 && s.num_numeric_cols >= 3,
        archetype: ChartArchetype::MultiDimensionBubble,
    },
    ChartRule {
        condition: "0 date, 1+ text, 1 numeric",
        matches: |s| s.num_date_cols == 0 && s.num_text_cols >= 1 && s.num_numeric_cols == 1,
        archetype: ChartArchetype::BarWithSelectors,
    },
];

fn counts(shape: &ShapeDescriptor, dates: usize, text: usize, numeric: usize) -> bool {
    shape.num_date_cols == dates && shape.num_text_cols == text && shape.num_numeric_cols == numeric
}

/// Pick the chart archetype for a result shape.
pub fn select(shape: &ShapeDescriptor) -> ChartAssignment {
    let Some(rule) = RULES.iter().find(|rule| (rule.matches)(shape)) else {
        debug!(
            "No chart for dates={}, text={}, numeric={}",
            shape.num_date_cols, shape.num_text_cols, shape.num_numeric_cols
        );
        return ChartAssignment {
            archetype: None,
            reason: NO_MATCH_REASON.to_string(),
            bindings: Vec::new(),
        };
    };

    debug!(
        "Selected chart {} ({}): {}",
        rule.archetype.id(),
        rule.archetype.title(),
        rule.condition
    );
    ChartAssignment {
        archetype: Some(rule.archetype),
        reason: rule.condition.to_string(),
        bindings: bind_columns(rule.archetype, shape),
    }
}

fn bind_columns(archetype: ChartArchetype, shape: &ShapeDescriptor) -> Vec<ColumnBinding> {
    use ChartArchetype::*;

    fn first(columns: &[String], n: usize) -> Vec<String> {
        columns.iter().take(n).cloned().collect()
    }
    let (dates, texts, numerics): (Vec<String>, Vec<String>, Vec<String>) = match archetype {
        LineBarByDate => (
            first(&shape.date_columns, 1),
            vec![],
            first(&shape.numeric_columns, 1),
        ),
        DualAxisLine => (
            first(&shape.date_columns, 1),
            vec![],
            first(&shape.numeric_columns, 2),
        ),
        StackedBarByDate => (
            first(&shape.date_columns, 1),
            first(&shape.text_columns, 1),
            first(&shape.numeric_columns, 1),
        ),
        StackedBarWithSelector => (
            first(&shape.date_columns, 1),
            shape.text_columns.clone(),
            first(&shape.numeric_columns, 1),
        ),
        Scatter => (vec![], first(&shape.text_columns, 1), first(&shape.numeric_columns, 2)),
        MultiDimensionScatter => {
            (vec![], first(&shape.text_columns, 2), first(&shape.numeric_columns, 2))
        }
        Bubble => (vec![], first(&shape.text_columns, 1), first(&shape.numeric_columns, 3)),
        MultiDimensionBubble => {
            (vec![], first(&shape.text_columns, 2), first(&shape.numeric_columns, 3))
        }
        BarWithSelectors => (vec![], shape.text_columns.clone(), first(&shape.numeric_columns, 1)),
        KpiTiles => (vec![], vec![], first(&shape.numeric_columns, 4)),
        GeospatialMap => return bind_map(shape),
    };

    let tag = |role: ChartRole| move |column: String| ColumnBinding { role, column };
    dates
        .into_iter()
        .map(tag(ChartRole::Date))
        .chain(texts.into_iter().map(tag(ChartRole::Text)))
        .chain(numerics.into_iter().map(tag(ChartRole::Numeric)))
        .collect()
}

fn bind_map(shape: &ShapeDescriptor) -> Vec<ColumnBinding> {
    let Some(pair) = &shape.geo_pair else {
        return Vec::new();
    };
    let mut bindings = vec![
        ColumnBinding {
            role: ChartRole::Latitude,
            column: pair.latitude.clone(),
        },
        ColumnBinding {
            role: ChartRole::Longitude,
            column: pair.longitude.clone(),
        },
    ];
    if let Some(value) = shape
        .numeric_columns
        .iter()
        .find(|column| **column != pair.latitude && **column != pair.longitude)
    {
        bindings.push(ColumnBinding {
            role: ChartRole::Value,
            column: value.clone(),
        });
    }
    bindings
}
