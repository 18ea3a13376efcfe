use crate::semantic_model::index::{ColumnEntry, ColumnRef};
use crate::semantic_model::ColumnKind;
use log::debug;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Filter text meaning "no filter". Also the label the column picker shows.
pub const NO_FILTER: &str = "Don't Filter";

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultOperation {
    GroupBy,
    Sum,
    Count,
    Avg,
    Min,
    Max,
    TruncateToDay,
    TruncateToMonth,
    DontShow,
}

impl ResultOperation {
    pub const ALL: [ResultOperation; 9] = [
        ResultOperation::GroupBy,
        ResultOperation::Sum,
        ResultOperation::Count,
        ResultOperation::Avg,
        ResultOperation::Min,
        ResultOperation::Max,
        ResultOperation::TruncateToDay,
        ResultOperation::TruncateToMonth,
        ResultOperation::DontShow,
    ];

    /// Facts are summed; dimensions and time dimensions are grouped.
    pub fn default_for(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Fact => ResultOperation::Sum,
            ColumnKind::Dimension | ColumnKind::TimeDimension => ResultOperation::GroupBy,
        }
    }

    /// The operation menu offered for a column kind. Advisory: any operation
    /// is accepted for any kind.
    pub fn menu_for(kind: ColumnKind) -> &'static [ResultOperation] {
        use ResultOperation::*;
        match kind {
            ColumnKind::Fact => &[GroupBy, Sum, Count, Avg, Min, Max, DontShow],
            ColumnKind::TimeDimension => {
                &[GroupBy, Count, TruncateToDay, TruncateToMonth, DontShow]
            }
            ColumnKind::Dimension => &[GroupBy, Count, DontShow],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResultOperation::GroupBy => "Group By",
            ResultOperation::Sum => "Sum",
            ResultOperation::Count => "Count",
            ResultOperation::Avg => "Avg",
            ResultOperation::Min => "Min",
            ResultOperation::Max => "Max",
            ResultOperation::TruncateToDay => "Truncate to Day",
            ResultOperation::TruncateToMonth => "Truncate to Month",
            ResultOperation::DontShow => "Don't Show",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            ResultOperation::GroupBy => "group_by",
            ResultOperation::Sum => "sum",
            ResultOperation::Count => "count",
            ResultOperation::Avg => "avg",
            ResultOperation::Min => "min",
            ResultOperation::Max => "max",
            ResultOperation::TruncateToDay => "truncate_to_day",
            ResultOperation::TruncateToMonth => "truncate_to_month",
            ResultOperation::DontShow => "dont_show",
        }
    }

    /// Word used in prompts for aggregating operations.
    pub fn aggregation_word(&self) -> Option<&'static str> {
        match self {
            ResultOperation::Sum => Some("total"),
            ResultOperation::Count => Some("count"),
            ResultOperation::Avg => Some("average"),
            ResultOperation::Min => Some("minimum"),
            ResultOperation::Max => Some("maximum"),
            _ => None,
        }
    }

    /// Operations that put the column in the grouped-by list.
    pub fn is_grouping(&self) -> bool {
        matches!(
            self,
            ResultOperation::GroupBy
                | ResultOperation::TruncateToDay
                | ResultOperation::TruncateToMonth
        )
    }

    pub fn is_shown(&self) -> bool {
        !matches!(self, ResultOperation::DontShow)
    }
}

impl fmt::Display for ResultOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResultOperation {
    type Err = SelectionError;

    /// Accepts ids (`group_by`) and picker labels (`Group By`, `Don't Show`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '\'')
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        let normalized = match normalized.as_str() {
            "average" => "avg",
            "minimum" => "min",
            "maximum" => "max",
            "total" => "sum",
            other => other,
        };
        ResultOperation::ALL
            .into_iter()
            .find(|op| op.id() == normalized)
            .ok_or_else(|| SelectionError::InvalidOperation(s.to_string()))
    }
}

/// One user-chosen column with its operation and filter.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Selection {
    pub column_ref: ColumnRef,
    pub kind: ColumnKind,
    pub result_operation: ResultOperation,
    pub filter_text: String,
}

impl Selection {
    pub fn has_filter(&self) -> bool {
        self.filter_text != NO_FILTER
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum SelectionError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Column not selected: {0}")]
    ColumnNotSelected(ColumnRef),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

/// Selected columns in the order they were ticked.
///
/// Removing a column never reorders the remaining ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    selections: Vec<Selection>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tick or untick a column. Newly ticked columns get the default
    /// operation for their kind and no filter.
    pub fn toggle(&mut self, column: &ColumnEntry<'_>) {
        let column_ref = column.column_ref();
        if let Some(position) = self.position(&column_ref) {
            self.selections.remove(position);
            debug!("Deselected {}", column_ref);
        } else {
            let result_operation = ResultOperation::default_for(column.column.kind);
            debug!("Selected {} ({})", column_ref, result_operation);
            self.selections.push(Selection {
                column_ref,
                kind: column.column.kind,
                result_operation,
                filter_text: NO_FILTER.to_string(),
            });
        }
    }

    pub fn set_operation(
        &mut self,
        column_ref: &ColumnRef,
        op: ResultOperation,
    ) -> Result<(), SelectionError> {
        let selection = self.get_mut(column_ref)?;
        selection.result_operation = op;
        debug!("Operation for {} set to {}", column_ref, op);
        Ok(())
    }

    /// Like [`Self::set_operation`], for operations given as text.
    pub fn set_operation_str(
        &mut self,
        column_ref: &ColumnRef,
        op: &str,
    ) -> Result<(), SelectionError> {
        let op = op.parse()?;
        self.set_operation(column_ref, op)
    }

    /// Attach filter text. Blank text clears the filter.
    pub fn set_filter(&mut self, column_ref: &ColumnRef, text: &str) -> Result<(), SelectionError> {
        let selection = self.get_mut(column_ref)?;
        selection.filter_text = if text.trim().is_empty() {
            NO_FILTER.to_string()
        } else {
            text.to_string()
        };
        debug!("Filter for {} set to {:?}", column_ref, selection.filter_text);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    pub fn is_selected(&self, column_ref: &ColumnRef) -> bool {
        self.position(column_ref).is_some()
    }

    pub fn get(&self, column_ref: &ColumnRef) -> Option<&Selection> {
        self.position(column_ref).map(|position| &self.selections[position])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Selection> {
        self.selections.iter()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    fn position(&self, column_ref: &ColumnRef) -> Option<usize> {
        self.selections.iter().position(|selection| {
            selection.column_ref.table.eq_ignore_ascii_case(&column_ref.table)
                && selection.column_ref.column.eq_ignore_ascii_case(&column_ref.column)
        })
    }

    fn get_mut(&mut self, column_ref: &ColumnRef) -> Result<&mut Selection, SelectionError> {
        let position = self
            .position(column_ref)
            .ok_or_else(|| SelectionError::ColumnNotSelected(column_ref.clone()))?;
        Ok(&mut self.selections[position])
    }
}

#[cfg(test)]
mod test {
    use super::{ResultOperation, SelectionError, SelectionState, NO_FILTER};
    use crate::semantic_model::index::ColumnRef;
    use crate::semantic_model::{load, ColumnKind, MetadataIndex};
    use rstest::*;
    use std::sync::Arc;

    #[fixture]
    fn index() -> MetadataIndex {
        let model = load(
            r#"
tables:
  - name: FINANCE
    dimensions:
      - name: REGION
    time_dimensions:
      - name: FISCAL_YEAR
    facts:
      - name: SALES
"#,
        )
        .unwrap();
        MetadataIndex::new(Arc::new(model))
    }

    fn col(name: &str) -> ColumnRef {
        ColumnRef::new("FINANCE", name)
    }

    #[rstest]
    fn test_toggle_assigns_kind_defaults(index: MetadataIndex) {
        let mut state = SelectionState::new();
        for name in ["SALES", "REGION", "FISCAL_YEAR"] {
            state.toggle(&index.resolve(&col(name)).unwrap());
        }

        let ops: Vec<ResultOperation> = state.iter().map(|s| s.result_operation).collect();
        assert_eq!(
            ops,
            vec![
                ResultOperation::Sum,
                ResultOperation::GroupBy,
                ResultOperation::GroupBy
            ]
        );
        assert!(state.iter().all(|s| s.filter_text == NO_FILTER));
    }

    #[rstest]
    fn test_untoggle_keeps_order_of_survivors(index: MetadataIndex) {
        let mut state = SelectionState::new();
        for name in ["SALES", "REGION", "FISCAL_YEAR"] {
            state.toggle(&index.resolve(&col(name)).unwrap());
        }
        state.toggle(&index.resolve(&col("REGION")).unwrap());

        let order: Vec<&str> = state.iter().map(|s| s.column_ref.column.as_str()).collect();
        assert_eq!(order, vec!["SALES", "FISCAL_YEAR"]);

        state.toggle(&index.resolve(&col("REGION")).unwrap());
        let order: Vec<&str> = state.iter().map(|s| s.column_ref.column.as_str()).collect();
        assert_eq!(order, vec!["SALES", "FISCAL_YEAR", "REGION"]);
    }

    #[rstest]
    #[case::id("avg", ResultOperation::Avg)]
    #[case::label("Group By", ResultOperation::GroupBy)]
    #[case::apostrophe_label("Don't Show", ResultOperation::DontShow)]
    #[case::mixed_case("TRUNCATE to month", ResultOperation::TruncateToMonth)]
    #[case::word("average", ResultOperation::Avg)]
    fn test_parse_operation(#[case] text: &str, #[case] expected: ResultOperation) {
        assert_eq!(text.parse::<ResultOperation>().unwrap(), expected);
    }

    #[rstest]
    fn test_invalid_operation_leaves_selection_unchanged(index: MetadataIndex) {
        let mut state = SelectionState::new();
        state.toggle(&index.resolve(&col("SALES")).unwrap());

        let err = state.set_operation_str(&col("SALES"), "median").unwrap_err();
        assert_eq!(err, SelectionError::InvalidOperation("median".to_string()));
        assert_eq!(
            state.get(&col("SALES")).unwrap().result_operation,
            ResultOperation::Sum
        );
    }

    #[rstest]
    fn test_group_by_on_fact_is_permitted(index: MetadataIndex) {
        let mut state = SelectionState::new();
        state.toggle(&index.resolve(&col("SALES")).unwrap());
        state
            .set_operation(&col("SALES"), ResultOperation::GroupBy)
            .unwrap();
        assert!(state.get(&col("SALES")).unwrap().result_operation.is_grouping());
    }

    #[rstest]
    fn test_mutating_unselected_column_is_rejected(index: MetadataIndex) {
        let mut state = SelectionState::new();
        state.toggle(&index.resolve(&col("SALES")).unwrap());
        let before = state.clone();

        assert_eq!(
            state.set_filter(&col("REGION"), "EMEA"),
            Err(SelectionError::ColumnNotSelected(col("REGION")))
        );
        assert_eq!(
            state.set_operation(&col("REGION"), ResultOperation::Count),
            Err(SelectionError::ColumnNotSelected(col("REGION")))
        );
        assert_eq!(state, before);
    }

    #[rstest]
    #[case::empty("", NO_FILTER)]
    #[case::blank("   ", NO_FILTER)]
    #[case::text("= 2021", "= 2021")]
    fn test_set_filter_normalizes_blank_text(
        index: MetadataIndex,
        #[case] text: &str,
        #[case] expected: &str,
    ) {
        let mut state = SelectionState::new();
        state.toggle(&index.resolve(&col("FISCAL_YEAR")).unwrap());
        state.set_filter(&col("fiscal_year"), text).unwrap();
        assert_eq!(state.get(&col("FISCAL_YEAR")).unwrap().filter_text, expected);
    }

    #[test]
    fn test_menus_follow_kind() {
        assert!(ResultOperation::menu_for(ColumnKind::Fact).contains(&ResultOperation::Sum));
        assert!(!ResultOperation::menu_for(ColumnKind::Dimension).contains(&ResultOperation::Sum));
        assert!(ResultOperation::menu_for(ColumnKind::TimeDimension)
            .contains(&ResultOperation::TruncateToDay));
    }
}
