//! Natural-language prompt synthesis from column selections.
//!
//! The output is read by a language model, so columns are named by their
//! business labels (descriptions) rather than physical identifiers.

use crate::selection::{ResultOperation, Selection, SelectionState};
use crate::semantic_model::MetadataIndex;

/// Returned when no selected column is shown.
pub const EMPTY_PROMPT: &str =
    "No columns selected to show. Select at least one column with an operation other than \"Don't Show\".";

/// Render the selection as a single English request.
///
/// Filter clauses come first, then the display clause, then the grouped-by
/// clause. Columns keep their selection order within every clause.
pub fn synthesize(selection_state: &SelectionState, index: &MetadataIndex) -> String {
    let mut filter_parts = Vec::new();
    let mut shown_parts = Vec::new();
    let mut grouped_parts = Vec::new();

    for selection in selection_state.iter() {
        let qualified = qualified_name(selection, index);

        if selection.has_filter() {
            filter_parts.push(format!("For {} {}", qualified, selection.filter_text.trim()));
        }

        let op = selection.result_operation;
        if !op.is_shown() {
            continue;
        }
        let rendered = render_column(op, &qualified);
        if op.is_grouping() {
            grouped_parts.push(rendered.clone());
        }
        shown_parts.push(rendered);
    }

    if shown_parts.is_empty() {
        return EMPTY_PROMPT.to_string();
    }

    let mut prompt = String::new();
    if !filter_parts.is_empty() {
        prompt.push_str(&filter_parts.join(" AND "));
        prompt.push_str(", show me ");
    } else {
        prompt.push_str("Show me ");
    }
    prompt.push_str(&shown_parts.join(", "));

    if !grouped_parts.is_empty() {
        prompt.push_str(" grouped by ");
        prompt.push_str(&grouped_parts.join(", "));
    }

    prompt
}

fn render_column(op: ResultOperation, qualified: &str) -> String {
    match op {
        ResultOperation::TruncateToDay => format!("truncate {} to day", qualified),
        ResultOperation::TruncateToMonth => format!("truncate {} to month", qualified),
        _ => match op.aggregation_word() {
            Some(word) => format!("{} of {}", word, qualified),
            None => qualified.to_string(),
        },
    }
}

fn qualified_name(selection: &Selection, index: &MetadataIndex) -> String {
    match index.resolve(&selection.column_ref) {
        Some(entry) => entry.qualified_label(),
        // Stale reference; fall back to the identifiers.
        None => format!(
            "{} {}",
            selection.column_ref.table, selection.column_ref.column
        ),
    }
}
