pub mod classifier;
pub mod selector;
pub mod value;

pub use classifier::{chart_row_limit, classify, classify_result, ShapeDescriptor};
pub use selector::{select, ChartArchetype, ChartAssignment, ChartRole};
pub use value::{ResultColumn, ResultSet, ResultType, Value};

/// Classify a raw result and pick its chart in one step.
pub fn recommend(result: &ResultSet) -> (ShapeDescriptor, ChartAssignment) {
    let shape = classify_result(result);
    let assignment = select(&shape);
    (shape, assignment)
}
