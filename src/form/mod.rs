//! Form data layer
//!
//! The mapping table, submission collection, and completion merging.

mod collector;
mod merge;
mod schema;

pub use collector::{collect_values, normalize_date, pair_children, Submission};
pub use merge::{merge_completions, Completions, MergeOutcome};
pub use schema::{
    ChildGroup, FieldKind, FieldSpec, FormSchema, RenderValues, SubmissionValues, CHECKBOX_OFF,
    CHECKBOX_ON,
};
