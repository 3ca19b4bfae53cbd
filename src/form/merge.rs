//! Merging LLM completions into submitted values

use super::schema::{FieldKind, FormSchema, SubmissionValues};
use std::collections::BTreeMap;

/// Field values proposed by the completion service, keyed by web field name
pub type Completions = BTreeMap<String, String>;

/// Outcome of a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub values: SubmissionValues,
    /// Keys whose value came from a completion
    pub filled: Vec<String>,
    /// Completion keys that were not applied
    pub rejected: Vec<String>,
}

/// Apply completions to the submission, filling only what is missing.
///
/// A completion is applied when its key is a text field of the schema and the
/// submitted value is empty. Checkboxes and non-empty values are never touched.
pub fn merge_completions(
    schema: &FormSchema,
    values: &SubmissionValues,
    completions: &Completions,
) -> MergeOutcome {
    let mut merged = values.clone();
    let mut filled = Vec::new();
    let mut rejected = Vec::new();

    for (key, proposed) in completions {
        let proposed = proposed.trim();
        let is_text_field = schema
            .field_by_external(key)
            .is_some_and(|f| f.kind == FieldKind::Text);
        let is_missing = merged.get(key).map_or(true, |v| v.trim().is_empty());

        if is_text_field && is_missing && !proposed.is_empty() {
            merged.insert(key.clone(), proposed.to_string());
            filled.push(key.clone());
        } else {
            rejected.push(key.clone());
        }
    }

    MergeOutcome {
        values: merged,
        filled,
        rejected,
    }
}
