//! Prompt construction for field completion

use crate::form::{FieldKind, FormSchema, SubmissionValues};

pub const SYSTEM_PROMPT: &str = "You help complete a California family court Request for Order form. \
You receive the values a filer already entered. Fill in missing fields only when the value follows \
logically from the existing data (for example a state from a zip code, or a county from a city). \
Never invent names, dates, case numbers, phone numbers, or any other value that cannot be derived \
from what was provided; leave such fields as empty strings. \
Respond with a single JSON object mapping field names to string values and nothing else.";

/// Text fields that are still empty, in schema order
pub fn missing_fields<'a>(schema: &'a FormSchema, values: &SubmissionValues) -> Vec<&'a str> {
    schema
        .fields()
        .iter()
        .filter(|f| f.kind == FieldKind::Text)
        .filter(|f| {
            values
                .get(&f.external_name)
                .map_or(true, |v| v.trim().is_empty())
        })
        .map(|f| f.external_name.as_str())
        .collect()
}

/// User message carrying the current values and the fields to complete
pub fn build_user_prompt(schema: &FormSchema, values: &SubmissionValues) -> String {
    let current = serde_json::to_string_pretty(values).unwrap_or_default();

    let mut prompt = String::new();
    prompt.push_str("Current form data:\n");
    prompt.push_str(&current);
    prompt.push_str("\n\nFields you may fill in:\n");

    for name in missing_fields(schema, values) {
        match schema.field_by_external(name) {
            Some(field) if !field.label.is_empty() => {
                prompt.push_str(&format!("- {} ({})\n", name, field.label));
            }
            _ => prompt.push_str(&format!("- {}\n", name)),
        }
    }

    prompt.push_str(
        "\nReturn only a JSON object whose keys are taken from the list above. \
Omit any field you cannot determine from the current form data.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{collect_values, Submission};

    #[test]
    fn test_missing_fields_excludes_filled_and_checkboxes() {
        let schema = FormSchema::builtin();
        let values = collect_values(&schema, &Submission::from_pairs([("cname1", "Jane Doe")]));
        let missing = missing_fields(&schema, &values);

        assert!(!missing.contains(&"cname1"));
        assert!(missing.contains(&"State"));
        assert!(!missing.contains(&"req_custody"));
    }

    #[test]
    fn test_prompt_carries_values_and_labels() {
        let schema = FormSchema::builtin();
        let values = collect_values(
            &schema,
            &Submission::from_pairs([("cname1", "Jane Doe"), ("Zip", "94110")]),
        );
        let prompt = build_user_prompt(&schema, &values);

        assert!(prompt.contains("\"cname1\": \"Jane Doe\""));
        assert!(prompt.contains("- State (State)"));
        assert!(prompt.contains("- ccase (Case number)"));
        assert!(!prompt.contains("- Zip"));
    }

    #[test]
    fn test_system_prompt_forbids_fabrication() {
        assert!(SYSTEM_PROMPT.contains("Never invent"));
        assert!(SYSTEM_PROMPT.contains("JSON object"));
    }
}
