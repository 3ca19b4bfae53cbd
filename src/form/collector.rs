//! Form value collection
//!
//! Turns a raw urlencoded submission into [`SubmissionValues`]: one entry
//! per schema field, with the repeated children inputs expanded into their
//! indexed slots.

use super::schema::{FieldKind, FormSchema, SubmissionValues, CHECKBOX_OFF, CHECKBOX_ON};
use chrono::{Datelike, NaiveDate};

/// Older form pages post children under these names
const LEGACY_CHILD_NAME_INPUT: &str = "child_name[]";
const LEGACY_CHILD_DOB_INPUT: &str = "child_date_of_birth[]";

/// Ordered multi-map of submitted `(name, value)` pairs
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pairs: Vec<(String, String)>,
}

impl Submission {
    /// Decode an `application/x-www-form-urlencoded` body
    pub fn from_urlencoded(body: &[u8]) -> Self {
        Self {
            pairs: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// First value submitted under `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value submitted under `name`, in submission order
    pub fn all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Checkbox convention: present with any non-empty value
    pub fn is_checked(&self, name: &str) -> bool {
        self.all(name).any(|v| !v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Pair child names with dates of birth position by position.
///
/// The shorter list is padded with empty strings. Rows where both sides are
/// blank are dropped so the remaining rows number consecutively.
pub fn pair_children(names: &[&str], dobs: &[&str]) -> Vec<(String, String)> {
    let rows = names.len().max(dobs.len());

    (0..rows)
        .map(|i| {
            let name = names.get(i).map(|s| s.trim()).unwrap_or("");
            let dob = dobs.get(i).map(|s| s.trim()).unwrap_or("");
            (name.to_string(), dob.to_string())
        })
        .filter(|(name, dob)| !(name.is_empty() && dob.is_empty()))
        .collect()
}

/// Rewrite an ISO `YYYY-MM-DD` date as `M/D/YYYY`; anything else is returned unchanged
pub fn normalize_date(value: &str) -> String {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => format!("{}/{}/{}", date.month(), date.day(), date.year()),
        Err(_) => value.to_string(),
    }
}

/// Build the complete value map for a submission. Never fails: anything not
/// submitted defaults to "Off" for checkboxes and an empty string otherwise.
pub fn collect_values(schema: &FormSchema, submission: &Submission) -> SubmissionValues {
    let mut values = SubmissionValues::new();

    for field in schema.fields() {
        let submitted = submission
            .first(&field.external_name)
            .map(str::trim)
            .unwrap_or("");
        let value = match field.kind {
            FieldKind::Text | FieldKind::Radio | FieldKind::Choice => submitted.to_string(),
            FieldKind::Date => normalize_date(submitted),
            FieldKind::Checkbox => {
                if submission.is_checked(&field.external_name) {
                    CHECKBOX_ON.to_string()
                } else {
                    CHECKBOX_OFF.to_string()
                }
            }
        };
        values.insert(field.external_name.clone(), value);
    }

    let Some(group) = schema.children() else {
        return values;
    };

    let name_input = format!("{}[]", group.name_key);
    let dob_input = format!("{}[]", group.dob_key);
    let names: Vec<&str> = submission
        .all(&name_input)
        .chain(submission.all(LEGACY_CHILD_NAME_INPUT))
        .collect();
    let dobs: Vec<&str> = submission
        .all(&dob_input)
        .chain(submission.all(LEGACY_CHILD_DOB_INPUT))
        .collect();

    // Flat indexed inputs stand unless a repeated row carries a value
    let rows = pair_children(&names, &dobs);
    if rows.is_empty() {
        return values;
    }
    if rows.len() > group.slots {
        tracing::warn!(
            submitted = rows.len(),
            slots = group.slots,
            "More children submitted than the form has room for; extra rows dropped"
        );
    }

    for i in 1..=group.slots {
        let (name, dob) = rows.get(i - 1).cloned().unwrap_or_default();
        values.insert(group.name_key_at(i), name);
        values.insert(group.dob_key_at(i), dob);
    }

    values
}
