//! Field mapping table
//!
//! A [`FormSchema`] is the explicit list of widgets the service writes to,
//! each paired with the web form name it is read from. It is built once at
//! startup, checked against the template's widgets, and shared read-only.

use crate::error::{Error, Result};
use crate::pdf::{WidgetInfo, WidgetKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Checkbox value written for a checked box
pub const CHECKBOX_ON: &str = "Yes";
/// Checkbox value written for an unchecked box
pub const CHECKBOX_OFF: &str = "Off";

/// Web field name → submitted value
pub type SubmissionValues = BTreeMap<String, String>;

/// PDF widget identifier → value to write
pub type RenderValues = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Checkbox,
    /// Text widget holding a date; ISO input is written as `M/D/YYYY`
    Date,
    /// Radio group; the value names the selected option's state
    Radio,
    /// Combo or list box; the value is an option's export or display text
    Choice,
}

impl FieldKind {
    fn accepts(self, widget: WidgetKind) -> bool {
        matches!(
            (self, widget),
            (FieldKind::Text | FieldKind::Date, WidgetKind::Text)
                | (FieldKind::Checkbox, WidgetKind::Checkbox)
                | (FieldKind::Radio, WidgetKind::RadioButton)
                | (FieldKind::Choice, WidgetKind::ComboBox | WidgetKind::ListBox)
        )
    }
}

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Fully qualified widget name inside the PDF
    pub widget_id: String,
    /// Name of the matching input on the web form
    pub external_name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub label: String,
    /// Heading the field is grouped under on the input page
    #[serde(default)]
    pub section: String,
    /// Values offered on the input page for radio and choice fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl FieldSpec {
    /// A field whose widget id and web name coincide
    pub fn identity(name: &str, kind: FieldKind, label: &str, section: &str) -> Self {
        Self::mapped(name, name, kind, label, section)
    }

    pub fn mapped(
        widget_id: &str,
        external_name: &str,
        kind: FieldKind,
        label: &str,
        section: &str,
    ) -> Self {
        Self {
            widget_id: widget_id.to_string(),
            external_name: external_name.to_string(),
            kind,
            label: label.to_string(),
            section: section.to_string(),
            options: Vec::new(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// The repeated children group: parallel name / date-of-birth inputs
/// flattened into `{name_key}_{i}` and `{dob_key}_{i}` for i in `1..=slots`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildGroup {
    pub name_key: String,
    pub dob_key: String,
    pub slots: usize,
}

impl ChildGroup {
    pub fn name_key_at(&self, index: usize) -> String {
        format!("{}_{}", self.name_key, index)
    }

    pub fn dob_key_at(&self, index: usize) -> String {
        format!("{}_{}", self.dob_key, index)
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    fields: Vec<FieldSpec>,
    #[serde(default)]
    children: Option<ChildGroup>,
}

/// Validated mapping table
#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<FieldSpec>,
    children: Option<ChildGroup>,
}

const ATTORNEY: &str = "Attorney or party without attorney";
const CASE: &str = "Case";
const HEARING: &str = "Hearing";
const ORDERS: &str = "Orders requested";
const SIGNATURE: &str = "Signature";

/// Built-in table for the bundled Request for Order template
const BUILTIN_FIELDS: &[(&str, FieldKind, &str, &str)] = &[
    ("cname1", FieldKind::Text, "Name", ATTORNEY),
    ("cbarno", FieldKind::Text, "State bar number", ATTORNEY),
    ("cfirm", FieldKind::Text, "Firm name", ATTORNEY),
    ("cstreet", FieldKind::Text, "Street address", ATTORNEY),
    ("City", FieldKind::Text, "City", ATTORNEY),
    ("State", FieldKind::Text, "State", ATTORNEY),
    ("Zip", FieldKind::Text, "Zip code", ATTORNEY),
    ("cphone", FieldKind::Text, "Telephone", ATTORNEY),
    ("cemail", FieldKind::Text, "Email address", ATTORNEY),
    ("cattyfor", FieldKind::Text, "Attorney for", ATTORNEY),
    ("ccounty", FieldKind::Text, "Superior Court of California, County of", CASE),
    ("cpet1", FieldKind::Text, "Petitioner", CASE),
    ("cresp1", FieldKind::Text, "Respondent", CASE),
    ("cother", FieldKind::Text, "Other parent/party", CASE),
    ("ccase", FieldKind::Text, "Case number", CASE),
    ("hearing_date", FieldKind::Date, "Hearing date", HEARING),
    ("hearing_time", FieldKind::Text, "Hearing time", HEARING),
    ("hearing_dept", FieldKind::Text, "Department", HEARING),
    ("hearing_room", FieldKind::Text, "Room", HEARING),
    ("req_custody", FieldKind::Checkbox, "Child custody", ORDERS),
    ("req_visitation", FieldKind::Checkbox, "Visitation (parenting time)", ORDERS),
    ("req_child_support", FieldKind::Checkbox, "Child support", ORDERS),
    ("req_spousal_support", FieldKind::Checkbox, "Spousal support", ORDERS),
    ("req_property_control", FieldKind::Checkbox, "Property control", ORDERS),
    ("req_attorney_fees", FieldKind::Checkbox, "Attorney's fees and costs", ORDERS),
    ("req_other", FieldKind::Checkbox, "Other", ORDERS),
    ("req_other_text", FieldKind::Text, "Other orders requested", ORDERS),
    ("csig_date", FieldKind::Text, "Date", SIGNATURE),
    ("csig_name", FieldKind::Text, "Type or print name", SIGNATURE),
];

const BUILTIN_CHILD_SLOTS: usize = 4;

impl FormSchema {
    /// Build a schema, rejecting duplicate names and incomplete child groups
    pub fn new(fields: Vec<FieldSpec>, children: Option<ChildGroup>) -> Result<Self> {
        let mut widget_ids = HashSet::new();
        let mut external_names = HashSet::new();

        for field in &fields {
            if field.widget_id.trim().is_empty() || field.external_name.trim().is_empty() {
                return Err(Error::Schema {
                    reason: "field with empty widget_id or external_name".to_string(),
                });
            }
            if !widget_ids.insert(field.widget_id.as_str()) {
                return Err(Error::Schema {
                    reason: format!("duplicate widget_id {}", field.widget_id),
                });
            }
            if !external_names.insert(field.external_name.as_str()) {
                return Err(Error::Schema {
                    reason: format!("duplicate external_name {}", field.external_name),
                });
            }
        }

        if let Some(group) = &children {
            for i in 1..=group.slots {
                for key in [group.name_key_at(i), group.dob_key_at(i)] {
                    let is_text = fields
                        .iter()
                        .any(|f| f.external_name == key && f.kind == FieldKind::Text);
                    if !is_text {
                        return Err(Error::Schema {
                            reason: format!("child slot {} has no text field", key),
                        });
                    }
                }
            }
        }

        Ok(Self { fields, children })
    }

    /// Schema for the bundled template, identity-mapped
    pub fn builtin() -> Self {
        let mut fields: Vec<FieldSpec> = BUILTIN_FIELDS
            .iter()
            .map(|(name, kind, label, section)| FieldSpec::identity(name, *kind, label, section))
            .collect();

        let children = ChildGroup {
            name_key: "childName".to_string(),
            dob_key: "childDOB".to_string(),
            slots: BUILTIN_CHILD_SLOTS,
        };
        for i in 1..=children.slots {
            fields.push(FieldSpec::identity(
                &children.name_key_at(i),
                FieldKind::Text,
                &format!("Child {} name", i),
                "Children",
            ));
            fields.push(FieldSpec::identity(
                &children.dob_key_at(i),
                FieldKind::Text,
                &format!("Child {} date of birth", i),
                "Children",
            ));
        }

        Self {
            fields,
            children: Some(children),
        }
    }

    /// Parse a schema from its JSON representation
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SchemaFile = serde_json::from_str(json)?;
        Self::new(file.fields, file.children)
    }

    /// Load a schema from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn children(&self) -> Option<&ChildGroup> {
        self.children.as_ref()
    }

    pub fn field_by_external(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.external_name == name)
    }

    /// Whether a key belongs to the children group's indexed slots
    pub fn is_child_slot(&self, external_name: &str) -> bool {
        self.children.as_ref().is_some_and(|group| {
            (1..=group.slots)
                .any(|i| group.name_key_at(i) == external_name || group.dob_key_at(i) == external_name)
        })
    }

    /// Check that every schema field exists in the template with a compatible kind.
    ///
    /// Template widgets the schema does not mention are allowed and left untouched.
    pub fn validate_against(&self, widgets: &[WidgetInfo]) -> Result<()> {
        let mut missing = Vec::new();
        let mut wrong_kind = Vec::new();

        for field in &self.fields {
            let found: Vec<&WidgetInfo> = widgets
                .iter()
                .filter(|w| w.name.as_deref() == Some(field.widget_id.as_str()))
                .collect();

            if found.is_empty() {
                missing.push(field.widget_id.clone());
            } else if !found.iter().all(|w| field.kind.accepts(w.kind)) {
                wrong_kind.push(field.widget_id.clone());
            }
        }

        for widget in widgets {
            let covered = widget
                .name
                .as_deref()
                .is_some_and(|name| self.fields.iter().any(|f| f.widget_id == name));
            if !covered {
                tracing::debug!(widget = ?widget.name, page = widget.page, "Template widget not in schema");
            }
        }

        if missing.is_empty() && wrong_kind.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaMismatch {
                missing,
                wrong_kind,
            })
        }
    }

    /// Derive widget values from submission values.
    ///
    /// Empty values are left out so the widget keeps its template default.
    /// Checkboxes are always written and normalized to "Yes"/"Off".
    pub fn render_values(&self, values: &SubmissionValues) -> RenderValues {
        let mut render = RenderValues::new();

        for field in &self.fields {
            let value = values
                .get(&field.external_name)
                .map(String::as_str)
                .unwrap_or("");

            match field.kind {
                FieldKind::Text | FieldKind::Date | FieldKind::Radio | FieldKind::Choice => {
                    if !value.is_empty() {
                        render.insert(field.widget_id.clone(), value.to_string());
                    }
                }
                FieldKind::Checkbox => {
                    let state = if value == CHECKBOX_ON {
                        CHECKBOX_ON
                    } else {
                        CHECKBOX_OFF
                    };
                    render.insert(field.widget_id.clone(), state.to_string());
                }
            }
        }

        render
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn widget(name: &str, kind: WidgetKind) -> WidgetInfo {
        WidgetInfo {
            page: 1,
            name: Some(name.to_string()),
            kind,
            value: None,
            is_checked: None,
        }
    }

    #[test]
    fn test_builtin_schema_is_consistent() {
        let builtin = FormSchema::builtin();
        let rebuilt = FormSchema::new(builtin.fields().to_vec(), builtin.children().cloned());
        assert!(rebuilt.is_ok());
        assert!(builtin.field_by_external("childName_4").is_some());
        assert!(builtin.field_by_external("childName_5").is_none());
        assert!(builtin.is_child_slot("childDOB_2"));
        assert!(!builtin.is_child_slot("cname1"));
    }

    #[test]
    fn test_duplicate_widget_rejected() {
        let fields = vec![
            FieldSpec::mapped("w1", "a", FieldKind::Text, "", ""),
            FieldSpec::mapped("w1", "b", FieldKind::Text, "", ""),
        ];
        assert!(matches!(FormSchema::new(fields, None), Err(Error::Schema { .. })));
    }

    #[test]
    fn test_child_group_requires_slots() {
        let fields = vec![FieldSpec::identity("kid_1", FieldKind::Text, "", "")];
        let group = ChildGroup {
            name_key: "kid".to_string(),
            dob_key: "kidDob".to_string(),
            slots: 1,
        };
        assert!(matches!(
            FormSchema::new(fields, Some(group)),
            Err(Error::Schema { .. })
        ));
    }

    #[test]
    fn test_from_json_mapping() {
        let json = r#"{
            "fields": [
                {"widget_id": "FL-300[0].Page1[0].AttyName[0]", "external_name": "attorney_name", "kind": "text"},
                {"widget_id": "FL-300[0].Page2[0].Custody[0]", "external_name": "custody", "kind": "checkbox", "label": "Custody"}
            ]
        }"#;
        let schema = FormSchema::from_json(json).unwrap();
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.children().is_none());

        let mut values = SubmissionValues::new();
        values.insert("attorney_name".to_string(), "Jane Doe".to_string());
        values.insert("custody".to_string(), CHECKBOX_ON.to_string());

        let render = schema.render_values(&values);
        assert_eq!(
            render.get("FL-300[0].Page1[0].AttyName[0]").map(String::as_str),
            Some("Jane Doe")
        );
        assert_eq!(
            render.get("FL-300[0].Page2[0].Custody[0]").map(String::as_str),
            Some("Yes")
        );
    }

    #[test]
    fn test_render_values_skips_empty_text_and_normalizes_checkboxes() {
        let schema = FormSchema::new(
            vec![
                FieldSpec::identity("cname1", FieldKind::Text, "", ""),
                FieldSpec::identity("ccounty", FieldKind::Text, "", ""),
                FieldSpec::identity("req_custody", FieldKind::Checkbox, "", ""),
                FieldSpec::identity("req_other", FieldKind::Checkbox, "", ""),
            ],
            None,
        )
        .unwrap();

        let mut values = SubmissionValues::new();
        values.insert("cname1".to_string(), "Jane Doe".to_string());
        values.insert("ccounty".to_string(), String::new());
        values.insert("req_custody".to_string(), "garbage".to_string());
        values.insert("unknown".to_string(), "ignored".to_string());

        let render = schema.render_values(&values);
        let expected: RenderValues = [
            ("cname1", "Jane Doe"),
            ("req_custody", "Off"),
            ("req_other", "Off"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(render, expected);
    }

    #[test]
    fn test_validate_against_reports_missing_and_wrong_kind() {
        let schema = FormSchema::new(
            vec![
                FieldSpec::identity("cname1", FieldKind::Text, "", ""),
                FieldSpec::identity("req_custody", FieldKind::Checkbox, "", ""),
                FieldSpec::identity("ccase", FieldKind::Text, "", ""),
            ],
            None,
        )
        .unwrap();

        let widgets = vec![
            widget("cname1", WidgetKind::Text),
            widget("req_custody", WidgetKind::Text),
            widget("clerk_stamp", WidgetKind::Text),
        ];

        match schema.validate_against(&widgets) {
            Err(Error::SchemaMismatch {
                missing,
                wrong_kind,
            }) => {
                assert_eq!(missing, vec!["ccase".to_string()]);
                assert_eq!(wrong_kind, vec!["req_custody".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_option_kinds_match_their_widgets() {
        let schema = FormSchema::new(
            vec![
                FieldSpec::identity("hearing_date", FieldKind::Date, "", ""),
                FieldSpec::identity("custody_type", FieldKind::Radio, "", "")
                    .with_options(["Joint", "Sole"]),
                FieldSpec::identity("county", FieldKind::Choice, "", ""),
                FieldSpec::identity("court", FieldKind::Choice, "", ""),
            ],
            None,
        )
        .unwrap();

        let widgets = vec![
            widget("hearing_date", WidgetKind::Text),
            widget("custody_type", WidgetKind::RadioButton),
            widget("custody_type", WidgetKind::RadioButton),
            widget("county", WidgetKind::ComboBox),
            widget("court", WidgetKind::ListBox),
        ];
        assert!(schema.validate_against(&widgets).is_ok());

        let widgets = vec![
            widget("hearing_date", WidgetKind::Text),
            widget("custody_type", WidgetKind::Checkbox),
            widget("county", WidgetKind::Text),
            widget("court", WidgetKind::ListBox),
        ];
        match schema.validate_against(&widgets) {
            Err(Error::SchemaMismatch { wrong_kind, .. }) => {
                assert_eq!(
                    wrong_kind,
                    vec!["custody_type".to_string(), "county".to_string()]
                );
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_option_kinds_from_json() {
        let schema = FormSchema::from_json(
            r#"{"fields": [
                {"widget_id": "custody_type", "external_name": "custody_type", "kind": "radio", "options": ["Joint", "Sole"]},
                {"widget_id": "county", "external_name": "county", "kind": "choice"},
                {"widget_id": "hearing", "external_name": "hearing", "kind": "date"}
            ]}"#,
        )
        .unwrap();

        let kinds: Vec<FieldKind> = schema.fields().iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FieldKind::Radio, FieldKind::Choice, FieldKind::Date]);
        assert_eq!(schema.fields()[0].options, vec!["Joint", "Sole"]);

        let mut values = SubmissionValues::new();
        values.insert("custody_type".to_string(), "Sole".to_string());
        values.insert("county".to_string(), String::new());
        let render = schema.render_values(&values);
        assert_eq!(render.get("custody_type").map(String::as_str), Some("Sole"));
        assert!(!render.contains_key("county"));
        assert!(!render.contains_key("hearing"));
    }

    #[test]
    fn test_validate_against_accepts_extra_widgets() {
        let schema = FormSchema::new(
            vec![FieldSpec::identity("cname1", FieldKind::Text, "", "")],
            None,
        )
        .unwrap();
        let widgets = vec![
            widget("cname1", WidgetKind::Text),
            widget("clerk_stamp", WidgetKind::Text),
        ];
        assert!(schema.validate_against(&widgets).is_ok());
    }
}
