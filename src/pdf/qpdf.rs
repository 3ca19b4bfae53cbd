//! qpdf FFI wrapper for template preparation
//!
//! Court forms are commonly published as XFA/AcroForm hybrids and locked
//! with an owner password. Before PDFium fills a template, qpdf produces an
//! unencrypted in-memory copy with the XFA packet removed so viewers render
//! the AcroForm values. Radio groups and choice fields are selected here as
//! well, by writing `/V` and the widget `/AS` states directly.

use crate::error::{Error, Result};
use crate::form::RenderValues;
use qpdf::{QPdf, QPdfArray, QPdfDictionary, QPdfObjectLike, QPdfObjectType, QPdfScalar};

/// `/Ff` bit marking a button field as a radio group
const FF_RADIO: i64 = 1 << 15;
/// `/Ff` bit allowing free text in a combo box
const FF_EDIT: i64 = 1 << 18;
/// Field trees deeper than this are not walked
const MAX_FIELD_DEPTH: usize = 32;

/// Radio and choice values applied while preparing a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSelection {
    /// Field names that were selected
    pub selected: Vec<String>,
    /// Field names with the reason they were not selected
    pub rejected: Vec<(String, String)>,
}

impl OptionSelection {
    /// Whether `name` was handled here, successfully or not
    pub fn handled(&self, name: &str) -> bool {
        self.selected.iter().any(|n| n == name) || self.rejected.iter().any(|(n, _)| n == name)
    }
}

/// A field dictionary that carries a value, with inherited attributes resolved
struct TerminalField {
    name: String,
    dict: QPdfDictionary,
    field_type: Option<String>,
    flags: i64,
}

/// Map qpdf crate errors to our error types
fn map_qpdf_error(e: qpdf::QPdfError) -> Error {
    Error::QpdfError {
        reason: e.to_string(),
    }
}

/// Produce a fillable copy of a template.
///
/// - drops `/XFA` from the AcroForm dictionary
/// - sets `/NeedAppearances true`
/// - writes without the source encryption
pub fn prepare_template(input_data: &[u8]) -> Result<Vec<u8>> {
    prepare_with_options(input_data, &RenderValues::new()).map(|(data, _)| data)
}

/// [`prepare_template`], also selecting every radio group and choice field
/// whose name is a key of `values`. Other keys are ignored.
pub fn prepare_with_options(
    input_data: &[u8],
    values: &RenderValues,
) -> Result<(Vec<u8>, OptionSelection)> {
    let qpdf = QPdf::read_from_memory(input_data).map_err(map_qpdf_error)?;
    let mut selection = OptionSelection::default();

    match qpdf.get_root().and_then(|root| root.get("/AcroForm")) {
        Some(acroform) => {
            let acroform: QPdfDictionary = acroform.into();
            if acroform.has("/XFA") {
                tracing::debug!("Removing XFA packet from template");
                acroform.remove("/XFA");
            }
            acroform.set("/NeedAppearances", qpdf.new_bool(true));

            if !values.is_empty() {
                select_options(&qpdf, &acroform, values, &mut selection);
            }
        }
        None => {
            tracing::warn!("Template has no AcroForm dictionary; nothing will be filled");
        }
    }

    let mut writer = qpdf.writer();
    writer.preserve_encryption(false);
    let data = writer.write_to_memory().map_err(map_qpdf_error)?;
    Ok((data, selection))
}

fn select_options(
    qpdf: &QPdf,
    acroform: &QPdfDictionary,
    values: &RenderValues,
    selection: &mut OptionSelection,
) {
    let Some(fields) = acroform.get("/Fields") else {
        return;
    };

    let mut terminals = Vec::new();
    for field in QPdfArray::from(fields).iter() {
        collect_terminal_fields(field.into(), None, None, 0, 0, &mut terminals);
    }

    for field in &terminals {
        let Some(value) = values.get(&field.name) else {
            continue;
        };

        let outcome = match field.field_type.as_deref() {
            Some("/Btn") if field.flags & FF_RADIO != 0 => select_radio(qpdf, field, value),
            Some("/Ch") => select_choice(qpdf, field, value),
            _ => continue,
        };

        match outcome {
            Ok(()) => selection.selected.push(field.name.clone()),
            Err(reason) => {
                tracing::warn!(field = %field.name, %reason, "Option not selected");
                selection.rejected.push((field.name.clone(), reason));
            }
        }
    }
}

fn collect_terminal_fields(
    field: QPdfDictionary,
    parent: Option<&str>,
    field_type: Option<String>,
    flags: i64,
    depth: usize,
    out: &mut Vec<TerminalField>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }

    let name = match (parent, field.get("/T").map(|t| t.as_string())) {
        (Some(parent), Some(partial)) => format!("{}.{}", parent, partial),
        (None, Some(partial)) => partial,
        (Some(parent), None) => parent.to_string(),
        (None, None) => String::new(),
    };
    let field_type = field.get("/FT").map(|ft| ft.as_name()).or(field_type);
    let flags = field
        .get("/Ff")
        .map(|ff| QPdfScalar::from(ff).as_i64())
        .unwrap_or(flags);

    let kids = child_dictionaries(&field);
    if kids.iter().any(|kid| kid.has("/T")) {
        for kid in kids.into_iter().filter(|kid| kid.has("/T")) {
            collect_terminal_fields(kid, Some(&name), field_type.clone(), flags, depth + 1, out);
        }
    } else {
        out.push(TerminalField {
            name,
            dict: field,
            field_type,
            flags,
        });
    }
}

fn child_dictionaries(field: &QPdfDictionary) -> Vec<QPdfDictionary> {
    field
        .get("/Kids")
        .map(|kids| QPdfArray::from(kids).iter().map(QPdfDictionary::from).collect())
        .unwrap_or_default()
}

/// Widget annotations of a terminal field: its kids, or the field itself
fn widgets(field: &TerminalField) -> Vec<QPdfDictionary> {
    let kids = child_dictionaries(&field.dict);
    if kids.is_empty() {
        vec![QPdfDictionary::from(field.dict.as_object().clone())]
    } else {
        kids
    }
}

/// The non-`/Off` state of a widget's normal appearance
fn on_state(widget: &QPdfDictionary) -> Option<String> {
    let normal: QPdfDictionary = widget
        .get("/AP")
        .map(QPdfDictionary::from)?
        .get("/N")?
        .into();
    normal.keys().into_iter().find(|key| key != "/Off")
}

fn select_radio(qpdf: &QPdf, field: &TerminalField, value: &str) -> std::result::Result<(), String> {
    let target = if value.starts_with('/') {
        value.to_string()
    } else {
        format!("/{}", value)
    };

    let widgets = widgets(field);
    let states: Vec<Option<String>> = widgets.iter().map(on_state).collect();
    if !states.iter().any(|state| state.as_deref() == Some(target.as_str())) {
        return Err(format!("No radio option {}", value));
    }

    field.dict.set("/V", qpdf.new_name(&target));
    for (widget, state) in widgets.iter().zip(&states) {
        let appearance = if state.as_deref() == Some(target.as_str()) {
            target.as_str()
        } else {
            "/Off"
        };
        widget.set("/AS", qpdf.new_name(appearance));
    }
    Ok(())
}

/// `(export value, display text)` pairs from `/Opt`
fn choice_options(field: &QPdfDictionary) -> Vec<(String, String)> {
    let Some(options) = field.get("/Opt") else {
        return Vec::new();
    };

    QPdfArray::from(options)
        .iter()
        .filter_map(|option| {
            if option.get_type() != QPdfObjectType::Array {
                let text = option.as_string();
                return Some((text.clone(), text));
            }
            let pair = QPdfArray::from(option);
            let export = pair.get(0)?.as_string();
            let display = pair.get(1).map(|d| d.as_string()).unwrap_or_else(|| export.clone());
            Some((export, display))
        })
        .collect()
}

fn select_choice(qpdf: &QPdf, field: &TerminalField, value: &str) -> std::result::Result<(), String> {
    let export = choice_options(&field.dict)
        .into_iter()
        .find(|(export, display)| export == value || display == value)
        .map(|(export, _)| export);

    let export = match export {
        Some(export) => export,
        None if field.flags & FF_EDIT != 0 => value.to_string(),
        None => return Err(format!("No choice option {}", value)),
    };

    field.dict.set("/V", qpdf.new_utf8_string(&export.replace('\0', "")));
    // Selected indices would override /V in some viewers
    field.dict.remove("/I");
    Ok(())
}

/// Get the page count of a PDF
pub fn page_count(input_data: &[u8]) -> Result<u32> {
    let qpdf = QPdf::read_from_memory(input_data).map_err(map_qpdf_error)?;
    qpdf.get_num_pages().map_err(map_qpdf_error)
}
