//! Form renderer backed by PDFium

use super::qpdf::prepare_with_options;
use crate::error::{Error, Result};
use crate::form::{RenderValues, CHECKBOX_OFF};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::path::Path;

/// PDFium is not thread-safe; every binding and document lives under this lock
static PDFIUM_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Kind of a fillable widget as reported by PDFium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
    Checkbox,
    RadioButton,
    ComboBox,
    ListBox,
    PushButton,
    Signature,
    Unknown,
}

/// A fillable widget read back from a document
#[derive(Debug, Clone)]
pub struct WidgetInfo {
    /// Page number (1-indexed)
    pub page: u32,
    /// Fully qualified field name
    pub name: Option<String>,
    pub kind: WidgetKind,
    /// Current value (text and choice fields)
    pub value: Option<String>,
    /// Checked state (checkboxes and radio buttons)
    pub is_checked: Option<bool>,
}

/// Rendering switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Burn widget appearances into the page content
    pub flatten: bool,
}

/// Result of filling a document
#[derive(Debug, Clone, Default)]
pub struct FillReport {
    /// Number of widgets that received a value
    pub fields_filled: u32,
    /// Keys that could not be applied
    pub fields_skipped: Vec<SkippedField>,
}

/// Info about a value that could not be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub name: String,
    pub reason: String,
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn map_pdfium_error(err: PdfiumError) -> Error {
    Error::Pdfium {
        reason: format!("{}", err),
    }
}

fn ensure_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Read a template from disk, failing with `TemplateNotFound` if it is absent
pub fn read_template<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::TemplateNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    ensure_pdf_header(&data)?;
    Ok(data)
}

fn widget_kind(field: &PdfFormField) -> WidgetKind {
    if field.as_text_field().is_some() {
        WidgetKind::Text
    } else if field.as_checkbox_field().is_some() {
        WidgetKind::Checkbox
    } else if field.as_radio_button_field().is_some() {
        WidgetKind::RadioButton
    } else if field.as_combo_box_field().is_some() {
        WidgetKind::ComboBox
    } else if field.as_list_box_field().is_some() {
        WidgetKind::ListBox
    } else if field.as_push_button_field().is_some() {
        WidgetKind::PushButton
    } else if field.as_signature_field().is_some() {
        WidgetKind::Signature
    } else {
        WidgetKind::Unknown
    }
}

/// List every fillable widget on every page
pub fn list_widgets(data: &[u8]) -> Result<Vec<WidgetInfo>> {
    ensure_pdf_header(data)?;

    let _guard = PDFIUM_LOCK.lock();
    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error)?;

    let mut widgets = Vec::new();

    for (index, page) in document.pages().iter().enumerate() {
        let page_num = index as u32 + 1;

        for annotation in page.annotations().iter() {
            let Some(field) = annotation.as_form_field() else {
                continue;
            };

            let mut info = WidgetInfo {
                page: page_num,
                name: field.name(),
                kind: widget_kind(field),
                value: None,
                is_checked: None,
            };

            if let Some(text_field) = field.as_text_field() {
                info.value = text_field.value();
            } else if let Some(checkbox) = field.as_checkbox_field() {
                info.is_checked = checkbox.is_checked().ok();
            } else if let Some(radio) = field.as_radio_button_field() {
                info.is_checked = radio.is_checked().ok();
            } else if let Some(combo) = field.as_combo_box_field() {
                info.value = combo.value();
            } else if let Some(list) = field.as_list_box_field() {
                info.value = list.value();
            }

            widgets.push(info);
        }
    }

    Ok(widgets)
}

/// Fill widgets in `data` and return the new document.
///
/// Every widget whose name is a key of `values` is set; other widgets keep
/// whatever the document already holds. Keys that match no widget are
/// reported as skipped.
pub fn fill_widgets(
    data: &[u8],
    values: &RenderValues,
    options: &RenderOptions,
) -> Result<(Vec<u8>, FillReport)> {
    ensure_pdf_header(data)?;

    let _guard = PDFIUM_LOCK.lock();
    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(map_pdfium_error)?;

    let mut report = FillReport::default();
    let mut matched: HashSet<&str> = HashSet::new();

    let pages = document.pages();

    for page_index in 0..pages.len() {
        let page = pages.get(page_index).map_err(|e| Error::Pdfium {
            reason: format!("Failed to get page {}: {}", page_index + 1, e),
        })?;

        for mut annotation in page.annotations().iter() {
            let Some(field) = annotation.as_form_field_mut() else {
                continue;
            };
            let Some(field_name) = field.name() else {
                continue;
            };
            let Some((key, value)) = values.get_key_value(field_name.as_str()) else {
                continue;
            };
            matched.insert(key.as_str());

            let outcome = if let Some(text_field) = field.as_text_field_mut() {
                text_field
                    .set_value(value)
                    .map_err(|e| format!("Failed to set value: {}", e))
            } else if let Some(checkbox) = field.as_checkbox_field_mut() {
                checkbox
                    .set_checked(value != CHECKBOX_OFF)
                    .map_err(|e| format!("Failed to set checked: {}", e))
            } else {
                Err("Field type is not filled by PDFium".to_string())
            };

            match outcome {
                Ok(()) => report.fields_filled += 1,
                Err(reason) => {
                    tracing::warn!(field = %key, %reason, "Widget not filled");
                    report.fields_skipped.push(SkippedField {
                        name: key.clone(),
                        reason,
                    });
                }
            }
        }
    }

    for key in values.keys() {
        if !matched.contains(key.as_str()) {
            report.fields_skipped.push(SkippedField {
                name: key.clone(),
                reason: "Field not found in PDF".to_string(),
            });
        }
    }

    if options.flatten {
        for page_index in 0..pages.len() {
            let mut page = pages.get(page_index).map_err(map_pdfium_error)?;
            page.flatten().map_err(|e| Error::Pdfium {
                reason: format!("Failed to flatten page {}: {}", page_index + 1, e),
            })?;
        }
    }

    let output = document.save_to_bytes().map_err(|e| Error::Pdfium {
        reason: format!("Failed to save filled PDF: {}", e),
    })?;

    Ok((output, report))
}

/// Fill a fresh copy of the template at `template_path`; the file itself is never written
pub fn render_to_bytes<P: AsRef<Path>>(
    template_path: P,
    values: &RenderValues,
    options: &RenderOptions,
) -> Result<(Vec<u8>, FillReport)> {
    let template = read_template(template_path)?;
    let (prepared, selection) = prepare_with_options(&template, values)?;

    // Radio groups and choice fields were settled while preparing
    let remaining: RenderValues = values
        .iter()
        .filter(|(name, _)| !selection.handled(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let (output, mut report) = fill_widgets(&prepared, &remaining, options)?;
    report.fields_filled += selection.selected.len() as u32;
    report
        .fields_skipped
        .extend(selection.rejected.into_iter().map(|(name, reason)| SkippedField { name, reason }));

    Ok((output, report))
}

/// Fill a copy of the template and write it to `output_path`
pub fn render_to_file<P: AsRef<Path>, Q: AsRef<Path>>(
    template_path: P,
    output_path: Q,
    values: &RenderValues,
    options: &RenderOptions,
) -> Result<FillReport> {
    let (bytes, report) = render_to_bytes(template_path, values, options)?;
    let output_path = output_path.as_ref();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(output_path, bytes)?;
    Ok(report)
}
