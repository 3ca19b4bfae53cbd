//! PDF processing layer
//!
//! Template preparation with qpdf and widget filling with PDFium.

mod qpdf;
mod renderer;

pub use qpdf::{page_count, prepare_template, prepare_with_options, OptionSelection};
pub use renderer::{
    fill_widgets, list_widgets, read_template, render_to_bytes, render_to_file, FillReport,
    RenderOptions, SkippedField, WidgetInfo, WidgetKind,
};
