//! Court Form Filler Library
//!
//! Fills a family-court Request for Order PDF from a web form submission:
//! - `form`: field mapping table, value collection and completion merge
//! - `llm`: optional chat-completion of missing fields
//! - `pdf`: template preparation (qpdf) and widget filling (PDFium)
//! - `pipeline`: the request-scoped collect → complete → render flow
//! - `output`: optional on-disk archive with bounded retention
//! - `server`: axum routes, flash messages and the input page

pub mod config;
pub mod error;
pub mod form;
pub mod llm;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod server;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use form::{FormSchema, Submission};
pub use pipeline::{FilledForm, Pipeline};
pub use server::{build_state, router, run_server, AppState};
