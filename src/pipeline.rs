//! Form-fill pipeline
//!
//! collect → optional completion → merge → render values → PDF.
//! This is the one entry point the HTTP layer uses.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::form::{
    collect_values, merge_completions, Completions, FormSchema, RenderValues, Submission,
    SubmissionValues,
};
use crate::llm::CompletionClient;
use crate::pdf::{self, FillReport, RenderOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Checkbox on the input page that enables completion
pub const LLM_TOGGLE_INPUT: &str = "llm_complete";
/// Input carrying the caller's completion service key
pub const API_KEY_INPUT: &str = "openai_api_key";

/// A generated document
#[derive(Debug, Clone)]
pub struct FilledForm {
    pub pdf: Vec<u8>,
    pub report: FillReport,
    /// Fields whose value came from a completion
    pub completed: Vec<String>,
}

/// Render values for a submission plus the fields completion filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedValues {
    pub render: RenderValues,
    pub completed: Vec<String>,
}

pub struct Pipeline {
    schema: Arc<FormSchema>,
    template_path: PathBuf,
    options: RenderOptions,
    completion: CompletionClient,
}

impl Pipeline {
    pub fn new(schema: FormSchema, config: &AppConfig) -> Result<Self> {
        let completion = CompletionClient::new(&config.llm).map_err(|e| Error::Internal {
            reason: format!("Failed to build completion client: {}", e),
        })?;

        Ok(Self {
            schema: Arc::new(schema),
            template_path: config.form.template_path.clone(),
            options: RenderOptions {
                flatten: config.form.flatten,
            },
            completion,
        })
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Check the schema against the template's widgets
    pub async fn validate_template(&self) -> Result<()> {
        let schema = self.schema.clone();
        let template_path = self.template_path.clone();

        tokio::task::spawn_blocking(move || validate_template(&schema, &template_path))
            .await
            .map_err(|e| Error::Internal {
                reason: format!("Template validation task failed: {}", e),
            })?
    }

    /// Everything up to, but not including, the PDF step
    pub async fn prepare_values(&self, submission: &Submission) -> Result<PreparedValues> {
        let values = collect_values(&self.schema, submission);

        if !submission.is_checked(LLM_TOGGLE_INPUT) {
            return Ok(PreparedValues {
                render: self.schema.render_values(&values),
                completed: Vec::new(),
            });
        }

        let api_key = submission.first(API_KEY_INPUT).unwrap_or("").trim();
        if api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }

        let completions = self.complete(api_key, &values).await;
        let outcome = merge_completions(&self.schema, &values, &completions);

        if !outcome.rejected.is_empty() {
            tracing::debug!(rejected = ?outcome.rejected, "Completions not applied");
        }
        tracing::info!(filled = outcome.filled.len(), "Merged completions");

        Ok(PreparedValues {
            render: self.schema.render_values(&outcome.values),
            completed: outcome.filled,
        })
    }

    /// Completion failures are logged and treated as "no completions"
    async fn complete(&self, api_key: &str, values: &SubmissionValues) -> Completions {
        match self.completion.complete(api_key, &self.schema, values).await {
            Ok(completions) => completions,
            Err(e) => {
                tracing::warn!(error = %e, "Completion failed, continuing with submitted values");
                Completions::new()
            }
        }
    }

    /// Run the whole pipeline and produce the filled PDF
    pub async fn run(&self, submission: &Submission) -> Result<FilledForm> {
        let prepared = self.prepare_values(submission).await?;

        let template_path = self.template_path.clone();
        let options = self.options;
        let render = prepared.render;

        let (pdf, report) = tokio::task::spawn_blocking(move || {
            pdf::render_to_bytes(&template_path, &render, &options)
        })
        .await
        .map_err(|e| Error::Internal {
            reason: format!("Render task failed: {}", e),
        })??;

        tracing::info!(
            filled = report.fields_filled,
            skipped = report.fields_skipped.len(),
            bytes = pdf.len(),
            "Rendered form"
        );

        Ok(FilledForm {
            pdf,
            report,
            completed: prepared.completed,
        })
    }
}

/// Prepare the template and check every schema field against its widgets
pub fn validate_template(schema: &FormSchema, template_path: &Path) -> Result<()> {
    let template = pdf::read_template(template_path)?;
    let prepared = pdf::prepare_template(&template)?;
    let widgets = pdf::list_widgets(&prepared)?;

    schema.validate_against(&widgets)?;

    tracing::info!(
        template = %template_path.display(),
        fields = schema.fields().len(),
        widgets = widgets.len(),
        "Template matches schema"
    );
    Ok(())
}
