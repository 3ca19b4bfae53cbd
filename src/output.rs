//! On-disk archive of generated PDFs
//!
//! Disabled unless an output directory is configured. Files are named
//! `filled_form_<16 hex>.pdf` and removed by a periodic sweep once they are
//! older than the TTL or exceed the file count bound, oldest first.

use crate::config::OutputConfig;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const FILE_PREFIX: &str = "filled_form_";
const FILE_SUFFIX: &str = ".pdf";
const NAME_HEX_LEN: usize = 16;

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub excess: usize,
    pub kept: usize,
}

/// Archive directory with bounded retention
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
    ttl: Duration,
    max_files: usize,
}

impl OutputStore {
    pub fn new<P: Into<PathBuf>>(dir: P, ttl: Duration, max_files: usize) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            max_files,
        }
    }

    /// Build a store from configuration; `None` when no directory is set
    pub fn from_config(config: &OutputConfig) -> Option<Self> {
        config
            .dir
            .as_ref()
            .map(|dir| Self::new(dir.clone(), config.ttl, config.max_files))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generate a fresh archive file name
    pub fn generate_name() -> String {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        format!("{}{}{}", FILE_PREFIX, &hex[..NAME_HEX_LEN], FILE_SUFFIX)
    }

    /// Whether a file name was produced by [`OutputStore::generate_name`]
    pub fn is_generated_name(name: &str) -> bool {
        name.strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(FILE_SUFFIX))
            .is_some_and(|hex| {
                hex.len() == NAME_HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit())
            })
    }

    /// Write a document into the archive, creating the directory if needed
    pub async fn save(&self, pdf: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(Self::generate_name());
        tokio::fs::write(&path, pdf).await?;

        tracing::debug!(path = %path.display(), bytes = pdf.len(), "Archived filled form");
        Ok(path)
    }

    /// Remove expired files, then the oldest files beyond the count bound.
    /// Files not matching the generated name pattern are never touched.
    pub fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(SystemTime::now())
    }

    fn sweep_at(&self, now: SystemTime) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let mut live: Vec<(SystemTime, PathBuf)> = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_str().is_some_and(Self::is_generated_name) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();

            if age > self.ttl {
                remove_file(&entry.path());
                report.expired += 1;
            } else {
                live.push((modified, entry.path()));
            }
        }

        if live.len() > self.max_files {
            // Oldest first
            live.sort_by_key(|(modified, _)| *modified);
            let excess = live.len() - self.max_files;
            for (_, path) in live.drain(..excess) {
                remove_file(&path);
                report.excess += 1;
            }
        }

        report.kept = live.len();
        Ok(report)
    }

    /// Run [`OutputStore::sweep`] every `interval` on the blocking pool
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let store = self.clone();
                match tokio::task::spawn_blocking(move || store.sweep()).await {
                    Ok(Ok(report)) if report.expired + report.excess > 0 => {
                        tracing::info!(
                            expired = report.expired,
                            excess = report.excess,
                            kept = report.kept,
                            "Swept output directory"
                        );
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "Output sweep failed"),
                    Err(e) => tracing::error!(error = %e, "Output sweep task panicked"),
                }
            }
        })
    }
}

fn remove_file(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove archived form");
    }
}
