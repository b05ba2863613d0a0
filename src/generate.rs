//! Per-member artifact generation with retry and guaranteed cleanup.
//!
//! Each attempt is a fresh run of the same sequence: create container, add
//! the member's study text as a source, request an infographic, await
//! completion, download, overlay the label, delete the container. A created
//! container is deleted exactly once before its attempt ends, success or
//! failure; delete failures are logged with the container id for manual
//! follow-up and never raised. The outer wrapper retries the whole sequence
//! with a fixed delay and reports `None` only after all attempts fail.

use crate::notebook::{ArtifactOptions, GenerationService, ServiceError};
use crate::overlay::{self, OverlayError};
use crate::util::truncate_string;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(180);

/// One generation attempt failed; the outer retry decides what happens next.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("generation service: {0}")]
    Service(#[from] ServiceError),
    #[error("artifact output: {0}")]
    Io(#[from] std::io::Error),
    #[error("label overlay: {0}")]
    PostProcess(#[from] OverlayError),
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub completion_timeout: Duration,
    pub output_dir: PathBuf,
    pub artifact: ArtifactOptions,
    pub label_font: Option<PathBuf>,
}

impl GenerateOptions {
    pub fn new(output_dir: &Path) -> GenerateOptions {
        GenerateOptions {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            output_dir: output_dir.to_path_buf(),
            artifact: ArtifactOptions::default(),
            label_font: None,
        }
    }
}

pub struct Orchestrator<'a, S: GenerationService> {
    service: &'a S,
    options: GenerateOptions,
}

impl<'a, S: GenerationService> Orchestrator<'a, S> {
    pub fn new(service: &'a S, options: GenerateOptions) -> Orchestrator<'a, S> {
        Orchestrator { service, options }
    }

    /// Generate one member's labeled infographic. Returns the artifact path,
    /// or `None` after all attempts are exhausted; never errors to the
    /// caller.
    pub fn generate(&self, name: &str, content: &str, date: &str) -> Option<PathBuf> {
        tracing::debug!(
            member = name,
            content_preview = %truncate_string(content, 120),
            "starting generation"
        );
        for attempt in 1..=self.options.max_attempts {
            tracing::info!(
                member = name,
                attempt,
                max_attempts = self.options.max_attempts,
                "generation attempt"
            );
            match self.run_attempt(name, content, date) {
                Ok(path) => return Some(path),
                Err(err) => {
                    tracing::warn!(member = name, attempt, error = %err, "attempt failed");
                }
            }
            if attempt < self.options.max_attempts {
                thread::sleep(self.options.retry_delay);
            }
        }
        tracing::error!(
            member = name,
            attempts = self.options.max_attempts,
            "all generation attempts failed"
        );
        None
    }

    /// One full attempt. The container created here is deleted on every exit
    /// path; cleanup failure is logged, never raised.
    fn run_attempt(&self, name: &str, content: &str, date: &str) -> Result<PathBuf, AttemptError> {
        let title = format!("{name}_{date}");
        let container = self.service.create_container(&title)?;
        tracing::debug!(member = name, %container, "container created");

        let result = self.drive(&container, name, content, date);

        if let Err(err) = self.service.delete_container(&container) {
            tracing::warn!(
                member = name,
                %container,
                error = %err,
                "container cleanup failed; delete manually"
            );
        } else {
            tracing::debug!(member = name, %container, "container deleted");
        }

        result
    }

    /// The states between CREATE and CLEANUP: source, request, await,
    /// download, post-process.
    fn drive(
        &self,
        container: &str,
        name: &str,
        content: &str,
        date: &str,
    ) -> Result<PathBuf, AttemptError> {
        let source_title = format!("{date} 학습 인증 - {name}");
        let source_body = format!("[{name}] {date} 학습 인증\n\n{content}");
        self.service
            .add_text_source(container, &source_title, &source_body)?;

        let task = self.service.request_artifact(container, &self.options.artifact)?;
        self.service
            .await_completion(container, &task, self.options.completion_timeout)?;

        fs::create_dir_all(&self.options.output_dir)?;
        let dest = self
            .options
            .output_dir
            .join(format!("infographic_{name}_{date}.png"));
        self.service.download_artifact(container, &dest)?;

        overlay::draw_label(&dest, name, date, self.options.label_font.as_deref())?;
        Ok(dest)
    }
}
