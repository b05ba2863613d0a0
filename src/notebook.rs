//! Remote generation service contract and HTTP client.
//!
//! The orchestrator only depends on the narrow [`GenerationService`] trait:
//! create a container, add a text source, request an infographic, await
//! completion, download, delete. [`NotebookClient`] is the HTTP-backed
//! implementation; tests drive the orchestrator with scripted fakes.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use ureq::Agent;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A generation-service operation failed.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network-level failure (connect, TLS, non-success status).
    #[error("transport: {0}")]
    Transport(String),
    /// The service answered but reported an error.
    #[error("service: {0}")]
    Api(String),
    /// Completion was not reached within the await bound.
    #[error("generation timed out")]
    Timeout,
}

impl From<ureq::Error> for ServiceError {
    fn from(err: ureq::Error) -> ServiceError {
        ServiceError::Transport(err.to_string())
    }
}

impl From<io::Error> for ServiceError {
    fn from(err: io::Error) -> ServiceError {
        ServiceError::Transport(err.to_string())
    }
}

/// Infographic request options.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactOptions {
    pub language: String,
    pub orientation: Orientation,
    pub detail_level: DetailLevel,
}

impl Default for ArtifactOptions {
    fn default() -> ArtifactOptions {
        ArtifactOptions {
            language: "ko".to_string(),
            orientation: Orientation::Portrait,
            detail_level: DetailLevel::Detailed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Standard,
    Detailed,
}

/// Narrow contract over the remote generation service. One container is
/// created per generation attempt and must be deleted before the attempt
/// ends, whatever the outcome.
pub trait GenerationService {
    fn create_container(&self, title: &str) -> Result<String, ServiceError>;
    fn add_text_source(
        &self,
        container: &str,
        title: &str,
        content: &str,
    ) -> Result<(), ServiceError>;
    fn request_artifact(
        &self,
        container: &str,
        options: &ArtifactOptions,
    ) -> Result<String, ServiceError>;
    fn await_completion(
        &self,
        container: &str,
        task: &str,
        timeout: Duration,
    ) -> Result<(), ServiceError>;
    fn download_artifact(&self, container: &str, dest: &Path) -> Result<(), ServiceError>;
    fn delete_container(&self, container: &str) -> Result<(), ServiceError>;
}

/// HTTP client for a notebook-style generation service.
pub struct NotebookClient {
    agent: Agent,
    base_url: String,
}

impl NotebookClient {
    pub fn new(base_url: &str) -> NotebookClient {
        let config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        NotebookClient {
            agent: config.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let mut response = self
            .agent
            .post(&self.endpoint(path))
            .send_json(body)
            .map_err(ServiceError::from)?;
        let value: serde_json::Value = response.body_mut().read_json()?;
        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return Err(ServiceError::Api(message.to_string()));
        }
        Ok(value)
    }

    fn task_status(&self, container: &str, task: &str) -> Result<String, ServiceError> {
        let path = format!("/v1/notebooks/{container}/artifacts/{task}/status");
        let mut response = self.agent.get(&self.endpoint(&path)).call()?;
        let value: serde_json::Value = response.body_mut().read_json()?;
        Ok(value
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string())
    }
}

impl GenerationService for NotebookClient {
    fn create_container(&self, title: &str) -> Result<String, ServiceError> {
        let value = self.post_json("/v1/notebooks", &serde_json::json!({ "title": title }))?;
        value
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Api("create response carried no id".to_string()))
    }

    fn add_text_source(
        &self,
        container: &str,
        title: &str,
        content: &str,
    ) -> Result<(), ServiceError> {
        let path = format!("/v1/notebooks/{container}/sources");
        self.post_json(
            &path,
            &serde_json::json!({ "title": title, "content": content }),
        )?;
        Ok(())
    }

    fn request_artifact(
        &self,
        container: &str,
        options: &ArtifactOptions,
    ) -> Result<String, ServiceError> {
        let path = format!("/v1/notebooks/{container}/artifacts/infographic");
        let body = serde_json::to_value(options)
            .map_err(|err| ServiceError::Api(err.to_string()))?;
        let value = self.post_json(&path, &body)?;
        value
            .get("task_id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Api("artifact request carried no task id".to_string()))
    }

    /// Poll the task until it completes or the deadline passes. Polling is
    /// the only suspension point; no partial results are observable.
    fn await_completion(
        &self,
        container: &str,
        task: &str,
        timeout: Duration,
    ) -> Result<(), ServiceError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.task_status(container, task)?.as_str() {
                "done" => return Ok(()),
                "failed" => {
                    return Err(ServiceError::Api("generation task failed".to_string()));
                }
                other => {
                    tracing::debug!(container, task, status = other, "generation pending");
                }
            }
            if Instant::now() >= deadline {
                return Err(ServiceError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn download_artifact(&self, container: &str, dest: &Path) -> Result<(), ServiceError> {
        let path = format!("/v1/notebooks/{container}/artifacts/infographic");
        let mut response = self.agent.get(&self.endpoint(&path)).call()?;
        let mut reader = response.body_mut().as_reader();
        let mut file = fs::File::create(dest)?;
        io::copy(&mut reader, &mut file)?;
        Ok(())
    }

    fn delete_container(&self, container: &str) -> Result<(), ServiceError> {
        let path = format!("/v1/notebooks/{container}");
        self.agent.delete(&self.endpoint(&path)).call()?;
        Ok(())
    }
}
