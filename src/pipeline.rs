//! Pipeline coordination: fetch → decode → parse → reconcile → generate →
//! dispatch.
//!
//! The coordinator owns no state beyond the per-run result collection. One
//! member's failure at any stage never aborts the others; only
//! pre-reconciliation problems (missing configuration, fetch exhaustion,
//! failed authentication precondition) are fatal to the run.

use crate::auth::SessionRefresh;
use crate::config::Config;
use crate::dispatch::SlackSender;
use crate::fetch::FetchClient;
use crate::generate::{GenerateOptions, Orchestrator};
use crate::notebook::NotebookClient;
use crate::roster::{self, ScanResult};
use crate::{digest, wrapper};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, Timelike};
use std::fs;
use std::path::{Path, PathBuf};

/// A successfully generated artifact for one member.
#[derive(Debug)]
pub struct GeneratedArtifact {
    pub name: String,
    pub path: PathBuf,
}

/// Aggregated per-run outcome.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub date: String,
    pub members: usize,
    pub submitted: usize,
    pub generated: Vec<GeneratedArtifact>,
    pub generation_failed: Vec<String>,
    pub dispatched: usize,
    pub dispatch_failed: Vec<String>,
}

/// Target date for a run: before the deadline hour (local time) the digest
/// for the previous day is still the one being graded.
pub fn target_date(deadline_hour: u32) -> String {
    target_date_at(Local::now(), deadline_hour)
}

fn target_date_at(now: DateTime<Local>, deadline_hour: u32) -> String {
    let target = if now.hour() < deadline_hour {
        now - Duration::days(1)
    } else {
        now
    };
    target.format("%Y-%m-%d").to_string()
}

/// Fetch (or read), decode, parse, and reconcile the digest for a date.
pub fn scan(config: &Config, date: &str, input: Option<&Path>) -> Result<Vec<ScanResult>> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("read digest payload {}", path.display()))?,
        None => {
            let url = config.require_report_url()?;
            FetchClient::new(url).fetch(date)?
        }
    };

    let document = wrapper::decode(&raw);
    let parsed = digest::parse(&document);
    tracing::info!(date, parsed = parsed.len(), "digest parsed");

    let roster = roster::load_roster(&config.members_file)?;
    let results = roster::reconcile(parsed, &roster, date);
    let submitted = results.iter().filter(|r| r.has_submission).count();
    tracing::info!(
        date,
        members = results.len(),
        submitted,
        missing = results.len() - submitted,
        "scan reconciled"
    );
    Ok(results)
}

/// Run the full pipeline for one date.
pub fn run(config: &Config, date: &str, dry_run: bool) -> Result<RunSummary> {
    tracing::info!(date, dry_run, "pipeline starting");
    let results = scan(config, date, None)?;

    let mut summary = RunSummary {
        date: date.to_string(),
        members: results.len(),
        ..RunSummary::default()
    };

    let candidates: Vec<&ScanResult> = results
        .iter()
        .filter(|r| r.has_submission && !r.text_content.is_empty())
        .collect();
    summary.submitted = candidates.len();
    if candidates.is_empty() {
        tracing::warn!(date, "no members with submission content; nothing to generate");
        return Ok(summary);
    }

    let refresh = SessionRefresh::new(config.auth_refresh_command.as_deref());
    if !refresh.ensure_authenticated() {
        bail!("generation-service session is not authenticated");
    }

    let base_url = config.require_notebook_base_url()?;
    let client = NotebookClient::new(base_url);
    let mut options = GenerateOptions::new(&config.output_dir);
    options.label_font = config.label_font.clone();
    let orchestrator = Orchestrator::new(&client, options);

    for member in &candidates {
        match orchestrator.generate(&member.name, &member.text_content, date) {
            Some(path) => {
                tracing::info!(member = %member.name, path = %path.display(), "artifact ready");
                summary.generated.push(GeneratedArtifact {
                    name: member.name.clone(),
                    path,
                });
            }
            None => {
                summary.generation_failed.push(member.name.clone());
            }
        }
    }

    if dry_run {
        tracing::info!(
            generated = summary.generated.len(),
            "dry run; skipping dispatch"
        );
        return Ok(summary);
    }
    if summary.generated.is_empty() {
        return Ok(summary);
    }

    let (token, user) = config.require_slack()?;
    let sender = SlackSender::new(token, user);
    for artifact in &summary.generated {
        let caption = format!(
            "📚 {date} {}님의 학습 인포그래픽\nSlack에 공유해주세요! 💪",
            artifact.name
        );
        match sender.send_image(&artifact.path, &caption) {
            Ok(()) => {
                tracing::info!(member = %artifact.name, "artifact dispatched");
                summary.dispatched += 1;
            }
            Err(err) => {
                tracing::error!(member = %artifact.name, error = %err, "dispatch failed");
                summary.dispatch_failed.push(artifact.name.clone());
            }
        }
    }

    Ok(summary)
}
