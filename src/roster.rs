//! Roster loading and reconciliation against parsed submissions.
//!
//! The roster (`members.json`) is the floor of expected names for a date: it
//! adds "no submission" entries for absent members but never filters parsed
//! submissions out. A submission from a name not on the roster still counts.

use crate::digest::{classify_kind, FileRef, MemberRecord};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One roster member as stored in `members.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterEntry {
    #[serde(default)]
    pub name: String,
    /// External folder reference; entries without one are ignored.
    #[serde(default)]
    pub folder_id: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default)]
    members: Vec<RosterEntry>,
}

/// The reconciled per-member unit consumed by generation and dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub name: String,
    pub date: String,
    pub has_submission: bool,
    pub text_content: String,
    pub files: Vec<FileRef>,
}

/// Load roster entries from `members.json`. A missing file is an empty
/// roster, not an error; only active entries with both a name and a folder
/// reference participate.
pub fn load_roster(path: &Path) -> Result<Vec<RosterEntry>> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no roster file; using empty roster");
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read roster {}", path.display()))?;
    let file: RosterFile = serde_json::from_str(&raw)
        .with_context(|| format!("parse roster {}", path.display()))?;
    Ok(file
        .members
        .into_iter()
        .filter(|entry| entry.active && !entry.name.is_empty() && !entry.folder_id.is_empty())
        .collect())
}

/// Merge parsed records with the roster into exactly one ScanResult per
/// distinct name: the first parsed submission per name in document order,
/// then roster members without a submission, in roster order.
pub fn reconcile(
    parsed: Vec<MemberRecord>,
    roster: &[RosterEntry],
    date: &str,
) -> Vec<ScanResult> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut results: Vec<ScanResult> = Vec::new();

    for record in parsed {
        if !seen.insert(record.name.clone()) {
            tracing::warn!(member = %record.name, "duplicate section in digest; keeping the first");
            continue;
        }
        results.push(ScanResult {
            name: record.name,
            date: date.to_string(),
            has_submission: true,
            text_content: record.text_content,
            files: record
                .files
                .into_iter()
                .map(|file| {
                    let kind = classify_kind(&file.name);
                    FileRef {
                        name: file.name,
                        kind,
                    }
                })
                .collect(),
        });
    }

    for entry in roster {
        if seen.insert(entry.name.clone()) {
            results.push(ScanResult {
                name: entry.name.clone(),
                date: date.to_string(),
                has_submission: false,
                text_content: String::new(),
                files: Vec::new(),
            });
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::FileKind;
    use std::io::Write;

    fn record(name: &str, content: &str, files: &[&str]) -> MemberRecord {
        MemberRecord {
            name: name.to_string(),
            text_content: content.to_string(),
            files: files
                .iter()
                .map(|file| FileRef {
                    name: file.to_string(),
                    kind: FileKind::Unknown,
                })
                .collect(),
        }
    }

    fn entry(name: &str, active: bool) -> RosterEntry {
        RosterEntry {
            name: name.to_string(),
            folder_id: format!("folder-{name}"),
            active,
        }
    }

    #[test]
    fn fills_gaps_for_active_members_without_submissions() {
        let parsed = vec![
            record("A", "content a", &["a.md"]),
            record("C", "content c", &[]),
        ];
        let roster = vec![entry("A", true), entry("B", true), entry("C", true)];

        let results = reconcile(parsed, &roster, "2026-08-24");
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["A", "C", "B"]
        );
        assert!(results[0].has_submission);
        assert_eq!(results[0].text_content, "content a");
        assert!(results[1].has_submission);
        let b = &results[2];
        assert!(!b.has_submission);
        assert_eq!(b.text_content, "");
        assert!(b.files.is_empty());
        assert_eq!(b.date, "2026-08-24");
    }

    #[test]
    fn duplicate_parsed_names_collapse_to_the_first_record() {
        let parsed = vec![
            record("Kim", "first submission", &["a.md"]),
            record("Kim", "second submission", &[]),
            record("Lee", "content", &[]),
        ];
        let roster = vec![entry("Kim", true), entry("Kim", true)];

        let results = reconcile(parsed, &roster, "2026-08-24");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Kim");
        assert_eq!(results[0].text_content, "first submission");
        assert_eq!(results[0].files.len(), 1);
        assert_eq!(results[1].name, "Lee");
    }

    #[test]
    fn submission_off_roster_is_kept() {
        let parsed = vec![record("D", "guest submission", &[])];
        let roster = vec![entry("A", true)];

        let results = reconcile(parsed, &roster, "2026-08-24");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "D");
        assert!(results[0].has_submission);
        assert_eq!(results[1].name, "A");
        assert!(!results[1].has_submission);
    }

    #[test]
    fn reconcile_enriches_file_kinds() {
        let parsed = vec![record("A", "content", &["proof.png", "notes.md", "x.zip"])];
        let results = reconcile(parsed, &[], "2026-08-24");
        let kinds: Vec<FileKind> = results[0].files.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FileKind::Image, FileKind::Doc, FileKind::Unknown]);
    }

    #[test]
    fn load_roster_filters_inactive_and_incomplete_entries() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        write!(
            file,
            r#"{{"members": [
                {{"name": "A", "folder_id": "f1", "active": true}},
                {{"name": "B", "folder_id": "f2", "active": false}},
                {{"name": "", "folder_id": "f3", "active": true}},
                {{"name": "D", "active": true}}
            ]}}"#
        )
        .expect("write roster");

        let roster = load_roster(file.path()).expect("load roster");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "A");
    }

    #[test]
    fn missing_roster_file_is_empty() {
        let roster = load_roster(Path::new("/nonexistent/members.json")).expect("load roster");
        assert!(roster.is_empty());
    }
}
