//! Digest parsing: per-member records out of the recovered document.
//!
//! The digest HTML follows a fixed class-based schema (one
//! `member-section` container per member, a `file-list` of attachments, a
//! `content-body` of free text), so extraction is a marker scan rather than
//! a general HTML parse. Sections missing their heading are tolerated and
//! skipped.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// One parsed per-member section, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub name: String,
    pub text_content: String,
    pub files: Vec<FileRef>,
}

/// A file listed in a member's section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Doc,
    Code,
    Pdf,
    Unknown,
}

fn section_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class="[^"]*member-section[^"]*""#).expect("valid regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<h2[^>]*>(.*?)</h2>").expect("valid regex"))
}

fn file_list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class="[^"]*file-list[^"]*""#).expect("valid regex"))
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<li[^>]*>(.*?)</li>").expect("valid regex"))
}

fn content_body_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class="[^"]*content-body[^"]*""#).expect("valid regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

fn break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>|</h[1-6]>").expect("valid regex")
    })
}

fn div_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<(/?)div\b").expect("valid regex"))
}

fn numeric_entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&#(x[0-9a-fA-F]+|\d+);").expect("valid regex"))
}

/// Extract per-member records from a decoded digest document.
///
/// Malformed sections (no `<h2>` heading) are skipped silently; an absent
/// content body or file list yields empty fields, not an error.
pub fn parse(document: &str) -> Vec<MemberRecord> {
    let mut records = Vec::new();
    let starts: Vec<usize> = section_marker_re()
        .find_iter(document)
        .map(|m| m.start())
        .collect();

    for (idx, &start) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).copied().unwrap_or(document.len());
        let section = &document[start..end];

        let Some(name) = heading_re()
            .captures(section)
            .map(|caps| inner_text(&caps[1]))
            .filter(|name| !name.is_empty())
        else {
            tracing::debug!(section_index = idx, "section without heading; skipped");
            continue;
        };

        records.push(MemberRecord {
            name,
            text_content: content_body_text(section),
            files: file_refs(section),
        });
    }

    records
}

/// Classify a file reference by extension. Parsing always emits `Unknown`;
/// reconciliation applies this before handing results downstream.
pub fn classify_kind(file_name: &str) -> FileKind {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => FileKind::Image,
        "md" | "txt" | "doc" | "docx" | "hwp" => FileKind::Doc,
        "py" | "js" | "ts" | "rs" | "java" | "c" | "cpp" | "go" | "rb" | "kt" | "swift"
        | "sql" | "sh" => FileKind::Code,
        "pdf" => FileKind::Pdf,
        _ => FileKind::Unknown,
    }
}

fn file_refs(section: &str) -> Vec<FileRef> {
    let Some(marker) = file_list_marker_re().find(section) else {
        return Vec::new();
    };
    let rest = past_opening_tag(&section[marker.end()..]);
    let block = match rest.find("</ul>") {
        Some(end) => &rest[..end],
        None => rest,
    };
    list_item_re()
        .captures_iter(block)
        .map(|caps| FileRef {
            name: inner_text(&caps[1]),
            kind: FileKind::Unknown,
        })
        .collect()
}

fn content_body_text(section: &str) -> String {
    let Some(marker) = content_body_marker_re().find(section) else {
        return String::new();
    };
    let rest = past_opening_tag(&section[marker.end()..]);
    let block = balanced_div_block(rest);
    // Block boundaries become line breaks, remaining tags disappear, and each
    // line is trimmed; empty lines are dropped.
    let with_breaks = break_re().replace_all(block, "\n");
    let stripped = tag_re().replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut `rest` at the `</div>` that closes the content body, counting nested
/// `<div>` openings so inner blocks do not end the extraction early.
fn balanced_div_block(rest: &str) -> &str {
    let mut depth = 0usize;
    for caps in div_tag_re().captures_iter(rest) {
        let tag = caps.get(0).expect("whole match");
        if caps[1].is_empty() {
            depth += 1;
        } else if depth == 0 {
            return &rest[..tag.start()];
        } else {
            depth -= 1;
        }
    }
    rest
}

/// The class marker sits inside an opening tag; skip past that tag's `>` so
/// block extraction starts at the element content.
fn past_opening_tag(rest: &str) -> &str {
    match rest.find('>') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    }
}

/// Text content of a leaf element: tags stripped, entities decoded, trimmed.
fn inner_text(html: &str) -> String {
    let stripped = tag_re().replace_all(html, "");
    decode_entities(&stripped).trim().to_string()
}

fn decode_entities(text: &str) -> String {
    let decoded = numeric_entity_re().replace_all(text, |caps: &regex::Captures| {
        let body = &caps[1];
        let code = if let Some(hex) = body.strip_prefix('x') {
            u32::from_str_radix(hex, 16).ok()
        } else {
            body.parse::<u32>().ok()
        };
        code.and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string()
    });
    decoded
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, files: &[&str], content: &str) -> String {
        let items: String = files
            .iter()
            .map(|file| format!("<li>{file}</li>"))
            .collect();
        format!(
            "<div class=\"member-section\">\
             <h2>{name}</h2>\
             <ul class=\"file-list\">{items}</ul>\
             <div class=\"content-body\">{content}</div>\
             </div>"
        )
    }

    #[test]
    fn parses_sections_in_document_order() {
        let html = format!(
            "<html><body>{}{}{}</body></html>",
            section("Kim", &["notes.md"], "<p>TIL: ownership</p>"),
            section("Lee", &[], "<p>Chapter 3</p>"),
            section("Park", &["a.png", "b.py"], "<p>Two files</p>"),
        );
        let records = parse(&html);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["Kim", "Lee", "Park"]
        );
        assert_eq!(records[0].files.len(), 1);
        assert_eq!(records[0].files[0].name, "notes.md");
        assert_eq!(records[0].files[0].kind, FileKind::Unknown);
        assert_eq!(records[2].files.len(), 2);
    }

    #[test]
    fn section_without_heading_is_skipped_silently() {
        let html = format!(
            "<html><body>{}<div class=\"member-section\">\
             <div class=\"content-body\"><p>orphan</p></div></div>{}</body></html>",
            section("Kim", &[], "<p>ok</p>"),
            section("Lee", &[], "<p>ok</p>"),
        );
        let records = parse(&html);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Kim");
        assert_eq!(records[1].name, "Lee");
    }

    #[test]
    fn content_body_joins_lines_with_newlines() {
        let html = format!(
            "<html><body>{}</body></html>",
            section(
                "Kim",
                &[],
                "<p># Rust ownership</p><p>  - moves  </p><br><p>- borrows &amp; lifetimes</p>"
            ),
        );
        let records = parse(&html);
        assert_eq!(
            records[0].text_content,
            "# Rust ownership\n- moves\n- borrows & lifetimes"
        );
    }

    #[test]
    fn nested_divs_in_content_body_are_not_truncated() {
        let html = format!(
            "<html><body>{}</body></html>",
            section(
                "Kim",
                &[],
                "<div class=\"note\">first block</div><p>after the nested block</p>"
            ),
        );
        let records = parse(&html);
        assert_eq!(
            records[0].text_content,
            "first block\nafter the nested block"
        );
    }

    #[test]
    fn missing_content_body_yields_empty_string() {
        let html = "<html><body><div class=\"member-section\"><h2>Kim</h2>\
                    <ul class=\"file-list\"><li>cert.png</li></ul></div></body></html>";
        let records = parse(html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text_content, "");
        assert_eq!(records[0].files[0].name, "cert.png");
    }

    #[test]
    fn empty_document_parses_to_no_records() {
        assert!(parse("<html><body></body></html>").is_empty());
    }

    #[test]
    fn classifies_file_kinds_by_extension() {
        assert_eq!(classify_kind("study.png"), FileKind::Image);
        assert_eq!(classify_kind("notes.MD"), FileKind::Doc);
        assert_eq!(classify_kind("solve.rs"), FileKind::Code);
        assert_eq!(classify_kind("paper.pdf"), FileKind::Pdf);
        assert_eq!(classify_kind("archive.zip"), FileKind::Unknown);
        assert_eq!(classify_kind("no-extension"), FileKind::Unknown);
    }
}
