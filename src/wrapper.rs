//! Sandbox-wrapper recovery for the rendered digest.
//!
//! The report webapp does not serve the digest document directly: the real
//! HTML is embedded as a double-escaped string literal inside the bootstrap
//! script of an isolating sandbox frame. [`decode`] detects that wrapper,
//! picks the payload literal, reverses the escaping, and trims the bootstrap
//! preamble. Recovery is best-effort by design: on any structural surprise
//! the input is returned unchanged so the caller sees an empty parse rather
//! than an error.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Minimum length for a quoted literal to be considered a payload candidate.
/// Bootstrap scripts carry plenty of short config strings; the document is
/// always far larger.
const MIN_PAYLOAD_LEN: usize = 500;

fn script_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<script[^>]*>(.*?)</script>\s*</body>").expect("valid regex"))
}

fn payload_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r#""([^"]{{{MIN_PAYLOAD_LEN},}})""#)).expect("valid regex")
    })
}

fn double_hex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\\\x([0-9a-fA-F]{2})").expect("valid regex"))
}

fn single_hex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\x([0-9a-fA-F]{2})").expect("valid regex"))
}

/// Recover the digest document from a sandbox-wrapped payload.
///
/// Returns the input unchanged when no wrapper is present (the not-wrapped
/// case) or when recovery fails partway. Never errors.
pub fn decode(raw: &str) -> String {
    let Some(script) = script_block_re()
        .captures(raw)
        .and_then(|caps| caps.get(1))
    else {
        return raw.to_string();
    };

    let Some(payload) = longest_literal(script.as_str()) else {
        return raw.to_string();
    };

    let decoded = unescape_twice(payload);

    // The literal starts with sandbox bootstrap config; the document proper
    // begins at the first doctype / html tag / any tag.
    let start = decoded
        .find("<!DOCTYPE")
        .or_else(|| decoded.find("<html"))
        .or_else(|| decoded.find('<'));
    match start {
        Some(idx) => decoded[idx..].to_string(),
        None => {
            tracing::warn!(
                payload_len = payload.len(),
                "wrapper literal found but no document start; returning payload unchanged"
            );
            raw.to_string()
        }
    }
}

/// Longest double-quoted literal of at least [`MIN_PAYLOAD_LEN`] chars.
/// Ties keep the first occurrence.
fn longest_literal(script: &str) -> Option<&str> {
    let mut best: Option<&str> = None;
    for caps in payload_literal_re().captures_iter(script) {
        let candidate = caps.get(1).map(|m| m.as_str())?;
        if candidate.len() > best.map_or(0, str::len) {
            best = Some(candidate);
        }
    }
    best
}

/// Reverse the wrapper's double escaping, then any remaining single layer.
/// Replacement order within each pass matters and mirrors the encoding.
fn unescape_twice(payload: &str) -> String {
    let hex_byte = |caps: &Captures| -> String {
        let code = u32::from_str_radix(&caps[1], 16).unwrap_or(0xFFFD);
        char::from_u32(code)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string()
    };

    // Pass 1: doubled escapes.
    let decoded = double_hex_re().replace_all(payload, hex_byte);
    let decoded = decoded
        .replace("\\\\\"", "\"")
        .replace("\\\\/", "/")
        .replace("\\\\n", "\n")
        .replace("\\\\t", "\t")
        .replace("\\\\\\\\", "\\");

    // Pass 2: whatever single escapes remain.
    let decoded = decoded
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\/", "/")
        .replace("\\\"", "\"");
    let decoded = single_hex_re().replace_all(&decoded, hex_byte);
    decoded.replace("\\\\", "\\")
}
