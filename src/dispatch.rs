//! Slack dispatch for generated artifacts.
//!
//! Uploads each artifact to a DM with the configured user via the external
//! upload flow (`files.getUploadURLExternal` → raw upload →
//! `files.completeUploadExternal`). Failures are reported to the caller for
//! logging; the pipeline never retries a dispatch.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;

const SLACK_API: &str = "https://slack.com/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("slack api: {0}")]
    Api(String),
    #[error("artifact: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for DispatchError {
    fn from(err: ureq::Error) -> DispatchError {
        DispatchError::Transport(err.to_string())
    }
}

/// Identity reported by `auth.test`, used by the check command.
#[derive(Debug)]
pub struct SlackIdentity {
    pub user: String,
    pub team: String,
}

pub struct SlackSender {
    agent: Agent,
    base_url: String,
    token: String,
    user_id: String,
}

impl SlackSender {
    pub fn new(token: &str, user_id: &str) -> SlackSender {
        SlackSender::with_base_url(token, user_id, SLACK_API)
    }

    fn with_base_url(token: &str, user_id: &str, base_url: &str) -> SlackSender {
        let config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        SlackSender {
            agent: config.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Upload one image into a DM with the configured user.
    pub fn send_image(&self, path: &Path, caption: &str) -> Result<(), DispatchError> {
        let channel = self.open_dm()?;
        let bytes = fs::read(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact.png".to_string());

        // Unlike the other methods in this flow, the grant endpoint rejects
        // JSON bodies; its parameters go as a form.
        let length = bytes.len().to_string();
        let grant = self.call_api_form(
            "files.getUploadURLExternal",
            &[("filename", filename.as_str()), ("length", length.as_str())],
        )?;
        let upload_url = string_field(&grant, "upload_url")?;
        let file_id = string_field(&grant, "file_id")?;

        self.agent
            .post(&upload_url)
            .header("Content-Type", "application/octet-stream")
            .send(&bytes[..])
            .map_err(DispatchError::from)?;

        self.call_api(
            "files.completeUploadExternal",
            &serde_json::json!({
                "files": [{ "id": file_id, "title": filename }],
                "channel_id": channel,
                "initial_comment": caption,
            }),
        )?;
        Ok(())
    }

    /// Verify the token with `auth.test`; used by the check command.
    pub fn auth_test(&self) -> Result<SlackIdentity, DispatchError> {
        let value = self.call_api("auth.test", &serde_json::json!({}))?;
        Ok(SlackIdentity {
            user: string_field(&value, "user")?,
            team: string_field(&value, "team")?,
        })
    }

    fn open_dm(&self) -> Result<String, DispatchError> {
        let value = self.call_api(
            "conversations.open",
            &serde_json::json!({ "users": self.user_id }),
        )?;
        value
            .get("channel")
            .and_then(|channel| channel.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DispatchError::Api("conversations.open carried no channel".to_string()))
    }

    fn call_api(&self, method: &str, body: &Value) -> Result<Value, DispatchError> {
        let mut response = self
            .agent
            .post(&format!("{}/{method}", self.base_url))
            .header("Authorization", &format!("Bearer {}", self.token))
            .send_json(body)
            .map_err(DispatchError::from)?;
        let value: Value = response
            .body_mut()
            .read_json()
            .map_err(DispatchError::from)?;
        unwrap_envelope(method, value)
    }

    fn call_api_form(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, DispatchError> {
        let mut response = self
            .agent
            .post(&format!("{}/{method}", self.base_url))
            .header("Authorization", &format!("Bearer {}", self.token))
            .send_form(params.iter().copied())
            .map_err(DispatchError::from)?;
        let value: Value = response
            .body_mut()
            .read_json()
            .map_err(DispatchError::from)?;
        unwrap_envelope(method, value)
    }
}

/// Shared envelope handling: every Slack method reports ok/error.
fn unwrap_envelope(method: &str, value: Value) -> Result<Value, DispatchError> {
    if value.get("ok").and_then(Value::as_bool) != Some(true) {
        let reason = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(DispatchError::Api(format!("{method}: {reason}")));
    }
    Ok(value)
}

fn string_field(value: &Value, field: &str) -> Result<String, DispatchError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DispatchError::Api(format!("response carried no {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;

    fn content_length(headers: &str) -> usize {
        headers
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Read one full HTTP request (headers plus content-length body).
    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = stream.read(&mut buf) else { break };
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                if data.len() >= header_end + 4 + content_length(&text[..header_end]) {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    fn respond(stream: &mut TcpStream, body: &str) {
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes());
    }

    #[test]
    fn upload_grant_is_requested_with_form_parameters() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        let base = format!("http://{addr}");
        let grant_request = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&grant_request);

        let upload_url = format!("{base}/upload/1");
        thread::spawn(move || {
            let bodies = [
                r#"{"ok": true, "channel": {"id": "D123"}}"#.to_string(),
                format!(r#"{{"ok": true, "upload_url": "{upload_url}", "file_id": "F123"}}"#),
                "OK".to_string(),
                r#"{"ok": true}"#.to_string(),
            ];
            for (idx, body) in bodies.iter().enumerate() {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let request = read_request(&mut stream);
                if idx == 1 {
                    *captured.lock().expect("lock") = request;
                }
                respond(&mut stream, body);
            }
        });

        let dir = tempfile::tempdir().expect("temp dir");
        let image = dir.path().join("artifact.png");
        fs::write(&image, b"png-bytes").expect("write image");

        let sender = SlackSender::with_base_url("xoxb-test", "U123", &base);
        sender.send_image(&image, "caption").expect("send image");

        let request = grant_request.lock().expect("grant request");
        assert!(request.starts_with("POST /files.getUploadURLExternal"));
        assert!(request.contains("application/x-www-form-urlencoded"));
        assert!(request.contains("filename=artifact.png"));
        assert!(request.contains("length=9"));
        assert!(!request.contains('{'), "grant request must not carry JSON");
    }
}
