//! Report-endpoint client with bounded retry.
//!
//! One parameterized GET against the report webapp. Network failures and
//! non-success statuses are retried with a linearly growing delay; the
//! caller only ever sees success or exhaustion.

use std::thread;
use std::time::Duration;
use thiserror::Error;
use ureq::Agent;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// All retries against the report endpoint failed.
#[derive(Debug, Error)]
#[error("report endpoint failed after {attempts} attempts: {last_error}")]
pub struct FetchError {
    pub attempts: u32,
    pub last_error: String,
}

pub struct FetchClient {
    agent: Agent,
    url: String,
    attempts: u32,
    backoff: Duration,
}

impl FetchClient {
    pub fn new(url: &str) -> FetchClient {
        FetchClient::with_policy(url, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF)
    }

    pub fn with_policy(url: &str, attempts: u32, backoff: Duration) -> FetchClient {
        let config = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        FetchClient {
            agent: config.into(),
            url: url.to_string(),
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Fetch the raw digest payload for a date. The payload may or may not
    /// be sandbox-wrapped; decoding is the caller's concern.
    pub fn fetch(&self, date: &str) -> Result<String, FetchError> {
        let mut last_error = String::new();
        for attempt in 1..=self.attempts {
            match self.try_fetch(date) {
                Ok(body) => {
                    tracing::debug!(attempt, bytes = body.len(), "digest fetched");
                    return Ok(body);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "digest fetch failed");
                    last_error = err.to_string();
                }
            }
            if attempt < self.attempts {
                // Linear backoff: 1x, 2x, 3x the base delay.
                thread::sleep(self.backoff * attempt);
            }
        }
        Err(FetchError {
            attempts: self.attempts,
            last_error,
        })
    }

    fn try_fetch(&self, date: &str) -> Result<String, ureq::Error> {
        let mut response = self.agent.get(&self.url).query("date", date).call()?;
        response.body_mut().read_to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one canned HTTP response per expected connection, then stop.
    fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");
        thread::spawn(move || {
            for body in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(body.as_bytes());
            }
        });
        format!("http://{addr}/digest")
    }

    #[test]
    fn returns_body_on_first_success() {
        let url = serve(vec![
            "HTTP/1.1 200 OK\r\ncontent-length: 6\r\nconnection: close\r\n\r\ndigest",
        ]);
        let client = FetchClient::with_policy(&url, 3, Duration::ZERO);
        assert_eq!(client.fetch("2026-08-24").expect("fetch"), "digest");
    }

    #[test]
    fn retries_server_errors_until_success() {
        let url = serve(vec![
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
        ]);
        let client = FetchClient::with_policy(&url, 3, Duration::ZERO);
        assert_eq!(client.fetch("2026-08-24").expect("fetch"), "ok");
    }

    #[test]
    fn exhaustion_reports_attempt_count() {
        // Nothing listening on the port once the listener is dropped.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/digest", listener.local_addr().expect("addr"));
        drop(listener);

        let client = FetchClient::with_policy(&url, 2, Duration::ZERO);
        let err = client.fetch("2026-08-24").expect_err("should exhaust");
        assert_eq!(err.attempts, 2);
        assert!(!err.last_error.is_empty());
    }
}
