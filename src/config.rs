//! Runtime configuration loaded once at startup.
//!
//! Values come from the environment (with `.env` support via dotenvy) and are
//! carried in a single [`Config`] that is passed by reference into each
//! pipeline stage. Optional collaborators (report endpoint, generation
//! service, Slack) stay `Option` here; the stage that needs one resolves it
//! through the `require_*` accessors so a missing variable fails exactly when
//! the work that depends on it starts.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Hour of day (local time) before which a run targets the previous day.
pub const DEFAULT_DEADLINE_HOUR: u32 = 5;

/// A required environment variable is absent or empty.
#[derive(Debug, Error)]
#[error("{0} is not set; check the .env file")]
pub struct ConfigError(pub &'static str);

#[derive(Debug, Clone)]
pub struct Config {
    /// Report webapp endpoint serving the rendered digest (`?date=` GET).
    pub report_url: Option<String>,
    /// Base URL of the remote generation service.
    pub notebook_base_url: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_user_id: Option<String>,
    /// External command run to refresh the generation-service session.
    pub auth_refresh_command: Option<String>,
    pub output_dir: PathBuf,
    pub members_file: PathBuf,
    pub deadline_hour: u32,
    /// Preferred font file for the artifact label overlay.
    pub label_font: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `.env` (if present) and the process
    /// environment. Never fails; required values are checked lazily.
    pub fn load() -> Config {
        dotenvy::dotenv().ok();
        Config {
            report_url: non_empty_var("REPORT_URL"),
            notebook_base_url: non_empty_var("NOTEBOOK_BASE_URL"),
            slack_bot_token: non_empty_var("SLACK_BOT_TOKEN"),
            slack_user_id: non_empty_var("SLACK_USER_ID"),
            auth_refresh_command: non_empty_var("AUTH_REFRESH_COMMAND"),
            output_dir: non_empty_var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            members_file: non_empty_var("MEMBERS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("members.json")),
            deadline_hour: non_empty_var("DEADLINE_HOUR")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_DEADLINE_HOUR),
            label_font: non_empty_var("LABEL_FONT").map(PathBuf::from),
        }
    }

    pub fn require_report_url(&self) -> Result<&str, ConfigError> {
        self.report_url.as_deref().ok_or(ConfigError("REPORT_URL"))
    }

    pub fn require_notebook_base_url(&self) -> Result<&str, ConfigError> {
        self.notebook_base_url
            .as_deref()
            .ok_or(ConfigError("NOTEBOOK_BASE_URL"))
    }

    pub fn require_slack(&self) -> Result<(&str, &str), ConfigError> {
        let token = self
            .slack_bot_token
            .as_deref()
            .ok_or(ConfigError("SLACK_BOT_TOKEN"))?;
        let user = self
            .slack_user_id
            .as_deref()
            .ok_or(ConfigError("SLACK_USER_ID"))?;
        Ok((token, user))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
