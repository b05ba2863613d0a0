//! Generation-service session refresh.
//!
//! Long-lived authentication is delegated to an external command (typically
//! a headless-browser profile refresh) configured via
//! `AUTH_REFRESH_COMMAND`. The pipeline only cares about the yes/no answer:
//! a failing refresh is a fatal precondition for the generation phase.

use std::process::Command;

pub struct SessionRefresh {
    command: Option<String>,
}

impl SessionRefresh {
    pub fn new(command: Option<&str>) -> SessionRefresh {
        SessionRefresh {
            command: command.map(str::to_string),
        }
    }

    /// Run the refresh command and report whether the session is usable.
    /// With no command configured the session is assumed valid (refresh is
    /// then someone else's scheduled job).
    pub fn ensure_authenticated(&self) -> bool {
        let Some(raw) = self.command.as_deref() else {
            tracing::warn!("AUTH_REFRESH_COMMAND not set; assuming session is valid");
            return true;
        };

        let argv = match shell_words::split(raw) {
            Ok(argv) if !argv.is_empty() => argv,
            Ok(_) => {
                tracing::error!("AUTH_REFRESH_COMMAND is empty");
                return false;
            }
            Err(err) => {
                tracing::error!(error = %err, "AUTH_REFRESH_COMMAND is not parseable");
                return false;
            }
        };

        tracing::info!(command = raw, "refreshing generation-service session");
        match Command::new(&argv[0]).args(&argv[1..]).status() {
            Ok(status) if status.success() => {
                tracing::info!("session refresh succeeded");
                true
            }
            Ok(status) => {
                tracing::error!(code = ?status.code(), "session refresh failed; log in manually");
                false
            }
            Err(err) => {
                tracing::error!(error = %err, "session refresh command could not run");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_command_assumes_valid_session() {
        assert!(SessionRefresh::new(None).ensure_authenticated());
    }

    #[test]
    fn successful_command_authenticates() {
        assert!(SessionRefresh::new(Some("true")).ensure_authenticated());
    }

    #[test]
    fn failing_command_reports_unauthenticated() {
        assert!(!SessionRefresh::new(Some("false")).ensure_authenticated());
    }

    #[test]
    fn missing_binary_reports_unauthenticated() {
        let refresh = SessionRefresh::new(Some("/nonexistent/refresh-session"));
        assert!(!refresh.ensure_authenticated());
    }

    #[test]
    fn unparseable_command_reports_unauthenticated() {
        let refresh = SessionRefresh::new(Some("refresh 'unterminated"));
        assert!(!refresh.ensure_authenticated());
    }
}
