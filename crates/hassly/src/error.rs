//! CLI error types with miette diagnostics.
//!
//! Maps library and config errors into user-facing errors with actionable
//! help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use hassly_api::{ConnectionTestFailure, Unreachable};
use hassly_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    /// Reachability diagnostics are already user-facing prose.
    #[error("{0}")]
    #[diagnostic(
        code(hassly::unreachable),
        help("Run with --cloud if this hub is only reachable through the cloud relay.")
    )]
    Unreachable(Unreachable),

    #[error("Could not talk to Home Assistant: {reason}")]
    #[diagnostic(
        code(hassly::connection_failed),
        help(
            "Check that Home Assistant is running and the URL is correct.\n\
             Try: hassly check"
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(hassly::auth_failed),
        help(
            "Create a long-lived access token under your Home Assistant profile page.\n\
             Run: hassly config set-token --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(hassly::no_credentials),
        help(
            "Configure a token with: hassly config init\n\
             Or set the HASSLY_TOKEN environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Hub ──────────────────────────────────────────────────────────
    #[error("Home Assistant rejected the request: {message}")]
    #[diagnostic(code(hassly::hub_error))]
    Hub { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hassly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hassly::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: hassly config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No Home Assistant URL configured")]
    #[diagnostic(
        code(hassly::no_config),
        help(
            "Create a profile with: hassly config init\n\
             Or pass --url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(hassly::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(hassly::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable(_) | Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<hassly_api::Error> for CliError {
    fn from(err: hassly_api::Error) -> Self {
        use hassly_api::Error as E;

        match err {
            E::AuthenticationFailed => Self::AuthFailed {
                profile: "current".into(),
            },
            E::NotConfigured => Self::NoConfig {
                path: hassly_config::config_path().display().to_string(),
            },
            E::InvalidUrl(e) => Self::Validation {
                field: "url".into(),
                reason: e.to_string(),
            },
            E::UnsupportedScheme { scheme } => Self::Validation {
                field: "url".into(),
                reason: format!("unsupported scheme '{scheme}' (expected http, https, ws or wss)"),
            },
            E::Reconfigure(failure) => failure.into(),
            E::States { message } => Self::Hub { message },
            E::Deserialization { message, .. } => Self::Hub {
                message: format!("unreadable reply: {message}"),
            },
            E::Serialization(e) => Self::Json(e),
            other @ (E::Tls(_)
            | E::WebSocketConnect(_)
            | E::WebSocket(_)
            | E::ConnectionClosed
            | E::NotConnected) => Self::ConnectionFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<ConnectionTestFailure> for CliError {
    fn from(failure: ConnectionTestFailure) -> Self {
        match failure {
            ConnectionTestFailure::Unreachable(diagnostic) => Self::Unreachable(diagnostic),
            ConnectionTestFailure::InvalidToken => Self::AuthFailed {
                profile: "current".into(),
            },
            other => Self::ConnectionFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            other => Self::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let unreachable = CliError::from(ConnectionTestFailure::Unreachable(
            Unreachable::NotConfigured,
        ));
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);

        let auth = CliError::from(hassly_api::Error::AuthenticationFailed);
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let invalid = CliError::from(ConnectionTestFailure::InvalidToken);
        assert_eq!(invalid.exit_code(), exit_code::AUTH);

        let usage = CliError::from(hassly_api::Error::UnsupportedScheme {
            scheme: "ftp".into(),
        });
        assert_eq!(usage.exit_code(), exit_code::USAGE);

        let hub = CliError::from(hassly_api::Error::States {
            message: "nope".into(),
        });
        assert_eq!(hub.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn transport_errors_are_connection_failures() {
        let err = CliError::from(hassly_api::Error::ConnectionClosed);
        assert!(matches!(err, CliError::ConnectionFailed { .. }));
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }
}
