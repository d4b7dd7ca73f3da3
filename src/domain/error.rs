//! Domain error types.

use crate::domain::body::Body;
use chrono::NaiveDateTime;

/// Top-level error type for gannastro.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("invalid input ({context}): {reason}")]
    InvalidInput { context: String, reason: String },

    #[error("position unavailable for {body} at {timestamp}: {reason}")]
    PositionUnavailable {
        timestamp: NaiveDateTime,
        body: Body,
        reason: String,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SignalError {
    pub fn invalid_input(context: impl Into<String>, reason: impl Into<String>) -> Self {
        SignalError::InvalidInput {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SignalError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the configuration family (parse, missing, invalid).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SignalError::ConfigParse { .. }
                | SignalError::ConfigMissing { .. }
                | SignalError::ConfigInvalid { .. }
        )
    }
}

impl From<&SignalError> for std::process::ExitCode {
    fn from(err: &SignalError) -> Self {
        let code: u8 = match err {
            SignalError::Io(_) | SignalError::Csv(_) => 1,
            SignalError::ConfigParse { .. }
            | SignalError::ConfigMissing { .. }
            | SignalError::ConfigInvalid { .. } => 2,
            SignalError::InvalidInput { .. } => 3,
            SignalError::PositionUnavailable { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
