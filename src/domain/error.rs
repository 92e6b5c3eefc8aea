//! Domain error types.

use crate::domain::universe::UniverseError;

/// Top-level error type for rsitrader.
#[derive(Debug, thiserror::Error)]
pub enum RsitraderError {
    #[error("data source error: {reason}")]
    Data { reason: String },

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
    Universe(#[from] UniverseError),

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RsitraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RsitraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        RsitraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RsitraderError::ConfigParse { .. }
                | RsitraderError::ConfigMissing { .. }
                | RsitraderError::ConfigInvalid { .. }
                | RsitraderError::Universe(_)
        )
    }
}

impl From<&RsitraderError> for std::process::ExitCode {
    fn from(err: &RsitraderError) -> Self {
        let code: u8 = match err {
            e if e.is_config_error() => 2,
            RsitraderError::Data { .. } => 3,
            RsitraderError::NoData { .. } | RsitraderError::InsufficientData { .. } => 5,
            _ => 1,
        };
        std::process::ExitCode::from(code)
    }
}
