//! Domain error types.

/// Top-level error type for stratsim.
#[derive(Debug, thiserror::Error)]
pub enum StratsimError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no price available for {symbol}: {reason}")]
    PriceUnavailable { symbol: String, reason: String },

    #[error("persistence error: {reason}")]
    Persistence { reason: String },

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

    #[error("strategy '{name}' not found, available: {available}")]
    UnknownStrategy { name: String, available: String },

    #[error("signal generation failed in {strategy}: {reason}")]
    SignalGeneration { strategy: String, reason: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("simulation {id} not found")]
    SessionNotFound { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StratsimError> for std::process::ExitCode {
    fn from(err: &StratsimError) -> Self {
        let code: u8 = match err {
            StratsimError::Io(_) => 1,
            StratsimError::ConfigParse { .. }
            | StratsimError::ConfigMissing { .. }
            | StratsimError::ConfigInvalid { .. } => 2,
            StratsimError::DataSource { .. }
            | StratsimError::PriceUnavailable { .. }
            | StratsimError::Persistence { .. } => 3,
            StratsimError::UnknownStrategy { .. }
            | StratsimError::SignalGeneration { .. }
            | StratsimError::InvalidRequest { .. } => 4,
            StratsimError::SessionNotFound { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
