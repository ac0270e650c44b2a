//! Domain error types.

/// Top-level error type for paperledger.
#[derive(Debug, thiserror::Error)]
pub enum PaperledgerError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("storage degraded: {reason}")]
    StorageDegraded { reason: String },

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

    #[error("oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },

    #[error("malformed oracle reply: {reason}")]
    OracleReply { reason: String },

    #[error("invalid amount {amount}: must be finite and non-negative")]
    InvalidAmount { amount: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PaperledgerError> for std::process::ExitCode {
    fn from(err: &PaperledgerError) -> Self {
        let code: u8 = match err {
            PaperledgerError::Io(_) => 1,
            PaperledgerError::ConfigParse { .. }
            | PaperledgerError::ConfigMissing { .. }
            | PaperledgerError::ConfigInvalid { .. }
            | PaperledgerError::InvalidAmount { .. } => 2,
            PaperledgerError::Database { .. }
            | PaperledgerError::DatabaseQuery { .. }
            | PaperledgerError::StorageDegraded { .. } => 3,
            PaperledgerError::OracleUnavailable { .. } | PaperledgerError::OracleReply { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
