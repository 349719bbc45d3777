//! Domain error types.

/// Top-level error type for ksau.
#[derive(Debug, thiserror::Error)]
pub enum KsauError {
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

    #[error("failed to read {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("bad table format in {path}: {reason}")]
    TableFormat { path: String, reason: String },

    #[error("malformed row at line {line} of {path}: {reason}")]
    MalformedRow {
        path: String,
        line: u64,
        reason: String,
    },

    #[error("JSON error in {path}: {reason}")]
    JsonParse { path: String, reason: String },

    #[error("unknown topology: {0}")]
    UnknownTopology(String),

    #[error("unknown particle: {0}")]
    UnknownParticle(String),

    #[error("missing constant: {0}")]
    MissingConstant(String),

    #[error("invalid constant {key}: {reason}")]
    InvalidConstant { key: String, reason: String },

    #[error("version conflict on {path}: expected version {expected}, found {found}")]
    VersionConflict {
        path: String,
        expected: u64,
        found: u64,
    },

    #[error("validation failed with {errors} error(s)")]
    ValidationFailed { errors: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&KsauError> for std::process::ExitCode {
    fn from(err: &KsauError) -> Self {
        let code: u8 = match err {
            KsauError::Io(_) => 1,
            KsauError::ConfigParse { .. }
            | KsauError::ConfigMissing { .. }
            | KsauError::ConfigInvalid { .. } => 2,
            KsauError::FileRead { .. }
            | KsauError::TableFormat { .. }
            | KsauError::MalformedRow { .. }
            | KsauError::JsonParse { .. } => 3,
            KsauError::UnknownTopology(_)
            | KsauError::UnknownParticle(_)
            | KsauError::MissingConstant(_)
            | KsauError::InvalidConstant { .. } => 4,
            KsauError::VersionConflict { .. } => 5,
            KsauError::ValidationFailed { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
