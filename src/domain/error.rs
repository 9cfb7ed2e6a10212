//! Domain error types.

/// Top-level error type for rotator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RotatorError {
    #[error("insufficient history for {symbol}: have {bars} bars, need {required}")]
    InsufficientHistory {
        symbol: String,
        bars: usize,
        required: usize,
    },

    #[error("degenerate allocation: {reason}")]
    DegenerateAllocation { reason: String },

    #[error("no price quote for {symbol}")]
    UnknownPrice { symbol: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("price series for {symbol} is not strictly increasing at {date}")]
    UnorderedSeries { symbol: String, date: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data error: {reason}")]
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

    #[error("io error: {0}")]
    Io(String),
}

impl RotatorError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        RotatorError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for RotatorError {
    fn from(err: std::io::Error) -> Self {
        RotatorError::Io(err.to_string())
    }
}

impl From<&RotatorError> for std::process::ExitCode {
    fn from(err: &RotatorError) -> Self {
        let code: u8 = match err {
            RotatorError::Io(_) => 1,
            RotatorError::ConfigParse { .. }
            | RotatorError::ConfigMissing { .. }
            | RotatorError::ConfigInvalid { .. } => 2,
            RotatorError::NoData { .. }
            | RotatorError::Data { .. }
            | RotatorError::UnorderedSeries { .. }
            | RotatorError::UnknownPrice { .. } => 3,
            RotatorError::DegenerateAllocation { .. } | RotatorError::InvalidParameter { .. } => 4,
            RotatorError::InsufficientHistory { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
