use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing value for argument: {flag}")]
    MissingValue { flag: String },
    #[error("missing required argument: {field}")]
    MissingRequired { field: String },
    #[error("invalid value for {flag}={value}: {reason}")]
    InvalidValue {
        flag: String,
        value: String,
        reason: String,
    },
    #[error("unsupported argument: {arg}")]
    UnsupportedArgument { arg: String },
    #[error("parse error: {message}")]
    ParseError { message: String },
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
    #[error("interval [{start}, {end}) at line {line} lies outside [0, {max_len})")]
    IntervalOutOfRange {
        line: usize,
        start: usize,
        end: usize,
        max_len: usize,
    },
    #[error("record at line {line} consumes no query bases")]
    ZeroQueryLength { line: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}
