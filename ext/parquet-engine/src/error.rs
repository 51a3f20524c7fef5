use thiserror::Error;

/// Core error type for the columnar engine
#[derive(Error, Debug)]
pub enum ParquetError {
    /// IO errors from file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the codec implementations of the `parquet` crate
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Footer or page header (de)serialization failures
    #[error("Thrift error: {0}")]
    Thrift(#[from] thrift::Error),

    /// Invalid schema definitions
    #[error("Schema error: {0}")]
    Schema(String),

    /// A logical value does not match the shape of its declared column
    #[error("Schema violation at '{path}': {message}")]
    SchemaViolation { path: String, message: String },

    /// Inconsistent repetition/definition levels found while decoding
    #[error("Malformed level sequence in column '{column}': {message}")]
    MalformedLevelSequence { column: String, message: String },

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Fewer bytes were available than a header declared
    #[error("Truncated input at offset {offset}: expected {expected} bytes, {available} available")]
    TruncatedInput {
        offset: u64,
        expected: u64,
        available: u64,
    },

    /// Bad magic, footer length or other container-level corruption
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Type conversion errors
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Invalid argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal errors that shouldn't happen
    #[error("Internal error: {0}")]
    Internal(String),

    /// UTF-8 decoding errors
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ParquetError>;

impl ParquetError {
    /// Create a new schema error
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        ParquetError::Schema(msg.into())
    }

    /// Create a new schema violation for the value at `path`
    pub fn schema_violation<P: Into<String>, S: Into<String>>(path: P, msg: S) -> Self {
        ParquetError::SchemaViolation {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a new malformed level sequence error for `column`
    pub fn malformed<C: Into<String>, S: Into<String>>(column: C, msg: S) -> Self {
        ParquetError::MalformedLevelSequence {
            column: column.into(),
            message: msg.into(),
        }
    }

    pub fn unsupported_encoding<S: Into<String>>(msg: S) -> Self {
        ParquetError::UnsupportedEncoding(msg.into())
    }

    pub fn unsupported_codec<S: Into<String>>(msg: S) -> Self {
        ParquetError::UnsupportedCodec(msg.into())
    }

    pub fn truncated(offset: u64, expected: u64, available: u64) -> Self {
        ParquetError::TruncatedInput {
            offset,
            expected,
            available,
        }
    }

    pub fn invalid_file<S: Into<String>>(msg: S) -> Self {
        ParquetError::InvalidFile(msg.into())
    }

    /// Create a new conversion error
    pub fn conversion<S: Into<String>>(msg: S) -> Self {
        ParquetError::Conversion(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        ParquetError::InvalidArgument(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        ParquetError::Internal(msg.into())
    }
}

/// Extension trait to add context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, ctx: S) -> Result<T>;

    /// Add context with a closure that's only called on error
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ParquetError>,
{
    fn context<S: Into<String>>(self, ctx: S) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            ParquetError::Internal(format!("{}: {}", ctx.into(), base_error))
        })
    }

    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            ParquetError::Internal(format!("{}: {}", f().into(), base_error))
        })
    }
}
