//! Error types for the log shipper

pub type Result<T> = std::result::Result<T, ShipperError>;

#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    /// Socket error with the operation and endpoint it happened on
    #[error("IO error while {operation} {message}: {source}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration with details
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfiguration { key: String, message: String },

    /// The producer has no usable default filter for a stream
    #[error("Filter lookup failed for stream '{stream}': {message}")]
    FilterLookup { stream: String, message: String },

    /// Record input that cannot be turned into a `Record`
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl ShipperError {
    /// Create an IO operation error with context
    ///
    /// Renders as `IO error while <operation> <message>: <source>`.
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ShipperError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        ShipperError::InvalidConfiguration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a filter lookup error
    pub fn filter_lookup(stream: impl Into<String>, message: impl Into<String>) -> Self {
        ShipperError::FilterLookup {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record<S: Into<String>>(msg: S) -> Self {
        ShipperError::InvalidRecord(msg.into())
    }

    /// Kind of the underlying socket error, if this is one
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ShipperError::IoOperation { source, .. } => Some(source.kind()),
            _ => None,
        }
    }

    /// Whether this error must abort process startup
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, ShipperError::InvalidConfiguration { .. })
    }
}
