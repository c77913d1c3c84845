//! Error types for the termsift crate.

use thiserror::Error;

/// Errors that can occur when preparing, filtering or executing a search.
///
/// The builder never recovers from any of these locally: every failure from
/// the session or the metadata collaborator is handed back to the caller
/// unchanged.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The free-text query could not be parsed.
    #[error("invalid query at byte {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    /// A single result was requested but several documents matched.
    #[error("expected at most one result, found {count}")]
    MultipleResults { count: u64 },

    /// The persistence metadata has no identifier property for the entity.
    #[error("no identifier property registered for entity '{entity}'")]
    MetadataResolution { entity: String },

    /// A projection or sort key names a field the engine does not know.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    /// Configuration could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Creates a syntax error at the given byte offset.
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        SearchError::QuerySyntax {
            position,
            message: message.into(),
        }
    }

    /// Returns `true` if this is a query syntax error.
    pub fn is_syntax(&self) -> bool {
        matches!(self, SearchError::QuerySyntax { .. })
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for SearchError {
    fn from(err: serde_yaml::Error) -> Self {
        SearchError::Config(err.to_string())
    }
}

/// Result type for termsift operations.
pub type Result<T> = std::result::Result<T, SearchError>;
