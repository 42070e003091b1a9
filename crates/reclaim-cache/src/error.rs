//! Error types.

use thiserror::Error;

/// Errors produced by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A query read during a prefetch pass lacked some fields.
    #[error("query `{query}` is missing fields: {}", missing.join(", "))]
    Incomplete {
        /// Query name.
        query: String,
        /// Fields the cache could not produce.
        missing: Vec<String>,
    },
}

/// Result alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_display() {
        let error = Error::Incomplete {
            query: "Local".into(),
            missing: vec!["a".into(), "b".into()],
        };
        assert_eq!(error.to_string(), "query `Local` is missing fields: a, b");
    }
}
