//! Error types for managed collections.

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Boxed error produced by a caller-supplied callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when mutating a managed collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// A source index was outside the bounds of the original items.
    #[error("Index {index} is out of range for a collection of {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    /// The update callback of a reconciliation failed.
    ///
    /// Items processed before the failure remain committed.
    #[error("Item update failed during reconciliation: {0}")]
    Update(#[source] BoxError),
}

impl CollectionError {
    /// Create an index error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Wrap a callback error.
    pub fn update(source: impl Into<BoxError>) -> Self {
        Self::Update(source.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_index_error_display() {
        let err = CollectionError::index_out_of_range(5, 3);
        assert_eq!(
            err.to_string(),
            "Index 5 is out of range for a collection of 3 items"
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn test_update_error_keeps_source() {
        let err = CollectionError::update("contact record is corrupt");
        assert!(err.to_string().contains("contact record is corrupt"));
        assert!(err.source().is_some());
    }
}
