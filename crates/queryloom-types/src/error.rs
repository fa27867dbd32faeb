use thiserror::Error;

/// Failures from the checkpoint store (the trait lives in queryloom-core).
///
/// The engine treats both variants as fatal to the call in progress; the
/// split exists so operators can tell an unreachable store from a damaged
/// record when it surfaces in logs.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing store could not be reached or a statement failed.
    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),

    /// A checkpoint failed to encode for storage, or a stored record did not
    /// decode back into a checkpoint.
    #[error("checkpoint record corrupt: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display_names_the_store() {
        let err = RepositoryError::Unavailable("disk I/O error".to_string());
        assert_eq!(
            err.to_string(),
            "checkpoint store unavailable: disk I/O error"
        );
    }

    #[test]
    fn test_corrupt_display_carries_detail() {
        let err = RepositoryError::Corrupt("invalid state JSON at line 1".to_string());
        assert!(err.to_string().starts_with("checkpoint record corrupt"));
        assert!(err.to_string().contains("line 1"));
    }
}
