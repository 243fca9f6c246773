//! Error taxonomy for value handling.

/// Errors produced while converting, encoding or fingerprinting a [`Value`](crate::Value).
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("non-finite float is not permitted in canonical encoding")]
    NonFiniteFloat,

    #[error("invalid wire encoding: {0}")]
    InvalidEncoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for value operations.
pub type Result<T> = std::result::Result<T, ValueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_display() {
        let err = ValueError::TypeMismatch {
            expected: "map",
            actual: "string",
        };
        let msg = err.to_string();
        assert!(msg.contains("expected map"));
        assert!(msg.contains("got string"));
    }

    #[test]
    fn test_invalid_encoding_display() {
        let err = ValueError::InvalidEncoding("bad hex".to_string());
        assert!(err.to_string().contains("invalid wire encoding"));
        assert!(err.to_string().contains("bad hex"));
    }
}
