//! Error types for strata operations.

use thiserror::Error;

/// Result type alias using [`StrataError`].
pub type Result<T> = std::result::Result<T, StrataError>;

/// Error types for compilation and page evaluation.
#[derive(Debug, Error)]
pub enum StrataError {
    // ==================== Batch Model Errors ====================
    /// A block was read outside `0..length`.
    #[error("Position {position} is out of range for a block with {length} positions")]
    OutOfRange { position: usize, length: usize },

    /// The begin/append/close protocol of a builder was not followed.
    #[error("Builder protocol violation: {0}")]
    ProtocolViolation(String),

    /// A page could not be constructed or does not match the compiled input layout.
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    // ==================== Compile Errors ====================
    /// No function implementation matches the signature.
    #[error("Unresolved function signature: {0}")]
    UnresolvedSignature(String),

    /// Type mismatch errors.
    #[error("Type error: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Structurally invalid expression (arity, channel index).
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    // ==================== Evaluation Errors ====================
    /// A function failed for a particular row.
    #[error("Evaluation error in {function}: {message}")]
    Evaluation { function: String, message: String },

    /// A memory limit could not be honored even after flushing output.
    #[error("Memory limit exceeded in '{context}': {used} bytes used, limit is {limit} bytes")]
    ResourceExceeded {
        context: String,
        used: u64,
        limit: u64,
    },

    /// Arrow conversion error.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl StrataError {
    /// Creates a type mismatch error from anything displayable.
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        StrataError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates an evaluation error attributed to `function`.
    pub fn evaluation(function: &str, message: impl Into<String>) -> Self {
        StrataError::Evaluation {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if this error was raised while compiling expressions.
    #[must_use]
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            StrataError::UnresolvedSignature(_)
                | StrataError::TypeMismatch { .. }
                | StrataError::InvalidExpression(_)
        )
    }

    /// Returns true if this error signals memory backpressure rather than a hard failure.
    #[must_use]
    pub fn is_resource_exceeded(&self) -> bool {
        matches!(self, StrataError::ResourceExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display() {
        let err = StrataError::OutOfRange {
            position: 7,
            length: 3,
        };
        assert!(err.to_string().contains("Position 7"));
        assert!(err.to_string().contains("3 positions"));
    }

    #[test]
    fn test_classification() {
        assert!(StrataError::UnresolvedSignature("f()".into()).is_compile_error());
        assert!(StrataError::type_mismatch("bigint", "varchar").is_compile_error());
        assert!(!StrataError::evaluation("divide", "Division by zero").is_compile_error());

        let exceeded = StrataError::ResourceExceeded {
            context: "root".into(),
            used: 10,
            limit: 5,
        };
        assert!(exceeded.is_resource_exceeded());
        assert!(!exceeded.is_compile_error());
    }
}
