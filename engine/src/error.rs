//! Error types for the Converge engine.

use crate::ClassName;
use thiserror::Error;

/// Error code reported for a resolver invoked against the wrong parent type.
///
/// Matches the store's "script failed" code so clients see the same failure
/// shape they would get from any other failing cloud code.
pub const INVALID_RESOLVER_CODE: u32 = 141;

/// All possible errors from the Converge engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Remote store errors
    #[error("store call `{operation}` failed{}: {message}", class_suffix(.class_name))]
    Store {
        operation: &'static str,
        class_name: Option<ClassName>,
        message: String,
    },

    #[error("reconciliation failed for {} class(es): {}", .failures.len(), failed_names(.failures))]
    Reconcile { failures: Vec<ClassFailure> },

    // Registration errors
    #[error("unknown lifecycle event: {0}")]
    UnknownLifecycleEvent(String),

    #[error("invalid resolver: '{type_name}' resolver called for parent type '{parent_type}'")]
    InvalidResolver {
        type_name: String,
        parent_type: String,
    },

    #[error("resolver not found: {type_name}.{field}")]
    ResolverNotFound { type_name: String, field: String },

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    // Callback and setup errors
    #[error("handler failed: {0}")]
    Handler(String),

    #[error("initialization failed: {0}")]
    Initialization(String),
}

impl Error {
    /// Build a store error for `operation` on an optional class.
    pub fn store(
        operation: &'static str,
        class_name: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Error::Store {
            operation,
            class_name: class_name.map(str::to_string),
            message: message.into(),
        }
    }

    /// Store-defined error code, when this error maps to one.
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::InvalidResolver { .. } => Some(INVALID_RESOLVER_CODE),
            _ => None,
        }
    }
}

/// One class whose reconciliation did not complete.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassFailure {
    pub class_name: ClassName,
    pub error: Error,
}

fn class_suffix(class_name: &Option<ClassName>) -> String {
    match class_name {
        Some(name) => format!(" for class '{name}'"),
        None => String::new(),
    }
}

fn failed_names(failures: &[ClassFailure]) -> String {
    failures
        .iter()
        .map(|f| f.class_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::store("purge", Some("Legacy"), "connection reset");
        assert_eq!(
            err.to_string(),
            "store call `purge` failed for class 'Legacy': connection reset"
        );

        let err = Error::store("listAll", None, "timeout");
        assert_eq!(err.to_string(), "store call `listAll` failed: timeout");

        let err = Error::Reconcile {
            failures: vec![
                ClassFailure {
                    class_name: "User".into(),
                    error: Error::store("commit", Some("User"), "boom"),
                },
                ClassFailure {
                    class_name: "Post".into(),
                    error: Error::store("save", Some("Post"), "boom"),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "reconciliation failed for 2 class(es): User, Post"
        );
    }

    #[test]
    fn invalid_resolver_carries_code() {
        let err = Error::InvalidResolver {
            type_name: "User".into(),
            parent_type: "Post".into(),
        };
        assert_eq!(err.code(), Some(INVALID_RESOLVER_CODE));
        assert_eq!(Error::FunctionNotFound("hello".into()).code(), None);
    }
}
