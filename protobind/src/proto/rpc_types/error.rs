//! Error type definitions for errors that can occur while discovering, binding and
//! describing RPC contracts.
use std::result;

use thiserror;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("contract error: {0}")]
    Contract(String),

    #[error("cannot classify operation {operation}: {reason}")]
    ShapeClassification { operation: String, reason: String },

    #[error("no marshaller available for {0}")]
    SerializationUnavailable(String),

    #[error("naming collision: {0} resolves to types with different shapes")]
    NamingCollision(String),

    #[error("enum {0} declares no zero value, the first value of a proto3 enum must be zero")]
    MissingZeroValue(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no service names were given and the activation source provided none")]
    MissingActivationList,

    #[error("route table and schema disagree: {0}")]
    InconsistentSurface(String),

    #[error("operation {path}: {source}")]
    Operation {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attaches the route path of the operation that failed.
    pub fn in_operation(self, path: impl Into<String>) -> Self {
        match self {
            e @ Error::Operation { .. } => e,
            e => Error::Operation {
                path: path.into(),
                source: Box::new(e),
            },
        }
    }

    /// The underlying error with any operation context stripped.
    pub fn root(&self) -> &Error {
        match self {
            Error::Operation { source, .. } => source.root(),
            e => e,
        }
    }

    pub fn operation_path(&self) -> Option<&str> {
        match self {
            Error::Operation { path, .. } => Some(path),
            _ => None,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_context_wraps_once() {
        let e = Error::SerializationUnavailable("Foo".to_string())
            .in_operation("/pkg.Svc/A")
            .in_operation("/pkg.Svc/B");
        assert_eq!(e.operation_path(), Some("/pkg.Svc/A"));
        assert_eq!(
            e.root(),
            &Error::SerializationUnavailable("Foo".to_string())
        );
        assert_eq!(
            e.to_string(),
            "operation /pkg.Svc/A: no marshaller available for Foo"
        );
    }
}
