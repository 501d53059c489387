//! Error types for the viewline runtime.
//!
//! Every failure surfaced to a caller is a categorized [`Error`] that
//! names the offending expression, stage or document, so that a broken
//! controller declaration can be traced back to the exact operator that
//! rejected it.

use thiserror::Error;

/// The error type shared by all viewline crates.
#[derive(Debug, Error)]
pub enum Error {
    /// An operator or stage was called with arguments it cannot accept.
    #[error("invalid arguments at {0}")]
    InvalidArguments(String),

    /// A configuration or expression document could not be parsed.
    #[error("parse error in {kind} at {content}: {reason}")]
    Unmarshal {
        /// What was being parsed (an expression, a controller, ...).
        kind: String,
        /// The offending input, abbreviated.
        content: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// An expression failed to evaluate.
    #[error("failed to evaluate expression {expression}: {reason}")]
    Expression {
        /// Rendering of the offending expression node.
        expression: String,
        /// Why evaluation failed.
        reason: String,
    },

    /// An aggregation stage failed on an event.
    #[error("failed to evaluate aggregation stage {stage}: {source}")]
    Aggregation {
        /// Rendering of the offending stage.
        stage: String,
        /// The underlying failure.
        source: Box<Error>,
    },

    /// A join failed on an event.
    #[error("failed to evaluate join: {source}")]
    Join {
        /// The underlying failure.
        source: Box<Error>,
    },

    /// A pipeline produced a document that is not a valid object.
    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl Error {
    /// An expression error naming the offending node.
    pub fn expression(expression: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Expression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// An unmarshal error for the given input kind.
    pub fn unmarshal(
        kind: impl Into<String>,
        content: impl std::fmt::Display,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Unmarshal {
            kind: kind.into(),
            content: content.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wraps a failure into an aggregation error for the given stage.
    pub fn aggregation(stage: impl std::fmt::Display, source: Error) -> Self {
        Self::Aggregation {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }

    /// Wraps a failure into a join error.
    pub fn join(source: Error) -> Self {
        Self::Join {
            source: Box::new(source),
        }
    }
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_category() {
        let err = Error::expression("{\"@eq\":10}", "argument must be a list of length 2");
        let msg = err.to_string();
        assert!(msg.contains("@eq"));
        assert!(msg.contains("length 2"));

        let err = Error::aggregation("@project", Error::InvalidObject("missing /metadata/name".into()));
        let msg = err.to_string();
        assert!(msg.contains("@project"));
        assert!(msg.contains("metadata/name"));
    }

    #[test]
    fn join_wraps_the_cause() {
        let err = Error::join(Error::expression("$.spec.a", "not comparable"));
        assert!(err.to_string().contains("$.spec.a"));
    }
}
