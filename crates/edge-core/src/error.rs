//! Core error type for edge.
//!
//! [`EdgeError`] covers every failure a render call can surface: missing
//! sources, evaluator rejections, malformed directives, layout cycles,
//! configuration problems, and I/O.

use thiserror::Error;

/// The primary error type for edge.
///
/// Each variant maps to an HTTP status code via [`EdgeError::status_code`],
/// which the HTTP adapter uses when a render call fails.
#[derive(Error, Debug)]
pub enum EdgeError {
    // ── Templates ────────────────────────────────────────────────────

    /// The requested template has no backing source.
    #[error("Template does not exist: {0}")]
    TemplateDoesNotExist(String),

    /// The expression evaluator rejected an expression or a context value.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// A directive or expression marker could not be parsed.
    ///
    /// `offset` is the byte offset into the source being compiled.
    #[error("Malformed directive at byte {offset}: {message}")]
    MalformedDirective {
        /// What was wrong.
        message: String,
        /// Byte offset of the offending construct.
        offset: usize,
    },

    /// A layout chain names a template that is already part of the chain.
    #[error("Cyclic layout: {}", .0.join(" -> "))]
    CyclicLayout(Vec<String>),

    /// A layout chain is longer than the configured maximum.
    #[error("Layout chain exceeds the maximum depth of {0}")]
    LayoutDepthExceeded(usize),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// A value could not be converted into a render context.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ── Security ─────────────────────────────────────────────────────

    /// A template name tried to escape the template directory.
    #[error("Suspicious operation: {0}")]
    SuspiciousOperation(String),
}

impl EdgeError {
    /// Shorthand for building a [`EdgeError::MalformedDirective`].
    pub fn malformed(message: impl Into<String>, offset: usize) -> Self {
        Self::MalformedDirective {
            message: message.into(),
            offset,
        }
    }

    /// Returns the byte offset of a malformed directive, if this is one.
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Self::MalformedDirective { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Returns the HTTP status code associated with this error.
    ///
    /// - `TemplateDoesNotExist` -> 404
    /// - `SuspiciousOperation` -> 403
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::TemplateDoesNotExist(_) => 404,
            Self::SuspiciousOperation(_) => 403,
            Self::Evaluation(_)
            | Self::MalformedDirective { .. }
            | Self::CyclicLayout(_)
            | Self::LayoutDepthExceeded(_)
            | Self::ConfigurationError(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }
}

/// A convenience type alias for `Result<T, EdgeError>`.
pub type EdgeResult<T> = Result<T, EdgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_error_status_codes() {
        assert_eq!(EdgeError::TemplateDoesNotExist("x".into()).status_code(), 404);
        assert_eq!(EdgeError::SuspiciousOperation("x".into()).status_code(), 403);
        assert_eq!(EdgeError::Evaluation("x".into()).status_code(), 500);
        assert_eq!(EdgeError::malformed("x", 3).status_code(), 500);
        assert_eq!(EdgeError::CyclicLayout(vec![]).status_code(), 500);
        assert_eq!(EdgeError::LayoutDepthExceeded(4).status_code(), 500);
    }

    #[test]
    fn test_malformed_display_includes_offset() {
        let err = EdgeError::malformed("unterminated section", 12);
        assert_eq!(
            err.to_string(),
            "Malformed directive at byte 12: unterminated section"
        );
        assert_eq!(err.offset(), Some(12));
        assert_eq!(EdgeError::Evaluation("x".into()).offset(), None);
    }

    #[test]
    fn test_cyclic_layout_display() {
        let err = EdgeError::CyclicLayout(vec!["home".into(), "main".into(), "home".into()]);
        assert_eq!(err.to_string(), "Cyclic layout: home -> main -> home");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let edge_err: EdgeError = io_err.into();
        assert_eq!(edge_err.status_code(), 500);
        assert!(edge_err.to_string().contains("denied"));
    }
}
