//! Error types for splitting
//!
//! Structural errors are fatal to the splitter instance that produced them;
//! recovery (skip the file, retry the source) belongs to the caller.

use thiserror::Error;

/// Errors surfaced while splitting a document
#[derive(Debug, Error)]
pub enum SplitError {
    /// Structural XML violation: mismatched tags, unterminated quotes,
    /// input ending inside an element being captured.
    #[error("malformed markup at byte {offset}: {reason}")]
    MalformedMarkup { offset: usize, reason: String },

    /// Failure reading from the input source. Never reinterpreted as a
    /// markup error.
    #[error("read from input source failed")]
    Io(#[from] std::io::Error),

    /// A namespace prefix used inside a matched fragment has no binding
    /// in scope at the point of the match.
    #[error("unbound namespace prefix `{prefix}` at byte {offset}")]
    NamespaceResolution { prefix: String, offset: usize },

    /// The path expression handed to the buffered splitter did not parse.
    #[error("invalid path expression: {0}")]
    Path(String),
}

impl SplitError {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        SplitError::MalformedMarkup {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn unbound_prefix(prefix: &[u8], offset: usize) -> Self {
        SplitError::NamespaceResolution {
            prefix: String::from_utf8_lossy(prefix).into_owned(),
            offset,
        }
    }
}
