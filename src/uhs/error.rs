//! Custom error types for the uhs-reader crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Only the fatal failure modes appear here. Recoverable anomalies
/// (an unreadable binary range, an unknown hunk type, an unknown escape)
/// are reported through the [`DiagnosticSink`](crate::uhs::report::DiagnosticSink)
/// and the parse continues with a substitute.
#[derive(Debug, Error)]
pub enum UhsError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not begin with the "UHS" magic line.
    #[error("Not a UHS file")]
    NotAUhsFile,

    /// A numeric field in the four-line header failed to parse.
    #[error("Malformed header on line {line}: {detail}")]
    MalformedHeader { line: usize, detail: String },

    /// A numeric field or index inside a hunk failed to parse, or a hunk
    /// referenced a line outside the file.
    #[error("Malformed hunk near line {line}: {detail}")]
    MalformedHunk { line: usize, detail: String },
}

impl UhsError {
    /// The best-available physical line number for diagnostics, if the
    /// error carries one.
    pub fn line(&self) -> Option<usize> {
        match self {
            UhsError::MalformedHeader { line, .. } => Some(*line),
            UhsError::MalformedHunk { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// A convenience `Result` type alias using the crate's `UhsError` type.
pub type Result<T> = std::result::Result<T, UhsError>;
