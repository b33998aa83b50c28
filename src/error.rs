//! Error types for the Myrtus library.

use std::path::Path;

use thiserror::Error;

use crate::dictionary::TermHandle;
use crate::index::DocId;

/// Main error type for Myrtus operations.
#[derive(Error, Debug)]
pub enum MyrtusError {
    /// A caller contract violation (empty term, zero passed to the gamma
    /// encoder, zero-sized chunk, and so on). Rejected before any state
    /// mutation takes place.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A gamma bitstream ended mid-code or an unary prefix never terminated.
    #[error("Malformed bitstream: {0}")]
    MalformedBitstream(String),

    /// A dictionary blob or its offset table is truncated or structurally
    /// inconsistent.
    #[error("Malformed dictionary: {0}")]
    MalformedDictionary(String),

    /// A postings blob or its offset table is truncated or structurally
    /// inconsistent.
    #[error("Malformed postings blob: {0}")]
    MalformedPostings(String),

    /// A handle referenced by one structure is absent from the other.
    /// Indicates cross-reference corruption and is not recoverable.
    #[error("Handle not found: {0}")]
    HandleNotFound(TermHandle),

    /// A single document could not be read or tokenized. Isolated per
    /// document; never aborts sibling workers unless fail-fast is requested.
    #[error("Worker I/O failure for document {doc_id} ({path}): {message}")]
    WorkerIo {
        doc_id: DocId,
        path: String,
        message: String,
    },

    /// Generic I/O error from the artifact files themselves.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MyrtusError {
    /// Create an invalid input error.
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        MyrtusError::InvalidInput(message.into())
    }

    /// Create a malformed bitstream error.
    pub fn malformed_bitstream<S: Into<String>>(message: S) -> Self {
        MyrtusError::MalformedBitstream(message.into())
    }

    /// Create a malformed dictionary error.
    pub fn malformed_dictionary<S: Into<String>>(message: S) -> Self {
        MyrtusError::MalformedDictionary(message.into())
    }

    /// Create a malformed postings error.
    pub fn malformed_postings<S: Into<String>>(message: S) -> Self {
        MyrtusError::MalformedPostings(message.into())
    }

    /// Create a worker I/O failure for a single document.
    pub fn worker_io(doc_id: DocId, path: &Path, source: &std::io::Error) -> Self {
        MyrtusError::WorkerIo {
            doc_id,
            path: path.display().to_string(),
            message: source.to_string(),
        }
    }
}

/// Result type alias for Myrtus operations.
pub type Result<T> = std::result::Result<T, MyrtusError>;
