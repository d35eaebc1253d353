//! Typed error taxonomy.
//!
//! All fallible APIs in this crate return `eyre::Result`; the variants below
//! are attached to the report at the failure boundary so callers can
//! `downcast_ref::<Error>()` to branch on category. None of these are caught
//! or retried inside the crate.

use thiserror::Error;

/// Error categories surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or incomplete schema description. Fatal at compile time;
    /// no partial compilation is retained.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Underlying relational call failure, wrapped with the offending
    /// statement text.
    #[error("statement failed: {0}")]
    Statement(String),

    /// Batched relational call failure, carrying the first chained
    /// diagnostic from the driver.
    #[error("batch statement failed: {statement}: {detail}")]
    Batch { statement: String, detail: String },

    /// Text-to-typed-value parse failure during line ingestion.
    #[error("{column}: cannot convert {text:?}")]
    Conversion { column: String, text: String },

    /// A string value longer than its fixed frame field.
    #[error("value of {actual} bytes exceeds {width}-byte frame field {field}")]
    FrameOverflow {
        field: usize,
        width: usize,
        actual: usize,
    },
}

impl Error {
    pub(crate) fn schema(msg: impl Into<String>) -> eyre::Report {
        eyre::Report::new(Error::Schema(msg.into()))
    }

    pub(crate) fn conversion(column: impl Into<String>, text: impl Into<String>) -> eyre::Report {
        eyre::Report::new(Error::Conversion {
            column: column.into(),
            text: text.into(),
        })
    }

    pub(crate) fn frame_overflow(field: usize, width: usize, actual: usize) -> eyre::Report {
        eyre::Report::new(Error::FrameOverflow {
            field,
            width,
            actual,
        })
    }
}
