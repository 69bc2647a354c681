//! Error types for the sd-xmltv export pipeline
//!
//! The error system is hierarchical: leaf errors describe exactly one failure
//! domain (timestamp derivation, writer misuse, upstream fetch) and everything
//! converges into [`ExportError`] at the pipeline boundary. A failure anywhere
//! aborts the whole export run; there is no partial-success state.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Timestamp derivation errors
///
/// The XMLTV wire format is a fixed 14-digit `YYYYMMDDHHMMSS` string, so any
/// timestamp that cannot be rendered with a 4-digit year is unrepresentable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Year does not fit the 4-digit wire format
    #[error("year {year} is outside the representable range 0000-9999")]
    YearOutOfRange { year: i32 },

    /// Adding the duration to the start time left the calendar range
    #[error("stop time overflows calendar range (start {start}, duration {duration_secs}s)")]
    StopOverflow {
        start: DateTime<Utc>,
        duration_secs: u32,
    },
}

/// A [`FormatError`] tagged with the identity of the record that caused it
///
/// Emitted by the element builders so the operator can tell which programme
/// aborted the run.
#[derive(Error, Debug)]
#[error("programme '{program_id}' (channel '{channel_id}'): {source}")]
pub struct RecordFormatError {
    pub program_id: String,
    pub channel_id: String,
    #[source]
    pub source: FormatError,
}

/// Stream writer misuse
///
/// Scopes must be closed in strict LIFO order and the document must be fully
/// closed before the sink is finished. Violations are defects in the calling
/// code, never recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// `close_scope` was called with no scope open
    #[error("close_scope called with no open scope")]
    Underflow,

    /// Text was written outside any open scope
    #[error("text written outside any open scope")]
    TextOutsideScope,

    /// The stream was finished while scopes were still open
    #[error("{depth} scope(s) still open at end of stream")]
    UnclosedScopes { depth: usize },
}

/// Delta store failures (loading or persisting hash state)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Upstream listings source failures
#[derive(Error, Debug)]
pub enum SourceError {
    /// A fetch method was called before `login()`
    #[error("call login() first")]
    LoginRequired,

    /// The provider returned an error envelope
    #[error("Schedules Direct error {code}: {message}")]
    Api { code: i64, message: String },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned a payload we could not decode
    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// A request URL could not be constructed
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    /// Delta store failure during a fetch
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level export error
///
/// Everything the pipeline can fail with. The driver never catches these; it
/// propagates them to the caller, which decides what to do with the
/// (now unspecified) contents of the sink.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Record(#[from] RecordFormatError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
