//! The engine's error taxonomy.
//!
//! Every fatal condition the engine can raise is one variant of
//! [`EngineError`]. Two kinds named in the design are deliberately *not*
//! variants here, because they never surface as an `Err` to a caller:
//!
//! - `QueryFailure` *is* represented (a [`Source`](crate::source::Source) is
//!   free to return it from `query`/`intersect` when it wants strict
//!   behavior), but every call site inside the join engine and aggregator
//!   logs it and treats the query as empty, per the error table.
//! - `CancellationCleanup` has no variant at all: it names the teardown path
//!   a [`Slice`](crate::engine::Slice) or worker pool takes when a streaming
//!   iterator is dropped before being exhausted, and in this crate that path
//!   is just `Drop` — see [`crate::pool::Executor`].
use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    /// Missing config file, unknown source `type`, or a malformed section.
    Config(String),
    /// Unknown column name, or a required coordinate column is missing.
    Schema(String),
    /// `groupby` on a column whose source never built a group index for it.
    IndexMissing { source: String, column: String },
    /// A source-level failure answering a single range query.
    QueryFailure {
        source: String,
        sequence: String,
        begin: i64,
        end: i64,
        reason: String,
    },
    /// `len`/`count` requested on a merge view without iterating it.
    UnsizedView(String),
    /// A worker thread's task panicked.
    WorkerFailure(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(msg) => write!(f, "configuration error: {msg}"),
            EngineError::Schema(msg) => write!(f, "schema error: {msg}"),
            EngineError::IndexMissing { source, column } => write!(
                f,
                "no group index was built for column '{column}' on source '{source}'"
            ),
            EngineError::QueryFailure {
                source,
                sequence,
                begin,
                end,
                reason,
            } => write!(
                f,
                "query failed on source '{source}' at {sequence}:{begin}-{end}: {reason}"
            ),
            EngineError::UnsizedView(msg) => write!(f, "unsized view: {msg}"),
            EngineError::WorkerFailure(msg) => write!(f, "worker failure: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type Result<T> = std::result::Result<T, EngineError>;
