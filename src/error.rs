use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading count tables, joining them and writing the matrix.
#[derive(Error, Debug)]
pub enum MergeError {
    /// No input count tables were supplied.
    #[error("at least one input count table is required")]
    NoInputs,

    /// An input count table does not exist.
    #[error("input count table {0:?} does not exist")]
    InputNotFound(PathBuf),

    /// A line of a count table did not split into a non-empty gene id and count.
    #[error("{path:?}, line {line}: expected 2 non-empty tab-separated fields (gene id, count), found {fields} field(s)")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        fields: usize,
    },

    /// The output matrix could not be created or written.
    #[error("cannot write the merged matrix to {path:?}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two inputs derive the same sample label. Only raised under
    /// [`CollisionPolicy::Error`](crate::options::CollisionPolicy::Error).
    #[error("inputs {first:?} and {second:?} both map to sample label {label:?}")]
    LabelCollision {
        label: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A sample label equals the name of the gene index column.
    #[error("sample label {0:?} clashes with the index column name; pick another index name")]
    IndexNameClash(String),

    /// IO error while reading an input.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Failed to assemble or serialize the matrix.
    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

/// Result type alias for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Errors raised while driving the external SRA tools.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The external tool could not be started at all.
    #[error("failed to launch {tool:?}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The external tool ran but exited unsuccessfully.
    #[error("{tool:?} exited with {status}")]
    ToolFailed {
        tool: String,
        status: std::process::ExitStatus,
    },

    /// IO error while compressing or cleaning up files.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
