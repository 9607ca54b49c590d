use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is corrupt or not a usable database: {}", .0.display())]
    FileCorrupt(PathBuf),

    #[error("invalid column definition: {0}")]
    InvalidColumn(String),

    #[error("schema conflict on table {table}: {message}")]
    SchemaConflict { table: String, message: String },

    #[error("version marker unreadable: {0}")]
    VersionUnreadable(String),

    #[error("transaction aborted after {applied} of {total} statements: {source}")]
    TransactionFailure {
        applied: usize,
        total: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("order values are not a dense 1..{expected} permutation: {found:?}")]
    InvalidOrdering { expected: usize, found: Vec<i64> },

    #[error("no control with data label: {0}")]
    ControlNotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
