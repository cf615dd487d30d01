use sled::transaction::TransactionError;
use thiserror::Error;

/// Failures of the persistent layer. All of them are fatal for a crawl or a
/// PageRank run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("graph inconsistency: {0}")]
    GraphInconsistency(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<TransactionError<StorageError>> for StorageError {
    fn from(e: TransactionError<StorageError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(db) => StorageError::Db(db),
        }
    }
}
