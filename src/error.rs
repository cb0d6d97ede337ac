//! Error taxonomy for the index facade and its backends.
//!
//! Every public operation returns [`Result<T>`]. Invariant violations inside
//! the graph engine itself (heap underflow, a dangling arena index, a missing
//! neighbor that bookkeeping promised would exist) are bugs, not recoverable
//! conditions, and are raised with `panic!`/`unreachable!` rather than this
//! enum — see the module docs on [`crate::hnsw`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid dimensions: expected {expected}, got {found}")]
    InvalidDimensions { expected: usize, found: usize },

    #[error("invalid method/metric selector")]
    InvalidMethod,

    #[error("id must be nonzero")]
    InvalidId,

    #[error("vector is invalid: {0}")]
    InvalidVector(String),

    #[error("id {0} already present in index")]
    DuplicatedEntry(u64),

    #[error("id {0} not found in index")]
    NotFoundId(u64),

    #[error("index is empty")]
    IndexEmpty,

    #[error("index has not been initialized")]
    InvalidInit,

    #[error("file I/O error: {0}")]
    FileIo(#[from] std::io::Error),

    #[error("invalid or corrupt file: {0}")]
    InvalidFile(String),

    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("system error: {0}")]
    SystemError(String),
}
