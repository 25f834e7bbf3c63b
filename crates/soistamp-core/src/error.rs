//! Error types for soistamp-core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("duplicate node: {0}")]
    DuplicateNode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
