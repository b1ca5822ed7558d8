use miette::Diagnostic;
use thiserror::Error;

use crate::forced_rollback::ForceRollbackError;
use crate::pattern::PatternParseError;
use crate::store::StoreError;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("client error: {0}")]
    Client(String),

    #[error("block decode error: {0}")]
    Decode(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pattern error: {0}")]
    Pattern(#[from] PatternParseError),

    #[error("forced rollback error: {0}")]
    ForceRollback(#[from] ForceRollbackError),

    #[error("server error: {0}")]
    Server(String),

    #[error("{0}")]
    Message(String),
}

impl Error {
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    pub fn client(msg: impl std::fmt::Display) -> Self {
        Error::Client(msg.to_string())
    }

    pub fn decode(msg: impl std::fmt::Display) -> Self {
        Error::Decode(msg.to_string())
    }

    pub fn server(msg: impl std::fmt::Display) -> Self {
        Error::Server(msg.to_string())
    }

    pub fn message(msg: impl std::fmt::Display) -> Self {
        Error::Message(msg.to_string())
    }
}
