use container::ContainerError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Container(ContainerError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("cannot load an empty buffer")]
    EmptyBuffer,
    #[error("key not found: {0:?}")]
    KeyNotFound(String),
    #[error("store is read-only: {0} is not supported")]
    ReadOnly(&'static str),
    #[error("engine has been disposed")]
    Disposed,
    #[error("corrupt value region: {0}")]
    Corrupt(String),
    #[error("value at offset {offset} is not valid utf-8")]
    InvalidUtf8 { offset: u64 },
}

impl From<ContainerError> for EngineError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::SourceNotFound(path) => EngineError::SourceNotFound(path),
            ContainerError::Io(e) => EngineError::Io(e),
            other => EngineError::Container(other),
        }
    }
}
