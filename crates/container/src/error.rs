use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("source is missing the required `{0}` column")]
    MissingColumn(&'static str),
    #[error("unterminated quoted field on line {line}")]
    UnterminatedQuote { line: usize },
    #[error("entry too large for a u32 length prefix: {0} bytes")]
    EntryTooLarge(usize),
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("corrupt container: {0}")]
    Corrupt(String),
}

impl ContainerError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        ContainerError::Corrupt(msg.into())
    }
}
