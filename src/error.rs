use thiserror::Error;

use crate::query::QueryError;
use crate::writer::WriteFailures;

#[derive(Error, Debug)]
pub enum NagcfgError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error at line {line}, column {column}: {cause}")]
    Parse { line: usize, column: usize, cause: ParseCause },
    #[error("Identifier error: {0}")]
    Identifier(String),
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    #[error("Failed to append {failed} of the {total} given objects")]
    Append { failed: usize, total: usize },
    #[error("Write error: {0}")]
    Write(#[from] WriteFailures),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

/// What went wrong while tokenizing a definition block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCause {
    #[error("unknown object type {0:?}")]
    UnknownType(String),
    #[error("block opener without an object type")]
    MissingType,
    #[error("expected `define` before block opener, found {0:?}")]
    ExpectedDefine(String),
    #[error("block opener inside an open definition block")]
    NestedBlock,
    #[error("end of input inside a definition block")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, NagcfgError>;

// Helper conversions
impl From<serde_json::Error> for NagcfgError {
    fn from(e: serde_json::Error) -> Self { Self::Serialization(e.to_string()) }
}
impl From<config::ConfigError> for NagcfgError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
