use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the mapping build and conversion core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no mapping pair could be extracted from any input table")]
    NoMappingFound,
    #[error("could not identify legacy/unicode columns in table {table}")]
    ColumnIdentificationFailed { table: usize },
    #[error("failed to load mapping from {}: {reason}", path.display())]
    MappingLoadFailed { path: PathBuf, reason: String },
    #[error("not a unicode code point: {value:?}")]
    HexParseSkipped { value: String },
    #[error("grid error on sheet {sheet:?}: {reason}")]
    Grid { sheet: String, reason: String },
    #[error("invalid raw table input {}: {reason}", path.display())]
    TableInput { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn load_failed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MappingLoadFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn grid(sheet: impl Into<String>, reason: impl ToString) -> Self {
        Self::Grid {
            sheet: sheet.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
