use std::fmt::Display;

use bincode::ErrorKind;

use crate::sql::types::DataType;

/// Custom Result type for PesaDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PesaDB
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// SQL syntax error
    Parse(String),
    /// The named table is not in the catalog
    TableNotFound(String),
    /// CREATE TABLE on a name already in the catalog
    DuplicateTable(String),
    /// Column reference that does not resolve against the row layout
    ColumnNotFound(String),
    /// NULL (or no value) for a column that does not accept it
    NotNullViolation(String),
    /// Value of the wrong runtime type for a column
    TypeMismatch { column: String, expected: DataType },
    /// Duplicate value on a primary key or unique column
    UniqueViolation { column: String, value: String },
    /// Malformed table definition
    InvalidSchema(String),
    /// Statement shape that parses but cannot be executed
    Unimplemented(String),
    /// Internal error (storage, serialization, etc.)
    Internal(String),
}

impl From<std::num::ParseIntError> for Error {
    fn from(value: std::num::ParseIntError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<std::num::ParseFloatError> for Error {
    fn from(value: std::num::ParseFloatError) -> Self {
        Error::Parse(value.to_string())
    }
}

impl From<Box<ErrorKind>> for Error {
    fn from(value: Box<ErrorKind>) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Internal(value.to_string())
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(value: tempfile::PersistError) -> Self {
        Error::Internal(value.error.to_string())
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "syntax error: {}", err),
            Error::TableNotFound(table) => write!(f, "table {} not found", table),
            Error::DuplicateTable(table) => write!(f, "table {} already exists", table),
            Error::ColumnNotFound(column) => write!(f, "column {} not found", column),
            Error::NotNullViolation(column) => write!(f, "column {} cannot be null", column),
            Error::TypeMismatch { column, expected } => {
                write!(f, "column {} expects {}", column, expected)
            }
            Error::UniqueViolation { column, value } => write!(
                f,
                "unique constraint violation on {}: value {} already exists",
                column, value
            ),
            Error::InvalidSchema(err) => write!(f, "invalid schema: {}", err),
            Error::Unimplemented(what) => write!(f, "execution for {} not implemented", what),
            Error::Internal(err) => write!(f, "internal error {}", err),
        }
    }
}
