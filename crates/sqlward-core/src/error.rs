use thiserror::Error;

/// A statement could not be built from the given parts.
///
/// Raised before anything is sent to the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("no values given for {0}")]
    EmptyValues(&'static str),

    #[error("rows of a multi-row insert must set the same columns")]
    MismatchedRows,

    #[error("table '{0}' has no primary key")]
    MissingPrimaryKey(String),

    #[error("raw SQL has {placeholders} placeholders but {params} parameters")]
    RawParameterCount { placeholders: usize, params: usize },

    #[error("{operation} is not supported on {statement} statements")]
    Unsupported {
        operation: &'static str,
        statement: &'static str,
    },
}
