//! Error types for pgload

use thiserror::Error;

/// Result type alias for pgload operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping and database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Invalid caller input: bad destination, unknown column, empty data, empty suffix...
    #[error("Input error: {0}")]
    Input(String),

    /// Result columns that could not be mapped onto the destination record.
    #[error("{}", missing_destination_message(.columns))]
    SchemaMismatch { columns: Vec<String> },

    /// A single-row operation observed more than one row
    #[error("{0}")]
    TooManyRows(String),

    /// A single-row operation observed no rows
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A custom value conversion hook failed
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Transaction control failure (begin / commit)
    #[error("Transaction {action} failed: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: Box<OrmError>,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn missing_destination_message(columns: &[String]) -> String {
    if columns.len() == 1 {
        format!("missing destination name: {}", columns[0])
    } else {
        format!("missing destination names: {}", columns.join(", "))
    }
}

impl OrmError {
    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a too-many-rows error
    pub fn too_many_rows(message: impl Into<String>) -> Self {
        Self::TooManyRows(message.into())
    }

    /// Create a conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    pub(crate) fn transaction(action: &'static str, source: OrmError) -> Self {
        Self::Transaction {
            action,
            source: Box::new(source),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a too-many-rows error
    pub fn is_too_many_rows(&self) -> bool {
        matches!(self, Self::TooManyRows(_))
    }

    /// Check if this is a schema mismatch error
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }

    /// Check if this is an input error
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}
