//! Service-level errors.

use thiserror::Error;

use crate::db::DbError;
use crate::identifiers::IdentifierKind;
use crate::validation::ValidationErrors;

/// Errors surfaced by the clinic services.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No free {kind} after {attempts} attempts")]
    IdentifierSpaceExhausted { kind: IdentifierKind, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ClinicError {
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        ClinicError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ClinicError {
    fn from(e: rusqlite::Error) -> Self {
        ClinicError::Database(DbError::from(e))
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
