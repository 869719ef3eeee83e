//! Domain models for the clinic records system.

mod appointment;
mod examination;
mod page;
mod patient;

pub use appointment::*;
pub use examination::*;
pub use page::*;
pub use patient::*;

use thiserror::Error;

/// Unrecognized text for one of the status/gender enums.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
