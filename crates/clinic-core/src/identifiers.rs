//! Human-readable record identifiers.
//!
//! Medical record numbers are `MR` + year + 4-digit sequence; appointment
//! numbers are `APT` + `YYYYMMDD` + 3-digit sequence. Sequences are random and
//! retried on collision up to a fixed number of attempts.

use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use rand::Rng;
use serde::Serialize;

use crate::error::{ClinicError, ClinicResult};

/// Which identifier is being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    MedicalRecordNumber,
    AppointmentNumber,
}

impl IdentifierKind {
    /// Largest sequence value; sequences start at 1.
    pub fn max_sequence(&self) -> u32 {
        match self {
            IdentifierKind::MedicalRecordNumber => 9999,
            IdentifierKind::AppointmentNumber => 999,
        }
    }

    /// Render the identifier for `now` and a sequence number.
    pub fn format(&self, now: NaiveDateTime, sequence: u32) -> String {
        match self {
            IdentifierKind::MedicalRecordNumber => {
                format!("MR{:04}{:04}", now.year(), sequence)
            }
            IdentifierKind::AppointmentNumber => {
                format!("APT{}{:03}", now.format("%Y%m%d"), sequence)
            }
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::MedicalRecordNumber => f.write_str("medical record number"),
            IdentifierKind::AppointmentNumber => f.write_str("appointment number"),
        }
    }
}

/// Generates identifiers not yet present in storage.
pub struct IdentifierGenerator {
    kind: IdentifierKind,
    max_attempts: u32,
}

impl IdentifierGenerator {
    pub fn new(kind: IdentifierKind, max_attempts: u32) -> Self {
        Self {
            kind,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draw random candidates until `exists` reports one as free.
    ///
    /// Fails with [`ClinicError::IdentifierSpaceExhausted`] after `max_attempts`
    /// collisions. The result is only unique if the caller inserts it within the
    /// same transaction as the checks.
    pub fn generate<R, F>(
        &self,
        rng: &mut R,
        now: NaiveDateTime,
        mut exists: F,
    ) -> ClinicResult<String>
    where
        R: Rng + ?Sized,
        F: FnMut(&str) -> ClinicResult<bool>,
    {
        for attempt in 1..=self.max_attempts {
            let sequence = rng.gen_range(1..=self.kind.max_sequence());
            let candidate = self.kind.format(now, sequence);
            if !exists(&candidate)? {
                return Ok(candidate);
            }
            tracing::debug!(kind = %self.kind, %candidate, attempt, "identifier collision");
        }

        tracing::warn!(kind = %self.kind, attempts = self.max_attempts, "identifier space exhausted");
        Err(ClinicError::IdentifierSpaceExhausted {
            kind: self.kind,
            attempts: self.max_attempts,
        })
    }
}
