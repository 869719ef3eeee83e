//! Runtime configuration.
//!
//! Resolved once at startup and passed into [`crate::Clinic`]; services never
//! read environment variables themselves.

use std::path::{Path, PathBuf};

use crate::error::{ClinicError, ClinicResult};

pub const DEFAULT_DATABASE_PATH: &str = "clinic.db";
pub const DEFAULT_IDENTIFIER_MAX_ATTEMPTS: u32 = 50;
pub const DEFAULT_PATIENTS_PER_PAGE: u32 = 10;
pub const DEFAULT_RECORDS_PER_PAGE: u32 = 15;

pub const ENV_DATABASE_PATH: &str = "CLINIC_DATABASE_PATH";
pub const ENV_IDENTIFIER_MAX_ATTEMPTS: &str = "CLINIC_IDENTIFIER_MAX_ATTEMPTS";
pub const ENV_PATIENTS_PER_PAGE: &str = "CLINIC_PATIENTS_PER_PAGE";
pub const ENV_RECORDS_PER_PAGE: &str = "CLINIC_RECORDS_PER_PAGE";

/// Clinic configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicConfig {
    database_path: PathBuf,
    identifier_max_attempts: u32,
    patients_per_page: u32,
    records_per_page: u32,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            identifier_max_attempts: DEFAULT_IDENTIFIER_MAX_ATTEMPTS,
            patients_per_page: DEFAULT_PATIENTS_PER_PAGE,
            records_per_page: DEFAULT_RECORDS_PER_PAGE,
        }
    }
}

impl ClinicConfig {
    /// Create a validated configuration.
    pub fn new(
        database_path: PathBuf,
        identifier_max_attempts: u32,
        patients_per_page: u32,
        records_per_page: u32,
    ) -> ClinicResult<Self> {
        if database_path.as_os_str().is_empty() {
            return Err(ClinicError::Config("database_path cannot be empty".into()));
        }
        for (name, value) in [
            ("identifier_max_attempts", identifier_max_attempts),
            ("patients_per_page", patients_per_page),
            ("records_per_page", records_per_page),
        ] {
            if value == 0 {
                return Err(ClinicError::Config(format!("{} must be positive", name)));
            }
        }

        Ok(Self {
            database_path,
            identifier_max_attempts,
            patients_per_page,
            records_per_page,
        })
    }

    /// Read `CLINIC_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> ClinicResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClinicConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ClinicResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u32| -> ClinicResult<u32> {
            match value(key) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| ClinicError::Config(format!("{} is not a number: {}", key, raw))),
                None => Ok(default),
            }
        };

        Self::new(
            value(ENV_DATABASE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            number(ENV_IDENTIFIER_MAX_ATTEMPTS, DEFAULT_IDENTIFIER_MAX_ATTEMPTS)?,
            number(ENV_PATIENTS_PER_PAGE, DEFAULT_PATIENTS_PER_PAGE)?,
            number(ENV_RECORDS_PER_PAGE, DEFAULT_RECORDS_PER_PAGE)?,
        )
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn identifier_max_attempts(&self) -> u32 {
        self.identifier_max_attempts
    }

    pub fn patients_per_page(&self) -> u32 {
        self.patients_per_page
    }

    pub fn records_per_page(&self) -> u32 {
        self.records_per_page
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> ClinicResult<Self> {
        self.database_path = path.into();
        Self::new(
            self.database_path,
            self.identifier_max_attempts,
            self.patients_per_page,
            self.records_per_page,
        )
    }

    pub fn with_identifier_max_attempts(mut self, attempts: u32) -> ClinicResult<Self> {
        self.identifier_max_attempts = attempts;
        Self::new(
            self.database_path,
            self.identifier_max_attempts,
            self.patients_per_page,
            self.records_per_page,
        )
    }
}
