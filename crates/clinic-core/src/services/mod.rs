//! Record-keeping services.
//!
//! [`Clinic`] owns the database, clock, configuration and identifier
//! randomness; the per-record services borrow it.

mod appointments;
mod dashboard;
mod examinations;
mod patients;

pub use appointments::AppointmentLedger;
pub use dashboard::{Dashboard, DashboardStats, DashboardSummary, HealthStatus};
pub use examinations::ExaminationRecords;
pub use patients::PatientRegistry;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::{Clock, SystemClock};
use crate::config::ClinicConfig;
use crate::db::{Database, DbError, DbResult};
use crate::error::ClinicResult;
use crate::identifiers::{IdentifierGenerator, IdentifierKind};
use crate::models::{Appointment, AppointmentListing, Patient};

/// Entry point to the clinic records.
pub struct Clinic {
    db: Database,
    clock: Arc<dyn Clock>,
    config: ClinicConfig,
    rng: Mutex<StdRng>,
}

impl Clinic {
    /// Build a clinic over an opened database.
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: ClinicConfig) -> Self {
        Self {
            db,
            clock,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Open the database named by `config` with the system clock.
    pub fn open(config: ClinicConfig) -> ClinicResult<Self> {
        let db = Database::open(config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "opened clinic database");
        Ok(Self::new(db, Arc::new(SystemClock), config))
    }

    /// In-memory clinic with the system clock.
    pub fn open_in_memory(config: ClinicConfig) -> ClinicResult<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::new(db, Arc::new(SystemClock), config))
    }

    /// Replace the identifier randomness, e.g. with a seeded generator.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn patients(&self) -> PatientRegistry<'_> {
        PatientRegistry::new(self)
    }

    pub fn appointments(&self) -> AppointmentLedger<'_> {
        AppointmentLedger::new(self)
    }

    pub fn examinations(&self) -> ExaminationRecords<'_> {
        ExaminationRecords::new(self)
    }

    pub fn dashboard(&self) -> Dashboard<'_> {
        Dashboard::new(self)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Draw an identifier of `kind` that `exists` reports as free.
    pub(crate) fn generate_identifier<F>(
        &self,
        kind: IdentifierKind,
        now: NaiveDateTime,
        exists: F,
    ) -> ClinicResult<String>
    where
        F: FnMut(&str) -> ClinicResult<bool>,
    {
        let generator = IdentifierGenerator::new(kind, self.config.identifier_max_attempts());
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        generator.generate(&mut *rng, now, exists)
    }
}

/// Pair each appointment with its patient, preserving order.
pub(crate) fn attach_patients(
    db: &Database,
    appointments: Vec<Appointment>,
) -> DbResult<Vec<AppointmentListing>> {
    let ids: Vec<&str> = appointments.iter().map(|a| a.patient_id.as_str()).collect();
    let patients = db.get_patients_by_ids(&ids)?;

    appointments
        .into_iter()
        .map(|appointment| {
            let patient = lookup(&patients, &appointment.patient_id, "patient")?;
            Ok(AppointmentListing {
                appointment,
                patient,
            })
        })
        .collect()
}

/// Clone a loaded record; several rows may share one.
pub(crate) fn lookup<T: Clone>(
    loaded: &HashMap<String, T>,
    id: &str,
    entity: &str,
) -> DbResult<T> {
    loaded
        .get(id)
        .cloned()
        .ok_or_else(|| DbError::NotFound(format!("{} {}", entity, id)))
}

pub(crate) fn load_patient(db: &Database, id: &str) -> ClinicResult<Patient> {
    db.get_patient(id)?
        .ok_or_else(|| crate::error::ClinicError::not_found("Patient", id))
}

pub(crate) fn load_appointment(db: &Database, id: &str) -> ClinicResult<Appointment> {
    db.get_appointment(id)?
        .ok_or_else(|| crate::error::ClinicError::not_found("Appointment", id))
}
