//! Clinic Records Core Library
//!
//! Local record keeping for a clinic: patients, appointments and examinations,
//! stored in SQLite.
//!
//! # Architecture
//!
//! ```text
//!   Patient Registry ──── MR<yyyy><nnnn>
//!          │ 1-N
//!   Appointment Ledger ── APT<yyyymmdd><nnn>, upcoming / today windows
//!          │ 1-N                    ▲
//!   Examination Records ── BMI      │ ExaminationCompleted
//!          └────────────────────────┘ (same transaction)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence with filtered, paginated queries
//! - [`models`]: Domain types (Patient, Appointment, Examination, pages)
//! - [`services`]: Registry, ledger, examination records and dashboard
//! - [`validation`]: Field-level form validation
//! - [`identifiers`]: Record and appointment number generation
//! - [`clock`]: Injectable wall-clock

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod identifiers;
pub mod models;
pub mod services;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ClinicConfig;
pub use db::Database;
pub use error::{ClinicError, ClinicResult};
pub use events::ClinicEvent;
pub use models::{
    Appointment, AppointmentQuery, AppointmentStatus, AppointmentUpdate, Examination,
    ExaminationForm, ExaminationQuery, ExaminationStatus, Gender, NewAppointment, Page, Patient,
    PatientForm, PatientQuery, PatientStatus, TimeWindow,
};
pub use services::{
    AppointmentLedger, Clinic, Dashboard, DashboardStats, DashboardSummary, ExaminationRecords,
    HealthStatus, PatientRegistry,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use models::{Findings, PatientListing, Vitals};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicRecordsError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Identifier space exhausted: {0}")]
    IdentifierSpaceExhausted(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ClinicError> for ClinicRecordsError {
    fn from(e: ClinicError) -> Self {
        match e {
            ClinicError::Database(e) => ClinicRecordsError::DatabaseError(e.to_string()),
            ClinicError::Validation(e) => ClinicRecordsError::InvalidInput(e.to_string()),
            e @ ClinicError::NotFound { .. } => ClinicRecordsError::NotFound(e.to_string()),
            e @ ClinicError::IdentifierSpaceExhausted { .. } => {
                ClinicRecordsError::IdentifierSpaceExhausted(e.to_string())
            }
            ClinicError::Config(msg) => ClinicRecordsError::ConfigError(msg),
        }
    }
}

impl From<db::DbError> for ClinicRecordsError {
    fn from(e: db::DbError) -> Self {
        ClinicRecordsError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicRecordsError {
    fn from(e: serde_json::Error) -> Self {
        ClinicRecordsError::SerializationError(e.to_string())
    }
}

impl From<models::ParseEnumError> for ClinicRecordsError {
    fn from(e: models::ParseEnumError) -> Self {
        ClinicRecordsError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicRecordsError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicCore>, ClinicRecordsError> {
    let config = ClinicConfig::default().with_database_path(path)?;
    let clinic = Clinic::open(config)?;
    Ok(Arc::new(ClinicCore {
        clinic: Arc::new(Mutex::new(clinic)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicCore>, ClinicRecordsError> {
    let clinic = Clinic::open_in_memory(ClinicConfig::default())?;
    Ok(Arc::new(ClinicCore {
        clinic: Arc::new(Mutex::new(clinic)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    clinic: Arc<Mutex<Clinic>>,
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a patient and assign a medical record number.
    pub fn register_patient(&self, form: FfiPatientForm) -> Result<FfiPatient, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let patient = clinic.patients().register(form.try_into()?)?;
        Ok(patient.into())
    }

    pub fn update_patient(&self, id: String, form: FfiPatientForm) -> Result<FfiPatient, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let patient = clinic.patients().update(&id, form.try_into()?)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let patient = clinic.database().get_patient(&id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Patient list page; newest registration first.
    pub fn list_patients(
        &self,
        name_prefix: Option<String>,
        status: Option<String>,
        page: u32,
    ) -> Result<FfiPatientPage, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let query = PatientQuery {
            name_prefix,
            status: status.map(|s| s.parse()).transpose()?,
        };
        let listing = clinic.patients().list(&query, page)?;
        Ok(FfiPatientPage {
            total: listing.total,
            page: listing.page,
            per_page: listing.per_page,
            items: listing.items.into_iter().map(|l| l.into()).collect(),
        })
    }

    /// Active patients ordered by name.
    pub fn active_patients(&self) -> Result<Vec<FfiPatient>, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let patients = clinic.patients().active()?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Full patient chart as JSON.
    pub fn patient_record_json(&self, id: String) -> Result<String, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let record = clinic.patients().record(&id)?;
        Ok(serde_json::to_string(&record)?)
    }

    pub fn delete_patient(&self, id: String) -> Result<(), ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        clinic.patients().delete(&id)?;
        Ok(())
    }

    // =========================================================================
    // Appointment Operations
    // =========================================================================

    /// Book an appointment on behalf of `actor_id`.
    pub fn book_appointment(
        &self,
        request: FfiNewAppointment,
        actor_id: String,
    ) -> Result<FfiAppointment, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let appointment = clinic
            .appointments()
            .book(request.try_into()?, &actor_id)?;
        Ok(appointment.into())
    }

    pub fn update_appointment(
        &self,
        id: String,
        update: FfiAppointmentUpdate,
    ) -> Result<FfiAppointment, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let appointment = clinic.appointments().update(&id, update.try_into()?)?;
        Ok(appointment.into())
    }

    pub fn get_appointment(&self, id: String) -> Result<Option<FfiAppointment>, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let appointment = clinic.database().get_appointment(&id)?;
        Ok(appointment.map(|a| a.into()))
    }

    /// Appointment list page; `window` is "upcoming" or "today".
    pub fn list_appointments(
        &self,
        patient_id: Option<String>,
        status: Option<String>,
        window: Option<String>,
        page: u32,
    ) -> Result<FfiAppointmentPage, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let query = AppointmentQuery {
            patient_id,
            status: status.map(|s| s.parse()).transpose()?,
            window: window.map(|w| w.parse()).transpose()?,
            ..AppointmentQuery::default()
        };
        let listing = clinic.appointments().list(&query, page)?;
        Ok(FfiAppointmentPage {
            total: listing.total,
            page: listing.page,
            per_page: listing.per_page,
            items: listing
                .items
                .into_iter()
                .map(|l| l.appointment.into())
                .collect(),
        })
    }

    /// Next `limit` non-cancelled appointments, soonest first.
    pub fn upcoming_appointments(&self, limit: u32) -> Result<Vec<FfiAppointment>, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let listing = clinic.appointments().upcoming(limit)?;
        Ok(listing.into_iter().map(|l| l.appointment.into()).collect())
    }

    pub fn today_appointments(&self) -> Result<Vec<FfiAppointment>, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let listing = clinic.appointments().today()?;
        Ok(listing.into_iter().map(|l| l.appointment.into()).collect())
    }

    /// Appointment with patient and examinations as JSON.
    pub fn appointment_detail_json(&self, id: String) -> Result<String, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let detail = clinic.appointments().detail(&id)?;
        Ok(serde_json::to_string(&detail)?)
    }

    pub fn delete_appointment(&self, id: String) -> Result<(), ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        clinic.appointments().delete(&id)?;
        Ok(())
    }

    // =========================================================================
    // Examination Operations
    // =========================================================================

    /// Record an examination; a completed one also completes the appointment.
    pub fn record_examination(
        &self,
        appointment_id: String,
        form: FfiExaminationForm,
        actor_id: String,
    ) -> Result<FfiExamination, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let examination =
            clinic
                .examinations()
                .record(&appointment_id, form.try_into()?, &actor_id)?;
        Ok(examination.into())
    }

    pub fn update_examination(
        &self,
        id: String,
        form: FfiExaminationForm,
    ) -> Result<FfiExamination, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let examination = clinic.examinations().update(&id, form.try_into()?)?;
        Ok(examination.into())
    }

    pub fn get_examination(&self, id: String) -> Result<Option<FfiExamination>, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let examination = clinic.database().get_examination(&id)?;
        Ok(examination.map(|e| e.into()))
    }

    pub fn list_examinations(
        &self,
        patient_id: Option<String>,
        appointment_id: Option<String>,
        status: Option<String>,
        page: u32,
    ) -> Result<FfiExaminationPage, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let query = ExaminationQuery {
            patient_id,
            appointment_id,
            status: status.map(|s| s.parse()).transpose()?,
        };
        let listing = clinic.examinations().list(&query, page)?;
        Ok(FfiExaminationPage {
            total: listing.total,
            page: listing.page,
            per_page: listing.per_page,
            items: listing
                .items
                .into_iter()
                .map(|d| d.examination.into())
                .collect(),
        })
    }

    pub fn delete_examination(&self, id: String) -> Result<(), ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        clinic.examinations().delete(&id)?;
        Ok(())
    }

    // =========================================================================
    // Dashboard Operations
    // =========================================================================

    pub fn dashboard_stats(&self) -> Result<FfiDashboardStats, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic.dashboard().stats()?.into())
    }

    /// Stats plus upcoming, recent and today lists as JSON.
    pub fn dashboard_json(&self) -> Result<String, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let summary = clinic.dashboard().summary()?;
        Ok(serde_json::to_string(&summary)?)
    }

    pub fn health(&self) -> Result<FfiHealth, ClinicRecordsError> {
        let clinic = self.clinic.lock()?;
        let health = clinic.dashboard().health();
        Ok(FfiHealth {
            status: health.status,
            timestamp: format_datetime(health.timestamp),
        })
    }
}

// =========================================================================
// FFI Types
// =========================================================================

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn date_arg(field: &str, value: &str) -> Result<NaiveDate, ClinicRecordsError> {
    clock::parse_date(value).ok_or_else(|| {
        ClinicRecordsError::InvalidInput(format!("{}: expected YYYY-MM-DD, got {}", field, value))
    })
}

fn datetime_arg(field: &str, value: &str) -> Result<NaiveDateTime, ClinicRecordsError> {
    clock::parse_datetime(value).ok_or_else(|| {
        ClinicRecordsError::InvalidInput(format!(
            "{}: expected YYYY-MM-DD HH:MM:SS, got {}",
            field, value
        ))
    })
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub medical_record_number: String,
    pub name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            medical_record_number: patient.medical_record_number,
            name: patient.name,
            date_of_birth: format_date(patient.date_of_birth),
            gender: patient.gender.to_string(),
            phone: patient.phone,
            email: patient.email,
            address: patient.address,
            emergency_contact_name: patient.emergency_contact_name,
            emergency_contact_phone: patient.emergency_contact_phone,
            medical_history: patient.medical_history,
            allergies: patient.allergies,
            status: patient.status.to_string(),
            created_at: format_datetime(patient.created_at),
            updated_at: format_datetime(patient.updated_at),
        }
    }
}

/// FFI-safe patient registration/edit form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientForm {
    pub name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub status: Option<String>,
}

impl TryFrom<FfiPatientForm> for PatientForm {
    type Error = ClinicRecordsError;

    fn try_from(form: FfiPatientForm) -> Result<Self, ClinicRecordsError> {
        Ok(PatientForm {
            name: form.name,
            date_of_birth: date_arg("date_of_birth", &form.date_of_birth)?,
            gender: form.gender.parse()?,
            phone: form.phone,
            email: form.email,
            address: form.address,
            emergency_contact_name: form.emergency_contact_name,
            emergency_contact_phone: form.emergency_contact_phone,
            medical_history: form.medical_history,
            allergies: form.allergies,
            status: form.status.map(|s| s.parse()).transpose()?,
        })
    }
}

/// Patient list row with its next appointments.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientListing {
    pub patient: FfiPatient,
    pub upcoming_appointments: Vec<FfiAppointment>,
}

impl From<PatientListing> for FfiPatientListing {
    fn from(listing: PatientListing) -> Self {
        Self {
            patient: listing.patient.into(),
            upcoming_appointments: listing
                .upcoming_appointments
                .into_iter()
                .map(|a| a.into())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientPage {
    pub items: Vec<FfiPatientListing>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: String,
    pub appointment_number: String,
    pub appointment_date: String,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            appointment_number: appointment.appointment_number,
            appointment_date: format_datetime(appointment.appointment_date),
            appointment_type: appointment.appointment_type,
            notes: appointment.notes,
            status: appointment.status.to_string(),
            created_by: appointment.created_by,
            created_at: format_datetime(appointment.created_at),
            updated_at: format_datetime(appointment.updated_at),
        }
    }
}

/// FFI-safe booking request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewAppointment {
    pub patient_id: String,
    pub appointment_date: String,
    pub appointment_type: String,
    pub notes: Option<String>,
}

impl TryFrom<FfiNewAppointment> for NewAppointment {
    type Error = ClinicRecordsError;

    fn try_from(request: FfiNewAppointment) -> Result<Self, ClinicRecordsError> {
        Ok(NewAppointment {
            patient_id: request.patient_id,
            appointment_date: datetime_arg("appointment_date", &request.appointment_date)?,
            appointment_type: request.appointment_type,
            notes: request.notes,
        })
    }
}

/// FFI-safe appointment edit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentUpdate {
    pub patient_id: String,
    pub appointment_date: String,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub status: String,
}

impl TryFrom<FfiAppointmentUpdate> for AppointmentUpdate {
    type Error = ClinicRecordsError;

    fn try_from(update: FfiAppointmentUpdate) -> Result<Self, ClinicRecordsError> {
        Ok(AppointmentUpdate {
            patient_id: update.patient_id,
            appointment_date: datetime_arg("appointment_date", &update.appointment_date)?,
            appointment_type: update.appointment_type,
            notes: update.notes,
            status: update.status.parse()?,
        })
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointmentPage {
    pub items: Vec<FfiAppointment>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// FFI-safe examination.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExamination {
    pub id: String,
    pub appointment_id: String,
    pub patient_id: String,
    pub examination_type: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<i64>,
    pub temperature: Option<f64>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub recommendations: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub examined_by: String,
    pub examination_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Examination> for FfiExamination {
    fn from(examination: Examination) -> Self {
        let bmi = examination.bmi();
        let Vitals {
            height,
            weight,
            blood_pressure,
            heart_rate,
            temperature,
        } = examination.vitals;
        let Findings {
            symptoms,
            diagnosis,
            treatment,
            recommendations,
            notes,
        } = examination.findings;

        Self {
            id: examination.id,
            appointment_id: examination.appointment_id,
            patient_id: examination.patient_id,
            examination_type: examination.examination_type,
            height,
            weight,
            bmi,
            blood_pressure,
            heart_rate,
            temperature,
            symptoms,
            diagnosis,
            treatment,
            recommendations,
            notes,
            status: examination.status.to_string(),
            examined_by: examination.examined_by,
            examination_date: format_datetime(examination.examination_date),
            created_at: format_datetime(examination.created_at),
            updated_at: format_datetime(examination.updated_at),
        }
    }
}

/// FFI-safe examination form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExaminationForm {
    pub examination_type: String,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<i64>,
    pub temperature: Option<f64>,
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub recommendations: Option<String>,
    pub notes: Option<String>,
    /// "pending" (default) or "completed"
    pub status: Option<String>,
}

impl TryFrom<FfiExaminationForm> for ExaminationForm {
    type Error = ClinicRecordsError;

    fn try_from(form: FfiExaminationForm) -> Result<Self, ClinicRecordsError> {
        Ok(ExaminationForm {
            examination_type: form.examination_type,
            vitals: Vitals {
                height: form.height,
                weight: form.weight,
                blood_pressure: form.blood_pressure,
                heart_rate: form.heart_rate,
                temperature: form.temperature,
            },
            findings: Findings {
                symptoms: form.symptoms,
                diagnosis: form.diagnosis,
                treatment: form.treatment,
                recommendations: form.recommendations,
                notes: form.notes,
            },
            status: form
                .status
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiExaminationPage {
    pub items: Vec<FfiExamination>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// FFI-safe dashboard counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboardStats {
    pub total_patients: u64,
    pub active_patients: u64,
    pub upcoming_appointments: u64,
    pub today_appointments: u64,
    pub completed_examinations: u64,
    pub pending_examinations: u64,
}

impl From<DashboardStats> for FfiDashboardStats {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_patients: stats.total_patients,
            active_patients: stats.active_patients,
            upcoming_appointments: stats.upcoming_appointments,
            today_appointments: stats.today_appointments,
            completed_examinations: stats.completed_examinations,
            pending_examinations: stats.pending_examinations,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiHealth {
    pub status: String,
    pub timestamp: String,
}
