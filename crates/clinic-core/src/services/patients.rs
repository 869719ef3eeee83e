//! Patient registry.

use super::{load_patient, Clinic};
use crate::error::{ClinicError, ClinicResult};
use crate::identifiers::IdentifierKind;
use crate::models::{
    AppointmentHistory, ExaminationQuery, Page, PageRequest, Patient, PatientForm,
    PatientListing, PatientQuery, PatientRecord,
};
use crate::validation::validate_patient;

/// Upcoming appointments shown per row of the patient list.
const LISTING_UPCOMING: u32 = 3;
/// Examinations shown in the "recent" section of a patient record.
const RECORD_RECENT_EXAMINATIONS: u32 = 10;

/// Registers and maintains patients.
pub struct PatientRegistry<'a> {
    clinic: &'a Clinic,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(clinic: &'a Clinic) -> Self {
        Self { clinic }
    }

    /// Register a new patient with a fresh medical record number.
    pub fn register(&self, form: PatientForm) -> ClinicResult<Patient> {
        let now = self.clinic.now();
        let today = self.clinic.today();

        let patient = self.clinic.db.in_transaction(|db| -> ClinicResult<Patient> {
            validate_patient(db, &form, today, None)?.into_result()?;

            let number = self.clinic.generate_identifier(
                IdentifierKind::MedicalRecordNumber,
                now,
                |candidate| Ok(db.medical_record_number_exists(candidate)?),
            )?;

            let patient = Patient::new(number, form, now);
            db.insert_patient(&patient)?;
            Ok(patient)
        })?;

        tracing::info!(
            patient_id = %patient.id,
            medical_record_number = %patient.medical_record_number,
            "registered patient"
        );
        Ok(patient)
    }

    /// Edit a patient. The medical record number never changes.
    pub fn update(&self, id: &str, form: PatientForm) -> ClinicResult<Patient> {
        let now = self.clinic.now();
        let today = self.clinic.today();

        let patient = self.clinic.db.in_transaction(|db| -> ClinicResult<Patient> {
            let mut patient = load_patient(db, id)?;
            validate_patient(db, &form, today, Some(id))?.into_result()?;

            patient.apply(form, now);
            db.update_patient(&patient)?;
            Ok(patient)
        })?;

        tracing::info!(patient_id = %patient.id, "updated patient");
        Ok(patient)
    }

    pub fn get(&self, id: &str) -> ClinicResult<Patient> {
        load_patient(&self.clinic.db, id)
    }

    pub fn find_by_record_number(&self, number: &str) -> ClinicResult<Patient> {
        self.clinic
            .db
            .get_patient_by_record_number(number)?
            .ok_or_else(|| ClinicError::not_found("Patient", number))
    }

    /// Full chart: appointments with their examinations plus recent examinations.
    pub fn record(&self, id: &str) -> ClinicResult<PatientRecord> {
        let db = &self.clinic.db;
        let patient = load_patient(db, id)?;

        let mut appointments = Vec::new();
        for appointment in db.list_appointments_for_patient(id)? {
            let examinations = db.list_examinations_for_appointment(&appointment.id)?;
            appointments.push(AppointmentHistory {
                appointment,
                examinations,
            });
        }

        let query = ExaminationQuery {
            patient_id: Some(id.to_string()),
            ..ExaminationQuery::default()
        };
        let (recent_examinations, _) =
            db.list_examinations(&query, PageRequest::first(RECORD_RECENT_EXAMINATIONS))?;

        Ok(PatientRecord {
            age: patient.age_on(self.clinic.today()),
            patient,
            appointments,
            recent_examinations,
        })
    }

    /// Patients, newest first, each with its next few upcoming appointments.
    pub fn list(&self, query: &PatientQuery, page: u32) -> ClinicResult<Page<PatientListing>> {
        let db = &self.clinic.db;
        let now = self.clinic.now();
        let request = PageRequest::new(page, self.clinic.config.patients_per_page());

        let (patients, total) = db.list_patients(query, request)?;
        let mut items = Vec::with_capacity(patients.len());
        for patient in patients {
            let upcoming_appointments =
                db.upcoming_appointments_for_patient(&patient.id, now, LISTING_UPCOMING)?;
            items.push(PatientListing {
                patient,
                upcoming_appointments,
            });
        }

        Ok(Page::new(items, total, request))
    }

    /// Active patients ordered by name.
    pub fn active(&self) -> ClinicResult<Vec<Patient>> {
        Ok(self.clinic.db.list_active_patients()?)
    }

    /// Delete a patient together with its appointments and examinations.
    pub fn delete(&self, id: &str) -> ClinicResult<()> {
        if !self.clinic.db.delete_patient(id)? {
            return Err(ClinicError::not_found("Patient", id));
        }
        tracing::info!(patient_id = %id, "deleted patient");
        Ok(())
    }
}
