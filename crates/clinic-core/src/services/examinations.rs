//! Examination records.

use super::{load_appointment, load_patient, lookup, Clinic};
use crate::error::{ClinicError, ClinicResult};
use crate::events::ClinicEvent;
use crate::models::{
    Examination, ExaminationDetail, ExaminationForm, ExaminationQuery, ExaminationStatus, Page,
    PageRequest,
};
use crate::validation::{validate_examination, ValidationErrors};

/// Records examinations and raises the completion cascade.
pub struct ExaminationRecords<'a> {
    clinic: &'a Clinic,
}

impl<'a> ExaminationRecords<'a> {
    pub fn new(clinic: &'a Clinic) -> Self {
        Self { clinic }
    }

    /// Record an examination for an appointment.
    ///
    /// The patient is taken from the appointment. Recording a completed
    /// examination completes the appointment in the same transaction.
    pub fn record(
        &self,
        appointment_id: &str,
        form: ExaminationForm,
        actor_id: &str,
    ) -> ClinicResult<Examination> {
        let now = self.clinic.now();

        let examination = self
            .clinic
            .db
            .in_transaction(|db| -> ClinicResult<Examination> {
                let mut errors = validate_examination(&form);
                let appointment = db.get_appointment(appointment_id)?;
                if appointment.is_none() {
                    missing_appointment(&mut errors, appointment_id);
                }
                errors.into_result()?;
                let appointment =
                    appointment.ok_or_else(|| ClinicError::not_found("Appointment", appointment_id))?;

                let examination = Examination::new(&appointment, form, actor_id.to_string(), now);
                db.insert_examination(&examination)?;
                self.publish(&examination)?;
                Ok(examination)
            })?;

        tracing::info!(
            examination_id = %examination.id,
            appointment_id = %examination.appointment_id,
            status = %examination.status,
            "recorded examination"
        );
        Ok(examination)
    }

    /// Edit an examination. Saving it as completed completes its appointment.
    pub fn update(&self, id: &str, form: ExaminationForm) -> ClinicResult<Examination> {
        let now = self.clinic.now();

        let examination = self
            .clinic
            .db
            .in_transaction(|db| -> ClinicResult<Examination> {
                let mut examination = db
                    .get_examination(id)?
                    .ok_or_else(|| ClinicError::not_found("Examination", id))?;
                validate_examination(&form).into_result()?;

                let appointment = load_appointment(db, &examination.appointment_id)?;
                examination.apply(form, now);
                examination.patient_id = appointment.patient_id;

                db.update_examination(&examination)?;
                self.publish(&examination)?;
                Ok(examination)
            })?;

        tracing::info!(
            examination_id = %examination.id,
            status = %examination.status,
            "updated examination"
        );
        Ok(examination)
    }

    pub fn get(&self, id: &str) -> ClinicResult<Examination> {
        self.clinic
            .db
            .get_examination(id)?
            .ok_or_else(|| ClinicError::not_found("Examination", id))
    }

    /// Examination with its BMI, patient and appointment.
    pub fn detail(&self, id: &str) -> ClinicResult<ExaminationDetail> {
        let db = &self.clinic.db;
        let examination = self.get(id)?;
        let patient = load_patient(db, &examination.patient_id)?;
        let appointment = load_appointment(db, &examination.appointment_id)?;

        Ok(ExaminationDetail {
            bmi: examination.bmi(),
            examination,
            patient,
            appointment,
        })
    }

    /// Filtered page of examinations, latest first, with patient and appointment.
    pub fn list(
        &self,
        query: &ExaminationQuery,
        page: u32,
    ) -> ClinicResult<Page<ExaminationDetail>> {
        let request = PageRequest::new(page, self.clinic.config.records_per_page());
        let (examinations, total) = self.clinic.db.list_examinations(query, request)?;
        let items = self.attach_records(examinations)?;
        Ok(Page::new(items, total, request))
    }

    /// Most recent completed examinations.
    pub(crate) fn recent_completed(&self, limit: u32) -> ClinicResult<Vec<ExaminationDetail>> {
        let query = ExaminationQuery {
            status: Some(ExaminationStatus::Completed),
            ..ExaminationQuery::default()
        };
        let (examinations, _) = self
            .clinic
            .db
            .list_examinations(&query, PageRequest::first(limit))?;
        self.attach_records(examinations)
    }

    /// Delete an examination. The appointment keeps its status.
    pub fn delete(&self, id: &str) -> ClinicResult<()> {
        if !self.clinic.db.delete_examination(id)? {
            return Err(ClinicError::not_found("Examination", id));
        }
        tracing::info!(examination_id = %id, "deleted examination");
        Ok(())
    }

    /// Apply the events raised by saving `examination` on the clinic connection.
    fn publish(&self, examination: &Examination) -> ClinicResult<()> {
        let ledger = self.clinic.appointments();
        for event in ClinicEvent::from_saved_examination(examination) {
            ledger.handle(&event)?;
        }
        Ok(())
    }

    fn attach_records(&self, examinations: Vec<Examination>) -> ClinicResult<Vec<ExaminationDetail>> {
        let db = &self.clinic.db;
        let patient_ids: Vec<&str> = examinations.iter().map(|e| e.patient_id.as_str()).collect();
        let appointment_ids: Vec<&str> = examinations
            .iter()
            .map(|e| e.appointment_id.as_str())
            .collect();
        let patients = db.get_patients_by_ids(&patient_ids)?;
        let appointments = db.get_appointments_by_ids(&appointment_ids)?;

        let mut items = Vec::with_capacity(examinations.len());
        for examination in examinations {
            let patient = lookup(&patients, &examination.patient_id, "patient")?;
            let appointment = lookup(&appointments, &examination.appointment_id, "appointment")?;
            items.push(ExaminationDetail {
                bmi: examination.bmi(),
                examination,
                patient,
                appointment,
            });
        }
        Ok(items)
    }
}

fn missing_appointment(errors: &mut ValidationErrors, appointment_id: &str) {
    if appointment_id.trim().is_empty() {
        errors.add("appointment_id", "Please select an appointment.");
    } else {
        errors.add("appointment_id", "The selected appointment does not exist.");
    }
}
