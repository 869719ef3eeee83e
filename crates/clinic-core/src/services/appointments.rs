//! Appointment ledger.

use super::{attach_patients, load_appointment, load_patient, Clinic};
use crate::error::{ClinicError, ClinicResult};
use crate::events::ClinicEvent;
use crate::identifiers::IdentifierKind;
use crate::models::{
    Appointment, AppointmentDetail, AppointmentListing, AppointmentQuery, AppointmentStatus,
    AppointmentUpdate, NewAppointment, Page, PageRequest,
};
use crate::validation::{validate_appointment_update, validate_new_appointment};

/// Books and maintains appointments, and applies appointment-side effects of
/// [`ClinicEvent`]s.
pub struct AppointmentLedger<'a> {
    clinic: &'a Clinic,
}

impl<'a> AppointmentLedger<'a> {
    pub fn new(clinic: &'a Clinic) -> Self {
        Self { clinic }
    }

    /// Book an appointment in the `scheduled` state with a fresh appointment number.
    pub fn book(&self, request: NewAppointment, actor_id: &str) -> ClinicResult<Appointment> {
        let now = self.clinic.now();

        let appointment = self
            .clinic
            .db
            .in_transaction(|db| -> ClinicResult<Appointment> {
                validate_new_appointment(db, &request, now)?.into_result()?;

                let number = self.clinic.generate_identifier(
                    IdentifierKind::AppointmentNumber,
                    now,
                    |candidate| Ok(db.appointment_number_exists(candidate)?),
                )?;

                let appointment = Appointment::new(number, request, actor_id.to_string(), now);
                db.insert_appointment(&appointment)?;
                Ok(appointment)
            })?;

        tracing::info!(
            appointment_id = %appointment.id,
            appointment_number = %appointment.appointment_number,
            patient_id = %appointment.patient_id,
            "booked appointment"
        );
        Ok(appointment)
    }

    /// Edit an appointment. Any status may be set directly.
    pub fn update(&self, id: &str, update: AppointmentUpdate) -> ClinicResult<Appointment> {
        let now = self.clinic.now();

        let appointment = self
            .clinic
            .db
            .in_transaction(|db| -> ClinicResult<Appointment> {
                let mut appointment = load_appointment(db, id)?;
                validate_appointment_update(db, &update)?.into_result()?;

                appointment.apply(update, now);
                db.update_appointment(&appointment)?;
                Ok(appointment)
            })?;

        tracing::info!(
            appointment_id = %appointment.id,
            status = %appointment.status,
            "updated appointment"
        );
        Ok(appointment)
    }

    pub fn get(&self, id: &str) -> ClinicResult<Appointment> {
        load_appointment(&self.clinic.db, id)
    }

    /// Appointment with its patient and examinations.
    pub fn detail(&self, id: &str) -> ClinicResult<AppointmentDetail> {
        let db = &self.clinic.db;
        let appointment = load_appointment(db, id)?;
        let patient = load_patient(db, &appointment.patient_id)?;
        let examinations = db.list_examinations_for_appointment(id)?;

        Ok(AppointmentDetail {
            appointment,
            patient,
            examinations,
        })
    }

    /// Filtered page of appointments with their patients.
    pub fn list(
        &self,
        query: &AppointmentQuery,
        page: u32,
    ) -> ClinicResult<Page<AppointmentListing>> {
        let db = &self.clinic.db;
        let request = PageRequest::new(page, self.clinic.config.records_per_page());

        let (appointments, total) = db.list_appointments(query, self.clinic.now(), request)?;
        let items = attach_patients(db, appointments)?;
        Ok(Page::new(items, total, request))
    }

    /// The next `limit` non-cancelled appointments, soonest first.
    pub fn upcoming(&self, limit: u32) -> ClinicResult<Vec<AppointmentListing>> {
        let db = &self.clinic.db;
        let (appointments, _) = db.list_appointments(
            &AppointmentQuery::upcoming(),
            self.clinic.now(),
            PageRequest::first(limit),
        )?;
        Ok(attach_patients(db, appointments)?)
    }

    /// All appointments on the current date, earliest first.
    pub fn today(&self) -> ClinicResult<Vec<AppointmentListing>> {
        let db = &self.clinic.db;
        let (appointments, _) = db.list_appointments(
            &AppointmentQuery::today(),
            self.clinic.now(),
            PageRequest::first(u32::MAX),
        )?;
        Ok(attach_patients(db, appointments)?)
    }

    /// Appointments that can still receive an examination.
    pub fn open_for_examination(&self) -> ClinicResult<Vec<AppointmentListing>> {
        let db = &self.clinic.db;
        let appointments = db.list_open_appointments()?;
        Ok(attach_patients(db, appointments)?)
    }

    /// Delete an appointment together with its examinations.
    pub fn delete(&self, id: &str) -> ClinicResult<()> {
        if !self.clinic.db.delete_appointment(id)? {
            return Err(ClinicError::not_found("Appointment", id));
        }
        tracing::info!(appointment_id = %id, "deleted appointment");
        Ok(())
    }

    /// Apply the appointment side of an event.
    ///
    /// Runs on the clinic connection, so it joins any open transaction.
    pub fn handle(&self, event: &ClinicEvent) -> ClinicResult<()> {
        match event {
            ClinicEvent::ExaminationCompleted {
                examination_id,
                appointment_id,
            } => {
                let changed = self.clinic.db.set_appointment_status(
                    appointment_id,
                    AppointmentStatus::Completed,
                    self.clinic.now(),
                )?;
                if !changed {
                    return Err(ClinicError::not_found("Appointment", appointment_id));
                }
                tracing::info!(
                    %appointment_id,
                    %examination_id,
                    "appointment completed by examination"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ClinicConfig;
    use crate::db::Database;
    use crate::models::{Gender, Patient, PatientForm, TimeWindow};
    use chrono::{NaiveDate, NaiveDateTime};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn at(d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn setup() -> (Clinic, Patient) {
        let clinic = Clinic::new(
            Database::open_in_memory().unwrap(),
            Arc::new(FixedClock::new(at(15, 12, 0))),
            ClinicConfig::default(),
        )
        .with_rng(StdRng::seed_from_u64(3));
        let patient = clinic
            .patients()
            .register(PatientForm::new(
                "Jane Doe",
                NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
                Gender::Female,
            ))
            .unwrap();
        (clinic, patient)
    }

    fn request(patient: &Patient, date: NaiveDateTime) -> NewAppointment {
        NewAppointment {
            patient_id: patient.id.clone(),
            appointment_date: date,
            appointment_type: "General Check-up".into(),
            notes: None,
        }
    }

    #[test]
    fn test_book_assigns_number_and_actor() {
        let (clinic, patient) = setup();
        let appointment = clinic
            .appointments()
            .book(request(&patient, at(16, 9, 0)), "doctor-1")
            .unwrap();

        assert!(appointment.appointment_number.starts_with("APT20240615"));
        assert_eq!(appointment.appointment_number.len(), 14);
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.created_by, "doctor-1");
    }

    #[test]
    fn test_book_rejects_past_date() {
        let (clinic, patient) = setup();
        let err = clinic
            .appointments()
            .book(request(&patient, at(15, 12, 0)), "doctor-1")
            .unwrap_err();
        assert!(matches!(err, ClinicError::Validation(e) if e.has("appointment_date")));
    }

    #[test]
    fn test_update_allows_any_status() {
        let (clinic, patient) = setup();
        let ledger = clinic.appointments();
        let appointment = ledger.book(request(&patient, at(16, 9, 0)), "doctor-1").unwrap();

        let mut update = AppointmentUpdate::from(&appointment);
        update.status = AppointmentStatus::Completed;
        ledger.update(&appointment.id, update.clone()).unwrap();

        update.status = AppointmentStatus::Scheduled;
        update.appointment_date = at(1, 9, 0);
        let reverted = ledger.update(&appointment.id, update).unwrap();
        assert_eq!(reverted.status, AppointmentStatus::Scheduled);
        assert_eq!(reverted.appointment_date, at(1, 9, 0));
    }

    #[test]
    fn test_upcoming_and_today() {
        let (clinic, patient) = setup();
        let ledger = clinic.appointments();
        let later_today = ledger.book(request(&patient, at(15, 15, 0)), "d").unwrap();
        let tomorrow = ledger.book(request(&patient, at(16, 9, 0)), "d").unwrap();
        let cancelled = ledger.book(request(&patient, at(17, 9, 0)), "d").unwrap();

        let mut update = AppointmentUpdate::from(&cancelled);
        update.status = AppointmentStatus::Cancelled;
        ledger.update(&cancelled.id, update).unwrap();

        let upcoming: Vec<String> = ledger
            .upcoming(10)
            .unwrap()
            .into_iter()
            .map(|l| l.appointment.id)
            .collect();
        assert_eq!(upcoming, vec![later_today.id.clone(), tomorrow.id]);

        let today = ledger.today().unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].appointment.id, later_today.id);
        assert_eq!(today[0].patient.id, patient.id);

        let query = AppointmentQuery {
            window: Some(TimeWindow::Upcoming),
            ..AppointmentQuery::default()
        };
        assert_eq!(ledger.list(&query, 1).unwrap().total, 2);
    }

    #[test]
    fn test_handle_completion_event() {
        let (clinic, patient) = setup();
        let ledger = clinic.appointments();
        let appointment = ledger.book(request(&patient, at(16, 9, 0)), "d").unwrap();

        ledger
            .handle(&ClinicEvent::ExaminationCompleted {
                examination_id: "e1".into(),
                appointment_id: appointment.id.clone(),
            })
            .unwrap();
        assert_eq!(
            ledger.get(&appointment.id).unwrap().status,
            AppointmentStatus::Completed
        );

        let missing = ledger.handle(&ClinicEvent::ExaminationCompleted {
            examination_id: "e1".into(),
            appointment_id: "missing".into(),
        });
        assert!(matches!(missing, Err(ClinicError::NotFound { .. })));
    }

    #[test]
    fn test_detail_and_delete() {
        let (clinic, patient) = setup();
        let ledger = clinic.appointments();
        let appointment = ledger.book(request(&patient, at(16, 9, 0)), "d").unwrap();

        let detail = ledger.detail(&appointment.id).unwrap();
        assert_eq!(detail.patient.id, patient.id);
        assert!(detail.examinations.is_empty());

        ledger.delete(&appointment.id).unwrap();
        assert!(matches!(
            ledger.get(&appointment.id),
            Err(ClinicError::NotFound { entity: "Appointment", .. })
        ));
    }
}
