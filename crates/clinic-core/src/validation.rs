//! Field-level validation of incoming forms.
//!
//! Each validator collects every failing field before returning, so callers can
//! report all problems at once. Checks that need storage (referenced records,
//! email uniqueness) take the [`Database`] explicitly.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::db::{Database, DbResult};
use crate::models::{AppointmentUpdate, ExaminationForm, NewAppointment, PatientForm};

const MAX_TEXT: usize = 255;
const MAX_PHONE: usize = 20;
const MAX_BLOOD_PRESSURE: usize = 20;

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All rejected fields of a form.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[error("{}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether `field` has at least one error.
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was rejected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn required(&mut self, field: &'static str, value: &str, message: &str) {
        if value.trim().is_empty() {
            self.add(field, message);
        } else {
            self.max_len(field, value, MAX_TEXT);
        }
    }

    fn max_len(&mut self, field: &'static str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("Must not exceed {} characters.", max));
        }
    }

    fn optional_max_len(&mut self, field: &'static str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            self.max_len(field, value, max);
        }
    }

    fn range<T: PartialOrd + std::fmt::Display + Copy>(
        &mut self,
        field: &'static str,
        value: Option<T>,
        min: T,
        max: T,
        unit: &str,
    ) {
        if let Some(value) = value {
            if value < min || value > max {
                self.add(
                    field,
                    format!("Must be between {} and {}{}.", min, max, unit),
                );
            }
        }
    }
}

/// Validate a patient registration or edit.
///
/// `patient_id` is the patient being edited, excluded from the email uniqueness check.
pub fn validate_patient(
    db: &Database,
    form: &PatientForm,
    today: NaiveDate,
    patient_id: Option<&str>,
) -> DbResult<ValidationErrors> {
    let mut errors = ValidationErrors::default();

    errors.required("name", &form.name, "Patient name is required.");
    if form.date_of_birth >= today {
        errors.add("date_of_birth", "Date of birth must be before today.");
    }
    errors.optional_max_len("phone", form.phone.as_deref(), MAX_PHONE);
    errors.optional_max_len(
        "emergency_contact_name",
        form.emergency_contact_name.as_deref(),
        MAX_TEXT,
    );
    errors.optional_max_len(
        "emergency_contact_phone",
        form.emergency_contact_phone.as_deref(),
        MAX_PHONE,
    );

    if let Some(email) = form.email.as_deref() {
        if !is_valid_email(email) {
            errors.add("email", "Please provide a valid email address.");
        } else if db.email_in_use(email, patient_id)? {
            errors.add(
                "email",
                "This email is already registered to another patient.",
            );
        }
    }

    Ok(errors)
}

/// Validate a booking. The appointment must lie strictly after `now`.
pub fn validate_new_appointment(
    db: &Database,
    request: &NewAppointment,
    now: NaiveDateTime,
) -> DbResult<ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_patient_reference(db, &request.patient_id, &mut errors)?;
    if request.appointment_date <= now {
        errors.add(
            "appointment_date",
            "Appointment must be scheduled for a future date and time.",
        );
    }
    errors.required("type", &request.appointment_type, "Appointment type is required.");

    Ok(errors)
}

/// Validate an appointment edit. Date and status are unconstrained.
pub fn validate_appointment_update(
    db: &Database,
    update: &AppointmentUpdate,
) -> DbResult<ValidationErrors> {
    let mut errors = ValidationErrors::default();

    check_patient_reference(db, &update.patient_id, &mut errors)?;
    errors.required("type", &update.appointment_type, "Appointment type is required.");

    Ok(errors)
}

/// Validate examination fields and vital sign ranges.
pub fn validate_examination(form: &ExaminationForm) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    errors.required(
        "examination_type",
        &form.examination_type,
        "Examination type is required.",
    );

    let vitals = &form.vitals;
    errors.range("height", vitals.height, 0.0, 300.0, " cm");
    errors.range("weight", vitals.weight, 0.0, 500.0, " kg");
    errors.optional_max_len(
        "blood_pressure",
        vitals.blood_pressure.as_deref(),
        MAX_BLOOD_PRESSURE,
    );
    errors.range("heart_rate", vitals.heart_rate, 30, 200, " BPM");
    errors.range("temperature", vitals.temperature, 30.0, 45.0, " °C");

    for (field, value) in [
        ("height", vitals.height),
        ("weight", vitals.weight),
        ("temperature", vitals.temperature),
    ] {
        if value.is_some_and(|v| !v.is_finite()) {
            errors.add(field, "Must be a valid number.");
        }
    }

    errors
}

fn check_patient_reference(
    db: &Database,
    patient_id: &str,
    errors: &mut ValidationErrors,
) -> DbResult<()> {
    if patient_id.trim().is_empty() {
        errors.add("patient_id", "Please select a patient.");
    } else if !db.patient_exists(patient_id)? {
        errors.add("patient_id", "The selected patient does not exist.");
    }
    Ok(())
}

/// Minimal `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Patient};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn now() -> NaiveDateTime {
        today().and_hms_opt(12, 0, 0).unwrap()
    }

    fn form() -> PatientForm {
        PatientForm::new(
            "Jane Doe",
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            Gender::Female,
        )
    }

    #[test]
    fn test_valid_patient() {
        let db = Database::open_in_memory().unwrap();
        let errors = validate_patient(&db, &form(), today(), None).unwrap();
        assert!(errors.is_empty(), "{}", errors);
    }

    #[test]
    fn test_patient_field_errors_collected() {
        let db = Database::open_in_memory().unwrap();
        let mut form = form();
        form.name = "   ".into();
        form.date_of_birth = today();
        form.phone = Some("1".repeat(21));
        form.email = Some("not-an-email".into());

        let errors = validate_patient(&db, &form, today(), None).unwrap();
        assert!(errors.has("name"));
        assert!(errors.has("date_of_birth"));
        assert!(errors.has("phone"));
        assert!(errors.has("email"));
        assert_eq!(errors.errors.len(), 4);

        let message = errors.to_string();
        assert!(message.starts_with("name: "));
        assert_eq!(message.matches("; ").count(), 3);
    }

    #[test]
    fn test_email_unique_except_self() {
        let db = Database::open_in_memory().unwrap();
        let mut existing = form();
        existing.email = Some("jane@example.com".into());
        let patient = Patient::new("MR20240001".into(), existing.clone(), now());
        db.insert_patient(&patient).unwrap();

        let errors = validate_patient(&db, &existing, today(), None).unwrap();
        assert!(errors.has("email"));

        let errors = validate_patient(&db, &existing, today(), Some(&patient.id)).unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_new_appointment_rules() {
        let db = Database::open_in_memory().unwrap();
        let request = NewAppointment {
            patient_id: "missing".into(),
            appointment_date: now(),
            appointment_type: "".into(),
            notes: None,
        };

        let errors = validate_new_appointment(&db, &request, now()).unwrap();
        assert!(errors.has("patient_id"));
        assert!(errors.has("appointment_date"));
        assert!(errors.has("type"));
    }

    #[test]
    fn test_examination_ranges() {
        let mut form = ExaminationForm::new("Physical");
        form.vitals.height = Some(301.0);
        form.vitals.weight = Some(-1.0);
        form.vitals.heart_rate = Some(29);
        form.vitals.temperature = Some(45.5);
        form.vitals.blood_pressure = Some("120/80 mmHg sitting down".into());

        let errors = validate_examination(&form);
        for field in ["height", "weight", "heart_rate", "temperature", "blood_pressure"] {
            assert!(errors.has(field), "expected error on {}", field);
        }

        let mut form = ExaminationForm::new("Physical");
        form.vitals.height = Some(300.0);
        form.vitals.weight = Some(0.0);
        form.vitals.heart_rate = Some(200);
        form.vitals.temperature = Some(30.0);
        assert!(validate_examination(&form).is_empty());

        assert!(validate_examination(&ExaminationForm::new(" ")).has("examination_type"));
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane@@example.com"));
        assert!(!is_valid_email("jane doe@example.com"));
    }
}
