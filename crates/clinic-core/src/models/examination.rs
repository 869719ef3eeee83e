//! Examination models and derived vitals.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Appointment, ParseEnumError, Patient};

/// Examination status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExaminationStatus {
    #[default]
    Pending,
    Completed,
}

impl ExaminationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExaminationStatus::Pending => "pending",
            ExaminationStatus::Completed => "completed",
        }
    }
}

impl FromStr for ExaminationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExaminationStatus::Pending),
            "completed" => Ok(ExaminationStatus::Completed),
            other => Err(ParseEnumError::new("examination status", other)),
        }
    }
}

impl fmt::Display for ExaminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vital signs measured during an examination. All optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    /// Height in cm
    pub height: Option<f64>,
    /// Weight in kg
    pub weight: Option<f64>,
    /// Free-form reading, e.g. "120/80"
    pub blood_pressure: Option<String>,
    /// Beats per minute
    pub heart_rate: Option<i64>,
    /// Degrees Celsius
    pub temperature: Option<f64>,
}

impl Vitals {
    /// Body mass index from height and weight, rounded to 2 decimals.
    pub fn bmi(&self) -> Option<f64> {
        body_mass_index(self.height?, self.weight?)
    }

    /// Round stored measurements to their column precision.
    pub fn normalized(mut self) -> Self {
        self.height = self.height.map(|v| round_to(v, 2));
        self.weight = self.weight.map(|v| round_to(v, 2));
        self.temperature = self.temperature.map(|v| round_to(v, 1));
        self
    }
}

/// `weight_kg / (height_cm / 100)^2`, rounded to 2 decimals.
///
/// `None` for a non-positive height or weight.
pub fn body_mass_index(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if height_cm <= 0.0 || weight_kg <= 0.0 {
        return None;
    }
    let height_m = height_cm / 100.0;
    Some(round_to(weight_kg / (height_m * height_m), 2))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Clinical free-text findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Findings {
    pub symptoms: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub recommendations: Option<String>,
    pub notes: Option<String>,
}

/// Outcome of examining a patient during an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Examination {
    /// Local UUID
    pub id: String,
    pub appointment_id: String,
    /// Always the appointment's patient
    pub patient_id: String,
    pub examination_type: String,
    #[serde(flatten)]
    pub vitals: Vitals,
    #[serde(flatten)]
    pub findings: Findings,
    pub status: ExaminationStatus,
    /// Actor who performed the examination
    pub examined_by: String,
    pub examination_date: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Examination {
    /// Record a new examination against `appointment`.
    pub fn new(
        appointment: &Appointment,
        form: ExaminationForm,
        examined_by: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment.id.clone(),
            patient_id: appointment.patient_id.clone(),
            examination_type: form.examination_type.trim().to_string(),
            vitals: form.vitals.normalized(),
            findings: form.findings,
            status: form.status,
            examined_by,
            examination_date: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the editable fields. Appointment, examiner and date are kept.
    pub fn apply(&mut self, form: ExaminationForm, now: NaiveDateTime) {
        self.examination_type = form.examination_type.trim().to_string();
        self.vitals = form.vitals.normalized();
        self.findings = form.findings;
        self.status = form.status;
        self.updated_at = now;
    }

    pub fn bmi(&self) -> Option<f64> {
        self.vitals.bmi()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExaminationStatus::Completed
    }
}

/// Editable examination fields, used for both recording and edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExaminationForm {
    pub examination_type: String,
    #[serde(default, flatten)]
    pub vitals: Vitals,
    #[serde(default, flatten)]
    pub findings: Findings,
    #[serde(default)]
    pub status: ExaminationStatus,
}

impl ExaminationForm {
    pub fn new(examination_type: impl Into<String>) -> Self {
        Self {
            examination_type: examination_type.into(),
            ..Self::default()
        }
    }
}

impl From<&Examination> for ExaminationForm {
    fn from(examination: &Examination) -> Self {
        Self {
            examination_type: examination.examination_type.clone(),
            vitals: examination.vitals.clone(),
            findings: examination.findings.clone(),
            status: examination.status,
        }
    }
}

/// Filter for examination lists. Always ordered by examination date, latest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExaminationQuery {
    pub patient_id: Option<String>,
    pub appointment_id: Option<String>,
    pub status: Option<ExaminationStatus>,
}

/// Examination with its patient and appointment loaded.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExaminationDetail {
    pub examination: Examination,
    pub bmi: Option<f64>,
    pub patient: Patient,
    pub appointment: Appointment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmi() {
        assert_eq!(body_mass_index(180.0, 72.0), Some(22.22));
        assert_eq!(body_mass_index(165.0, 60.0), Some(22.04));
    }

    #[test]
    fn test_bmi_absent_without_inputs() {
        let mut vitals = Vitals {
            height: Some(180.0),
            ..Vitals::default()
        };
        assert_eq!(vitals.bmi(), None);

        vitals.height = None;
        vitals.weight = Some(72.0);
        assert_eq!(vitals.bmi(), None);

        vitals.height = Some(0.0);
        assert_eq!(vitals.bmi(), None);
    }

    #[test]
    fn test_vitals_normalized() {
        let vitals = Vitals {
            height: Some(172.456),
            weight: Some(70.004),
            temperature: Some(36.66),
            ..Vitals::default()
        }
        .normalized();

        assert_eq!(vitals.height, Some(172.46));
        assert_eq!(vitals.weight, Some(70.0));
        assert_eq!(vitals.temperature, Some(36.7));
    }

    #[test]
    fn test_form_defaults_to_pending() {
        let form: ExaminationForm =
            serde_json::from_str(r#"{"examination_type": "Blood Test", "height": 170.0}"#).unwrap();
        assert_eq!(form.status, ExaminationStatus::Pending);
        assert_eq!(form.vitals.height, Some(170.0));
    }
}
