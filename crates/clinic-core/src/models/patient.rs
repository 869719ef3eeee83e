//! Patient models.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{Appointment, Examination, ParseEnumError};

/// Patient gender as recorded at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(ParseEnumError::new("gender", other)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the patient is currently under care.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    #[default]
    Active,
    Inactive,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::Active => "active",
            PatientStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for PatientStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PatientStatus::Active),
            "inactive" => Ok(PatientStatus::Inactive),
            other => Err(ParseEnumError::new("patient status", other)),
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID
    pub id: String,
    /// Human-readable record number, `MR<yyyy><nnnn>`; never changes
    pub medical_record_number: String,
    /// Full name
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    /// Free-text medical history
    pub medical_history: Option<String>,
    /// Free-text allergies
    pub allergies: Option<String>,
    pub status: PatientStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Patient {
    /// Build a new patient from a validated form.
    pub fn new(medical_record_number: String, form: PatientForm, now: NaiveDateTime) -> Self {
        let mut patient = Self {
            id: uuid::Uuid::new_v4().to_string(),
            medical_record_number,
            name: String::new(),
            date_of_birth: form.date_of_birth,
            gender: form.gender,
            phone: None,
            email: None,
            address: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            medical_history: None,
            allergies: None,
            status: PatientStatus::Active,
            created_at: now,
            updated_at: now,
        };
        patient.apply(form, now);
        patient
    }

    /// Overwrite the editable fields from a form. The record number is untouched.
    pub fn apply(&mut self, form: PatientForm, now: NaiveDateTime) {
        self.name = form.name.trim().to_string();
        self.date_of_birth = form.date_of_birth;
        self.gender = form.gender;
        self.phone = form.phone;
        self.email = form.email;
        self.address = form.address;
        self.emergency_contact_name = form.emergency_contact_name;
        self.emergency_contact_phone = form.emergency_contact_phone;
        self.medical_history = form.medical_history;
        self.allergies = form.allergies;
        if let Some(status) = form.status {
            self.status = status;
        }
        self.updated_at = now;
    }

    /// Age in whole years on the given date.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        age_in_years(self.date_of_birth, today)
    }
}

/// Whole years elapsed between `date_of_birth` and `today`, floored.
///
/// Returns 0 for a birth date in the future.
pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> u32 {
    today.years_since(date_of_birth).unwrap_or(0)
}

/// Editable patient fields, used for both registration and edits.
///
/// A `None` status means "active" on registration and "unchanged" on edit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientForm {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub status: Option<PatientStatus>,
}

impl PatientForm {
    /// Form with only the required fields set.
    pub fn new(name: impl Into<String>, date_of_birth: NaiveDate, gender: Gender) -> Self {
        Self {
            name: name.into(),
            date_of_birth,
            gender,
            phone: None,
            email: None,
            address: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            medical_history: None,
            allergies: None,
            status: None,
        }
    }
}

impl From<&Patient> for PatientForm {
    fn from(patient: &Patient) -> Self {
        Self {
            name: patient.name.clone(),
            date_of_birth: patient.date_of_birth,
            gender: patient.gender,
            phone: patient.phone.clone(),
            email: patient.email.clone(),
            address: patient.address.clone(),
            emergency_contact_name: patient.emergency_contact_name.clone(),
            emergency_contact_phone: patient.emergency_contact_phone.clone(),
            medical_history: patient.medical_history.clone(),
            allergies: patient.allergies.clone(),
            status: Some(patient.status),
        }
    }
}

/// Filter for the patient list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientQuery {
    /// Name prefix match
    pub name_prefix: Option<String>,
    pub status: Option<PatientStatus>,
}

/// A row of the patient list: the patient and its next few upcoming appointments.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientListing {
    pub patient: Patient,
    pub upcoming_appointments: Vec<Appointment>,
}

/// An appointment together with its examinations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentHistory {
    pub appointment: Appointment,
    pub examinations: Vec<Examination>,
}

/// Full patient chart.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientRecord {
    pub patient: Patient,
    /// Age on the day the record was loaded
    pub age: u32,
    /// All appointments, latest first
    pub appointments: Vec<AppointmentHistory>,
    /// Most recent examinations
    pub recent_examinations: Vec<Examination>,
}
