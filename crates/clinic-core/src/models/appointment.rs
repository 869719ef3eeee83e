//! Appointment models and time windows.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use super::{Examination, ParseEnumError, Patient, SortDirection};

/// Appointment status.
///
/// Any value may be set by a direct edit; there is no enforced transition graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(ParseEnumError::new("appointment status", other)),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled visit for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Local UUID
    pub id: String,
    pub patient_id: String,
    /// Human-readable number, `APT<yyyymmdd><nnn>`
    pub appointment_number: String,
    /// Scheduled wall-clock date-time
    pub appointment_date: NaiveDateTime,
    /// Free-text visit type (e.g. "General Check-up")
    #[serde(rename = "type")]
    pub appointment_type: String,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    /// Actor who booked the appointment
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Appointment {
    /// Book a new appointment in the `scheduled` state.
    pub fn new(
        appointment_number: String,
        request: NewAppointment,
        created_by: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: request.patient_id,
            appointment_number,
            appointment_date: request.appointment_date.trunc_subsecs(0),
            appointment_type: request.appointment_type.trim().to_string(),
            notes: request.notes,
            status: AppointmentStatus::Scheduled,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the editable fields from an edit.
    pub fn apply(&mut self, update: AppointmentUpdate, now: NaiveDateTime) {
        self.patient_id = update.patient_id;
        self.appointment_date = update.appointment_date.trunc_subsecs(0);
        self.appointment_type = update.appointment_type.trim().to_string();
        self.notes = update.notes;
        self.status = update.status;
        self.updated_at = now;
    }
}

/// Booking request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: String,
    pub appointment_date: NaiveDateTime,
    #[serde(rename = "type")]
    pub appointment_type: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Edit of an existing appointment, including its status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentUpdate {
    pub patient_id: String,
    pub appointment_date: NaiveDateTime,
    #[serde(rename = "type")]
    pub appointment_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for AppointmentUpdate {
    fn from(appointment: &Appointment) -> Self {
        Self {
            patient_id: appointment.patient_id.clone(),
            appointment_date: appointment.appointment_date,
            appointment_type: appointment.appointment_type.clone(),
            notes: appointment.notes.clone(),
            status: appointment.status,
        }
    }
}

/// Named windows over appointment dates relative to "now".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// At or after now, and not cancelled
    Upcoming,
    /// On the current calendar date, any status
    Today,
}

impl TimeWindow {
    /// In-memory form of the window predicate used by the SQL queries.
    pub fn contains(&self, appointment: &Appointment, now: NaiveDateTime) -> bool {
        match self {
            TimeWindow::Upcoming => {
                appointment.appointment_date >= now
                    && appointment.status != AppointmentStatus::Cancelled
            }
            TimeWindow::Today => {
                let (start, end) = day_bounds(now);
                appointment.appointment_date >= start && appointment.appointment_date < end
            }
        }
    }
}

impl FromStr for TimeWindow {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(TimeWindow::Upcoming),
            "today" => Ok(TimeWindow::Today),
            other => Err(ParseEnumError::new("time window", other)),
        }
    }
}

/// Half-open `[midnight, next midnight)` range around `now`.
pub fn day_bounds(now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let start = now.date().and_time(chrono::NaiveTime::MIN);
    let end = start
        .checked_add_days(Days::new(1))
        .unwrap_or(NaiveDateTime::MAX);
    (start, end)
}

/// Filter and ordering for appointment lists.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentQuery {
    pub patient_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub window: Option<TimeWindow>,
    /// Order by appointment date
    pub direction: SortDirection,
}

impl Default for AppointmentQuery {
    fn default() -> Self {
        Self {
            patient_id: None,
            status: None,
            window: None,
            direction: SortDirection::Descending,
        }
    }
}

impl AppointmentQuery {
    /// Upcoming appointments, soonest first.
    pub fn upcoming() -> Self {
        Self {
            window: Some(TimeWindow::Upcoming),
            direction: SortDirection::Ascending,
            ..Self::default()
        }
    }

    /// Today's appointments, earliest first.
    pub fn today() -> Self {
        Self {
            window: Some(TimeWindow::Today),
            direction: SortDirection::Ascending,
            ..Self::default()
        }
    }
}

/// An appointment with its patient loaded.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentListing {
    pub appointment: Appointment,
    pub patient: Patient,
}

/// Appointment detail view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AppointmentDetail {
    pub appointment: Appointment,
    pub patient: Patient,
    pub examinations: Vec<Examination>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn appointment(date: NaiveDateTime, status: AppointmentStatus) -> Appointment {
        let mut appointment = Appointment::new(
            "APT20240615001".into(),
            NewAppointment {
                patient_id: "patient-1".into(),
                appointment_date: date,
                appointment_type: "General Check-up".into(),
                notes: None,
            },
            "user-1".into(),
            at(2024, 6, 1, 8, 0),
        );
        appointment.status = status;
        appointment
    }

    #[test]
    fn test_new_appointment_is_scheduled() {
        let appt = appointment(at(2024, 6, 20, 9, 0), AppointmentStatus::Scheduled);
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.id.len(), 36);
        assert_eq!(appt.created_by, "user-1");
    }

    #[test]
    fn test_upcoming_excludes_cancelled() {
        let now = at(2024, 6, 15, 12, 0);
        let future = at(2024, 6, 20, 9, 0);

        assert!(TimeWindow::Upcoming.contains(&appointment(future, AppointmentStatus::Scheduled), now));
        assert!(!TimeWindow::Upcoming.contains(&appointment(future, AppointmentStatus::Cancelled), now));
        assert!(TimeWindow::Upcoming.contains(&appointment(now, AppointmentStatus::Completed), now));
        assert!(!TimeWindow::Upcoming.contains(
            &appointment(at(2024, 6, 15, 11, 59), AppointmentStatus::Scheduled),
            now
        ));
    }

    #[test]
    fn test_today_boundaries() {
        let now = at(2024, 6, 15, 12, 0);

        assert!(TimeWindow::Today.contains(&appointment(at(2024, 6, 15, 23, 59), AppointmentStatus::Cancelled), now));
        assert!(TimeWindow::Today.contains(&appointment(at(2024, 6, 15, 0, 0), AppointmentStatus::Scheduled), now));
        assert!(!TimeWindow::Today.contains(&appointment(at(2024, 6, 16, 0, 1), AppointmentStatus::Scheduled), now));
        assert!(!TimeWindow::Today.contains(&appointment(at(2024, 6, 14, 23, 59), AppointmentStatus::Scheduled), now));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(AppointmentStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            "in_progress".parse::<AppointmentStatus>().unwrap(),
            AppointmentStatus::InProgress
        );
    }
}
