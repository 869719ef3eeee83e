//! Dashboard summary and health check.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::Clinic;
use crate::error::ClinicResult;
use crate::models::{
    AppointmentListing, ExaminationDetail, ExaminationStatus, PatientStatus, TimeWindow,
};

const DASHBOARD_UPCOMING: u32 = 10;
const DASHBOARD_RECENT_EXAMINATIONS: u32 = 10;

/// Aggregate counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_patients: u64,
    pub active_patients: u64,
    pub upcoming_appointments: u64,
    pub today_appointments: u64,
    pub completed_examinations: u64,
    pub pending_examinations: u64,
}

/// Counts plus the upcoming, recent and today lists.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardSummary {
    pub stats: DashboardStats,
    pub upcoming_appointments: Vec<AppointmentListing>,
    pub recent_examinations: Vec<ExaminationDetail>,
    pub today_appointments: Vec<AppointmentListing>,
}

/// Liveness report.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: NaiveDateTime,
}

/// Read-only overview across all records.
pub struct Dashboard<'a> {
    clinic: &'a Clinic,
}

impl<'a> Dashboard<'a> {
    pub fn new(clinic: &'a Clinic) -> Self {
        Self { clinic }
    }

    pub fn stats(&self) -> ClinicResult<DashboardStats> {
        let db = &self.clinic.db;
        let now = self.clinic.now();

        Ok(DashboardStats {
            total_patients: db.count_patients(None)?,
            active_patients: db.count_patients(Some(PatientStatus::Active))?,
            upcoming_appointments: db.count_appointments(TimeWindow::Upcoming, now)?,
            today_appointments: db.count_appointments(TimeWindow::Today, now)?,
            completed_examinations: db.count_examinations(ExaminationStatus::Completed)?,
            pending_examinations: db.count_examinations(ExaminationStatus::Pending)?,
        })
    }

    pub fn summary(&self) -> ClinicResult<DashboardSummary> {
        let appointments = self.clinic.appointments();

        Ok(DashboardSummary {
            stats: self.stats()?,
            upcoming_appointments: appointments.upcoming(DASHBOARD_UPCOMING)?,
            recent_examinations: self
                .clinic
                .examinations()
                .recent_completed(DASHBOARD_RECENT_EXAMINATIONS)?,
            today_appointments: appointments.today()?,
        })
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok".to_string(),
            timestamp: self.clinic.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::ClinicConfig;
    use crate::db::Database;
    use crate::models::{ExaminationForm, Gender, NewAppointment, PatientForm};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn clinic() -> Clinic {
        Clinic::new(
            Database::open_in_memory().unwrap(),
            Arc::new(FixedClock::at(2024, 6, 15, 8, 0)),
            ClinicConfig::default(),
        )
    }

    #[test]
    fn test_empty_dashboard() {
        let clinic = clinic();
        let summary = clinic.dashboard().summary().unwrap();

        assert_eq!(summary.stats.total_patients, 0);
        assert!(summary.upcoming_appointments.is_empty());
        assert!(summary.recent_examinations.is_empty());
        assert!(summary.today_appointments.is_empty());
    }

    #[test]
    fn test_counts() {
        let clinic = clinic();
        let patient = clinic
            .patients()
            .register(PatientForm::new(
                "Jane Doe",
                NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
                Gender::Female,
            ))
            .unwrap();
        let appointment = clinic
            .appointments()
            .book(
                NewAppointment {
                    patient_id: patient.id,
                    appointment_date: clinic.today().and_hms_opt(10, 0, 0).unwrap(),
                    appointment_type: "Check-up".into(),
                    notes: None,
                },
                "doctor-1",
            )
            .unwrap();
        clinic
            .examinations()
            .record(&appointment.id, ExaminationForm::new("Physical"), "doctor-1")
            .unwrap();

        let stats = clinic.dashboard().stats().unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_patients: 1,
                active_patients: 1,
                upcoming_appointments: 1,
                today_appointments: 1,
                completed_examinations: 0,
                pending_examinations: 1,
            }
        );
    }

    #[test]
    fn test_health_uses_clock() {
        let clinic = clinic();
        let health = clinic.dashboard().health();
        assert_eq!(health.status, "ok");
        assert_eq!(health.timestamp, clinic.now());
    }
}
