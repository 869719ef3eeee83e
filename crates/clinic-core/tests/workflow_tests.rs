//! End-to-end clinic workflow tests.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::{
    AppointmentQuery, AppointmentStatus, AppointmentUpdate, Clinic, ClinicConfig, ClinicError,
    Database, ExaminationForm, ExaminationStatus, FixedClock, Gender, NewAppointment, Patient,
    PatientForm, PatientQuery, TimeWindow,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

fn clinic_at(now: NaiveDateTime) -> Clinic {
    Clinic::new(
        Database::open_in_memory().unwrap(),
        Arc::new(FixedClock::new(now)),
        ClinicConfig::default(),
    )
}

fn register(clinic: &Clinic, name: &str) -> Patient {
    clinic
        .patients()
        .register(PatientForm::new(
            name,
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            Gender::Female,
        ))
        .unwrap()
}

fn book(clinic: &Clinic, patient: &Patient, date: NaiveDateTime) -> clinic_core::Appointment {
    clinic
        .appointments()
        .book(
            NewAppointment {
                patient_id: patient.id.clone(),
                appointment_date: date,
                appointment_type: "General Check-up".into(),
                notes: None,
            },
            "doctor-1",
        )
        .unwrap()
}

#[test]
fn test_end_to_end_workflow() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));

    let mut form = PatientForm::new(
        "Jane Doe",
        NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
        Gender::Female,
    );
    form.email = Some("jane@example.com".into());
    let patient = clinic.patients().register(form).unwrap();
    assert!(patient.medical_record_number.starts_with("MR2024"));

    let appointment = book(&clinic, &patient, at(2024, 6, 15, 14, 30, 0));
    assert!(appointment.appointment_number.starts_with("APT20240615"));
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);

    let mut exam = ExaminationForm::new("Physical");
    exam.vitals.height = Some(165.0);
    exam.vitals.weight = Some(60.0);
    exam.vitals.blood_pressure = Some("120/80".into());
    exam.vitals.heart_rate = Some(72);
    exam.vitals.temperature = Some(36.6);
    exam.findings.diagnosis = Some("Healthy".into());
    exam.status = ExaminationStatus::Completed;
    let examination = clinic
        .examinations()
        .record(&appointment.id, exam, "doctor-1")
        .unwrap();

    let detail = clinic.examinations().detail(&examination.id).unwrap();
    assert_eq!(detail.bmi, Some(22.04));
    assert_eq!(detail.patient.id, patient.id);
    assert_eq!(detail.appointment.status, AppointmentStatus::Completed);

    let record = clinic.patients().record(&patient.id).unwrap();
    assert_eq!(record.age, 34);
    assert_eq!(record.appointments.len(), 1);
    assert_eq!(record.appointments[0].examinations.len(), 1);
    assert_eq!(record.recent_examinations.len(), 1);

    let dashboard = clinic.dashboard().summary().unwrap();
    assert_eq!(dashboard.stats.total_patients, 1);
    assert_eq!(dashboard.stats.completed_examinations, 1);
    assert_eq!(dashboard.stats.today_appointments, 1);
    assert_eq!(dashboard.recent_examinations.len(), 1);
    assert_eq!(dashboard.today_appointments.len(), 1);
}

#[test]
fn test_pending_examination_does_not_cascade() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));
    let patient = register(&clinic, "Jane Doe");
    let appointment = book(&clinic, &patient, at(2024, 6, 16, 9, 0, 0));

    let mut form = ExaminationForm::new("Physical");
    form.vitals.height = Some(180.0);
    form.vitals.weight = Some(72.0);
    let examination = clinic
        .examinations()
        .record(&appointment.id, form, "doctor-1")
        .unwrap();

    assert_eq!(examination.bmi(), Some(22.22));
    assert_eq!(
        clinic.appointments().get(&appointment.id).unwrap().status,
        AppointmentStatus::Scheduled
    );
}

#[test]
fn test_cascade_overrides_cancelled_appointment() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));
    let patient = register(&clinic, "Jane Doe");
    let appointment = book(&clinic, &patient, at(2024, 6, 16, 9, 0, 0));

    let mut update = AppointmentUpdate::from(&appointment);
    update.status = AppointmentStatus::Cancelled;
    clinic.appointments().update(&appointment.id, update).unwrap();

    let mut form = ExaminationForm::new("Follow-up");
    form.status = ExaminationStatus::Completed;
    clinic
        .examinations()
        .record(&appointment.id, form, "doctor-1")
        .unwrap();

    assert_eq!(
        clinic.appointments().get(&appointment.id).unwrap().status,
        AppointmentStatus::Completed
    );
}

#[test]
fn test_bmi_absent_without_height() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));
    let patient = register(&clinic, "Jane Doe");
    let appointment = book(&clinic, &patient, at(2024, 6, 16, 9, 0, 0));

    let mut form = ExaminationForm::new("Physical");
    form.vitals.weight = Some(60.0);
    let examination = clinic
        .examinations()
        .record(&appointment.id, form, "doctor-1")
        .unwrap();

    assert_eq!(
        clinic.examinations().detail(&examination.id).unwrap().bmi,
        None
    );
}

#[test]
fn test_patient_deletion_cascades() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));
    let patient = register(&clinic, "Jane Doe");
    let other = register(&clinic, "John Roe");
    let appointment = book(&clinic, &patient, at(2024, 6, 16, 9, 0, 0));
    let kept = book(&clinic, &other, at(2024, 6, 16, 10, 0, 0));
    let examination = clinic
        .examinations()
        .record(&appointment.id, ExaminationForm::new("Physical"), "doctor-1")
        .unwrap();

    clinic.patients().delete(&patient.id).unwrap();

    assert!(matches!(
        clinic.appointments().get(&appointment.id),
        Err(ClinicError::NotFound { .. })
    ));
    assert!(matches!(
        clinic.examinations().get(&examination.id),
        Err(ClinicError::NotFound { .. })
    ));
    assert!(clinic.appointments().get(&kept.id).is_ok());
}

#[test]
fn test_upcoming_excludes_cancelled() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));
    let patient = register(&clinic, "Jane Doe");
    let kept = book(&clinic, &patient, at(2024, 6, 20, 9, 0, 0));
    let cancelled = book(&clinic, &patient, at(2024, 6, 18, 9, 0, 0));

    let mut update = AppointmentUpdate::from(&cancelled);
    update.status = AppointmentStatus::Cancelled;
    clinic.appointments().update(&cancelled.id, update).unwrap();

    let upcoming = clinic.appointments().upcoming(10).unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].appointment.id, kept.id);

    let listed = clinic
        .patients()
        .list(&PatientQuery::default(), 1)
        .unwrap();
    assert_eq!(listed.items[0].upcoming_appointments.len(), 1);
}

#[test]
fn test_today_window_boundaries() {
    let clinic = clinic_at(at(2024, 6, 15, 0, 0, 0));
    let patient = register(&clinic, "Jane Doe");

    let last_second = book(&clinic, &patient, at(2024, 6, 15, 23, 59, 59));
    let next_midnight = book(&clinic, &patient, at(2024, 6, 16, 0, 0, 0));

    // Move one booking to the first second of the day; edits accept any date.
    let early = book(&clinic, &patient, at(2024, 6, 17, 9, 0, 0));
    let mut update = AppointmentUpdate::from(&early);
    update.appointment_date = at(2024, 6, 15, 0, 0, 0);
    clinic.appointments().update(&early.id, update).unwrap();

    let today: Vec<String> = clinic
        .appointments()
        .today()
        .unwrap()
        .into_iter()
        .map(|l| l.appointment.id)
        .collect();
    assert_eq!(today, vec![early.id.clone(), last_second.id.clone()]);
    assert!(!today.contains(&next_midnight.id));

    let query = AppointmentQuery {
        window: Some(TimeWindow::Today),
        ..AppointmentQuery::default()
    };
    let page = clinic.appointments().list(&query, 1).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].appointment.id, last_second.id);
}

#[test]
fn test_identifiers_unique_across_many_records() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0)).with_rng(StdRng::seed_from_u64(11));
    let patient = register(&clinic, "Jane Doe");

    let mut numbers = HashSet::new();
    for i in 0..200 {
        let appointment = book(&clinic, &patient, at(2024, 7, 1, 8, 0, 0) + chrono::Duration::minutes(i));
        assert!(appointment.appointment_number.starts_with("APT20240615"));
        assert!(numbers.insert(appointment.appointment_number));
    }

    let mut record_numbers = HashSet::new();
    record_numbers.insert(patient.medical_record_number.clone());
    for i in 0..200 {
        let other = register(&clinic, &format!("Patient {}", i));
        assert!(record_numbers.insert(other.medical_record_number));
    }
}

#[test]
fn test_validation_rejects_duplicate_email() {
    let clinic = clinic_at(at(2024, 6, 15, 8, 0, 0));
    let mut form = PatientForm::new(
        "Jane Doe",
        NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
        Gender::Female,
    );
    form.email = Some("jane@example.com".into());
    clinic.patients().register(form.clone()).unwrap();

    form.name = "Janet Doe".into();
    form.email = Some("JANE@example.com".into());
    let err = clinic.patients().register(form).unwrap_err();
    assert!(matches!(err, ClinicError::Validation(e) if e.has("email")));
    assert_eq!(clinic.database().count_patients(None).unwrap(), 1);
}
