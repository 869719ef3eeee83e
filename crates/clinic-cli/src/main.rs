use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use clinic_core::clock::{parse_date, parse_datetime};
use clinic_core::models::{Findings, Vitals};
use clinic_core::{
    AppointmentQuery, AppointmentStatus, AppointmentUpdate, Clinic, ClinicConfig,
    ExaminationForm, ExaminationQuery, ExaminationStatus, Gender, NewAppointment, PatientForm,
    PatientQuery, PatientStatus, TimeWindow,
};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic patient, appointment and examination records")]
struct Cli {
    /// SQLite database file (overrides CLINIC_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Identifier generation attempts (overrides CLINIC_IDENTIFIER_MAX_ATTEMPTS)
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report liveness
    Health,
    /// Patient registry
    #[command(subcommand)]
    Patient(PatientCommand),
    /// Appointment ledger
    #[command(subcommand)]
    Appointment(AppointmentCommand),
    /// Examination records
    #[command(subcommand)]
    Examination(ExaminationCommand),
    /// Counts plus upcoming, recent and today lists
    Dashboard,
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Register a new patient
    Register {
        #[arg(long)]
        name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long, value_parser = date_arg)]
        dob: NaiveDate,
        /// male or female
        #[arg(long)]
        gender: Gender,
        #[command(flatten)]
        details: PatientDetails,
    },
    /// Show a patient's full record
    Show { id: String },
    /// Edit a patient; omitted fields are unchanged
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = date_arg)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        gender: Option<Gender>,
        /// active or inactive
        #[arg(long)]
        status: Option<PatientStatus>,
        #[command(flatten)]
        details: PatientDetails,
    },
    /// List patients, newest first
    List {
        /// Name prefix
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        status: Option<PatientStatus>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Delete a patient with all appointments and examinations
    Delete { id: String },
}

#[derive(Args)]
struct PatientDetails {
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    emergency_contact_name: Option<String>,
    #[arg(long)]
    emergency_contact_phone: Option<String>,
    #[arg(long)]
    medical_history: Option<String>,
    #[arg(long)]
    allergies: Option<String>,
}

impl PatientDetails {
    fn apply(self, form: &mut PatientForm) {
        merge(&mut form.phone, self.phone);
        merge(&mut form.email, self.email);
        merge(&mut form.address, self.address);
        merge(&mut form.emergency_contact_name, self.emergency_contact_name);
        merge(&mut form.emergency_contact_phone, self.emergency_contact_phone);
        merge(&mut form.medical_history, self.medical_history);
        merge(&mut form.allergies, self.allergies);
    }
}

#[derive(Subcommand)]
enum AppointmentCommand {
    /// Book an appointment
    Book {
        #[arg(long)]
        patient: String,
        /// Date and time (YYYY-MM-DD HH:MM)
        #[arg(long, value_parser = datetime_arg)]
        date: NaiveDateTime,
        /// Visit type, e.g. "General Check-up"
        #[arg(long = "type")]
        appointment_type: String,
        #[arg(long)]
        notes: Option<String>,
        /// Booking actor ID
        #[arg(long)]
        actor: String,
    },
    /// Show an appointment with its patient and examinations
    Show { id: String },
    /// Edit an appointment; omitted fields are unchanged
    Update {
        id: String,
        #[arg(long)]
        patient: Option<String>,
        #[arg(long, value_parser = datetime_arg)]
        date: Option<NaiveDateTime>,
        #[arg(long = "type")]
        appointment_type: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// scheduled, in_progress, completed or cancelled
        #[arg(long)]
        status: Option<AppointmentStatus>,
    },
    /// List appointments, latest first
    List {
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        status: Option<AppointmentStatus>,
        /// upcoming or today
        #[arg(long)]
        window: Option<TimeWindow>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Appointments that can still be examined
    Open,
    /// Delete an appointment with its examinations
    Delete { id: String },
}

#[derive(Subcommand)]
enum ExaminationCommand {
    /// Record an examination for an appointment
    Record {
        #[arg(long)]
        appointment: String,
        #[arg(long = "type")]
        examination_type: String,
        #[command(flatten)]
        details: ExaminationDetails,
        /// pending (default) or completed
        #[arg(long)]
        status: Option<ExaminationStatus>,
        /// Examining actor ID
        #[arg(long)]
        actor: String,
    },
    /// Show an examination with BMI, patient and appointment
    Show { id: String },
    /// Edit an examination; omitted fields are unchanged
    Update {
        id: String,
        #[arg(long = "type")]
        examination_type: Option<String>,
        #[command(flatten)]
        details: ExaminationDetails,
        #[arg(long)]
        status: Option<ExaminationStatus>,
    },
    /// List examinations, latest first
    List {
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        appointment: Option<String>,
        #[arg(long)]
        status: Option<ExaminationStatus>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Delete an examination
    Delete { id: String },
}

#[derive(Args)]
struct ExaminationDetails {
    /// Height in cm
    #[arg(long)]
    height: Option<f64>,
    /// Weight in kg
    #[arg(long)]
    weight: Option<f64>,
    #[arg(long)]
    blood_pressure: Option<String>,
    #[arg(long)]
    heart_rate: Option<i64>,
    /// Temperature in °C
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    symptoms: Option<String>,
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    treatment: Option<String>,
    #[arg(long)]
    recommendations: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl ExaminationDetails {
    fn apply(self, vitals: &mut Vitals, findings: &mut Findings) {
        merge(&mut vitals.height, self.height);
        merge(&mut vitals.weight, self.weight);
        merge(&mut vitals.blood_pressure, self.blood_pressure);
        merge(&mut vitals.heart_rate, self.heart_rate);
        merge(&mut vitals.temperature, self.temperature);
        merge(&mut findings.symptoms, self.symptoms);
        merge(&mut findings.diagnosis, self.diagnosis);
        merge(&mut findings.treatment, self.treatment);
        merge(&mut findings.recommendations, self.recommendations);
        merge(&mut findings.notes, self.notes);
    }
}

fn merge<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

fn date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("expected YYYY-MM-DD, got {}", value))
}

fn datetime_arg(value: &str) -> Result<NaiveDateTime, String> {
    parse_datetime(value).ok_or_else(|| format!("expected YYYY-MM-DD HH:MM[:SS], got {}", value))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_clinic(cli: &Cli) -> anyhow::Result<Clinic> {
    let mut config = ClinicConfig::from_env()?;
    if let Some(path) = &cli.database {
        config = config.with_database_path(path.clone())?;
    }
    if let Some(attempts) = cli.max_attempts {
        config = config.with_identifier_max_attempts(attempts)?;
    }
    Clinic::open(config).context("failed to open clinic database")
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("clinic=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let clinic = open_clinic(&cli)?;

    match cli.command {
        Commands::Health => print_json(&clinic.dashboard().health()),
        Commands::Dashboard => print_json(&clinic.dashboard().summary()?),
        Commands::Patient(command) => run_patient(&clinic, command),
        Commands::Appointment(command) => run_appointment(&clinic, command),
        Commands::Examination(command) => run_examination(&clinic, command),
    }
}

fn run_patient(clinic: &Clinic, command: PatientCommand) -> anyhow::Result<()> {
    let registry = clinic.patients();
    match command {
        PatientCommand::Register {
            name,
            dob,
            gender,
            details,
        } => {
            let mut form = PatientForm::new(name, dob, gender);
            details.apply(&mut form);
            print_json(&registry.register(form)?)
        }
        PatientCommand::Show { id } => print_json(&registry.record(&id)?),
        PatientCommand::Update {
            id,
            name,
            dob,
            gender,
            status,
            details,
        } => {
            let patient = registry.get(&id)?;
            let mut form = PatientForm::from(&patient);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(dob) = dob {
                form.date_of_birth = dob;
            }
            if let Some(gender) = gender {
                form.gender = gender;
            }
            merge(&mut form.status, status);
            details.apply(&mut form);
            print_json(&registry.update(&id, form)?)
        }
        PatientCommand::List { name, status, page } => {
            let query = PatientQuery {
                name_prefix: name,
                status,
            };
            print_json(&registry.list(&query, page)?)
        }
        PatientCommand::Delete { id } => {
            registry.delete(&id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn run_appointment(clinic: &Clinic, command: AppointmentCommand) -> anyhow::Result<()> {
    let ledger = clinic.appointments();
    match command {
        AppointmentCommand::Book {
            patient,
            date,
            appointment_type,
            notes,
            actor,
        } => {
            let request = NewAppointment {
                patient_id: patient,
                appointment_date: date,
                appointment_type,
                notes,
            };
            print_json(&ledger.book(request, &actor)?)
        }
        AppointmentCommand::Show { id } => print_json(&ledger.detail(&id)?),
        AppointmentCommand::Update {
            id,
            patient,
            date,
            appointment_type,
            notes,
            status,
        } => {
            let appointment = ledger.get(&id)?;
            let mut update = AppointmentUpdate::from(&appointment);
            if let Some(patient) = patient {
                update.patient_id = patient;
            }
            if let Some(date) = date {
                update.appointment_date = date;
            }
            if let Some(appointment_type) = appointment_type {
                update.appointment_type = appointment_type;
            }
            merge(&mut update.notes, notes);
            if let Some(status) = status {
                update.status = status;
            }
            print_json(&ledger.update(&id, update)?)
        }
        AppointmentCommand::List {
            patient,
            status,
            window,
            page,
        } => {
            let query = AppointmentQuery {
                patient_id: patient,
                status,
                window,
                ..AppointmentQuery::default()
            };
            print_json(&ledger.list(&query, page)?)
        }
        AppointmentCommand::Open => print_json(&ledger.open_for_examination()?),
        AppointmentCommand::Delete { id } => {
            ledger.delete(&id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn run_examination(clinic: &Clinic, command: ExaminationCommand) -> anyhow::Result<()> {
    let records = clinic.examinations();
    match command {
        ExaminationCommand::Record {
            appointment,
            examination_type,
            details,
            status,
            actor,
        } => {
            let mut form = ExaminationForm::new(examination_type);
            details.apply(&mut form.vitals, &mut form.findings);
            form.status = status.unwrap_or_default();
            print_json(&records.record(&appointment, form, &actor)?)
        }
        ExaminationCommand::Show { id } => print_json(&records.detail(&id)?),
        ExaminationCommand::Update {
            id,
            examination_type,
            details,
            status,
        } => {
            let examination = records.get(&id)?;
            let mut form = ExaminationForm::from(&examination);
            if let Some(examination_type) = examination_type {
                form.examination_type = examination_type;
            }
            details.apply(&mut form.vitals, &mut form.findings);
            if let Some(status) = status {
                form.status = status;
            }
            print_json(&records.update(&id, form)?)
        }
        ExaminationCommand::List {
            patient,
            appointment,
            status,
            page,
        } => {
            let query = ExaminationQuery {
                patient_id: patient,
                appointment_id: appointment,
                status,
            };
            print_json(&records.list(&query, page)?)
        }
        ExaminationCommand::Delete { id } => {
            records.delete(&id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}
