//! SQLite schema definition.

/// Complete database schema for clinic records.
pub const SCHEMA: &str = r#"
-- Enable foreign keys (required for cascading deletes)
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    medical_record_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    date_of_birth TEXT NOT NULL,                  -- YYYY-MM-DD
    gender TEXT NOT NULL CHECK (gender IN ('male', 'female')),
    phone TEXT,
    email TEXT,
    address TEXT,
    emergency_contact_name TEXT,
    emergency_contact_phone TEXT,
    medical_history TEXT,
    allergies TEXT,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);
CREATE INDEX IF NOT EXISTS idx_patients_date_of_birth ON patients(date_of_birth);
CREATE INDEX IF NOT EXISTS idx_patients_status_created ON patients(status, created_at);
CREATE INDEX IF NOT EXISTS idx_patients_email ON patients(email);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    appointment_number TEXT NOT NULL UNIQUE,
    appointment_date TEXT NOT NULL,               -- YYYY-MM-DD HH:MM:SS, local wall clock
    type TEXT NOT NULL,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'scheduled'
        CHECK (status IN ('scheduled', 'in_progress', 'completed', 'cancelled')),
    created_by TEXT NOT NULL,                     -- actor id from the identity provider
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date);
CREATE INDEX IF NOT EXISTS idx_appointments_type ON appointments(type);
CREATE INDEX IF NOT EXISTS idx_appointments_status_date ON appointments(status, appointment_date);
CREATE INDEX IF NOT EXISTS idx_appointments_patient_status ON appointments(patient_id, status);

-- ============================================================================
-- Examinations
-- ============================================================================

CREATE TABLE IF NOT EXISTS examinations (
    id TEXT PRIMARY KEY,
    appointment_id TEXT NOT NULL REFERENCES appointments(id) ON DELETE CASCADE,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    examination_type TEXT NOT NULL,
    height REAL,                                  -- cm, 2 decimals
    weight REAL,                                  -- kg, 2 decimals
    blood_pressure TEXT,
    heart_rate INTEGER,                           -- bpm
    temperature REAL,                             -- Celsius, 1 decimal
    symptoms TEXT,
    diagnosis TEXT,
    treatment TEXT,
    recommendations TEXT,
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed')),
    examined_by TEXT NOT NULL,                    -- actor id from the identity provider
    examination_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_examinations_type ON examinations(examination_type);
CREATE INDEX IF NOT EXISTS idx_examinations_date ON examinations(examination_date);
CREATE INDEX IF NOT EXISTS idx_examinations_patient_date ON examinations(patient_id, examination_date);
CREATE INDEX IF NOT EXISTS idx_examinations_status_date ON examinations(status, examination_date);
CREATE INDEX IF NOT EXISTS idx_examinations_appointment ON examinations(appointment_id);
"#;
