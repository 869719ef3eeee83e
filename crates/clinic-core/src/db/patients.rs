//! Patient database operations.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{placeholders, Database, DbError, DbResult, WhereClause};
use crate::models::{PageRequest, Patient, PatientQuery, PatientStatus};

const PATIENT_COLUMNS: &str = r#"
    id, medical_record_number, name, date_of_birth, gender, phone, email,
    address, emergency_contact_name, emergency_contact_phone, medical_history,
    allergies, status, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, medical_record_number, name, date_of_birth, gender, phone, email,
                address, emergency_contact_name, emergency_contact_phone, medical_history,
                allergies, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                patient.id,
                patient.medical_record_number,
                patient.name,
                patient.date_of_birth,
                patient.gender.as_str(),
                patient.phone,
                patient.email,
                patient.address,
                patient.emergency_contact_name,
                patient.emergency_contact_phone,
                patient.medical_history,
                patient.allergies,
                patient.status.as_str(),
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient. The record number is never rewritten.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                date_of_birth = ?3,
                gender = ?4,
                phone = ?5,
                email = ?6,
                address = ?7,
                emergency_contact_name = ?8,
                emergency_contact_phone = ?9,
                medical_history = ?10,
                allergies = ?11,
                status = ?12,
                updated_at = ?13
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                patient.date_of_birth,
                patient.gender.as_str(),
                patient.phone,
                patient.email,
                patient.address,
                patient.emergency_contact_name,
                patient.emergency_contact_phone,
                patient.medical_history,
                patient.allergies,
                patient.status.as_str(),
                patient.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
                [id],
                PatientRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Get a patient by medical record number.
    pub fn get_patient_by_record_number(&self, number: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE medical_record_number = ?"),
                [number],
                PatientRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Load several patients keyed by ID. Missing IDs are skipped.
    pub fn get_patients_by_ids(&self, ids: &[&str]) -> DbResult<HashMap<String, Patient>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id IN ({})",
            placeholders(ids.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), PatientRow::from_row)?;

        let mut patients = HashMap::with_capacity(ids.len());
        for row in rows {
            let patient: Patient = row?.try_into()?;
            patients.insert(patient.id.clone(), patient);
        }
        Ok(patients)
    }

    pub fn patient_exists(&self, id: &str) -> DbResult<bool> {
        exists(self, "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)", id)
    }

    pub fn medical_record_number_exists(&self, number: &str) -> DbResult<bool> {
        exists(
            self,
            "SELECT EXISTS(SELECT 1 FROM patients WHERE medical_record_number = ?)",
            number,
        )
    }

    /// Whether another patient (not `except_id`) already uses this email.
    pub fn email_in_use(&self, email: &str, except_id: Option<&str>) -> DbResult<bool> {
        let in_use: bool = self.conn.query_row(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM patients
                WHERE lower(email) = lower(?1) AND (?2 IS NULL OR id != ?2)
            )
            "#,
            params![email, except_id],
            |row| row.get(0),
        )?;
        Ok(in_use)
    }

    /// List patients, newest registration first.
    ///
    /// Returns the requested page and the total number of matching rows.
    pub fn list_patients(
        &self,
        query: &PatientQuery,
        page: PageRequest,
    ) -> DbResult<(Vec<Patient>, u64)> {
        let mut clause = WhereClause::default();
        if let Some(prefix) = &query.name_prefix {
            clause.push("name LIKE ? ESCAPE '\\'", format!("{}%", escape_like(prefix)));
        }
        if let Some(status) = query.status {
            clause.push("status = ?", status.as_str());
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM patients{}", clause.sql()),
            params_from_iter(clause.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {PATIENT_COLUMNS} FROM patients{} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            clause.sql()
        );
        clause.bind(page.limit() as i64);
        clause.bind(page.offset() as i64);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(clause.params()), PatientRow::from_row)?;
        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok((patients, total as u64))
    }

    /// Active patients ordered by name.
    pub fn list_active_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE status = 'active' ORDER BY name"
        ))?;
        let rows = stmt.query_map([], PatientRow::from_row)?;
        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Count patients, optionally restricted to one status.
    pub fn count_patients(&self, status: Option<PatientStatus>) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE ?1 IS NULL OR status = ?1",
            [status.map(|s| s.as_str())],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete a patient. Appointments and examinations cascade.
    pub fn delete_patient(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

pub(crate) fn exists(db: &Database, sql: &str, value: &str) -> DbResult<bool> {
    let found: bool = db.conn.query_row(sql, [value], |row| row.get(0))?;
    Ok(found)
}

/// Escape `%`, `_` and the escape character for a LIKE pattern.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    medical_record_number: String,
    name: String,
    date_of_birth: NaiveDate,
    gender: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
    medical_history: Option<String>,
    allergies: Option<String>,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            medical_record_number: row.get(1)?,
            name: row.get(2)?,
            date_of_birth: row.get(3)?,
            gender: row.get(4)?,
            phone: row.get(5)?,
            email: row.get(6)?,
            address: row.get(7)?,
            emergency_contact_name: row.get(8)?,
            emergency_contact_phone: row.get(9)?,
            medical_history: row.get(10)?,
            allergies: row.get(11)?,
            status: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: row.id,
            medical_record_number: row.medical_record_number,
            name: row.name,
            date_of_birth: row.date_of_birth,
            gender: row
                .gender
                .parse()
                .map_err(|e| DbError::Constraint(format!("{}", e)))?,
            phone: row.phone,
            email: row.email,
            address: row.address,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
            medical_history: row.medical_history,
            allergies: row.allergies,
            status: row
                .status
                .parse()
                .map_err(|e| DbError::Constraint(format!("{}", e)))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, PatientForm};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn make_patient(number: &str, name: &str, created: NaiveDateTime) -> Patient {
        let form = PatientForm::new(
            name,
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            Gender::Female,
        );
        Patient::new(number.into(), form, created)
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = make_patient("MR20240001", "Jane Doe", at(15, 10));
        patient.email = Some("jane@example.com".into());
        patient.allergies = Some("Penicillin".into());
        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved, patient);

        let by_number = db
            .get_patient_by_record_number("MR20240001")
            .unwrap()
            .unwrap();
        assert_eq!(by_number.id, patient.id);
        assert!(db.get_patient("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();

        let mut patient = make_patient("MR20240001", "Jane Doe", at(15, 10));
        db.insert_patient(&patient).unwrap();

        patient.status = PatientStatus::Inactive;
        patient.medical_history = Some("Asthma".into());
        patient.updated_at = at(16, 10);
        assert!(db.update_patient(&patient).unwrap());

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.status, PatientStatus::Inactive);
        assert_eq!(retrieved.medical_history.as_deref(), Some("Asthma"));
        assert_eq!(retrieved.updated_at, at(16, 10));

        let missing = make_patient("MR20240002", "Nobody", at(15, 10));
        assert!(!db.update_patient(&missing).unwrap());
    }

    #[test]
    fn test_existence_checks() {
        let db = setup_db();

        let mut patient = make_patient("MR20240001", "Jane Doe", at(15, 10));
        patient.email = Some("Jane@Example.com".into());
        db.insert_patient(&patient).unwrap();

        assert!(db.patient_exists(&patient.id).unwrap());
        assert!(!db.patient_exists("missing").unwrap());
        assert!(db.medical_record_number_exists("MR20240001").unwrap());
        assert!(!db.medical_record_number_exists("MR20240002").unwrap());

        assert!(db.email_in_use("jane@example.com", None).unwrap());
        assert!(!db.email_in_use("jane@example.com", Some(&patient.id)).unwrap());
        assert!(!db.email_in_use("other@example.com", None).unwrap());
    }

    #[test]
    fn test_list_patients_paginated_newest_first() {
        let db = setup_db();

        for (i, name) in ["Alice", "Bob", "Carol"].iter().enumerate() {
            let patient = make_patient(&format!("MR2024000{}", i + 1), name, at(10 + i as u32, 9));
            db.insert_patient(&patient).unwrap();
        }

        let (first, total) = db
            .list_patients(&PatientQuery::default(), PageRequest::new(1, 2))
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "Carol");
        assert_eq!(first[1].name, "Bob");

        let (second, _) = db
            .list_patients(&PatientQuery::default(), PageRequest::new(2, 2))
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].name, "Alice");
    }

    #[test]
    fn test_list_patients_filters() {
        let db = setup_db();

        let max = make_patient("MR20240001", "Max", at(10, 9));
        let maxine = make_patient("MR20240002", "Maxine", at(11, 9));
        let mut luna = make_patient("MR20240003", "Luna", at(12, 9));
        luna.status = PatientStatus::Inactive;
        let odd = make_patient("MR20240004", "Ma%x", at(13, 9));
        for p in [&max, &maxine, &luna, &odd] {
            db.insert_patient(p).unwrap();
        }

        let query = PatientQuery {
            name_prefix: Some("Max".into()),
            status: None,
        };
        let (results, total) = db.list_patients(&query, PageRequest::first(10)).unwrap();
        assert_eq!(total, 2);
        assert!(results.iter().any(|p| p.name == "Max"));
        assert!(results.iter().any(|p| p.name == "Maxine"));

        let query = PatientQuery {
            name_prefix: Some("Ma%".into()),
            status: None,
        };
        let (results, _) = db.list_patients(&query, PageRequest::first(10)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Ma%x");

        let query = PatientQuery {
            name_prefix: None,
            status: Some(PatientStatus::Inactive),
        };
        let (results, _) = db.list_patients(&query, PageRequest::first(10)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Luna");

        assert_eq!(db.count_patients(None).unwrap(), 4);
        assert_eq!(db.count_patients(Some(PatientStatus::Active)).unwrap(), 3);

        let active: Vec<String> = db
            .list_active_patients()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(active, vec!["Ma%x", "Max", "Maxine"]);
    }

    #[test]
    fn test_get_patients_by_ids_and_delete() {
        let db = setup_db();

        let a = make_patient("MR20240001", "A", at(10, 9));
        let b = make_patient("MR20240002", "B", at(11, 9));
        db.insert_patient(&a).unwrap();
        db.insert_patient(&b).unwrap();

        let loaded = db
            .get_patients_by_ids(&[a.id.as_str(), b.id.as_str(), "missing"])
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&b.id].name, "B");

        assert!(db.delete_patient(&a.id).unwrap());
        assert!(!db.delete_patient(&a.id).unwrap());
        assert!(db.get_patient(&a.id).unwrap().is_none());
    }
}
