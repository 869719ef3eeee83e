//! Examination database operations.

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{Database, DbError, DbResult, WhereClause};
use crate::models::{
    Examination, ExaminationQuery, ExaminationStatus, Findings, PageRequest, Vitals,
};

const EXAMINATION_COLUMNS: &str = r#"
    id, appointment_id, patient_id, examination_type, height, weight,
    blood_pressure, heart_rate, temperature, symptoms, diagnosis, treatment,
    recommendations, notes, status, examined_by, examination_date,
    created_at, updated_at
"#;

impl Database {
    /// Insert a new examination.
    pub fn insert_examination(&self, examination: &Examination) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO examinations (
                id, appointment_id, patient_id, examination_type, height, weight,
                blood_pressure, heart_rate, temperature, symptoms, diagnosis, treatment,
                recommendations, notes, status, examined_by, examination_date,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                examination.id,
                examination.appointment_id,
                examination.patient_id,
                examination.examination_type,
                examination.vitals.height,
                examination.vitals.weight,
                examination.vitals.blood_pressure,
                examination.vitals.heart_rate,
                examination.vitals.temperature,
                examination.findings.symptoms,
                examination.findings.diagnosis,
                examination.findings.treatment,
                examination.findings.recommendations,
                examination.findings.notes,
                examination.status.as_str(),
                examination.examined_by,
                examination.examination_date,
                examination.created_at,
                examination.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing examination's editable fields.
    pub fn update_examination(&self, examination: &Examination) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE examinations SET
                patient_id = ?2,
                examination_type = ?3,
                height = ?4,
                weight = ?5,
                blood_pressure = ?6,
                heart_rate = ?7,
                temperature = ?8,
                symptoms = ?9,
                diagnosis = ?10,
                treatment = ?11,
                recommendations = ?12,
                notes = ?13,
                status = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
            params![
                examination.id,
                examination.patient_id,
                examination.examination_type,
                examination.vitals.height,
                examination.vitals.weight,
                examination.vitals.blood_pressure,
                examination.vitals.heart_rate,
                examination.vitals.temperature,
                examination.findings.symptoms,
                examination.findings.diagnosis,
                examination.findings.treatment,
                examination.findings.recommendations,
                examination.findings.notes,
                examination.status.as_str(),
                examination.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an examination by ID.
    pub fn get_examination(&self, id: &str) -> DbResult<Option<Examination>> {
        self.conn
            .query_row(
                &format!("SELECT {EXAMINATION_COLUMNS} FROM examinations WHERE id = ?"),
                [id],
                ExaminationRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// List examinations, latest examination date first.
    pub fn list_examinations(
        &self,
        query: &ExaminationQuery,
        page: PageRequest,
    ) -> DbResult<(Vec<Examination>, u64)> {
        let mut clause = WhereClause::default();
        if let Some(patient_id) = &query.patient_id {
            clause.push("patient_id = ?", patient_id.clone());
        }
        if let Some(appointment_id) = &query.appointment_id {
            clause.push("appointment_id = ?", appointment_id.clone());
        }
        if let Some(status) = query.status {
            clause.push("status = ?", status.as_str());
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM examinations{}", clause.sql()),
            params_from_iter(clause.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {EXAMINATION_COLUMNS} FROM examinations{} ORDER BY examination_date DESC, rowid DESC LIMIT ? OFFSET ?",
            clause.sql()
        );
        clause.bind(page.limit() as i64);
        clause.bind(page.offset() as i64);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(clause.params()), ExaminationRow::from_row)?;
        let mut examinations = Vec::new();
        for row in rows {
            examinations.push(row?.try_into()?);
        }
        Ok((examinations, total as u64))
    }

    /// All examinations of an appointment, latest first.
    pub fn list_examinations_for_appointment(
        &self,
        appointment_id: &str,
    ) -> DbResult<Vec<Examination>> {
        let query = ExaminationQuery {
            appointment_id: Some(appointment_id.to_string()),
            ..ExaminationQuery::default()
        };
        let (examinations, _) = self.list_examinations(&query, PageRequest::first(u32::MAX))?;
        Ok(examinations)
    }

    /// Count examinations with the given status.
    pub fn count_examinations(&self, status: ExaminationStatus) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM examinations WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete an examination. Never touches the appointment.
    pub fn delete_examination(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM examinations WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct ExaminationRow {
    id: String,
    appointment_id: String,
    patient_id: String,
    examination_type: String,
    vitals: Vitals,
    findings: Findings,
    status: String,
    examined_by: String,
    examination_date: NaiveDateTime,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl ExaminationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            patient_id: row.get(2)?,
            examination_type: row.get(3)?,
            vitals: Vitals {
                height: row.get(4)?,
                weight: row.get(5)?,
                blood_pressure: row.get(6)?,
                heart_rate: row.get(7)?,
                temperature: row.get(8)?,
            },
            findings: Findings {
                symptoms: row.get(9)?,
                diagnosis: row.get(10)?,
                treatment: row.get(11)?,
                recommendations: row.get(12)?,
                notes: row.get(13)?,
            },
            status: row.get(14)?,
            examined_by: row.get(15)?,
            examination_date: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }
}

impl TryFrom<ExaminationRow> for Examination {
    type Error = DbError;

    fn try_from(row: ExaminationRow) -> Result<Self, Self::Error> {
        Ok(Examination {
            id: row.id,
            appointment_id: row.appointment_id,
            patient_id: row.patient_id,
            examination_type: row.examination_type,
            vitals: row.vitals,
            findings: row.findings,
            status: row
                .status
                .parse()
                .map_err(|e| DbError::Constraint(format!("{}", e)))?,
            examined_by: row.examined_by,
            examination_date: row.examination_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Appointment, ExaminationForm, Gender, NewAppointment, Patient, PatientForm,
    };
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup_db() -> (Database, Appointment) {
        let db = Database::open_in_memory().unwrap();
        let form = PatientForm::new(
            "Jane Doe",
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            Gender::Female,
        );
        let patient = Patient::new("MR20240001".into(), form, at(1, 9));
        db.insert_patient(&patient).unwrap();

        let appointment = Appointment::new(
            "APT20240601001".into(),
            NewAppointment {
                patient_id: patient.id.clone(),
                appointment_date: at(15, 9),
                appointment_type: "General Check-up".into(),
                notes: None,
            },
            "user-1".into(),
            at(1, 9),
        );
        db.insert_appointment(&appointment).unwrap();
        (db, appointment)
    }

    fn examine(
        db: &Database,
        appointment: &Appointment,
        status: ExaminationStatus,
        when: NaiveDateTime,
    ) -> Examination {
        let mut form = ExaminationForm::new("Physical");
        form.status = status;
        form.vitals.height = Some(180.0);
        form.vitals.weight = Some(72.0);
        form.vitals.heart_rate = Some(72);
        form.findings.diagnosis = Some("Healthy".into());
        let examination = Examination::new(appointment, form, "doctor-1".into(), when);
        db.insert_examination(&examination).unwrap();
        examination
    }

    #[test]
    fn test_insert_and_get_examination() {
        let (db, appointment) = setup_db();
        let examination = examine(&db, &appointment, ExaminationStatus::Pending, at(15, 9));

        let retrieved = db.get_examination(&examination.id).unwrap().unwrap();
        assert_eq!(retrieved, examination);
        assert_eq!(retrieved.patient_id, appointment.patient_id);
        assert_eq!(retrieved.bmi(), Some(22.22));
    }

    #[test]
    fn test_update_examination() {
        let (db, appointment) = setup_db();
        let mut examination = examine(&db, &appointment, ExaminationStatus::Pending, at(15, 9));

        examination.status = ExaminationStatus::Completed;
        examination.vitals.weight = None;
        examination.findings.treatment = Some("Rest".into());
        assert!(db.update_examination(&examination).unwrap());

        let retrieved = db.get_examination(&examination.id).unwrap().unwrap();
        assert_eq!(retrieved.status, ExaminationStatus::Completed);
        assert_eq!(retrieved.vitals.weight, None);
        assert_eq!(retrieved.bmi(), None);
        assert_eq!(retrieved.findings.treatment.as_deref(), Some("Rest"));
    }

    #[test]
    fn test_list_and_count() {
        let (db, appointment) = setup_db();
        let older = examine(&db, &appointment, ExaminationStatus::Completed, at(15, 9));
        let newer = examine(&db, &appointment, ExaminationStatus::Pending, at(16, 9));

        let (all, total) = db
            .list_examinations(&ExaminationQuery::default(), PageRequest::first(15))
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);

        let query = ExaminationQuery {
            status: Some(ExaminationStatus::Completed),
            ..ExaminationQuery::default()
        };
        let (completed, _) = db.list_examinations(&query, PageRequest::first(15)).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, older.id);

        assert_eq!(db.list_examinations_for_appointment(&appointment.id).unwrap().len(), 2);
        assert_eq!(db.count_examinations(ExaminationStatus::Completed).unwrap(), 1);
        assert_eq!(db.count_examinations(ExaminationStatus::Pending).unwrap(), 1);
    }

    #[test]
    fn test_delete_examination_keeps_appointment() {
        let (db, appointment) = setup_db();
        let examination = examine(&db, &appointment, ExaminationStatus::Completed, at(15, 9));

        assert!(db.delete_examination(&examination.id).unwrap());
        assert!(db.get_examination(&examination.id).unwrap().is_none());
        assert!(db.appointment_exists(&appointment.id).unwrap());
    }

    #[test]
    fn test_appointment_delete_cascades() {
        let (db, appointment) = setup_db();
        let examination = examine(&db, &appointment, ExaminationStatus::Pending, at(15, 9));

        db.delete_appointment(&appointment.id).unwrap();
        assert!(db.get_examination(&examination.id).unwrap().is_none());
    }
}
