//! Appointment database operations.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::patients::exists;
use super::{placeholders, Database, DbError, DbResult, WhereClause};
use crate::models::{
    day_bounds, Appointment, AppointmentQuery, AppointmentStatus, PageRequest, TimeWindow,
};

const APPOINTMENT_COLUMNS: &str = r#"
    id, patient_id, appointment_number, appointment_date, type, notes,
    status, created_by, created_at, updated_at
"#;

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, patient_id, appointment_number, appointment_date, type, notes,
                status, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                appointment.id,
                appointment.patient_id,
                appointment.appointment_number,
                appointment.appointment_date,
                appointment.appointment_type,
                appointment.notes,
                appointment.status.as_str(),
                appointment.created_by,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing appointment's editable fields.
    pub fn update_appointment(&self, appointment: &Appointment) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                patient_id = ?2,
                appointment_date = ?3,
                type = ?4,
                notes = ?5,
                status = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                appointment.id,
                appointment.patient_id,
                appointment.appointment_date,
                appointment.appointment_type,
                appointment.notes,
                appointment.status.as_str(),
                appointment.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Set only the status of an appointment.
    pub fn set_appointment_status(
        &self,
        id: &str,
        status: AppointmentStatus,
        updated_at: NaiveDateTime,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE appointments SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), updated_at],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?"),
                [id],
                AppointmentRow::from_row,
            )
            .optional()?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Load several appointments keyed by ID. Missing IDs are skipped.
    pub fn get_appointments_by_ids(&self, ids: &[&str]) -> DbResult<HashMap<String, Appointment>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id IN ({})",
            placeholders(ids.len())
        ))?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), AppointmentRow::from_row)?;

        let mut appointments = HashMap::with_capacity(ids.len());
        for row in rows {
            let appointment: Appointment = row?.try_into()?;
            appointments.insert(appointment.id.clone(), appointment);
        }
        Ok(appointments)
    }

    pub fn appointment_exists(&self, id: &str) -> DbResult<bool> {
        exists(self, "SELECT EXISTS(SELECT 1 FROM appointments WHERE id = ?)", id)
    }

    pub fn appointment_number_exists(&self, number: &str) -> DbResult<bool> {
        exists(
            self,
            "SELECT EXISTS(SELECT 1 FROM appointments WHERE appointment_number = ?)",
            number,
        )
    }

    /// List appointments matching `query`, ordered by appointment date.
    ///
    /// `now` anchors the time windows. Returns the page and the total match count.
    pub fn list_appointments(
        &self,
        query: &AppointmentQuery,
        now: NaiveDateTime,
        page: PageRequest,
    ) -> DbResult<(Vec<Appointment>, u64)> {
        let mut clause = appointment_filter(query, now);

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM appointments{}", clause.sql()),
            params_from_iter(clause.params()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments{} ORDER BY appointment_date {dir}, rowid {dir} LIMIT ? OFFSET ?",
            clause.sql(),
            dir = query.direction.sql(),
        );
        clause.bind(page.limit() as i64);
        clause.bind(page.offset() as i64);

        let appointments = self.query_appointments(&sql, &clause)?;
        Ok((appointments, total as u64))
    }

    /// Count appointments inside a time window.
    pub fn count_appointments(&self, window: TimeWindow, now: NaiveDateTime) -> DbResult<u64> {
        let query = AppointmentQuery {
            window: Some(window),
            ..AppointmentQuery::default()
        };
        let clause = appointment_filter(&query, now);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM appointments{}", clause.sql()),
            params_from_iter(clause.params()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// All appointments for a patient, latest first.
    pub fn list_appointments_for_patient(&self, patient_id: &str) -> DbResult<Vec<Appointment>> {
        let mut clause = WhereClause::default();
        clause.push("patient_id = ?", patient_id.to_string());
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments{} ORDER BY appointment_date DESC, rowid DESC",
            clause.sql()
        );
        self.query_appointments(&sql, &clause)
    }

    /// Next upcoming appointments for a patient, soonest first.
    pub fn upcoming_appointments_for_patient(
        &self,
        patient_id: &str,
        now: NaiveDateTime,
        limit: u32,
    ) -> DbResult<Vec<Appointment>> {
        let query = AppointmentQuery {
            patient_id: Some(patient_id.to_string()),
            ..AppointmentQuery::upcoming()
        };
        let (appointments, _) = self.list_appointments(&query, now, PageRequest::first(limit))?;
        Ok(appointments)
    }

    /// Appointments that can still receive an examination (not cancelled), earliest first.
    pub fn list_open_appointments(&self) -> DbResult<Vec<Appointment>> {
        let mut clause = WhereClause::default();
        clause.push_raw("status != 'cancelled'");
        let sql = format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments{} ORDER BY appointment_date ASC, rowid ASC",
            clause.sql()
        );
        self.query_appointments(&sql, &clause)
    }

    /// Delete an appointment. Its examinations cascade.
    pub fn delete_appointment(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM appointments WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    fn query_appointments(&self, sql: &str, clause: &WhereClause) -> DbResult<Vec<Appointment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(clause.params()), AppointmentRow::from_row)?;
        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

fn appointment_filter(query: &AppointmentQuery, now: NaiveDateTime) -> WhereClause {
    let mut clause = WhereClause::default();
    if let Some(patient_id) = &query.patient_id {
        clause.push("patient_id = ?", patient_id.clone());
    }
    if let Some(status) = query.status {
        clause.push("status = ?", status.as_str());
    }
    match query.window {
        Some(TimeWindow::Upcoming) => {
            clause.push("appointment_date >= ?", now);
            clause.push_raw("status != 'cancelled'");
        }
        Some(TimeWindow::Today) => {
            let (start, end) = day_bounds(now);
            clause.push("appointment_date >= ?", start);
            clause.push("appointment_date < ?", end);
        }
        None => {}
    }
    clause
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    patient_id: String,
    appointment_number: String,
    appointment_date: NaiveDateTime,
    appointment_type: String,
    notes: Option<String>,
    status: String,
    created_by: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl AppointmentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            appointment_number: row.get(2)?,
            appointment_date: row.get(3)?,
            appointment_type: row.get(4)?,
            notes: row.get(5)?,
            status: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            appointment_number: row.appointment_number,
            appointment_date: row.appointment_date,
            appointment_type: row.appointment_type,
            notes: row.notes,
            status: row
                .status
                .parse()
                .map_err(|e| DbError::Constraint(format!("{}", e)))?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
