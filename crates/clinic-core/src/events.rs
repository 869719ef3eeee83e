//! Domain events raised by record writes.

use serde::Serialize;

use crate::models::Examination;

/// Something that happened to a record and that other components react to.
///
/// Events are applied inside the transaction of the write that raised them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClinicEvent {
    /// An examination was saved with status `completed`.
    ExaminationCompleted {
        examination_id: String,
        appointment_id: String,
    },
}

impl ClinicEvent {
    /// Events raised by saving `examination`.
    pub fn from_saved_examination(examination: &Examination) -> Vec<ClinicEvent> {
        if examination.is_completed() {
            vec![ClinicEvent::ExaminationCompleted {
                examination_id: examination.id.clone(),
                appointment_id: examination.appointment_id.clone(),
            }]
        } else {
            Vec::new()
        }
    }
}
