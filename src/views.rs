//! Read-only compositions for the admin and student consoles. No state of
//! its own; everything here is derived from the other modules on demand.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::attendance;
use crate::error::DomainResult;
use crate::ledger;
use crate::store::{self, Class, Student};

#[derive(Debug, Clone)]
pub struct ClassWithAttendance {
    pub class: Class,
    pub attendance_pct: f64,
}

pub fn enrolled_classes_with_attendance(
    conn: &Connection,
    student_id: &str,
) -> DomainResult<Vec<ClassWithAttendance>> {
    let classes = ledger::enrolled_classes_for(conn, student_id)?;
    let percentages = attendance::percentages_by_class(conn, student_id)?;
    Ok(classes
        .into_iter()
        .map(|class| {
            let attendance_pct = percentages.get(&class.id).copied().unwrap_or(0.0);
            ClassWithAttendance {
                class,
                attendance_pct,
            }
        })
        .collect())
}

pub fn available_classes_for_student(
    conn: &Connection,
    student_id: &str,
) -> DomainResult<Vec<Class>> {
    ledger::available_classes_for(conn, student_id)
}

#[derive(Debug, Clone)]
pub struct RosterRow {
    pub student: Student,
    pub present: bool,
    pub note: Option<String>,
    /// False for members with no saved record on that date; the default
    /// `present = false` is display-only and never persisted here.
    pub marked: bool,
}

pub fn class_roster_with_attendance(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
) -> DomainResult<Vec<RosterRow>> {
    let records = attendance::records_for_class_date(conn, class_id, date)?;

    let mut stmt = conn.prepare(
        "SELECT s.id FROM students s
         JOIN enrollments e ON e.student_id = s.id
         WHERE e.class_id = ?
         ORDER BY s.last_name, s.first_name, s.id",
    )?;
    let member_ids = stmt
        .query_map([class_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(member_ids.len());
    for id in member_ids {
        let student = store::get_student(conn, &id)?;
        let record = records.iter().find(|rec| rec.student_id == id);
        rows.push(RosterRow {
            student,
            present: record.map(|rec| rec.present).unwrap_or(false),
            note: record.and_then(|rec| rec.note.clone()),
            marked: record.is_some(),
        });
    }
    Ok(rows)
}
