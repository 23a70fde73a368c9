//! Sole writer of attendance rows. Records are keyed (class, student, date);
//! saving a sheet again replaces by key, it never duplicates.

use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::BTreeMap;

use crate::error::{DomainError, DomainResult};
use crate::store::{self, AttendanceRecord};

#[derive(Debug, Clone)]
pub struct SheetEntry {
    pub student_id: String,
    pub present: bool,
    pub note: Option<String>,
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Upserts one record per entry for (class, date). Entries are independent:
/// each upsert is a single atomic replace, and a bad entry does not undo the
/// ones already applied.
pub fn record_bulk(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
    entries: &[SheetEntry],
) -> DomainResult<()> {
    store::get_class(conn, class_id)?;
    let date = date.to_string();

    for entry in entries {
        store::get_active_student(conn, &entry.student_id)?;
        conn.execute(
            "INSERT INTO attendance_records(class_id, student_id, date, present, note)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(class_id, student_id, date) DO UPDATE SET
               present = excluded.present,
               note = excluded.note",
            (
                class_id,
                &entry.student_id,
                &date,
                entry.present as i64,
                &entry.note,
            ),
        )?;
    }
    Ok(())
}

pub fn records_for_class_date(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
) -> DomainResult<Vec<AttendanceRecord>> {
    store::get_class(conn, class_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attendance_records
         WHERE class_id = ? AND date = ?
         ORDER BY student_id",
        store::RECORD_COLS
    ))?;
    let rows = stmt
        .query_map((class_id, date.to_string()), store::record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Full history for one student across classes, newest first.
pub fn records_for_student(
    conn: &Connection,
    student_id: &str,
) -> DomainResult<Vec<AttendanceRecord>> {
    store::get_student(conn, student_id)?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attendance_records
         WHERE student_id = ?
         ORDER BY date DESC, class_id",
        store::RECORD_COLS
    ))?;
    let rows = stmt
        .query_map([student_id], store::record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `100 * present / total` over the pair's records; 0 when there are none.
pub fn percentage(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<f64> {
    store::get_student(conn, student_id)?;
    store::get_class(conn, class_id)?;
    let (present, total): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(present), 0), COUNT(*)
         FROM attendance_records
         WHERE student_id = ? AND class_id = ?",
        (student_id, class_id),
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    Ok(pct(present, total))
}

/// Rollup per class, over every class the student has records in. History
/// survives unenrollment, so this is keyed by the records, not the membership.
pub fn percentages_by_class(
    conn: &Connection,
    student_id: &str,
) -> DomainResult<BTreeMap<String, f64>> {
    store::get_student(conn, student_id)?;
    let mut stmt = conn.prepare(
        "SELECT class_id, COALESCE(SUM(present), 0), COUNT(*)
         FROM attendance_records
         WHERE student_id = ?
         GROUP BY class_id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = BTreeMap::new();
    for (class_id, present, total) in rows {
        if total < present {
            let msg = format!(
                "attendance rollup for student {student_id} class {class_id}: {present} present of {total} records"
            );
            tracing::error!("{msg}");
            return Err(DomainError::Consistency(msg));
        }
        out.insert(class_id, pct(present, total));
    }
    Ok(out)
}

fn pct(present: i64, total: i64) -> f64 {
    if total > 0 {
        100.0 * present as f64 / total as f64
    } else {
        0.0
    }
}
