use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::json;

use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub birth_date: Option<String>,
    pub nic: Option<String>,
    pub contact: Option<String>,
    pub photo_ref: Option<String>,
    pub active: bool,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "firstName": self.first_name,
            "lastName": self.last_name,
            "displayName": self.display_name(),
            "address": self.address,
            "birthDate": self.birth_date,
            "nic": self.nic,
            "contact": self.contact,
            "photoRef": self.photo_ref,
            "active": self.active,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Class {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// None means unlimited.
    pub max_students: Option<i64>,
    pub enrolled_count: i64,
}

impl Class {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "description": self.description,
            "schedule": self.schedule,
            "startDate": self.start_date,
            "endDate": self.end_date,
            "maxStudents": self.max_students,
            "enrolledCount": self.enrolled_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Case-insensitive; the pages this replaces mixed 'pending' and 'PENDING'.
    pub fn parse(s: &str) -> Option<RequestStatus> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    pub submitted_at: String,
    pub status: RequestStatus,
    pub resolved_at: Option<String>,
    pub note: Option<String>,
}

impl JoinRequest {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "studentId": self.student_id,
            "classId": self.class_id,
            "submittedAt": self.submitted_at,
            "status": self.status.as_str(),
            "resolvedAt": self.resolved_at,
            "note": self.note,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub class_id: String,
    pub student_id: String,
    pub date: String,
    pub present: bool,
    pub note: Option<String>,
}

impl AttendanceRecord {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "classId": self.class_id,
            "studentId": self.student_id,
            "date": self.date,
            "present": self.present,
            "note": self.note,
        })
    }
}

fn student_from_row(row: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        address: row.get(3)?,
        birth_date: row.get(4)?,
        nic: row.get(5)?,
        contact: row.get(6)?,
        photo_ref: row.get(7)?,
        active: row.get::<_, i64>(8)? != 0,
    })
}

const STUDENT_COLS: &str =
    "id, first_name, last_name, address, birth_date, nic, contact, photo_ref, active";

pub fn get_student(conn: &Connection, student_id: &str) -> DomainResult<Student> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLS} FROM students WHERE id = ?"),
        [student_id],
        student_from_row,
    )
    .optional()?
    .ok_or_else(|| DomainError::StudentNotFound(student_id.to_string()))
}

/// Like `get_student` but refuses soft-deleted students; used by every
/// mutation path so history stays readable while inactive students can no
/// longer enroll, apply, or be marked.
pub fn get_active_student(conn: &Connection, student_id: &str) -> DomainResult<Student> {
    let student = get_student(conn, student_id)?;
    if !student.active {
        return Err(DomainError::StudentNotFound(student_id.to_string()));
    }
    Ok(student)
}

pub fn list_students(conn: &Connection, include_inactive: bool) -> DomainResult<Vec<Student>> {
    let sql = if include_inactive {
        format!("SELECT {STUDENT_COLS} FROM students ORDER BY last_name, first_name")
    } else {
        format!(
            "SELECT {STUDENT_COLS} FROM students WHERE active = 1 ORDER BY last_name, first_name"
        )
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn class_from_row(row: &Row) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        schedule: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        max_students: row.get(6)?,
        enrolled_count: row.get(7)?,
    })
}

pub(crate) const CLASS_COLS: &str =
    "id, name, description, schedule, start_date, end_date, max_students, enrolled_count";

pub fn get_class(conn: &Connection, class_id: &str) -> DomainResult<Class> {
    conn.query_row(
        &format!("SELECT {CLASS_COLS} FROM classes WHERE id = ?"),
        [class_id],
        class_from_row,
    )
    .optional()?
    .ok_or_else(|| DomainError::ClassNotFound(class_id.to_string()))
}

pub fn list_classes(conn: &Connection) -> DomainResult<Vec<Class>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {CLASS_COLS} FROM classes ORDER BY name, id"))?;
    let rows = stmt
        .query_map([], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn classes_from_query(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> DomainResult<Vec<Class>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn request_from_row(row: &Row) -> rusqlite::Result<(JoinRequest, Option<String>)> {
    let raw_status: String = row.get(4)?;
    let parsed = RequestStatus::parse(&raw_status);
    let req = JoinRequest {
        id: row.get(0)?,
        student_id: row.get(1)?,
        class_id: row.get(2)?,
        submitted_at: row.get(3)?,
        status: parsed.unwrap_or(RequestStatus::Pending),
        resolved_at: row.get(5)?,
        note: row.get(6)?,
    };
    let bad = if parsed.is_none() { Some(raw_status) } else { None };
    Ok((req, bad))
}

fn checked(pair: (JoinRequest, Option<String>)) -> DomainResult<JoinRequest> {
    let (req, bad) = pair;
    // A status outside the closed set means someone wrote around the
    // workflow; surface it as a bug rather than guessing a state.
    if let Some(raw) = bad {
        return Err(DomainError::Consistency(format!(
            "request {} has unknown status '{}'",
            req.id, raw
        )));
    }
    Ok(req)
}

pub(crate) const REQUEST_COLS: &str =
    "id, student_id, class_id, submitted_at, status, resolved_at, note";

pub fn get_request(conn: &Connection, request_id: &str) -> DomainResult<JoinRequest> {
    let pair = conn
        .query_row(
            &format!("SELECT {REQUEST_COLS} FROM requests WHERE id = ?"),
            [request_id],
            request_from_row,
        )
        .optional()?
        .ok_or_else(|| DomainError::RequestNotFound(request_id.to_string()))?;
    checked(pair)
}

pub(crate) fn requests_from_query(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> DomainResult<Vec<JoinRequest>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, request_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(checked).collect()
}

pub(crate) fn record_from_row(row: &Row) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        class_id: row.get(0)?,
        student_id: row.get(1)?,
        date: row.get(2)?,
        present: row.get::<_, i64>(3)? != 0,
        note: row.get(4)?,
    })
}

pub(crate) const RECORD_COLS: &str = "class_id, student_id, date, present, note";
