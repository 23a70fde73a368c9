//! Join-request state machine: pending -> approved | rejected, both terminal.
//! Sole writer of request rows; approval hands the actual enrollment to the
//! ledger inside the same transaction.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::ledger;
use crate::store::{self, JoinRequest, RequestStatus};

pub fn submit(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<JoinRequest> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    store::get_active_student(&tx, student_id)?;
    store::get_class(&tx, class_id)?;

    if ledger::is_enrolled(&tx, student_id, class_id)? {
        return Err(DomainError::AlreadyEnrolled {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
        });
    }
    if pending_exists(&tx, student_id, class_id)? {
        return Err(DomainError::DuplicatePending {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
        });
    }

    let request = JoinRequest {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        class_id: class_id.to_string(),
        submitted_at: Utc::now().to_rfc3339(),
        status: RequestStatus::Pending,
        resolved_at: None,
        note: None,
    };
    tx.execute(
        "INSERT INTO requests(id, student_id, class_id, submitted_at, status)
         VALUES(?, ?, ?, ?, ?)",
        (
            &request.id,
            &request.student_id,
            &request.class_id,
            &request.submitted_at,
            request.status.as_str(),
        ),
    )?;
    tx.commit()?;
    Ok(request)
}

/// Approve transitions the request and enrolls the student as one unit. Any
/// ledger refusal (full class, enrolled meanwhile) rolls the transition back,
/// leaving the request pending so the admin can retry or reject.
pub fn approve(
    conn: &Connection,
    request_id: &str,
    note: Option<&str>,
) -> DomainResult<JoinRequest> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let request = store::get_request(&tx, request_id)?;
    if request.status.is_terminal() {
        return Err(DomainError::InvalidTransition {
            request_id: request_id.to_string(),
            status: request.status,
        });
    }

    ledger::enroll_in_tx(&tx, &request.student_id, &request.class_id)?;

    let resolved_at = Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE requests SET status = ?, resolved_at = ?, note = ? WHERE id = ?",
        (
            RequestStatus::Approved.as_str(),
            &resolved_at,
            note,
            request_id,
        ),
    )?;
    tx.commit()?;

    Ok(JoinRequest {
        status: RequestStatus::Approved,
        resolved_at: Some(resolved_at),
        note: note.map(|s| s.to_string()),
        ..request
    })
}

pub fn reject(
    conn: &Connection,
    request_id: &str,
    note: Option<&str>,
) -> DomainResult<JoinRequest> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let request = store::get_request(&tx, request_id)?;
    if request.status.is_terminal() {
        return Err(DomainError::InvalidTransition {
            request_id: request_id.to_string(),
            status: request.status,
        });
    }

    let resolved_at = Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE requests SET status = ?, resolved_at = ?, note = ? WHERE id = ?",
        (
            RequestStatus::Rejected.as_str(),
            &resolved_at,
            note,
            request_id,
        ),
    )?;
    tx.commit()?;

    Ok(JoinRequest {
        status: RequestStatus::Rejected,
        resolved_at: Some(resolved_at),
        note: note.map(|s| s.to_string()),
        ..request
    })
}

/// Newest submissions first; equal timestamps keep insertion order.
pub fn list_by_status(
    conn: &Connection,
    status: Option<RequestStatus>,
) -> DomainResult<Vec<JoinRequest>> {
    match status {
        Some(s) => store::requests_from_query(
            conn,
            &format!(
                "SELECT {} FROM requests WHERE status = ?
                 ORDER BY submitted_at DESC, rowid",
                store::REQUEST_COLS
            ),
            &[&s.as_str()],
        ),
        None => store::requests_from_query(
            conn,
            &format!(
                "SELECT {} FROM requests ORDER BY submitted_at DESC, rowid",
                store::REQUEST_COLS
            ),
            &[],
        ),
    }
}

pub fn list_for_student(conn: &Connection, student_id: &str) -> DomainResult<Vec<JoinRequest>> {
    store::get_student(conn, student_id)?;
    store::requests_from_query(
        conn,
        &format!(
            "SELECT {} FROM requests WHERE student_id = ?
             ORDER BY submitted_at DESC, rowid",
            store::REQUEST_COLS
        ),
        &[&student_id],
    )
}

fn pending_exists(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM requests
             WHERE student_id = ? AND class_id = ? AND status = 'pending'",
            (student_id, class_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}
