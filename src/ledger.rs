//! Sole writer of the membership relation and of `classes.enrolled_count`.
//! Every capacity check runs in the same IMMEDIATE transaction as the
//! increment it guards, so racing writers on separate connections serialize
//! and the loser sees the committed count.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};

use crate::error::{DomainError, DomainResult};
use crate::store::{self, Class};

pub fn enroll(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    enroll_in_tx(&tx, student_id, class_id)?;
    tx.commit()?;
    Ok(())
}

/// Capacity-checked membership insert, shared with the approval workflow so
/// the request transition and the enrollment commit or roll back together.
pub(crate) fn enroll_in_tx(tx: &Transaction, student_id: &str, class_id: &str) -> DomainResult<()> {
    store::get_active_student(tx, student_id)?;
    let class = store::get_class(tx, class_id)?;

    if membership_exists(tx, student_id, class_id)? {
        return Err(DomainError::AlreadyEnrolled {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
        });
    }

    if let Some(max) = class.max_students {
        if class.enrolled_count >= max {
            return Err(DomainError::CapacityExceeded {
                class_id: class_id.to_string(),
                capacity: max,
            });
        }
    }

    tx.execute(
        "INSERT INTO enrollments(class_id, student_id, enrolled_at) VALUES(?, ?, ?)",
        (class_id, student_id, Utc::now().to_rfc3339()),
    )?;
    tx.execute(
        "UPDATE classes SET enrolled_count = enrolled_count + 1 WHERE id = ?",
        [class_id],
    )?;
    Ok(())
}

pub fn unenroll(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    store::get_student(&tx, student_id)?;
    let class = store::get_class(&tx, class_id)?;

    if !membership_exists(&tx, student_id, class_id)? {
        return Err(DomainError::NotEnrolled {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
        });
    }

    // A member exists, so the count must be positive. Anything else means the
    // count and the relation diverged; stop rather than drive it negative.
    if class.enrolled_count <= 0 {
        let msg = format!(
            "class {} has enrolled_count {} but a membership row for student {}",
            class_id, class.enrolled_count, student_id
        );
        tracing::error!("{msg}");
        return Err(DomainError::Consistency(msg));
    }

    tx.execute(
        "DELETE FROM enrollments WHERE class_id = ? AND student_id = ?",
        (class_id, student_id),
    )?;
    tx.execute(
        "UPDATE classes SET enrolled_count = enrolled_count - 1 WHERE id = ?",
        [class_id],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn is_enrolled(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<bool> {
    membership_exists(conn, student_id, class_id)
}

/// Classes the student could still apply to: not a member, and no pending
/// request of theirs in flight.
pub fn available_classes_for(conn: &Connection, student_id: &str) -> DomainResult<Vec<Class>> {
    store::get_active_student(conn, student_id)?;
    store::classes_from_query(
        conn,
        "SELECT c.id, c.name, c.description, c.schedule, c.start_date, c.end_date,
                c.max_students, c.enrolled_count
         FROM classes c
         WHERE c.id NOT IN (SELECT class_id FROM enrollments WHERE student_id = ?1)
           AND c.id NOT IN (SELECT class_id FROM requests
                            WHERE student_id = ?1 AND status = 'pending')
         ORDER BY c.name, c.id",
        &[&student_id],
    )
}

pub fn enrolled_classes_for(conn: &Connection, student_id: &str) -> DomainResult<Vec<Class>> {
    store::get_student(conn, student_id)?;
    store::classes_from_query(
        conn,
        "SELECT c.id, c.name, c.description, c.schedule, c.start_date, c.end_date,
                c.max_students, c.enrolled_count
         FROM classes c
         JOIN enrollments e ON e.class_id = c.id
         WHERE e.student_id = ?
         ORDER BY c.name, c.id",
        &[&student_id],
    )
}

/// Recount check for the derived count. Returns `Consistency` on divergence;
/// exercised by the invariant tests after every mutating call.
pub fn verify_enrolled_count(conn: &Connection, class_id: &str) -> DomainResult<()> {
    let class = store::get_class(conn, class_id)?;
    let actual: i64 = conn.query_row(
        "SELECT COUNT(*) FROM enrollments WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )?;
    if class.enrolled_count != actual {
        let msg = format!(
            "class {} enrolled_count {} != {} membership rows",
            class_id, class.enrolled_count, actual
        );
        tracing::error!("{msg}");
        return Err(DomainError::Consistency(msg));
    }
    Ok(())
}

fn membership_exists(conn: &Connection, student_id: &str, class_id: &str) -> DomainResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE class_id = ? AND student_id = ?",
            (class_id, student_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}
