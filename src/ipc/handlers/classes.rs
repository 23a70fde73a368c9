use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::{store, views};
use rusqlite::{Transaction, TransactionBehavior};
use serde_json::json;
use uuid::Uuid;

/// Caller-supplied capacity. Absent, null, zero, and negative all mean
/// unlimited and are stored as NULL.
fn parse_max_students(params: &serde_json::Value) -> Result<Option<i64>, String> {
    match params.get("maxStudents") {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => Ok(Some(n)),
            Some(_) => Ok(None),
            None => Err("maxStudents must be an integer".to_string()),
        },
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match get_required_str(&req.params, "name") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        Ok(_) => return err(&req.id, "bad_params", "name must not be empty", None),
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let max_students = match parse_max_students(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let class_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name, description, schedule, start_date, end_date,
                             max_students, enrolled_count)
         VALUES(?, ?, ?, ?, ?, ?, ?, 0)",
        (
            &class_id,
            &name,
            get_optional_str(&req.params, "description"),
            get_optional_str(&req.params, "schedule"),
            get_optional_str(&req.params, "startDate"),
            get_optional_str(&req.params, "endDate"),
            max_students,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    match store::get_class(conn, &class_id) {
        Ok(class) => ok(&req.id, json!({ "class": class.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

/// Catalog fields only. `enrolledCount` is derived state owned by the ledger
/// and is never writable through this surface. Runs in an IMMEDIATE
/// transaction so the capacity floor cannot race a concurrent approval.
fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };

    let tx = match Transaction::new_unchecked(conn, TransactionBehavior::Immediate) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let existing = match store::get_class(&tx, &class_id) {
        Ok(c) => c,
        Err(e) => return domain_err(&req.id, &e),
    };

    let name = get_optional_str(&req.params, "name").unwrap_or(existing.name);
    let description = get_optional_str(&req.params, "description").or(existing.description);
    let schedule = get_optional_str(&req.params, "schedule").or(existing.schedule);
    let start_date = get_optional_str(&req.params, "startDate").or(existing.start_date);
    let end_date = get_optional_str(&req.params, "endDate").or(existing.end_date);
    let max_students = if req.params.get("maxStudents").is_some() {
        match parse_max_students(&req.params) {
            Ok(v) => v,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    } else {
        existing.max_students
    };

    // Capacity may never drop below the committed roster; that would persist
    // enrolled_count > max_students.
    if let Some(max) = max_students {
        if max < existing.enrolled_count {
            return err(
                &req.id,
                "class_full",
                format!(
                    "maxStudents {} is below the {} students already enrolled",
                    max, existing.enrolled_count
                ),
                None,
            );
        }
    }

    if let Err(e) = tx.execute(
        "UPDATE classes
         SET name = ?, description = ?, schedule = ?, start_date = ?, end_date = ?,
             max_students = ?
         WHERE id = ?",
        (
            &name,
            &description,
            &schedule,
            &start_date,
            &end_date,
            max_students,
            &class_id,
        ),
    ) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    let updated = match store::get_class(&tx, &class_id) {
        Ok(class) => class,
        Err(e) => return domain_err(&req.id, &e),
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "class": updated.to_json() }))
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match store::get_class(conn, &class_id) {
        Ok(class) => ok(&req.id, json!({ "class": class.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match store::list_classes(conn) {
        Ok(classes) => ok(
            &req.id,
            json!({
                "classes": classes.iter().map(|c| c.to_json()).collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_classes_available_for(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match views::available_classes_for_student(conn, &student_id) {
        Ok(classes) => ok(
            &req.id,
            json!({
                "classes": classes.iter().map(|c| c.to_json()).collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_classes_enrolled_for(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match views::enrolled_classes_with_attendance(conn, &student_id) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "classes": rows
                    .iter()
                    .map(|row| {
                        let mut v = row.class.to_json();
                        v["attendancePct"] = json!(row.attendance_pct);
                        v
                    })
                    .collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.availableFor" => Some(handle_classes_available_for(state, req)),
        "classes.enrolledFor" => Some(handle_classes_enrolled_for(state, req)),
        _ => None,
    }
}
