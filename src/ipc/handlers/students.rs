use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn handle_students_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let first_name = match get_required_str(&req.params, "firstName") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        Ok(_) => return err(&req.id, "bad_params", "firstName must not be empty", None),
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let last_name = match get_required_str(&req.params, "lastName") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        Ok(_) => return err(&req.id, "bad_params", "lastName must not be empty", None),
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };

    let student_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, first_name, last_name, address, birth_date, nic,
                              contact, photo_ref, active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        (
            &student_id,
            &first_name,
            &last_name,
            get_optional_str(&req.params, "address"),
            get_optional_str(&req.params, "birthDate"),
            get_optional_str(&req.params, "nic"),
            get_optional_str(&req.params, "contact"),
            get_optional_str(&req.params, "photoRef"),
            &now,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    match store::get_student(conn, &student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };

    let existing = match store::get_student(conn, &student_id) {
        Ok(s) => s,
        Err(e) => return domain_err(&req.id, &e),
    };

    let first_name = get_optional_str(&req.params, "firstName").unwrap_or(existing.first_name);
    let last_name = get_optional_str(&req.params, "lastName").unwrap_or(existing.last_name);
    let address = get_optional_str(&req.params, "address").or(existing.address);
    let birth_date = get_optional_str(&req.params, "birthDate").or(existing.birth_date);
    let nic = get_optional_str(&req.params, "nic").or(existing.nic);
    let contact = get_optional_str(&req.params, "contact").or(existing.contact);
    let photo_ref = get_optional_str(&req.params, "photoRef").or(existing.photo_ref);

    if let Err(e) = conn.execute(
        "UPDATE students
         SET first_name = ?, last_name = ?, address = ?, birth_date = ?, nic = ?,
             contact = ?, photo_ref = ?, updated_at = ?
         WHERE id = ?",
        (
            &first_name,
            &last_name,
            &address,
            &birth_date,
            &nic,
            &contact,
            &photo_ref,
            Utc::now().to_rfc3339(),
            &student_id,
        ),
    ) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    match store::get_student(conn, &student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match store::get_student(conn, &student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let include_inactive = req
        .params
        .get("includeInactive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    match store::list_students(conn, include_inactive) {
        Ok(students) => ok(
            &req.id,
            json!({
                "students": students.iter().map(|s| s.to_json()).collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

/// Soft delete: enrollment and attendance history keep referencing the row,
/// so registration is switched off instead of removed.
fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    if let Err(e) = store::get_student(conn, &student_id) {
        return domain_err(&req.id, &e);
    }
    if let Err(e) = conn.execute(
        "UPDATE students SET active = 0, updated_at = ? WHERE id = ?",
        (Utc::now().to_rfc3339(), &student_id),
    ) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.register" => Some(handle_students_register(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
