use crate::attendance::{self, SheetEntry};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_date, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::views;
use serde_json::json;

fn parse_entries(params: &serde_json::Value) -> Result<Vec<SheetEntry>, String> {
    let Some(raw) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err("missing entries".to_string());
    };
    let mut entries = Vec::with_capacity(raw.len());
    for item in raw {
        let Some(student_id) = item.get("studentId").and_then(|v| v.as_str()) else {
            return Err("entry missing studentId".to_string());
        };
        let Some(present) = item.get("present").and_then(|v| v.as_bool()) else {
            return Err("entry missing present".to_string());
        };
        entries.push(SheetEntry {
            student_id: student_id.to_string(),
            present,
            note: get_optional_str(item, "note"),
        });
    }
    Ok(entries)
}

/// Save one class/date sheet: upsert-by-key, so re-saving replaces marks for
/// the students present in the payload and leaves everyone else's row alone.
fn handle_attendance_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let date = match get_required_date(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let entries = match parse_entries(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    match attendance::record_bulk(conn, &class_id, date, &entries) {
        Ok(()) => ok(&req.id, json!({ "ok": true, "saved": entries.len() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

/// The sheet the admin opens before saving: full roster for the class with
/// that date's saved marks, unmarked members shown absent.
fn handle_attendance_sheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let date = match get_required_date(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match views::class_roster_with_attendance(conn, &class_id, date) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "classId": class_id,
                "date": date.to_string(),
                "rows": rows
                    .iter()
                    .map(|row| {
                        json!({
                            "studentId": row.student.id,
                            "displayName": row.student.display_name(),
                            "present": row.present,
                            "note": row.note,
                            "marked": row.marked,
                        })
                    })
                    .collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_attendance_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match attendance::records_for_student(conn, &student_id) {
        Ok(records) => ok(
            &req.id,
            json!({
                "records": records.iter().map(|r| r.to_json()).collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_attendance_percentage(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };

    if let Some(class_id) = get_optional_str(&req.params, "classId") {
        return match attendance::percentage(conn, &student_id, &class_id) {
            Ok(pct) => ok(
                &req.id,
                json!({ "studentId": student_id, "classId": class_id, "percentage": pct }),
            ),
            Err(e) => domain_err(&req.id, &e),
        };
    }

    match attendance::percentages_by_class(conn, &student_id) {
        Ok(map) => ok(
            &req.id,
            json!({ "studentId": student_id, "byClass": map }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.record" => Some(handle_attendance_record(state, req)),
        "attendance.sheet" => Some(handle_attendance_sheet(state, req)),
        "attendance.history" => Some(handle_attendance_history(state, req)),
        "attendance.percentage" => Some(handle_attendance_percentage(state, req)),
        _ => None,
    }
}
