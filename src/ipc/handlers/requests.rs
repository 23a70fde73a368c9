use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::RequestStatus;
use crate::workflow;
use serde_json::json;

fn handle_requests_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match workflow::submit(conn, &student_id, &class_id) {
        Ok(request) => ok(&req.id, json!({ "request": request.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_requests_approve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let request_id = match get_required_str(&req.params, "requestId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let note = get_optional_str(&req.params, "note");
    match workflow::approve(conn, &request_id, note.as_deref()) {
        Ok(request) => ok(&req.id, json!({ "request": request.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_requests_reject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let request_id = match get_required_str(&req.params, "requestId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    let note = get_optional_str(&req.params, "note");
    match workflow::reject(conn, &request_id, note.as_deref()) {
        Ok(request) => ok(&req.id, json!({ "request": request.to_json() })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_requests_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "requests": [] }));
    };
    let status = match get_optional_str(&req.params, "status") {
        Some(raw) => match RequestStatus::parse(&raw) {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown status: {}", raw),
                    None,
                )
            }
        },
        None => None,
    };
    match workflow::list_by_status(conn, status) {
        Ok(requests) => ok(
            &req.id,
            json!({
                "requests": requests.iter().map(|r| r.to_json()).collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_requests_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.message, None),
    };
    match workflow::list_for_student(conn, &student_id) {
        Ok(requests) => ok(
            &req.id,
            json!({
                "requests": requests.iter().map(|r| r.to_json()).collect::<Vec<_>>()
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "requests.submit" => Some(handle_requests_submit(state, req)),
        "requests.approve" => Some(handle_requests_approve(state, req)),
        "requests.reject" => Some(handle_requests_reject(state, req)),
        "requests.list" => Some(handle_requests_list(state, req)),
        "requests.listForStudent" => Some(handle_requests_list_for_student(state, req)),
        _ => None,
    }
}
