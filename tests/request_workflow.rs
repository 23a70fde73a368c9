use chrono::Utc;
use rosterd::error::DomainError;
use rosterd::store::{self, RequestStatus};
use rosterd::{db, ledger, workflow};
use rusqlite::Connection;
use tempfile::TempDir;
use uuid::Uuid;

fn open_workspace() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = db::open_db(dir.path()).expect("open db");
    (dir, conn)
}

fn add_student(conn: &Connection, first: &str, last: &str) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, first_name, last_name, active, created_at)
         VALUES(?, ?, ?, 1, ?)",
        (&id, first, last, Utc::now().to_rfc3339()),
    )
    .expect("insert student");
    id
}

fn add_class(conn: &Connection, name: &str, max_students: Option<i64>) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, max_students, enrolled_count) VALUES(?, ?, ?, 0)",
        (&id, name, max_students),
    )
    .expect("insert class");
    id
}

fn request_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM requests", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn submit_creates_pending_and_blocks_duplicates() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Amara", "Silva");
    let class = add_class(&conn, "Rust 101", None);

    let request = workflow::submit(&conn, &student, &class).expect("submit");
    assert_eq!(request.status, RequestStatus::Pending);
    assert!(request.resolved_at.is_none());

    let dup = workflow::submit(&conn, &student, &class);
    assert!(matches!(dup, Err(DomainError::DuplicatePending { .. })));
    assert_eq!(request_count(&conn), 1);
}

#[test]
fn submit_while_enrolled_creates_nothing() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Nuwan", "Perera");
    let class = add_class(&conn, "Workshop", None);
    ledger::enroll(&conn, &student, &class).unwrap();

    let res = workflow::submit(&conn, &student, &class);
    assert!(matches!(res, Err(DomainError::AlreadyEnrolled { .. })));
    assert_eq!(request_count(&conn), 0);
}

#[test]
fn approve_enrolls_and_is_terminal() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Ishara", "Fernando");
    let class = add_class(&conn, "Evening Batch", Some(3));
    let request = workflow::submit(&conn, &student, &class).unwrap();

    let approved = workflow::approve(&conn, &request.id, Some("welcome")).expect("approve");
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.note.as_deref(), Some("welcome"));
    assert!(approved.resolved_at.is_some());
    assert!(ledger::is_enrolled(&conn, &student, &class).unwrap());
    ledger::verify_enrolled_count(&conn, &class).unwrap();

    // Terminal: no transition out, in either direction.
    assert!(matches!(
        workflow::approve(&conn, &request.id, None),
        Err(DomainError::InvalidTransition {
            status: RequestStatus::Approved,
            ..
        })
    ));
    assert!(matches!(
        workflow::reject(&conn, &request.id, None),
        Err(DomainError::InvalidTransition { .. })
    ));
}

#[test]
fn reject_never_touches_the_ledger() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Kasun", "Jaya");
    let class = add_class(&conn, "Morning Batch", Some(1));
    let request = workflow::submit(&conn, &student, &class).unwrap();

    let rejected = workflow::reject(&conn, &request.id, Some("batch closed")).expect("reject");
    assert_eq!(rejected.status, RequestStatus::Rejected);
    assert!(!ledger::is_enrolled(&conn, &student, &class).unwrap());
    ledger::verify_enrolled_count(&conn, &class).unwrap();

    assert!(matches!(
        workflow::approve(&conn, &request.id, None),
        Err(DomainError::InvalidTransition {
            status: RequestStatus::Rejected,
            ..
        })
    ));

    // A rejected request is not pending, so the student may apply again.
    workflow::submit(&conn, &student, &class).expect("resubmit after rejection");
}

#[test]
fn capacity_failure_leaves_request_pending() {
    let (_dir, conn) = open_workspace();
    let class = add_class(&conn, "One Seat", Some(1));
    let a = add_student(&conn, "Student", "A");
    let b = add_student(&conn, "Student", "B");
    let req_a = workflow::submit(&conn, &a, &class).unwrap();
    let req_b = workflow::submit(&conn, &b, &class).unwrap();

    workflow::approve(&conn, &req_a.id, None).expect("first approval takes the seat");

    let second = workflow::approve(&conn, &req_b.id, None);
    assert!(matches!(second, Err(DomainError::CapacityExceeded { .. })));

    // The losing request must roll back to exactly where it was.
    let still_pending = store::get_request(&conn, &req_b.id).unwrap();
    assert_eq!(still_pending.status, RequestStatus::Pending);
    assert!(still_pending.resolved_at.is_none());
    assert!(!ledger::is_enrolled(&conn, &b, &class).unwrap());
    ledger::verify_enrolled_count(&conn, &class).unwrap();

    // The admin can still resolve it by rejecting.
    workflow::reject(&conn, &req_b.id, Some("class is full")).expect("reject the loser");
}

#[test]
fn approve_of_unknown_request_is_not_found() {
    let (_dir, conn) = open_workspace();
    assert!(matches!(
        workflow::approve(&conn, "missing", None),
        Err(DomainError::RequestNotFound(_))
    ));
    assert!(matches!(
        workflow::reject(&conn, "missing", None),
        Err(DomainError::RequestNotFound(_))
    ));
}

#[test]
fn listing_orders_by_submission_desc_with_stable_ties() {
    let (_dir, conn) = open_workspace();
    let class = add_class(&conn, "Rust 101", None);
    let s1 = add_student(&conn, "S", "One");
    let s2 = add_student(&conn, "S", "Two");
    let s3 = add_student(&conn, "S", "Three");
    let s4 = add_student(&conn, "S", "Four");

    // Controlled timestamps: r2 and r3 tie, r4 is newest, r1 oldest.
    let rows = [
        ("r1", &s1, "2025-05-01T08:00:00+00:00"),
        ("r2", &s2, "2025-05-02T08:00:00+00:00"),
        ("r3", &s3, "2025-05-02T08:00:00+00:00"),
        ("r4", &s4, "2025-05-03T08:00:00+00:00"),
    ];
    for (id, student, at) in rows {
        conn.execute(
            "INSERT INTO requests(id, student_id, class_id, submitted_at, status)
             VALUES(?, ?, ?, ?, 'pending')",
            (id, student, &class, at),
        )
        .unwrap();
    }

    let listed = workflow::list_by_status(&conn, Some(RequestStatus::Pending)).unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r4", "r2", "r3", "r1"]);

    assert!(workflow::list_by_status(&conn, Some(RequestStatus::Approved))
        .unwrap()
        .is_empty());
    assert_eq!(workflow::list_by_status(&conn, None).unwrap().len(), 4);
}

#[test]
fn per_student_listing_is_newest_first_and_only_theirs() {
    let (_dir, conn) = open_workspace();
    let rust = add_class(&conn, "Rust 101", None);
    let sql = add_class(&conn, "SQL Basics", None);
    let mine = add_student(&conn, "Amara", "Silva");
    let other = add_student(&conn, "Nuwan", "Perera");

    let rows = [
        ("mine-old", &mine, &rust, "2025-05-01T08:00:00+00:00"),
        ("mine-new", &mine, &sql, "2025-05-02T08:00:00+00:00"),
        ("theirs", &other, &rust, "2025-05-03T08:00:00+00:00"),
    ];
    for (id, student, class, at) in rows {
        conn.execute(
            "INSERT INTO requests(id, student_id, class_id, submitted_at, status)
             VALUES(?, ?, ?, ?, 'pending')",
            (id, student, class, at),
        )
        .unwrap();
    }

    let listed = workflow::list_for_student(&conn, &mine).unwrap();
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["mine-new", "mine-old"]);

    assert!(matches!(
        workflow::list_for_student(&conn, "missing"),
        Err(DomainError::StudentNotFound(_))
    ));
}

#[test]
fn unknown_status_in_store_is_a_consistency_error() {
    let (_dir, conn) = open_workspace();
    let class = add_class(&conn, "Rust 101", None);
    let student = add_student(&conn, "S", "One");
    conn.execute(
        "INSERT INTO requests(id, student_id, class_id, submitted_at, status)
         VALUES('bad', ?, ?, ?, 'cancelled')",
        (&student, &class, Utc::now().to_rfc3339()),
    )
    .unwrap();

    assert!(matches!(
        store::get_request(&conn, "bad"),
        Err(DomainError::Consistency(_))
    ));
    assert!(matches!(
        workflow::list_by_status(&conn, None),
        Err(DomainError::Consistency(_))
    ));
}
