use chrono::Utc;
use rosterd::attendance::{self, SheetEntry};
use rosterd::error::DomainError;
use rosterd::{db, ledger, views, workflow};
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

fn add_class(conn: &Connection, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, enrolled_count) VALUES(?, ?, 0)",
        (&id, name),
    )
    .expect("insert class");
    id
}

fn mark(conn: &Connection, class: &str, day: &str, student: &str, present: bool) {
    attendance::record_bulk(
        conn,
        class,
        attendance::parse_date(day).unwrap(),
        &[SheetEntry {
            student_id: student.to_string(),
            present,
            note: None,
        }],
    )
    .expect("record attendance");
}

#[test]
fn enrolled_classes_carry_their_attendance_percentage() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Amara", "Silva");
    let maths = add_class(&conn, "Maths");
    let physics = add_class(&conn, "Physics");
    ledger::enroll(&conn, &student, &maths).unwrap();
    ledger::enroll(&conn, &student, &physics).unwrap();

    mark(&conn, &maths, "2025-05-05", &student, true);
    mark(&conn, &maths, "2025-05-06", &student, false);

    let rows = views::enrolled_classes_with_attendance(&conn, &student).unwrap();
    assert_eq!(rows.len(), 2);
    let maths_row = rows.iter().find(|r| r.class.id == maths).unwrap();
    let physics_row = rows.iter().find(|r| r.class.id == physics).unwrap();
    assert!((maths_row.attendance_pct - 50.0).abs() < f64::EPSILON);
    assert_eq!(physics_row.attendance_pct, 0.0, "no records is 0, not an error");
}

#[test]
fn rejection_reopens_a_class_for_application() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Nuwan", "Perera");
    let class = add_class(&conn, "Rust 101");

    let request = workflow::submit(&conn, &student, &class).unwrap();
    assert!(views::available_classes_for_student(&conn, &student)
        .unwrap()
        .is_empty());

    workflow::reject(&conn, &request.id, None).unwrap();
    let available = views::available_classes_for_student(&conn, &student).unwrap();
    assert_eq!(available.len(), 1, "rejected requests do not block re-application");

    let approved_request = workflow::submit(&conn, &student, &class).unwrap();
    workflow::approve(&conn, &approved_request.id, None).unwrap();
    assert!(views::available_classes_for_student(&conn, &student)
        .unwrap()
        .is_empty());
}

#[test]
fn roster_defaults_unmarked_members_to_absent_without_persisting() {
    let (_dir, conn) = open_workspace();
    let class = add_class(&conn, "Workshop");
    let anna = add_student(&conn, "Anna", "Abey");
    let ben = add_student(&conn, "Ben", "Costa");
    let cara = add_student(&conn, "Cara", "Zoysa");
    for s in [&anna, &ben, &cara] {
        ledger::enroll(&conn, s, &class).unwrap();
    }

    let day = attendance::parse_date("2025-05-08").unwrap();
    mark(&conn, &class, "2025-05-08", &anna, true);
    mark(&conn, &class, "2025-05-08", &ben, false);

    let roster = views::class_roster_with_attendance(&conn, &class, day).unwrap();
    assert_eq!(roster.len(), 3);
    let last_names: Vec<&str> = roster.iter().map(|r| r.student.last_name.as_str()).collect();
    assert_eq!(last_names, vec!["Abey", "Costa", "Zoysa"]);

    let cara_row = roster.iter().find(|r| r.student.id == cara).unwrap();
    assert!(!cara_row.present);
    assert!(!cara_row.marked);

    // The display default must not have written a record.
    assert_eq!(
        attendance::records_for_class_date(&conn, &class, day)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn soft_deleted_students_keep_history_but_lose_mutations() {
    let (_dir, conn) = open_workspace();
    let student = add_student(&conn, "Former", "Student");
    let class = add_class(&conn, "Rust 101");
    ledger::enroll(&conn, &student, &class).unwrap();
    mark(&conn, &class, "2025-05-05", &student, true);

    conn.execute("UPDATE students SET active = 0 WHERE id = ?", [&student])
        .unwrap();

    // History and rosters still resolve the row.
    let day = attendance::parse_date("2025-05-05").unwrap();
    let roster = views::class_roster_with_attendance(&conn, &class, day).unwrap();
    assert_eq!(roster.len(), 1);
    assert!((attendance::percentage(&conn, &student, &class).unwrap() - 100.0).abs()
        < f64::EPSILON);

    // But no new requests, enrollments, or marks.
    let other = add_class(&conn, "Physics");
    assert!(matches!(
        workflow::submit(&conn, &student, &other),
        Err(DomainError::StudentNotFound(_))
    ));
    assert!(matches!(
        ledger::enroll(&conn, &student, &other),
        Err(DomainError::StudentNotFound(_))
    ));
    assert!(matches!(
        attendance::record_bulk(
            &conn,
            &other,
            day,
            &[SheetEntry {
                student_id: student.clone(),
                present: true,
                note: None
            }]
        ),
        Err(DomainError::StudentNotFound(_))
    ));
}
