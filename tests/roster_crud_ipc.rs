use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_enrolld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn enrolld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn result(value: &serde_json::Value) -> &serde_json::Value {
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok response, got {value}"
    );
    value.get("result").expect("result")
}

#[test]
fn roster_crud_round_trips() {
    let workspace = temp_dir("enrolld-roster-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Teachers.
    let teacher = request(
        &mut stdin,
        &mut reader,
        "2",
        "teachers.create",
        json!({ "name": "Kim Minji", "subject": "Korean 3", "email": "minji@school.org" }),
    );
    let teacher_id = result(&teacher).get("id").and_then(|v| v.as_i64()).expect("id");

    let found = request(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.search",
        json!({ "name": "minji" }),
    );
    assert_eq!(
        result(&found)
            .get("teachers")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // Students.
    let student = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({
            "name": "Lee Hana",
            "email": "hana@family.net",
            "parentName": "Lee Jisoo",
            "grade": 4,
            "koreanLevel": 3
        }),
    );
    let student = result(&student);
    let student_id = student.get("id").and_then(|v| v.as_i64()).expect("id");
    assert_eq!(
        student.get("koreanLevelConfirmed").and_then(|v| v.as_i64()),
        Some(0)
    );

    let updated = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.update",
        json!({ "studentId": student_id, "patch": { "grade": 5, "koreanLevelConfirmed": 1 } }),
    );
    let updated = result(&updated);
    assert_eq!(updated.get("grade").and_then(|v| v.as_i64()), Some(5));
    assert_eq!(
        updated.get("parentName").and_then(|v| v.as_str()),
        Some("Lee Jisoo"),
        "patch must not clobber untouched columns"
    );

    // Classes.
    let class = request(
        &mut stdin,
        &mut reader,
        "6",
        "classes.create",
        json!({
            "name": "Korean 3A",
            "year": 2026,
            "term": "fall",
            "teacherId": teacher_id,
            "maxStudents": 15,
            "fee": 120.0
        }),
    );
    let class_id = result(&class).get("id").and_then(|v| v.as_i64()).expect("id");

    let classes = request(
        &mut stdin,
        &mut reader,
        "7",
        "classes.search",
        json!({ "year": 2026, "term": "fall" }),
    );
    assert_eq!(
        result(&classes)
            .get("classes")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // Enrollments.
    let enrollment = request(
        &mut stdin,
        &mut reader,
        "8",
        "enrollments.create",
        json!({
            "studentId": student_id,
            "classId": class_id,
            "status": "draft",
            "year": 2026,
            "term": "fall"
        }),
    );
    let enrollment_id = result(&enrollment)
        .get("id")
        .and_then(|v| v.as_i64())
        .expect("id");

    let enrolled = request(
        &mut stdin,
        &mut reader,
        "9",
        "enrollments.update",
        json!({ "enrollmentId": enrollment_id, "patch": { "status": "enrolled" } }),
    );
    assert_eq!(
        result(&enrolled).get("status").and_then(|v| v.as_str()),
        Some("enrolled")
    );

    let listed = request(
        &mut stdin,
        &mut reader,
        "10",
        "enrollments.list",
        json!({ "year": 2026, "term": "fall" }),
    );
    assert_eq!(
        result(&listed)
            .get("enrollments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // Schedules, consents, requests.
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "schedules.create",
        json!({
            "year": 2026,
            "term": "fall",
            "openingTime": "2026-08-01T09:00:00Z",
            "closingTime": "2026-08-20T17:00:00Z"
        }),
    );
    let schedules = request(&mut stdin, &mut reader, "12", "schedules.list", json!({}));
    assert_eq!(
        result(&schedules)
            .get("schedules")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "consents.create",
        json!({ "title": "Photo release", "content": "내용", "contentEng": "Body" }),
    );
    let consents = request(&mut stdin, &mut reader, "14", "consents.list", json!({}));
    assert_eq!(
        result(&consents)
            .get("consents")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    let created_req = request(
        &mut stdin,
        &mut reader,
        "15",
        "requests.create",
        json!({
            "name": "Park Dana",
            "email": "dana@family.net",
            "students": "Park Juno",
            "message": "Please move Juno to level 2",
            "status": "new"
        }),
    );
    let request_id = result(&created_req)
        .get("id")
        .and_then(|v| v.as_i64())
        .expect("id");
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "requests.update",
        json!({ "requestId": request_id, "patch": { "status": "done", "memo": "moved" } }),
    );
    let matched = request(
        &mut stdin,
        &mut reader,
        "17",
        "requests.search",
        json!({ "name": "juno" }),
    );
    assert_eq!(
        result(&matched)
            .get("requests")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // Access log side-channel.
    let _ = request(
        &mut stdin,
        &mut reader,
        "18",
        "log.add",
        json!({ "email": "admin@school.org", "message": "enrolled Lee Hana" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "log.add",
        json!({ "email": "admin@school.org", "message": "closed enrollment" }),
    );
    let logs = request(
        &mut stdin,
        &mut reader,
        "20",
        "log.get",
        json!({ "email": "admin@school.org" }),
    );
    let logs = result(&logs)
        .get("logs")
        .and_then(|v| v.as_array())
        .expect("logs array")
        .clone();
    assert_eq!(logs.len(), 2);
    assert_eq!(
        logs[0].get("log").and_then(|v| v.as_str()),
        Some("closed enrollment"),
        "newest first"
    );

    // Deletes.
    let gone = request(
        &mut stdin,
        &mut reader,
        "21",
        "enrollments.delete",
        json!({ "enrollmentId": enrollment_id }),
    );
    assert_eq!(
        result(&gone).get("deleted").and_then(|v| v.as_bool()),
        Some(true)
    );
    let missing = request(
        &mut stdin,
        &mut reader,
        "22",
        "enrollments.get",
        json!({ "enrollmentId": enrollment_id }),
    );
    assert_eq!(
        missing
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_found")
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "23",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "teachers.delete",
        json!({ "teacherId": teacher_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "classes.delete",
        json!({ "classId": class_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
