use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

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
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(true));
    value.get("result").expect("result")
}

#[test]
fn session_queue_lifecycle_over_ipc() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        result(&health).get("activeSessions").and_then(|v| v.as_u64()),
        Some(0)
    );

    let a = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.start",
        json!({ "email": "a@x.com" }),
    );
    let a = result(&a);
    assert_eq!(a.get("creationIndex").and_then(|v| v.as_u64()), Some(0));
    assert_eq!(a.get("position").and_then(|v| v.as_u64()), Some(1));
    let key_a = a
        .get("sessionKey")
        .and_then(|v| v.as_str())
        .expect("sessionKey")
        .to_string();
    assert_eq!(key_a.len(), 32);

    let b = request(
        &mut stdin,
        &mut reader,
        "3",
        "session.start",
        json!({ "email": "b@x.com" }),
    );
    let b = result(&b);
    assert_eq!(b.get("creationIndex").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(b.get("position").and_then(|v| v.as_u64()), Some(2));
    let key_b = b
        .get("sessionKey")
        .and_then(|v| v.as_str())
        .expect("sessionKey")
        .to_string();
    assert_ne!(key_a, key_b);

    let check_a = request(
        &mut stdin,
        &mut reader,
        "4",
        "session.check",
        json!({ "email": "a@x.com", "sessionKey": key_a }),
    );
    let check_a = result(&check_a);
    assert_eq!(check_a.get("valid").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(check_a.get("position").and_then(|v| v.as_i64()), Some(1));

    let end_a = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.end",
        json!({ "email": "a@x.com", "sessionKey": key_a }),
    );
    assert_eq!(
        result(&end_a).get("removed").and_then(|v| v.as_bool()),
        Some(true)
    );

    // b shifts down to the front once a leaves.
    let check_b = request(
        &mut stdin,
        &mut reader,
        "6",
        "session.check",
        json!({ "email": "b@x.com", "sessionKey": key_b }),
    );
    assert_eq!(
        result(&check_b).get("position").and_then(|v| v.as_i64()),
        Some(1)
    );

    // A removed session maps to the transport's auth-failure envelope.
    let stale = request(
        &mut stdin,
        &mut reader,
        "7",
        "session.check",
        json!({ "email": "a@x.com", "sessionKey": key_a }),
    );
    assert_eq!(stale.get("ok").and_then(|v| v.as_bool()), Some(false));
    let error = stale.get("error").expect("error");
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some("invalid_session")
    );
    let details = error.get("details").expect("details");
    assert_eq!(details.get("valid").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(details.get("position").and_then(|v| v.as_i64()), Some(-1));

    let end_again = request(
        &mut stdin,
        &mut reader,
        "8",
        "session.end",
        json!({ "email": "a@x.com", "sessionKey": key_a }),
    );
    assert_eq!(
        result(&end_again).get("removed").and_then(|v| v.as_bool()),
        Some(false)
    );

    let listed = request(&mut stdin, &mut reader, "9", "session.list", json!({}));
    let sessions = result(&listed)
        .get("sessions")
        .and_then(|v| v.as_array())
        .expect("sessions array")
        .clone();
    assert_eq!(sessions.len(), 1);
    assert_eq!(
        sessions[0].get("email").and_then(|v| v.as_str()),
        Some("b@x.com")
    );
    assert_eq!(sessions[0].get("position").and_then(|v| v.as_u64()), Some(1));

    let status = request(&mut stdin, &mut reader, "10", "server.status", json!({}));
    let status = result(&status);
    assert_eq!(status.get("status").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(status.get("activeSessions").and_then(|v| v.as_u64()), Some(1));

    let cleared = request(&mut stdin, &mut reader, "11", "session.clear", json!({}));
    assert_eq!(
        result(&cleared).get("cleared").and_then(|v| v.as_bool()),
        Some(true)
    );

    // Queue emptied, so the creation counter starts over.
    let c = request(
        &mut stdin,
        &mut reader,
        "12",
        "session.start",
        json!({ "email": "c@x.com" }),
    );
    assert_eq!(
        result(&c).get("creationIndex").and_then(|v| v.as_u64()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn padded_credentials_are_an_auth_failure_not_a_match() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let started = request(
        &mut stdin,
        &mut reader,
        "1",
        "session.start",
        json!({ "email": "a@x.com" }),
    );
    let key = result(&started)
        .get("sessionKey")
        .and_then(|v| v.as_str())
        .expect("sessionKey")
        .to_string();

    // Whitespace-padded and whitespace-only keys must reach the registry
    // verbatim and miss, not get trimmed into a match or a params error.
    for (id, bad_key) in [("2", format!(" {key} ")), ("3", "   ".to_string())] {
        let resp = request(
            &mut stdin,
            &mut reader,
            id,
            "session.check",
            json!({ "email": "a@x.com", "sessionKey": bad_key }),
        );
        assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(
            resp.get("error")
                .and_then(|e| e.get("code"))
                .and_then(|v| v.as_str()),
            Some("invalid_session")
        );
    }

    let padded_end = request(
        &mut stdin,
        &mut reader,
        "4",
        "session.end",
        json!({ "email": "a@x.com", "sessionKey": format!(" {key}") }),
    );
    assert_eq!(
        result(&padded_end).get("removed").and_then(|v| v.as_bool()),
        Some(false)
    );

    // The exact key still validates.
    let exact = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.check",
        json!({ "email": "a@x.com", "sessionKey": key }),
    );
    assert_eq!(
        result(&exact).get("valid").and_then(|v| v.as_bool()),
        Some(true)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_request_gets_a_parseable_error_reply() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // Not JSON, and contains a quote that must be escaped in the reply.
    writeln!(stdin, "not json \"quoted\"").expect("write garbage");
    stdin.flush().expect("flush");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read reply");
    let reply: serde_json::Value =
        serde_json::from_str(line.trim()).expect("error reply must be valid json");
    assert_eq!(reply.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        reply
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_json")
    );

    drop(stdin);
    let _ = child.wait();
}
