use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{str_param, text_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_session_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };

    let entry = state.sessions.start(&email);
    match serde_json::to_value(&entry) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

fn handle_session_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Credentials are matched exactly; no trimming or normalization here.
    let Some(email) = text_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let Some(key) = text_param(&req.params, "sessionKey") else {
        return err(&req.id, "bad_params", "missing sessionKey", None);
    };

    let outcome = state.sessions.check(&email, &key);
    if !outcome.valid {
        // This is the transport's authentication-failure status; the raw
        // tri-state rides along in details.
        return err(
            &req.id,
            "invalid_session",
            "no active session for that email and key",
            Some(json!({ "valid": false, "position": -1 })),
        );
    }
    ok(
        &req.id,
        json!({ "valid": true, "position": outcome.position }),
    )
}

fn handle_session_end(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(email) = text_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let Some(key) = text_param(&req.params, "sessionKey") else {
        return err(&req.id, "bad_params", "missing sessionKey", None);
    };

    let removed = state.sessions.remove(&email, &key);
    ok(&req.id, json!({ "removed": removed }))
}

fn handle_session_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match serde_json::to_value(state.sessions.list()) {
        Ok(v) => ok(&req.id, json!({ "sessions": v })),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

fn handle_session_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.sessions.clear();
    ok(&req.id, json!({ "cleared": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.start" => Some(handle_session_start(state, req)),
        "session.check" => Some(handle_session_check(state, req)),
        "session.end" => Some(handle_session_end(state, req)),
        "session.list" => Some(handle_session_list(state, req)),
        "session.clear" => Some(handle_session_clear(state, req)),
        _ => None,
    }
}
