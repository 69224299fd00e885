use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{str_param, text_param};
use crate::ipc::types::{AppState, Request};
use crate::logbook;
use serde_json::json;

fn handle_log_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };
    let Some(message) = text_param(&req.params, "message") else {
        return err(&req.id, "bad_params", "missing message", None);
    };

    match logbook::append(conn, &email, &message) {
        Ok(record) => match serde_json::to_value(&record) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_log_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(email) = str_param(&req.params, "email") else {
        return err(&req.id, "bad_params", "missing email", None);
    };

    match logbook::for_email(conn, &email) {
        Ok(records) => match serde_json::to_value(&records) {
            Ok(v) => ok(&req.id, json!({ "logs": v })),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "log.add" => Some(handle_log_add(state, req)),
        "log.get" => Some(handle_log_get(state, req)),
        _ => None,
    }
}
