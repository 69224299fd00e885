use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{build_update, i64_param, str_param, text_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const SELECT: &str = "SELECT id, year, term, opening_time, closing_time FROM schedules";

const PATCH_COLUMNS: &[(&str, &str)] = &[
    ("year", "year"),
    ("term", "term"),
    ("openingTime", "opening_time"),
    ("closingTime", "closing_time"),
];

fn row_json(row: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "year": row.get::<_, Option<i64>>(1)?,
        "term": row.get::<_, Option<String>>(2)?,
        "openingTime": row.get::<_, Option<String>>(3)?,
        "closingTime": row.get::<_, Option<String>>(4)?,
    }))
}

fn fetch(conn: &Connection, id: i64) -> rusqlite::Result<Option<serde_json::Value>> {
    conn.query_row(&format!("{SELECT} WHERE id = ?"), [id], row_json)
        .optional()
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(year) = i64_param(&req.params, "year") else {
        return err(&req.id, "bad_params", "missing year", None);
    };
    let Some(term) = str_param(&req.params, "term") else {
        return err(&req.id, "bad_params", "missing term", None);
    };

    let res = conn.execute(
        "INSERT INTO schedules(year, term, opening_time, closing_time) VALUES(?, ?, ?, ?)",
        rusqlite::params![
            year,
            term,
            text_param(&req.params, "openingTime"),
            text_param(&req.params, "closingTime"),
        ],
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "schedules" })),
        );
    }

    let id = conn.last_insert_rowid();
    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "schedule not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "scheduleId") else {
        return err(&req.id, "bad_params", "missing scheduleId", None);
    };

    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "schedule not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "scheduleId") else {
        return err(&req.id, "bad_params", "missing scheduleId", None);
    };

    let patch = req
        .params
        .get("patch")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let (sql, values) = match build_update("schedules", PATCH_COLUMNS, None, id, &patch) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    match conn.execute(&sql, rusqlite::params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "schedule not found", None),
        Ok(_) => match fetch(conn, id) {
            Ok(Some(v)) => ok(&req.id, v),
            Ok(None) => err(&req.id, "not_found", "schedule not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "scheduleId") else {
        return err(&req.id, "bad_params", "missing scheduleId", None);
    };

    match conn.execute("DELETE FROM schedules WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "schedule not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "schedules": [] }));
    };

    let mut stmt = match conn.prepare(&format!("{SELECT} ORDER BY year, term")) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], row_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(schedules) => ok(&req.id, json!({ "schedules": schedules })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedules.create" => Some(handle_create(state, req)),
        "schedules.get" => Some(handle_get(state, req)),
        "schedules.update" => Some(handle_update(state, req)),
        "schedules.delete" => Some(handle_delete(state, req)),
        "schedules.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
