use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{build_update, i64_param, str_param, text_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const SELECT: &str = "SELECT id, title, content, content_eng FROM consents";

const PATCH_COLUMNS: &[(&str, &str)] = &[
    ("title", "title"),
    ("content", "content"),
    ("contentEng", "content_eng"),
];

fn row_json(row: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "title": row.get::<_, String>(1)?,
        "content": row.get::<_, Option<String>>(2)?,
        "contentEng": row.get::<_, Option<String>>(3)?,
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
    let Some(title) = str_param(&req.params, "title") else {
        return err(&req.id, "bad_params", "missing title", None);
    };

    let res = conn.execute(
        "INSERT INTO consents(title, content, content_eng) VALUES(?, ?, ?)",
        rusqlite::params![
            title,
            text_param(&req.params, "content"),
            text_param(&req.params, "contentEng"),
        ],
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "consents" })),
        );
    }

    let id = conn.last_insert_rowid();
    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "consent not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "consentId") else {
        return err(&req.id, "bad_params", "missing consentId", None);
    };

    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "consent not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "consentId") else {
        return err(&req.id, "bad_params", "missing consentId", None);
    };

    let patch = req
        .params
        .get("patch")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let (sql, values) = match build_update("consents", PATCH_COLUMNS, None, id, &patch) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    match conn.execute(&sql, rusqlite::params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "consent not found", None),
        Ok(_) => match fetch(conn, id) {
            Ok(Some(v)) => ok(&req.id, v),
            Ok(None) => err(&req.id, "not_found", "consent not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "consentId") else {
        return err(&req.id, "bad_params", "missing consentId", None);
    };

    match conn.execute("DELETE FROM consents WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "consent not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "consents": [] }));
    };

    let mut stmt = match conn.prepare(&format!("{SELECT} ORDER BY id")) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], row_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(consents) => ok(&req.id, json!({ "consents": consents })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "consents.create" => Some(handle_create(state, req)),
        "consents.get" => Some(handle_get(state, req)),
        "consents.update" => Some(handle_update(state, req)),
        "consents.delete" => Some(handle_delete(state, req)),
        "consents.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
