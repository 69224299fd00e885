use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{build_update, i64_param, now_rfc3339, str_param, text_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const SELECT: &str = "SELECT id, email, phone, name, students, message, status, memo, request_time
 FROM requests";

const PATCH_COLUMNS: &[(&str, &str)] = &[
    ("email", "email"),
    ("phone", "phone"),
    ("name", "name"),
    ("students", "students"),
    ("message", "message"),
    ("status", "status"),
    ("memo", "memo"),
];

fn row_json(row: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "email": row.get::<_, Option<String>>(1)?,
        "phone": row.get::<_, Option<String>>(2)?,
        "name": row.get::<_, Option<String>>(3)?,
        "students": row.get::<_, Option<String>>(4)?,
        "message": row.get::<_, Option<String>>(5)?,
        "status": row.get::<_, Option<String>>(6)?,
        "memo": row.get::<_, Option<String>>(7)?,
        "requestTime": row.get::<_, Option<String>>(8)?,
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
    let Some(name) = str_param(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };

    let res = conn.execute(
        "INSERT INTO requests(email, phone, name, students, message, status, memo, request_time)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            text_param(&req.params, "email"),
            text_param(&req.params, "phone"),
            name,
            text_param(&req.params, "students"),
            text_param(&req.params, "message"),
            text_param(&req.params, "status"),
            text_param(&req.params, "memo"),
            now_rfc3339(),
        ],
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "requests" })),
        );
    }

    let id = conn.last_insert_rowid();
    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "request not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "requestId") else {
        return err(&req.id, "bad_params", "missing requestId", None);
    };

    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "request not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "requestId") else {
        return err(&req.id, "bad_params", "missing requestId", None);
    };

    let patch = req
        .params
        .get("patch")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let (sql, values) =
        match build_update("requests", PATCH_COLUMNS, Some("request_time"), id, &patch) {
            Ok(v) => v,
            Err(m) => return err(&req.id, "bad_params", m, None),
        };

    match conn.execute(&sql, rusqlite::params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "request not found", None),
        Ok(_) => match fetch(conn, id) {
            Ok(Some(v)) => ok(&req.id, v),
            Ok(None) => err(&req.id, "not_found", "request not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "requestId") else {
        return err(&req.id, "bad_params", "missing requestId", None);
    };

    match conn.execute("DELETE FROM requests WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "request not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "requests": [] }));
    };

    let pattern = str_param(&req.params, "name").map(|n| format!("%{}%", n.to_lowercase()));
    let sql = match &pattern {
        Some(_) => format!(
            "{SELECT} WHERE lower(name) LIKE ?1 OR lower(students) LIKE ?1
                 OR lower(phone) LIKE ?1 OR lower(email) LIKE ?1
             ORDER BY request_time DESC, id DESC"
        ),
        None => format!("{SELECT} ORDER BY request_time DESC, id DESC"),
    };

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = match &pattern {
        Some(p) => stmt
            .query_map([p.as_str()], row_json)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([], row_json)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    };

    match rows {
        Ok(requests) => ok(&req.id, json!({ "requests": requests })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "requests.create" => Some(handle_create(state, req)),
        "requests.get" => Some(handle_get(state, req)),
        "requests.update" => Some(handle_update(state, req)),
        "requests.delete" => Some(handle_delete(state, req)),
        "requests.search" => Some(handle_search(state, req)),
        _ => None,
    }
}
