use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{build_update, i64_param, now_rfc3339, str_param, text_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const SELECT: &str = "SELECT id, student_id, class_id, comment, status, year, term,
        created_at, updated_at
 FROM enrollments";

const PATCH_COLUMNS: &[(&str, &str)] = &[
    ("comment", "comment"),
    ("status", "status"),
    ("year", "year"),
    ("term", "term"),
    ("classId", "class_id"),
];

fn row_json(row: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "studentId": row.get::<_, i64>(1)?,
        "classId": row.get::<_, i64>(2)?,
        "comment": row.get::<_, Option<String>>(3)?,
        "status": row.get::<_, Option<String>>(4)?,
        "year": row.get::<_, Option<i64>>(5)?,
        "term": row.get::<_, Option<String>>(6)?,
        "createdAt": row.get::<_, Option<String>>(7)?,
        "updatedAt": row.get::<_, Option<String>>(8)?,
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
    let Some(student_id) = i64_param(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let Some(class_id) = i64_param(&req.params, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };

    let now = now_rfc3339();
    let res = conn.execute(
        "INSERT INTO enrollments(student_id, class_id, comment, status, year, term,
            created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            student_id,
            class_id,
            text_param(&req.params, "comment"),
            text_param(&req.params, "status"),
            i64_param(&req.params, "year"),
            text_param(&req.params, "term"),
            now,
            now,
        ],
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "enrollments" })),
        );
    }

    let id = conn.last_insert_rowid();
    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "enrollment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "enrollmentId") else {
        return err(&req.id, "bad_params", "missing enrollmentId", None);
    };

    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "enrollment not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "enrollmentId") else {
        return err(&req.id, "bad_params", "missing enrollmentId", None);
    };

    let patch = req
        .params
        .get("patch")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let (sql, values) =
        match build_update("enrollments", PATCH_COLUMNS, Some("updated_at"), id, &patch) {
            Ok(v) => v,
            Err(m) => return err(&req.id, "bad_params", m, None),
        };

    match conn.execute(&sql, rusqlite::params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "enrollment not found", None),
        Ok(_) => match fetch(conn, id) {
            Ok(Some(v)) => ok(&req.id, v),
            Ok(None) => err(&req.id, "not_found", "enrollment not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "enrollmentId") else {
        return err(&req.id, "bad_params", "missing enrollmentId", None);
    };

    match conn.execute("DELETE FROM enrollments WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "enrollment not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "enrollments": [] }));
    };

    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(year) = i64_param(&req.params, "year") {
        clauses.push("year = ?");
        binds.push(SqlValue::Integer(year));
    }
    if let Some(term) = str_param(&req.params, "term") {
        clauses.push("term = ?");
        binds.push(SqlValue::Text(term));
    }
    if let Some(student_id) = i64_param(&req.params, "studentId") {
        clauses.push("student_id = ?");
        binds.push(SqlValue::Integer(student_id));
    }
    if let Some(class_id) = i64_param(&req.params, "classId") {
        clauses.push("class_id = ?");
        binds.push(SqlValue::Integer(class_id));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("{SELECT}{where_sql} ORDER BY id");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds), row_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_create(state, req)),
        "enrollments.get" => Some(handle_get(state, req)),
        "enrollments.update" => Some(handle_update(state, req)),
        "enrollments.delete" => Some(handle_delete(state, req)),
        "enrollments.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
