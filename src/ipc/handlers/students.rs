use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{build_update, i64_param, now_rfc3339, str_param, text_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const SELECT: &str = "SELECT id, name, birth_date, email, phone, parent_name, address, gender,
        religion, church, korean_level, korean_level_confirmed, grade, created_at, updated_at
 FROM students";

const PATCH_COLUMNS: &[(&str, &str)] = &[
    ("name", "name"),
    ("birthDate", "birth_date"),
    ("email", "email"),
    ("phone", "phone"),
    ("parentName", "parent_name"),
    ("address", "address"),
    ("gender", "gender"),
    ("religion", "religion"),
    ("church", "church"),
    ("koreanLevel", "korean_level"),
    ("koreanLevelConfirmed", "korean_level_confirmed"),
    ("grade", "grade"),
];

fn row_json(row: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "name": row.get::<_, String>(1)?,
        "birthDate": row.get::<_, Option<String>>(2)?,
        "email": row.get::<_, Option<String>>(3)?,
        "phone": row.get::<_, Option<String>>(4)?,
        "parentName": row.get::<_, Option<String>>(5)?,
        "address": row.get::<_, Option<String>>(6)?,
        "gender": row.get::<_, Option<String>>(7)?,
        "religion": row.get::<_, Option<String>>(8)?,
        "church": row.get::<_, Option<String>>(9)?,
        "koreanLevel": row.get::<_, Option<i64>>(10)?,
        "koreanLevelConfirmed": row.get::<_, i64>(11)?,
        "grade": row.get::<_, Option<i64>>(12)?,
        "createdAt": row.get::<_, Option<String>>(13)?,
        "updatedAt": row.get::<_, Option<String>>(14)?,
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

    let now = now_rfc3339();
    let res = conn.execute(
        "INSERT INTO students(name, birth_date, email, phone, parent_name, address, gender,
            religion, church, korean_level, korean_level_confirmed, grade, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            name,
            text_param(&req.params, "birthDate"),
            text_param(&req.params, "email"),
            text_param(&req.params, "phone"),
            text_param(&req.params, "parentName"),
            text_param(&req.params, "address"),
            text_param(&req.params, "gender"),
            text_param(&req.params, "religion"),
            text_param(&req.params, "church"),
            i64_param(&req.params, "koreanLevel"),
            i64_param(&req.params, "koreanLevelConfirmed").unwrap_or(0),
            i64_param(&req.params, "grade"),
            now,
            now,
        ],
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    let id = conn.last_insert_rowid();
    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    let patch = req
        .params
        .get("patch")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let (sql, values) = match build_update("students", PATCH_COLUMNS, Some("updated_at"), id, &patch)
    {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    match conn.execute(&sql, rusqlite::params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "student not found", None),
        Ok(_) => match fetch(conn, id) {
            Ok(Some(v)) => ok(&req.id, v),
            Ok(None) => err(&req.id, "not_found", "student not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    match conn.execute("DELETE FROM students WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "student not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    let pattern = str_param(&req.params, "name").map(|n| format!("%{}%", n.to_lowercase()));
    let sql = match &pattern {
        Some(_) => format!("{SELECT} WHERE lower(name) LIKE ?1 OR lower(email) LIKE ?1 ORDER BY name"),
        None => format!("{SELECT} ORDER BY name"),
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
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_create(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        "students.search" => Some(handle_search(state, req)),
        _ => None,
    }
}
