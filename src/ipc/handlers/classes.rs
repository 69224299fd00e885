use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{build_update, f64_param, i64_param, str_param, text_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

const SELECT: &str = "SELECT id, name, description, year, term, teacher_id, min_grade, max_grade,
        max_students, period, fee, mandatory, enrolled_number, min_korean_level,
        max_korean_level, display_order
 FROM classes";

const PATCH_COLUMNS: &[(&str, &str)] = &[
    ("name", "name"),
    ("description", "description"),
    ("year", "year"),
    ("term", "term"),
    ("teacherId", "teacher_id"),
    ("minGrade", "min_grade"),
    ("maxGrade", "max_grade"),
    ("maxStudents", "max_students"),
    ("period", "period"),
    ("fee", "fee"),
    ("mandatory", "mandatory"),
    ("enrolledNumber", "enrolled_number"),
    ("minKoreanLevel", "min_korean_level"),
    ("maxKoreanLevel", "max_korean_level"),
    ("displayOrder", "display_order"),
];

fn row_json(row: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": row.get::<_, i64>(0)?,
        "name": row.get::<_, String>(1)?,
        "description": row.get::<_, Option<String>>(2)?,
        "year": row.get::<_, Option<i64>>(3)?,
        "term": row.get::<_, Option<String>>(4)?,
        "teacherId": row.get::<_, Option<i64>>(5)?,
        "minGrade": row.get::<_, Option<i64>>(6)?,
        "maxGrade": row.get::<_, Option<i64>>(7)?,
        "maxStudents": row.get::<_, Option<i64>>(8)?,
        "period": row.get::<_, Option<i64>>(9)?,
        "fee": row.get::<_, Option<f64>>(10)?,
        "mandatory": row.get::<_, i64>(11)?,
        "enrolledNumber": row.get::<_, i64>(12)?,
        "minKoreanLevel": row.get::<_, i64>(13)?,
        "maxKoreanLevel": row.get::<_, i64>(14)?,
        "displayOrder": row.get::<_, i64>(15)?,
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
        "INSERT INTO classes(name, description, year, term, teacher_id, min_grade, max_grade,
            max_students, period, fee, mandatory, enrolled_number, min_korean_level,
            max_korean_level, display_order)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            name,
            text_param(&req.params, "description"),
            i64_param(&req.params, "year"),
            text_param(&req.params, "term"),
            i64_param(&req.params, "teacherId"),
            i64_param(&req.params, "minGrade"),
            i64_param(&req.params, "maxGrade"),
            i64_param(&req.params, "maxStudents"),
            i64_param(&req.params, "period"),
            f64_param(&req.params, "fee"),
            i64_param(&req.params, "mandatory").unwrap_or(0),
            i64_param(&req.params, "enrolledNumber").unwrap_or(0),
            i64_param(&req.params, "minKoreanLevel").unwrap_or(1),
            i64_param(&req.params, "maxKoreanLevel").unwrap_or(12),
            i64_param(&req.params, "displayOrder").unwrap_or(0),
        ],
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    let id = conn.last_insert_rowid();
    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "class not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };

    match fetch(conn, id) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(&req.id, "not_found", "class not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };

    let patch = req
        .params
        .get("patch")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let (sql, values) = match build_update("classes", PATCH_COLUMNS, None, id, &patch) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    match conn.execute(&sql, rusqlite::params_from_iter(values)) {
        Ok(0) => err(&req.id, "not_found", "class not found", None),
        Ok(_) => match fetch(conn, id) {
            Ok(Some(v)) => ok(&req.id, v),
            Ok(None) => err(&req.id, "not_found", "class not found", None),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "classId") else {
        return err(&req.id, "bad_params", "missing classId", None);
    };

    match conn.execute("DELETE FROM classes WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "class not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    let mut clauses: Vec<&str> = Vec::new();
    let mut binds: Vec<SqlValue> = Vec::new();
    if let Some(name) = str_param(&req.params, "name") {
        clauses.push("lower(name) LIKE ?");
        binds.push(SqlValue::Text(format!("%{}%", name.to_lowercase())));
    }
    if let Some(year) = i64_param(&req.params, "year") {
        clauses.push("year = ?");
        binds.push(SqlValue::Integer(year));
    }
    if let Some(term) = str_param(&req.params, "term") {
        clauses.push("lower(term) LIKE ?");
        binds.push(SqlValue::Text(format!("%{}%", term.to_lowercase())));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("{SELECT}{where_sql} ORDER BY display_order, name");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds), row_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.create" => Some(handle_create(state, req)),
        "classes.get" => Some(handle_get(state, req)),
        "classes.update" => Some(handle_update(state, req)),
        "classes.delete" => Some(handle_delete(state, req)),
        "classes.search" => Some(handle_search(state, req)),
        _ => None,
    }
}
