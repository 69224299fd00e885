use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Required string param: trimmed, rejects empty.
pub fn str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Free-text param kept verbatim (log messages, consent bodies).
pub fn text_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn i64_param(params: &Value, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.as_i64())
}

pub fn f64_param(params: &Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// JSON scalar to a bindable SQLite value. Arrays/objects are not column
/// material and map to None.
pub fn sql_value(v: &Value) -> Option<SqlValue> {
    match v {
        Value::Null => Some(SqlValue::Null),
        Value::Bool(b) => Some(SqlValue::Integer(*b as i64)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Builds an UPDATE statement from a field patch. `columns` maps wire keys
/// to column names; unknown keys are rejected so typos fail loudly. When
/// `touch` names a column it is set to the current timestamp.
pub fn build_update(
    table: &str,
    columns: &[(&str, &str)],
    touch: Option<&str>,
    id: i64,
    patch: &Value,
) -> Result<(String, Vec<SqlValue>), String> {
    let Some(obj) = patch.as_object() else {
        return Err("patch must be an object".to_string());
    };
    if obj.is_empty() {
        return Err("patch must not be empty".to_string());
    }

    let mut sets = Vec::new();
    let mut values = Vec::new();
    for (key, value) in obj {
        let Some((_, column)) = columns.iter().find(|(k, _)| *k == key.as_str()) else {
            return Err(format!("unknown field: {key}"));
        };
        let Some(v) = sql_value(value) else {
            return Err(format!("unsupported value for field: {key}"));
        };
        sets.push(format!("{column} = ?"));
        values.push(v);
    }
    if let Some(column) = touch {
        sets.push(format!("{column} = ?"));
        values.push(SqlValue::Text(now_rfc3339()));
    }
    values.push(SqlValue::Integer(id));

    Ok((
        format!("UPDATE {table} SET {} WHERE id = ?", sets.join(", ")),
        values,
    ))
}
