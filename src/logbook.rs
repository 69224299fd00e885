//! Durable per-user action log with a hard row ceiling.
//!
//! Appends evict the single oldest row once the table holds `LOG_CAP`
//! entries, so storage stays bounded without a circular buffer. Persistence
//! errors propagate to the caller unchanged.

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;

pub const LOG_CAP: i64 = 10_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: i64,
    pub email: String,
    pub log: String,
    pub action_time: String,
}

pub fn append(conn: &Connection, email: &str, message: &str) -> Result<LogRecord> {
    let tx = conn.unchecked_transaction()?;

    let count: i64 = tx.query_row("SELECT COUNT(*) FROM logs", [], |r| r.get(0))?;
    if count >= LOG_CAP {
        // id breaks ties between rows written in the same instant.
        tx.execute(
            "DELETE FROM logs
             WHERE id = (SELECT id FROM logs ORDER BY action_time ASC, id ASC LIMIT 1)",
            [],
        )?;
        tracing::info!("oldest log removed to maintain table size limit");
    }

    let action_time = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    tx.execute(
        "INSERT INTO logs(email, log, action_time) VALUES(?, ?, ?)",
        (email, message, &action_time),
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    tracing::info!(email, "log added");
    Ok(LogRecord {
        id,
        email: email.to_string(),
        log: message.to_string(),
        action_time,
    })
}

pub fn for_email(conn: &Connection, email: &str) -> Result<Vec<LogRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, log, action_time FROM logs
         WHERE email = ?
         ORDER BY action_time DESC, id DESC",
    )?;
    let rows = stmt
        .query_map([email], |row| {
            Ok(LogRecord {
                id: row.get(0)?,
                email: row.get(1)?,
                log: row.get(2)?,
                action_time: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::init_schema(&conn).expect("init schema");
        conn
    }

    #[test]
    fn append_and_query_newest_first() {
        let conn = test_conn();
        append(&conn, "a@x.com", "logged in").expect("append");
        append(&conn, "a@x.com", "enrolled").expect("append");
        append(&conn, "b@x.com", "logged in").expect("append");

        let logs = for_email(&conn, "a@x.com").expect("query");
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].log, "enrolled");
        assert_eq!(logs[1].log, "logged in");
        assert!(logs.iter().all(|l| l.email == "a@x.com"));
    }

    #[test]
    fn cap_evicts_single_oldest_entry() {
        let conn = test_conn();
        for i in 0..LOG_CAP {
            append(&conn, "bulk@x.com", &format!("action {i}")).expect("append");
        }
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM logs", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, LOG_CAP);

        append(&conn, "bulk@x.com", "one over").expect("append");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM logs", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, LOG_CAP);

        // The very first row is the one that went.
        let oldest: String = conn
            .query_row(
                "SELECT log FROM logs ORDER BY action_time ASC, id ASC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .expect("oldest");
        assert_eq!(oldest, "action 1");
    }
}
