mod db;
mod ipc;
mod logbook;
mod session;
mod sweeper;

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

fn env_secs(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn main() {
    // stdout carries the protocol; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ENROLLD_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let idle_timeout = env_secs("ENROLLD_SESSION_TIMEOUT_SECS", session::DEFAULT_IDLE_TIMEOUT);
    let sweep_interval = env_secs("ENROLLD_SWEEP_INTERVAL_SECS", session::DEFAULT_SWEEP_INTERVAL);

    // The one registry instance for the process; handlers and the sweeper
    // share it by handle.
    let sessions = Arc::new(session::SessionRegistry::new(idle_timeout));
    let sweeper = match sweeper::Sweeper::start(Arc::clone(&sessions), sweep_interval) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!(error = %e, "failed to start session sweeper");
            None
        }
    };

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        sessions,
        started_at: Instant::now(),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    if let Some(sweeper) = sweeper {
        sweeper.stop();
    }
}
