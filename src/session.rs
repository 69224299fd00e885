//! In-memory session waiting queue.
//!
//! Sessions are admission tickets, not durable records: the whole queue is
//! lost on restart. An entry's `position` is its 1-based rank in creation
//! order and shifts down as earlier entries leave the queue; callers use it
//! as a coarse waiting-room signal.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use serde::Serialize;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Creation-order counter value at admission time. Resets to 0 whenever
    /// the queue transitions to empty, so it is not a stable identity.
    pub creation_index: u64,
    pub email: String,
    pub session_key: String,
    pub last_access: DateTime<Utc>,
    /// 1-based rank in the queue as of the last start/check/list.
    pub position: usize,
}

/// Tri-state result of a session check. A miss is expected and frequent;
/// the transport maps it to an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub valid: bool,
    pub position: i64,
}

impl CheckOutcome {
    const INVALID: CheckOutcome = CheckOutcome {
        valid: false,
        position: -1,
    };
}

struct Queue {
    entries: Vec<SessionEntry>,
    next_index: u64,
}

impl Queue {
    fn reset_index_if_empty(&mut self) {
        if self.entries.is_empty() {
            self.next_index = 0;
        }
    }
}

/// Lock-protected ordered collection of live sessions. One instance is
/// created at process start and shared by every request handler and the
/// background sweeper; every operation runs to completion under the lock.
pub struct SessionRegistry {
    queue: Mutex<Queue>,
    idle_timeout: TimeDelta,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            queue: Mutex::new(Queue {
                entries: Vec::new(),
                next_index: 0,
            }),
            idle_timeout: TimeDelta::from_std(idle_timeout).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Admits a new session for `email` at the back of the queue. Always
    /// succeeds; the same email may hold any number of entries.
    pub fn start(&self, email: &str) -> SessionEntry {
        let mut q = self.queue.lock();
        let entry = SessionEntry {
            creation_index: q.next_index,
            email: email.to_string(),
            session_key: fresh_session_key(),
            last_access: Utc::now(),
            position: q.entries.len() + 1,
        };
        q.entries.push(entry.clone());
        q.next_index += 1;
        tracing::info!(email, position = entry.position, "session added");
        entry
    }

    /// Validates an email/key pair. On a match the entry's `last_access` is
    /// refreshed and its current position reported; a miss mutates nothing.
    pub fn check(&self, email: &str, session_key: &str) -> CheckOutcome {
        let mut q = self.queue.lock();
        for (idx, entry) in q.entries.iter_mut().enumerate() {
            if entry.email == email && entry.session_key == session_key {
                entry.last_access = Utc::now();
                entry.position = idx + 1;
                tracing::info!(email, position = entry.position, "session valid");
                return CheckOutcome {
                    valid: true,
                    position: (idx + 1) as i64,
                };
            }
        }
        tracing::warn!(email, "invalid session");
        CheckOutcome::INVALID
    }

    /// Removes the first entry matching both fields exactly. Positions of
    /// the remaining entries are recomputed lazily at the next check/list.
    pub fn remove(&self, email: &str, session_key: &str) -> bool {
        let mut q = self.queue.lock();
        let found = q
            .entries
            .iter()
            .position(|e| e.email == email && e.session_key == session_key);
        match found {
            Some(idx) => {
                q.entries.remove(idx);
                q.reset_index_if_empty();
                tracing::info!(email, "session removed");
                true
            }
            None => {
                tracing::warn!(email, "session not found");
                false
            }
        }
    }

    /// Evicts every entry idle longer than the configured timeout.
    pub fn sweep(&self) {
        self.sweep_at(Utc::now());
    }

    fn sweep_at(&self, now: DateTime<Utc>) {
        let mut q = self.queue.lock();
        let before = q.entries.len();
        if before == 0 {
            return;
        }
        let idle_timeout = self.idle_timeout;
        q.entries
            .retain(|e| now.signed_duration_since(e.last_access) < idle_timeout);
        let evicted = before - q.entries.len();
        if evicted > 0 {
            tracing::info!(evicted, "disconnected sessions removed");
        }
        q.reset_index_if_empty();
    }

    /// Snapshot of the queue in creation order with positions refreshed.
    pub fn list(&self) -> Vec<SessionEntry> {
        let mut q = self.queue.lock();
        for (idx, entry) in q.entries.iter_mut().enumerate() {
            entry.position = idx + 1;
        }
        q.entries.clone()
    }

    /// Administrative reset: drops every session and restarts the counter.
    pub fn clear(&self) {
        let mut q = self.queue.lock();
        q.entries.clear();
        q.next_index = 0;
        tracing::info!("all sessions cleared");
    }

    pub fn len(&self) -> usize {
        self.queue.lock().entries.len()
    }

    #[cfg(test)]
    fn backdate(&self, session_key: &str, age: Duration) {
        let mut q = self.queue.lock();
        for entry in q.entries.iter_mut() {
            if entry.session_key == session_key {
                entry.last_access =
                    Utc::now() - TimeDelta::from_std(age).unwrap_or(TimeDelta::MAX);
            }
        }
    }
}

/// 16 random bytes, hex-encoded. Uniqueness comes from the key space; no
/// registry-wide dedup pass is needed.
fn fresh_session_key() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    let mut key = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(key, "{b:02x}");
    }
    key
}
