//! Research Store
//!
//! Typed persistence operations for sessions, phases, reports, and error
//! logs. All SQL is parameterized. Terminal session transitions are guarded
//! so a session never leaves `completed` or `failed`.

use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::models::{
    Citation, PhaseRecord, ResearchMode, SessionDetail, SessionRecord, SessionStatus,
};
use crate::utils::error::{AppError, AppResult};

use super::database::Database;

/// Operations slower than this are logged at warn level.
const SLOW_QUERY_MS: u128 = 1000;

/// Persistence adapter over the pooled database.
#[derive(Debug, Clone)]
pub struct ResearchStore {
    db: Database,
}

impl ResearchStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn is_healthy(&self) -> bool {
        self.db.is_healthy()
    }

    /// Create a new session in status `running` and return its id.
    pub fn create_session(&self, query: &str, mode: ResearchMode) -> AppResult<String> {
        self.observe("insert sessions", || {
            let id = Uuid::new_v4().to_string();
            let conn = self.db.get_connection()?;
            conn.execute(
                "INSERT INTO sessions (id, query, mode, status, created_at)
                 VALUES (?1, ?2, ?3, 'running', ?4)",
                params![id, query, mode.as_str(), now_rfc3339()],
            )?;
            Ok(id)
        })
    }

    /// Append a phase telemetry row. Rows are insertion-ordered per session.
    pub fn append_phase(
        &self,
        session_id: &str,
        name: &str,
        duration_ms: u64,
        tokens_used: u64,
        metadata: serde_json::Value,
    ) -> AppResult<()> {
        self.observe("insert phases", || {
            let conn = self.db.get_connection()?;
            conn.execute(
                "INSERT INTO phases (session_id, name, duration_ms, tokens_used, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session_id,
                    name,
                    duration_ms as i64,
                    tokens_used as i64,
                    metadata.to_string()
                ],
            )?;
            Ok(())
        })
    }

    /// Write the session's report. Idempotent: at most one report per session,
    /// the first write wins.
    pub fn write_report(
        &self,
        session_id: &str,
        content: &str,
        citations: &[Citation],
    ) -> AppResult<()> {
        self.observe("insert reports", || {
            let citations_json = serde_json::to_string(citations)?;
            let conn = self.db.get_connection()?;
            conn.execute(
                "INSERT OR IGNORE INTO reports (session_id, content, citations)
                 VALUES (?1, ?2, ?3)",
                params![session_id, content, citations_json],
            )?;
            Ok(())
        })
    }

    /// Transition a running session to `completed` with aggregate telemetry.
    pub fn complete_session(
        &self,
        session_id: &str,
        total_latency_ms: u64,
        total_tokens: u64,
    ) -> AppResult<()> {
        self.observe("update sessions completed", || {
            let conn = self.db.get_connection()?;
            let updated = conn.execute(
                "UPDATE sessions
                 SET status = 'completed', total_latency_ms = ?2, total_tokens = ?3
                 WHERE id = ?1 AND status = 'running'",
                params![session_id, total_latency_ms as i64, total_tokens as i64],
            )?;
            if updated == 0 {
                tracing::warn!(session_id, "completion skipped: session not running");
            }
            Ok(())
        })
    }

    /// Transition a running session to `failed`.
    pub fn fail_session(&self, session_id: &str) -> AppResult<()> {
        self.observe("update sessions failed", || {
            let conn = self.db.get_connection()?;
            let updated = conn.execute(
                "UPDATE sessions SET status = 'failed' WHERE id = ?1 AND status = 'running'",
                params![session_id],
            )?;
            if updated == 0 {
                tracing::warn!(session_id, "failure skipped: session not running");
            }
            Ok(())
        })
    }

    /// Fetch a session with its report and phases, or None if missing.
    pub fn get_session_with_report(&self, session_id: &str) -> AppResult<Option<SessionDetail>> {
        let row = self.observe("select sessions join reports", || {
            let conn = self.db.get_connection()?;
            let result = conn.query_row(
                "SELECT s.id, s.query, s.mode, s.status, s.total_latency_ms, s.total_tokens,
                        s.created_at, r.content, r.citations
                 FROM sessions s
                 LEFT JOIN reports r ON r.session_id = s.id
                 WHERE s.id = ?1",
                params![session_id],
                |row| {
                    let session = row_to_session(row)?;
                    let content: Option<String> = row.get(7)?;
                    let citations: Option<String> = row.get(8)?;
                    Ok((session, content, citations))
                },
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(AppError::from(e)),
            }
        })?;

        let Some((session, content, citations_json)) = row else {
            return Ok(None);
        };

        let citations = match citations_json {
            Some(raw) => Some(serde_json::from_str::<Vec<Citation>>(&raw)?),
            None => None,
        };

        let phases = self.list_phases(session_id)?;
        Ok(Some(SessionDetail {
            session,
            report: content,
            citations,
            phases,
        }))
    }

    /// Phase rows for a session, in insertion order.
    pub fn list_phases(&self, session_id: &str) -> AppResult<Vec<PhaseRecord>> {
        self.observe("select phases", || {
            let conn = self.db.get_connection()?;
            let mut stmt = conn.prepare(
                "SELECT name, duration_ms, tokens_used, metadata
                 FROM phases WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let phases = stmt
                .query_map(params![session_id], |row| {
                    let metadata_json: Option<String> = row.get(3)?;
                    Ok(PhaseRecord {
                        name: row.get(0)?,
                        duration_ms: row.get::<_, i64>(1)? as u64,
                        tokens_used: row.get::<_, i64>(2)? as u64,
                        metadata: metadata_json
                            .and_then(|raw| serde_json::from_str(&raw).ok())
                            .unwrap_or(serde_json::Value::Null),
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();
            Ok(phases)
        })
    }

    /// Newest-first compact listing for the history endpoint.
    pub fn list_history(&self, limit: u32, offset: u32) -> AppResult<Vec<SessionRecord>> {
        self.observe("select sessions history", || {
            let conn = self.db.get_connection()?;
            let mut stmt = conn.prepare(
                "SELECT id, query, mode, status, total_latency_ms, total_tokens, created_at
                 FROM sessions
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let items = stmt
                .query_map(params![limit as i64, offset as i64], |row| {
                    row_to_session(row)
                })?
                .filter_map(|r| r.ok())
                .collect();
            Ok(items)
        })
    }

    pub fn count_history(&self) -> AppResult<u64> {
        self.observe("count sessions", || {
            let conn = self.db.get_connection()?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    /// Delete a session; phases and report cascade, error logs keep a nulled
    /// session id. Returns whether a row was deleted.
    pub fn delete_session(&self, session_id: &str) -> AppResult<bool> {
        self.observe("delete sessions", || {
            let conn = self.db.get_connection()?;
            let deleted = conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(deleted > 0)
        })
    }

    /// Append an error entry. Best-effort: failures are logged, never raised.
    pub fn log_error(&self, session_id: Option<&str>, message: &str, stack: Option<&str>) {
        let result = self.observe("insert error_logs", || {
            let conn = self.db.get_connection()?;
            conn.execute(
                "INSERT INTO error_logs (session_id, message, stack, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_id, message, stack, now_rfc3339()],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist error entry");
        }
    }

    /// Number of error entries for a session (telemetry/tests).
    pub fn count_errors(&self, session_id: &str) -> AppResult<u64> {
        let conn = self.db.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM error_logs WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn observe<T>(&self, op: &str, f: impl FnOnce() -> AppResult<T>) -> AppResult<T> {
        let started = Instant::now();
        let result = f();
        let elapsed = started.elapsed().as_millis();
        if elapsed > SLOW_QUERY_MS {
            let tag: String = op.chars().take(64).collect();
            tracing::warn!(op = %tag, elapsed_ms = elapsed as u64, "slow database operation");
        }
        result
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
    let mode_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        query: row.get(1)?,
        mode: ResearchMode::parse(&mode_str).unwrap_or(ResearchMode::Standard),
        status: SessionStatus::parse(&status_str).unwrap_or(SessionStatus::Failed),
        total_latency_ms: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
        total_tokens: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
        created_at: row.get(6)?,
    })
}
