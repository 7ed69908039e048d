pub mod migrations;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::agent::output::ToolInvocation;
use crate::session::SessionId;
use crate::types::{Message, MessageRole, ToolLog, Turn};

/// Session-keyed, append-only conversation history
pub trait HistoryStore: Send + Sync {
    /// All turns for the session in insertion order; empty for unknown sessions.
    fn load(&self, session: &SessionId) -> Result<Vec<Turn>>;

    /// Persist `turns` after every previously stored turn of the session.
    fn append(&self, session: &SessionId, turns: &[Turn]) -> Result<()>;

    /// Record capability telemetry for a completed cycle.
    fn record_tool_invocations(
        &self,
        _session: &SessionId,
        _agent: &str,
        _run_id: &str,
        _invocations: &[ToolInvocation],
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct Persistence {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Persistence {
    /// Create or open the database at the provided path and run migrations.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = expand_tilde(db_path.as_ref())?;
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).context("creating DB directory")?;
            }
        }
        let conn = Connection::open(&db_path).context("opening DuckDB")?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: db_path,
        })
    }

    /// Idempotent schema setup. A failed migration against a database whose
    /// tables already exist is logged and tolerated.
    fn initialize(conn: &Connection) -> Result<()> {
        if let Err(err) = migrations::run(conn) {
            if migrations::tables_present(conn).unwrap_or(false) {
                warn!("History schema already present, skipping migration: {:#}", err);
                return Ok(());
            }
            return Err(err).context("running migrations");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint the database so all WAL data lands in the main file.
    /// Call this before shutdown.
    pub fn checkpoint(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("CHECKPOINT;")
            .context("checkpointing database")
    }

    /// Exclusive access to the shared connection.
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .expect("database connection mutex poisoned")
    }

    // ---------- Messages ----------

    pub fn insert_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<i64> {
        let conn = self.conn();
        insert_message_row(&conn, session_id, role, content)
    }

    /// Insert several turns atomically; either all rows land or none do.
    pub fn insert_turns(&self, session_id: &str, turns: &[Turn]) -> Result<Vec<i64>> {
        let mut conn = self.conn();
        // Dropping an uncommitted transaction rolls it back
        let tx = conn
            .transaction()
            .context("starting append transaction")?;
        let mut ids = Vec::with_capacity(turns.len());
        for turn in turns {
            let id = insert_message_row(&tx, session_id, turn.role, &turn.content)
                .context("appending conversation turns")?;
            ids.push(id);
        }
        tx.commit().context("committing conversation turns")?;
        Ok(ids)
    }

    /// Every message of a session, oldest first.
    pub fn all_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, session_id, role, content, CAST(created_at AS TEXT) as created_at FROM messages WHERE session_id = ? ORDER BY id ASC")?;
        let mut rows = stmt.query(params![session_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(message) = message_from_row(row)? {
                out.push(message);
            }
        }
        Ok(out)
    }

    /// The most recent `limit` messages of a session, oldest first.
    pub fn list_messages(&self, session_id: &str, limit: i64) -> Result<Vec<Message>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, session_id, role, content, CAST(created_at AS TEXT) as created_at FROM messages WHERE session_id = ? ORDER BY id DESC LIMIT ?")?;
        let mut rows = stmt.query(params![session_id, limit])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            if let Some(message) = message_from_row(row)? {
                out.push(message);
            }
        }
        out.reverse();
        Ok(out)
    }

    pub fn count_messages(&self, session_id: &str) -> Result<i64> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM messages WHERE session_id = ?")?;
        let count: i64 = stmt.query_row(params![session_id], |row| row.get(0))?;
        Ok(count)
    }

    /// List known session IDs ordered by most recent activity
    pub fn list_sessions(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT session_id, MAX(id) as last FROM messages GROUP BY session_id ORDER BY last DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let sid: String = row.get(0)?;
            out.push(sid);
        }
        Ok(out)
    }

    // ---------- Tool Log ----------

    pub fn log_tool(
        &self,
        session_id: &str,
        agent_name: &str,
        run_id: &str,
        invocation: &ToolInvocation,
    ) -> Result<i64> {
        let conn = self.conn();
        let mut stmt = conn.prepare("INSERT INTO tool_log (session_id, agent, run_id, tool_call_id, tool_name, arguments, output, success, error) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id")?;
        let id: i64 = stmt.query_row(
            params![
                session_id,
                agent_name,
                run_id,
                invocation.call_id,
                invocation.name,
                invocation.arguments.to_string(),
                invocation.output.as_deref().unwrap_or(""),
                invocation.success,
                invocation.error.as_deref()
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn list_tool_logs(&self, session_id: &str) -> Result<Vec<ToolLog>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, session_id, agent, run_id, tool_call_id, tool_name, arguments, output, success, error, CAST(created_at AS TEXT) FROM tool_log WHERE session_id = ? ORDER BY id ASC")?;
        let mut rows = stmt.query(params![session_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let arguments: String = row.get(6)?;
            let created_at: String = row.get(10)?;
            out.push(ToolLog {
                id: row.get(0)?,
                session_id: row.get(1)?,
                agent: row.get(2)?,
                run_id: row.get(3)?,
                tool_call_id: row.get(4)?,
                tool_name: row.get(5)?,
                arguments: serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null),
                output: row.get(7)?,
                success: row.get(8)?,
                error: row.get(9)?,
                created_at: parse_timestamp(&created_at),
            });
        }
        Ok(out)
    }
}

impl HistoryStore for Persistence {
    fn load(&self, session: &SessionId) -> Result<Vec<Turn>> {
        let turns: Vec<Turn> = self
            .all_messages(&session.to_string())
            .context("loading session history")?
            .into_iter()
            .map(Turn::from)
            .collect();
        debug!("Loaded {} turns for session {}", turns.len(), session);
        Ok(turns)
    }

    fn append(&self, session: &SessionId, turns: &[Turn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }
        self.insert_turns(&session.to_string(), turns)?;
        debug!("Appended {} turns to session {}", turns.len(), session);
        Ok(())
    }

    fn record_tool_invocations(
        &self,
        session: &SessionId,
        agent: &str,
        run_id: &str,
        invocations: &[ToolInvocation],
    ) -> Result<()> {
        let sid = session.to_string();
        for invocation in invocations {
            self.log_tool(&sid, agent, run_id, invocation)
                .with_context(|| format!("logging tool '{}'", invocation.name))?;
        }
        Ok(())
    }
}

fn insert_message_row(
    conn: &Connection,
    session_id: &str,
    role: MessageRole,
    content: &str,
) -> Result<i64> {
    let mut stmt = conn.prepare(
        "INSERT INTO messages (session_id, role, content) VALUES (?, ?, ?) RETURNING id",
    )?;
    let id: i64 = stmt.query_row(params![session_id, role.as_str(), content], |row| {
        row.get(0)
    })?;
    Ok(id)
}

fn message_from_row(row: &duckdb::Row<'_>) -> Result<Option<Message>> {
    let id: i64 = row.get(0)?;
    let sid: String = row.get(1)?;
    let role: String = row.get(2)?;
    let content: String = row.get(3)?;
    let created_at: String = row.get(4)?; // DuckDB returns TIMESTAMP as string
    let Some(role) = MessageRole::from_str(&role) else {
        warn!("Skipping message {} with unknown role '{}'", id, role);
        return Ok(None);
    };
    Ok(Some(Message {
        id,
        session_id: sid,
        role,
        content,
        created_at: parse_timestamp(&created_at),
    }))
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    if path_str == "~" {
        let base = BaseDirs::new().context("base directories not available")?;
        Ok(base.home_dir().to_path_buf())
    } else if let Some(stripped) = path_str.strip_prefix("~/") {
        let base = BaseDirs::new().context("base directories not available")?;
        Ok(base.home_dir().join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
