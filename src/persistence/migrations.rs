use anyhow::{Context, Result};
use duckdb::Connection;

/// Tables every history store must expose once migrations have run.
pub const REQUIRED_TABLES: [&str; 2] = ["messages", "tool_log"];

pub fn run(conn: &Connection) -> Result<()> {
    // Simple migration system: ensure a schema version table and apply migrations sequentially.
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .context("creating schema_migrations table")?;

    let current = current_version(conn)?;
    let mut migrations_applied = false;

    if current < 1 {
        apply_v1(conn)?;
        set_version(conn, 1)?;
        migrations_applied = true;
    }

    if current < 2 {
        apply_v2(conn)?;
        set_version(conn, 2)?;
        migrations_applied = true;
    }

    // Merge the WAL so a later open never replays schema changes.
    if migrations_applied {
        conn.execute_batch("FORCE CHECKPOINT;")
            .context("forcing checkpoint after migrations")?;
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")?;
    let v: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(v)
}

/// Whether the history tables exist, regardless of how they got there.
pub fn tables_present(conn: &Connection) -> Result<bool> {
    let mut stmt = conn.prepare(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name IN ('messages', 'tool_log')",
    )?;
    let count: i64 = stmt.query_row([], |row| row.get(0))?;
    Ok(count as usize == REQUIRED_TABLES.len())
}

fn set_version(conn: &Connection, v: i64) -> Result<()> {
    // A concurrent first run may have recorded the version already.
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version) VALUES (?)",
        [v],
    )?;
    Ok(())
}

fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE SEQUENCE IF NOT EXISTS messages_id_seq START 1;

        CREATE TABLE IF NOT EXISTS messages (
            id BIGINT PRIMARY KEY DEFAULT nextval('messages_id_seq'),
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
        "#,
    )
    .context("applying v1 schema (conversation history)")
}

fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE SEQUENCE IF NOT EXISTS tool_log_id_seq START 1;

        CREATE TABLE IF NOT EXISTS tool_log (
            id BIGINT PRIMARY KEY DEFAULT nextval('tool_log_id_seq'),
            session_id TEXT NOT NULL,
            agent TEXT NOT NULL,
            run_id TEXT NOT NULL,
            tool_call_id TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            arguments TEXT NOT NULL,
            output TEXT NOT NULL,
            success BOOLEAN NOT NULL,
            error TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_tool_log_session ON tool_log(session_id);
        "#,
    )
    .context("applying v2 schema (tool telemetry)")
}
