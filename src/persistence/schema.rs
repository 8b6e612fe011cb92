//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` — safe to
//! re-run on every server startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// Creates every table and index idempotently. Safe to call on every
/// startup.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS projects (
    project_id      TEXT PRIMARY KEY NOT NULL,
    slug            TEXT NOT NULL,
    tenant_id       TEXT,
    created_at      TEXT NOT NULL,
    deleted_at      TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_live_slug
    ON projects(COALESCE(tenant_id, ''), slug) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS agents (
    agent_id        TEXT PRIMARY KEY NOT NULL,
    project_id      TEXT NOT NULL,
    alias           TEXT NOT NULL,
    human_name      TEXT,
    agent_type      TEXT,
    access_mode     TEXT NOT NULL CHECK(access_mode IN ('open','contacts_only')),
    status          TEXT NOT NULL CHECK(status IN ('active','retired','deregistered')),
    created_at      TEXT NOT NULL,
    deleted_at      TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_agents_live_alias
    ON agents(project_id, alias) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS api_keys (
    api_key_id      TEXT PRIMARY KEY NOT NULL,
    project_id      TEXT NOT NULL,
    agent_id        TEXT,
    key_hash        TEXT NOT NULL,
    is_active       INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL,
    last_used_at    TEXT
);

CREATE INDEX IF NOT EXISTS idx_api_keys_hash ON api_keys(key_hash);
CREATE UNIQUE INDEX IF NOT EXISTS idx_api_keys_active_agent
    ON api_keys(agent_id) WHERE is_active = 1 AND agent_id IS NOT NULL;

CREATE TABLE IF NOT EXISTS contacts (
    project_id      TEXT NOT NULL,
    agent_id        TEXT NOT NULL,
    contact_address TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    PRIMARY KEY (project_id, agent_id, contact_address)
);

CREATE TABLE IF NOT EXISTS messages (
    message_id      TEXT PRIMARY KEY NOT NULL,
    project_id      TEXT NOT NULL,
    from_agent_id   TEXT NOT NULL,
    to_agent_id     TEXT NOT NULL,
    from_alias      TEXT NOT NULL,
    subject         TEXT NOT NULL,
    body            TEXT NOT NULL,
    priority        TEXT NOT NULL CHECK(priority IN ('low','normal','high','urgent')),
    thread_id       TEXT,
    from_did        TEXT,
    to_did          TEXT,
    signature       TEXT,
    signing_key_id  TEXT,
    created_at      TEXT NOT NULL,
    read_at         TEXT
);

CREATE INDEX IF NOT EXISTS idx_messages_inbox
    ON messages(project_id, to_agent_id, created_at DESC);

CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id       TEXT PRIMARY KEY NOT NULL,
    project_id       TEXT NOT NULL,
    participant_hash TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    UNIQUE (project_id, participant_hash)
);

CREATE TABLE IF NOT EXISTS chat_session_participants (
    session_id      TEXT NOT NULL,
    agent_id        TEXT NOT NULL,
    alias           TEXT NOT NULL,
    joined_at       TEXT NOT NULL,
    PRIMARY KEY (session_id, agent_id)
);

CREATE INDEX IF NOT EXISTS idx_participants_agent
    ON chat_session_participants(agent_id);

CREATE TABLE IF NOT EXISTS chat_messages (
    message_id      TEXT PRIMARY KEY NOT NULL,
    session_id      TEXT NOT NULL,
    from_agent_id   TEXT NOT NULL,
    from_alias      TEXT NOT NULL,
    body            TEXT NOT NULL,
    sender_leaving  INTEGER NOT NULL DEFAULT 0,
    hang_on         INTEGER NOT NULL DEFAULT 0,
    from_did        TEXT,
    to_did          TEXT,
    signature       TEXT,
    signing_key_id  TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_session
    ON chat_messages(session_id, created_at, message_id);

CREATE TABLE IF NOT EXISTS chat_read_receipts (
    session_id           TEXT NOT NULL,
    agent_id             TEXT NOT NULL,
    last_read_message_id TEXT,
    last_read_at         TEXT,
    PRIMARY KEY (session_id, agent_id)
);

CREATE TABLE IF NOT EXISTS reservations (
    project_id      TEXT NOT NULL,
    resource_key    TEXT NOT NULL,
    holder_agent_id TEXT NOT NULL,
    holder_alias    TEXT NOT NULL,
    acquired_at     TEXT NOT NULL,
    expires_at      TEXT NOT NULL,
    metadata_json   TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (project_id, resource_key)
);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
