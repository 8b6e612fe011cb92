//! Agent repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::agent::{AccessMode, Agent, AgentStatus};
use crate::timeutil::{fmt_ts, now_ts, parse_ts};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for agent records.
#[derive(Clone)]
pub struct AgentRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct AgentRow {
    agent_id: String,
    project_id: String,
    alias: String,
    human_name: Option<String>,
    agent_type: Option<String>,
    access_mode: String,
    status: String,
    created_at: String,
    deleted_at: Option<String>,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent> {
        Ok(Agent {
            agent_id: self.agent_id,
            project_id: self.project_id,
            alias: self.alias,
            human_name: self.human_name,
            agent_type: self.agent_type,
            access_mode: parse_access_mode(&self.access_mode)?,
            status: parse_status(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            deleted_at: self.deleted_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

/// Parse an access mode string into the domain enum.
fn parse_access_mode(s: &str) -> Result<AccessMode> {
    match s {
        "open" => Ok(AccessMode::Open),
        "contacts_only" => Ok(AccessMode::ContactsOnly),
        other => Err(AppError::Db(format!("invalid access mode: {other}"))),
    }
}

/// Serialize an access mode to its database string.
fn access_mode_str(m: AccessMode) -> &'static str {
    match m {
        AccessMode::Open => "open",
        AccessMode::ContactsOnly => "contacts_only",
    }
}

/// Parse a status string into the domain enum.
fn parse_status(s: &str) -> Result<AgentStatus> {
    match s {
        "active" => Ok(AgentStatus::Active),
        "retired" => Ok(AgentStatus::Retired),
        "deregistered" => Ok(AgentStatus::Deregistered),
        other => Err(AppError::Db(format!("invalid agent status: {other}"))),
    }
}

/// Serialize a status enum to its database string.
fn status_str(s: AgentStatus) -> &'static str {
    match s {
        AgentStatus::Active => "active",
        AgentStatus::Retired => "retired",
        AgentStatus::Deregistered => "deregistered",
    }
}

const COLUMNS: &str = "agent_id, project_id, alias, human_name, agent_type, \
                       access_mode, status, created_at, deleted_at";

impl AgentRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an agent row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including on a live
    /// alias collision (unique index violation).
    pub async fn insert(&self, agent: &Agent) -> Result<()> {
        sqlx::query(
            "INSERT INTO agents (agent_id, project_id, alias, human_name, agent_type,
                                 access_mode, status, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL)",
        )
        .bind(&agent.agent_id)
        .bind(&agent.project_id)
        .bind(&agent.alias)
        .bind(&agent.human_name)
        .bind(&agent.agent_type)
        .bind(access_mode_str(agent.access_mode))
        .bind(status_str(agent.status))
        .bind(fmt_ts(agent.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Fetch a live agent by id within a project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch(&self, project_id: &str, agent_id: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM agents
             WHERE project_id = ?1 AND agent_id = ?2 AND deleted_at IS NULL"
        ))
        .bind(project_id)
        .bind(agent_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// Fetch a live agent by alias within a project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch_by_alias(&self, project_id: &str, alias: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM agents
             WHERE project_id = ?1 AND alias = ?2 AND deleted_at IS NULL"
        ))
        .bind(project_id)
        .bind(alias)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// List live agents of a project, alias order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, project_id: &str) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM agents
             WHERE project_id = ?1 AND deleted_at IS NULL
             ORDER BY alias ASC"
        ))
        .bind(project_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    /// Set an agent's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_status(
        &self,
        project_id: &str,
        agent_id: &str,
        status: AgentStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE agents SET status = ?3
             WHERE project_id = ?1 AND agent_id = ?2 AND deleted_at IS NULL",
        )
        .bind(project_id)
        .bind(agent_id)
        .bind(status_str(status))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set an agent's access mode.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn set_access_mode(
        &self,
        project_id: &str,
        agent_id: &str,
        mode: AccessMode,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE agents SET access_mode = ?3
             WHERE project_id = ?1 AND agent_id = ?2 AND deleted_at IS NULL",
        )
        .bind(project_id)
        .bind(agent_id)
        .bind(access_mode_str(mode))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Tombstone an agent. The alias becomes reusable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn tombstone(&self, project_id: &str, agent_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE agents SET deleted_at = ?3
             WHERE project_id = ?1 AND agent_id = ?2 AND deleted_at IS NULL",
        )
        .bind(project_id)
        .bind(agent_id)
        .bind(now_ts())
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
