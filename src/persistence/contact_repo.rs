//! Contact repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::contact::Contact;
use crate::timeutil::{fmt_ts, parse_ts};
use crate::Result;

use super::db::Database;

/// Repository for contact records.
#[derive(Clone)]
pub struct ContactRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ContactRow {
    project_id: String,
    agent_id: String,
    contact_address: String,
    created_at: String,
}

impl ContactRow {
    fn into_contact(self) -> Result<Contact> {
        Ok(Contact {
            project_id: self.project_id,
            agent_id: self.agent_id,
            contact_address: self.contact_address,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl ContactRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Add a contact. Idempotent on repeats.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn add(&self, contact: &Contact) -> Result<()> {
        sqlx::query(
            "INSERT INTO contacts (project_id, agent_id, contact_address, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (project_id, agent_id, contact_address) DO NOTHING",
        )
        .bind(&contact.project_id)
        .bind(&contact.agent_id)
        .bind(&contact.contact_address)
        .bind(fmt_ts(contact.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Remove a contact. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn remove(
        &self,
        project_id: &str,
        agent_id: &str,
        contact_address: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM contacts
             WHERE project_id = ?1 AND agent_id = ?2 AND contact_address = ?3",
        )
        .bind(project_id)
        .bind(agent_id)
        .bind(contact_address)
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List an agent's contact set, address order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self, project_id: &str, agent_id: &str) -> Result<Vec<Contact>> {
        let rows: Vec<ContactRow> = sqlx::query_as(
            "SELECT project_id, agent_id, contact_address, created_at FROM contacts
             WHERE project_id = ?1 AND agent_id = ?2
             ORDER BY contact_address ASC",
        )
        .bind(project_id)
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(ContactRow::into_contact).collect()
    }

    /// Whether `contact_address` is in the agent's contact set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn contains(
        &self,
        project_id: &str,
        agent_id: &str,
        contact_address: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contacts
             WHERE project_id = ?1 AND agent_id = ?2 AND contact_address = ?3",
        )
        .bind(project_id)
        .bind(agent_id)
        .bind(contact_address)
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(count > 0)
    }
}
