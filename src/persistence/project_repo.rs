//! Project repository for `SQLite` persistence.

use std::sync::Arc;

use crate::models::project::Project;
use crate::timeutil::{fmt_ts, parse_ts};
use crate::Result;

use super::db::Database;

/// Repository for project records.
#[derive(Clone)]
pub struct ProjectRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ProjectRow {
    project_id: String,
    slug: String,
    tenant_id: Option<String>,
    created_at: String,
    deleted_at: Option<String>,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project> {
        Ok(Project {
            project_id: self.project_id,
            slug: self.slug,
            tenant_id: self.tenant_id,
            created_at: parse_ts(&self.created_at)?,
            deleted_at: self.deleted_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

const COLUMNS: &str = "project_id, slug, tenant_id, created_at, deleted_at";

impl ProjectRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a project row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including on a live
    /// slug collision (unique index violation).
    pub async fn insert(&self, project: &Project) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (project_id, slug, tenant_id, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
        )
        .bind(&project.project_id)
        .bind(&project.slug)
        .bind(&project.tenant_id)
        .bind(fmt_ts(project.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Fetch a live project by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch(&self, project_id: &str) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM projects WHERE project_id = ?1 AND deleted_at IS NULL"
        ))
        .bind(project_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(ProjectRow::into_project).transpose()
    }

    /// Fetch a live project by slug within the optional tenant partition.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch_by_slug(
        &self,
        slug: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM projects
             WHERE slug = ?1 AND COALESCE(tenant_id, '') = COALESCE(?2, '')
               AND deleted_at IS NULL"
        ))
        .bind(slug)
        .bind(tenant_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(ProjectRow::into_project).transpose()
    }
}
