//! Authenticated caller scope.

use serde::Serialize;

use crate::{AppError, Result};

/// The `(project_id, agent_id?)` scope derived from authentication.
///
/// Every operation takes its project from here; request-supplied project
/// identifiers must match it. Keys without a bound agent authenticate a
/// project only.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Principal {
    /// Project the caller is scoped to.
    pub project_id: String,
    /// Acting agent, when the credential is agent-linked.
    pub agent_id: Option<String>,
    /// Authenticating key, absent under proxy trust.
    pub api_key_id: Option<String>,
}

impl Principal {
    /// The acting agent id, required for agent-scoped operations.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` when the credential is project-only.
    pub fn require_agent(&self) -> Result<&str> {
        self.agent_id
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("operation requires an agent-linked key".into()))
    }
}
