//! Shared application state accessible by all request handlers.

use std::sync::Arc;

use crate::chat::waiter::WaiterRegistry;
use crate::config::GlobalConfig;
use crate::events::EventBus;
use crate::kv::EphemeralKv;
use crate::persistence::agent_repo::AgentRepo;
use crate::persistence::api_key_repo::ApiKeyRepo;
use crate::persistence::chat_repo::ChatRepo;
use crate::persistence::contact_repo::ContactRepo;
use crate::persistence::db::Database;
use crate::persistence::mail_repo::MailRepo;
use crate::persistence::project_repo::ProjectRepo;
use crate::persistence::reservation_repo::ReservationRepo;

/// Shared application state.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// `SQLite` connection pool — the single source of truth for all
    /// persisted entities.
    pub db: Arc<Database>,
    /// In-process event bus for chat fan-out.
    pub bus: EventBus,
    /// Process-local registry of blocked send-and-wait requests.
    pub waiters: WaiterRegistry,
    /// Ephemeral TTL KV backing presence.
    pub kv: EphemeralKv,
}

impl AppState {
    /// Assemble state around a connected pool.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, db: Arc<Database>) -> Self {
        Self {
            config,
            db,
            bus: EventBus::new(),
            waiters: WaiterRegistry::new(),
            kv: EphemeralKv::new(),
        }
    }

    /// Project repository over the shared pool.
    #[must_use]
    pub fn projects(&self) -> ProjectRepo {
        ProjectRepo::new(Arc::clone(&self.db))
    }

    /// Agent repository over the shared pool.
    #[must_use]
    pub fn agents(&self) -> AgentRepo {
        AgentRepo::new(Arc::clone(&self.db))
    }

    /// API key repository over the shared pool.
    #[must_use]
    pub fn api_keys(&self) -> ApiKeyRepo {
        ApiKeyRepo::new(Arc::clone(&self.db))
    }

    /// Contact repository over the shared pool.
    #[must_use]
    pub fn contacts(&self) -> ContactRepo {
        ContactRepo::new(Arc::clone(&self.db))
    }

    /// Mail repository over the shared pool.
    #[must_use]
    pub fn mail(&self) -> MailRepo {
        MailRepo::new(Arc::clone(&self.db))
    }

    /// Chat repository over the shared pool.
    #[must_use]
    pub fn chat(&self) -> ChatRepo {
        ChatRepo::new(Arc::clone(&self.db))
    }

    /// Reservation repository over the shared pool.
    #[must_use]
    pub fn reservations(&self) -> ReservationRepo {
        ReservationRepo::new(Arc::clone(&self.db))
    }
}
