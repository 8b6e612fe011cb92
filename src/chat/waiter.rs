//! Waiter registry and the send-and-wait state machine.
//!
//! A waiter is an in-flight blocked send request registered for
//! notifications on its session. The registry is process-local: a map
//! `session_id → [entries]`, each entry owning its effective deadline.
//! Sessions hold no back-reference; lookup is via the map. Entries live
//! only for the lifetime of a blocked request — the guard removes them
//! on drop, including when the client disconnects and the handler future
//! is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::events::BusEvent;

/// One blocked send request.
pub struct WaiterEntry {
    session_id: String,
    agent_id: String,
    deadline: Mutex<DateTime<Utc>>,
}

impl WaiterEntry {
    /// The waiter's current effective deadline.
    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        match self.deadline.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Apply an extension: `effective_deadline = max(now, effective_deadline) + extends`.
    pub fn extend(&self, now: DateTime<Utc>, extends_seconds: u64) {
        let mut deadline = match self.deadline.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let base = (*deadline).max(now);
        *deadline = base + chrono::Duration::seconds(i64::try_from(extends_seconds).unwrap_or(0));
    }

    /// Agent blocked on this entry.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

type WaiterMap = Mutex<HashMap<String, Vec<Arc<WaiterEntry>>>>;

/// Process-local registry of blocked send-and-wait requests.
pub struct WaiterRegistry {
    inner: Arc<WaiterMap>,
}

impl Default for WaiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WaiterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a waiter. The returned guard unregisters it on drop.
    #[must_use]
    pub fn register(
        &self,
        session_id: &str,
        agent_id: &str,
        deadline: DateTime<Utc>,
    ) -> WaiterGuard {
        let entry = Arc::new(WaiterEntry {
            session_id: session_id.to_owned(),
            agent_id: agent_id.to_owned(),
            deadline: Mutex::new(deadline),
        });
        let mut map = lock(&self.inner);
        map.entry(session_id.to_owned())
            .or_default()
            .push(Arc::clone(&entry));
        WaiterGuard {
            map: Arc::clone(&self.inner),
            entry,
        }
    }

    /// The waiter blocked on `session_id` from an agent other than
    /// `observer_agent_id`, if one exists. Returns the waiting agent and
    /// its effective deadline; with several waiters, the latest deadline
    /// wins.
    #[must_use]
    pub fn waiting_against(
        &self,
        session_id: &str,
        observer_agent_id: &str,
    ) -> Option<(String, DateTime<Utc>)> {
        let map = lock(&self.inner);
        map.get(session_id)?
            .iter()
            .filter(|e| e.agent_id != observer_agent_id)
            .map(|e| (e.agent_id.clone(), e.deadline()))
            .max_by_key(|(_, deadline)| *deadline)
    }

    /// Extend every waiter on `session_id` other than `from_agent_id`.
    ///
    /// Returns whether any entry was extended. The registry applies the
    /// extension directly so `effective_deadline` stays correct even if
    /// the blocked task is slow to observe the bus event.
    pub fn extend_others(
        &self,
        session_id: &str,
        from_agent_id: &str,
        now: DateTime<Utc>,
        extends_seconds: u64,
    ) -> bool {
        let map = lock(&self.inner);
        let Some(entries) = map.get(session_id) else {
            return false;
        };
        let mut extended = false;
        for entry in entries.iter().filter(|e| e.agent_id != from_agent_id) {
            entry.extend(now, extends_seconds);
            extended = true;
        }
        extended
    }
}

fn lock(map: &WaiterMap) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Arc<WaiterEntry>>>> {
    match map.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Removes its entry from the registry on drop.
pub struct WaiterGuard {
    map: Arc<WaiterMap>,
    entry: Arc<WaiterEntry>,
}

impl WaiterGuard {
    /// The registered entry.
    #[must_use]
    pub fn entry(&self) -> &Arc<WaiterEntry> {
        &self.entry
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        let mut map = lock(&self.map);
        if let Some(entries) = map.get_mut(&self.entry.session_id) {
            entries.retain(|e| !Arc::ptr_eq(e, &self.entry));
            if entries.is_empty() {
                map.remove(&self.entry.session_id);
            }
        }
    }
}

/// Terminal outcome of a blocked send request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Another participant replied.
    Replied {
        /// Replying agent alias.
        from: String,
        /// Reply body.
        body: String,
    },
    /// Another participant replied and departed.
    SenderLeft {
        /// Departing agent alias.
        from: String,
        /// Final message body.
        body: String,
    },
    /// The effective deadline elapsed without a reply.
    DeadlineReached,
    /// The event bus shut down under the waiter.
    BusClosed,
}

/// Block until a reply, the effective deadline, or bus shutdown.
///
/// The subscription in `rx` must predate the commit of the waiter's own
/// message so no concurrent reply can fall between commit and subscribe.
/// The waiter skips events carrying its own `message_id` (replay skip)
/// and everything else it sent itself. Hang-on messages and read
/// receipts from other participants extend the effective deadline; the
/// registry already applied the extension at publish time, so the loop
/// only re-reads the entry.
pub async fn wait_for_reply(
    guard: &WaiterGuard,
    rx: &mut broadcast::Receiver<BusEvent>,
    session_id: &str,
    self_agent_id: &str,
    sent_message_id: &str,
) -> WaitOutcome {
    loop {
        let now = Utc::now();
        let deadline = guard.entry().deadline();
        if deadline <= now {
            return WaitOutcome::DeadlineReached;
        }
        let remaining = (deadline - now)
            .to_std()
            .unwrap_or(Duration::from_millis(0));

        tokio::select! {
            event = rx.recv() => match event {
                Ok(BusEvent::Message(msg)) if msg.session_id == session_id => {
                    if msg.message_id == sent_message_id || msg.from_agent_id == self_agent_id {
                        continue;
                    }
                    if msg.hang_on {
                        // Deadline already extended via the registry.
                        continue;
                    }
                    if msg.sender_leaving {
                        return WaitOutcome::SenderLeft {
                            from: msg.from_agent,
                            body: msg.body,
                        };
                    }
                    return WaitOutcome::Replied {
                        from: msg.from_agent,
                        body: msg.body,
                    };
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitOutcome::BusClosed,
            },
            () = tokio::time::sleep(remaining) => {
                // Re-check: the deadline may have been extended meanwhile.
                if guard.entry().deadline() <= Utc::now() {
                    return WaitOutcome::DeadlineReached;
                }
            }
        }
    }
}
