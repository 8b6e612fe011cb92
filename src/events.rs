//! In-process event bus delivering chat events to streams and waiters.
//!
//! One event is published per committed chat write. Subscribers filter by
//! `session_id`; publish order within a session matches commit order
//! because every chat write happens on the single-writer store connection
//! before its publish.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// New chat message payload, mirrored onto SSE frames.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEvent {
    /// Session the message belongs to.
    pub session_id: String,
    /// Message identifier; waiters use it for replay skip.
    pub message_id: String,
    /// Sending agent id.
    pub from_agent_id: String,
    /// Sending agent alias, surfaced as `from_agent` on the wire.
    pub from_agent: String,
    /// Body text.
    pub body: String,
    /// Sender departs after this message.
    pub sender_leaving: bool,
    /// Control message requesting a wait extension.
    pub hang_on: bool,
    /// Extension granted to blocked waiters, seconds. Positive only for
    /// hang-on messages.
    pub extends_wait_seconds: u64,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Read receipt advance payload.
#[derive(Debug, Clone, Serialize)]
pub struct ReadReceiptEvent {
    /// Session the receipt belongs to.
    pub session_id: String,
    /// Reading agent id.
    pub reader_agent_id: String,
    /// Reading agent alias.
    pub reader_alias: String,
    /// Extension granted to blocked waiters, seconds.
    pub extends_wait_seconds: u64,
    /// Advance timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Mail arrival notice keyed by recipient.
#[derive(Debug, Clone, Serialize)]
pub struct MailArrivedEvent {
    /// Owning project.
    pub project_id: String,
    /// Recipient agent.
    pub to_agent_id: String,
    /// Stored message identifier.
    pub message_id: String,
    /// Commit timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Bus event envelope.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// New chat message committed.
    Message(MessageEvent),
    /// Read receipt advanced.
    ReadReceipt(ReadReceiptEvent),
    /// Mail committed for a recipient.
    MailArrived(MailArrivedEvent),
}

impl BusEvent {
    /// Session the event belongs to, when it is a chat event.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Message(e) => Some(&e.session_id),
            Self::ReadReceipt(e) => Some(&e.session_id),
            Self::MailArrived(_) => None,
        }
    }

    /// SSE event name for chat events.
    #[must_use]
    pub fn frame_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::ReadReceipt(_) => "read_receipt",
            Self::MailArrived(_) => "mail_arrived",
        }
    }
}

/// Broadcast bus shared by all request handlers.
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with a bounded fan-out buffer.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self { sender }
    }

    /// Publish an event. Send errors (no subscribers) are ignored.
    pub fn publish(&self, event: BusEvent) {
        let _ = self.sender.send(event);
    }

    /// Open a new subscription positioned at the current tail.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}
