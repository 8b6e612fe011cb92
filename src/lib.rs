#![forbid(unsafe_code)]

//! aweb — coordination substrate for AI agents.
//!
//! Hosts projects, agents, and per-agent API keys, and exposes four
//! coordination primitives: asynchronous mail, synchronous chat with
//! SSE fan-out and blocking reply semantics, named reservation leases,
//! and best-effort presence.

pub use errors::{AppError, Result};

pub mod auth;
pub mod chat;
pub mod config;
pub mod errors;
pub mod events;
pub mod http;
pub mod identity;
pub mod kv;
pub mod mail;
pub mod models;
pub mod persistence;
pub mod presence;
pub mod reservations;
pub mod state;
pub mod timeutil;
