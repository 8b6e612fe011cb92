//! Domain model module declarations.

pub mod agent;
pub mod api_key;
pub mod chat;
pub mod contact;
pub mod mail;
pub mod project;
pub mod reservation;
