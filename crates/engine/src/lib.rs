//! The party session server: a WebSocket-driven command/broadcast engine
//! for a tabletop RPG's chat and action-resolution hub.
//!
//! The binary entry point (`main.rs`) wires an axum `Router` over the
//! pieces exposed here; everything socket- and macro-related is reachable
//! without the HTTP layer so it can be exercised directly in tests.

pub mod app_state;
pub mod dispatch;
pub mod infrastructure;
pub mod party;
