//! Vislink Device Protocol
//!
//! This crate defines the JSON message vocabulary spoken between a vision
//! sensor and its host over one persistent duplex text channel.
//!
//! # Protocol Overview
//!
//! Each frame is a self-contained JSON record. Either endpoint may act as
//! client or server for any message kind.
//!
//! ## Message kinds
//!
//! - `get` / `put` / `post` - read, write or invoke a member addressed by a
//!   slash-delimited path
//! - `listen` / `unlisten` - subscribe to / unsubscribe from change events
//!   at a path
//! - `event` - a change notification for a subscribed path
//! - `resp` - the correlated reply to any request that carried an `id`

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Protocol version
pub const PROTOCOL_VERSION: &str = "1.0.0";
