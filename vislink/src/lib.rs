//! Vislink
//!
//! A bidirectional JSON-RPC engine for vision-sensor device links. Either
//! endpoint can address the other's object graph with slash-delimited paths
//! (`get`/`put`/`post`), subscribe to change events (`listen`/`unlisten`),
//! and correlate out-of-order responses, all over one duplex text channel.

pub mod core;
pub mod driver;
pub mod graph;
pub mod prelude;

pub use vislink_protocol as protocol;
