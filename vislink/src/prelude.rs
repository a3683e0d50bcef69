// Convenience re-exports: use vislink::prelude::*;
pub use crate::core::{Engine, Identity, Link, LinkConfig, LinkError};

pub use crate::driver::{Driver, MockDriver, TransportEvent, WsClientDriver};

pub use crate::graph::{Addressable, GraphError, ObjectNode};

pub use vislink_protocol::{Kind, Message};

// Re-export async_trait for Driver impls
pub use async_trait::async_trait;
