//! Connection handshake object
//!
//! A fixed, engine-owned node reachable only through the reserved
//! `$connection` path prefix. It exposes exactly one operation: `hello`
//! accepts the peer's identity record and returns this endpoint's own,
//! computed once and cached. Everything else on it is rejected.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use vislink_protocol::PROTOCOL_VERSION;

use crate::graph::{Addressable, EventHook, GraphError, HookId};

/// The single operation exposed by the handshake object.
pub const HELLO_OPERATION: &str = "hello";

/// One endpoint's identity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            vendor: None,
        }
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }
}

/// The handshake node itself.
pub struct ConnectionNode {
    local: Identity,
    record: OnceCell<Value>,
    peer: Mutex<Option<Identity>>,
}

impl ConnectionNode {
    pub fn new(local: Identity) -> Self {
        Self {
            local,
            record: OnceCell::new(),
            peer: Mutex::new(None),
        }
    }

    /// Identity the peer announced, once `hello` has been received
    pub fn peer(&self) -> Option<Identity> {
        self.peer.lock().clone()
    }

    /// This endpoint's announced record; built on first use, cached after
    fn local_record(&self) -> Value {
        self.record
            .get_or_init(|| {
                let mut record = serde_json::Map::new();
                record.insert("name".into(), Value::String(self.local.name.clone()));
                record.insert("version".into(), Value::String(self.local.version.clone()));
                if let Some(vendor) = &self.local.vendor {
                    record.insert("vendor".into(), Value::String(vendor.clone()));
                }
                record.insert("protocol".into(), Value::String(PROTOCOL_VERSION.into()));
                Value::Object(record)
            })
            .clone()
    }
}

impl Addressable for ConnectionNode {
    fn child(&self, _segment: &str) -> Option<Arc<dyn Addressable>> {
        None
    }

    fn read(&self, member: &str) -> Result<Value, GraphError> {
        Err(GraphError::Forbidden(member.to_string()))
    }

    fn write(&self, member: &str, _value: Value) -> Result<(), GraphError> {
        Err(GraphError::Forbidden(member.to_string()))
    }

    fn invoke(&self, member: &str, mut args: Vec<Value>) -> Result<Value, GraphError> {
        if member != HELLO_OPERATION {
            return Err(GraphError::Forbidden(member.to_string()));
        }
        if args.is_empty() {
            return Err(GraphError::invocation(
                HELLO_OPERATION,
                "expects the peer's identity record",
            ));
        }

        let peer: Identity = serde_json::from_value(args.remove(0))
            .map_err(|e| GraphError::invocation(HELLO_OPERATION, e))?;
        info!("peer identified as {} {}", peer.name, peer.version);
        *self.peer.lock() = Some(peer);

        Ok(self.local_record())
    }

    fn subscribe(&self, member: &str, _hook: EventHook) -> Result<HookId, GraphError> {
        Err(GraphError::Forbidden(member.to_string()))
    }

    fn unsubscribe(&self, member: &str, _hook: HookId) -> Result<(), GraphError> {
        Err(GraphError::Forbidden(member.to_string()))
    }
}
