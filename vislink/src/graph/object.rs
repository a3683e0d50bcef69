//! Registry-backed graph node
//!
//! [`ObjectNode`] is the general-purpose [`Addressable`] implementation:
//! declared properties, operations, children and event sources held in
//! string-keyed registries. Applications compose their device model from it
//! and push change notifications through [`ObjectNode::emit`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::{Addressable, EventHook, GraphError, HookId};

type Operation = Box<dyn Fn(Vec<Value>) -> Result<Value, GraphError> + Send + Sync>;

/// One member's event source: an ordered list of attached hooks.
#[derive(Default)]
struct EventSource {
    hooks: Mutex<Vec<(HookId, EventHook)>>,
}

/// A graph node with declared members.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use vislink::graph::ObjectNode;
///
/// let sensor = ObjectNode::new()
///     .property("exposure_us", json!(1200))
///     .event("changed");
///
/// let root = ObjectNode::new()
///     .property("state", json!("Idle"))
///     .method("trigger", |_args| Ok(json!("ok")))
///     .add_child("sensor", sensor);
/// # drop(root);
/// ```
#[derive(Default)]
pub struct ObjectNode {
    properties: DashMap<String, Value>,
    operations: DashMap<String, Operation>,
    children: DashMap<String, Arc<dyn Addressable>>,
    events: DashMap<String, Arc<EventSource>>,
    next_hook: AtomicU64,
}

impl ObjectNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a readable/writable property
    pub fn property(self, name: impl Into<String>, value: Value) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Declare an invocable operation
    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, GraphError> + Send + Sync + 'static,
    {
        self.operations.insert(name.into(), Box::new(f));
        self
    }

    /// Attach a nested node
    pub fn add_child(self, name: impl Into<String>, node: impl Addressable + 'static) -> Self {
        self.children.insert(name.into(), Arc::new(node));
        self
    }

    /// Attach an already shared nested node
    pub fn add_child_arc(self, name: impl Into<String>, node: Arc<dyn Addressable>) -> Self {
        self.children.insert(name.into(), node);
        self
    }

    /// Declare an event source
    pub fn event(self, name: impl Into<String>) -> Self {
        self.events.insert(name.into(), Arc::new(EventSource::default()));
        self
    }

    /// Emit an event to every hook attached to `name`, in attachment order.
    ///
    /// Emitting on an undeclared source is a no-op.
    pub fn emit(&self, name: &str, args: &[Value]) {
        let Some(source) = self.events.get(name).map(|s| Arc::clone(&s)) else {
            return;
        };
        let hooks: Vec<EventHook> = source
            .hooks
            .lock()
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        for hook in hooks {
            hook(args);
        }
    }
}

impl Addressable for ObjectNode {
    fn child(&self, segment: &str) -> Option<Arc<dyn Addressable>> {
        self.children.get(segment).map(|c| Arc::clone(&c))
    }

    fn read(&self, member: &str) -> Result<Value, GraphError> {
        self.properties
            .get(member)
            .map(|v| v.value().clone())
            .ok_or_else(|| GraphError::NoSuchMember(member.to_string()))
    }

    fn write(&self, member: &str, value: Value) -> Result<(), GraphError> {
        match self.properties.get_mut(member) {
            Some(mut slot) => {
                *slot = value;
                Ok(())
            }
            None if self.operations.contains_key(member) => {
                Err(GraphError::NotWritable(member.to_string()))
            }
            None => Err(GraphError::NoSuchMember(member.to_string())),
        }
    }

    fn invoke(&self, member: &str, args: Vec<Value>) -> Result<Value, GraphError> {
        match self.operations.get(member) {
            Some(op) => op(args),
            None if self.properties.contains_key(member) => {
                Err(GraphError::NotInvocable(member.to_string()))
            }
            None => Err(GraphError::NoSuchMember(member.to_string())),
        }
    }

    fn subscribe(&self, member: &str, hook: EventHook) -> Result<HookId, GraphError> {
        let source = self
            .events
            .get(member)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| GraphError::NoSuchEvent(member.to_string()))?;

        let id = HookId(self.next_hook.fetch_add(1, Ordering::Relaxed));
        source.hooks.lock().push((id, hook));
        Ok(id)
    }

    fn unsubscribe(&self, member: &str, hook: HookId) -> Result<(), GraphError> {
        let source = self
            .events
            .get(member)
            .map(|s| Arc::clone(&s))
            .ok_or_else(|| GraphError::NoSuchEvent(member.to_string()))?;

        source.hooks.lock().retain(|(id, _)| *id != hook);
        Ok(())
    }
}
