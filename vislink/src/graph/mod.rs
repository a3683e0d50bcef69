//! Addressable object graph
//!
//! The protocol addresses members of a data graph with slash-delimited
//! paths. This module defines the capability seam the engine resolves
//! against: anything [`Addressable`] can expose readable/writable members,
//! invocable operations and event sources, and can nest further nodes.

pub mod object;

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

pub use object::ObjectNode;

/// Failure while operating on a graph member.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no such member `{0}`")]
    NoSuchMember(String),
    #[error("member `{0}` is not writable")]
    NotWritable(String),
    #[error("member `{0}` is not invocable")]
    NotInvocable(String),
    #[error("no event source `{0}`")]
    NoSuchEvent(String),
    #[error("`{member}` failed: {reason}")]
    Invocation { member: String, reason: String },
    #[error("access to `{0}` is not permitted")]
    Forbidden(String),
}

impl GraphError {
    /// Failure raised from inside a user-supplied operation
    pub fn invocation(member: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        GraphError::Invocation {
            member: member.into(),
            reason: reason.to_string(),
        }
    }
}

/// Identifies one attached event hook, for detaching it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// An event hook receives the emission's positional arguments.
pub type EventHook = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// A node of the addressable data graph.
///
/// The engine only ever sees this trait; concrete applications either build
/// their graph from [`ObjectNode`] or implement it directly over their own
/// state.
pub trait Addressable: Send + Sync {
    /// Nested node for one path segment, if any
    fn child(&self, segment: &str) -> Option<Arc<dyn Addressable>>;

    /// Read a member's value
    fn read(&self, member: &str) -> Result<Value, GraphError>;

    /// Replace a member's value
    fn write(&self, member: &str, value: Value) -> Result<(), GraphError>;

    /// Invoke a member as an operation with positional arguments
    fn invoke(&self, member: &str, args: Vec<Value>) -> Result<Value, GraphError>;

    /// Attach a hook to a member's event source
    fn subscribe(&self, member: &str, hook: EventHook) -> Result<HookId, GraphError>;

    /// Detach a previously attached hook
    fn unsubscribe(&self, member: &str, hook: HookId) -> Result<(), GraphError>;
}
