//! Event subscription management
//!
//! Two halves share one invariant: at most one registration per path.
//!
//! Local half: listeners attached by the embedding application. The first
//! listener on a path triggers one remote `listen`; the last removal
//! triggers one `unlisten`; everything in between is local fan-out only.
//!
//! Remote half: forwarding hooks installed on the local graph for paths the
//! peer has subscribed to; one hook per path no matter how often the peer
//! asks.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::graph::{Addressable, EventHook, GraphError, HookId};

/// Local callback invoked with an inbound event's positional arguments.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Identifies one local listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Outcome of removing local listeners from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoveOutcome {
    /// Nothing was registered for the path
    NotRegistered,
    /// Listeners remain; no remote traffic needed
    Kept,
    /// The registration emptied; a remote `unlisten` is due
    Emptied,
}

/// Forwarding hook installed for a remote subscriber.
struct EventSender {
    node: Arc<dyn Addressable>,
    member: String,
    hook: HookId,
}

pub(crate) struct SubscriptionManager {
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    next_listener: u64,
    senders: HashMap<String, EventSender>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_listener: 1,
            senders: HashMap::new(),
        }
    }

    /// Register a local listener. Returns its id and whether this was the
    /// first listener on the path (meaning a remote `listen` is due).
    pub fn add_local(&mut self, path: &str, listener: Listener) -> (ListenerId, bool) {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;

        match self.listeners.entry(path.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().push((id, listener));
                (id, false)
            }
            Entry::Vacant(entry) => {
                entry.insert(vec![(id, listener)]);
                (id, true)
            }
        }
    }

    /// Remove one local listener by id, or all listeners when `id` is None.
    pub fn remove_local(&mut self, path: &str, id: Option<ListenerId>) -> RemoveOutcome {
        let Entry::Occupied(mut entry) = self.listeners.entry(path.to_string()) else {
            return RemoveOutcome::NotRegistered;
        };

        match id {
            Some(id) => entry.get_mut().retain(|(lid, _)| *lid != id),
            None => entry.get_mut().clear(),
        }

        if entry.get().is_empty() {
            entry.remove();
            RemoveOutcome::Emptied
        } else {
            RemoveOutcome::Kept
        }
    }

    /// Fan an inbound event out to the path's local listeners, in
    /// registration order.
    pub fn dispatch_local(&self, path: &str, args: &[Value]) {
        match self.listeners.get(path) {
            Some(list) => {
                for (_, listener) in list {
                    listener(args);
                }
            }
            None => debug!("event for `{}` has no local listeners", path),
        }
    }

    /// Install a forwarding hook for a remote `listen`. A path already being
    /// forwarded installs nothing.
    pub fn add_remote(
        &mut self,
        path: &str,
        node: Arc<dyn Addressable>,
        member: &str,
        hook: EventHook,
    ) -> Result<(), GraphError> {
        if self.senders.contains_key(path) {
            debug!("remote already subscribed to `{}`", path);
            return Ok(());
        }

        let hook_id = node.subscribe(member, hook)?;
        self.senders.insert(
            path.to_string(),
            EventSender {
                node,
                member: member.to_string(),
                hook: hook_id,
            },
        );
        Ok(())
    }

    /// Tear down the forwarding hook for a remote `unlisten`.
    pub fn remove_remote(&mut self, path: &str) {
        if let Some(sender) = self.senders.remove(path) {
            let _ = sender.node.unsubscribe(&sender.member, sender.hook);
        }
    }

    /// Detach every forwarding hook and drop all listener state.
    pub fn clear(&mut self) {
        for (_, sender) in self.senders.drain() {
            let _ = sender.node.unsubscribe(&sender.member, sender.hook);
        }
        self.listeners.clear();
    }

    #[cfg(test)]
    pub fn has_remote(&self, path: &str) -> bool {
        self.senders.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::graph::ObjectNode;

    fn noop() -> Listener {
        Arc::new(|_| {})
    }

    #[test]
    fn first_add_and_last_remove_are_the_only_edges() {
        let mut m = SubscriptionManager::new();

        let (a, first_a) = m.add_local("sensor/changed", noop());
        let (b, first_b) = m.add_local("sensor/changed", noop());
        assert!(first_a);
        assert!(!first_b);

        assert_eq!(m.remove_local("sensor/changed", Some(a)), RemoveOutcome::Kept);
        assert_eq!(
            m.remove_local("sensor/changed", Some(b)),
            RemoveOutcome::Emptied
        );
        assert_eq!(
            m.remove_local("sensor/changed", Some(b)),
            RemoveOutcome::NotRegistered
        );
    }

    #[test]
    fn remove_without_id_clears_the_path() {
        let mut m = SubscriptionManager::new();
        m.add_local("p", noop());
        m.add_local("p", noop());
        assert_eq!(m.remove_local("p", None), RemoveOutcome::Emptied);
    }

    #[test]
    fn dispatch_reaches_every_listener_in_order() {
        let mut m = SubscriptionManager::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let order = Arc::clone(&order);
            m.add_local(
                "p",
                Arc::new(move |args: &[Value]| {
                    order.lock().push((tag, args.to_vec()));
                }),
            );
        }

        m.dispatch_local("p", &[json!(5)]);
        let seen = order.lock().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "a");
        assert_eq!(seen[1].0, "b");
        assert_eq!(seen[0].1, vec![json!(5)]);
    }

    #[test]
    fn remote_subscription_is_deduplicated() {
        let mut m = SubscriptionManager::new();
        let node: Arc<ObjectNode> = Arc::new(ObjectNode::new().event("changed"));
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = Arc::clone(&fired);
            m.add_remote(
                "changed",
                Arc::clone(&node) as Arc<dyn Addressable>,
                "changed",
                Arc::new(move |_| {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        }

        node.emit("changed", &[]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        m.remove_remote("changed");
        node.emit("changed", &[]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_detaches_remote_hooks() {
        let mut m = SubscriptionManager::new();
        let node: Arc<ObjectNode> = Arc::new(ObjectNode::new().event("changed"));
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        m.add_remote(
            "changed",
            Arc::clone(&node) as Arc<dyn Addressable>,
            "changed",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        m.clear();
        assert!(!m.has_remote("changed"));
        node.emit("changed", &[]);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
