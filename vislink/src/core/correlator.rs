//! Request/response correlation
//!
//! Outbound requests that expect a response get a correlation id and a
//! pending-table entry; inbound responses are matched back by id, in any
//! arrival order. All outbound traffic funnels through here so that every
//! frame passes the trace sink exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use vislink_protocol::{Kind, Message, WireFrame, encode};

use crate::core::error::LinkError;
use crate::core::observability::TraceSink;
use crate::core::subscription::ListenerId;

/// Ids are positive 31-bit integers; 0 means "no response expected" and is
/// never assigned.
const MAX_ID: u32 = i32::MAX as u32;

/// What to do when a pending request completes.
pub(crate) enum Continuation {
    /// Deliver the response body (or error) to a plain caller
    Reply(oneshot::Sender<Result<Option<Value>, LinkError>>),
    /// Acknowledge a deferred `add_listener` with its registration id
    ListenerAck {
        reply: oneshot::Sender<Result<ListenerId, LinkError>>,
        listener: ListenerId,
    },
    /// Acknowledge a deferred `remove_listener`
    UnlistenAck(oneshot::Sender<Result<(), LinkError>>),
}

impl Continuation {
    fn complete(self, result: Result<Option<Value>, LinkError>) {
        match self {
            Continuation::Reply(tx) => {
                let _ = tx.send(result);
            }
            Continuation::ListenerAck { reply, listener } => {
                let _ = reply.send(result.map(|_| listener));
            }
            Continuation::UnlistenAck(tx) => {
                let _ = tx.send(result.map(|_| ()));
            }
        }
    }
}

pub(crate) struct Correlator {
    next_id: u32,
    pending: HashMap<u32, Continuation>,
    out: mpsc::UnboundedSender<WireFrame>,
    trace: Arc<dyn TraceSink>,
}

impl Correlator {
    pub fn new(out: mpsc::UnboundedSender<WireFrame>, trace: Arc<dyn TraceSink>) -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
            out,
            trace,
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = if id >= MAX_ID { 1 } else { id + 1 };
        id
    }

    /// Send a request. An id is allocated (and a pending entry registered)
    /// only when a continuation expects a response; fire-and-forget requests
    /// carry no id.
    pub fn call(
        &mut self,
        kind: Kind,
        path: &str,
        body: Option<Value>,
        continuation: Option<Continuation>,
    ) -> Option<u32> {
        let id = continuation.as_ref().map(|_| self.allocate());
        let msg = Message::request(kind, id, path, body);

        match self.send(&msg) {
            Ok(()) => {
                if let (Some(id), Some(continuation)) = (id, continuation) {
                    self.pending.insert(id, continuation);
                }
                id
            }
            Err(e) => {
                if let Some(continuation) = continuation {
                    continuation.complete(Err(e));
                }
                None
            }
        }
    }

    /// Serialize a message and enqueue it on the transport
    pub fn send(&self, msg: &Message) -> Result<(), LinkError> {
        let text = encode(msg)?;
        self.trace.frame_out(&text);
        self.out
            .send(WireFrame::Text(text))
            .map_err(|_| LinkError::Closed)
    }

    /// Enqueue a raw frame (the binary-rejection sentinel)
    pub fn send_frame(&self, frame: WireFrame) {
        let _ = self.out.send(frame);
    }

    /// Match an inbound response to its pending request. Unknown ids are
    /// logged and dropped; they are not a protocol failure.
    pub fn resolve(&mut self, id: u32, body: Option<Value>, error: Option<i64>) {
        let Some(continuation) = self.pending.remove(&id) else {
            warn!("response for unknown id {}, dropping", id);
            return;
        };

        let result = match error {
            Some(code) => {
                let message = match body {
                    Some(Value::String(text)) => text,
                    Some(other) => other.to_string(),
                    None => code.to_string(),
                };
                Err(LinkError::Remote { code, message })
            }
            None => Ok(body),
        };

        continuation.complete(result);
    }

    /// Fail every outstanding request; used when the transport closes.
    pub fn fail_all(&mut self) {
        if !self.pending.is_empty() {
            debug!("failing {} outstanding requests", self.pending.len());
        }
        for (_, continuation) in self.pending.drain() {
            continuation.complete(Err(LinkError::Closed));
        }
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
