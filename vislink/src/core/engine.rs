//! Protocol engine
//!
//! One engine owns one transport for its lifetime. All protocol state (the
//! pending-request table, listener registrations, remote forwarding hooks)
//! lives inside a single task; the cloneable [`Link`] handle and the driver
//! feed it over channels, so inbound frames are handled to completion in
//! arrival order and no state needs locking.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use vislink_protocol::{Kind, Message, WireFrame, decode, encode, pack_args, unwrap_args};

use crate::core::config::LinkConfig;
use crate::core::correlator::{Continuation, Correlator};
use crate::core::error::LinkError;
use crate::core::handshake::{ConnectionNode, HELLO_OPERATION, Identity};
use crate::core::observability::{NoopTrace, TraceSink};
use crate::core::path::{self, CONNECTION_SEGMENT, Namespace, PathError, Resolved, split_namespace};
use crate::core::subscription::{ListenerId, RemoveOutcome, SubscriptionManager};
use crate::driver::{Driver, TransportEvent};
use crate::graph::{Addressable, EventHook};

enum Command {
    Request {
        kind: Kind,
        path: String,
        body: Option<Value>,
        reply: oneshot::Sender<Result<Option<Value>, LinkError>>,
    },
    Send {
        kind: Kind,
        path: String,
        body: Option<Value>,
    },
    AddListener {
        path: String,
        listener: crate::core::subscription::Listener,
        reply: oneshot::Sender<Result<ListenerId, LinkError>>,
    },
    RemoveListener {
        path: String,
        id: Option<ListenerId>,
        reply: oneshot::Sender<Result<(), LinkError>>,
    },
    PeerIdentity {
        reply: oneshot::Sender<Option<Identity>>,
    },
    Close,
}

/// Cloneable handle to a running [`Engine`].
///
/// Every method is a channel send into the engine task; once the transport
/// has closed they all return [`LinkError::Closed`].
#[derive(Clone)]
pub struct Link {
    cmd_tx: mpsc::Sender<Command>,
}

impl Link {
    async fn command(&self, cmd: Command) -> Result<(), LinkError> {
        self.cmd_tx.send(cmd).await.map_err(|_| LinkError::Closed)
    }

    /// Issue a request and wait for its correlated response.
    pub async fn request(
        &self,
        kind: Kind,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Request {
            kind,
            path: path.to_string(),
            body,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LinkError::Closed)?
    }

    /// Issue a fire-and-forget request; no id is assigned and no response
    /// will ever arrive.
    pub async fn send(&self, kind: Kind, path: &str, body: Option<Value>) -> Result<(), LinkError> {
        self.command(Command::Send {
            kind,
            path: path.to_string(),
            body,
        })
        .await
    }

    /// Read the member at `path` on the peer
    pub async fn get(&self, path: &str) -> Result<Value, LinkError> {
        Ok(self
            .request(Kind::Get, path, None)
            .await?
            .unwrap_or(Value::Null))
    }

    /// Write the member at `path` on the peer
    pub async fn put(&self, path: &str, value: Value) -> Result<(), LinkError> {
        self.request(Kind::Put, path, Some(value)).await?;
        Ok(())
    }

    /// Invoke the operation at `path` on the peer
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, LinkError> {
        Ok(self
            .request(Kind::Post, path, body)
            .await?
            .unwrap_or(Value::Null))
    }

    /// Attach a listener for remote events at `path`.
    ///
    /// The first listener on a path subscribes remotely and completes when
    /// the peer acknowledges; further listeners attach locally and complete
    /// at once.
    pub async fn add_listener<F>(&self, path: &str, listener: F) -> Result<ListenerId, LinkError>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.command(Command::AddListener {
            path: path.to_string(),
            listener: Arc::new(listener),
            reply,
        })
        .await?;
        rx.await.map_err(|_| LinkError::Closed)?
    }

    /// Detach one listener; the last one on a path unsubscribes remotely.
    pub async fn remove_listener(&self, path: &str, id: ListenerId) -> Result<(), LinkError> {
        self.remove(path, Some(id)).await
    }

    /// Detach every listener on a path and unsubscribe remotely.
    pub async fn remove_all_listeners(&self, path: &str) -> Result<(), LinkError> {
        self.remove(path, None).await
    }

    async fn remove(&self, path: &str, id: Option<ListenerId>) -> Result<(), LinkError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::RemoveListener {
            path: path.to_string(),
            id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LinkError::Closed)?
    }

    /// Exchange identities with the peer's handshake object.
    pub async fn hello(&self, identity: Identity) -> Result<Identity, LinkError> {
        let body = serde_json::to_value(&identity)?;
        let record = self
            .post(
                &format!("{}/{}", CONNECTION_SEGMENT, HELLO_OPERATION),
                Some(body),
            )
            .await?;
        Ok(serde_json::from_value(record)?)
    }

    /// Identity the peer announced to the local handshake object, if any
    pub async fn peer_identity(&self) -> Result<Option<Identity>, LinkError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::PeerIdentity { reply }).await?;
        rx.await.map_err(|_| LinkError::Closed)
    }

    /// Shut the engine down. Outstanding requests fail with
    /// [`LinkError::Closed`]; the handle is useless afterwards.
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }
}

/// The protocol engine task state.
pub struct Engine {
    root: Option<Arc<dyn Addressable>>,
    connection: Arc<ConnectionNode>,
    correlator: Correlator,
    subscriptions: SubscriptionManager,
    out_tx: mpsc::UnboundedSender<WireFrame>,
    trace: Arc<dyn TraceSink>,
}

impl Engine {
    /// Spawn an engine over `driver`, exposing `root` (if any) to the peer.
    pub fn spawn<D: Driver>(
        config: LinkConfig,
        root: Option<Arc<dyn Addressable>>,
        driver: D,
    ) -> Link {
        Self::spawn_with_trace(config, root, driver, Arc::new(NoopTrace))
    }

    /// [`Engine::spawn`] with a debug trace sink attached.
    pub fn spawn_with_trace<D: Driver>(
        config: LinkConfig,
        root: Option<Arc<dyn Addressable>>,
        driver: D,
        trace: Arc<dyn TraceSink>,
    ) -> Link {
        let capacity = config.channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (out_tx, outbound_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(ConnectionNode::new(config.identity()));
        let engine = Engine {
            root,
            connection,
            correlator: Correlator::new(out_tx.clone(), Arc::clone(&trace)),
            subscriptions: SubscriptionManager::new(),
            out_tx,
            trace,
        };

        tokio::spawn(async move {
            if let Err(e) = Box::new(driver).run(inbound_tx, outbound_rx).await {
                error!("driver error: {}", e);
            }
        });
        tokio::spawn(engine.run(cmd_rx, inbound_rx));

        Link { cmd_tx }
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut inbound_rx: mpsc::Receiver<TransportEvent>,
    ) {
        loop {
            tokio::select! {
                event = inbound_rx.recv() => match event {
                    Some(TransportEvent::Opened) => {
                        debug!("transport opened");
                        self.trace.lifecycle("opened");
                    }
                    Some(TransportEvent::Frame(frame)) => self.handle_frame(frame),
                    Some(TransportEvent::Errored(reason)) => {
                        warn!("transport failed: {}", reason);
                        self.trace.lifecycle("errored");
                        break;
                    }
                    Some(TransportEvent::Closed) | None => {
                        debug!("transport closed");
                        self.trace.lifecycle("closed");
                        break;
                    }
                },
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd) {
                            self.trace.lifecycle("close requested");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.teardown();
    }

    fn teardown(&mut self) {
        self.correlator.fail_all();
        self.subscriptions.clear();
        self.trace.lifecycle("engine stopped");
    }

    /// Returns true when the engine should shut down.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Request {
                kind,
                path,
                body,
                reply,
            } => {
                self.correlator
                    .call(kind, &path, body, Some(Continuation::Reply(reply)));
                false
            }
            Command::Send { kind, path, body } => {
                self.correlator.call(kind, &path, body, None);
                false
            }
            Command::AddListener {
                path,
                listener,
                reply,
            } => {
                let (id, first) = self.subscriptions.add_local(&path, listener);
                if first {
                    self.correlator.call(
                        Kind::Listen,
                        &path,
                        None,
                        Some(Continuation::ListenerAck {
                            reply,
                            listener: id,
                        }),
                    );
                } else {
                    let _ = reply.send(Ok(id));
                }
                false
            }
            Command::RemoveListener { path, id, reply } => {
                match self.subscriptions.remove_local(&path, id) {
                    RemoveOutcome::Emptied => {
                        self.correlator.call(
                            Kind::Unlisten,
                            &path,
                            None,
                            Some(Continuation::UnlistenAck(reply)),
                        );
                    }
                    RemoveOutcome::Kept | RemoveOutcome::NotRegistered => {
                        let _ = reply.send(Ok(()));
                    }
                }
                false
            }
            Command::PeerIdentity { reply } => {
                let _ = reply.send(self.connection.peer());
                false
            }
            Command::Close => true,
        }
    }

    fn handle_frame(&mut self, frame: WireFrame) {
        match frame {
            WireFrame::Binary(data) => {
                debug!("rejecting binary frame of {} bytes", data.len());
                self.trace.lifecycle("binary frame rejected");
                self.correlator.send_frame(WireFrame::sentinel());
            }
            WireFrame::Text(text) => {
                self.trace.frame_in(&text);
                match decode(&text) {
                    Ok(msg) => self.dispatch(msg),
                    Err(e) => warn!("failed to parse frame: {}, raw: {}", e, text),
                }
            }
        }
    }

    fn dispatch(&mut self, msg: Message) {
        match msg.kind {
            Kind::Resp => match msg.id {
                Some(id) => self.correlator.resolve(id, msg.body, msg.error),
                None => warn!("resp frame without id, dropping"),
            },
            Kind::Event => self.handle_event(msg.id, msg.path, msg.body),
            Kind::Unknown => match msg.id {
                Some(id) => self.respond_error(
                    id,
                    &LinkError::Protocol("unknown message kind".to_string()),
                ),
                None => debug!("ignoring frame with unknown kind and no id"),
            },
            kind => {
                let result = self.handle_request(kind, msg.path.as_deref(), msg.body);
                match (msg.id, result) {
                    (Some(id), Ok(body)) => {
                        if let Err(e) = self.correlator.send(&Message::resp(id, body)) {
                            warn!("failed to send response: {}", e);
                        }
                    }
                    (Some(id), Err(e)) => self.respond_error(id, &e),
                    (None, Err(e)) => debug!("fire-and-forget {:?} failed: {}", kind, e),
                    (None, Ok(_)) => {}
                }
            }
        }
    }

    fn handle_request(
        &mut self,
        kind: Kind,
        path: Option<&str>,
        body: Option<Value>,
    ) -> Result<Option<Value>, LinkError> {
        let path = path.ok_or_else(|| LinkError::Protocol("request without a path".to_string()))?;

        match kind {
            Kind::Get => {
                let resolved = self.resolve_path(path)?;
                Ok(Some(resolved.node.read(&resolved.member)?))
            }
            Kind::Put => {
                let resolved = self.resolve_path(path)?;
                resolved
                    .node
                    .write(&resolved.member, body.unwrap_or(Value::Null))?;
                Ok(None)
            }
            Kind::Post => {
                let resolved = self.resolve_path(path)?;
                let returned = resolved.node.invoke(&resolved.member, unwrap_args(body))?;
                Ok((!returned.is_null()).then_some(returned))
            }
            Kind::Listen => {
                self.handle_listen(path)?;
                Ok(None)
            }
            Kind::Unlisten => {
                self.subscriptions.remove_remote(path);
                Ok(None)
            }
            Kind::Resp | Kind::Event | Kind::Unknown => Err(LinkError::Protocol(format!(
                "{:?} is not a request kind",
                kind
            ))),
        }
    }

    fn handle_event(&mut self, id: Option<u32>, path: Option<String>, body: Option<Value>) {
        let Some(path) = path else {
            match id {
                Some(id) => self.respond_error(
                    id,
                    &LinkError::Protocol("event without a path".to_string()),
                ),
                None => debug!("ignoring event frame without a path"),
            }
            return;
        };

        let args = unwrap_args(body);
        self.subscriptions.dispatch_local(&path, &args);

        // an event carrying an id asks for an empty acknowledgement
        if let Some(id) = id {
            if let Err(e) = self.correlator.send(&Message::resp(id, None)) {
                warn!("failed to acknowledge event: {}", e);
            }
        }
    }

    /// Install the forwarding hook for an inbound `listen`.
    fn handle_listen(&mut self, path: &str) -> Result<(), LinkError> {
        let resolved = self.resolve_path(path)?;

        let out = self.out_tx.clone();
        let trace = Arc::clone(&self.trace);
        let event_path = path.to_string();
        let hook: EventHook = Arc::new(move |args| {
            let msg = Message::event(event_path.clone(), pack_args(args.to_vec()));
            match encode(&msg) {
                Ok(text) => {
                    trace.frame_out(&text);
                    let _ = out.send(WireFrame::Text(text));
                }
                Err(e) => warn!("failed to encode event for `{}`: {}", event_path, e),
            }
        });

        self.subscriptions
            .add_remote(path, resolved.node, &resolved.member, hook)?;
        Ok(())
    }

    fn respond_error(&mut self, id: u32, err: &LinkError) {
        let msg = Message::error(id, err.wire_code(), err.to_string());
        if let Err(e) = self.correlator.send(&msg) {
            warn!("failed to send error response: {}", e);
        }
    }

    fn resolve_path(&self, path: &str) -> Result<Resolved, LinkError> {
        let (namespace, rest) = split_namespace(path);
        let root = match namespace {
            Namespace::Connection => Arc::clone(&self.connection) as Arc<dyn Addressable>,
            Namespace::Application => self
                .root
                .clone()
                .ok_or(PathError::NoRoot("application"))?,
        };
        Ok(path::resolve(root, rest)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;
    use vislink_protocol::codes;

    use super::*;
    use crate::driver::{MockDriver, MockRemote};
    use crate::graph::ObjectNode;

    fn start(root: Option<Arc<dyn Addressable>>) -> (Link, MockRemote) {
        let (driver, remote) = MockDriver::new();
        let link = Engine::spawn(LinkConfig::default(), root, driver);
        (link, remote)
    }

    fn sample_root() -> Arc<ObjectNode> {
        Arc::new(
            ObjectNode::new()
                .property("state", json!("Idle"))
                .property("mode", json!(false))
                .method("count_args", |args| Ok(json!(args.len()))),
        )
    }

    async fn next_msg(remote: &mut MockRemote) -> Message {
        match remote.next_frame().await.expect("engine sent no frame") {
            WireFrame::Text(text) => decode(&text).expect("engine sent unparseable frame"),
            WireFrame::Binary(data) => panic!("unexpected binary frame: {:?}", data),
        }
    }

    #[tokio::test]
    async fn serves_get() {
        let (_link, mut remote) = start(Some(sample_root()));

        remote.inject_text(r#"{"kind":"get","id":1,"path":"state"}"#);
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.kind, Kind::Resp);
        assert_eq!(msg.id, Some(1));
        assert_eq!(msg.body, Some(json!("Idle")));
        assert!(msg.error.is_none());
    }

    #[tokio::test]
    async fn serves_put_and_subsequent_get() {
        let (_link, mut remote) = start(Some(sample_root()));

        remote.inject_text(r#"{"kind":"put","id":2,"path":"mode","body":true}"#);
        let ack = next_msg(&mut remote).await;
        assert_eq!(ack.id, Some(2));
        assert!(ack.body.is_none());
        assert!(ack.error.is_none());

        remote.inject_text(r#"{"kind":"get","id":3,"path":"mode"}"#);
        let read = next_msg(&mut remote).await;
        assert_eq!(read.body, Some(json!(true)));
    }

    #[tokio::test]
    async fn post_unwraps_positional_args() {
        let (_link, mut remote) = start(Some(sample_root()));

        remote.inject_text(r#"{"kind":"post","id":4,"path":"count_args","body":[1,2]}"#);
        assert_eq!(next_msg(&mut remote).await.body, Some(json!(2)));

        remote.inject_text(r#"{"kind":"post","id":5,"path":"count_args","body":{"x":1}}"#);
        assert_eq!(next_msg(&mut remote).await.body, Some(json!(1)));

        remote.inject_text(r#"{"kind":"post","id":6,"path":"count_args"}"#);
        assert_eq!(next_msg(&mut remote).await.body, Some(json!(0)));
    }

    #[tokio::test]
    async fn binary_frame_elicits_only_the_sentinel() {
        let (_link, mut remote) = start(Some(sample_root()));

        remote.inject(TransportEvent::Frame(WireFrame::Binary(vec![1, 2, 3])));
        remote.inject_text(r#"{"kind":"get","id":1,"path":"state"}"#);

        assert_eq!(
            remote.next_frame().await,
            Some(WireFrame::Binary(vec![0x00, 0x00, 0xE0, 0x80]))
        );
        // the very next frame answers the get, so the binary frame produced
        // nothing besides the sentinel
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.id, Some(1));
    }

    #[tokio::test]
    async fn failures_become_error_responses() {
        let (_link, mut remote) = start(Some(sample_root()));

        remote.inject_text(r#"{"kind":"get","id":7,"path":"camera/gain"}"#);
        let missing = next_msg(&mut remote).await;
        assert_eq!(missing.id, Some(7));
        assert_eq!(missing.error, Some(codes::NOT_FOUND));
        assert!(missing.body.as_ref().is_some_and(|b| b.is_string()));

        remote.inject_text(r#"{"kind":"post","id":8,"path":"state"}"#);
        let not_invocable = next_msg(&mut remote).await;
        assert_eq!(not_invocable.error, Some(codes::INTERNAL_ERROR));
    }

    #[tokio::test]
    async fn unknown_kind_is_a_protocol_violation() {
        let (_link, mut remote) = start(Some(sample_root()));

        remote.inject_text(r#"{"kind":"observe","id":9,"path":"state"}"#);
        let violation = next_msg(&mut remote).await;
        assert_eq!(violation.id, Some(9));
        assert_eq!(violation.error, Some(codes::INVALID_REQUEST));

        // without an id the frame is dropped silently; the next frame out
        // answers the follow-up get
        remote.inject_text(r#"{"kind":"observe","path":"state"}"#);
        remote.inject_text(r#"{"kind":"get","id":10,"path":"state"}"#);
        assert_eq!(next_msg(&mut remote).await.id, Some(10));
    }

    #[tokio::test]
    async fn no_application_root_is_a_resolution_error() {
        let (_link, mut remote) = start(None);

        remote.inject_text(r#"{"kind":"get","id":1,"path":"state"}"#);
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.error, Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn requests_are_matched_by_id_not_arrival_order() {
        let (link, mut remote) = start(None);

        let first = {
            let link = link.clone();
            tokio::spawn(async move { link.get("alpha").await })
        };
        let alpha = next_msg(&mut remote).await;
        assert_eq!(alpha.kind, Kind::Get);
        assert_eq!(alpha.id, Some(1));

        let second = {
            let link = link.clone();
            tokio::spawn(async move { link.get("beta").await })
        };
        let beta = next_msg(&mut remote).await;
        assert_eq!(beta.id, Some(2));

        // respond out of order
        remote.inject_text(r#"{"kind":"resp","id":2,"body":"B"}"#);
        remote.inject_text(r#"{"kind":"resp","id":1,"body":"A"}"#);

        assert_eq!(first.await.unwrap().unwrap(), json!("A"));
        assert_eq!(second.await.unwrap().unwrap(), json!("B"));
    }

    #[tokio::test]
    async fn unknown_resp_id_leaves_pending_requests_intact() {
        let (link, mut remote) = start(None);

        let pending = {
            let link = link.clone();
            tokio::spawn(async move { link.get("alpha").await })
        };
        next_msg(&mut remote).await;

        remote.inject_text(r#"{"kind":"resp","id":99,"body":"stray"}"#);
        remote.inject_text(r#"{"kind":"resp","id":1,"body":"ok"}"#);

        assert_eq!(pending.await.unwrap().unwrap(), json!("ok"));
    }

    #[tokio::test]
    async fn listener_lifecycle_sends_one_listen_and_one_unlisten() {
        let (link, mut remote) = start(None);

        let pending = {
            let link = link.clone();
            tokio::spawn(async move { link.add_listener("sensor/changed", |_| {}).await })
        };
        let listen = next_msg(&mut remote).await;
        assert_eq!(listen.kind, Kind::Listen);
        assert_eq!(listen.path.as_deref(), Some("sensor/changed"));
        let listen_id = listen.id.expect("listen should expect a response");

        remote.inject_text(format!(r#"{{"kind":"resp","id":{}}}"#, listen_id));
        let first = pending.await.unwrap().unwrap();

        // further listeners are local fan-out only
        let second = link.add_listener("sensor/changed", |_| {}).await.unwrap();
        let third = link.add_listener("sensor/changed", |_| {}).await.unwrap();

        link.remove_listener("sensor/changed", second).await.unwrap();
        link.remove_listener("sensor/changed", third).await.unwrap();
        assert!(remote.drain().is_empty());

        // removing the last one tears the remote subscription down
        let done = {
            let link = link.clone();
            tokio::spawn(async move { link.remove_listener("sensor/changed", first).await })
        };
        let unlisten = next_msg(&mut remote).await;
        assert_eq!(unlisten.kind, Kind::Unlisten);
        let unlisten_id = unlisten.id.expect("unlisten should expect a response");

        remote.inject_text(format!(r#"{{"kind":"resp","id":{}}}"#, unlisten_id));
        done.await.unwrap().unwrap();
        assert!(remote.drain().is_empty());
    }

    #[tokio::test]
    async fn inbound_events_fan_out_and_acknowledge() {
        let (link, mut remote) = start(None);
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();

        let pending = {
            let link = link.clone();
            tokio::spawn(async move {
                link.add_listener("sensor/changed", move |args| {
                    let _ = seen_tx.send(args.to_vec());
                })
                .await
            })
        };
        let listen = next_msg(&mut remote).await;
        remote.inject_text(format!(r#"{{"kind":"resp","id":{}}}"#, listen.id.unwrap()));
        pending.await.unwrap().unwrap();

        remote.inject_text(r#"{"kind":"event","path":"sensor/changed","body":{"v":5}}"#);
        assert_eq!(seen_rx.recv().await.unwrap(), vec![json!({"v":5})]);

        // an event carrying an id gets an empty acknowledgement
        remote.inject_text(r#"{"kind":"event","path":"sensor/changed","body":7,"id":40}"#);
        assert_eq!(seen_rx.recv().await.unwrap(), vec![json!(7)]);
        let ack = next_msg(&mut remote).await;
        assert_eq!(ack.kind, Kind::Resp);
        assert_eq!(ack.id, Some(40));
        assert!(ack.body.is_none());
    }

    #[tokio::test]
    async fn remote_listen_forwards_local_emissions() {
        let sensor = Arc::new(ObjectNode::new().event("changed"));
        let root = Arc::new(
            ObjectNode::new()
                .property("state", json!("Idle"))
                .add_child_arc("sensor", Arc::clone(&sensor) as Arc<dyn Addressable>),
        );
        let (_link, mut remote) = start(Some(root));

        remote.inject_text(r#"{"kind":"listen","id":5,"path":"sensor/changed"}"#);
        let ack = next_msg(&mut remote).await;
        assert_eq!(ack.id, Some(5));
        assert!(ack.error.is_none());

        sensor.emit("changed", &[json!({"v":5})]);
        let event = next_msg(&mut remote).await;
        assert_eq!(event.kind, Kind::Event);
        assert_eq!(event.path.as_deref(), Some("sensor/changed"));
        assert_eq!(event.body, Some(json!({"v":5})));
        assert!(event.id.is_none());

        // a duplicate listen installs nothing: one emission, one frame
        remote.inject_text(r#"{"kind":"listen","id":6,"path":"sensor/changed"}"#);
        assert_eq!(next_msg(&mut remote).await.id, Some(6));
        sensor.emit("changed", &[json!(1)]);
        assert_eq!(next_msg(&mut remote).await.kind, Kind::Event);

        // after unlisten, emissions stay local
        remote.inject_text(r#"{"kind":"unlisten","id":7,"path":"sensor/changed"}"#);
        assert_eq!(next_msg(&mut remote).await.id, Some(7));
        sensor.emit("changed", &[json!(2)]);
        remote.inject_text(r#"{"kind":"get","id":8,"path":"state"}"#);
        assert_eq!(next_msg(&mut remote).await.id, Some(8));
    }

    #[tokio::test]
    async fn listen_for_missing_event_source_fails() {
        let sensor = Arc::new(ObjectNode::new().event("changed"));
        let root = Arc::new(
            ObjectNode::new().add_child_arc("sensor", Arc::clone(&sensor) as Arc<dyn Addressable>),
        );
        let (_link, mut remote) = start(Some(root));

        remote.inject_text(r#"{"kind":"listen","id":9,"path":"sensor/missing"}"#);
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.error, Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn transport_close_fails_pending_requests() {
        let (link, mut remote) = start(None);

        let pending = {
            let link = link.clone();
            tokio::spawn(async move { link.get("alpha").await })
        };
        next_msg(&mut remote).await;

        remote.inject(TransportEvent::Closed);
        assert!(matches!(pending.await.unwrap(), Err(LinkError::Closed)));

        // the engine is gone; the handle reports closed from now on
        assert!(matches!(link.get("beta").await, Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn handshake_over_the_wire() {
        let (link, mut remote) = start(None);

        remote.inject_text(
            r#"{"kind":"post","id":3,"path":"$connection/hello","body":{"name":"sensor-42","version":"2.1.0"}}"#,
        );
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.id, Some(3));
        assert!(msg.error.is_none());
        let record = msg.body.expect("hello returns the local record");
        assert_eq!(record["name"], json!("vislink"));
        assert!(record["protocol"].is_string());

        let peer = link.peer_identity().await.unwrap().unwrap();
        assert_eq!(peer.name, "sensor-42");
    }

    #[tokio::test]
    async fn connection_object_rejects_other_access() {
        let (_link, mut remote) = start(None);

        remote.inject_text(r#"{"kind":"put","id":4,"path":"$connection/name","body":"x"}"#);
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.error, Some(codes::INTERNAL_ERROR));
    }

    #[tokio::test]
    async fn hello_roundtrip_decodes_peer_record() {
        let (link, mut remote) = start(None);

        let pending = {
            let link = link.clone();
            tokio::spawn(async move { link.hello(Identity::new("inspection-host", "1.0")).await })
        };
        let msg = next_msg(&mut remote).await;
        assert_eq!(msg.kind, Kind::Post);
        assert_eq!(msg.path.as_deref(), Some("$connection/hello"));
        assert_eq!(
            msg.body,
            Some(json!({"name": "inspection-host", "version": "1.0"}))
        );

        remote.inject_text(format!(
            r#"{{"kind":"resp","id":{},"body":{{"name":"sensor-42","version":"2.1.0","protocol":"1.0.0"}}}}"#,
            msg.id.unwrap()
        ));
        let peer = pending.await.unwrap().unwrap();
        assert_eq!(peer.name, "sensor-42");
        assert_eq!(peer.version, "2.1.0");
    }
}
