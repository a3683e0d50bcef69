#![forbid(unsafe_code)]

//! Transport drivers
//!
//! A driver owns one duplex channel to the peer and nothing else: no
//! protocol parsing, no reconnection policy. It reports what happens on the
//! wire as [`TransportEvent`]s and drains the engine's outbound frame queue.

pub mod mock;
pub mod wsclient;

use tokio::sync::mpsc;
use vislink_protocol::WireFrame;

pub use mock::{MockDriver, MockRemote};
pub use wsclient::WsClientDriver;

/// Lifecycle and traffic events reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The channel is open and frames may flow
    Opened,
    /// The channel is closed; terminal for the engine
    Closed,
    /// The channel failed; terminal for the engine
    Errored(String),
    /// One inbound frame
    Frame(WireFrame),
}

/// Transport layer abstraction.
///
/// Implementors are responsible for channel lifecycle and raw frame I/O
/// only. The outbound side is unbounded so that enqueueing a frame never
/// blocks the caller.
#[async_trait::async_trait]
pub trait Driver: Send + Sync + 'static {
    async fn run(
        self: Box<Self>,
        inbound_tx: mpsc::Sender<TransportEvent>,
        outbound_rx: mpsc::UnboundedReceiver<WireFrame>,
    ) -> anyhow::Result<()>;
}
