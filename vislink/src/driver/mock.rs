use tokio::sync::mpsc;
use vislink_protocol::WireFrame;

use crate::driver::{Driver, TransportEvent};

/// In-memory driver for tests.
///
/// The paired [`MockRemote`] plays the peer: it injects inbound transport
/// events and observes every frame the engine sends.
pub struct MockDriver {
    inject_rx: mpsc::UnboundedReceiver<TransportEvent>,
    frames_tx: mpsc::UnboundedSender<WireFrame>,
}

/// Test-side handle to a [`MockDriver`].
pub struct MockRemote {
    inject_tx: mpsc::UnboundedSender<TransportEvent>,
    frames_rx: mpsc::UnboundedReceiver<WireFrame>,
}

impl MockDriver {
    pub fn new() -> (Self, MockRemote) {
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        (
            Self {
                inject_rx,
                frames_tx,
            },
            MockRemote {
                inject_tx,
                frames_rx,
            },
        )
    }
}

impl MockRemote {
    /// Push a raw transport event at the engine
    pub fn inject(&self, event: TransportEvent) {
        let _ = self.inject_tx.send(event);
    }

    /// Push one inbound text frame at the engine
    pub fn inject_text(&self, text: impl Into<String>) {
        self.inject(TransportEvent::Frame(WireFrame::Text(text.into())));
    }

    /// Wait for the next frame the engine sent
    pub async fn next_frame(&mut self) -> Option<WireFrame> {
        self.frames_rx.recv().await
    }

    /// Drain whatever frames have been sent so far without waiting
    pub fn drain(&mut self) -> Vec<WireFrame> {
        let mut out = Vec::new();
        while let Ok(frame) = self.frames_rx.try_recv() {
            out.push(frame);
        }
        out
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn run(
        mut self: Box<Self>,
        inbound_tx: mpsc::Sender<TransportEvent>,
        mut outbound_rx: mpsc::UnboundedReceiver<WireFrame>,
    ) -> anyhow::Result<()> {
        if inbound_tx.send(TransportEvent::Opened).await.is_err() {
            return Ok(());
        }

        loop {
            tokio::select! {
                event = self.inject_rx.recv() => {
                    match event {
                        Some(event) => {
                            let terminal = matches!(
                                event,
                                TransportEvent::Closed | TransportEvent::Errored(_)
                            );
                            if inbound_tx.send(event).await.is_err() || terminal {
                                return Ok(());
                            }
                        }
                        None => {
                            let _ = inbound_tx.send(TransportEvent::Closed).await;
                            return Ok(());
                        }
                    }
                }
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let _ = self.frames_tx.send(frame);
                        }
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}
