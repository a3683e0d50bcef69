use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{info, warn};
use url::Url;

use vislink_protocol::WireFrame;

use crate::driver::{Driver, TransportEvent};

/// WebSocket client driver
///
/// Connects once and pumps frames until either side closes. Reconnection is
/// deliberately left to the embedding application: a closed channel is
/// terminal for the engine that owns this driver.
pub struct WsClientDriver {
    url: Url,
}

impl WsClientDriver {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
        })
    }

    async fn run_inner(
        self,
        inbound_tx: mpsc::Sender<TransportEvent>,
        mut outbound_rx: mpsc::UnboundedReceiver<WireFrame>,
    ) -> Result<()> {
        let (ws_stream, _) = match connect_async(self.url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                let _ = inbound_tx
                    .send(TransportEvent::Errored(e.to_string()))
                    .await;
                return Err(e.into());
            }
        };

        info!("connected to {}", &self.url);
        if inbound_tx.send(TransportEvent::Opened).await.is_err() {
            return Ok(());
        }

        let (mut sink, mut stream) = ws_stream.split();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let frame = WireFrame::Text(text.to_string());
                            if inbound_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            // surfaced so the engine can answer with the sentinel
                            let frame = WireFrame::Binary(data.to_vec());
                            if inbound_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            warn!("websocket error: {}", e);
                            let _ = inbound_tx
                                .send(TransportEvent::Errored(e.to_string()))
                                .await;
                            return Ok(());
                        }
                    }
                }
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(WireFrame::Text(text)) => {
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(WireFrame::Binary(data)) => {
                            if sink.send(Message::Binary(data.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let _ = inbound_tx.send(TransportEvent::Closed).await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Driver for WsClientDriver {
    async fn run(
        self: Box<Self>,
        inbound_tx: mpsc::Sender<TransportEvent>,
        outbound_rx: mpsc::UnboundedReceiver<WireFrame>,
    ) -> Result<()> {
        self.run_inner(inbound_tx, outbound_rx).await
    }
}
