//! Minimal host-side client: connect to a device, exchange identities, poke
//! at its object graph and watch one event stream.
//!
//! Reads the `[link]` section from `vislink.toml` when present.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tracing::info;

use vislink::core::{ConfigStore, Engine, LinkConfig};
use vislink::driver::WsClientDriver;
use vislink::graph::{Addressable, ObjectNode};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let store = ConfigStore::from_file("vislink.toml").unwrap_or_else(|_| ConfigStore::empty());
    let config: LinkConfig = store.get()?;

    // the graph this host exposes back to the device
    let root: Arc<dyn Addressable> = Arc::new(ObjectNode::new().property("ready", json!(true)));

    let driver = WsClientDriver::new(&config.url_with_token())?;
    let identity = config.identity();
    let link = Engine::spawn(config, Some(root), driver);

    let peer = link.hello(identity).await?;
    info!("connected to {} {}", peer.name, peer.version);

    let state = link.get("state").await?;
    info!("device state: {}", state);

    link.put("mode", json!(true)).await?;

    let listener = link
        .add_listener("sensor/changed", |args| {
            info!("sensor changed: {:?}", args);
        })
        .await?;

    tokio::signal::ctrl_c().await?;

    link.remove_listener("sensor/changed", listener).await?;
    link.close().await;
    Ok(())
}
