//! Binary entry point: loads configuration, builds the in-memory media
//! catalog and player, then serves the JSON-RPC control surface until
//! interrupted. Mirrors the phased startup/shutdown of the original
//! application binary (infrastructure, then business wiring, then
//! serve-until-signal) without the UPnP/web-app layers this rework
//! drops.

use std::sync::Arc;

use media::{MediaCatalog, MemoryCatalog};
use player::Player;
use rpc::{Context, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::PlayerConfig::load(None)?;
    info!(bind = %config.rpc.bind, sink = %config.sink_uri, "loaded configuration");

    let catalog: Arc<dyn MediaCatalog> = Arc::new(MemoryCatalog::default());
    let player = Arc::new(Player::new(catalog.clone(), config.sink_uri.clone()));
    let events = player.events();
    let _main_loop = player.run();

    let server = Arc::new(Server::new(Context { player: player.clone(), catalog }, events));

    info!("starting rpc server");
    let bind = config.rpc.bind.clone();
    let serve = tokio::spawn(async move { server.serve(&bind).await });

    tokio::select! {
        result = serve => {
            if let Ok(Err(e)) = result {
                tracing::error!(%e, "rpc server exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    player.destroy();
    info!("pmoplayer stopped");
    Ok(())
}
