use anyhow::Result;
use clap::Parser;
use qtumd_hub::{Node, config::Config, logging};
use tokio::{
    select,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logging::setup(config.log_format);
    let cancel_token = CancellationToken::new();

    let node = Node::start(config, cancel_token.clone()).await?;
    let mut events = node.events();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                qtumd_hub::events::Event::Error { message } => warn!("{}", message),
                event => info!("{:?}", event),
            }
        }
    });

    // Run until a shutdown signal lands or something cancels us from inside.
    let mut sigterm = signal(SignalKind::terminate())?;
    select! {
        _ = ctrl_c() => warn!("Ctrl+C received"),
        _ = sigterm.recv() => warn!("SIGTERM received"),
        _ = cancel_token.cancelled() => warn!("Shutdown requested"),
    }
    info!("Initiating shutdown");
    cancel_token.cancel();

    let result = node.stop().await;
    event_logger.abort();
    info!("Goodbye.");
    result
}
