//! Standalone vote receiver.
//!
//! Usage: `votifier-server [config.toml]`. Without a path the configuration
//! comes from `VOTIFIER_*` environment variables.

use std::sync::Arc;

use tracing::{error, info};
use votifier_protocol::config::VotifierConfig;
use votifier_protocol::error::Result;
use votifier_protocol::protocol::notify::ChannelSink;
use votifier_protocol::protocol::throttle::ErrorLogThrottle;
use votifier_protocol::utils::logging::init_logging;
use votifier_protocol::utils::keys::PUBLIC_KEY_FILE;
use votifier_protocol::utils::SystemClock;
use votifier_protocol::{InboundDispatcher, RsaKeyProvider, VoteServer};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Votifier server stopped");
        eprintln!("votifier-server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => VotifierConfig::from_file(path)?,
        None => VotifierConfig::from_env()?,
    };
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let keys = Arc::new(RsaKeyProvider::load_or_generate(&config.keys.directory)?);
    info!(
        path = %config.keys.directory.join(PUBLIC_KEY_FILE).display(),
        "Give this public key to vote sites"
    );

    let (sink, mut events) = ChannelSink::new();
    let throttle = ErrorLogThrottle::from_config(&config.throttle, Arc::new(SystemClock));
    let dispatcher = Arc::new(InboundDispatcher::with_throttle(Arc::new(sink), throttle));

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(service = %event.service_name, username = %event.username, "Vote event");
        }
    });

    let metrics = dispatcher.metrics().clone();
    let result = VoteServer::bind(&config.server, keys, dispatcher)
        .await?
        .run()
        .await;
    metrics.log_metrics();
    result
}
