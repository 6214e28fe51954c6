//! Rollcall Node binary
//!
//! Keeps the active roster and challenges members on a fixed cadence.

use rollcall_node::{NodeConfig, RollcallNode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall_node=info,rollcall_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rollcall node");

    let config = NodeConfig::from_env()?;

    let node = RollcallNode::new(config)?;
    node.run().await?;

    Ok(())
}
