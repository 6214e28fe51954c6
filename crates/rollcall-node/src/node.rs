//! Rollcall Node - the main application entry point.
//!
//! Architecture:
//! - Single daemon process with one roster over a JSON snapshot file
//! - Challenge scheduler running alongside the surfaces
//! - HTTP API and Unix admin socket (rollcall-admin CLI)

use crate::admin_socket::AdminSocket;
use crate::api;
use crate::error::{Error, Result};
use rollcall_core::{
    BroadcastNotifier, FileStore, Notifier, OpenDirectory, Roster, ScheduleConfig, Scheduler,
    StaticDirectory,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Buffered notices per slow `watch` subscriber.
const NOTICE_CAPACITY: usize = 256;

/// Configuration for a Rollcall node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Data directory for the roster snapshot
    pub data_dir: PathBuf,

    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Admin socket path (for rollcall-admin CLI)
    pub admin_socket: PathBuf,

    /// Challenge cadence and grace window
    pub schedule: ScheduleConfig,

    /// Destination label for challenge notices
    pub check_channel: String,

    /// Known members; when set, nobody else resolves
    pub members: Option<Vec<String>>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("./rollcall-data");
        Self {
            admin_socket: data_dir.join("admin.sock"),
            data_dir,
            api_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            schedule: ScheduleConfig::default(),
            check_channel: "checks".to_string(),
            members: None,
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let api_addr = match var("ROLLCALL_API_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("ROLLCALL_API_ADDR: invalid address {:?}", raw)))?,
            None => defaults.api_addr,
        };

        // Legacy hour count is only consulted when the new variable is unset.
        let interval = match (var("ROLLCALL_CHECK_INTERVAL"), var("CHECK_INTERVAL_HOURS")) {
            (Some(raw), _) => duration_var("ROLLCALL_CHECK_INTERVAL", &raw)?,
            (None, Some(hours)) => duration_var("CHECK_INTERVAL_HOURS", &format!("{}h", hours.trim()))?,
            (None, None) => defaults.schedule.interval,
        };

        let grace = match var("ROLLCALL_GRACE") {
            Some(raw) => duration_var("ROLLCALL_GRACE", &raw)?,
            None => defaults.schedule.grace,
        };

        let check_channel = var("ROLLCALL_CHECK_CHANNEL")
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or(defaults.check_channel);

        let members = var("ROLLCALL_MEMBERS")
            .map(|s| {
                s.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|m| !m.is_empty());

        let admin_socket = var("ROLLCALL_ADMIN_SOCKET")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("admin.sock"));

        let schedule = ScheduleConfig { interval, grace };
        schedule.validate().map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            data_dir,
            api_addr,
            admin_socket,
            schedule,
            check_channel,
            members,
        })
    }
}

fn duration_var(key: &str, raw: &str) -> Result<Duration> {
    parse_duration(raw)
        .ok_or_else(|| Error::Config(format!("{}: expected a positive duration like 4h, got {:?}", key, raw)))
}

/// Parse `<n>[s|m|h]`; a bare number is seconds. Zero and anything above
/// [`ScheduleConfig::MAX_PERIOD`] are rejected.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, scale) = match raw.chars().last()? {
        's' => (&raw[..raw.len() - 1], 1),
        'm' => (&raw[..raw.len() - 1], 60),
        'h' => (&raw[..raw.len() - 1], 60 * 60),
        _ => (raw, 1),
    };
    let secs = digits.trim().parse::<u64>().ok()?.checked_mul(scale)?;
    let duration = Duration::from_secs(secs);
    (secs > 0 && duration <= ScheduleConfig::MAX_PERIOD).then_some(duration)
}

/// Shared state for the node - one roster shared by all surfaces.
pub struct NodeState {
    pub roster: Arc<Roster>,
    pub notifier: Arc<BroadcastNotifier>,
    pub config: NodeConfig,
}

impl NodeState {
    pub fn new(roster: Arc<Roster>, notifier: Arc<BroadcastNotifier>, config: NodeConfig) -> Self {
        Self {
            roster,
            notifier,
            config,
        }
    }
}

/// A Rollcall node instance.
pub struct RollcallNode {
    state: Arc<NodeState>,
}

impl RollcallNode {
    /// Create a new node, opening the snapshot store in the data directory.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let store = FileStore::open(&config.data_dir)?;

        let roster = match &config.members {
            Some(members) => Roster::new(store, StaticDirectory::new(members.iter().cloned())),
            None => Roster::new(store, OpenDirectory),
        };

        let notifier = BroadcastNotifier::new(config.check_channel.clone(), NOTICE_CAPACITY);

        Ok(Self {
            state: Arc::new(NodeState::new(Arc::new(roster), Arc::new(notifier), config)),
        })
    }

    /// Get the shared state (for API handlers).
    pub fn state(&self) -> Arc<NodeState> {
        Arc::clone(&self.state)
    }

    /// Run the node until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<()> {
        let config = &self.state.config;
        tracing::info!("Rollcall node starting");
        tracing::info!("  API: http://{}", config.api_addr);
        tracing::info!("  Admin: {:?}", config.admin_socket);
        tracing::info!("  Data: {:?}", config.data_dir);
        tracing::info!("  Notices: #{}", config.check_channel);
        if let Some(members) = &config.members {
            tracing::info!("  Members: {} known", members.len());
        }

        // Bind first so a taken port fails before anything is spawned.
        let listener = tokio::net::TcpListener::bind(config.api_addr).await?;
        tracing::info!("HTTP server listening on {}", config.api_addr);

        let notifier: Arc<dyn Notifier> = self.state.notifier.clone();
        let scheduler = Scheduler::new(Arc::clone(&self.state.roster), notifier, config.schedule).start()?;

        // Start admin socket server in background
        let admin_socket = AdminSocket::new(
            Arc::clone(&self.state.roster),
            Arc::clone(&self.state.notifier),
            &config.admin_socket,
        );
        let admin_task = tokio::spawn(async move {
            if let Err(e) = admin_socket.run().await {
                tracing::error!("Admin socket error: {}", e);
            }
        });

        let app = api::build_router(self.state());
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Shutting down");
        scheduler.stop().await;
        admin_task.abort();
        if let Err(e) = std::fs::remove_file(&config.admin_socket) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove admin socket: {}", e);
            }
        }

        Ok(())
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received");
}
