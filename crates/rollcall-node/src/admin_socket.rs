//! Unix socket server for member commands.
//!
//! Provides a local IPC interface for joining, leaving, reconfirming and
//! listing members, plus a `watch` stream of challenge notices.
//! One JSON command per line in, one JSON response per line out.

use crate::error::Result;
use crate::member::MemberEntry;
use rollcall_core::{BroadcastNotifier, ConfirmOutcome, Roster};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

/// Admin command sent over the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Add a member to the roster
    Join { member: String },
    /// Remove a member from the roster
    Leave { member: String },
    /// Reconfirm a member's presence
    Yes { member: String },
    /// List all members
    List,
    /// Stream challenge notices until the client disconnects
    Watch,
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    NotTracked { member: String },
    Members { items: Vec<MemberEntry> },
    Notice { member: String, message: String },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    roster: Arc<Roster>,
    notifier: Arc<BroadcastNotifier>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(roster: Arc<Roster>, notifier: Arc<BroadcastNotifier>, socket_path: impl AsRef<Path>) -> Self {
        Self {
            roster,
            notifier,
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove stale socket file from a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let roster = Arc::clone(&self.roster);
                    let notifier = Arc::clone(&self.notifier);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, roster, notifier).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    roster: Arc<Roster>,
    notifier: Arc<BroadcastNotifier>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(AdminCommand::Watch) => {
                // Subscribe before acknowledging so no notice slips between.
                let notices = notifier.subscribe();
                let ack = AdminResponse::Ok {
                    message: format!("Watching #{}", notifier.channel()),
                };
                send(&mut writer, &ack).await?;
                return stream_notices(notices, &mut reader, &mut writer).await;
            }
            Ok(cmd) => execute_command(cmd, &roster).await,
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        send(&mut writer, &response).await?;
        line.clear();
    }

    Ok(())
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, response: &AdminResponse) -> Result<()> {
    let response_json = serde_json::to_string(response)? + "\n";
    writer.write_all(response_json.as_bytes()).await?;
    Ok(())
}

/// Forward notices until the client hangs up. Anything the client sends
/// meanwhile is discarded; EOF or a read error ends the subscription.
async fn stream_notices<R, W>(
    mut notices: broadcast::Receiver<rollcall_core::Notice>,
    reader: &mut R,
    writer: &mut W,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut discard = [0u8; 256];
    loop {
        let received = tokio::select! {
            read = reader.read(&mut discard) => match read {
                Ok(0) => {
                    tracing::debug!("Watch client disconnected");
                    return Ok(());
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Watch client gone: {}", e);
                    return Ok(());
                }
            },
            received = notices.recv() => received,
        };

        match received {
            Ok(notice) => {
                let response = AdminResponse::Notice {
                    member: notice.member,
                    message: notice.message,
                };
                if let Err(e) = send(writer, &response).await {
                    tracing::debug!("Watch client gone: {}", e);
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!("Watch client lagged, {} notice(s) dropped", missed);
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

async fn execute_command(cmd: AdminCommand, roster: &Roster) -> AdminResponse {
    match cmd {
        AdminCommand::Join { member } => match roster.join(&member).await {
            Ok(id) => AdminResponse::Ok {
                message: format!("{} is now active!", id),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::Leave { member } => match roster.leave(&member).await {
            Ok(id) => AdminResponse::Ok {
                message: format!("{} has left the active list.", id),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::Yes { member } => match roster.confirm(&member).await {
            Ok(ConfirmOutcome::Confirmed) => AdminResponse::Ok {
                message: format!("{} is marked as active again.", member.trim()),
            },
            Ok(ConfirmOutcome::NotTracked) => AdminResponse::NotTracked {
                member: member.trim().to_string(),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::List => AdminResponse::Members {
            items: roster.list().await.into_iter().map(MemberEntry::from).collect(),
        },

        // Watch is taken over by the connection loop.
        AdminCommand::Watch => AdminResponse::Error {
            error: "watch must be sent on its own connection".to_string(),
        },

        AdminCommand::Ping => AdminResponse::Pong,
    }
}

/// Socket path from the environment.
pub fn default_socket_path() -> PathBuf {
    socket_path_from(|key| std::env::var(key).ok())
}

/// `ROLLCALL_SOCKET`, else the daemon's own `ROLLCALL_ADMIN_SOCKET`, else
/// `admin.sock` in the data directory.
pub fn socket_path_from<F>(var: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    var("ROLLCALL_SOCKET")
        .or_else(|| var("ROLLCALL_ADMIN_SOCKET"))
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let data_dir = var("ROLLCALL_DATA_DIR").unwrap_or_else(|| "./rollcall-data".to_string());
            PathBuf::from(data_dir).join("admin.sock")
        })
}
