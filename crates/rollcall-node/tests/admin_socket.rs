//! Admin socket round trips against a live listener.

use rollcall_core::{
    BroadcastNotifier, FileStore, Notifier, NotifyError, OpenDirectory, Roster, ScheduleConfig,
    Scheduler,
};
use rollcall_node::admin_socket::{AdminCommand, AdminResponse, AdminSocket};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(path: &Path) -> Self {
        // The listener binds asynchronously; retry briefly.
        for _ in 0..100 {
            if let Ok(stream) = UnixStream::connect(path).await {
                let (reader, writer) = stream.into_split();
                return Self {
                    reader: BufReader::new(reader),
                    writer,
                };
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("admin socket never came up at {:?}", path);
    }

    async fn send(&mut self, cmd: &AdminCommand) -> AdminResponse {
        let line = serde_json::to_string(cmd).unwrap() + "\n";
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.recv().await
    }

    async fn recv(&mut self) -> AdminResponse {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }
}

struct Daemon {
    _dir: tempfile::TempDir,
    socket: PathBuf,
    roster: Arc<Roster>,
    notifier: Arc<BroadcastNotifier>,
}

fn start() -> Daemon {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("admin.sock");
    let roster = Arc::new(Roster::new(FileStore::open(dir.path()).unwrap(), OpenDirectory));
    let notifier = Arc::new(BroadcastNotifier::new("checks", 16));

    let admin = AdminSocket::new(Arc::clone(&roster), Arc::clone(&notifier), &socket);
    tokio::spawn(async move { admin.run().await });

    Daemon {
        _dir: dir,
        socket,
        roster,
        notifier,
    }
}

#[tokio::test]
async fn join_yes_list_leave() {
    let daemon = start();
    let mut client = Client::connect(&daemon.socket).await;

    assert_eq!(client.send(&AdminCommand::Ping).await, AdminResponse::Pong);

    let response = client.send(&AdminCommand::Join { member: "alice".into() }).await;
    assert_eq!(
        response,
        AdminResponse::Ok {
            message: "alice is now active!".into()
        }
    );

    let response = client.send(&AdminCommand::Yes { member: "ghost".into() }).await;
    assert_eq!(response, AdminResponse::NotTracked { member: "ghost".into() });

    match client.send(&AdminCommand::List).await {
        AdminResponse::Members { items } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].member, "alice");
            assert!(!items[0].pending_check);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    client.send(&AdminCommand::Leave { member: "alice".into() }).await;
    assert!(daemon.roster.list().await.is_empty());
}

#[tokio::test]
async fn malformed_line_is_reported() {
    let daemon = start();
    let mut client = Client::connect(&daemon.socket).await;

    client.writer.write_all(b"{\"cmd\":\"promote\"}\n").await.unwrap();
    assert!(matches!(client.recv().await, AdminResponse::Error { .. }));

    // Connection stays usable.
    assert_eq!(client.send(&AdminCommand::Ping).await, AdminResponse::Pong);
}

#[tokio::test]
async fn watch_streams_challenge_notices() {
    let daemon = start();
    let mut setup = Client::connect(&daemon.socket).await;
    setup.send(&AdminCommand::Join { member: "alice".into() }).await;

    let mut watcher = Client::connect(&daemon.socket).await;
    assert!(matches!(
        watcher.send(&AdminCommand::Watch).await,
        AdminResponse::Ok { .. }
    ));

    let notifier: Arc<dyn Notifier> = daemon.notifier.clone();
    let scheduler = Scheduler::new(Arc::clone(&daemon.roster), notifier, ScheduleConfig::default());
    assert_eq!(scheduler.challenge_cycle().await.unwrap(), vec!["alice"]);

    match watcher.recv().await {
        AdminResponse::Notice { member, message } => {
            assert_eq!(member, "alice");
            assert!(message.contains("within 1 hour"));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let response = setup.send(&AdminCommand::Yes { member: "alice".into() }).await;
    assert!(matches!(response, AdminResponse::Ok { .. }));
    assert!(scheduler.grace_sweep().await.unwrap().is_empty());
}

#[tokio::test]
async fn closed_watch_drops_its_subscription() {
    let daemon = start();
    let mut watcher = Client::connect(&daemon.socket).await;
    assert!(matches!(
        watcher.send(&AdminCommand::Watch).await,
        AdminResponse::Ok { .. }
    ));
    assert!(daemon.notifier.notify("alice", "still there?").is_ok());

    drop(watcher);

    // The connection task notices EOF without any notice being sent.
    for _ in 0..100 {
        if let Err(NotifyError::Unreachable(channel)) = daemon.notifier.notify("alice", "hello?") {
            assert_eq!(channel, "checks");
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("watch subscription outlived its client");
}
