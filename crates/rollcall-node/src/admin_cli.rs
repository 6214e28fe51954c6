//! rollcall-admin CLI tool
//!
//! Talks to a running rollcall-node over its admin socket.
//!
//! Usage:
//!   rollcall-admin join [member]
//!   rollcall-admin leave [member]
//!   rollcall-admin yes [member]
//!   rollcall-admin list
//!   rollcall-admin watch
//!   rollcall-admin ping

use rollcall_node::admin_socket::{default_socket_path, AdminCommand, AdminResponse};
use rollcall_node::member::render_list;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

fn print_usage() {
    eprintln!("rollcall-admin - Manage the Rollcall active roster");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  rollcall-admin join [member]    Join the active list");
    eprintln!("  rollcall-admin leave [member]   Leave the active list");
    eprintln!("  rollcall-admin yes [member]     Confirm you're still active");
    eprintln!("  rollcall-admin list             Show current active list");
    eprintln!("  rollcall-admin watch            Follow challenge notices");
    eprintln!("  rollcall-admin ping             Check if daemon is running");
    eprintln!();
    eprintln!("Member defaults to $USER.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ROLLCALL_SOCKET        Path to admin socket");
    eprintln!("  ROLLCALL_ADMIN_SOCKET  Daemon's socket path, used when ROLLCALL_SOCKET is unset");
    eprintln!("  ROLLCALL_DATA_DIR      Socket is <dir>/admin.sock otherwise (default: ./rollcall-data)");
}

/// Explicit member argument, else the invoking user.
fn target_member(args: &[String]) -> Result<String, String> {
    match args.get(2) {
        Some(member) => Ok(member.clone()),
        None => std::env::var("USER")
            .map_err(|_| "No member given and $USER is not set".to_string()),
    }
}

fn parse_command(args: &[String]) -> Result<AdminCommand, String> {
    let sub = args.get(1).ok_or_else(|| "Missing command".to_string())?;
    match sub.as_str() {
        "join" => Ok(AdminCommand::Join {
            member: target_member(args)?,
        }),
        "leave" => Ok(AdminCommand::Leave {
            member: target_member(args)?,
        }),
        "yes" => Ok(AdminCommand::Yes {
            member: target_member(args)?,
        }),
        "list" => Ok(AdminCommand::List),
        "watch" => Ok(AdminCommand::Watch),
        "ping" => Ok(AdminCommand::Ping),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn connect() -> Result<UnixStream, String> {
    let socket_path = default_socket_path();
    UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to rollcall-node at {:?}: {}\n\
             Is the rollcall-node running?",
            socket_path, e
        )
    })
}

fn read_response(reader: &mut impl BufRead) -> Result<Option<AdminResponse>, String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).map_err(|e| e.to_string())?;
    if n == 0 {
        return Ok(None);
    }
    serde_json::from_str(&line)
        .map(Some)
        .map_err(|e| format!("Invalid response: {}", e))
}

fn send_command(cmd: &AdminCommand) -> Result<BufReader<UnixStream>, String> {
    let mut stream = connect()?;
    let cmd_json = serde_json::to_string(cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;
    Ok(BufReader::new(stream))
}

/// Print one response. Returns the process exit code it implies.
fn print_response(response: AdminResponse) -> i32 {
    match response {
        AdminResponse::Ok { message } => {
            println!("{}", message);
            0
        }
        AdminResponse::Error { error } => {
            eprintln!("Error: {}", error);
            1
        }
        AdminResponse::NotTracked { member } => {
            eprintln!("{} is not on the active list.", member);
            1
        }
        AdminResponse::Members { items } => {
            println!("{}", render_list(&items, chrono::Utc::now()));
            0
        }
        AdminResponse::Notice { message, .. } => {
            println!("{}", message);
            0
        }
        AdminResponse::Pong => {
            println!("pong - rollcall-node is running");
            0
        }
    }
}

fn run(cmd: AdminCommand) -> Result<i32, String> {
    let watching = cmd == AdminCommand::Watch;
    let mut reader = send_command(&cmd)?;

    let first = read_response(&mut reader)?
        .ok_or_else(|| "rollcall-node closed the connection".to_string())?;
    let code = print_response(first);
    if !watching || code != 0 {
        return Ok(code);
    }

    while let Some(response) = read_response(&mut reader)? {
        print_response(response);
    }
    Ok(0)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if matches!(args.get(1).map(String::as_str), Some("-h" | "--help" | "help")) {
        print_usage();
        std::process::exit(0);
    }

    let cmd = match parse_command(&args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match run(cmd) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
