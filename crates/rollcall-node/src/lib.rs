//! Rollcall Node - presence roster daemon
//!
//! Hosts a [`rollcall_core::Roster`] and its challenge scheduler behind two
//! local surfaces.
//!
//! # Architecture
//!
//! - **Node**: configuration, bootstrap and graceful shutdown
//! - **Admin Socket**: Unix socket for member commands (rollcall-admin CLI)
//! - **API**: HTTP endpoints for the same commands
//! - **Member**: listing entries shared by both surfaces
//!
//! # Example
//!
//! ```no_run
//! use rollcall_node::{NodeConfig, RollcallNode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NodeConfig::from_env()?;
//!     let node = RollcallNode::new(config)?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admin_socket;
pub mod api;
pub mod error;
pub mod member;
pub mod node;

pub use error::{Error, Result};
pub use member::MemberEntry;
pub use node::{NodeConfig, NodeState, RollcallNode};
