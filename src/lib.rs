//! # threadtree
//!
//! Order-agnostic thread trees for forum messages delivered by an eventually
//! consistent transport.
//!
//! Messages reference their parent and thread root by id. They may arrive in
//! any order; references to messages that have not arrived yet are held by
//! ghost placeholders until the real message shows up. Each board keeps a
//! list of threads ordered by latest activity and, per thread, its replies in
//! chronological order.
//!
//! ## Example
//!
//! ```rust
//! use threadtree::forum::{AnyViewer, AuthorId, Message, MessageManager, MessageUri};
//! use threadtree::ForumConfig;
//! use std::collections::BTreeSet;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manager = MessageManager::new(ForumConfig::default());
//! let board = manager.create_board("en.test")?;
//! let author = AuthorId::compute("SSK@example/WoT");
//!
//! let root = Message::new(
//!     MessageUri::generate(author, 0),
//!     None,
//!     None,
//!     BTreeSet::from([board.clone()]),
//!     author,
//!     "Hello",
//!     1_000,
//!     "First post",
//! )?;
//! let reply = Message::new(
//!     MessageUri::generate(author, 1),
//!     Some(root.id().clone()),
//!     Some(root.id().clone()),
//!     BTreeSet::from([board.clone()]),
//!     author,
//!     "Re: Hello",
//!     2_000,
//!     "Reply",
//! )?;
//!
//! // The reply arrives first.
//! manager.on_message_received(reply)?;
//! manager.on_message_received(root.clone())?;
//!
//! let threads = manager.get_threads(&board, &AnyViewer);
//! assert_eq!(threads[0].thread_id(), root.id());
//! assert_eq!(threads[0].last_activity(), 2_000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dag;
pub mod error;
pub mod forum;
pub mod logging;

pub use config::ForumConfig;
pub use error::{Result, ThreadTreeError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
