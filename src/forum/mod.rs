//! Order-agnostic message threading.
//!
//! Messages arrive from an eventually consistent transport in any order: a
//! reply may show up before the message it replies to, or before its thread
//! root. This module assembles them into thread trees and keeps per-board
//! indexes of threads and replies up to date as messages trickle in.
//!
//! ## Layers
//!
//! ```text
//! MessageManager            (one per namespace)
//!     ├── BoardRegistry     known boards
//!     ├── MessageStore      messages and ghosts, keyed by id
//!     ├── ThreadResolver    links a stored message, re-places waiting children
//!     └── BoardIndex        threads by activity, replies by date, per board
//! ```
//!
//! A ghost is a placeholder for a message that was referenced but not yet
//! delivered. When the message arrives the ghost is promoted in place and the
//! replies waiting on it are re-placed, so the final views do not depend on
//! delivery order.

mod board;
pub mod constants;
mod identity;
pub mod index;
mod manager;
mod message;
pub mod resolver;
mod shared;
pub mod store;
pub mod types;

pub use board::{BoardName, BoardRegistry};
pub use identity::{AnyViewer, OwnIdentity, Viewer};
pub use index::{BoardIndex, BoardThreads, ReplyLink, ReplyPlacement, ThreadRootLink};
pub use manager::{IngestOutcome, MessageManager};
pub use message::{Message, MessageLimits};
pub use resolver::{IndexUpdate, ThreadResolver};
pub use shared::SharedMessageManager;
pub use store::{MessageStore, PutOutcome, RecordKind, StoredRecord};
pub use types::{AuthorId, MessageId, MessageUri};
