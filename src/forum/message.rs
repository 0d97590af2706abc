//! Message records.
//!
//! A `Message` is immutable once constructed. It declares (optionally) the
//! message it replies to and the thread it belongs to; either may be unknown
//! locally when the message arrives. Replies are never stored on the parent,
//! the message store tracks child lists separately.

use crate::dag::ParentLinked;
use crate::error::{Result, ThreadTreeError};
use crate::forum::board::BoardName;
use crate::forum::constants::{MAX_BOARDS_PER_MESSAGE, MAX_BODY_SIZE, MAX_TITLE_SIZE};
use crate::forum::types::{AuthorId, MessageId, MessageUri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Size limits applied to incoming messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageLimits {
    /// Maximum title size in bytes.
    pub max_title_size: usize,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
    /// Maximum number of boards per message.
    pub max_boards_per_message: usize,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_title_size: MAX_TITLE_SIZE,
            max_body_size: MAX_BODY_SIZE,
            max_boards_per_message: MAX_BOARDS_PER_MESSAGE,
        }
    }
}

/// A fully decoded message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    uri: MessageUri,
    parent_id: Option<MessageId>,
    thread_root_id: Option<MessageId>,
    author: AuthorId,
    boards: BTreeSet<BoardName>,
    title: String,
    /// Creation timestamp in milliseconds since Unix epoch.
    date: u64,
    body: String,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("thread_root_id", &self.thread_root_id)
            .field("boards", &self.boards)
            .field("title", &self.title)
            .field("date", &self.date)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl Message {
    /// Creates a new message with the default size limits.
    ///
    /// # Arguments
    /// * `uri` - Content address; the message id is derived from it
    /// * `thread_root_id` - Thread this message replies in, `None` for a new thread
    /// * `parent_id` - Message this replies to, `None` to reply to the thread root
    /// * `boards` - Boards the message is posted to (at least one)
    /// * `author` - Author identity; must match the URI's author
    /// * `title` - Message title (non-empty)
    /// * `date` - Declared creation time in milliseconds
    /// * `body` - Message text
    ///
    /// # Errors
    /// Returns `InvalidMessage` if any structural check fails. Self-references
    /// are accepted here and rejected at ingestion.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uri: MessageUri,
        thread_root_id: Option<MessageId>,
        parent_id: Option<MessageId>,
        boards: BTreeSet<BoardName>,
        author: AuthorId,
        title: impl Into<String>,
        date: u64,
        body: impl Into<String>,
    ) -> Result<Self> {
        let message = Self {
            id: uri.message_id(),
            uri,
            parent_id,
            thread_root_id,
            author,
            boards,
            title: title.into(),
            date,
            body: body.into(),
        };
        message.validate(&MessageLimits::default())?;
        Ok(message)
    }

    /// Checks structural well-formedness against `limits`.
    ///
    /// Used on ingestion for messages that were deserialized rather than
    /// built with [`Message::new`].
    pub fn validate(&self, limits: &MessageLimits) -> Result<()> {
        if self.id != self.uri.message_id() {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message id {} is not derived from its URI {}",
                self.id, self.uri
            )));
        }
        if self.uri.author() != &self.author {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message {} author does not match its URI",
                self.id
            )));
        }
        if self.boards.is_empty() {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message {} is not posted to any board",
                self.id
            )));
        }
        if self.boards.len() > limits.max_boards_per_message {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message {} is posted to more than {} boards",
                self.id, limits.max_boards_per_message
            )));
        }
        if self.title.is_empty() {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message {} has an empty title",
                self.id
            )));
        }
        if self.title.len() > limits.max_title_size {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message {} title exceeds maximum size of {} bytes",
                self.id, limits.max_title_size
            )));
        }
        if self.body.len() > limits.max_body_size {
            return Err(ThreadTreeError::invalid_message(format!(
                "Message {} body exceeds maximum size of {} bytes",
                self.id, limits.max_body_size
            )));
        }
        Ok(())
    }

    /// Returns the message id.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the message URI.
    pub fn uri(&self) -> &MessageUri {
        &self.uri
    }

    /// Returns the declared parent, if any.
    pub fn parent_id(&self) -> Option<&MessageId> {
        self.parent_id.as_ref()
    }

    /// Returns the declared thread root, if any.
    pub fn thread_root_id(&self) -> Option<&MessageId> {
        self.thread_root_id.as_ref()
    }

    /// Returns true if this message starts a new thread.
    pub fn is_thread_root(&self) -> bool {
        self.thread_root_id.is_none()
    }

    /// Returns the id of the thread this message is filed in.
    ///
    /// For a thread root this is its own id.
    pub fn thread_id(&self) -> &MessageId {
        self.thread_root_id.as_ref().unwrap_or(&self.id)
    }

    /// Returns the author identity.
    pub fn author(&self) -> &AuthorId {
        &self.author
    }

    /// Returns the boards this message is posted to.
    pub fn boards(&self) -> &BTreeSet<BoardName> {
        &self.boards
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the declared creation timestamp in milliseconds.
    pub fn date(&self) -> u64 {
        self.date
    }

    /// Returns the body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl ParentLinked for Message {
    type Id = MessageId;

    fn id(&self) -> &MessageId {
        &self.id
    }

    /// The message's anchor in the tree: its declared parent, or its thread
    /// root when it names no parent.
    fn parent_ids(&self) -> Vec<MessageId> {
        self.parent_id
            .as_ref()
            .or(self.thread_root_id.as_ref())
            .into_iter()
            .cloned()
            .collect()
    }

    fn created_at(&self) -> u64 {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_set(names: &[&str]) -> BTreeSet<BoardName> {
        names.iter().map(|n| BoardName::new(*n).unwrap()).collect()
    }

    fn author() -> AuthorId {
        AuthorId::compute("SSK@author/WoT")
    }

    fn build(boards: BTreeSet<BoardName>, title: &str, body: &str) -> Result<Message> {
        Message::new(
            MessageUri::generate(author(), 0),
            None,
            None,
            boards,
            author(),
            title,
            1_000,
            body,
        )
    }

    #[test]
    fn test_message_creation() {
        let message = build(board_set(&["en.test"]), "Hello", "World").unwrap();
        assert!(message.is_thread_root());
        assert_eq!(message.thread_id(), message.id());
        assert_eq!(message.id(), &message.uri().message_id());
        assert_eq!(message.title(), "Hello");
        assert_eq!(message.date(), 1_000);
    }

    #[test]
    fn test_message_empty_boards_rejected() {
        let err = build(BTreeSet::new(), "Hello", "World").unwrap_err();
        assert!(matches!(err, ThreadTreeError::InvalidMessage(_)));
    }

    #[test]
    fn test_message_empty_title_rejected() {
        assert!(build(board_set(&["en.test"]), "", "World").is_err());
    }

    #[test]
    fn test_message_empty_body_allowed() {
        assert!(build(board_set(&["en.test"]), "Title only", "").is_ok());
    }

    #[test]
    fn test_message_body_too_large() {
        let body = "x".repeat(MAX_BODY_SIZE + 1);
        assert!(build(board_set(&["en.test"]), "Hello", &body).is_err());
    }

    #[test]
    fn test_message_author_must_match_uri() {
        let result = Message::new(
            MessageUri::generate(author(), 0),
            None,
            None,
            board_set(&["en.test"]),
            AuthorId::compute("SSK@someone-else/WoT"),
            "Hello",
            1,
            "",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_message_validate_custom_limits() {
        let message = build(board_set(&["en.a", "en.b"]), "Hello", "World").unwrap();
        let limits = MessageLimits {
            max_boards_per_message: 1,
            ..MessageLimits::default()
        };
        assert!(message.validate(&limits).is_err());
    }

    #[test]
    fn test_message_json_roundtrip_revalidates() {
        let message = build(board_set(&["en.test"]), "Hello", "World").unwrap();
        let json = serde_json::to_string(&message).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
        back.validate(&MessageLimits::default()).unwrap();
    }

    #[test]
    fn test_reply_thread_id() {
        let root = build(board_set(&["en.test"]), "Root", "").unwrap();
        let reply = Message::new(
            MessageUri::generate(author(), 1),
            Some(root.id().clone()),
            None,
            board_set(&["en.test"]),
            author(),
            "Re: Root",
            2_000,
            "",
        )
        .unwrap();
        assert!(!reply.is_thread_root());
        assert_eq!(reply.thread_id(), root.id());
        assert_eq!(reply.parent_ids(), vec![root.id().clone()]);
        assert_eq!(root.parent_ids(), Vec::<MessageId>::new());
    }
}
