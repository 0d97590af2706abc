//! Identifier types for the message system.
//!
//! - `AuthorId`: hash of the author's public request key
//! - `MessageUri`: content address of a message within its author's message list
//! - `MessageId`: stable id derived from the URI, used as the arena key
//!
//! Every identifier is validated when parsed or deserialized, so a value of
//! one of these types always has a well-formed shape.

use crate::dag::IdentityHash;
use crate::error::{Result, ThreadTreeError};
use crate::forum::constants::{MESSAGE_ID_SEPARATOR, MESSAGE_LIST_PREFIX, MESSAGE_URI_FRAGMENT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a message author.
pub type AuthorId = IdentityHash;

/// Unique message identifier of the form `<uuid>@<author-hex>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageId(String);

impl MessageId {
    /// Builds the id for a message UUID published by `author`.
    pub fn new(uuid: &Uuid, author: &AuthorId) -> Self {
        Self(format!(
            "{}{}{}",
            uuid.hyphenated(),
            MESSAGE_ID_SEPARATOR,
            author.to_hex()
        ))
    }

    /// Parses and validates a message id.
    pub fn parse(s: &str) -> Result<Self> {
        let (uuid_part, author_part) = s.split_once(MESSAGE_ID_SEPARATOR).ok_or_else(|| {
            ThreadTreeError::malformed_reference(s, "message id must contain '@'")
        })?;

        let uuid = Uuid::try_parse(uuid_part)
            .map_err(|_| ThreadTreeError::malformed_reference(s, "invalid message UUID"))?;
        let author = AuthorId::from_hex(author_part)
            .map_err(|_| ThreadTreeError::malformed_reference(s, "invalid author hash"))?;

        // Normalize so equal ids compare equal regardless of UUID casing.
        Ok(Self::new(&uuid, &author))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the author component of this id.
    pub fn author(&self) -> Option<AuthorId> {
        self.0
            .split_once(MESSAGE_ID_SEPARATOR)
            .and_then(|(_, author)| AuthorId::from_hex(author).ok())
    }

    /// Returns a short form for log output.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl TryFrom<String> for MessageId {
    type Error = ThreadTreeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MessageId> for String {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

impl FromStr for MessageId {
    type Err = ThreadTreeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content address of a message: `<author-hex>/list-<index>#<uuid>`.
///
/// Authors publish messages in numbered lists; the UUID names one message
/// inside the list. The message id is derived from the author and the UUID,
/// so re-publishing the same message in a later list keeps its id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageUri {
    author: AuthorId,
    list_index: u64,
    uuid: Uuid,
}

impl MessageUri {
    /// Creates a URI for a message in the given author's list.
    pub fn new(author: AuthorId, list_index: u64, uuid: Uuid) -> Self {
        Self {
            author,
            list_index,
            uuid,
        }
    }

    /// Creates a URI with a fresh random UUID.
    pub fn generate(author: AuthorId, list_index: u64) -> Self {
        Self::new(author, list_index, Uuid::new_v4())
    }

    /// Parses and validates a message URI.
    pub fn parse(s: &str) -> Result<Self> {
        let (list_part, uuid_part) = s.split_once(MESSAGE_URI_FRAGMENT).ok_or_else(|| {
            ThreadTreeError::malformed_reference(s, "message URI must contain '#'")
        })?;
        let (author_part, index_part) = list_part
            .split_once('/')
            .ok_or_else(|| ThreadTreeError::malformed_reference(s, "missing message list"))?;

        let author = AuthorId::from_hex(author_part)
            .map_err(|_| ThreadTreeError::malformed_reference(s, "invalid author hash"))?;
        let list_index = index_part
            .strip_prefix(MESSAGE_LIST_PREFIX)
            .and_then(|i| i.parse::<u64>().ok())
            .ok_or_else(|| ThreadTreeError::malformed_reference(s, "invalid message list index"))?;
        let uuid = Uuid::try_parse(uuid_part)
            .map_err(|_| ThreadTreeError::malformed_reference(s, "invalid message UUID"))?;

        Ok(Self::new(author, list_index, uuid))
    }

    /// Returns the message id this URI addresses.
    pub fn message_id(&self) -> MessageId {
        MessageId::new(&self.uuid, &self.author)
    }

    /// Returns the author of the message list.
    pub fn author(&self) -> &AuthorId {
        &self.author
    }

    /// Returns the index of the message list within the author's lists.
    pub fn list_index(&self) -> u64 {
        self.list_index
    }

    /// Returns the message UUID.
    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }
}

impl TryFrom<String> for MessageUri {
    type Error = ThreadTreeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MessageUri> for String {
    fn from(uri: MessageUri) -> Self {
        uri.to_string()
    }
}

impl FromStr for MessageUri {
    type Err = ThreadTreeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for MessageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageUri")
            .field("author", &self.author)
            .field("list_index", &self.list_index)
            .field("uuid", &self.uuid)
            .finish()
    }
}

impl fmt::Display for MessageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}{}{}{}",
            self.author.to_hex(),
            MESSAGE_LIST_PREFIX,
            self.list_index,
            MESSAGE_URI_FRAGMENT,
            self.uuid.hyphenated()
        )
    }
}
