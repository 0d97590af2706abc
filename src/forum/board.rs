//! Board names and the board registry.
//!
//! A board is a named topic (`en.test`, `de.freenet`) that messages are
//! posted to. A message may be posted to several boards at once. The
//! registry holds the boards a namespace knows about; messages naming other
//! boards are rejected for those boards only.

use crate::error::{Result, ThreadTreeError};
use crate::forum::constants::MAX_BOARD_NAME_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A validated board name.
///
/// Names are lowercase, dot-separated segments of `[a-z0-9_-]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardName(String);

impl BoardName {
    /// Parses and validates a board name.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Name is empty or exceeds 256 bytes
    /// - A segment is empty or contains characters outside `[a-z0-9_-]`
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ThreadTreeError::invalid_board("Board name cannot be empty"));
        }
        if name.len() > MAX_BOARD_NAME_SIZE {
            return Err(ThreadTreeError::invalid_board(format!(
                "Board name exceeds maximum size of {} bytes",
                MAX_BOARD_NAME_SIZE
            )));
        }
        for segment in name.split('.') {
            if segment.is_empty() {
                return Err(ThreadTreeError::invalid_board(format!(
                    "Board name '{}' has an empty segment",
                    name
                )));
            }
            if !segment
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
            {
                return Err(ThreadTreeError::invalid_board(format!(
                    "Board name '{}' contains invalid characters",
                    name
                )));
            }
        }
        Ok(Self(name))
    }

    /// Returns the board name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BoardName {
    type Error = ThreadTreeError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for BoardName {
    type Error = ThreadTreeError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BoardName> for String {
    fn from(name: BoardName) -> Self {
        name.0
    }
}

impl fmt::Debug for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoardName({})", self.0)
    }
}

impl fmt::Display for BoardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of boards known to a namespace.
#[derive(Debug, Default, Clone)]
pub struct BoardRegistry {
    boards: BTreeSet<BoardName>,
}

impl BoardRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a board. Returns true if it was not known before.
    pub fn register(&mut self, board: BoardName) -> bool {
        self.boards.insert(board)
    }

    /// Checks if a board is registered.
    pub fn contains(&self, board: &BoardName) -> bool {
        self.boards.contains(board)
    }

    /// Splits `boards` into (known, unknown) against this registry.
    pub fn partition<'a, I>(&self, boards: I) -> (BTreeSet<BoardName>, Vec<BoardName>)
    where
        I: IntoIterator<Item = &'a BoardName>,
    {
        let mut known = BTreeSet::new();
        let mut unknown = Vec::new();
        for board in boards {
            if self.contains(board) {
                known.insert(board.clone());
            } else {
                unknown.push(board.clone());
            }
        }
        (known, unknown)
    }

    /// Returns all registered boards in name order.
    pub fn iter(&self) -> impl Iterator<Item = &BoardName> {
        self.boards.iter()
    }

    /// Returns the number of registered boards.
    pub fn len(&self) -> usize {
        self.boards.len()
    }

    /// Returns true if no board is registered.
    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}
