//! Viewer identities used to filter board listings.
//!
//! Trust scoring lives outside this crate. A viewer only answers two
//! questions: does it want to see a board at all, and does it want to see
//! messages from a given author.

use crate::forum::board::BoardName;
use crate::forum::types::AuthorId;
use std::collections::HashSet;

/// Filtering hooks for the identity reading a board.
pub trait Viewer {
    /// Returns false if the viewer opted out of `board`.
    fn wants_board(&self, _board: &BoardName) -> bool {
        true
    }

    /// Returns false if the viewer does not want messages from `author`.
    fn wants_messages_from(&self, _author: &AuthorId) -> bool {
        true
    }
}

/// A viewer that sees everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyViewer;

impl Viewer for AnyViewer {}

/// A local identity with board and author opt-outs.
#[derive(Debug, Clone)]
pub struct OwnIdentity {
    id: AuthorId,
    nickname: String,
    ignored_boards: HashSet<BoardName>,
    ignored_authors: HashSet<AuthorId>,
}

impl OwnIdentity {
    /// Creates an identity from its public request key.
    pub fn new(request_key: &str, nickname: impl Into<String>) -> Self {
        Self {
            id: AuthorId::compute(request_key),
            nickname: nickname.into(),
            ignored_boards: HashSet::new(),
            ignored_authors: HashSet::new(),
        }
    }

    /// Returns the author id of this identity.
    pub fn id(&self) -> &AuthorId {
        &self.id
    }

    /// Returns the nickname.
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Hides a board from this identity's listings.
    pub fn ignore_board(&mut self, board: BoardName) {
        self.ignored_boards.insert(board);
    }

    /// Hides threads started by `author`. An identity never ignores itself.
    pub fn ignore_author(&mut self, author: AuthorId) {
        if author != self.id {
            self.ignored_authors.insert(author);
        }
    }
}

impl Viewer for OwnIdentity {
    fn wants_board(&self, board: &BoardName) -> bool {
        !self.ignored_boards.contains(board)
    }

    fn wants_messages_from(&self, author: &AuthorId) -> bool {
        !self.ignored_authors.contains(author)
    }
}
