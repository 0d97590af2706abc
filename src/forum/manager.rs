//! Per-namespace message manager.
//!
//! The manager owns the message store, the board index and the board
//! registry of one namespace, and runs every incoming message through the
//! same pipeline:
//!
//! ```text
//! validate -> duplicate check -> structural check -> board check
//!          -> store -> resolve -> index
//! ```
//!
//! Everything before "store" may reject the message, in which case nothing
//! changes. Unknown boards are the exception: the message is kept and
//! indexed under the boards that are known, and the caller is told about the
//! rest through [`ThreadTreeError::UnknownBoard`].

use crate::config::ForumConfig;
use crate::dag::nodes_in_topological_order;
use crate::error::{Result, ThreadTreeError};
use crate::forum::board::{BoardName, BoardRegistry};
use crate::forum::identity::Viewer;
use crate::forum::index::{BoardIndex, ReplyLink, ThreadRootLink};
use crate::forum::message::Message;
use crate::forum::resolver::{IndexUpdate, ThreadResolver};
use crate::forum::store::{MessageStore, PutOutcome};
use crate::forum::types::MessageId;
use std::collections::BTreeSet;
use tracing::{debug, error, info, instrument, warn};

/// Result of a successful [`MessageManager::on_message_received`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The message was stored and indexed.
    Stored,
    /// The message was already stored. Nothing changed.
    Duplicate,
}

/// Store, index and board registry of one namespace.
#[derive(Debug)]
pub struct MessageManager {
    config: ForumConfig,
    registry: BoardRegistry,
    store: MessageStore,
    index: BoardIndex,
    resolver: ThreadResolver,
    /// Arrival counter, used to break activity ties.
    next_seq: u64,
}

impl Default for MessageManager {
    fn default() -> Self {
        Self::new(ForumConfig::default())
    }
}

impl MessageManager {
    /// Creates an empty manager.
    pub fn new(config: ForumConfig) -> Self {
        Self {
            config,
            registry: BoardRegistry::new(),
            store: MessageStore::new(),
            index: BoardIndex::new(),
            resolver: ThreadResolver::new(),
            next_seq: 0,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ForumConfig {
        &self.config
    }

    // ========================================================================
    // Boards
    // ========================================================================

    /// Registers a board.
    ///
    /// # Errors
    /// Returns `InvalidBoard` if the name is not valid or the board exists.
    pub fn create_board(&mut self, name: &str) -> Result<BoardName> {
        let board = BoardName::new(name)?;
        if !self.registry.register(board.clone()) {
            return Err(ThreadTreeError::invalid_board(format!(
                "Board {} already exists",
                board
            )));
        }
        self.index.ensure_board(&board);
        info!("Created board {}", board);
        Ok(board)
    }

    /// Returns the board with this name, registering it if needed.
    pub fn get_or_create_board(&mut self, name: &str) -> Result<BoardName> {
        let board = BoardName::new(name)?;
        if self.registry.register(board.clone()) {
            self.index.ensure_board(&board);
            info!("Created board {}", board);
        }
        Ok(board)
    }

    /// Checks if a board is registered.
    pub fn has_board(&self, board: &BoardName) -> bool {
        self.registry.contains(board)
    }

    /// Returns all registered boards in name order.
    pub fn boards(&self) -> impl Iterator<Item = &BoardName> {
        self.registry.iter()
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Stores a message and links it into its thread.
    ///
    /// Messages may arrive in any order. A message whose parent or thread
    /// root is not known yet is filed against a ghost, and is re-placed when
    /// the missing message arrives.
    ///
    /// # Errors
    /// * `InvalidMessage` / `MalformedReference` - the message is not well
    ///   formed. Nothing is stored.
    /// * `StructuralCycle` - the message would become its own ancestor.
    ///   Nothing is stored.
    /// * `UnknownBoard` - some of the message's boards are not registered.
    ///   The message IS stored and indexed under its known boards.
    #[instrument(skip(self, message), fields(message_id = %message.id()))]
    pub fn on_message_received(&mut self, message: Message) -> Result<IngestOutcome> {
        if let Err(e) = message.validate(&self.config.limits) {
            warn!("Rejected message {}: {}", message.id().short(), e);
            return Err(e);
        }

        if self.store.is_real(message.id()) {
            debug!("Duplicate delivery of {}", message.id().short());
            return Ok(IngestOutcome::Duplicate);
        }

        if let Err(e) = self.resolver.check_structure(&self.store, &message) {
            warn!("Rejected message {}: {}", message.id().short(), e);
            return Err(e);
        }

        if self.config.auto_create_boards {
            for board in message.boards() {
                if self.registry.register(board.clone()) {
                    self.index.ensure_board(board);
                    info!("Auto-created board {}", board);
                }
            }
        }
        let (known, unknown) = self.registry.partition(message.boards());

        let message_id = message.id().clone();
        self.index_message(message, &known)?;

        if !unknown.is_empty() {
            warn!(
                "Message {} names {} unknown board(s)",
                message_id.short(),
                unknown.len()
            );
            return Err(ThreadTreeError::UnknownBoard {
                message_id: message_id.to_string(),
                boards: unknown.iter().map(ToString::to_string).collect(),
            });
        }

        Ok(IngestOutcome::Stored)
    }

    /// Store, resolve and index steps for an already checked message.
    fn index_message(&mut self, message: Message, boards: &BTreeSet<BoardName>) -> Result<()> {
        let message_id = message.id().clone();
        let is_root = message.is_thread_root();
        let seq = self.next_seq;

        let promoted = match self.store.put(message) {
            PutOutcome::Inserted => None,
            PutOutcome::Promoted { children } => {
                info!(
                    "Message {} replaced a ghost with {} waiting children",
                    message_id.short(),
                    children.len()
                );
                Some(children)
            }
            PutOutcome::Duplicate => return Ok(()),
        };
        self.next_seq += 1;

        let updates =
            self.resolver
                .resolve(&mut self.store, &message_id, boards, seq, promoted.as_deref())?;
        debug!("Applying {} index updates", updates.len());
        for update in updates {
            self.apply(update);
        }

        if is_root {
            info!("New thread {}", message_id.short());
        }
        Ok(())
    }

    fn apply(&mut self, update: IndexUpdate) {
        match update {
            IndexUpdate::NewThread {
                boards,
                thread_id,
                date,
                seq,
            } => self.index.note_new_thread(&boards, &thread_id, date, seq),
            IndexUpdate::Reply {
                boards,
                thread_id,
                message_id,
                date,
                seq,
                placement,
                root_date,
            } => self.index.note_reply(
                &boards,
                &thread_id,
                &message_id,
                date,
                seq,
                &placement,
                root_date,
            ),
            IndexUpdate::RootMaterialized {
                thread_id,
                date,
                seq,
            } => self.index.bump_thread(&thread_id, date, seq),
            IndexUpdate::Placement {
                thread_id,
                message_id,
                placement,
            } => self.index.set_placement(&thread_id, &message_id, &placement),
        }
    }

    // ========================================================================
    // Board views
    // ========================================================================

    /// Returns the threads of a board, most recently active first.
    ///
    /// Nothing is returned if the viewer opted out of the board. Threads
    /// whose delivered root was written by an author the viewer does not
    /// want are skipped. Threads with a ghost root are always listed.
    pub fn get_threads(&self, board: &BoardName, viewer: &dyn Viewer) -> Vec<&ThreadRootLink> {
        if !viewer.wants_board(board) {
            return Vec::new();
        }
        self.index
            .get_threads(board)
            .filter(|link| {
                self.store
                    .message(link.thread_id())
                    .map_or(true, |root| viewer.wants_messages_from(root.author()))
            })
            .collect()
    }

    /// Returns the replies of a thread on a board in chronological order.
    ///
    /// Without `recursive` only the replies shown directly under the root
    /// are returned.
    pub fn get_all_thread_replies(
        &self,
        board: &BoardName,
        thread_id: &MessageId,
        recursive: bool,
    ) -> Vec<&ReplyLink> {
        self.index
            .get_all_thread_replies(board, thread_id, recursive)
            .collect()
    }

    /// Returns the listing of a thread on a board.
    pub fn get_thread_reference(
        &self,
        board: &BoardName,
        thread_id: &MessageId,
    ) -> Option<&ThreadRootLink> {
        self.index.get_thread_reference(board, thread_id)
    }

    // ========================================================================
    // Store views
    // ========================================================================

    /// Looks up a delivered message.
    pub fn get_message(&self, id: &MessageId) -> Option<&Message> {
        self.store.message(id)
    }

    /// Returns the delivered messages linked directly under `id`, oldest
    /// first.
    ///
    /// Includes replies that declared `id` as their parent in any thread,
    /// and replies without a parent that fall back to `id` as their root.
    pub fn get_children(&self, id: &MessageId) -> Vec<&Message> {
        let mut children: Vec<&Message> = self
            .store
            .children(id)
            .iter()
            .filter_map(|child| self.store.message(child))
            .collect();
        children.sort_by(|a, b| a.date().cmp(&b.date()).then_with(|| a.id().cmp(b.id())));
        children
    }

    /// Checks if `id` is referenced but not delivered.
    pub fn is_ghost(&self, id: &MessageId) -> bool {
        self.store.is_ghost(id)
    }

    /// Returns the number of delivered messages.
    pub fn message_count(&self) -> usize {
        self.store.message_count()
    }

    /// Returns the number of ghosts.
    pub fn ghost_count(&self) -> usize {
        self.store.ghost_count()
    }

    // ========================================================================
    // Export and rebuild
    // ========================================================================

    /// Returns all delivered messages, parents before children.
    pub fn export_messages(&self) -> Vec<&Message> {
        nodes_in_topological_order(self.store.messages())
    }

    /// Serializes [`Self::export_messages`] as a JSON array.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export_messages())?)
    }

    /// Drops the board index and replays every stored message.
    ///
    /// Messages are replayed in topological order against the current board
    /// registry, so messages stored before their board was created become
    /// visible. With distinct dates the rebuilt views equal the incremental
    /// ones. Replay runs the structural check again; if any message fails,
    /// the previous store and index are kept and the error is returned.
    pub fn rebuild_indexes(&mut self) -> Result<()> {
        let messages: Vec<Message> = self.export_messages().into_iter().cloned().collect();
        info!("Rebuilding indexes from {} messages", messages.len());

        let previous = (
            std::mem::take(&mut self.store),
            std::mem::take(&mut self.index),
            std::mem::take(&mut self.next_seq),
        );
        for board in self.registry.iter() {
            self.index.ensure_board(board);
        }

        if let Err(e) = self.replay(messages) {
            error!("Index rebuild failed, keeping previous indexes: {}", e);
            (self.store, self.index, self.next_seq) = previous;
            return Err(e);
        }
        Ok(())
    }

    fn replay(&mut self, messages: Vec<Message>) -> Result<()> {
        for message in messages {
            self.resolver.check_structure(&self.store, &message)?;
            let (known, _) = self.registry.partition(message.boards());
            self.index_message(message, &known)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::identity::{AnyViewer, OwnIdentity};
    use crate::forum::types::{AuthorId, MessageUri};

    struct Fixture {
        manager: MessageManager,
        board: BoardName,
        author: AuthorId,
    }

    fn fixture() -> Fixture {
        let mut manager = MessageManager::default();
        let board = manager.create_board("en.test").unwrap();
        Fixture {
            manager,
            board,
            author: AuthorId::compute("SSK@manager-test/WoT"),
        }
    }

    impl Fixture {
        fn message(
            &self,
            thread: Option<&MessageId>,
            parent: Option<&MessageId>,
            date: u64,
        ) -> Message {
            Message::new(
                MessageUri::generate(self.author, 0),
                thread.cloned(),
                parent.cloned(),
                BTreeSet::from([self.board.clone()]),
                self.author,
                "title",
                date,
                "body",
            )
            .unwrap()
        }

        fn thread_ids(&self) -> Vec<MessageId> {
            self.manager
                .get_threads(&self.board, &AnyViewer)
                .into_iter()
                .map(|l| l.thread_id().clone())
                .collect()
        }
    }

    #[test]
    fn test_create_board_twice_fails() {
        let mut f = fixture();
        assert!(f.manager.create_board("en.test").is_err());
        assert_eq!(
            f.manager.get_or_create_board("en.test").unwrap(),
            f.board
        );
        assert_eq!(f.manager.boards().count(), 1);
    }

    #[test]
    fn test_thread_and_reply() {
        let mut f = fixture();
        let root = f.message(None, None, 10);
        let reply = f.message(Some(root.id()), Some(root.id()), 20);

        assert_eq!(
            f.manager.on_message_received(root.clone()).unwrap(),
            IngestOutcome::Stored
        );
        f.manager.on_message_received(reply.clone()).unwrap();

        assert_eq!(f.thread_ids(), vec![root.id().clone()]);
        let link = f.manager.get_thread_reference(&f.board, root.id()).unwrap();
        assert_eq!(link.last_activity(), 20);
        let replies = f.manager.get_all_thread_replies(&f.board, root.id(), false);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message_id(), reply.id());
    }

    #[test]
    fn test_duplicate_is_noop() {
        let mut f = fixture();
        let root = f.message(None, None, 10);
        f.manager.on_message_received(root.clone()).unwrap();
        assert_eq!(
            f.manager.on_message_received(root).unwrap(),
            IngestOutcome::Duplicate
        );
        assert_eq!(f.manager.message_count(), 1);
        assert_eq!(f.thread_ids().len(), 1);
    }

    #[test]
    fn test_unknown_board_still_indexed_under_known() {
        let mut f = fixture();
        let other = BoardName::new("de.test").unwrap();
        let root = Message::new(
            MessageUri::generate(f.author, 0),
            None,
            None,
            BTreeSet::from([f.board.clone(), other.clone()]),
            f.author,
            "title",
            10,
            "",
        )
        .unwrap();

        let err = f.manager.on_message_received(root.clone()).unwrap_err();
        assert!(matches!(
            err,
            ThreadTreeError::UnknownBoard { ref boards, .. } if boards == &vec!["de.test".to_string()]
        ));
        assert!(f.manager.get_message(root.id()).is_some());
        assert_eq!(f.thread_ids(), vec![root.id().clone()]);
        assert!(f.manager.get_threads(&other, &AnyViewer).is_empty());

        // Creating the board and rebuilding makes the message visible there.
        f.manager.create_board("de.test").unwrap();
        f.manager.rebuild_indexes().unwrap();
        assert_eq!(f.manager.get_threads(&other, &AnyViewer).len(), 1);
    }

    #[test]
    fn test_auto_create_boards() {
        let mut manager = MessageManager::new(ForumConfig {
            auto_create_boards: true,
            ..ForumConfig::default()
        });
        let author = AuthorId::compute("SSK@manager-test/WoT");
        let board = BoardName::new("en.auto").unwrap();
        let root = Message::new(
            MessageUri::generate(author, 0),
            None,
            None,
            BTreeSet::from([board.clone()]),
            author,
            "title",
            1,
            "",
        )
        .unwrap();
        assert_eq!(
            manager.on_message_received(root).unwrap(),
            IngestOutcome::Stored
        );
        assert!(manager.has_board(&board));
        assert_eq!(manager.get_threads(&board, &AnyViewer).len(), 1);
    }

    #[test]
    fn test_cycle_rejection_leaves_no_state() {
        let mut f = fixture();
        let uri_a = MessageUri::generate(f.author, 0);
        let id_a = uri_a.message_id();
        let b = f.message(None, Some(&id_a), 5);
        f.manager.on_message_received(b.clone()).unwrap();

        let a = Message::new(
            uri_a,
            None,
            Some(b.id().clone()),
            BTreeSet::from([f.board.clone()]),
            f.author,
            "a",
            6,
            "",
        )
        .unwrap();
        let err = f.manager.on_message_received(a).unwrap_err();
        assert!(matches!(err, ThreadTreeError::StructuralCycle { .. }));
        assert!(f.manager.is_ghost(&id_a));
        assert_eq!(f.manager.message_count(), 1);
        assert_eq!(f.thread_ids(), vec![b.id().clone()]);
    }

    #[test]
    fn test_cycle_through_thread_root_fallback_rejected() {
        let mut f = fixture();
        let uri_m = MessageUri::generate(f.author, 0);
        let id_m = uri_m.message_id();
        let r = f.message(None, Some(&id_m), 5);
        f.manager.on_message_received(r.clone()).unwrap();

        // No parent, so m would hang under r, which already hangs under m.
        let m = Message::new(
            uri_m,
            Some(r.id().clone()),
            None,
            BTreeSet::from([f.board.clone()]),
            f.author,
            "m",
            6,
            "",
        )
        .unwrap();
        let err = f.manager.on_message_received(m).unwrap_err();
        assert!(matches!(err, ThreadTreeError::StructuralCycle { .. }));
        assert!(f.manager.is_ghost(&id_m));
        assert!(f.manager.get_children(r.id()).is_empty());
        assert_eq!(f.thread_ids(), vec![r.id().clone()]);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut manager = MessageManager::new(ForumConfig {
            limits: crate::forum::MessageLimits {
                max_body_size: 4,
                ..Default::default()
            },
            ..ForumConfig::default()
        });
        let board = manager.create_board("en.test").unwrap();
        let author = AuthorId::compute("SSK@manager-test/WoT");
        let m = Message::new(
            MessageUri::generate(author, 0),
            None,
            None,
            BTreeSet::from([board]),
            author,
            "title",
            1,
            "too long",
        )
        .unwrap();
        let err = manager.on_message_received(m).unwrap_err();
        assert!(matches!(err, ThreadTreeError::InvalidMessage(_)));
        assert_eq!(manager.message_count(), 0);
    }

    #[test]
    fn test_get_children_sorted_and_real_only() {
        let mut f = fixture();
        let root = f.message(None, None, 10);
        let late = f.message(Some(root.id()), Some(root.id()), 30);
        let early = f.message(Some(root.id()), Some(root.id()), 20);
        f.manager.on_message_received(late.clone()).unwrap();
        f.manager.on_message_received(early.clone()).unwrap();
        assert!(f.manager.get_children(root.id()).len() == 2);
        assert!(f.manager.is_ghost(root.id()));

        f.manager.on_message_received(root.clone()).unwrap();
        let children: Vec<&MessageId> = f
            .manager
            .get_children(root.id())
            .into_iter()
            .map(Message::id)
            .collect();
        assert_eq!(children, vec![early.id(), late.id()]);
        assert_eq!(f.manager.ghost_count(), 0);
    }

    #[test]
    fn test_viewer_filters_board_and_author() {
        let mut f = fixture();
        let root = f.message(None, None, 10);
        f.manager.on_message_received(root).unwrap();

        let mut viewer = OwnIdentity::new("SSK@viewer/WoT", "viewer");
        assert_eq!(f.manager.get_threads(&f.board, &viewer).len(), 1);

        viewer.ignore_author(f.author);
        assert!(f.manager.get_threads(&f.board, &viewer).is_empty());

        let mut viewer = OwnIdentity::new("SSK@viewer/WoT", "viewer");
        viewer.ignore_board(f.board.clone());
        assert!(f.manager.get_threads(&f.board, &viewer).is_empty());
    }

    #[test]
    fn test_export_parents_first_and_json() {
        let mut f = fixture();
        let root = f.message(None, None, 30);
        let reply = f.message(Some(root.id()), Some(root.id()), 10);
        f.manager.on_message_received(reply.clone()).unwrap();
        f.manager.on_message_received(root.clone()).unwrap();

        let exported: Vec<&MessageId> = f
            .manager
            .export_messages()
            .into_iter()
            .map(Message::id)
            .collect();
        assert_eq!(exported, vec![root.id(), reply.id()]);

        let json = f.manager.export_json().unwrap();
        let decoded: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, vec![root, reply]);
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut f = fixture();
        let root = f.message(None, None, 10);
        let r0 = f.message(Some(root.id()), Some(root.id()), 20);
        let r1 = f.message(Some(root.id()), Some(r0.id()), 30);
        let other = f.message(None, None, 25);
        for m in [r1.clone(), other.clone(), root.clone(), r0.clone()] {
            f.manager.on_message_received(m).unwrap();
        }

        let threads_before = f.thread_ids();
        let replies_before: Vec<ReplyLink> = f
            .manager
            .get_all_thread_replies(&f.board, root.id(), true)
            .into_iter()
            .cloned()
            .collect();

        f.manager.rebuild_indexes().unwrap();

        assert_eq!(f.thread_ids(), threads_before);
        let replies_after: Vec<(MessageId, bool)> = f
            .manager
            .get_all_thread_replies(&f.board, root.id(), true)
            .into_iter()
            .map(|l| (l.message_id().clone(), l.is_top_level()))
            .collect();
        let expected: Vec<(MessageId, bool)> = replies_before
            .iter()
            .map(|l| (l.message_id().clone(), l.is_top_level()))
            .collect();
        assert_eq!(replies_after, expected);
        assert_eq!(threads_before, vec![root.id().clone(), other.id().clone()]);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_indexes() {
        let mut f = fixture();
        let root = f.message(None, None, 10);
        let reply = f.message(Some(root.id()), Some(root.id()), 20);
        f.manager.on_message_received(root.clone()).unwrap();
        f.manager.on_message_received(reply.clone()).unwrap();

        // Two messages naming each other as parent, placed in the store
        // without going through ingestion.
        let (uri_a, uri_b) = (
            MessageUri::generate(f.author, 1),
            MessageUri::generate(f.author, 2),
        );
        let (id_a, id_b) = (uri_a.message_id(), uri_b.message_id());
        let looped = |uri: MessageUri, parent: &MessageId, date| {
            Message::new(
                uri,
                None,
                Some(parent.clone()),
                BTreeSet::from([f.board.clone()]),
                f.author,
                "loop",
                date,
                "",
            )
            .unwrap()
        };
        let a = looped(uri_a, &id_b, 30);
        let b = looped(uri_b, &id_a, 40);
        f.manager.store.put(a);
        f.manager.store.put(b);
        let seq = f.manager.next_seq;

        let err = f.manager.rebuild_indexes().unwrap_err();
        assert!(matches!(err, ThreadTreeError::StructuralCycle { .. }));

        assert_eq!(f.thread_ids(), vec![root.id().clone()]);
        let replies: Vec<&MessageId> = f
            .manager
            .get_all_thread_replies(&f.board, root.id(), true)
            .into_iter()
            .map(ReplyLink::message_id)
            .collect();
        assert_eq!(replies, vec![reply.id()]);
        assert_eq!(f.manager.message_count(), 4);
        assert_eq!(f.manager.next_seq, seq);
    }
}
