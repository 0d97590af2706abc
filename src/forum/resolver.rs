//! Incremental thread-tree resolution.
//!
//! Messages arrive in arbitrary order. When one is stored, the resolver:
//!
//! 1. Resolves its thread root. No declared root means the message starts a
//!    thread. A declared root that is unknown becomes a ghost, and the ghost
//!    is listed as a thread that has not materialized yet.
//! 2. Resolves its parent. A declared parent (real or ghost) gets the message
//!    attached as a child, even if the parent lives in another thread. With
//!    no declared parent a reply attaches directly under its thread root.
//! 3. If the message replaced a ghost, re-resolves every child that was
//!    waiting on it so replies filed flat under the root while their parent
//!    was missing get nested under the real parent.
//!
//! Thread membership for indexing always comes from the message's own
//! declared root, never from its parent. A reply whose parent sits in a
//! different thread is still filed in its declared thread.
//!
//! Structural checks run in [`ThreadResolver::check_structure`] before the
//! store is touched, so a rejected message leaves no trace.

use crate::dag::{reaches, ParentLinked};
use crate::error::{Result, ThreadTreeError};
use crate::forum::board::BoardName;
use crate::forum::index::ReplyPlacement;
use crate::forum::message::Message;
use crate::forum::store::MessageStore;
use crate::forum::types::MessageId;
use std::collections::BTreeSet;
use tracing::{debug, error};

/// An index change produced by resolving one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexUpdate {
    /// List `thread_id` on `boards` (or bump it there to `date`).
    NewThread {
        boards: BTreeSet<BoardName>,
        thread_id: MessageId,
        date: u64,
        seq: u64,
    },
    /// File `message_id` as a reply in `thread_id` on `boards`.
    Reply {
        boards: BTreeSet<BoardName>,
        thread_id: MessageId,
        message_id: MessageId,
        date: u64,
        seq: u64,
        placement: ReplyPlacement,
        root_date: Option<u64>,
    },
    /// A thread root arrived after some of its replies: bump its listings
    /// and give them the root's arrival `seq`.
    RootMaterialized {
        thread_id: MessageId,
        date: u64,
        seq: u64,
    },
    /// A reply's placement changed because its parent was delivered.
    Placement {
        thread_id: MessageId,
        message_id: MessageId,
        placement: ReplyPlacement,
    },
}

/// Resolves thread and parent linkage for stored messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadResolver;

impl ThreadResolver {
    /// Creates a resolver.
    pub fn new() -> Self {
        Self
    }

    /// Rejects messages that would make themselves their own ancestor.
    ///
    /// Ancestry follows each message's anchor: its declared parent, or its
    /// thread root when it names no parent. Must run before the message is
    /// stored.
    pub fn check_structure(&self, store: &MessageStore, message: &Message) -> Result<()> {
        let id = message.id();

        if message.parent_id() == Some(id) {
            return Err(ThreadTreeError::structural_cycle(
                id,
                "message declares itself as parent",
            ));
        }
        if message.thread_root_id() == Some(id) {
            return Err(ThreadTreeError::structural_cycle(
                id,
                "message declares itself as thread root",
            ));
        }
        // The message is attached under its anchor (declared parent, else
        // thread root). Earlier messages may already hang below it as a
        // ghost, so an anchor that descends from it would close a loop.
        for anchor in message.parent_ids() {
            if reaches::<Message, _>(&anchor, id, |candidate| store.message(candidate)) {
                return Err(ThreadTreeError::structural_cycle(
                    id,
                    format!("anchor {} descends from the message", anchor),
                ));
            }
        }
        Ok(())
    }

    /// Links a freshly stored message into its thread.
    ///
    /// `boards` are the boards the message is indexed on (its declared boards
    /// minus unknown ones). `promoted_children` is the list returned by
    /// [`MessageStore::put`] when the message replaced a ghost.
    pub fn resolve(
        &self,
        store: &mut MessageStore,
        message_id: &MessageId,
        boards: &BTreeSet<BoardName>,
        seq: u64,
        promoted_children: Option<&[MessageId]>,
    ) -> Result<Vec<IndexUpdate>> {
        let mut updates = Vec::new();
        self.link(store, message_id, boards, seq, &mut updates)?;

        if let Some(children) = promoted_children {
            let date = store
                .message(message_id)
                .map(Message::date)
                .ok_or_else(|| {
                    ThreadTreeError::internal(format!("promoted {} is not stored", message_id))
                })?;
            updates.push(IndexUpdate::RootMaterialized {
                thread_id: message_id.clone(),
                date,
                seq,
            });
            self.cascade(store, message_id, children, &mut updates)?;
        }

        Ok(updates)
    }

    /// Steps 1 and 2 for a single message.
    fn link(
        &self,
        store: &mut MessageStore,
        message_id: &MessageId,
        boards: &BTreeSet<BoardName>,
        seq: u64,
        updates: &mut Vec<IndexUpdate>,
    ) -> Result<()> {
        let message = store
            .message(message_id)
            .cloned()
            .ok_or_else(|| ThreadTreeError::internal(format!("{} is not stored", message_id)))?;

        match message.thread_root_id() {
            None => {
                debug!("{} starts a new thread", message_id.short());
                updates.push(IndexUpdate::NewThread {
                    boards: boards.clone(),
                    thread_id: message_id.clone(),
                    date: message.date(),
                    seq,
                });
            }
            Some(root) => {
                let (_, created) = store.get_or_create_ghost(root);
                if created {
                    debug!(
                        "Thread root {} of {} not delivered yet",
                        root.short(),
                        message_id.short()
                    );
                    updates.push(IndexUpdate::NewThread {
                        boards: boards.clone(),
                        thread_id: root.clone(),
                        date: message.date(),
                        seq,
                    });
                }
            }
        }

        match (message.parent_id(), message.thread_root_id()) {
            (Some(parent), _) => {
                store.attach_child(parent, message_id);
            }
            (None, Some(root)) => {
                store.attach_child(root, message_id);
            }
            (None, None) => {}
        }

        if let Some(root) = message.thread_root_id() {
            updates.push(IndexUpdate::Reply {
                boards: boards.clone(),
                thread_id: root.clone(),
                message_id: message_id.clone(),
                date: message.date(),
                seq,
                placement: Self::placement(store, &message),
                root_date: store.message(root).map(Message::date),
            });
        }

        Ok(())
    }

    /// Re-resolves the children that were waiting on a promoted ghost.
    ///
    /// A child's placement only depends on its direct parent, and re-linking
    /// never promotes another ghost, so the cascade stops at the children.
    fn cascade(
        &self,
        store: &mut MessageStore,
        promoted: &MessageId,
        children: &[MessageId],
        updates: &mut Vec<IndexUpdate>,
    ) -> Result<()> {
        for child_id in children {
            let child = match store.message(child_id) {
                Some(child) => child.clone(),
                None => {
                    error!(
                        "Child {} of promoted {} is not a delivered message",
                        child_id, promoted
                    );
                    return Err(ThreadTreeError::internal(format!(
                        "child {} of {} is not stored",
                        child_id, promoted
                    )));
                }
            };

            // Re-attach: a no-op unless the child's linkage was lost.
            let anchor = child.parent_id().or(child.thread_root_id());
            if let Some(anchor) = anchor {
                if store.attach_child(anchor, child_id) {
                    error!("Cascade recreated ghost {} for {}", anchor, child_id);
                    return Err(ThreadTreeError::internal(format!(
                        "anchor {} of {} vanished during cascade",
                        anchor, child_id
                    )));
                }
            }

            if let Some(root) = child.thread_root_id() {
                let placement = Self::placement(store, &child);
                debug!(
                    "Cascade: {} placed {:?} in thread {}",
                    child_id.short(),
                    placement,
                    root.short()
                );
                updates.push(IndexUpdate::Placement {
                    thread_id: root.clone(),
                    message_id: child_id.clone(),
                    placement,
                });
            }
        }
        Ok(())
    }

    /// Where a reply is shown inside its declared thread.
    fn placement(store: &MessageStore, message: &Message) -> ReplyPlacement {
        let (Some(parent_id), Some(root)) = (message.parent_id(), message.thread_root_id()) else {
            return ReplyPlacement::TopLevel;
        };
        if parent_id == root {
            return ReplyPlacement::TopLevel;
        }
        match store.message(parent_id) {
            Some(parent) if parent.thread_root_id() == Some(root) => ReplyPlacement::Nested {
                parent: parent_id.clone(),
            },
            _ => ReplyPlacement::TopLevel,
        }
    }
}
