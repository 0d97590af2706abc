//! Message arena with ghost placeholders.
//!
//! The store maps every known message id to a record. A record is either the
//! real message or a ghost: a placeholder for an id that some message
//! referenced (as parent or thread root) before the message itself arrived.
//! Both variants carry the list of children attached to them, so promoting a
//! ghost is a single in-place variant swap that keeps the children.
//!
//! The store is the only owner of message records. Everything else refers to
//! messages by id.

use crate::forum::message::Message;
use crate::forum::types::MessageId;
use std::collections::HashMap;
use tracing::debug;

/// Payload of a stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    /// The message has been delivered.
    Real(Message),
    /// Referenced but not delivered yet.
    Ghost,
}

/// A record in the message arena.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    id: MessageId,
    kind: RecordKind,
    /// Messages that declared this record as their parent, or that fell back
    /// to it as thread root. Insertion order, no duplicates.
    children: Vec<MessageId>,
}

impl StoredRecord {
    fn ghost(id: MessageId) -> Self {
        Self {
            id,
            kind: RecordKind::Ghost,
            children: Vec::new(),
        }
    }

    /// Returns the record id.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the record payload.
    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    /// Returns the message if this record is real.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            RecordKind::Real(message) => Some(message),
            RecordKind::Ghost => None,
        }
    }

    /// Returns true if this record is a ghost.
    pub fn is_ghost(&self) -> bool {
        matches!(self.kind, RecordKind::Ghost)
    }

    /// Returns the ids of the children attached to this record.
    pub fn children(&self) -> &[MessageId] {
        &self.children
    }
}

/// Outcome of [`MessageStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The id was unknown; a new record was created.
    Inserted,
    /// A ghost was replaced by the message. `children` were waiting on it.
    Promoted { children: Vec<MessageId> },
    /// A real message with this id already exists. Nothing changed.
    Duplicate,
}

/// Arena of messages and ghosts keyed by message id.
#[derive(Debug, Default)]
pub struct MessageStore {
    records: HashMap<MessageId, StoredRecord>,
    real_count: usize,
}

impl MessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a message.
    ///
    /// Promotes a ghost with the same id in place, keeping its children.
    /// A second delivery of an already stored message is a no-op.
    pub fn put(&mut self, message: Message) -> PutOutcome {
        let id = message.id().clone();

        match self.records.get_mut(&id) {
            Some(record) if record.is_ghost() => {
                record.kind = RecordKind::Real(message);
                self.real_count += 1;
                debug!(
                    "Promoted ghost {} with {} waiting children",
                    id.short(),
                    record.children.len()
                );
                PutOutcome::Promoted {
                    children: record.children.clone(),
                }
            }
            Some(_) => PutOutcome::Duplicate,
            None => {
                self.records.insert(
                    id.clone(),
                    StoredRecord {
                        id,
                        kind: RecordKind::Real(message),
                        children: Vec::new(),
                    },
                );
                self.real_count += 1;
                PutOutcome::Inserted
            }
        }
    }

    /// Returns the record for `id`, creating a ghost if the id is unknown.
    ///
    /// The flag is true if a ghost was created by this call.
    pub fn get_or_create_ghost(&mut self, id: &MessageId) -> (&StoredRecord, bool) {
        let mut created = false;
        let record = self.records.entry(id.clone()).or_insert_with(|| {
            created = true;
            StoredRecord::ghost(id.clone())
        });
        if created {
            debug!("Created ghost {}", id.short());
        }
        (record, created)
    }

    /// Attaches `child` under `parent`, creating a ghost parent if needed.
    ///
    /// Returns true if a ghost was created for the parent. Attaching the
    /// same child twice keeps a single entry.
    pub fn attach_child(&mut self, parent: &MessageId, child: &MessageId) -> bool {
        let mut created = false;
        let record = self.records.entry(parent.clone()).or_insert_with(|| {
            created = true;
            StoredRecord::ghost(parent.clone())
        });
        if !record.children.contains(child) {
            record.children.push(child.clone());
        }
        created
    }

    /// Looks up a record by id.
    pub fn lookup(&self, id: &MessageId) -> Option<&StoredRecord> {
        self.records.get(id)
    }

    /// Looks up a delivered message by id.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.records.get(id).and_then(StoredRecord::message)
    }

    /// Checks if a real message with this id is stored.
    pub fn is_real(&self, id: &MessageId) -> bool {
        self.message(id).is_some()
    }

    /// Checks if this id is currently a ghost.
    pub fn is_ghost(&self, id: &MessageId) -> bool {
        self.records.get(id).is_some_and(StoredRecord::is_ghost)
    }

    /// Returns the children attached to `id`, or an empty slice.
    pub fn children(&self, id: &MessageId) -> &[MessageId] {
        self.records
            .get(id)
            .map(StoredRecord::children)
            .unwrap_or(&[])
    }

    /// Returns an iterator over all delivered messages (arbitrary order).
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.records.values().filter_map(StoredRecord::message)
    }

    /// Returns the number of delivered messages.
    pub fn message_count(&self) -> usize {
        self.real_count
    }

    /// Returns the number of ghosts.
    pub fn ghost_count(&self) -> usize {
        self.records.len() - self.real_count
    }
}
