//! Thread-safe handle around a [`MessageManager`].
//!
//! Ingestion takes the write lock. Reads take the read lock and return owned
//! snapshots so no guard escapes the call.

use crate::config::ForumConfig;
use crate::error::Result;
use crate::forum::board::BoardName;
use crate::forum::identity::Viewer;
use crate::forum::index::{ReplyLink, ThreadRootLink};
use crate::forum::manager::{IngestOutcome, MessageManager};
use crate::forum::message::Message;
use crate::forum::types::MessageId;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

/// Acquires a read lock on the manager, recovering from poison if necessary.
fn acquire_read_lock(manager: &RwLock<MessageManager>) -> RwLockReadGuard<'_, MessageManager> {
    manager.read().unwrap_or_else(|poisoned| {
        error!("RwLock was poisoned on read, recovering");
        poisoned.into_inner()
    })
}

/// Acquires a write lock on the manager, recovering from poison if necessary.
fn acquire_write_lock(manager: &RwLock<MessageManager>) -> RwLockWriteGuard<'_, MessageManager> {
    manager.write().unwrap_or_else(|poisoned| {
        error!("RwLock was poisoned on write, recovering");
        poisoned.into_inner()
    })
}

/// Cloneable, thread-safe [`MessageManager`].
#[derive(Debug, Clone, Default)]
pub struct SharedMessageManager {
    inner: Arc<RwLock<MessageManager>>,
}

impl SharedMessageManager {
    /// Creates an empty shared manager.
    pub fn new(config: ForumConfig) -> Self {
        Self::from_manager(MessageManager::new(config))
    }

    /// Wraps an existing manager.
    pub fn from_manager(manager: MessageManager) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manager)),
        }
    }

    /// See [`MessageManager::create_board`].
    pub fn create_board(&self, name: &str) -> Result<BoardName> {
        acquire_write_lock(&self.inner).create_board(name)
    }

    /// See [`MessageManager::get_or_create_board`].
    pub fn get_or_create_board(&self, name: &str) -> Result<BoardName> {
        acquire_write_lock(&self.inner).get_or_create_board(name)
    }

    /// See [`MessageManager::on_message_received`].
    pub fn on_message_received(&self, message: Message) -> Result<IngestOutcome> {
        acquire_write_lock(&self.inner).on_message_received(message)
    }

    /// See [`MessageManager::rebuild_indexes`].
    pub fn rebuild_indexes(&self) -> Result<()> {
        acquire_write_lock(&self.inner).rebuild_indexes()
    }

    /// See [`MessageManager::get_threads`].
    pub fn get_threads(&self, board: &BoardName, viewer: &dyn Viewer) -> Vec<ThreadRootLink> {
        acquire_read_lock(&self.inner)
            .get_threads(board, viewer)
            .into_iter()
            .cloned()
            .collect()
    }

    /// See [`MessageManager::get_all_thread_replies`].
    pub fn get_all_thread_replies(
        &self,
        board: &BoardName,
        thread_id: &MessageId,
        recursive: bool,
    ) -> Vec<ReplyLink> {
        acquire_read_lock(&self.inner)
            .get_all_thread_replies(board, thread_id, recursive)
            .into_iter()
            .cloned()
            .collect()
    }

    /// See [`MessageManager::get_thread_reference`].
    pub fn get_thread_reference(
        &self,
        board: &BoardName,
        thread_id: &MessageId,
    ) -> Option<ThreadRootLink> {
        acquire_read_lock(&self.inner)
            .get_thread_reference(board, thread_id)
            .cloned()
    }

    /// See [`MessageManager::get_message`].
    pub fn get_message(&self, id: &MessageId) -> Option<Message> {
        acquire_read_lock(&self.inner).get_message(id).cloned()
    }

    /// See [`MessageManager::is_ghost`].
    pub fn is_ghost(&self, id: &MessageId) -> bool {
        acquire_read_lock(&self.inner).is_ghost(id)
    }

    /// See [`MessageManager::message_count`].
    pub fn message_count(&self) -> usize {
        acquire_read_lock(&self.inner).message_count()
    }

    /// Runs `f` with shared access to the manager.
    pub fn read<R>(&self, f: impl FnOnce(&MessageManager) -> R) -> R {
        f(&acquire_read_lock(&self.inner))
    }
}
