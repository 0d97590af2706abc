//! Per-board secondary indexes.
//!
//! For every board the index keeps:
//! - `threads`: thread id → `ThreadRootLink`, plus an activity-ordered view
//!   (most recently active first) for listing threads
//! - `replies`: thread id → replies filed in that thread on this board,
//!   ordered by declared date with arrival sequence as tie-break
//!
//! ## Activity ordering
//!
//! A thread's activity timestamp is the latest date among its root and all
//! replies filed on the board. It is only ever bumped upward: a reply newer
//! than anything seen moves the thread to the front, an older one leaves it
//! where it is. Repositioning is a remove + reinsert of the one affected
//! entry in a `BTreeMap`, so ingestion cost does not depend on board size
//! beyond the logarithmic seek.
//!
//! The index only stores ids. Message records are resolved through the
//! message store when a caller needs them.

use crate::forum::board::BoardName;
use crate::forum::types::MessageId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A thread listed on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRootLink {
    board: BoardName,
    thread_id: MessageId,
    last_activity: u64,
    seq: u64,
}

impl ThreadRootLink {
    /// Returns the board this link belongs to.
    pub fn board(&self) -> &BoardName {
        &self.board
    }

    /// Returns the id of the thread root (which may still be a ghost).
    pub fn thread_id(&self) -> &MessageId {
        &self.thread_id
    }

    /// Returns the latest date seen for the root and its replies on this board.
    pub fn last_activity(&self) -> u64 {
        self.last_activity
    }

    /// Returns the arrival sequence number used to break activity ties.
    ///
    /// This is the root's own arrival once it is delivered. Until then it is
    /// the arrival of the reply that first listed the thread.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    fn key(&self) -> ActivityKey {
        ActivityKey {
            last_activity: Reverse(self.last_activity),
            seq: Reverse(self.seq),
        }
    }
}

/// Where a reply is shown within its thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplyPlacement {
    /// Directly under the thread root. Also used while the declared parent is
    /// unknown or lives in another thread.
    TopLevel,
    /// Under a delivered parent that is filed in the same thread on the same
    /// board.
    Nested { parent: MessageId },
}

/// A reply filed in a thread on a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyLink {
    board: BoardName,
    thread_id: MessageId,
    message_id: MessageId,
    date: u64,
    seq: u64,
    placement: ReplyPlacement,
}

impl ReplyLink {
    /// Returns the board this reply is filed on.
    pub fn board(&self) -> &BoardName {
        &self.board
    }

    /// Returns the thread this reply is filed in.
    pub fn thread_id(&self) -> &MessageId {
        &self.thread_id
    }

    /// Returns the id of the reply message.
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Returns the declared date of the reply.
    pub fn date(&self) -> u64 {
        self.date
    }

    /// Returns the arrival sequence number of the reply.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns where the reply is shown in its thread.
    pub fn placement(&self) -> &ReplyPlacement {
        &self.placement
    }

    /// Returns true if the reply is shown directly under the thread root.
    pub fn is_top_level(&self) -> bool {
        self.placement == ReplyPlacement::TopLevel
    }
}

/// Sort key for the activity view: newest activity first, then latest link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ActivityKey {
    last_activity: Reverse<u64>,
    seq: Reverse<u64>,
}

/// Sort key for a thread's replies: oldest date first, then earliest arrival.
type ReplyKey = (u64, u64);

#[derive(Debug, Default)]
struct ThreadReplies {
    ordered: BTreeMap<ReplyKey, ReplyLink>,
    positions: HashMap<MessageId, ReplyKey>,
}

/// Thread and reply indexes for a single board.
#[derive(Debug)]
pub struct BoardThreads {
    board: BoardName,
    by_activity: BTreeMap<ActivityKey, MessageId>,
    threads: HashMap<MessageId, ThreadRootLink>,
    replies: HashMap<MessageId, ThreadReplies>,
}

impl BoardThreads {
    fn new(board: BoardName) -> Self {
        Self {
            board,
            by_activity: BTreeMap::new(),
            threads: HashMap::new(),
            replies: HashMap::new(),
        }
    }

    /// Creates the link for `thread_id` or bumps its activity to `date`.
    fn note_thread(&mut self, thread_id: &MessageId, date: u64, seq: u64) {
        match self.threads.get_mut(thread_id) {
            Some(link) => {
                if date > link.last_activity {
                    self.by_activity.remove(&link.key());
                    link.last_activity = date;
                    self.by_activity.insert(link.key(), thread_id.clone());
                    debug!(
                        "Bumped thread {} on {} to {}",
                        thread_id.short(),
                        self.board,
                        date
                    );
                }
            }
            None => {
                let link = ThreadRootLink {
                    board: self.board.clone(),
                    thread_id: thread_id.clone(),
                    last_activity: date,
                    seq,
                };
                self.by_activity.insert(link.key(), thread_id.clone());
                self.threads.insert(thread_id.clone(), link);
                debug!("New thread {} on {}", thread_id.short(), self.board);
            }
        }
    }

    /// The root of a listed thread arrived: take over its arrival sequence
    /// and bump activity to its date.
    fn materialize(&mut self, thread_id: &MessageId, date: u64, seq: u64) {
        if let Some(link) = self.threads.get_mut(thread_id) {
            self.by_activity.remove(&link.key());
            link.last_activity = link.last_activity.max(date);
            link.seq = seq;
            self.by_activity.insert(link.key(), thread_id.clone());
        }
    }

    /// A reply can only nest under a parent filed in the same thread on this
    /// board. Otherwise it is shown at the top so the board still lists it.
    fn placement_on_board(
        &self,
        thread_id: &MessageId,
        placement: &ReplyPlacement,
    ) -> ReplyPlacement {
        match placement {
            ReplyPlacement::Nested { parent }
                if !self
                    .replies
                    .get(thread_id)
                    .is_some_and(|r| r.positions.contains_key(parent)) =>
            {
                ReplyPlacement::TopLevel
            }
            _ => placement.clone(),
        }
    }

    fn file_reply(&mut self, mut link: ReplyLink) -> bool {
        link.placement = self.placement_on_board(&link.thread_id, &link.placement);
        let replies = self.replies.entry(link.thread_id.clone()).or_default();
        if replies.positions.contains_key(&link.message_id) {
            return false;
        }
        let key = (link.date, link.seq);
        replies.positions.insert(link.message_id.clone(), key);
        replies.ordered.insert(key, link);
        true
    }

    fn set_placement(
        &mut self,
        thread_id: &MessageId,
        message_id: &MessageId,
        placement: &ReplyPlacement,
    ) {
        let placement = self.placement_on_board(thread_id, placement);
        if let Some(replies) = self.replies.get_mut(thread_id) {
            if let Some(key) = replies.positions.get(message_id) {
                if let Some(link) = replies.ordered.get_mut(key) {
                    link.placement = placement;
                }
            }
        }
    }

    /// Returns the board name.
    pub fn board(&self) -> &BoardName {
        &self.board
    }

    /// Returns the threads in activity order, most recently active first.
    pub fn threads(&self) -> impl Iterator<Item = &ThreadRootLink> + '_ {
        self.by_activity
            .values()
            .filter_map(move |id| self.threads.get(id))
    }

    /// Returns the link for a thread, if the thread is listed on this board.
    pub fn thread(&self, thread_id: &MessageId) -> Option<&ThreadRootLink> {
        self.threads.get(thread_id)
    }

    /// Returns the replies of a thread in chronological order.
    pub fn replies(&self, thread_id: &MessageId) -> impl Iterator<Item = &ReplyLink> + '_ {
        self.replies
            .get(thread_id)
            .into_iter()
            .flat_map(|r| r.ordered.values())
    }

    /// Returns the number of threads listed on this board.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Returns the number of replies filed in a thread on this board.
    pub fn reply_count(&self, thread_id: &MessageId) -> usize {
        self.replies
            .get(thread_id)
            .map(|r| r.ordered.len())
            .unwrap_or(0)
    }
}

/// Secondary indexes for every board of a namespace.
#[derive(Debug, Default)]
pub struct BoardIndex {
    boards: BTreeMap<BoardName, BoardThreads>,
}

impl BoardIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    fn board_mut(&mut self, board: &BoardName) -> &mut BoardThreads {
        self.boards
            .entry(board.clone())
            .or_insert_with(|| BoardThreads::new(board.clone()))
    }

    /// Makes sure `board` has an (initially empty) index.
    pub fn ensure_board(&mut self, board: &BoardName) {
        self.board_mut(board);
    }

    /// Lists `root_id` as a thread on every board in `boards`.
    ///
    /// Boards that already list the thread get their activity bumped to
    /// `date` if it is newer.
    pub fn note_new_thread<'a, I>(&mut self, boards: I, root_id: &MessageId, date: u64, seq: u64)
    where
        I: IntoIterator<Item = &'a BoardName>,
    {
        for board in boards {
            self.board_mut(board).note_thread(root_id, date, seq);
        }
    }

    /// Files a reply in its thread on every board in `boards` and bumps the
    /// thread's activity there.
    ///
    /// A nested placement only holds on boards where the parent is filed in
    /// the same thread.
    ///
    /// `root_date` is the date of the thread root if it has been delivered;
    /// a thread newly listed by this reply starts at the later of the two.
    /// Filing the same reply twice is a no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn note_reply<'a, I>(
        &mut self,
        boards: I,
        thread_id: &MessageId,
        message_id: &MessageId,
        date: u64,
        seq: u64,
        placement: &ReplyPlacement,
        root_date: Option<u64>,
    ) where
        I: IntoIterator<Item = &'a BoardName>,
    {
        for board in boards {
            let threads = self.board_mut(board);
            let filed = threads.file_reply(ReplyLink {
                board: board.clone(),
                thread_id: thread_id.clone(),
                message_id: message_id.clone(),
                date,
                seq,
                placement: placement.clone(),
            });
            if filed {
                let activity = root_date.map_or(date, |root| root.max(date));
                threads.note_thread(thread_id, activity, seq);
            }
        }
    }

    /// Bumps every existing listing of `thread_id` to at least `date` and
    /// moves its tie-break sequence to `seq`.
    ///
    /// Used when a thread root is delivered after some of its replies.
    pub fn bump_thread(&mut self, thread_id: &MessageId, date: u64, seq: u64) {
        for threads in self.boards.values_mut() {
            threads.materialize(thread_id, date, seq);
        }
    }

    /// Updates the placement of a reply on every board it is filed on.
    ///
    /// On boards where the parent is not filed in the thread the reply stays
    /// at the top level.
    pub fn set_placement(
        &mut self,
        thread_id: &MessageId,
        message_id: &MessageId,
        placement: &ReplyPlacement,
    ) {
        for threads in self.boards.values_mut() {
            threads.set_placement(thread_id, message_id, placement);
        }
    }

    /// Returns the index of a board.
    pub fn board(&self, board: &BoardName) -> Option<&BoardThreads> {
        self.boards.get(board)
    }

    /// Returns the names of all indexed boards.
    pub fn boards(&self) -> impl Iterator<Item = &BoardName> {
        self.boards.keys()
    }

    /// Returns the threads of a board in activity order. Empty for unknown boards.
    pub fn get_threads(&self, board: &BoardName) -> impl Iterator<Item = &ThreadRootLink> + '_ {
        self.boards
            .get(board)
            .into_iter()
            .flat_map(BoardThreads::threads)
    }

    /// Returns the replies of a thread on a board in chronological order.
    ///
    /// With `recursive` every reply filed in the thread is returned; without
    /// it only the replies shown directly under the thread root.
    pub fn get_all_thread_replies(
        &self,
        board: &BoardName,
        thread_id: &MessageId,
        recursive: bool,
    ) -> impl Iterator<Item = &ReplyLink> + '_ {
        self.boards
            .get(board)
            .map(|threads| threads.replies(thread_id))
            .into_iter()
            .flatten()
            .filter(move |link| recursive || link.is_top_level())
    }

    /// Returns the link of a thread on a board.
    pub fn get_thread_reference(
        &self,
        board: &BoardName,
        thread_id: &MessageId,
    ) -> Option<&ThreadRootLink> {
        self.boards.get(board).and_then(|b| b.thread(thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forum::types::{AuthorId, MessageUri};

    fn board() -> BoardName {
        BoardName::new("en.test").unwrap()
    }

    fn id() -> MessageId {
        MessageUri::generate(AuthorId::compute("SSK@index-test/WoT"), 0).message_id()
    }

    fn thread_ids(index: &BoardIndex) -> Vec<MessageId> {
        index
            .get_threads(&board())
            .map(|l| l.thread_id().clone())
            .collect()
    }

    #[test]
    fn test_new_threads_most_recent_first() {
        let mut index = BoardIndex::new();
        let (t0, t1) = (id(), id());
        index.note_new_thread([&board()], &t0, 100, 0);
        index.note_new_thread([&board()], &t1, 200, 1);
        assert_eq!(thread_ids(&index), vec![t1, t0]);
    }

    #[test]
    fn test_equal_activity_later_link_first() {
        let mut index = BoardIndex::new();
        let (t0, t1) = (id(), id());
        index.note_new_thread([&board()], &t0, 100, 0);
        index.note_new_thread([&board()], &t1, 100, 1);
        assert_eq!(thread_ids(&index), vec![t1, t0]);
    }

    #[test]
    fn test_reply_moves_thread_to_front() {
        let mut index = BoardIndex::new();
        let (t0, t1, r0) = (id(), id(), id());
        index.note_new_thread([&board()], &t0, 100, 0);
        index.note_new_thread([&board()], &t1, 200, 1);
        index.note_reply(
            [&board()],
            &t0,
            &r0,
            300,
            2,
            &ReplyPlacement::TopLevel,
            Some(100),
        );
        assert_eq!(thread_ids(&index), vec![t0.clone(), t1]);
        assert_eq!(
            index
                .get_thread_reference(&board(), &t0)
                .unwrap()
                .last_activity(),
            300
        );
    }

    #[test]
    fn test_old_reply_does_not_move_thread_backward() {
        let mut index = BoardIndex::new();
        let (t0, t1, r0) = (id(), id(), id());
        index.note_new_thread([&board()], &t0, 100, 0);
        index.note_new_thread([&board()], &t1, 200, 1);
        index.note_reply(
            [&board()],
            &t1,
            &r0,
            50,
            2,
            &ReplyPlacement::TopLevel,
            Some(200),
        );
        assert_eq!(thread_ids(&index), vec![t1.clone(), t0]);
        assert_eq!(
            index
                .get_thread_reference(&board(), &t1)
                .unwrap()
                .last_activity(),
            200
        );
    }

    #[test]
    fn test_replies_chronological_with_seq_tiebreak() {
        let mut index = BoardIndex::new();
        let (t, a, b, c) = (id(), id(), id(), id());
        index.note_new_thread([&board()], &t, 1, 0);
        for (reply, date, seq) in [(&c, 30, 1), (&b, 20, 2), (&a, 20, 3)] {
            index.note_reply(
                [&board()],
                &t,
                reply,
                date,
                seq,
                &ReplyPlacement::TopLevel,
                Some(1),
            );
        }
        let order: Vec<&MessageId> = index
            .get_all_thread_replies(&board(), &t, true)
            .map(ReplyLink::message_id)
            .collect();
        assert_eq!(order, vec![&b, &a, &c]);
    }

    #[test]
    fn test_duplicate_reply_filed_once() {
        let mut index = BoardIndex::new();
        let (t, r) = (id(), id());
        for seq in [1, 2] {
            index.note_reply([&board()], &t, &r, 10, seq, &ReplyPlacement::TopLevel, None);
        }
        assert_eq!(index.board(&board()).unwrap().reply_count(&t), 1);
    }

    #[test]
    fn test_reply_to_unlisted_thread_lists_it() {
        let mut index = BoardIndex::new();
        let (t, r) = (id(), id());
        index.note_reply([&board()], &t, &r, 10, 0, &ReplyPlacement::TopLevel, Some(40));
        let link = index.get_thread_reference(&board(), &t).unwrap();
        assert_eq!(link.last_activity(), 40);
    }

    #[test]
    fn test_non_recursive_returns_top_level_only() {
        let mut index = BoardIndex::new();
        let (t, a, b) = (id(), id(), id());
        index.note_reply([&board()], &t, &a, 10, 0, &ReplyPlacement::TopLevel, None);
        index.note_reply(
            [&board()],
            &t,
            &b,
            20,
            1,
            &ReplyPlacement::Nested { parent: a.clone() },
            None,
        );
        let top: Vec<&MessageId> = index
            .get_all_thread_replies(&board(), &t, false)
            .map(ReplyLink::message_id)
            .collect();
        assert_eq!(top, vec![&a]);

        index.set_placement(&t, &b, &ReplyPlacement::TopLevel);
        assert_eq!(index.get_all_thread_replies(&board(), &t, false).count(), 2);
    }

    #[test]
    fn test_bump_thread_only_touches_existing_links() {
        let mut index = BoardIndex::new();
        let other = BoardName::new("en.other").unwrap();
        let t = id();
        index.ensure_board(&other);
        index.note_new_thread([&board()], &t, 10, 0);
        index.bump_thread(&t, 99, 3);
        assert_eq!(
            index
                .get_thread_reference(&board(), &t)
                .unwrap()
                .last_activity(),
            99
        );
        assert!(index.get_thread_reference(&other, &t).is_none());
    }

    #[test]
    fn test_bump_thread_takes_root_seq() {
        let mut index = BoardIndex::new();
        let (early, late, r) = (id(), id(), id());
        // `late` is listed first by a reply, `early` by its own root.
        index.note_reply([&board()], &late, &r, 50, 0, &ReplyPlacement::TopLevel, None);
        index.note_new_thread([&board()], &early, 50, 1);
        assert_eq!(thread_ids(&index), vec![early.clone(), late.clone()]);

        // The root of `late` arrives last with an older date.
        index.bump_thread(&late, 40, 2);
        let link = index.get_thread_reference(&board(), &late).unwrap();
        assert_eq!(link.seq(), 2);
        assert_eq!(link.last_activity(), 50);
        assert_eq!(thread_ids(&index), vec![late, early]);
    }

    #[test]
    fn test_nested_reply_without_parent_on_board_is_top_level() {
        let mut index = BoardIndex::new();
        let other = BoardName::new("en.other").unwrap();
        let (t, p, c) = (id(), id(), id());
        index.note_reply([&board()], &t, &p, 10, 0, &ReplyPlacement::TopLevel, None);
        let nested = ReplyPlacement::Nested { parent: p.clone() };
        index.note_reply([&board(), &other], &t, &c, 20, 1, &nested, None);

        fn placements(index: &BoardIndex, b: &BoardName, t: &MessageId) -> Vec<ReplyPlacement> {
            index
                .get_all_thread_replies(b, t, true)
                .map(|l| l.placement().clone())
                .collect()
        }
        assert_eq!(
            placements(&index, &board(), &t),
            vec![ReplyPlacement::TopLevel, nested.clone()]
        );
        assert_eq!(placements(&index, &other, &t), vec![ReplyPlacement::TopLevel]);
        assert_eq!(index.get_all_thread_replies(&other, &t, false).count(), 1);

        index.set_placement(&t, &c, &nested);
        assert_eq!(placements(&index, &other, &t), vec![ReplyPlacement::TopLevel]);
    }

    #[test]
    fn test_unknown_board_reads_empty() {
        let index = BoardIndex::new();
        let t = id();
        assert_eq!(index.get_threads(&board()).count(), 0);
        assert_eq!(index.get_all_thread_replies(&board(), &t, true).count(), 0);
        assert!(index.get_thread_reference(&board(), &t).is_none());
    }
}
