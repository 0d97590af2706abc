//! Shared constants for message validation and limits.
//!
//! The size limits here are the defaults; `ForumConfig` can override the
//! message limits per namespace.

// =============================================================================
// Content Size Limits
// =============================================================================

/// Maximum board name size (256 bytes).
pub const MAX_BOARD_NAME_SIZE: usize = 256;

/// Default maximum message title size (512 bytes).
pub const MAX_TITLE_SIZE: usize = 512;

/// Default maximum message body size (100KB).
pub const MAX_BODY_SIZE: usize = 100 * 1024;

/// Default maximum number of boards a single message may be posted to.
pub const MAX_BOARDS_PER_MESSAGE: usize = 16;

// =============================================================================
// Identifier Shapes
// =============================================================================

/// Separator between the UUID and the author hash in a message id.
pub const MESSAGE_ID_SEPARATOR: char = '@';

/// Prefix of the list component in a message URI.
pub const MESSAGE_LIST_PREFIX: &str = "list-";

/// Separator between the message list and the UUID in a message URI.
pub const MESSAGE_URI_FRAGMENT: char = '#';
