//! Hard caps on caller-supplied input. Exceeding one yields
//! `EngineError::LimitExceeded` before any state is touched.

/// Max length for user, role, and task names (and surnames/emails).
pub const MAX_NAME_LEN: usize = 128;

/// Max length for obstacle descriptions and recipient answers.
pub const MAX_TEXT_LEN: usize = 2048;

/// Max number of tasks a single obstacle may cover.
pub const MAX_TASKS_PER_OBSTACLE: usize = 64;

/// Widest date window accepted by range queries (availability,
/// dependency summaries, assignment listings).
pub const MAX_QUERY_WINDOW_DAYS: i64 = 366;

/// Max entries in one sort-order reorder batch.
pub const MAX_REORDER_BATCH: usize = 256;
