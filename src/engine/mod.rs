mod availability;
mod catalog;
mod conflict;
mod dependency;
mod error;
mod obstacles;
mod queries;
mod roles;
mod scheduling;
mod store;

pub use catalog::{NewTask, NewUser};
pub use error::{EngineError, EntityKind};
pub use obstacles::NewObstacle;
pub use roles::{
    NewRole, FUNCTIONAL_ROLE, PROTECTED_ROLE_NAMES_DELETE, PROTECTED_ROLE_NAMES_UPDATE,
};

use std::sync::Arc;

use chrono::NaiveDate;

use crate::model::*;
use crate::sessions::SessionInvalidator;
use store::Store;

/// The scheduling engine: validates and persists assignments, maintains the
/// role catalog's dense ordering, the conflict relation, and the obstacle
/// lifecycle, all over the in-memory [`Store`].
///
/// Lock order, where an operation needs more than one:
/// user schedule shard(s) (sorted by user id) → conflict table → obstacle
/// maps. The role catalog lock is never held together with a schedule shard.
pub struct Engine {
    pub(super) store: Store,
    pub(super) sessions: Arc<dyn SessionInvalidator>,
}

impl Engine {
    pub fn new(sessions: Arc<dyn SessionInvalidator>) -> Self {
        Self {
            store: Store::new(),
            sessions,
        }
    }

    pub(super) fn require_user(&self, id: UserId) -> Result<User, EngineError> {
        self.store
            .user(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::User, id.to_string()))
    }

    pub(super) fn require_task(&self, id: TaskId) -> Result<Task, EngineError> {
        self.store
            .task(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Task, id.to_string()))
    }
}

/// Wall-clock date for listing order and "current" queries. Pure cores take
/// the date as a parameter; only public wrappers call this.
pub(super) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Reject a range query whose window is wider than the store is asked to scan.
pub(super) fn validate_query_window(from: NaiveDate, to: NaiveDate) -> Result<DateRange, EngineError> {
    if from > to {
        return Err(EngineError::InvalidDateRange { from, to });
    }
    let range = DateRange::new(from, to);
    if range.num_days() > crate::limits::MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(range)
}
