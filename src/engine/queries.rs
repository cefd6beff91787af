use chrono::NaiveDate;

use crate::model::*;

use super::{today, validate_query_window, Engine, EngineError, EntityKind};

impl Engine {
    pub async fn assignments(&self) -> Vec<Assignment> {
        let mut all = Vec::new();
        for (_, shard) in self.store.shards() {
            let schedule = shard.read().await;
            all.extend(schedule.assignments.iter().copied());
        }
        all.sort_by_key(|a| (a.date, a.id));
        all
    }

    pub async fn assignment_by_id(&self, id: AssignmentId) -> Option<Assignment> {
        let owner = self.store.assignment_owner(&id)?;
        let shard = self.store.existing_shard(&owner)?;
        let schedule = shard.read().await;
        schedule.assignments.iter().find(|a| a.id == id).copied()
    }

    pub async fn assignments_by_user(&self, user: UserId) -> Result<Vec<Assignment>, EngineError> {
        if !self.store.user_exists(&user) {
            return Err(EngineError::NotFound(EntityKind::User, user.to_string()));
        }
        match self.store.existing_shard(&user) {
            Some(shard) => Ok(shard.read().await.assignments.clone()),
            None => Ok(Vec::new()),
        }
    }

    pub async fn assignments_by_user_on(&self, user: UserId, date: NaiveDate) -> Vec<Assignment> {
        match self.store.existing_shard(&user) {
            Some(shard) => {
                let schedule = shard.read().await;
                schedule.on_date(date).copied().collect()
            }
            None => Vec::new(),
        }
    }

    pub async fn assignments_by_user_between(
        &self,
        user: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Assignment>, EngineError> {
        let range = validate_query_window(from, to)?;
        match self.store.existing_shard(&user) {
            Some(shard) => {
                let schedule = shard.read().await;
                Ok(schedule.in_range(&range).copied().collect())
            }
            None => Ok(Vec::new()),
        }
    }

    pub async fn assignments_by_task_between(
        &self,
        task: TaskId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Assignment>, EngineError> {
        let range = validate_query_window(from, to)?;
        let mut matching = Vec::new();
        for (_, shard) in self.store.shards() {
            let schedule = shard.read().await;
            matching.extend(
                schedule
                    .in_range(&range)
                    .filter(|a| a.task_id == task)
                    .copied(),
            );
        }
        matching.sort_by_key(|a| (a.date, a.id));
        Ok(matching)
    }

    /// Assignments dated today or later.
    pub async fn current_assignments(&self) -> Vec<Assignment> {
        let horizon = DateRange::new(today(), NaiveDate::MAX);
        let mut current = Vec::new();
        for (_, shard) in self.store.shards() {
            let schedule = shard.read().await;
            current.extend(schedule.in_range(&horizon).copied());
        }
        current.sort_by_key(|a| (a.date, a.id));
        current
    }
}
