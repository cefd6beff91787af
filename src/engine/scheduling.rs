use chrono::{Datelike, Duration, NaiveDate, Weekday};
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::{Engine, EngineError, EntityKind};

impl Engine {
    /// Bind a user to a task on one date. Checks run in fixed order and the
    /// first failure wins: weekday membership, role eligibility, approved
    /// obstacles, then — unless `ignore_conflicts` — the conflict test against
    /// the user's other assignments on that date. The conflict test and the
    /// insert happen under the user's shard write lock, so two mutually
    /// conflicting assignments cannot both pass validation.
    pub async fn create_assignment(
        &self,
        user_id: UserId,
        task_id: TaskId,
        date: NaiveDate,
        ignore_conflicts: bool,
    ) -> Result<AssignmentId, EngineError> {
        let result = self
            .try_create_assignment(user_id, task_id, date, ignore_conflicts)
            .await;
        Self::record_outcome(result, 1)
    }

    async fn try_create_assignment(
        &self,
        user_id: UserId,
        task_id: TaskId,
        date: NaiveDate,
        ignore_conflicts: bool,
    ) -> Result<AssignmentId, EngineError> {
        let user = self.require_user(user_id)?;
        let task = self.require_task(task_id)?;
        Self::check_weekday(&task, date)?;
        Self::check_role_eligibility(&user, &task)?;
        self.check_no_approved_obstacle(user_id, task_id, date)?;

        let shard = self.store.shard(user_id);
        let mut schedule = shard.write().await;
        if !ignore_conflicts {
            self.check_no_conflict_on_date(&schedule, task_id, date, None).await?;
        }

        let id = Ulid::new();
        schedule.insert(Assignment {
            id,
            user_id,
            task_id,
            date,
        });
        self.store.map_assignment(id, user_id);
        Ok(id)
    }

    /// Re-validate and move an existing assignment to a (possibly different)
    /// user, task, and date.
    pub async fn update_assignment(
        &self,
        id: AssignmentId,
        user_id: UserId,
        task_id: TaskId,
        date: NaiveDate,
        ignore_conflicts: bool,
    ) -> Result<(), EngineError> {
        let owner = self
            .store
            .assignment_owner(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Assignment, id.to_string()))?;
        let user = self.require_user(user_id)?;
        let task = self.require_task(task_id)?;
        Self::check_weekday(&task, date)?;
        Self::check_role_eligibility(&user, &task)?;
        self.check_no_approved_obstacle(user_id, task_id, date)?;

        if owner == user_id {
            let shard = self.store.shard(user_id);
            let mut schedule = shard.write().await;
            if !ignore_conflicts {
                // The row being replaced must not conflict with itself.
                self.check_no_conflict_on_date(&schedule, task_id, date, Some(id)).await?;
            }
            schedule
                .remove(id)
                .ok_or_else(|| EngineError::NotFound(EntityKind::Assignment, id.to_string()))?;
            schedule.insert(Assignment {
                id,
                user_id,
                task_id,
                date,
            });
        } else {
            // Two shards: lock in id order so concurrent moves cannot deadlock.
            let (old_shard, new_shard) = (self.store.shard(owner), self.store.shard(user_id));
            let (mut old_guard, mut new_guard) = if owner < user_id {
                let o = old_shard.write().await;
                let n = new_shard.write().await;
                (o, n)
            } else {
                let n = new_shard.write().await;
                let o = old_shard.write().await;
                (o, n)
            };
            if !ignore_conflicts {
                self.check_no_conflict_on_date(&new_guard, task_id, date, None).await?;
            }
            old_guard
                .remove(id)
                .ok_or_else(|| EngineError::NotFound(EntityKind::Assignment, id.to_string()))?;
            new_guard.insert(Assignment {
                id,
                user_id,
                task_id,
                date,
            });
            self.store.map_assignment(id, user_id);
        }
        Ok(())
    }

    pub async fn delete_assignment(&self, id: AssignmentId) -> Result<(), EngineError> {
        let owner = self
            .store
            .assignment_owner(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Assignment, id.to_string()))?;
        let shard = self.store.shard(owner);
        let mut schedule = shard.write().await;
        schedule
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Assignment, id.to_string()))?;
        self.store.unmap_assignment(&id);
        Ok(())
    }

    /// Remove every assignment of the task across all users; returns how many.
    pub async fn delete_assignments_by_task(&self, task_id: TaskId) -> usize {
        let everything = DateRange::new(NaiveDate::MIN, NaiveDate::MAX);
        let mut removed = 0usize;
        for (_, shard) in self.store.shards() {
            let mut schedule = shard.write().await;
            for assignment in schedule.remove_matching(task_id, &everything) {
                self.store.unmap_assignment(&assignment.id);
                removed += 1;
            }
        }
        if removed > 0 {
            metrics::counter!(observability::ASSIGNMENTS_REVOKED_TOTAL, "cause" => "task_deleted")
                .increment(removed as u64);
        }
        removed
    }

    /// Bind a user to a whole-period task for exactly one Monday–Sunday week.
    /// Validation runs once against the window: role eligibility, an approved
    /// obstacle covering the period start, and — unless `ignore_conflicts` —
    /// a conflict test against every task the user is already assigned
    /// anywhere in the window (weekday membership does not apply, the task
    /// occupies every day). All seven rows commit under one shard lock.
    pub async fn create_assignments_for_whole_period(
        &self,
        user_id: UserId,
        task_id: TaskId,
        from: NaiveDate,
        to: NaiveDate,
        ignore_conflicts: bool,
    ) -> Result<Vec<AssignmentId>, EngineError> {
        let result = self
            .try_create_whole_period(user_id, task_id, from, to, ignore_conflicts)
            .await;
        Self::record_outcome(result, 7)
    }

    async fn try_create_whole_period(
        &self,
        user_id: UserId,
        task_id: TaskId,
        from: NaiveDate,
        to: NaiveDate,
        ignore_conflicts: bool,
    ) -> Result<Vec<AssignmentId>, EngineError> {
        if from.weekday() != Weekday::Mon || to != from + Duration::days(6) {
            return Err(EngineError::InvalidArgument(
                "period must start on Monday and end on the following Sunday".into(),
            ));
        }
        let user = self.require_user(user_id)?;
        let task = self.require_task(task_id)?;
        Self::check_role_eligibility(&user, &task)?;
        self.check_no_approved_obstacle(user_id, task_id, from)?;

        let range = DateRange::new(from, to);
        let shard = self.store.shard(user_id);
        let mut schedule = shard.write().await;
        if !ignore_conflicts {
            let conflicts = self.store.conflicts().read().await;
            for existing in schedule.in_range(&range) {
                if conflicts.contains_pair(task_id, existing.task_id) {
                    return Err(EngineError::ScheduleInConflict);
                }
            }
        }

        let mut ids = Vec::with_capacity(7);
        for date in range.days() {
            let id = Ulid::new();
            schedule.insert(Assignment {
                id,
                user_id,
                task_id,
                date,
            });
            self.store.map_assignment(id, user_id);
            ids.push(id);
        }
        Ok(ids)
    }

    // ── Pipeline checks ──────────────────────────────────────

    fn check_weekday(task: &Task, date: NaiveDate) -> Result<(), EngineError> {
        let weekday = date.weekday();
        if !task.days_of_week.contains(&weekday) {
            return Err(EngineError::InvalidArgument(format!(
                "task does not occur on {weekday}"
            )));
        }
        Ok(())
    }

    fn check_role_eligibility(user: &User, task: &Task) -> Result<(), EngineError> {
        if user.roles.is_disjoint(&task.allowed_roles) {
            return Err(EngineError::RoleRequirementsNotMet);
        }
        Ok(())
    }

    fn check_no_approved_obstacle(
        &self,
        user_id: UserId,
        task_id: TaskId,
        date: NaiveDate,
    ) -> Result<(), EngineError> {
        if !self.approved_obstacles_covering(user_id, task_id, date).is_empty() {
            return Err(EngineError::AlreadyExists(
                EntityKind::Obstacle,
                "approved obstacle covers the date".into(),
            ));
        }
        Ok(())
    }

    /// Caller holds the shard lock; `exclude` skips the row being replaced.
    async fn check_no_conflict_on_date(
        &self,
        schedule: &UserSchedule,
        task_id: TaskId,
        date: NaiveDate,
        exclude: Option<AssignmentId>,
    ) -> Result<(), EngineError> {
        let conflicts = self.store.conflicts().read().await;
        for existing in schedule.on_date(date) {
            if Some(existing.id) == exclude {
                continue;
            }
            if conflicts.contains_pair(task_id, existing.task_id) {
                return Err(EngineError::ScheduleInConflict);
            }
        }
        Ok(())
    }

    fn record_outcome<T>(result: Result<T, EngineError>, created: u64) -> Result<T, EngineError> {
        match &result {
            Ok(_) => {
                metrics::counter!(observability::ASSIGNMENTS_CREATED_TOTAL).increment(created);
            }
            Err(err) => {
                metrics::counter!(
                    observability::ASSIGNMENT_REJECTIONS_TOTAL,
                    "reason" => observability::error_label(err)
                )
                .increment(1);
            }
        }
        result
    }
}
