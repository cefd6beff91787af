use std::collections::HashSet;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::{MAX_TASKS_PER_OBSTACLE, MAX_TEXT_LEN};
use crate::model::*;
use crate::observability;

use super::roles::FUNCTIONAL_ROLE;
use super::{today, Engine, EngineError, EntityKind};

#[derive(Debug, Clone)]
pub struct NewObstacle {
    pub user_id: UserId,
    pub tasks: HashSet<TaskId>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub applicant_description: String,
}

/// Listing order: obstacles starting strictly after `today` first, sorted by
/// (from, to) descending; then past/current obstacles by `to` descending
/// (most recently ended first).
pub(super) fn order_for_listing(obstacles: Vec<Obstacle>, today: NaiveDate) -> Vec<Obstacle> {
    let (mut future, mut past): (Vec<Obstacle>, Vec<Obstacle>) = obstacles
        .into_iter()
        .partition(|o| o.range.from > today);
    future.sort_by(|a, b| (a.range.from, a.range.to).cmp(&(b.range.from, b.range.to)));
    future.reverse();
    past.sort_by(|a, b| b.range.to.cmp(&a.range.to));
    future.extend(past);
    future
}

impl Engine {
    /// File a leave request. Stored as Pending until someone resolves it.
    pub async fn create_obstacle(&self, new: NewObstacle) -> Result<ObstacleId, EngineError> {
        if new.from > new.to {
            return Err(EngineError::InvalidDateRange {
                from: new.from,
                to: new.to,
            });
        }
        if new.tasks.is_empty() {
            return Err(EngineError::InvalidArgument(
                "obstacle must cover at least one task".into(),
            ));
        }
        if new.tasks.len() > MAX_TASKS_PER_OBSTACLE {
            return Err(EngineError::LimitExceeded("obstacle covers too many tasks"));
        }
        if new.applicant_description.len() > MAX_TEXT_LEN {
            return Err(EngineError::LimitExceeded("obstacle description too long"));
        }
        self.require_user(new.user_id)?;
        for task in &new.tasks {
            self.require_task(*task)?;
        }

        let id = Ulid::new();
        self.store.insert_obstacle(Obstacle {
            id,
            user_id: new.user_id,
            tasks: new.tasks,
            range: DateRange::new(new.from, new.to),
            status: ObstacleStatus::Pending,
            applicant_description: new.applicant_description,
            recipient_user: None,
            recipient_answer: None,
        });
        metrics::counter!(observability::OBSTACLES_CREATED_TOTAL).increment(1);
        Ok(id)
    }

    /// Resolve a pending obstacle. Approval revokes every assignment the
    /// obstacle covers — status flip and deletions commit while the owning
    /// user's schedule shard is write-locked, so no reader observes an
    /// approved obstacle next to the assignments it invalidates.
    pub async fn patch_obstacle(&self, id: ObstacleId, patch: ObstaclePatch) -> Result<(), EngineError> {
        if patch.status == ObstacleStatus::Pending {
            return Err(EngineError::InvalidArgument(
                "obstacle can only be resolved to approved or rejected".into(),
            ));
        }
        if let Some(answer) = &patch.recipient_answer
            && answer.len() > MAX_TEXT_LEN
        {
            return Err(EngineError::LimitExceeded("recipient answer too long"));
        }
        if let Some(recipient) = patch.recipient_user {
            self.require_user(recipient)?;
        }
        let current = self
            .store
            .obstacle(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Obstacle, id.to_string()))?;

        let shard = self.store.shard(current.user_id);
        let mut schedule = shard.write().await;

        // Re-read under the shard lock: a concurrent patch may have resolved
        // the obstacle while we waited.
        let current = self
            .store
            .obstacle(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Obstacle, id.to_string()))?;
        if current.status != ObstacleStatus::Pending {
            return Err(EngineError::InvalidArgument(
                "obstacle has already been resolved".into(),
            ));
        }

        let updated = current.apply_patch(&patch);
        self.store.replace_obstacle(updated.clone());

        if updated.status == ObstacleStatus::Approved {
            let mut revoked = 0usize;
            for task in &updated.tasks {
                for assignment in schedule.remove_matching(*task, &updated.range) {
                    self.store.unmap_assignment(&assignment.id);
                    revoked += 1;
                }
            }
            metrics::counter!(observability::ASSIGNMENTS_REVOKED_TOTAL, "cause" => "obstacle_approved")
                .increment(revoked as u64);
            metrics::counter!(observability::OBSTACLES_RESOLVED_TOTAL, "status" => "approved")
                .increment(1);
            tracing::info!(obstacle = %id, revoked, "obstacle approved, overlapping assignments revoked");
        } else {
            metrics::counter!(observability::OBSTACLES_RESOLVED_TOTAL, "status" => "rejected")
                .increment(1);
        }
        Ok(())
    }

    /// Delete an obstacle. Only its owner or a holder of the functional role
    /// may do so.
    pub async fn delete_obstacle(&self, id: ObstacleId, requester: UserId) -> Result<(), EngineError> {
        let obstacle = self
            .store
            .obstacle(&id)
            .ok_or_else(|| EngineError::NotFound(EntityKind::Obstacle, id.to_string()))?;
        let requester = self.require_user(requester)?;

        let allowed = requester.id == obstacle.user_id
            || self.user_holds_role_named(&requester, FUNCTIONAL_ROLE).await;
        if !allowed {
            return Err(EngineError::Forbidden("delete another user's obstacle"));
        }
        self.store.remove_obstacle(&id);
        Ok(())
    }

    // ── Query surface ────────────────────────────────────────

    /// Approved obstacles of (user, task) whose range covers `date`.
    pub fn approved_obstacles_covering(
        &self,
        user: UserId,
        task: TaskId,
        date: NaiveDate,
    ) -> Vec<Obstacle> {
        self.store
            .obstacles_of_user(&user)
            .into_iter()
            .filter(|o| {
                o.status == ObstacleStatus::Approved
                    && o.tasks.contains(&task)
                    && o.range.contains(date)
            })
            .collect()
    }

    /// Approved obstacles of (user, task) overlapping the inclusive window.
    pub fn approved_obstacles_overlapping(
        &self,
        user: UserId,
        task: TaskId,
        range: DateRange,
    ) -> Vec<Obstacle> {
        self.store
            .obstacles_of_user(&user)
            .into_iter()
            .filter(|o| {
                o.status == ObstacleStatus::Approved
                    && o.tasks.contains(&task)
                    && o.range.overlaps(&range)
            })
            .collect()
    }

    pub async fn obstacle_by_id(&self, id: ObstacleId) -> Option<Obstacle> {
        self.store.obstacle(&id)
    }

    pub async fn list_obstacles(&self) -> Vec<Obstacle> {
        order_for_listing(self.store.obstacles(), today())
    }

    pub async fn obstacles_by_user(&self, user: UserId) -> Result<Vec<Obstacle>, EngineError> {
        if !self.store.user_exists(&user) {
            return Err(EngineError::NotFound(EntityKind::User, user.to_string()));
        }
        Ok(order_for_listing(self.store.obstacles_of_user(&user), today()))
    }

    pub async fn obstacles_by_task(&self, task: TaskId) -> Result<Vec<Obstacle>, EngineError> {
        self.require_task(task)?;
        Ok(order_for_listing(
            self.store
                .obstacles()
                .into_iter()
                .filter(|o| o.tasks.contains(&task))
                .collect(),
            today(),
        ))
    }

    /// Remove every obstacle that covers the task; returns how many.
    pub async fn delete_obstacles_by_task(&self, task: TaskId) -> usize {
        let doomed: Vec<ObstacleId> = self
            .store
            .obstacles()
            .into_iter()
            .filter(|o| o.tasks.contains(&task))
            .map(|o| o.id)
            .collect();
        for id in &doomed {
            self.store.remove_obstacle(id);
        }
        doomed.len()
    }

    pub async fn count_obstacles_by_status(&self, status: ObstacleStatus) -> usize {
        self.store
            .obstacles()
            .iter()
            .filter(|o| o.status == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn obstacle(from: NaiveDate, to: NaiveDate) -> Obstacle {
        Obstacle {
            id: Ulid::new(),
            user_id: Ulid::new(),
            tasks: HashSet::new(),
            range: DateRange::new(from, to),
            status: ObstacleStatus::Pending,
            applicant_description: String::new(),
            recipient_user: None,
            recipient_answer: None,
        }
    }

    #[test]
    fn listing_puts_future_first_descending_then_past_by_end() {
        let today = d(2024, 6, 15);
        let future_near = obstacle(d(2024, 6, 20), d(2024, 6, 21));
        let future_far = obstacle(d(2024, 7, 1), d(2024, 7, 5));
        let current = obstacle(d(2024, 6, 10), d(2024, 6, 16));
        let past_recent = obstacle(d(2024, 6, 1), d(2024, 6, 12));
        let past_old = obstacle(d(2024, 5, 1), d(2024, 5, 3));

        let ordered = order_for_listing(
            vec![
                past_old.clone(),
                future_near.clone(),
                current.clone(),
                future_far.clone(),
                past_recent.clone(),
            ],
            today,
        );
        let ids: Vec<_> = ordered.iter().map(|o| o.id).collect();
        assert_eq!(
            ids,
            vec![
                future_far.id,
                future_near.id,
                current.id,
                past_recent.id,
                past_old.id
            ]
        );
    }

    #[test]
    fn listing_breaks_future_ties_by_end_descending() {
        let today = d(2024, 6, 15);
        let short = obstacle(d(2024, 6, 20), d(2024, 6, 21));
        let long = obstacle(d(2024, 6, 20), d(2024, 6, 25));
        let ordered = order_for_listing(vec![short.clone(), long.clone()], today);
        assert_eq!(ordered[0].id, long.id);
        assert_eq!(ordered[1].id, short.id);
    }

    #[test]
    fn obstacle_starting_today_counts_as_current() {
        let today = d(2024, 6, 15);
        let starting_today = obstacle(today, d(2024, 6, 30));
        let future = obstacle(d(2024, 6, 16), d(2024, 6, 17));
        let ordered = order_for_listing(vec![starting_today.clone(), future.clone()], today);
        assert_eq!(ordered[0].id, future.id);
        assert_eq!(ordered[1].id, starting_today.id);
    }
}
