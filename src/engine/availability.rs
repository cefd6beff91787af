use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::*;

use super::{validate_query_window, Engine, EngineError, EntityKind};

// ── Availability Algorithm ────────────────────────────────────────

/// A task still has open slots in a window when its assignment count is below
/// `participants_limit × |days_of_week|`. Absent from `occurrences` means zero.
pub(super) fn not_fully_assigned(
    tasks: Vec<Task>,
    occurrences: &HashMap<TaskId, usize>,
) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|task| {
            let occupied = occurrences.get(&task.id).copied().unwrap_or(0);
            let required = task.participants_limit as usize * task.days_of_week.len();
            occupied < required
        })
        .collect()
}

impl Engine {
    /// Tasks with unfilled slots in the inclusive window.
    pub async fn available_tasks(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Task>, EngineError> {
        let range = validate_query_window(from, to)?;
        let occurrences = self.occurrences_in_range(&range).await;
        Ok(not_fully_assigned(self.store.tasks(), &occurrences))
    }

    /// Like [`Engine::available_tasks`], restricted to tasks supervised by the
    /// named Supervisor-kind role.
    pub async fn available_tasks_by_supervisor(
        &self,
        supervisor: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Task>, EngineError> {
        let range = validate_query_window(from, to)?;
        let role = self
            .role_by_name_and_kind(supervisor, RoleKind::Supervisor)
            .await
            .ok_or_else(|| EngineError::NotFound(EntityKind::Role, supervisor.to_string()))?;
        let occurrences = self.occurrences_in_range(&range).await;
        Ok(not_fully_assigned(
            self.store.tasks_by_supervisor(role.id),
            &occurrences,
        ))
    }

    /// Assignment counts per task within the window, across all users.
    pub(super) async fn occurrences_in_range(&self, range: &DateRange) -> HashMap<TaskId, usize> {
        let mut counts: HashMap<TaskId, usize> = HashMap::new();
        for (_, shard) in self.store.shards() {
            let schedule = shard.read().await;
            for assignment in schedule.in_range(range) {
                *counts.entry(assignment.task_id).or_default() += 1;
            }
        }
        counts
    }
}
