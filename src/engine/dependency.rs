use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::*;

use super::{validate_query_window, Engine, EngineError};

/// How far back completions count toward a user's total for a task.
const COMPLETION_LOOKBACK_DAYS: i64 = 365;

/// Per-task summary strings for one user's assignments in a week window,
/// ordered by task name. A task assigned on every one of its configured
/// weekdays is listed by bare name; a partially covered task carries the
/// weekdays it was assigned on, labelled and in Monday→Sunday order:
/// `"Washing (Pn, Pt)"`.
pub(super) fn summarize_assigned_tasks(
    assignments: &[Assignment],
    tasks_by_id: &HashMap<TaskId, Task>,
) -> Vec<String> {
    let mut days_per_task: HashMap<TaskId, HashSet<chrono::Weekday>> = HashMap::new();
    for assignment in assignments {
        days_per_task
            .entry(assignment.task_id)
            .or_default()
            .insert(assignment.date.weekday());
    }

    let mut entries: Vec<(String, String)> = Vec::new();
    for (task_id, assigned_days) in &days_per_task {
        let Some(task) = tasks_by_id.get(task_id) else {
            continue;
        };
        let text = if assigned_days.len() >= task.days_of_week.len() {
            task.name.clone()
        } else {
            let labels: Vec<&str> = WEEKDAYS
                .iter()
                .filter(|d| assigned_days.contains(d))
                .map(|d| weekday_label(*d))
                .collect();
            format!("{} ({})", task.name, labels.join(", "))
        };
        entries.push((task.name.clone(), text));
    }
    entries.sort();
    entries.into_iter().map(|(_, text)| text).collect()
}

impl Engine {
    /// Everything a scheduler wants to know before binding `user` to `task`
    /// for the week `[from, to]`: past completions, the rest of the user's
    /// week, and whether a conflict or approved obstacle stands in the way.
    pub async fn user_dependencies_for_task(
        &self,
        task_id: TaskId,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<UserTaskDependency, EngineError> {
        let range = validate_query_window(from, to)?;
        let task = self.require_task(task_id)?;
        let user = self.require_user(user_id)?;

        let shard = self.store.shard(user_id);
        let schedule = shard.read().await;

        // Completions in the 365 days strictly before the window start.
        let lookback = DateRange::new(
            from - Duration::days(COMPLETION_LOOKBACK_DAYS),
            from - Duration::days(1),
        );
        let completed_count = schedule
            .in_range(&lookback)
            .filter(|a| a.task_id == task_id)
            .count() as u32;
        let last_assigned = schedule.latest_for_task_up_to(task_id, from);

        let week: Vec<Assignment> = schedule.in_range(&range).copied().collect();
        drop(schedule);

        let week_task_ids: HashSet<TaskId> = week.iter().map(|a| a.task_id).collect();
        let tasks_by_id: HashMap<TaskId, Task> = week_task_ids
            .iter()
            .filter_map(|id| self.store.task(id).map(|t| (*id, t)))
            .collect();
        let assigned_tasks = summarize_assigned_tasks(&week, &tasks_by_id);

        let mut is_in_conflict = false;
        {
            let conflicts = self.store.conflicts().read().await;
            for other in &week_task_ids {
                if conflicts.contains_pair(task.id, *other) {
                    is_in_conflict = true;
                    break;
                }
            }
        }
        let has_obstacle = !self
            .approved_obstacles_covering(user_id, task_id, from)
            .is_empty();

        Ok(UserTaskDependency {
            user_id,
            user_name: user.full_name(),
            last_assigned,
            completed_count,
            assigned_tasks,
            is_in_conflict,
            has_obstacle,
        })
    }

    /// The dependency summary for every known user.
    pub async fn all_user_dependencies_for_task(
        &self,
        task_id: TaskId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UserTaskDependency>, EngineError> {
        let mut summaries = Vec::new();
        for user in self.store.users() {
            summaries.push(
                self.user_dependencies_for_task(task_id, user.id, from, to)
                    .await?,
            );
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use ulid::Ulid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn task(name: &str, days: &[Weekday]) -> Task {
        Task {
            id: Ulid::new(),
            name: name.into(),
            category: "kitchen".into(),
            participants_limit: 3,
            days_of_week: days.iter().copied().collect(),
            allowed_roles: HashSet::new(),
            supervisor_role: None,
            permanent: true,
            whole_period: false,
        }
    }

    fn assignment(task: &Task, date: NaiveDate) -> Assignment {
        Assignment {
            id: Ulid::new(),
            user_id: Ulid::new(),
            task_id: task.id,
            date,
        }
    }

    #[test]
    fn mix_of_fully_and_partially_assigned_tasks() {
        // Week of 2024-02-05 (Mon) … 2024-02-11 (Sun).
        let washing = task("Washing", &[Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        let cooking = task("Cooking", &[Weekday::Tue, Weekday::Thu]);
        let drying = task("Drying", &[Weekday::Thu, Weekday::Sat]);

        let assignments = vec![
            assignment(&washing, d(2024, 2, 5)),  // Mon
            assignment(&drying, d(2024, 2, 10)),  // Sat
            assignment(&washing, d(2024, 2, 9)),  // Fri
            assignment(&cooking, d(2024, 2, 6)),  // Tue
            assignment(&cooking, d(2024, 2, 8)),  // Thu
        ];
        let tasks_by_id: HashMap<TaskId, Task> = [&washing, &cooking, &drying]
            .into_iter()
            .map(|t| (t.id, t.clone()))
            .collect();

        let summary = summarize_assigned_tasks(&assignments, &tasks_by_id);
        assert_eq!(
            summary,
            vec![
                "Cooking".to_string(),
                "Drying (So)".to_string(),
                "Washing (Pn, Pt)".to_string(),
            ]
        );
    }

    #[test]
    fn duplicate_dates_count_one_weekday() {
        let cooking = task("Cooking", &[Weekday::Tue, Weekday::Thu]);
        // Two assignees on the same Tuesday: still only one distinct weekday.
        let assignments = vec![
            assignment(&cooking, d(2024, 2, 6)),
            assignment(&cooking, d(2024, 2, 6)),
        ];
        let tasks_by_id = HashMap::from([(cooking.id, cooking.clone())]);
        let summary = summarize_assigned_tasks(&assignments, &tasks_by_id);
        assert_eq!(summary, vec!["Cooking (Wt)".to_string()]);
    }

    #[test]
    fn weekday_labels_listed_monday_first() {
        let all_week: Vec<Weekday> = WEEKDAYS.to_vec();
        let chores = task("Chores", &all_week);
        // Assigned Sunday and Monday only, inserted out of order.
        let assignments = vec![
            assignment(&chores, d(2024, 2, 11)), // Sun
            assignment(&chores, d(2024, 2, 5)),  // Mon
        ];
        let tasks_by_id = HashMap::from([(chores.id, chores.clone())]);
        let summary = summarize_assigned_tasks(&assignments, &tasks_by_id);
        assert_eq!(summary, vec!["Chores (Pn, Nd)".to_string()]);
    }

    #[test]
    fn empty_assignments_summarize_to_nothing() {
        let summary = summarize_assigned_tasks(&[], &HashMap::new());
        assert!(summary.is_empty());
    }
}
