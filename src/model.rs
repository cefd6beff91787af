use std::collections::HashSet;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub type UserId = Ulid;
pub type RoleId = Ulid;
pub type TaskId = Ulid;
pub type AssignmentId = Ulid;
pub type ObstacleId = Ulid;
pub type ConflictId = Ulid;

/// Inclusive calendar-date interval `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        debug_assert!(from <= to, "DateRange from must not be after to");
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.from <= other.to && self.to >= other.from
    }

    pub fn num_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Every date in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }
}

/// Weekdays in calendar order, Monday first.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Fixed short labels used in schedule summaries and prints.
pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Pn",
        Weekday::Tue => "Wt",
        Weekday::Wed => "Śr",
        Weekday::Thu => "Cz",
        Weekday::Fri => "Pt",
        Weekday::Sat => "So",
        Weekday::Sun => "Nd",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Supervisor,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub kind: RoleKind,
    /// Dense 1-based rank, unique and contiguous within a kind.
    pub sort_order: u32,
    pub tasks_visible_in_prints: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub roles: HashSet<RoleId>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub category: String,
    /// Max concurrent assignees per occurrence.
    pub participants_limit: u32,
    pub days_of_week: HashSet<Weekday>,
    pub allowed_roles: HashSet<RoleId>,
    pub supervisor_role: Option<RoleId>,
    /// Recurs indefinitely rather than for a fixed season.
    pub permanent: bool,
    /// One participant covers the whole Monday–Sunday week.
    pub whole_period: bool,
}

/// One user bound to one task on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObstacleStatus {
    Pending,
    Approved,
    Rejected,
}

/// A user's leave request over a date range, scoped to a set of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub user_id: UserId,
    pub tasks: HashSet<TaskId>,
    pub range: DateRange,
    pub status: ObstacleStatus,
    pub applicant_description: String,
    pub recipient_user: Option<UserId>,
    pub recipient_answer: Option<String>,
}

/// Requested change to a pending obstacle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstaclePatch {
    pub status: ObstacleStatus,
    pub recipient_answer: Option<String>,
    pub recipient_user: Option<UserId>,
}

impl Obstacle {
    /// Produce the patched state without mutating `self`. Validation
    /// (single Pending → resolved transition) happens at the engine.
    pub fn apply_patch(&self, patch: &ObstaclePatch) -> Obstacle {
        let mut updated = self.clone();
        updated.status = patch.status;
        if patch.recipient_answer.is_some() {
            updated.recipient_answer = patch.recipient_answer.clone();
        }
        if patch.recipient_user.is_some() {
            updated.recipient_user = patch.recipient_user;
        }
        updated
    }
}

/// Unordered pair of distinct tasks that must never share a user on one date.
/// Stored normalized: `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPair {
    pub id: ConflictId,
    pub first: TaskId,
    pub second: TaskId,
}

impl ConflictPair {
    pub fn normalize(a: TaskId, b: TaskId) -> (TaskId, TaskId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn involves(&self, task: TaskId) -> bool {
        self.first == task || self.second == task
    }
}

/// One user's assignments, sorted by date. The unit of locking for
/// conflict-checked inserts, whole-period batches, and revocation cascades.
#[derive(Debug, Clone, Default)]
pub struct UserSchedule {
    pub assignments: Vec<Assignment>,
}

impl UserSchedule {
    /// Insert maintaining date order.
    pub fn insert(&mut self, assignment: Assignment) {
        let pos = self
            .assignments
            .binary_search_by_key(&assignment.date, |a| a.date)
            .unwrap_or_else(|e| e);
        self.assignments.insert(pos, assignment);
    }

    pub fn remove(&mut self, id: AssignmentId) -> Option<Assignment> {
        let pos = self.assignments.iter().position(|a| a.id == id)?;
        Some(self.assignments.remove(pos))
    }

    pub fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &Assignment> {
        self.in_range(&DateRange::new(date, date))
    }

    /// Assignments with date in the inclusive range. Binary search bounds the
    /// scan on both sides since the vector is date-sorted.
    pub fn in_range<'a>(
        &'a self,
        range: &DateRange,
    ) -> impl Iterator<Item = &'a Assignment> + use<'a> {
        let lo = self.assignments.partition_point(|a| a.date < range.from);
        let hi = self.assignments.partition_point(|a| a.date <= range.to);
        self.assignments[lo..hi].iter()
    }

    /// Remove every assignment of `task` with date in `range`; returns the
    /// removed rows.
    pub fn remove_matching(&mut self, task: TaskId, range: &DateRange) -> Vec<Assignment> {
        let mut removed = Vec::new();
        self.assignments.retain(|a| {
            if a.task_id == task && range.contains(a.date) {
                removed.push(*a);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Latest assignment date for `task` at or before `up_to`.
    pub fn latest_for_task_up_to(&self, task: TaskId, up_to: NaiveDate) -> Option<NaiveDate> {
        let hi = self.assignments.partition_point(|a| a.date <= up_to);
        self.assignments[..hi]
            .iter()
            .rev()
            .find(|a| a.task_id == task)
            .map(|a| a.date)
    }
}

/// Scheduling decision support for one (user, task, week) combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTaskDependency {
    pub user_id: UserId,
    pub user_name: String,
    /// Most recent completion at or before the queried week start.
    pub last_assigned: Option<NaiveDate>,
    /// Completions in the 365 days strictly before the queried week start.
    pub completed_count: u32,
    /// Per-task summary strings for the queried window, ordered by task name.
    pub assigned_tasks: Vec<String>,
    pub is_in_conflict: bool,
    pub has_obstacle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn assignment(task: TaskId, date: NaiveDate) -> Assignment {
        Assignment {
            id: Ulid::new(),
            user_id: Ulid::new(),
            task_id: task,
            date,
        }
    }

    #[test]
    fn range_contains_inclusive_both_ends() {
        let r = DateRange::new(d(2024, 2, 5), d(2024, 2, 11));
        assert!(r.contains(d(2024, 2, 5)));
        assert!(r.contains(d(2024, 2, 11)));
        assert!(!r.contains(d(2024, 2, 4)));
        assert!(!r.contains(d(2024, 2, 12)));
    }

    #[test]
    fn range_overlap_inclusive() {
        let a = DateRange::new(d(2024, 1, 1), d(2024, 1, 10));
        let b = DateRange::new(d(2024, 1, 10), d(2024, 1, 20));
        let c = DateRange::new(d(2024, 1, 11), d(2024, 1, 20));
        assert!(a.overlaps(&b)); // shared endpoint counts
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn range_days_covers_whole_week() {
        let r = DateRange::new(d(2024, 2, 5), d(2024, 2, 11));
        let days: Vec<_> = r.days().collect();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], d(2024, 2, 5));
        assert_eq!(days[6], d(2024, 2, 11));
        assert_eq!(r.num_days(), 7);
    }

    #[test]
    fn conflict_pair_normalization_is_order_independent() {
        let a = Ulid::new();
        let b = Ulid::new();
        assert_eq!(ConflictPair::normalize(a, b), ConflictPair::normalize(b, a));
    }

    #[test]
    fn schedule_insert_keeps_date_order() {
        let task = Ulid::new();
        let mut sched = UserSchedule::default();
        sched.insert(assignment(task, d(2024, 2, 9)));
        sched.insert(assignment(task, d(2024, 2, 5)));
        sched.insert(assignment(task, d(2024, 2, 7)));
        let dates: Vec<_> = sched.assignments.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![d(2024, 2, 5), d(2024, 2, 7), d(2024, 2, 9)]);
    }

    #[test]
    fn schedule_in_range_bounds() {
        let task = Ulid::new();
        let mut sched = UserSchedule::default();
        for day in [3, 5, 8, 12] {
            sched.insert(assignment(task, d(2024, 2, day)));
        }
        let hits: Vec<_> = sched
            .in_range(&DateRange::new(d(2024, 2, 5), d(2024, 2, 8)))
            .collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].date, d(2024, 2, 5));
        assert_eq!(hits[1].date, d(2024, 2, 8));
    }

    #[test]
    fn remove_matching_only_touches_task_in_range() {
        let task = Ulid::new();
        let other = Ulid::new();
        let mut sched = UserSchedule::default();
        sched.insert(assignment(task, d(2024, 2, 5)));
        sched.insert(assignment(task, d(2024, 2, 20)));
        sched.insert(assignment(other, d(2024, 2, 6)));

        let removed = sched.remove_matching(task, &DateRange::new(d(2024, 2, 1), d(2024, 2, 10)));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].date, d(2024, 2, 5));
        assert_eq!(sched.assignments.len(), 2);
    }

    #[test]
    fn latest_for_task_ignores_later_dates() {
        let task = Ulid::new();
        let mut sched = UserSchedule::default();
        for day in [1, 8, 15] {
            sched.insert(assignment(task, d(2024, 1, day)));
        }
        assert_eq!(
            sched.latest_for_task_up_to(task, d(2024, 1, 10)),
            Some(d(2024, 1, 8))
        );
        assert_eq!(
            sched.latest_for_task_up_to(task, d(2024, 1, 15)),
            Some(d(2024, 1, 15))
        );
        assert_eq!(sched.latest_for_task_up_to(Ulid::new(), d(2024, 1, 31)), None);
    }

    #[test]
    fn obstacle_patch_preserves_unset_fields() {
        let ob = Obstacle {
            id: Ulid::new(),
            user_id: Ulid::new(),
            tasks: HashSet::new(),
            range: DateRange::new(d(2024, 1, 1), d(2024, 1, 2)),
            status: ObstacleStatus::Pending,
            applicant_description: "trip".into(),
            recipient_user: None,
            recipient_answer: Some("noted".into()),
        };
        let patched = ob.apply_patch(&ObstaclePatch {
            status: ObstacleStatus::Rejected,
            recipient_answer: None,
            recipient_user: None,
        });
        assert_eq!(patched.status, ObstacleStatus::Rejected);
        assert_eq!(patched.recipient_answer.as_deref(), Some("noted"));
    }

    #[test]
    fn weekday_labels_follow_calendar_order() {
        let labels: Vec<_> = WEEKDAYS.iter().map(|d| weekday_label(*d)).collect();
        assert_eq!(labels, vec!["Pn", "Wt", "Śr", "Cz", "Pt", "So", "Nd"]);
    }

    #[test]
    fn obstacle_serialization_roundtrip() {
        let ob = Obstacle {
            id: Ulid::new(),
            user_id: Ulid::new(),
            tasks: HashSet::from([Ulid::new()]),
            range: DateRange::new(d(2024, 3, 1), d(2024, 3, 4)),
            status: ObstacleStatus::Pending,
            applicant_description: "retreat".into(),
            recipient_user: None,
            recipient_answer: None,
        };
        let json = serde_json::to_string(&ob).unwrap();
        let decoded: Obstacle = serde_json::from_str(&json).unwrap();
        assert_eq!(ob, decoded);
    }
}
