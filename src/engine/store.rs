use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

use super::conflict::ConflictTable;
use super::roles::RoleCatalog;

pub type SharedUserSchedule = Arc<RwLock<UserSchedule>>;

/// In-memory realization of the store the engine assumes: id-keyed catalogs,
/// per-user schedule shards, and the two ordered structures (role catalog,
/// conflict table) behind their own locks.
pub struct Store {
    users: DashMap<UserId, User>,
    tasks: DashMap<TaskId, Task>,
    roles: RwLock<RoleCatalog>,
    conflicts: RwLock<ConflictTable>,
    schedules: DashMap<UserId, SharedUserSchedule>,
    /// Reverse lookup: assignment id → owning user id.
    assignment_owner: DashMap<AssignmentId, UserId>,
    obstacles: DashMap<ObstacleId, Obstacle>,
    /// Per-user obstacle index for O(1) (user, task) queries.
    obstacles_by_user: DashMap<UserId, Vec<ObstacleId>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            tasks: DashMap::new(),
            roles: RwLock::new(RoleCatalog::new()),
            conflicts: RwLock::new(ConflictTable::new()),
            schedules: DashMap::new(),
            assignment_owner: DashMap::new(),
            obstacles: DashMap::new(),
            obstacles_by_user: DashMap::new(),
        }
    }

    // ── User catalog ─────────────────────────────────────────

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn user(&self, id: &UserId) -> Option<User> {
        self.users.get(id).map(|e| e.value().clone())
    }

    pub fn user_exists(&self, id: &UserId) -> bool {
        self.users.contains_key(id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.users
            .iter()
            .find(|e| e.value().email == email)
            .map(|e| e.value().clone())
    }

    pub fn remove_user(&self, id: &UserId) -> Option<User> {
        self.users.remove(id).map(|(_, u)| u)
    }

    pub fn users(&self) -> Vec<User> {
        self.users.iter().map(|e| e.value().clone()).collect()
    }

    /// Apply `f` to every stored user. No await may happen inside `f`.
    pub fn for_each_user_mut(&self, mut f: impl FnMut(&mut User)) {
        for mut entry in self.users.iter_mut() {
            f(entry.value_mut());
        }
    }

    // ── Task catalog ─────────────────────────────────────────

    pub fn insert_task(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.get(id).map(|e| e.value().clone())
    }

    pub fn task_exists(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn remove_task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.remove(id).map(|(_, t)| t)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(|e| e.value().clone()).collect()
    }

    pub fn tasks_by_supervisor(&self, role: RoleId) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|e| e.value().supervisor_role == Some(role))
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn for_each_task_mut(&self, mut f: impl FnMut(&mut Task)) {
        for mut entry in self.tasks.iter_mut() {
            f(entry.value_mut());
        }
    }

    // ── Ordered structures ───────────────────────────────────

    pub fn roles(&self) -> &RwLock<RoleCatalog> {
        &self.roles
    }

    pub fn conflicts(&self) -> &RwLock<ConflictTable> {
        &self.conflicts
    }

    // ── Schedule shards ──────────────────────────────────────

    /// The user's schedule shard, created on first touch.
    pub fn shard(&self, user: UserId) -> SharedUserSchedule {
        self.schedules
            .entry(user)
            .or_insert_with(|| Arc::new(RwLock::new(UserSchedule::default())))
            .clone()
    }

    pub fn existing_shard(&self, user: &UserId) -> Option<SharedUserSchedule> {
        self.schedules.get(user).map(|e| e.value().clone())
    }

    pub fn remove_shard(&self, user: &UserId) -> Option<SharedUserSchedule> {
        self.schedules.remove(user).map(|(_, s)| s)
    }

    pub fn shards(&self) -> Vec<(UserId, SharedUserSchedule)> {
        self.schedules
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    // ── Assignment index ─────────────────────────────────────

    pub fn map_assignment(&self, assignment: AssignmentId, user: UserId) {
        self.assignment_owner.insert(assignment, user);
    }

    pub fn unmap_assignment(&self, assignment: &AssignmentId) {
        self.assignment_owner.remove(assignment);
    }

    pub fn assignment_owner(&self, assignment: &AssignmentId) -> Option<UserId> {
        self.assignment_owner.get(assignment).map(|e| *e.value())
    }

    // ── Obstacles ────────────────────────────────────────────

    pub fn insert_obstacle(&self, obstacle: Obstacle) {
        self.obstacles_by_user
            .entry(obstacle.user_id)
            .or_default()
            .push(obstacle.id);
        self.obstacles.insert(obstacle.id, obstacle);
    }

    /// Replace an obstacle already present under the same id and owner.
    pub fn replace_obstacle(&self, obstacle: Obstacle) {
        self.obstacles.insert(obstacle.id, obstacle);
    }

    pub fn obstacle(&self, id: &ObstacleId) -> Option<Obstacle> {
        self.obstacles.get(id).map(|e| e.value().clone())
    }

    pub fn remove_obstacle(&self, id: &ObstacleId) -> Option<Obstacle> {
        let removed = self.obstacles.remove(id).map(|(_, o)| o)?;
        if let Some(mut ids) = self.obstacles_by_user.get_mut(&removed.user_id) {
            ids.retain(|oid| oid != id);
        }
        Some(removed)
    }

    pub fn obstacles(&self) -> Vec<Obstacle> {
        self.obstacles.iter().map(|e| e.value().clone()).collect()
    }

    pub fn obstacles_of_user(&self, user: &UserId) -> Vec<Obstacle> {
        let ids = match self.obstacles_by_user.get(user) {
            Some(e) => e.value().clone(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.obstacle(id)).collect()
    }
}
