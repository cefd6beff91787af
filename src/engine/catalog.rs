use std::collections::HashSet;

use chrono::Weekday;
use ulid::Ulid;

use crate::limits::MAX_NAME_LEN;
use crate::model::*;

use super::{Engine, EngineError, EntityKind};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub surname: String,
    pub email: String,
    /// Resolved against the role catalog; unknown names are skipped.
    pub role_names: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub category: String,
    pub participants_limit: u32,
    pub days_of_week: HashSet<Weekday>,
    /// Resolved against the role catalog; unknown names are skipped.
    pub allowed_role_names: HashSet<String>,
    /// Must name a Supervisor-kind role when present.
    pub supervisor_role_name: Option<String>,
    pub permanent: bool,
    pub whole_period: bool,
}

impl Engine {
    // ── Users ────────────────────────────────────────────────

    pub async fn create_user(&self, new: NewUser) -> Result<UserId, EngineError> {
        if new.name.len() > MAX_NAME_LEN
            || new.surname.len() > MAX_NAME_LEN
            || new.email.len() > MAX_NAME_LEN
        {
            return Err(EngineError::LimitExceeded("user field too long"));
        }
        if self.store.user_by_email(&new.email).is_some() {
            return Err(EngineError::AlreadyExists(EntityKind::User, new.email));
        }
        let roles = self.roles_by_names(&new.role_names).await;
        let id = Ulid::new();
        self.store.insert_user(User {
            id,
            name: new.name,
            surname: new.surname,
            email: new.email,
            roles,
        });
        Ok(id)
    }

    /// Administrative replacement of a user's role set.
    pub async fn update_user_roles(
        &self,
        id: UserId,
        role_names: HashSet<String>,
    ) -> Result<(), EngineError> {
        let mut user = self.require_user(id)?;
        user.roles = self.roles_by_names(&role_names).await;
        self.store.insert_user(user);
        Ok(())
    }

    /// Delete a user together with their schedule shard and obstacles.
    pub async fn delete_user(&self, id: UserId) -> Result<(), EngineError> {
        if !self.store.user_exists(&id) {
            return Err(EngineError::NotFound(EntityKind::User, id.to_string()));
        }
        if let Some(shard) = self.store.remove_shard(&id) {
            let schedule = shard.read().await;
            for assignment in &schedule.assignments {
                self.store.unmap_assignment(&assignment.id);
            }
        }
        for obstacle in self.store.obstacles_of_user(&id) {
            self.store.remove_obstacle(&obstacle.id);
        }
        self.store.remove_user(&id);
        Ok(())
    }

    pub async fn user_by_id(&self, id: UserId) -> Option<User> {
        self.store.user(&id)
    }

    pub async fn user_by_email(&self, email: &str) -> Option<User> {
        self.store.user_by_email(email)
    }

    pub async fn user_exists(&self, id: UserId) -> bool {
        self.store.user_exists(&id)
    }

    pub async fn list_users(&self) -> Vec<User> {
        let mut users = self.store.users();
        users.sort_by(|a, b| (&a.surname, &a.name).cmp(&(&b.surname, &b.name)));
        users
    }

    // ── Tasks ────────────────────────────────────────────────

    pub async fn create_task(&self, new: NewTask) -> Result<TaskId, EngineError> {
        let (allowed_roles, supervisor_role) = self.resolve_task_roles(&new).await?;
        if new.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("task name too long"));
        }
        let id = Ulid::new();
        self.store.insert_task(Task {
            id,
            name: new.name,
            category: new.category,
            participants_limit: new.participants_limit,
            days_of_week: new.days_of_week,
            allowed_roles,
            supervisor_role,
            permanent: new.permanent,
            whole_period: new.whole_period,
        });
        Ok(id)
    }

    pub async fn update_task(&self, id: TaskId, update: NewTask) -> Result<(), EngineError> {
        let mut task = self.require_task(id)?;
        let (allowed_roles, supervisor_role) = self.resolve_task_roles(&update).await?;
        if update.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("task name too long"));
        }
        task.name = update.name;
        task.category = update.category;
        task.participants_limit = update.participants_limit;
        task.days_of_week = update.days_of_week;
        task.allowed_roles = allowed_roles;
        task.supervisor_role = supervisor_role;
        task.permanent = update.permanent;
        task.whole_period = update.whole_period;
        self.store.insert_task(task);
        Ok(())
    }

    /// Delete a task and everything hanging off it: its assignments, the
    /// obstacles covering it, and its conflict pairs.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), EngineError> {
        if !self.store.task_exists(&id) {
            return Err(EngineError::NotFound(EntityKind::Task, id.to_string()));
        }
        let assignments = self.delete_assignments_by_task(id).await;
        let obstacles = self.delete_obstacles_by_task(id).await;
        let conflicts = self.store.conflicts().write().await.remove_involving(id);
        self.store.remove_task(&id);
        tracing::info!(task = %id, assignments, obstacles, conflicts, "task deleted with cascade");
        Ok(())
    }

    pub async fn task_by_id(&self, id: TaskId) -> Option<Task> {
        self.store.task(&id)
    }

    pub async fn task_exists(&self, id: TaskId) -> bool {
        self.store.task_exists(&id)
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        let mut tasks = self.store.tasks();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    /// Tasks supervised by the named Supervisor-kind role.
    pub async fn tasks_by_supervisor_role_name(
        &self,
        name: &str,
    ) -> Result<Vec<Task>, EngineError> {
        let role = self
            .role_by_name_and_kind(name, RoleKind::Supervisor)
            .await
            .ok_or_else(|| EngineError::NotFound(EntityKind::Role, name.to_string()))?;
        Ok(self.store.tasks_by_supervisor(role.id))
    }

    async fn resolve_task_roles(
        &self,
        new: &NewTask,
    ) -> Result<(HashSet<RoleId>, Option<RoleId>), EngineError> {
        let allowed = self.roles_by_names(&new.allowed_role_names).await;
        let supervisor = match &new.supervisor_role_name {
            Some(name) => Some(
                self.role_by_name_and_kind(name, RoleKind::Supervisor)
                    .await
                    .ok_or_else(|| EngineError::NotFound(EntityKind::Role, name.clone()))?
                    .id,
            ),
            None => None,
        };
        Ok((allowed, supervisor))
    }
}
