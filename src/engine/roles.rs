use std::collections::{HashMap, HashSet};

use ulid::Ulid;

use crate::limits::{MAX_NAME_LEN, MAX_REORDER_BATCH};
use crate::model::*;

use super::{Engine, EngineError, EntityKind};

/// Baseline system roles that must never be deleted.
pub const PROTECTED_ROLE_NAMES_DELETE: [&str; 3] = ["ROLE_USER", "ROLE_FUNKCYJNY", "ROLE_ADMIN"];

/// Baseline system roles whose definition must never be edited.
pub const PROTECTED_ROLE_NAMES_UPDATE: [&str; 2] = ["ROLE_USER", "ROLE_FUNKCYJNY"];

/// Holders of this role may act on other users' obstacles.
pub const FUNCTIONAL_ROLE: &str = "ROLE_FUNKCYJNY";

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub kind: RoleKind,
    pub tasks_visible_in_prints: bool,
}

/// The ordered role catalog. Sort orders are dense per kind: after any
/// sequence of operations the orders of kind K are exactly {1..N}. All
/// maintenance is pure in-memory index shifting, committed under the
/// catalog's single write lock.
#[derive(Debug, Clone, Default)]
pub(super) struct RoleCatalog {
    roles: HashMap<RoleId, Role>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Role> {
        self.roles.values().find(|r| r.name == name)
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    pub fn by_name_and_kind(&self, name: &str, kind: RoleKind) -> Option<&Role> {
        self.roles.values().find(|r| r.name == name && r.kind == kind)
    }

    pub fn count_of_kind(&self, kind: RoleKind) -> u32 {
        self.roles.values().filter(|r| r.kind == kind).count() as u32
    }

    pub fn sorted_all(&self) -> Vec<Role> {
        let mut all: Vec<Role> = self.roles.values().cloned().collect();
        all.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        all
    }

    pub fn sorted_of_kind(&self, kind: RoleKind) -> Vec<Role> {
        let mut of_kind: Vec<Role> = self.roles.values().filter(|r| r.kind == kind).cloned().collect();
        of_kind.sort_by_key(|r| r.sort_order);
        of_kind
    }

    pub fn sorted_visible(&self, visible: bool) -> Vec<Role> {
        let mut matching: Vec<Role> = self
            .roles
            .values()
            .filter(|r| r.tasks_visible_in_prints == visible)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        matching
    }

    pub fn next_sort_order(&self, kind: RoleKind) -> u32 {
        self.roles
            .values()
            .filter(|r| r.kind == kind)
            .map(|r| r.sort_order)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Store `role` at `position`, shifting every same-kind role at or above
    /// the position up by one. A plain append (position == N+1) shifts nothing.
    pub fn insert_at(&mut self, mut role: Role, position: u32) {
        for other in self.roles.values_mut() {
            if other.kind == role.kind && other.sort_order >= position {
                other.sort_order += 1;
            }
        }
        role.sort_order = position;
        self.roles.insert(role.id, role);
    }

    /// Remove a role and close the gap: same-kind roles above it shift down.
    pub fn remove(&mut self, id: &RoleId) -> Option<Role> {
        let removed = self.roles.remove(id)?;
        for other in self.roles.values_mut() {
            if other.kind == removed.kind && other.sort_order > removed.sort_order {
                other.sort_order -= 1;
            }
        }
        Some(removed)
    }

    pub fn set_sort_order(&mut self, id: &RoleId, order: u32) -> bool {
        match self.roles.get_mut(id) {
            Some(role) => {
                role.sort_order = order;
                true
            }
            None => false,
        }
    }

    /// Whether the sort orders of `kind` form exactly {1..N}.
    pub fn is_dense(&self, kind: RoleKind) -> bool {
        let mut orders: Vec<u32> = self
            .roles
            .values()
            .filter(|r| r.kind == kind)
            .map(|r| r.sort_order)
            .collect();
        orders.sort_unstable();
        orders.iter().enumerate().all(|(i, o)| *o == i as u32 + 1)
    }

    pub fn roles_mut(&mut self) -> impl Iterator<Item = &mut Role> {
        self.roles.values_mut()
    }
}

impl Engine {
    /// Append a role at the end of its kind's order.
    pub async fn create_role(&self, new: NewRole) -> Result<RoleId, EngineError> {
        let mut catalog = self.store.roles().write().await;
        let position = catalog.next_sort_order(new.kind);
        Self::insert_role(&mut catalog, new, position)
    }

    /// Store a role at an explicit rank; existing same-kind roles at or above
    /// it shift up. Position is clamped to [1, N+1].
    pub async fn insert_role_at(&self, new: NewRole, position: u32) -> Result<RoleId, EngineError> {
        let mut catalog = self.store.roles().write().await;
        let max = catalog.count_of_kind(new.kind) + 1;
        let position = position.clamp(1, max);
        Self::insert_role(&mut catalog, new, position)
    }

    fn insert_role(
        catalog: &mut RoleCatalog,
        new: NewRole,
        position: u32,
    ) -> Result<RoleId, EngineError> {
        if new.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("role name too long"));
        }
        if catalog.name_exists(&new.name) {
            return Err(EngineError::AlreadyExists(EntityKind::Role, new.name));
        }
        let id = Ulid::new();
        catalog.insert_at(
            Role {
                id,
                name: new.name,
                kind: new.kind,
                sort_order: 0, // assigned by insert_at
                tasks_visible_in_prints: new.tasks_visible_in_prints,
            },
            position,
        );
        Ok(id)
    }

    pub async fn update_role(&self, id: RoleId, update: NewRole) -> Result<(), EngineError> {
        if update.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("role name too long"));
        }
        let mut catalog = self.store.roles().write().await;
        let existing = catalog
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(EntityKind::Role, id.to_string()))?;
        if PROTECTED_ROLE_NAMES_UPDATE.contains(&existing.name.as_str()) {
            return Err(EngineError::SensitiveEntityProtected(existing.name));
        }
        if update.name != existing.name && catalog.name_exists(&update.name) {
            return Err(EngineError::AlreadyExists(EntityKind::Role, update.name));
        }

        if update.kind != existing.kind {
            // Changing kind moves the role: collapse the old kind's order,
            // append at the end of the new kind's.
            catalog.remove(&id);
            let position = catalog.next_sort_order(update.kind);
            catalog.insert_at(
                Role {
                    id,
                    name: update.name,
                    kind: update.kind,
                    sort_order: 0,
                    tasks_visible_in_prints: update.tasks_visible_in_prints,
                },
                position,
            );
        } else if let Some(role) = catalog.roles_mut().find(|r| r.id == id) {
            role.name = update.name;
            role.tasks_visible_in_prints = update.tasks_visible_in_prints;
        }
        Ok(())
    }

    /// Delete a role: expire sessions of every holder, strip the role from all
    /// tasks and users, and close the sort-order gap — one unit under the
    /// catalog's write lock.
    pub async fn delete_role(&self, id: RoleId) -> Result<(), EngineError> {
        let mut catalog = self.store.roles().write().await;
        let role = catalog
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(EntityKind::Role, id.to_string()))?;
        if PROTECTED_ROLE_NAMES_DELETE.contains(&role.name.as_str()) {
            return Err(EngineError::SensitiveEntityProtected(role.name));
        }

        let holders: Vec<UserId> = self
            .store
            .users()
            .into_iter()
            .filter(|u| u.roles.contains(&id))
            .map(|u| u.id)
            .collect();

        self.store.for_each_user_mut(|user| {
            user.roles.remove(&id);
        });
        self.store.for_each_task_mut(|task| {
            task.allowed_roles.remove(&id);
            if task.supervisor_role == Some(id) {
                task.supervisor_role = None;
            }
        });
        catalog.remove(&id);
        drop(catalog);

        for holder in &holders {
            self.sessions.expire_sessions(*holder).await;
        }
        tracing::info!(role = %role.name, holders = holders.len(), "role deleted, references stripped");
        Ok(())
    }

    /// Apply a batch of (role, new sort order) updates. The batch must be a
    /// valid permutation: if the resulting orders are not dense per kind the
    /// whole batch is rejected and nothing changes.
    pub async fn reorder_roles(&self, updates: Vec<(RoleId, u32)>) -> Result<(), EngineError> {
        if updates.len() > MAX_REORDER_BATCH {
            return Err(EngineError::LimitExceeded("reorder batch too large"));
        }
        let mut catalog = self.store.roles().write().await;
        let mut staged = catalog.clone();
        for (id, order) in &updates {
            if !staged.set_sort_order(id, *order) {
                return Err(EngineError::NotFound(EntityKind::Role, id.to_string()));
            }
        }
        for kind in [RoleKind::Supervisor, RoleKind::Regular] {
            if !staged.is_dense(kind) {
                return Err(EngineError::InvalidArgument(
                    "reordered sort orders are not dense".into(),
                ));
            }
        }
        *catalog = staged;
        Ok(())
    }

    /// Make exactly the listed roles print-visible; all others become hidden.
    pub async fn set_print_visibility(&self, visible: &[RoleId]) -> Result<(), EngineError> {
        let visible: HashSet<RoleId> = visible.iter().copied().collect();
        let mut catalog = self.store.roles().write().await;
        for role in catalog.roles_mut() {
            role.tasks_visible_in_prints = visible.contains(&role.id);
        }
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────

    pub async fn role_by_id(&self, id: RoleId) -> Option<Role> {
        self.store.roles().read().await.get(&id).cloned()
    }

    pub async fn role_by_name(&self, name: &str) -> Option<Role> {
        self.store.roles().read().await.by_name(name).cloned()
    }

    pub async fn role_by_name_and_kind(&self, name: &str, kind: RoleKind) -> Option<Role> {
        self.store.roles().read().await.by_name_and_kind(name, kind).cloned()
    }

    pub async fn role_name_exists(&self, name: &str) -> bool {
        self.store.roles().read().await.name_exists(name)
    }

    pub async fn roles_ordered(&self) -> Vec<Role> {
        self.store.roles().read().await.sorted_all()
    }

    pub async fn roles_by_kind(&self, kind: RoleKind) -> Vec<Role> {
        self.store.roles().read().await.sorted_of_kind(kind)
    }

    pub async fn roles_visible_in_prints(&self, visible: bool) -> Vec<Role> {
        self.store.roles().read().await.sorted_visible(visible)
    }

    pub async fn roles_ordered_excluding(&self, names: &[&str]) -> Vec<Role> {
        self.store
            .roles()
            .read()
            .await
            .sorted_all()
            .into_iter()
            .filter(|r| !names.contains(&r.name.as_str()))
            .collect()
    }

    /// Resolve role names to ids; unknown names are skipped.
    pub async fn roles_by_names(&self, names: &HashSet<String>) -> HashSet<RoleId> {
        let catalog = self.store.roles().read().await;
        names
            .iter()
            .filter_map(|n| catalog.by_name(n).map(|r| r.id))
            .collect()
    }

    pub(super) async fn user_holds_role_named(&self, user: &User, name: &str) -> bool {
        let catalog = self.store.roles().read().await;
        user.roles
            .iter()
            .any(|id| catalog.get(id).is_some_and(|r| r.name == name))
    }
}
