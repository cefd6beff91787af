use std::collections::{HashMap, HashSet};

use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError, EntityKind};

/// The undirected conflict relation. Pairs are stored normalized
/// (smaller id first) so (A,B) and (B,A) are one entity, and membership
/// is a single set lookup.
#[derive(Debug, Default)]
pub(super) struct ConflictTable {
    by_id: HashMap<ConflictId, ConflictPair>,
    pairs: HashSet<(TaskId, TaskId)>,
}

impl ConflictTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ConflictId) -> Option<&ConflictPair> {
        self.by_id.get(id)
    }

    pub fn contains_pair(&self, a: TaskId, b: TaskId) -> bool {
        a != b && self.pairs.contains(&ConflictPair::normalize(a, b))
    }

    pub fn insert(&mut self, pair: ConflictPair) {
        self.pairs.insert((pair.first, pair.second));
        self.by_id.insert(pair.id, pair);
    }

    pub fn remove(&mut self, id: &ConflictId) -> Option<ConflictPair> {
        let removed = self.by_id.remove(id)?;
        self.pairs.remove(&(removed.first, removed.second));
        Some(removed)
    }

    pub fn all(&self) -> Vec<ConflictPair> {
        self.by_id.values().copied().collect()
    }

    /// Drop every pair involving `task`; returns how many were removed.
    pub fn remove_involving(&mut self, task: TaskId) -> usize {
        let doomed: Vec<ConflictId> = self
            .by_id
            .values()
            .filter(|p| p.involves(task))
            .map(|p| p.id)
            .collect();
        for id in &doomed {
            self.remove(id);
        }
        doomed.len()
    }
}

impl Engine {
    /// Declare that two distinct existing tasks must never be assigned to the
    /// same user on the same date.
    pub async fn declare_conflict(&self, task_a: TaskId, task_b: TaskId) -> Result<ConflictId, EngineError> {
        self.require_task(task_a)?;
        self.require_task(task_b)?;
        if task_a == task_b {
            return Err(EngineError::SameTasksForConflict);
        }
        let (first, second) = ConflictPair::normalize(task_a, task_b);
        let mut table = self.store.conflicts().write().await;
        if table.contains_pair(first, second) {
            return Err(EngineError::AlreadyExists(
                EntityKind::Conflict,
                format!("({first}, {second})"),
            ));
        }
        let id = Ulid::new();
        table.insert(ConflictPair { id, first, second });
        Ok(id)
    }

    /// Repoint an existing conflict at a different task pair.
    pub async fn update_conflict(
        &self,
        id: ConflictId,
        task_a: TaskId,
        task_b: TaskId,
    ) -> Result<(), EngineError> {
        self.require_task(task_a)?;
        self.require_task(task_b)?;
        if task_a == task_b {
            return Err(EngineError::SameTasksForConflict);
        }
        let (first, second) = ConflictPair::normalize(task_a, task_b);
        let mut table = self.store.conflicts().write().await;
        let existing = table
            .get(&id)
            .copied()
            .ok_or_else(|| EngineError::NotFound(EntityKind::Conflict, id.to_string()))?;
        if (existing.first, existing.second) != (first, second) && table.contains_pair(first, second) {
            return Err(EngineError::AlreadyExists(
                EntityKind::Conflict,
                format!("({first}, {second})"),
            ));
        }
        table.remove(&id);
        table.insert(ConflictPair { id, first, second });
        Ok(())
    }

    pub async fn remove_conflict(&self, id: ConflictId) -> Result<(), EngineError> {
        let mut table = self.store.conflicts().write().await;
        table
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(EntityKind::Conflict, id.to_string()))
    }

    pub async fn conflict_by_id(&self, id: ConflictId) -> Option<ConflictPair> {
        self.store.conflicts().read().await.get(&id).copied()
    }

    pub async fn conflict_exists(&self, id: ConflictId) -> bool {
        self.store.conflicts().read().await.get(&id).is_some()
    }

    pub async fn list_conflicts(&self) -> Vec<ConflictPair> {
        self.store.conflicts().read().await.all()
    }

    /// O(1) membership test on the normalized pair. Identical ids are never
    /// in conflict — pairs only exist between distinct tasks.
    pub async fn tasks_are_in_conflict(&self, task_a: TaskId, task_b: TaskId) -> bool {
        self.store.conflicts().read().await.contains_pair(task_a, task_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_symmetric_and_excludes_self() {
        let mut table = ConflictTable::new();
        let a = Ulid::new();
        let b = Ulid::new();
        let (first, second) = ConflictPair::normalize(a, b);
        table.insert(ConflictPair {
            id: Ulid::new(),
            first,
            second,
        });
        assert!(table.contains_pair(a, b));
        assert!(table.contains_pair(b, a));
        assert!(!table.contains_pair(a, a));
    }

    #[test]
    fn remove_clears_pair_membership() {
        let mut table = ConflictTable::new();
        let a = Ulid::new();
        let b = Ulid::new();
        let (first, second) = ConflictPair::normalize(a, b);
        let id = Ulid::new();
        table.insert(ConflictPair { id, first, second });
        table.remove(&id);
        assert!(!table.contains_pair(a, b));
        assert!(table.all().is_empty());
    }

    #[test]
    fn remove_involving_drops_all_pairs_of_task() {
        let mut table = ConflictTable::new();
        let hub = Ulid::new();
        let others: Vec<Ulid> = (0..3).map(|_| Ulid::new()).collect();
        for other in &others {
            let (first, second) = ConflictPair::normalize(hub, *other);
            table.insert(ConflictPair {
                id: Ulid::new(),
                first,
                second,
            });
        }
        let (first, second) = ConflictPair::normalize(others[0], others[1]);
        table.insert(ConflictPair {
            id: Ulid::new(),
            first,
            second,
        });

        assert_eq!(table.remove_involving(hub), 3);
        assert!(table.contains_pair(others[0], others[1]));
        assert_eq!(table.all().len(), 1);
    }
}
