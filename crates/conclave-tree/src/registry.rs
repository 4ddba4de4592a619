//! Process-wide lookup from `agent_id` to live actor handle plus metadata (glossary:
//! Registry, spec §4 component H). Many readers, writes only by the Tree Lifecycle
//! Controller on spawn/dismiss/restore (spec §5 "Shared-resource policy") — backed by
//! `dashmap` for reader-preferring lookups, the same concurrent-map choice the donor
//! makes elsewhere in this workspace for shared process tables.

use conclave_agent::MailboxSender;
use conclave_core::{AgentId, TaskId};
use dashmap::DashMap;
use tokio::task::JoinHandle;

/// What the Registry remembers about one live agent process.
pub struct RegistryEntry {
    pub task_id: TaskId,
    pub parent_id: Option<AgentId>,
    pub sender: MailboxSender,
    pub handle: JoinHandle<()>,
}

/// A read-only copy of a `RegistryEntry`'s metadata, safe to hand out to many readers
/// (the entry itself isn't `Clone` — its `JoinHandle` isn't either).
#[derive(Clone)]
pub struct RegistrySnapshot {
    pub task_id: TaskId,
    pub parent_id: Option<AgentId>,
    pub sender: MailboxSender,
}

#[derive(Default)]
pub struct Registry {
    entries: DashMap<AgentId, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    pub fn insert(&self, agent_id: AgentId, entry: RegistryEntry) {
        self.entries.insert(agent_id, entry);
    }

    pub fn snapshot(&self, agent_id: &AgentId) -> Option<RegistrySnapshot> {
        self.entries.get(agent_id).map(|e| RegistrySnapshot {
            task_id: e.task_id.clone(),
            parent_id: e.parent_id.clone(),
            sender: e.sender.clone(),
        })
    }

    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.entries.contains_key(agent_id)
    }

    /// Removes and returns the entry so the caller can `.await` its `JoinHandle`
    /// (spec §4.6 dismiss: "terminates leaves first").
    pub fn remove(&self, agent_id: &AgentId) -> Option<RegistryEntry> {
        self.entries.remove(agent_id).map(|(_, v)| v)
    }

    pub fn direct_children_of(&self, parent_id: &AgentId) -> Vec<AgentId> {
        self.entries
            .iter()
            .filter(|e| e.parent_id.as_ref() == Some(parent_id))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Every live agent currently registered for a Task (spec §4.6 "Enumerate all
    /// live agents for the Task from the Registry").
    pub fn live_agents_for_task(&self, task_id: &TaskId) -> Vec<AgentId> {
        self.entries
            .iter()
            .filter(|e| e.task_id == *task_id)
            .map(|e| e.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_agent::Mailbox;

    fn entry(task_id: TaskId, parent_id: Option<AgentId>) -> RegistryEntry {
        let (sender, _mailbox) = Mailbox::channel();
        RegistryEntry { task_id, parent_id, sender, handle: tokio::spawn(async {}) }
    }

    #[test]
    fn direct_children_filters_by_parent() {
        let reg = Registry::new();
        let task = TaskId::new();
        let parent = AgentId::new();
        let child_a = AgentId::new();
        let child_b = AgentId::new();
        let unrelated = AgentId::new();

        reg.insert(child_a.clone(), entry(task.clone(), Some(parent.clone())));
        reg.insert(child_b.clone(), entry(task.clone(), Some(parent.clone())));
        reg.insert(unrelated.clone(), entry(task.clone(), None));

        let mut children = reg.direct_children_of(&parent);
        children.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        let mut expected = vec![child_a, child_b];
        expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(children, expected);
    }

    #[test]
    fn live_agents_for_task_excludes_other_tasks() {
        let reg = Registry::new();
        let task_a = TaskId::new();
        let task_b = TaskId::new();
        let agent_a = AgentId::new();
        let agent_b = AgentId::new();
        reg.insert(agent_a.clone(), entry(task_a.clone(), None));
        reg.insert(agent_b, entry(task_b, None));

        let live = reg.live_agents_for_task(&task_a);
        assert_eq!(live, vec![agent_a]);
    }
}
