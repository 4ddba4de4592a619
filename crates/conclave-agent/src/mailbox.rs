//! The Agent Actor's mailbox (spec §4.1, §5): a single ordered `mpsc` channel carrying
//! every message kind the actor can receive. `stop_requested` is delivered through
//! this same channel by direct send — never via a side worker that could race with
//! `trigger_consensus` — which is what keeps FIFO ordering intact (spec §4.6's "do
//! not implement pause by externally forcing termination").

use conclave_core::{ActionId, AgentId, Value};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub enum ActionOutcome {
    Success(Value),
    Failure(conclave_core::Error),
}

#[derive(Clone, Debug)]
pub enum AgentMessage {
    UserMessage { content: String },
    AgentMessage { from_id: AgentId, content: String },
    TriggerConsensus,
    ContinueConsensus,
    ActionResult { action_id: ActionId, action_type: conclave_core::ActionType, outcome: ActionOutcome },
    BatchActionResult { sub_action_id: ActionId, action_type: conclave_core::ActionType, outcome: ActionOutcome },
    BatchCompleted { batch_id: ActionId, results: Vec<(ActionId, ActionOutcome)> },
    ChildSpawned { agent_id: AgentId },
    ChildDismissed { agent_id: AgentId },
    UpdateTodos { items: Vec<BTreeMap<String, Value>> },
    RecordOrientation { summary: String },
    UpdateSkills { skills: Vec<conclave_core::model::Skill> },
    UpdateBudgetData { new_data: conclave_core::model::BudgetData },
    UpdateBudgetCommitted { delta: Decimal },
    ReleaseBudgetCommitted { amount: Decimal },
    WaitExpired { timer_ref: u64 },
    SpawnFailed { child_id: AgentId, reason: String },
    StopRequested,
    GetState { reply: tokio::sync::oneshot::Sender<conclave_core::model::Agent> },
}

impl AgentMessage {
    /// True for the two kinds that request a consensus cycle (spec §4.1). Every
    /// other message kind only mutates state and, where noted, self-posts one of
    /// these to request the next cycle.
    pub fn is_trigger(&self) -> bool {
        matches!(self, AgentMessage::TriggerConsensus | AgentMessage::ContinueConsensus)
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, AgentMessage::StopRequested)
    }
}

/// Owning half of an agent's mailbox; cheaply cloneable, handed to the Tree
/// Lifecycle Controller and to sibling agents that want to `send_message`.
#[derive(Clone)]
pub struct MailboxSender {
    tx: tokio::sync::mpsc::UnboundedSender<AgentMessage>,
}

impl MailboxSender {
    pub fn send(&self, message: AgentMessage) -> Result<(), AgentMessage> {
        self.tx.send(message).map_err(|e| e.0)
    }
}

pub struct Mailbox {
    rx: tokio::sync::mpsc::UnboundedReceiver<AgentMessage>,
}

impl Mailbox {
    pub fn channel() -> (MailboxSender, Mailbox) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (MailboxSender { tx }, Mailbox { rx })
    }

    pub async fn recv(&mut self) -> Option<AgentMessage> {
        self.rx.recv().await
    }

    /// Drains every immediately-available `trigger_consensus`/`continue_consensus`
    /// message from the mailbox, collapsing any number of them into a single
    /// logical re-trigger (spec §4.1 "the drain rule", P4). Non-trigger messages
    /// encountered during the drain are returned in order so the caller can apply
    /// them before running the next cycle; a `stop_requested` encountered during
    /// the drain is returned immediately and ends the drain (P5: triggers queued
    /// strictly before a stop are still honored by the cycle that follows the
    /// drain, but the stop itself is never swallowed).
    pub fn try_drain_triggers(&mut self) -> DrainResult {
        let mut saw_trigger = false;
        let mut other = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(msg) if msg.is_trigger() => saw_trigger = true,
                Ok(msg) if msg.is_stop() => {
                    return DrainResult { saw_trigger, other, stopped: true };
                }
                Ok(msg) => other.push(msg),
                Err(_) => break,
            }
        }
        DrainResult { saw_trigger, other, stopped: false }
    }
}

pub struct DrainResult {
    pub saw_trigger: bool,
    pub other: Vec<AgentMessage>,
    pub stopped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// P4: N >= 1 triggers posted during a cycle collapse to a single drain result.
    #[test]
    fn p4_drain_collapses_multiple_triggers() {
        let (tx, mut mailbox) = Mailbox::channel();
        tx.send(AgentMessage::TriggerConsensus).unwrap();
        tx.send(AgentMessage::ContinueConsensus).unwrap();
        tx.send(AgentMessage::TriggerConsensus).unwrap();
        let drained = mailbox.try_drain_triggers();
        assert!(drained.saw_trigger);
        assert!(drained.other.is_empty());
        assert!(!drained.stopped);
    }

    /// P5: a stop_requested posted after K triggers is observed by the drain, and
    /// is never dropped even though it arrives interleaved with triggers.
    #[test]
    fn p5_stop_requested_after_triggers_is_observed() {
        let (tx, mut mailbox) = Mailbox::channel();
        tx.send(AgentMessage::TriggerConsensus).unwrap();
        tx.send(AgentMessage::TriggerConsensus).unwrap();
        tx.send(AgentMessage::StopRequested).unwrap();
        let drained = mailbox.try_drain_triggers();
        assert!(drained.saw_trigger);
        assert!(drained.stopped);
    }

    #[test]
    fn non_trigger_messages_are_preserved_in_order() {
        let (tx, mut mailbox) = Mailbox::channel();
        let id_a = AgentId::new();
        let id_b = AgentId::new();
        tx.send(AgentMessage::ChildSpawned { agent_id: id_a.clone() }).unwrap();
        tx.send(AgentMessage::TriggerConsensus).unwrap();
        tx.send(AgentMessage::ChildDismissed { agent_id: id_b.clone() }).unwrap();
        let drained = mailbox.try_drain_triggers();
        assert_eq!(drained.other.len(), 2);
        assert!(matches!(&drained.other[0], AgentMessage::ChildSpawned { agent_id } if *agent_id == id_a));
        assert!(matches!(&drained.other[1], AgentMessage::ChildDismissed { agent_id } if *agent_id == id_b));
    }
}
