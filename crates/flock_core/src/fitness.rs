//! Per-episode fitness accounting.
//!
//! The ledger keeps one entry per agent that started the episode, keyed by
//! [`AgentId`] rather than by position in the live collections, so scores
//! survive the removal of eliminated agents. All reward flow goes through the
//! three credit operations; an entry freezes when its agent is eliminated and
//! never changes again.

use std::fmt;

use crate::io::config::FitnessConfig;

/// Index of an agent in the batch that started the episode.
///
/// Live collections compact as agents are eliminated, so positions shift over
/// time; the id is the stable key back to the caller's ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
struct Entry {
    value: f64,
    frozen: bool,
}

/// Accumulated scalar fitness per starting agent.
#[derive(Clone, Debug)]
pub struct FitnessLedger {
    entries: Vec<Entry>,
    survival_reward: f64,
    pass_reward: f64,
    elimination_penalty: f64,
}

impl FitnessLedger {
    /// Open a ledger with `agents` zeroed entries and the given reward scheme.
    pub fn new(agents: usize, rewards: &FitnessConfig) -> Self {
        Self {
            entries: vec![
                Entry {
                    value: 0.0,
                    frozen: false,
                };
                agents
            ],
            survival_reward: rewards.survival_reward,
            pass_reward: rewards.pass_reward,
            elimination_penalty: rewards.elimination_penalty,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-tick participation reward for a live agent.
    pub fn credit_survival(&mut self, id: AgentId) {
        self.adjust(id, self.survival_reward);
    }

    /// Bonus granted when the cohort clears a gate.
    pub fn credit_pass(&mut self, id: AgentId) {
        self.adjust(id, self.pass_reward);
    }

    /// Terminal deduction; freezes the entry so nothing can adjust it later.
    pub fn penalize_elimination(&mut self, id: AgentId) {
        self.adjust(id, -self.elimination_penalty);
        self.entries[id.index()].frozen = true;
    }

    /// Freeze every remaining live entry; called when the episode ends.
    pub fn freeze_all(&mut self) {
        for entry in &mut self.entries {
            entry.frozen = true;
        }
    }

    pub fn is_frozen(&self, id: AgentId) -> bool {
        self.entries[id.index()].frozen
    }

    pub fn score_of(&self, id: AgentId) -> f64 {
        self.entries[id.index()].value
    }

    /// Final per-agent scores, in the order the agents were supplied.
    pub fn scores(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.value).collect()
    }

    fn adjust(&mut self, id: AgentId, delta: f64) {
        let entry = &mut self.entries[id.index()];
        debug_assert!(!entry.frozen, "fitness adjusted after elimination of agent {id}");
        if !entry.frozen {
            entry.value += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentId, FitnessLedger};
    use crate::io::config::FitnessConfig;

    fn ledger(agents: usize) -> FitnessLedger {
        FitnessLedger::new(agents, &FitnessConfig::default())
    }

    #[test]
    fn rewards_accumulate_per_agent() {
        let mut ledger = ledger(2);
        ledger.credit_survival(AgentId(0));
        ledger.credit_survival(AgentId(0));
        ledger.credit_pass(AgentId(1));
        let scores = ledger.scores();
        assert!((scores[0] - 0.2).abs() < 1e-12);
        assert!((scores[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn elimination_subtracts_and_freezes() {
        let mut ledger = ledger(1);
        ledger.credit_survival(AgentId(0));
        ledger.penalize_elimination(AgentId(0));
        assert!(ledger.is_frozen(AgentId(0)));
        assert!((ledger.score_of(AgentId(0)) - (0.1 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn entries_outlive_compaction_order() {
        let mut ledger = ledger(3);
        ledger.penalize_elimination(AgentId(1));
        ledger.credit_survival(AgentId(0));
        ledger.credit_survival(AgentId(2));
        let scores = ledger.scores();
        assert_eq!(scores.len(), 3);
        assert!((scores[1] + 1.0).abs() < 1e-12);
        assert!(!ledger.is_frozen(AgentId(0)));
        assert!(!ledger.is_frozen(AgentId(2)));
    }

    #[test]
    fn freeze_all_marks_survivors() {
        let mut ledger = ledger(2);
        ledger.penalize_elimination(AgentId(0));
        ledger.freeze_all();
        assert!(ledger.is_frozen(AgentId(0)));
        assert!(ledger.is_frozen(AgentId(1)));
    }
}
