//! Decision sources.
//!
//! Policies are supplied from outside the crate and stay opaque to it: the
//! episode hands each live agent's policy an [`Observation`] once per tick and
//! interprets the scalar that comes back. How a policy was built, trained, or
//! evolved is none of the simulation's business.

use thiserror::Error;

/// What a decision source sees each tick, before any motion is applied.
///
/// Distances are signed so the policy can tell which side of the gap the
/// agent is on; y grows downward, so a negative delta means the agent sits
/// above the named edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    /// The agent's own height.
    pub y: f64,
    /// Offset from the top edge of the active gate's gap.
    pub gap_top_delta: f64,
    /// Offset from the bottom edge of the active gate's gap.
    pub gap_bottom_delta: f64,
}

/// Raised by a decision source that cannot produce an output.
///
/// The episode responds by eliminating that one agent with the standard
/// penalty; the rest of the cohort is unaffected.
#[derive(Clone, Debug, Error)]
#[error("decision source failed: {message}")]
pub struct PolicyError {
    message: String,
}

impl PolicyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A per-agent decision source queried once per tick.
///
/// Implementations must be pure functions of the observation: no interior
/// mutation, no I/O, the same output for the same input. The output must be a
/// finite value in `[0, 1]`; anything else counts as a failure of this agent.
pub trait Policy: Send {
    fn decide(&self, observation: Observation) -> Result<f64, PolicyError>;
}

/// Fixed-output source for tests and demos.
#[derive(Clone, Copy, Debug)]
pub struct ConstantPolicy(pub f64);

impl Policy for ConstantPolicy {
    fn decide(&self, _observation: Observation) -> Result<f64, PolicyError> {
        Ok(self.0)
    }
}
