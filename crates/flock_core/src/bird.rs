//! Vertical flight model for a single agent.
//!
//! Positions use screen coordinates: y grows downward, so a jump drives y
//! toward zero and gravity pulls it toward the floor. Horizontal position is
//! fixed for the whole episode; the world scrolls past the agent instead.

use serde::Serialize;

use crate::fitness::AgentId;
use crate::io::config::BirdConfig;

/// Flight attitude surfaced on frames for renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pose {
    Climbing,
    Falling,
}

/// One live agent's physical state.
#[derive(Clone, Debug)]
pub struct Bird {
    pub id: AgentId,
    pub x: f64,
    pub y: f64,
    /// Ticks since the last impulse; the `t` of the displacement curve.
    pub jump_clock: u32,
    /// Vertical velocity set by the last jump, negative while climbing.
    pub impulse: f64,
    /// Height at the moment of the last jump; anchors the tilt window.
    pub reference_y: f64,
    pub tilt_deg: f64,
    pub pose: Pose,
    /// Marked during a tick, reaped by compaction before the tick ends.
    pub(crate) doomed: bool,
}

impl Bird {
    /// Place a new agent at the configured spawn point, at rest.
    pub fn spawn(id: AgentId, cfg: &BirdConfig) -> Self {
        Self {
            id,
            x: cfg.spawn_x,
            y: cfg.spawn_y,
            jump_clock: 0,
            impulse: 0.0,
            reference_y: cfg.spawn_y,
            tilt_deg: 0.0,
            pose: Pose::Falling,
            doomed: false,
        }
    }

    /// Fire the jump impulse: reset the clock and remember the launch height.
    pub fn jump(&mut self, cfg: &BirdConfig) {
        self.impulse = cfg.jump_impulse;
        self.jump_clock = 0;
        self.reference_y = self.y;
    }

    /// Advance one tick of vertical motion and return the applied displacement.
    ///
    /// The raw displacement follows `gravity * t^2 + impulse * t` for `t` ticks
    /// since the last jump. Downward motion is clamped to the terminal
    /// velocity; upward motion gets an extra `rise_adjust` to exaggerate the
    /// climb.
    pub fn advance(&mut self, cfg: &BirdConfig) -> f64 {
        self.jump_clock += 1;
        let t = f64::from(self.jump_clock);
        let mut displacement = cfg.gravity * t * t + self.impulse * t;
        if displacement > cfg.terminal_velocity {
            displacement = cfg.terminal_velocity;
        }
        if displacement < 0.0 {
            displacement -= cfg.rise_adjust;
        }
        self.y += displacement;

        if displacement < 0.0 || self.y < self.reference_y + cfg.climb_window {
            if self.tilt_deg < cfg.max_tilt {
                self.tilt_deg = cfg.max_tilt;
            }
            self.pose = Pose::Climbing;
        } else {
            if self.tilt_deg > -90.0 {
                self.tilt_deg -= cfg.tilt_step;
            }
            self.pose = Pose::Falling;
        }

        displacement
    }
}
