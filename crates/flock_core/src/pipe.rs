//! Scrolling gate obstacles.
//!
//! A pipe is a vertical pair of gate footprints separated by a gap. The gap's
//! top edge is sampled once at spawn and never moves; only x changes as the
//! world scrolls left underneath the agents.

use rand::Rng;

use crate::io::config::PipeConfig;

/// One gate pair in flight.
#[derive(Clone, Debug)]
pub struct Pipe {
    /// Episode-scoped spawn sequence number.
    pub id: u32,
    pub x: f64,
    /// Bottom edge of the top gate, i.e. the top of the gap. Fixed at spawn.
    pub gap_top: f64,
    /// Set once any live agent has cleared this gate; guards the pass bonus.
    pub scored: bool,
}

impl Pipe {
    /// Sample a fresh gate at horizontal position `x`.
    pub fn spawn<R: Rng>(cfg: &PipeConfig, id: u32, x: f64, rng: &mut R) -> Self {
        let gap_top = rng.gen_range(cfg.gate_min..cfg.gate_max);
        Self {
            id,
            x,
            gap_top,
            scored: false,
        }
    }

    /// Scroll left by the configured speed.
    pub fn advance(&mut self, cfg: &PipeConfig) {
        self.x -= cfg.speed;
    }

    pub fn right_edge(&self, cfg: &PipeConfig) -> f64 {
        self.x + f64::from(cfg.width)
    }

    /// True once the whole footprint has left the world to the left.
    pub fn is_off_screen(&self, cfg: &PipeConfig) -> bool {
        self.right_edge(cfg) <= 0.0
    }

    /// Top-left y of the top gate footprint.
    pub fn top_origin(&self, cfg: &PipeConfig) -> f64 {
        self.gap_top - f64::from(cfg.height)
    }

    /// Top edge of the bottom gate, i.e. the bottom of the gap.
    pub fn gap_bottom(&self, cfg: &PipeConfig) -> f64 {
        self.gap_top + cfg.gap
    }
}
