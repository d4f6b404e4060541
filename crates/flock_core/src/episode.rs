//! One simulation run from spawn to empty corridor.
//!
//! An episode owns the live agents, their decision sources, the gates in
//! flight, and the fitness ledger. Each tick runs a fixed phase order: pick
//! the active gate, collect decisions, move agents, move scenery, resolve
//! strikes and passes, then compact the eliminated out of the parallel
//! collections in a single pass. The run ends when no live agents remain.
//!
//! The bird and policy collections stay index aligned between ticks; the
//! ledger is keyed by starting identity instead, so eliminated agents keep
//! their frozen scores after their slots are gone.

use anyhow::{ensure, Result};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::bird::Bird;
use crate::fitness::{AgentId, FitnessLedger};
use crate::io::config::{ConfigError, FlockConfig};
use crate::mask::CollisionShapes;
use crate::pipe::Pipe;
use crate::policy::{Observation, Policy};
use crate::rng::stage_rng;

/// Stage label for the stream that samples gate anchors.
pub const GATE_STAGE: &str = "episode:gates";

/// Who drives the jump decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// One decision source per agent, queried every tick.
    Policies,
    /// A single agent driven by externally queued jump triggers.
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeState {
    Running,
    Ended,
}

/// Everything one tick reports back to the caller.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Chronicle lines describing notable events, ready for a frame.
    pub events: Vec<String>,
    /// Agents removed this tick, in starting order.
    pub eliminated: Vec<AgentId>,
    /// True when the cohort cleared a gate this tick.
    pub passed_gate: bool,
}

pub struct Episode {
    config: FlockConfig,
    mode: ControlMode,
    generation: Option<u32>,
    birds: Vec<Bird>,
    policies: Vec<Box<dyn Policy>>,
    ledger: FitnessLedger,
    pipes: Vec<Pipe>,
    shapes: CollisionShapes,
    gate_rng: ChaCha8Rng,
    floor_offset: f64,
    score: u32,
    tick: u64,
    state: EpisodeState,
    next_pipe_id: u32,
    jump_requested: bool,
}

impl Episode {
    /// Start a training episode binding one agent to each supplied policy.
    ///
    /// An empty batch yields an episode that is already over: ticking it is an
    /// error and its fitness report is empty.
    pub fn training(
        config: &FlockConfig,
        policies: Vec<Box<dyn Policy>>,
        generation: u32,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(
            config.clone(),
            ControlMode::Policies,
            Some(generation),
            u64::from(generation),
            policies,
        ))
    }

    /// Start a single-agent episode driven by [`Episode::trigger_jump`].
    ///
    /// `episode_index` keys the gate stream so consecutive manual runs see
    /// fresh corridors under the same seed.
    pub fn manual(config: &FlockConfig, episode_index: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(
            config.clone(),
            ControlMode::Manual,
            None,
            u64::from(episode_index),
            Vec::new(),
        ))
    }

    fn build(
        config: FlockConfig,
        mode: ControlMode,
        generation: Option<u32>,
        stream_index: u64,
        policies: Vec<Box<dyn Policy>>,
    ) -> Self {
        let shapes = CollisionShapes::new(&config.bird, &config.pipe);
        let mut gate_rng = stage_rng(config.seed, GATE_STAGE, stream_index);
        let count = match mode {
            ControlMode::Policies => policies.len(),
            ControlMode::Manual => 1,
        };
        let birds = (0..count)
            .map(|index| Bird::spawn(AgentId(index as u32), &config.bird))
            .collect::<Vec<_>>();
        let ledger = FitnessLedger::new(count, &config.fitness);
        let pipes = vec![Pipe::spawn(&config.pipe, 0, config.pipe.initial_x, &mut gate_rng)];
        let state = if birds.is_empty() {
            EpisodeState::Ended
        } else {
            EpisodeState::Running
        };

        Self {
            config,
            mode,
            generation,
            birds,
            policies,
            ledger,
            pipes,
            shapes,
            gate_rng,
            floor_offset: 0.0,
            score: 0,
            tick: 0,
            state,
            next_pipe_id: 1,
            jump_requested: false,
        }
    }

    /// Queue a jump for the next tick. Sampled once per tick; every live agent
    /// jumps. Policy-driven episodes ignore the queue entirely.
    pub fn trigger_jump(&mut self) {
        self.jump_requested = true;
    }

    /// Advance the world one tick.
    pub fn tick(&mut self) -> Result<TickReport> {
        ensure!(
            self.state == EpisodeState::Running,
            "tick called on an ended episode at t={}",
            self.tick
        );

        self.tick += 1;
        let mut report = TickReport::default();

        // Every agent observes the same gate this tick.
        let active = self.active_pipe_index()?;

        // Decisions first, against the pre-move world.
        match self.mode {
            ControlMode::Manual => {
                if std::mem::take(&mut self.jump_requested) {
                    for bird in &mut self.birds {
                        bird.jump(&self.config.bird);
                    }
                }
            }
            ControlMode::Policies => {
                let gap_top = self.pipes[active].gap_top;
                let gap_bottom = self.pipes[active].gap_bottom(&self.config.pipe);
                let threshold = self.config.training.jump_threshold;
                for (bird, policy) in self.birds.iter_mut().zip(&self.policies) {
                    self.ledger.credit_survival(bird.id);
                    let observation = Observation {
                        y: bird.y,
                        gap_top_delta: bird.y - gap_top,
                        gap_bottom_delta: bird.y - gap_bottom,
                    };
                    match policy.decide(observation) {
                        Ok(output) if output.is_finite() && (0.0..=1.0).contains(&output) => {
                            if output > threshold {
                                bird.jump(&self.config.bird);
                            }
                        }
                        Ok(output) => {
                            Self::eliminate(self.mode, &mut self.ledger, bird);
                            report
                                .events
                                .push(format!("Agent {} emitted an invalid output {}.", bird.id, output));
                        }
                        Err(err) => {
                            Self::eliminate(self.mode, &mut self.ledger, bird);
                            report.events.push(format!("Agent {}: {}.", bird.id, err));
                        }
                    }
                }
            }
        }

        // Kinematics, then scenery.
        for bird in &mut self.birds {
            if !bird.doomed {
                bird.advance(&self.config.bird);
            }
        }
        for pipe in &mut self.pipes {
            pipe.advance(&self.config.pipe);
        }
        self.floor_offset =
            (self.floor_offset + self.config.floor.speed) % self.config.floor.panel_width;

        // Strikes and pass detection against the moved world.
        let mut cleared: Option<u32> = None;
        for pipe in &mut self.pipes {
            for bird in &mut self.birds {
                if bird.doomed {
                    continue;
                }
                if self.shapes.pipe_strike(bird, pipe, &self.config.pipe) {
                    Self::eliminate(self.mode, &mut self.ledger, bird);
                    report
                        .events
                        .push(format!("Agent {} struck gate {}.", bird.id, pipe.id));
                } else if !pipe.scored && bird.x > pipe.right_edge(&self.config.pipe) {
                    pipe.scored = true;
                    cleared = cleared.or(Some(pipe.id));
                }
            }
        }

        // A cleared gate scores once, spawns a successor, and pays the cohort.
        if let Some(gate) = cleared {
            self.score += 1;
            report.passed_gate = true;
            let pipe = Pipe::spawn(
                &self.config.pipe,
                self.next_pipe_id,
                self.config.pipe.spawn_x,
                &mut self.gate_rng,
            );
            self.next_pipe_id += 1;
            self.pipes.push(pipe);
            if self.mode == ControlMode::Policies {
                for bird in &self.birds {
                    if !bird.doomed {
                        self.ledger.credit_pass(bird.id);
                    }
                }
            }
            report
                .events
                .push(format!("Gate {} cleared; score {}.", gate, self.score));
        }

        // Retire gates that have fully left the corridor.
        self.pipes.retain(|pipe| !pipe.is_off_screen(&self.config.pipe));

        // Floor and ceiling.
        let floor_y = self.config.floor.y;
        let bird_height = f64::from(self.config.bird.height);
        for bird in &mut self.birds {
            if bird.doomed {
                continue;
            }
            if bird.y + bird_height > floor_y {
                Self::eliminate(self.mode, &mut self.ledger, bird);
                report
                    .events
                    .push(format!("Agent {} hit the floor.", bird.id));
            } else if bird.y < 0.0 {
                Self::eliminate(self.mode, &mut self.ledger, bird);
                report
                    .events
                    .push(format!("Agent {} flew above the corridor.", bird.id));
            }
        }

        // Reap: both live collections shrink in one pass, the ledger does not.
        report.eliminated = self
            .birds
            .iter()
            .filter(|bird| bird.doomed)
            .map(|bird| bird.id)
            .collect();
        if !report.eliminated.is_empty() {
            match self.mode {
                ControlMode::Policies => {
                    ensure!(
                        self.birds.len() == self.policies.len(),
                        "live collections diverged at t={}: {} birds, {} policies",
                        self.tick,
                        self.birds.len(),
                        self.policies.len()
                    );
                    let (birds, policies): (Vec<_>, Vec<_>) = self
                        .birds
                        .drain(..)
                        .zip(self.policies.drain(..))
                        .filter(|(bird, _)| !bird.doomed)
                        .unzip();
                    self.birds = birds;
                    self.policies = policies;
                }
                ControlMode::Manual => {
                    self.birds.retain(|bird| !bird.doomed);
                }
            }
        }

        if self.birds.is_empty() {
            self.state = EpisodeState::Ended;
            self.ledger.freeze_all();
            report
                .events
                .push(format!("No agents remain after {} ticks.", self.tick));
        }

        Ok(report)
    }

    /// Index of the gate the cohort steers by: the oldest gate still ahead of
    /// the agents, or its successor once the lead agent is past it.
    fn active_pipe_index(&self) -> Result<usize> {
        ensure!(
            !self.birds.is_empty(),
            "active gate queried with no live agents at t={}",
            self.tick
        );
        ensure!(!self.pipes.is_empty(), "no gates in flight at t={}", self.tick);
        let lead = &self.birds[0];
        if self.pipes.len() > 1 && lead.x > self.pipes[0].right_edge(&self.config.pipe) {
            Ok(1)
        } else {
            Ok(0)
        }
    }

    fn eliminate(mode: ControlMode, ledger: &mut FitnessLedger, bird: &mut Bird) {
        bird.doomed = true;
        if mode == ControlMode::Policies {
            ledger.penalize_elimination(bird.id);
        }
    }

    pub fn state(&self) -> EpisodeState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == EpisodeState::Ended
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Generation number for training episodes, absent in manual play.
    pub fn generation(&self) -> Option<u32> {
        self.generation
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn birds(&self) -> &[Bird] {
        &self.birds
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn floor_offset(&self) -> f64 {
        self.floor_offset
    }

    pub fn config(&self) -> &FlockConfig {
        &self.config
    }

    pub fn ledger(&self) -> &FitnessLedger {
        &self.ledger
    }

    /// Per-agent fitness in starting order.
    pub fn fitness_scores(&self) -> Vec<f64> {
        self.ledger.scores()
    }
}
