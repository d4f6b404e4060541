//! Generation controller.
//!
//! The trainer is the bridge between an external evolutionary loop and the
//! episode simulator: it takes a batch of decision sources, runs one full
//! episode per generation, and hands back per-agent fitness keyed by the
//! caller's ordering. The generation counter is trainer state, threaded into
//! each episode explicitly; nothing here is global.

use anyhow::Result;
use serde::Serialize;

use crate::episode::Episode;
use crate::io::config::{ConfigError, FlockConfig};
use crate::io::frame::{make_frame, Frame};
use crate::policy::Policy;

/// Observer verdict after each tick of an observed generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeControl {
    Continue,
    Abort,
}

/// Fitness summary handed back to the evolutionary caller.
///
/// `fitness[i]` is the frozen score of the agent bound to the i-th supplied
/// policy, eliminated agents included.
#[derive(Clone, Debug, Serialize)]
pub struct GenerationReport {
    pub generation: u32,
    pub score: u32,
    pub ticks: u64,
    pub fitness: Vec<f64>,
}

/// Result of one observed generation.
#[derive(Debug)]
pub enum GenerationOutcome {
    Completed(GenerationReport),
    /// Cut short by the observer. The partial fitness is discarded: an
    /// aborted generation is not comparable to completed ones.
    Aborted { generation: u32, ticks: u64 },
}

pub struct Trainer {
    config: FlockConfig,
    generation: u32,
}

impl Trainer {
    pub fn new(config: FlockConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            generation: 0,
        })
    }

    pub fn config(&self) -> &FlockConfig {
        &self.config
    }

    /// Number of generations started so far.
    pub fn generations_run(&self) -> u32 {
        self.generation
    }

    /// Run one episode to completion and report per-policy fitness.
    ///
    /// Every call starts a fresh episode under the next generation number; an
    /// empty batch completes immediately with an empty fitness vector.
    pub fn run_generation(&mut self, policies: Vec<Box<dyn Policy>>) -> Result<GenerationReport> {
        let generation = self.next_generation();
        let mut episode = Episode::training(&self.config, policies, generation)?;
        while !episode.is_ended() {
            episode.tick()?;
        }
        Ok(Self::report(generation, &episode))
    }

    /// Like [`Trainer::run_generation`], surfacing a frame to `observer` after
    /// every tick. The observer may abort at tick granularity.
    pub fn run_generation_observed<F>(
        &mut self,
        policies: Vec<Box<dyn Policy>>,
        mut observer: F,
    ) -> Result<GenerationOutcome>
    where
        F: FnMut(&Frame) -> EpisodeControl,
    {
        let generation = self.next_generation();
        let mut episode = Episode::training(&self.config, policies, generation)?;
        while !episode.is_ended() {
            let report = episode.tick()?;
            let frame = make_frame(&episode, report.events);
            if observer(&frame) == EpisodeControl::Abort {
                return Ok(GenerationOutcome::Aborted {
                    generation,
                    ticks: episode.tick_count(),
                });
            }
        }
        Ok(GenerationOutcome::Completed(Self::report(generation, &episode)))
    }

    fn next_generation(&mut self) -> u32 {
        self.generation += 1;
        self.generation
    }

    fn report(generation: u32, episode: &Episode) -> GenerationReport {
        GenerationReport {
            generation,
            score: episode.score(),
            ticks: episode.tick_count(),
            fitness: episode.fitness_scores(),
        }
    }
}
