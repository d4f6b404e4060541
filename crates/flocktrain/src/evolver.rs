//! Self-contained evolutionary demo.
//!
//! The simulator treats decision sources as opaque, so the trainer binary
//! brings its own: one logistic perceptron per agent, evolved by keeping the
//! fitter half of each generation and refilling the rest with jittered copies
//! of the survivors. Deliberately the simplest loop that shows fitness
//! climbing, not a serious neuroevolution rig.

use rand::Rng;

use flock_core::policy::{Observation, Policy, PolicyError};
use flock_core::rng::stage_rng;

const INIT_STAGE: &str = "evolver:init";
const MUTATE_STAGE: &str = "evolver:mutate";

/// Observations are hundreds of cells; scaled down they land in the
/// logistic's useful range.
const INPUT_SCALE: f64 = 0.01;
const JITTER_SIGMA: f64 = 0.2;

/// Three-input logistic perceptron.
#[derive(Clone, Debug)]
pub struct PerceptronPolicy {
    weights: [f64; 3],
    bias: f64,
}

impl PerceptronPolicy {
    fn random<R: Rng>(rng: &mut R) -> Self {
        let mut weights = [0.0; 3];
        for weight in &mut weights {
            *weight = rng.gen_range(-1.0..1.0);
        }
        Self {
            weights,
            bias: rng.gen_range(-1.0..1.0),
        }
    }

    fn jittered<R: Rng>(&self, rng: &mut R) -> Self {
        let mut child = self.clone();
        for weight in &mut child.weights {
            *weight += gaussian(rng) * JITTER_SIGMA;
        }
        child.bias += gaussian(rng) * JITTER_SIGMA;
        child
    }
}

impl Policy for PerceptronPolicy {
    fn decide(&self, observation: Observation) -> Result<f64, PolicyError> {
        let inputs = [
            observation.y * INPUT_SCALE,
            observation.gap_top_delta * INPUT_SCALE,
            observation.gap_bottom_delta * INPUT_SCALE,
        ];
        let mut sum = self.bias;
        for (weight, input) in self.weights.iter().zip(inputs) {
            sum += weight * input;
        }
        Ok(sigmoid(sum))
    }
}

fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    let u1 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Elitist half-keep evolution over a fixed-size population.
pub struct Evolver {
    seed: u64,
    rounds: u64,
    genomes: Vec<PerceptronPolicy>,
}

impl Evolver {
    pub fn new(seed: u64, population: usize) -> Self {
        let mut rng = stage_rng(seed, INIT_STAGE, 0);
        let genomes = (0..population)
            .map(|_| PerceptronPolicy::random(&mut rng))
            .collect();
        Self {
            seed,
            rounds: 0,
            genomes,
        }
    }

    pub fn population_size(&self) -> usize {
        self.genomes.len()
    }

    /// Boxed copies of the current genomes, in ledger order.
    pub fn population(&self) -> Vec<Box<dyn Policy>> {
        self.genomes
            .iter()
            .map(|genome| Box::new(genome.clone()) as Box<dyn Policy>)
            .collect()
    }

    /// Rank by fitness, keep the better half, refill with jittered copies.
    ///
    /// `fitness[i]` must belong to the i-th genome of the batch handed out by
    /// [`Evolver::population`].
    pub fn evolve(&mut self, fitness: &[f64]) {
        debug_assert_eq!(fitness.len(), self.genomes.len());
        let mut ranked: Vec<usize> = (0..self.genomes.len().min(fitness.len())).collect();
        ranked.sort_by(|&a, &b| {
            fitness[b]
                .partial_cmp(&fitness[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if ranked.is_empty() {
            return;
        }

        let keep = ranked.len().div_ceil(2);
        let survivors: Vec<PerceptronPolicy> = ranked[..keep]
            .iter()
            .map(|&index| self.genomes[index].clone())
            .collect();

        let mut rng = stage_rng(self.seed, MUTATE_STAGE, self.rounds);
        self.rounds += 1;

        let target = self.genomes.len();
        let mut next = survivors.clone();
        while next.len() < target {
            let parent = &survivors[(next.len() - keep) % keep];
            next.push(parent.jittered(&mut rng));
        }
        self.genomes = next;
    }
}
