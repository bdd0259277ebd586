//! Candidate samplers and repairers.
//!
//! Three strategies share one capability set, expressed by [`SearchStrategy`]:
//!
//! - [`ParametricStrategy`]: independent draws from per-ring intervals, loose inventory
//! - [`SequentialStrategy`]: interval-constrained draws that use the inventory exactly
//! - [`GeneticStrategy`]: a population evolved with crossover, mutation and repair

mod genetic;
mod genome;
mod parametric;
mod sequential;
mod suggest;

pub use genetic::*;
pub use genome::*;
pub use parametric::*;
pub use sequential::*;
pub use suggest::*;

use rand::prelude::*;

use crate::compute::{FeasibilityMode, Rejection};
use crate::schema::{Candidate, ObjectClass, ParameterSpace, SearchConfig, StrategyConfig, TrialRecord};

/// Random number generator wrapper for sampling and variation.
pub struct SearchRng {
    rng: StdRng,
}

impl SearchRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform float in `[low, high]`. A degenerate interval yields `low`.
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high > low {
            self.rng.gen_range(low..=high)
        } else {
            low
        }
    }

    /// Uniform integer in `[low, high]`. A degenerate interval yields `low`.
    pub fn int(&mut self, low: u32, high: u32) -> u32 {
        if high > low {
            self.rng.gen_range(low..=high)
        } else {
            low
        }
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Bernoulli trial.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.r#gen::<f64>() < p
    }

    /// Gaussian sample.
    pub fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        let noise: f64 = self.rng.sample(rand_distr::StandardNormal);
        mean + noise * sigma
    }

    /// Class chosen with equal probability.
    pub fn class(&mut self) -> ObjectClass {
        if self.rng.gen_bool(0.5) {
            ObjectClass::Short
        } else {
            ObjectClass::Long
        }
    }

    /// Two distinct indices in `0..len` (`len >= 2`).
    pub fn distinct_pair(&mut self, len: usize) -> (usize, usize) {
        let i = self.index(len);
        let mut j = self.index(len - 1);
        if j >= i {
            j += 1;
        }
        (i, j)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

/// A candidate together with any rejection the sampler already found.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub candidate: Candidate,
    /// Set when the sampler could not complete an allocation; the search loop
    /// records the trial as rejected without calling the validator.
    pub rejection: Option<Rejection>,
}

impl Proposal {
    pub fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            rejection: None,
        }
    }

    pub fn rejected(candidate: Candidate, rejection: Rejection) -> Self {
        Self {
            candidate,
            rejection: Some(rejection),
        }
    }
}

/// Signal that a recorded trial closed a round.
#[derive(Debug, Clone, PartialEq)]
pub enum RoundClose {
    /// One trial finished one iteration.
    Iteration,
    /// A generation finished; carries every member's score.
    Generation(Vec<f64>),
}

/// Capability set every strategy implements.
pub trait SearchStrategy {
    /// Strategy name used in logs and result files.
    fn name(&self) -> &'static str;

    /// Inventory rule the validator applies to this strategy's candidates.
    fn mode(&self) -> FeasibilityMode;

    /// Produce the next candidate to evaluate.
    fn propose(&mut self, rng: &mut SearchRng) -> Proposal;

    /// Restore invariants after a structural change. No-op for strategies
    /// that never repair.
    fn repair(&self, _candidate: &mut Candidate) {}

    /// Receive the record of the most recent proposal.
    fn observe(&mut self, record: &TrialRecord) -> Option<RoundClose>;
}

/// Build the strategy a configuration selects.
pub fn from_config(config: &SearchConfig) -> Box<dyn SearchStrategy> {
    match &config.strategy {
        StrategyConfig::Parametric(c) => {
            let space = c
                .space
                .clone()
                .unwrap_or_else(|| ParameterSpace::parametric(config.rings, &config.domain));
            Box::new(ParametricStrategy::new(
                config.inventory.clone(),
                space,
                c.class_mode,
                suggester(&c.suggest),
            ))
        }
        StrategyConfig::Sequential(c) => {
            let space = c
                .space
                .clone()
                .unwrap_or_else(|| ParameterSpace::sequential(config.rings, &config.domain));
            Box::new(SequentialStrategy::new(
                config.inventory.clone(),
                config.envelope.clone(),
                space,
                suggester(&c.suggest),
            ))
        }
        StrategyConfig::Genetic(c) => Box::new(GeneticStrategy::new(
            GenomeOps::new(
                config.inventory.clone(),
                config.envelope.clone(),
                config.domain.clone(),
                c.clone(),
            ),
            config.rings,
        )),
    }
}
