//! Evolutionary search over exact-use ring layouts.

use super::sequential::{allocate_class, sampler_caps};
use super::{GenomeOps, Proposal, RoundClose, SearchRng, SearchStrategy};
use crate::compute::FeasibilityMode;
use crate::schema::{Candidate, ObjectClass, TrialOutcome, TrialRecord};

/// One population member.
#[derive(Debug, Clone)]
struct Member {
    genome: Candidate,
    /// Score once evaluated; elites keep theirs across generations.
    fitness: Option<f64>,
    feasible: bool,
}

impl Member {
    fn fresh(genome: Candidate) -> Self {
        Self {
            genome,
            fitness: None,
            feasible: false,
        }
    }
}

/// Genetic algorithm with elitism, tournament selection and guarded variation.
///
/// Members are handed out one at a time. Once every member of a generation
/// has been observed, the next proposal breeds the following generation.
pub struct GeneticStrategy {
    ops: GenomeOps,
    rings: usize,
    population: Vec<Member>,
    in_flight: Option<usize>,
    generation: usize,
    breed_pending: bool,
}

impl GeneticStrategy {
    pub fn new(ops: GenomeOps, rings: usize) -> Self {
        Self {
            ops,
            rings,
            population: Vec::new(),
            in_flight: None,
            generation: 0,
            breed_pending: false,
        }
    }

    /// Generations completed so far (the initial population counts as one).
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Create a feasible seed, or the fallback layout after `init_attempts` failures.
    pub fn seed(&self, rng: &mut SearchRng) -> Candidate {
        for _ in 0..self.ops.params().init_attempts {
            if let Some(genome) = self.try_seed(rng) {
                return genome;
            }
        }
        log::debug!("Seeding fell back to the default layout");
        self.fallback()
    }

    fn try_seed(&self, rng: &mut SearchRng) -> Option<Candidate> {
        let k = self.rings;
        let domain = self.ops.domain();
        let s = domain.min_spacing;
        let top = domain.max_radius - (k.saturating_sub(1)) as f64 * s;

        let mut radii: Vec<f64> = (0..k).map(|_| rng.uniform(domain.min_radius, top)).collect();
        radii.sort_by(f64::total_cmp);
        for i in 1..k {
            if radii[i] - radii[i - 1] < s {
                radii[i] = radii[i - 1] + s;
            }
        }
        if radii.iter().any(|&r| r > domain.max_radius) {
            return None;
        }

        let labels: Vec<ObjectClass> = (0..k).map(|_| rng.class()).collect();
        let inventory = self.ops.validator().inventory();
        if ObjectClass::ALL
            .iter()
            .any(|c| inventory.count(*c) > 0 && !labels.contains(c))
        {
            return None;
        }

        let caps = sampler_caps(self.ops.validator().envelope(), &radii);
        let mut counts = vec![0; k];
        for class in ObjectClass::ALL {
            let mut rings: Vec<usize> = (0..k).filter(|&i| labels[i] == class).collect();
            rng.shuffle(&mut rings);
            allocate_class(
                class,
                &rings,
                &caps,
                inventory.count(class),
                &mut counts,
                |_, low, high| rng.int(low, high),
            )
            .ok()?;
        }

        let genome = Candidate::homogeneous(radii, labels, counts);
        self.ops.is_feasible(&genome).then_some(genome)
    }

    fn fallback(&self) -> Candidate {
        use ObjectClass::{Long, Short};

        let reference = Candidate::homogeneous(
            vec![50.0, 100.0, 150.0, 200.0],
            vec![Short, Long, Short, Long],
            vec![7, 20, 21, 20],
        );
        if self.rings == 4 && self.ops.is_feasible(&reference) {
            return reference;
        }

        let k = self.rings;
        let domain = self.ops.domain();
        let step = if k > 1 { domain.span() / (k - 1) as f64 } else { 0.0 };
        let radii = (0..k).map(|i| domain.min_radius + i as f64 * step).collect();
        let labels = (0..k)
            .map(|i| if i % 2 == 0 { Short } else { Long })
            .collect();
        let mut genome = Candidate::homogeneous(radii, labels, vec![0; k]);
        self.ops.repair(&mut genome);
        genome
    }

    fn initialize(&mut self, rng: &mut SearchRng) {
        let size = self.ops.params().population;
        self.population = (0..size).map(|_| Member::fresh(self.seed(rng))).collect();
        let feasible = self
            .population
            .iter()
            .filter(|m| self.ops.is_feasible(&m.genome))
            .count();
        log::info!("Initial population: {size} members, {feasible} feasible");
    }

    /// Tournament over `pool`; ties keep the earlier contender.
    fn tournament(&self, rng: &mut SearchRng, pool: &[usize]) -> usize {
        let size = self.ops.params().tournament_size.max(1);
        let mut winner = pool[rng.index(pool.len())];
        for _ in 1..size {
            let contender = pool[rng.index(pool.len())];
            if self.fitness(contender) > self.fitness(winner) {
                winner = contender;
            }
        }
        winner
    }

    fn fitness(&self, idx: usize) -> f64 {
        self.population[idx].fitness.unwrap_or(0.0)
    }

    fn breed(&mut self, rng: &mut SearchRng) {
        let params = self.ops.params().clone();

        let mut feasible: Vec<usize> = (0..self.population.len())
            .filter(|&i| self.population[i].feasible)
            .collect();
        feasible.sort_by(|&a, &b| self.fitness(b).total_cmp(&self.fitness(a)));

        let elites: Vec<Member> = feasible
            .iter()
            .take(params.elitism)
            .map(|&i| self.population[i].clone())
            .collect();

        let pool: Vec<usize> = if feasible.is_empty() {
            (0..self.population.len()).collect()
        } else {
            feasible
        };

        let n_offspring = self.population.len() - elites.len();
        let mut offspring: Vec<Candidate> = (0..n_offspring)
            .map(|_| {
                let idx = self.tournament(rng, &pool);
                self.population[idx].genome.clone()
            })
            .collect();

        for pair in offspring.chunks_mut(2) {
            if let [a, b] = pair
                && rng.chance(params.crossover_rate)
            {
                self.ops.crossover(rng, a, b);
            }
        }
        for child in offspring.iter_mut() {
            if rng.chance(params.mutation_rate) {
                self.ops.mutate(rng, child);
            }
        }

        log::debug!(
            "Generation {}: {} elites, {} offspring",
            self.generation,
            elites.len(),
            offspring.len()
        );

        self.population = elites
            .into_iter()
            .chain(offspring.into_iter().map(Member::fresh))
            .collect();
    }
}

impl SearchStrategy for GeneticStrategy {
    fn name(&self) -> &'static str {
        "genetic"
    }

    fn mode(&self) -> FeasibilityMode {
        FeasibilityMode::Exact
    }

    fn propose(&mut self, rng: &mut SearchRng) -> Proposal {
        if self.population.is_empty() {
            self.initialize(rng);
        }
        if self.breed_pending {
            self.breed(rng);
            self.breed_pending = false;
        }

        let idx = self
            .population
            .iter()
            .position(|m| m.fitness.is_none())
            .unwrap_or(0);
        self.in_flight = Some(idx);
        Proposal::new(self.population[idx].genome.clone())
    }

    fn repair(&self, candidate: &mut Candidate) {
        self.ops.repair(candidate);
    }

    fn observe(&mut self, record: &TrialRecord) -> Option<RoundClose> {
        let idx = self.in_flight.take()?;
        let member = &mut self.population[idx];
        member.fitness = Some(record.score);
        member.feasible = !matches!(record.outcome, TrialOutcome::Rejected { .. });

        if self.population.iter().all(|m| m.fitness.is_some()) {
            self.generation += 1;
            self.breed_pending = true;
            let scores = self.population.iter().map(|m| m.fitness.unwrap_or(0.0)).collect();
            Some(RoundClose::Generation(scores))
        } else {
            None
        }
    }
}
