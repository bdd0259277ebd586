//! Configuration types for a layout search run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Envelope, Inventory, ObjectClass, RadiusDomain};

/// Top-level search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of rings in every candidate.
    #[serde(default = "default_rings")]
    pub rings: usize,
    /// Objects available for placement.
    #[serde(default)]
    pub inventory: Inventory,
    /// Container and object geometry.
    #[serde(default)]
    pub envelope: Envelope,
    /// Radius domain for the constrained and evolutionary samplers.
    #[serde(default)]
    pub domain: RadiusDomain,
    /// Search strategy and its budget.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Parameters forwarded to the oracle on every evaluation.
    #[serde(default)]
    pub run: RunParameters,
    /// Process oracle settings (used by the binary).
    #[serde(default)]
    pub oracle: Option<OracleConfig>,
    /// Result persistence.
    #[serde(default)]
    pub output: OutputConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rings: default_rings(),
            inventory: Inventory::default(),
            envelope: Envelope::default(),
            domain: RadiusDomain::default(),
            strategy: StrategyConfig::default(),
            run: RunParameters::default(),
            oracle: None,
            output: OutputConfig::default(),
            random_seed: None,
        }
    }
}

fn default_rings() -> usize {
    4
}

/// Strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrategyConfig {
    /// Independent parametric sampling, loose inventory bound.
    Parametric(ParametricConfig),
    /// Sequential interval-constrained sampling, exact inventory use.
    Sequential(SequentialConfig),
    /// Evolutionary search with repair, exact inventory use.
    Genetic(GeneticConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Sequential(SequentialConfig::default())
    }
}

impl StrategyConfig {
    /// Number of rounds the search loop runs: trials for the samplers,
    /// the initial population plus each bred generation for the genetic search.
    pub fn round_budget(&self) -> usize {
        match self {
            Self::Parametric(c) => c.trials,
            Self::Sequential(c) => c.trials,
            Self::Genetic(c) => c.generations + 1,
        }
    }
}

/// How the parameter sampler picks values inside the given intervals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method")]
pub enum SuggestConfig {
    /// Uniform random draws.
    Uniform,
    /// Random draws for a warm-up period, then Gaussian draws around the
    /// best-scoring trial's values.
    Adaptive {
        #[serde(default = "default_startup_trials")]
        startup_trials: usize,
        #[serde(default = "default_exploit_probability")]
        exploit_probability: f64,
        #[serde(default = "default_spread")]
        spread: f64,
    },
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self::Adaptive {
            startup_trials: default_startup_trials(),
            exploit_probability: default_exploit_probability(),
            spread: default_spread(),
        }
    }
}

fn default_startup_trials() -> usize {
    20
}
fn default_exploit_probability() -> f64 {
    0.7
}
fn default_spread() -> f64 {
    0.1
}

/// Whether rings carry one class or a per-ring split.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassMode {
    #[default]
    Mixed,
    Homogeneous,
}

/// Independent parametric sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametricConfig {
    /// Number of trials.
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Class handling.
    #[serde(default)]
    pub class_mode: ClassMode,
    /// Value sampler.
    #[serde(default)]
    pub suggest: SuggestConfig,
    /// Explicit parameter space; defaults to the built-in table for the ring count.
    #[serde(default)]
    pub space: Option<ParameterSpace>,
}

impl Default for ParametricConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            class_mode: ClassMode::default(),
            suggest: SuggestConfig::default(),
            space: None,
        }
    }
}

/// Sequential constrained sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialConfig {
    /// Number of trials.
    #[serde(default = "default_trials")]
    pub trials: usize,
    /// Value sampler.
    #[serde(default)]
    pub suggest: SuggestConfig,
    /// Explicit radius intervals; defaults to the built-in table for the ring count.
    #[serde(default)]
    pub space: Option<ParameterSpace>,
}

impl Default for SequentialConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            suggest: SuggestConfig::default(),
            space: None,
        }
    }
}

fn default_trials() -> usize {
    50
}

/// Genetic algorithm settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    /// Generations bred after the initial population.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Population size.
    #[serde(default = "default_population")]
    pub population: usize,
    /// Probability that a pair of offspring undergoes crossover.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability that an offspring undergoes mutation.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Probability of exchanging radius genes during crossover.
    #[serde(default = "default_radius_exchange_rate")]
    pub radius_exchange_rate: f64,
    /// Probability of exchanging the whole class-label vector during crossover.
    #[serde(default = "default_label_exchange_rate")]
    pub label_exchange_rate: f64,
    /// Per-radius mutation probability.
    #[serde(default = "default_gene_mutation_rate")]
    pub gene_mutation_rate: f64,
    /// Standard deviation of the radius offset (mm).
    #[serde(default = "default_radius_sigma")]
    pub radius_sigma: f64,
    /// Probability of swapping two rings' class labels during mutation.
    #[serde(default = "default_label_swap_rate")]
    pub label_swap_rate: f64,
    /// Best feasible members carried unchanged into the next generation.
    #[serde(default = "default_elitism")]
    pub elitism: usize,
    /// Tournament size for parent selection.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Randomized seeding attempts per member before the fallback layout.
    #[serde(default = "default_init_attempts")]
    pub init_attempts: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            generations: default_generations(),
            population: default_population(),
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            radius_exchange_rate: default_radius_exchange_rate(),
            label_exchange_rate: default_label_exchange_rate(),
            gene_mutation_rate: default_gene_mutation_rate(),
            radius_sigma: default_radius_sigma(),
            label_swap_rate: default_label_swap_rate(),
            elitism: default_elitism(),
            tournament_size: default_tournament_size(),
            init_attempts: default_init_attempts(),
        }
    }
}

fn default_generations() -> usize {
    20
}
fn default_population() -> usize {
    20
}
fn default_crossover_rate() -> f64 {
    0.7
}
fn default_mutation_rate() -> f64 {
    0.3
}
fn default_radius_exchange_rate() -> f64 {
    0.5
}
fn default_label_exchange_rate() -> f64 {
    0.3
}
fn default_gene_mutation_rate() -> f64 {
    0.2
}
fn default_radius_sigma() -> f64 {
    20.0
}
fn default_label_swap_rate() -> f64 {
    0.1
}
fn default_elitism() -> usize {
    2
}
fn default_tournament_size() -> usize {
    3
}
fn default_init_attempts() -> usize {
    100
}

/// Prior intervals for one ring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RingPrior {
    /// Radius interval. For rings after the first the lower bound is raised
    /// to the previous radius plus the space's minimum spacing.
    pub radius: (f64, f64),
    /// Occupant count interval (used by the parametric sampler).
    #[serde(default)]
    pub count: (u32, u32),
}

/// Explicit description of what to draw from, independent of how values are chosen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSpace {
    /// One prior per ring, innermost first.
    pub rings: Vec<RingPrior>,
    /// Spacing added to the previous radius to form the next lower bound.
    pub min_spacing: f64,
}

impl ParameterSpace {
    /// Built-in space for parametric sampling.
    pub fn parametric(rings: usize, domain: &RadiusDomain) -> Self {
        let (radius_highs, counts): (Vec<f64>, Vec<(u32, u32)>) = match rings {
            2 => (vec![200.0, domain.max_radius], vec![(4, 20), (8, 40)]),
            3 => (
                vec![150.0, 300.0, domain.max_radius],
                vec![(4, 16), (8, 28), (12, 40)],
            ),
            4 => (
                vec![120.0, 220.0, 350.0, domain.max_radius],
                vec![(4, 12), (8, 20), (12, 24), (16, 28)],
            ),
            _ => (
                linear_highs(rings, domain),
                (0..rings)
                    .map(|i| (4 + 4 * i as u32, 12 + 8 * i as u32))
                    .collect(),
            ),
        };
        Self::from_highs(domain, radius_highs, counts)
    }

    /// Built-in space for sequential constrained sampling.
    pub fn sequential(rings: usize, domain: &RadiusDomain) -> Self {
        let radius_highs = match rings {
            2 => vec![300.0, domain.max_radius],
            3 => vec![200.0, 350.0, domain.max_radius],
            4 => vec![150.0, 250.0, 380.0, domain.max_radius],
            _ => linear_highs(rings, domain),
        };
        let counts = vec![(0, 0); radius_highs.len()];
        Self::from_highs(domain, radius_highs, counts)
    }

    fn from_highs(domain: &RadiusDomain, highs: Vec<f64>, counts: Vec<(u32, u32)>) -> Self {
        let rings = highs
            .into_iter()
            .zip(counts)
            .enumerate()
            .map(|(i, (high, count))| RingPrior {
                radius: (if i == 0 { domain.min_radius } else { 0.0 }, high),
                count,
            })
            .collect();
        Self {
            rings,
            min_spacing: domain.min_spacing,
        }
    }

    /// Radius interval for ring `i` given the previous ring's radius.
    pub fn radius_bounds(&self, i: usize, previous: Option<f64>) -> (f64, f64) {
        let (low, high) = self.rings[i].radius;
        let low = match previous {
            Some(prev) => low.max(prev + self.min_spacing),
            None => low,
        };
        (low, high.max(low))
    }
}

fn linear_highs(rings: usize, domain: &RadiusDomain) -> Vec<f64> {
    (1..=rings)
        .map(|i| domain.min_radius + domain.span() * i as f64 / rings as f64)
        .collect()
}

/// Source of the particles the oracle simulates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SourceSpec {
    /// Fixed energy and unit (e.g. `1.0 MeV`).
    Monoenergetic { energy: f64, unit: String },
    /// Reference to a source-spectrum file.
    Spectrum { path: PathBuf },
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self::Monoenergetic {
            energy: 1.0,
            unit: "MeV".to_string(),
        }
    }
}

/// Run parameters handed to the oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunParameters {
    /// Events simulated per evaluation.
    #[serde(default = "default_events")]
    pub events: u64,
    /// Particle source.
    #[serde(default)]
    pub source: SourceSpec,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            events: default_events(),
            source: SourceSpec::default(),
        }
    }
}

fn default_events() -> u64 {
    10_000
}

/// One external command of the process oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSpec {
    /// Executable path.
    pub program: PathBuf,
    /// Argument templates; `{geometry}`, `{macro}`, `{workdir}`, `{events}` and
    /// `{source}` are substituted per trial.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra argument templates appended only when the source is a spectrum file.
    #[serde(default)]
    pub spectrum_args: Vec<String>,
    /// Wall-clock limit in seconds; each stage has its own default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CommandSpec {
    /// Command with no arguments and the stage default timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            spectrum_args: Vec::new(),
            timeout_secs: None,
        }
    }

    /// Replace the argument template.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Process oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleConfig {
    /// Simulation command.
    pub simulation: CommandSpec,
    /// Optional efficiency post-processing command; when present its output
    /// carries the efficiency report instead of the simulation's.
    #[serde(default)]
    pub analysis: Option<CommandSpec>,
    /// Directory under which each trial gets its own working area.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,
    /// Remove a trial's working area after a successful evaluation.
    #[serde(default)]
    pub cleanup: bool,
}

fn default_work_root() -> PathBuf {
    PathBuf::from("trials")
}

/// Default simulation timeout (one hour).
pub const DEFAULT_SIMULATION_TIMEOUT_SECS: u64 = 3600;
/// Default analysis timeout.
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 60;

impl OracleConfig {
    /// Process oracle running only a simulation command.
    pub fn new(simulation: CommandSpec, work_root: impl Into<PathBuf>) -> Self {
        Self {
            simulation,
            analysis: None,
            work_root: work_root.into(),
            cleanup: false,
        }
    }

    /// Effective simulation time limit.
    pub fn simulation_timeout(&self) -> Duration {
        Duration::from_secs(
            self.simulation
                .timeout_secs
                .unwrap_or(DEFAULT_SIMULATION_TIMEOUT_SECS),
        )
    }

    /// Effective analysis time limit, if an analysis stage is configured.
    pub fn analysis_timeout(&self) -> Option<Duration> {
        self.analysis.as_ref().map(|a| {
            Duration::from_secs(a.timeout_secs.unwrap_or(DEFAULT_ANALYSIS_TIMEOUT_SECS))
        })
    }
}

/// Result persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for results; nothing is written when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Write each evaluated trial's geometry to `configs/`.
    #[serde(default)]
    pub save_trial_geometry: bool,
    /// Append each trial to `history.jsonl` as soon as it is recorded.
    #[serde(default)]
    pub incremental_history: bool,
    /// Number of top-scoring trials kept in the hall of fame.
    #[serde(default = "default_hall_of_fame")]
    pub hall_of_fame: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            save_trial_geometry: false,
            incremental_history: false,
            hall_of_fame: default_hall_of_fame(),
        }
    }
}

fn default_hall_of_fame() -> usize {
    5
}

/// Search configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchConfigError {
    #[error("Ring count must be at least 1")]
    NoRings,
    #[error("Homogeneous rings need at least 2 rings when both classes are stocked")]
    TooFewRingsForClasses,
    #[error("Inventory is empty")]
    EmptyInventory,
    #[error("Radius domain [{min}, {max}] cannot hold {rings} rings spaced {spacing} mm apart")]
    DomainTooSmall {
        min: f64,
        max: f64,
        rings: usize,
        spacing: f64,
    },
    #[error("Sampler spacing {spacing} mm is tighter than the object pitch {pitch} mm")]
    SpacingBelowPitch { spacing: f64, pitch: f64 },
    #[error("Radius domain [{min}, {max}] leaves the envelope")]
    DomainOutsideEnvelope { min: f64, max: f64 },
    #[error("Parameter space has {found} ring priors, expected {expected}")]
    SpaceLength { expected: usize, found: usize },
    #[error("Invalid interval for {0}")]
    InvalidInterval(String),
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Elitism ({elitism}) must be smaller than the population ({population})")]
    ElitismTooLarge { elitism: usize, population: usize },
    #[error("Tournament size must be at least 1")]
    EmptyTournament,
    #[error("Search budget must be positive")]
    EmptyBudget,
    #[error("Event count must be positive")]
    NoEvents,
}

impl SearchConfig {
    /// Whether the chosen strategy keeps rings class-homogeneous.
    pub fn homogeneous(&self) -> bool {
        match &self.strategy {
            StrategyConfig::Parametric(c) => c.class_mode == ClassMode::Homogeneous,
            StrategyConfig::Sequential(_) | StrategyConfig::Genetic(_) => true,
        }
    }

    /// Validate the configuration before a run.
    pub fn validate(&self) -> Result<(), SearchConfigError> {
        if self.rings == 0 {
            return Err(SearchConfigError::NoRings);
        }
        if self.inventory.total() == 0 {
            return Err(SearchConfigError::EmptyInventory);
        }
        let stocked = ObjectClass::ALL
            .iter()
            .filter(|c| self.inventory.count(**c) > 0)
            .count();
        if self.homogeneous() && stocked == 2 && self.rings < 2 {
            return Err(SearchConfigError::TooFewRingsForClasses);
        }
        if self.strategy.round_budget() == 0 {
            return Err(SearchConfigError::EmptyBudget);
        }
        if self.run.events == 0 {
            return Err(SearchConfigError::NoEvents);
        }

        let domain = &self.domain;
        if !(domain.min_radius <= domain.max_radius) {
            return Err(SearchConfigError::InvalidInterval(format!(
                "radius domain [{}, {}]",
                domain.min_radius, domain.max_radius
            )));
        }
        if domain.min_spacing < self.envelope.pitch() {
            return Err(SearchConfigError::SpacingBelowPitch {
                spacing: domain.min_spacing,
                pitch: self.envelope.pitch(),
            });
        }
        if domain.min_radius < self.envelope.min_ring_radius()
            || domain.max_radius > self.envelope.max_ring_radius()
        {
            return Err(SearchConfigError::DomainOutsideEnvelope {
                min: domain.min_radius,
                max: domain.max_radius,
            });
        }
        if !domain.fits(self.rings) {
            return Err(SearchConfigError::DomainTooSmall {
                min: domain.min_radius,
                max: domain.max_radius,
                rings: self.rings,
                spacing: domain.min_spacing,
            });
        }

        match &self.strategy {
            StrategyConfig::Parametric(c) => {
                check_suggest(&c.suggest)?;
                if let Some(space) = &c.space {
                    self.check_space(space, true)?;
                }
            }
            StrategyConfig::Sequential(c) => {
                check_suggest(&c.suggest)?;
                if let Some(space) = &c.space {
                    self.check_space(space, false)?;
                }
            }
            StrategyConfig::Genetic(c) => {
                if c.population < 2 {
                    return Err(SearchConfigError::PopulationTooSmall);
                }
                if c.elitism >= c.population {
                    return Err(SearchConfigError::ElitismTooLarge {
                        elitism: c.elitism,
                        population: c.population,
                    });
                }
                if c.tournament_size == 0 {
                    return Err(SearchConfigError::EmptyTournament);
                }
                check_rate("crossover_rate", c.crossover_rate)?;
                check_rate("mutation_rate", c.mutation_rate)?;
                check_rate("radius_exchange_rate", c.radius_exchange_rate)?;
                check_rate("label_exchange_rate", c.label_exchange_rate)?;
                check_rate("gene_mutation_rate", c.gene_mutation_rate)?;
                check_rate("label_swap_rate", c.label_swap_rate)?;
                if !(c.radius_sigma >= 0.0) {
                    return Err(SearchConfigError::InvalidInterval(format!(
                        "radius_sigma {}",
                        c.radius_sigma
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_space(&self, space: &ParameterSpace, with_counts: bool) -> Result<(), SearchConfigError> {
        if space.rings.len() != self.rings {
            return Err(SearchConfigError::SpaceLength {
                expected: self.rings,
                found: space.rings.len(),
            });
        }
        for (i, prior) in space.rings.iter().enumerate() {
            if !(prior.radius.0 <= prior.radius.1) {
                return Err(SearchConfigError::InvalidInterval(format!(
                    "ring {} radius",
                    i + 1
                )));
            }
            if with_counts && prior.count.0 > prior.count.1 {
                return Err(SearchConfigError::InvalidInterval(format!(
                    "ring {} count",
                    i + 1
                )));
            }
        }
        Ok(())
    }
}

fn check_rate(name: &'static str, value: f64) -> Result<(), SearchConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SearchConfigError::InvalidRate { name, value })
    }
}

fn check_suggest(config: &SuggestConfig) -> Result<(), SearchConfigError> {
    match config {
        SuggestConfig::Uniform => Ok(()),
        SuggestConfig::Adaptive {
            exploit_probability,
            spread,
            ..
        } => {
            check_rate("exploit_probability", *exploit_probability)?;
            if *spread > 0.0 {
                Ok(())
            } else {
                Err(SearchConfigError::InvalidInterval(format!("spread {spread}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_genetic_config_valid() {
        let config = SearchConfig {
            strategy: StrategyConfig::Genetic(GeneticConfig::default()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy.round_budget(), 21);
    }

    #[test]
    fn test_too_many_rings() {
        let config = SearchConfig {
            rings: 16,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchConfigError::DomainTooSmall { rings: 16, .. })
        ));
    }

    #[test]
    fn test_single_homogeneous_ring_rejected() {
        let config = SearchConfig {
            rings: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchConfigError::TooFewRingsForClasses)
        ));
    }

    #[test]
    fn test_spacing_below_pitch() {
        let config = SearchConfig {
            domain: RadiusDomain {
                min_spacing: 30.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchConfigError::SpacingBelowPitch { .. })
        ));
    }

    #[test]
    fn test_elitism_too_large() {
        let config = SearchConfig {
            strategy: StrategyConfig::Genetic(GeneticConfig {
                population: 4,
                elitism: 4,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchConfigError::ElitismTooLarge { .. })
        ));
    }

    #[test]
    fn test_bad_rate() {
        let config = SearchConfig {
            strategy: StrategyConfig::Genetic(GeneticConfig {
                mutation_rate: 1.5,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchConfigError::InvalidRate {
                name: "mutation_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_builtin_spaces() {
        let domain = RadiusDomain::default();
        let space = ParameterSpace::sequential(4, &domain);
        assert_eq!(space.rings.len(), 4);
        assert_eq!(space.radius_bounds(0, None), (35.0, 150.0));
        assert_eq!(space.radius_bounds(1, Some(100.0)), (131.0, 250.0));
        assert_eq!(space.radius_bounds(3, Some(380.0)), (411.0, 487.0));

        let space = ParameterSpace::parametric(4, &domain);
        assert_eq!(space.rings[3].count, (16, 28));

        let space = ParameterSpace::sequential(6, &domain);
        assert_eq!(space.rings.len(), 6);
        assert!((space.rings[5].radius.1 - 487.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_interval_collapses() {
        let domain = RadiusDomain::default();
        let space = ParameterSpace::sequential(4, &domain);
        let (low, high) = space.radius_bounds(1, Some(240.0));
        assert_eq!(low, 271.0);
        assert_eq!(high, 271.0);
    }

    #[test]
    fn test_serialization() {
        let config = SearchConfig {
            strategy: StrategyConfig::Genetic(GeneticConfig::default()),
            random_seed: Some(7),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rings, 4);
        assert_eq!(parsed.random_seed, Some(7));
        assert!(matches!(parsed.strategy, StrategyConfig::Genetic(_)));
    }

    #[test]
    fn test_oracle_stage_timeouts() {
        let mut oracle = OracleConfig::new(CommandSpec::new("/opt/nbox/build/nbox_sim"), "runs");
        assert_eq!(oracle.simulation_timeout(), Duration::from_secs(3600));
        assert_eq!(oracle.analysis_timeout(), None);

        oracle.analysis = Some(CommandSpec::new("/opt/ROOT/bin/root"));
        assert_eq!(oracle.analysis_timeout(), Some(Duration::from_secs(60)));

        let json = r#"{"simulation": {"program": "sim", "timeout_secs": 10}}"#;
        let parsed: OracleConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.simulation_timeout(), Duration::from_secs(10));
        assert_eq!(parsed.work_root, PathBuf::from("trials"));
    }

    #[test]
    fn test_minimal_json() {
        let json = r#"{"strategy": {"type": "Parametric", "trials": 5}}"#;
        let config: SearchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.strategy.round_budget(), 5);
        assert!(!config.homogeneous());
        assert!(config.validate().is_ok());
    }
}
