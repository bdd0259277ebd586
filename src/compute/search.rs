//! Search loop driving a strategy against an oracle.

use std::io;
use std::time::Instant;

use crate::compute::archive::ResultStore;
use crate::compute::strategy::{self, RoundClose, SearchRng, SearchStrategy};
use crate::compute::{
    GeometryDocument, LayoutError, Oracle, OracleOutcome, OracleSetupError, Validator, Verdict,
    build,
};
use crate::schema::{
    RoundStats, RunStats, SearchConfig, SearchConfigError, SearchPhase, SearchProgress,
    SearchResult, TrialOutcome, TrialRecord,
};

/// Errors that abort a search run.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] SearchConfigError),
    #[error("Malformed candidate from {strategy} strategy at trial {trial}: {source}")]
    Layout {
        strategy: &'static str,
        trial: usize,
        #[source]
        source: LayoutError,
    },
    #[error("Oracle setup failed: {0}")]
    OracleSetup(#[from] OracleSetupError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Running aggregate over every trial score of an iterative run.
#[derive(Debug, Default)]
struct RunningScores {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl RunningScores {
    fn push(&mut self, score: f64) {
        if self.count == 0 {
            self.min = score;
            self.max = score;
        } else {
            self.min = self.min.min(score);
            self.max = self.max.max(score);
        }
        self.count += 1;
        self.sum += score;
    }

    fn stats(&self, round: usize, best_so_far: f64) -> RoundStats {
        RoundStats {
            round,
            evaluations: self.count,
            mean: if self.count == 0 { 0.0 } else { self.sum / self.count as f64 },
            min: self.min,
            max: self.max,
            best_so_far,
        }
    }
}

/// Search engine: samples candidates, filters them, builds and scores the feasible ones.
pub struct SearchEngine<O: Oracle> {
    config: SearchConfig,
    strategy: Box<dyn SearchStrategy>,
    oracle: O,
    validator: Validator,
    rng: SearchRng,
    store: Option<ResultStore>,
    history: Vec<TrialRecord>,
    best: Option<usize>,
    rounds: Vec<RoundStats>,
    running: RunningScores,
    phase: SearchPhase,
    stats: RunStats,
}

impl<O: Oracle> SearchEngine<O> {
    /// Create an engine with an explicit strategy.
    pub fn new(
        config: SearchConfig,
        strategy: Box<dyn SearchStrategy>,
        oracle: O,
    ) -> Result<Self, SearchError> {
        config.validate()?;

        let rng = match config.random_seed {
            Some(seed) => SearchRng::new(seed),
            None => SearchRng::random(),
        };

        let store = match &config.output.dir {
            Some(dir) => {
                let store = ResultStore::new(dir)?;
                Some(if config.output.incremental_history {
                    store.with_incremental_history()?
                } else {
                    store
                })
            }
            None => None,
        };

        let validator = Validator::new(config.inventory.clone(), config.envelope.clone());

        Ok(Self {
            config,
            strategy,
            oracle,
            validator,
            rng,
            store,
            history: Vec::new(),
            best: None,
            rounds: Vec::new(),
            running: RunningScores::default(),
            phase: SearchPhase::Init,
            stats: RunStats::default(),
        })
    }

    /// Create an engine with the strategy the configuration selects.
    pub fn from_config(config: SearchConfig, oracle: O) -> Result<Self, SearchError> {
        config.validate()?;
        let strategy = strategy::from_config(&config);
        Self::new(config, strategy, oracle)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Trials recorded so far.
    pub fn history(&self) -> &[TrialRecord] {
        &self.history
    }

    /// Best successfully evaluated trial so far.
    pub fn best(&self) -> Option<&TrialRecord> {
        self.best.map(|i| &self.history[i])
    }

    fn best_score(&self) -> Option<f64> {
        self.best().map(|r| r.score)
    }

    fn progress(&self) -> SearchProgress {
        SearchProgress {
            round: self.rounds.len(),
            total_rounds: self.config.strategy.round_budget(),
            trials: self.history.len(),
            best_score: self.best_score(),
            last_score: self.history.last().map(|r| r.score),
            phase: self.phase,
        }
    }

    fn enter<F>(&mut self, phase: SearchPhase, callback: &F)
    where
        F: Fn(&SearchProgress),
    {
        self.phase = phase;
        callback(&self.progress());
    }

    /// Run the search with a progress callback.
    ///
    /// The loop stops only after the round budget is spent; rejected and failed
    /// trials count toward it.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<SearchResult, SearchError>
    where
        F: Fn(&SearchProgress),
    {
        let start = Instant::now();
        let budget = self.config.strategy.round_budget();

        log::info!(
            "Starting {} search: {} rings, {} rounds, {} objects in stock",
            self.strategy.name(),
            self.config.rings,
            budget,
            self.config.inventory.total()
        );
        self.enter(SearchPhase::Init, &callback);

        while self.rounds.len() < budget {
            let round = self.rounds.len();
            if let Some(close) = self.step(round, start, &callback)? {
                self.close_round(round, close);
            }
        }

        self.enter(SearchPhase::Finalize, &callback);
        let result = self.finalize(start)?;
        self.enter(SearchPhase::Complete, &callback);
        Ok(result)
    }

    /// Run the search to completion.
    pub fn run(&mut self) -> Result<SearchResult, SearchError> {
        self.run_with_callback(|_| {})
    }

    /// Sample, filter, evaluate and record one trial.
    fn step<F>(
        &mut self,
        round: usize,
        start: Instant,
        callback: &F,
    ) -> Result<Option<RoundClose>, SearchError>
    where
        F: Fn(&SearchProgress),
    {
        let index = self.history.len();

        self.enter(SearchPhase::Sample, callback);
        let proposal = self.strategy.propose(&mut self.rng);
        let candidate = proposal.candidate;

        let verdict = match proposal.rejection {
            Some(rejection) => Verdict::Rejected(rejection),
            None => {
                self.enter(SearchPhase::Validate, callback);
                self.validator
                    .check(&candidate, self.strategy.mode())
                    .map_err(|source| SearchError::Layout {
                        strategy: self.strategy.name(),
                        trial: index,
                        source,
                    })?
            }
        };

        let (score, outcome) = match verdict {
            Verdict::Rejected(reason) => {
                self.enter(SearchPhase::Reject, callback);
                log::debug!("Trial {index} rejected ({}): {reason}", reason.kind());
                self.stats.rejected += 1;
                let message = reason.to_string();
                (0.0, TrialOutcome::Rejected { reason, message })
            }
            Verdict::Feasible(configuration) => {
                self.enter(SearchPhase::Build, callback);
                let placements = build(&configuration, &self.config.inventory);
                if self.config.output.save_trial_geometry
                    && let Some(store) = &self.store
                {
                    let doc = GeometryDocument::new(&self.config.envelope, placements.clone());
                    if let Err(e) = store.save_trial_geometry(index, &doc) {
                        log::warn!("Trial {index}: could not save geometry: {e}");
                    }
                }

                self.enter(SearchPhase::Evaluate, callback);
                match self.oracle.evaluate(index, &placements, &self.config.run) {
                    OracleOutcome::Success(report) => {
                        self.stats.evaluated += 1;
                        log::info!(
                            "Trial {index}: {} -> {:.4}",
                            candidate.describe(),
                            report.efficiency
                        );
                        (report.efficiency, TrialOutcome::Evaluated { report })
                    }
                    OracleOutcome::Failure(failure) => {
                        self.stats.failed += 1;
                        log::warn!("Trial {index} evaluation failed: {failure}");
                        (
                            0.0,
                            TrialOutcome::OracleFailed {
                                message: failure.to_string(),
                            },
                        )
                    }
                }
            }
        };

        let record = TrialRecord {
            index,
            round,
            totals: candidate.class_totals(),
            candidate,
            score,
            outcome,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };

        if record.outcome.is_evaluated() && self.best_score().is_none_or(|best| score > best) {
            log::info!("New best at trial {index}: {score:.4}");
            self.best = Some(index);
        }
        self.running.push(score);
        if let Some(store) = self.store.as_mut()
            && let Err(e) = store.append(&record)
        {
            log::warn!("Trial {index}: could not append to history log: {e}");
        }
        log::debug!("Trial {index} recorded as {}", record.outcome.label());

        let close = self.strategy.observe(&record);
        self.history.push(record);
        self.enter(SearchPhase::Record, callback);
        Ok(close)
    }

    fn close_round(&mut self, round: usize, close: RoundClose) {
        let best_so_far = self.best_score().unwrap_or(0.0);
        let stats = match close {
            RoundClose::Iteration => self.running.stats(round, best_so_far),
            RoundClose::Generation(scores) => {
                let stats = RoundStats::from_scores(round, &scores, best_so_far);
                log::info!(
                    "Generation {round}: mean={:.4}, max={:.4}, best={:.4}",
                    stats.mean,
                    stats.max,
                    stats.best_so_far
                );
                stats
            }
        };
        self.rounds.push(stats);
    }

    fn finalize(&mut self, start: Instant) -> Result<SearchResult, SearchError> {
        let mut ranked: Vec<&TrialRecord> = self
            .history
            .iter()
            .filter(|r| r.outcome.is_evaluated())
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        let hall_of_fame: Vec<TrialRecord> = ranked
            .into_iter()
            .take(self.config.output.hall_of_fame)
            .cloned()
            .collect();

        self.stats.rounds = self.rounds.len();
        self.stats.trials = self.history.len();
        self.stats.best_score = self.best_score();
        self.stats.elapsed_seconds = start.elapsed().as_secs_f64();

        let best = self.best().cloned();
        match &best {
            Some(record) => log::info!(
                "Search complete: best {:.4} at trial {} ({})",
                record.score,
                record.index,
                record.candidate.describe()
            ),
            None => log::warn!(
                "Search complete: none of {} trials was evaluated successfully",
                self.history.len()
            ),
        }

        let result = SearchResult {
            strategy: self.strategy.name().to_string(),
            best,
            hall_of_fame,
            history: self.history.clone(),
            rounds: self.rounds.clone(),
            stats: self.stats.clone(),
        };

        if let Some(store) = &self.store {
            let geometry = result.best.as_ref().and_then(|record| {
                match self.validator.check(&record.candidate, self.strategy.mode()) {
                    Ok(Verdict::Feasible(configuration)) => Some(GeometryDocument::new(
                        &self.config.envelope,
                        build(&configuration, &self.config.inventory),
                    )),
                    _ => None,
                }
            });
            let paths = store.save_result(&result, geometry.as_ref())?;
            log::info!("Wrote {} result files to {}", paths.len(), store.dir().display());
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::compute::strategy::Proposal;
    use crate::compute::{FeasibilityMode, FnOracle, OracleFailure, archive};
    use crate::schema::{
        Candidate, ClassMode, Efficiency, GeneticConfig, ObjectClass, OutputConfig,
        ParametricConfig, Placement, RunParameters, SequentialConfig, StrategyConfig,
    };

    fn config(strategy: StrategyConfig) -> SearchConfig {
        SearchConfig {
            strategy,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn sequential(trials: usize) -> SearchConfig {
        config(StrategyConfig::Sequential(SequentialConfig {
            trials,
            ..Default::default()
        }))
    }

    fn radius_oracle() -> FnOracle<impl FnMut(usize, &[Placement], &RunParameters) -> OracleOutcome> {
        FnOracle::new(|_: usize, placements: &[Placement], _: &RunParameters| {
            let mean = placements.iter().map(|p| p.radius).sum::<f64>() / placements.len() as f64;
            OracleOutcome::Success(Efficiency::new(mean / 10.0))
        })
    }

    #[test]
    fn test_sequential_spends_budget() {
        let mut engine = SearchEngine::from_config(sequential(12), radius_oracle()).unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.strategy, "sequential");
        assert_eq!(result.history.len(), 12);
        assert_eq!(result.rounds.len(), 12);
        assert_eq!(result.stats.rounds, 12);
        assert_eq!(
            result.stats.evaluated + result.stats.rejected + result.stats.failed,
            12
        );
        for (i, record) in result.history.iter().enumerate() {
            assert_eq!(record.index, i);
            assert_eq!(record.round, i);
            if !record.outcome.is_evaluated() {
                assert_eq!(record.score, 0.0);
            }
        }
    }

    #[test]
    fn test_best_is_max_evaluated() {
        let mut engine = SearchEngine::from_config(sequential(15), radius_oracle()).unwrap();
        let result = engine.run().unwrap();

        let evaluated: Vec<&TrialRecord> = result
            .history
            .iter()
            .filter(|r| r.outcome.is_evaluated())
            .collect();
        match result.best {
            Some(best) => {
                assert!(best.outcome.is_evaluated());
                assert!(evaluated.iter().all(|r| r.score <= best.score));
                assert_eq!(result.hall_of_fame[0].index, best.index);
                assert!(result.hall_of_fame.len() <= 5);
            }
            None => assert!(evaluated.is_empty()),
        }
    }

    #[test]
    fn test_ties_keep_first_best() {
        let oracle = FnOracle::new(|_: usize, _: &[Placement], _: &RunParameters| {
            OracleOutcome::Success(Efficiency::new(5.0))
        });
        let mut engine = SearchEngine::from_config(sequential(20), oracle).unwrap();
        let result = engine.run().unwrap();

        let first = result.history.iter().find(|r| r.outcome.is_evaluated());
        assert_eq!(
            result.best.as_ref().map(|r| r.index),
            first.map(|r| r.index)
        );
    }

    #[test]
    fn test_oracle_failures_do_not_abort() {
        let oracle = FnOracle::new(|_: usize, _: &[Placement], _: &RunParameters| {
            OracleOutcome::Failure(OracleFailure::Io("disk full".to_string()))
        });
        let mut engine = SearchEngine::from_config(sequential(8), oracle).unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.history.len(), 8);
        assert!(result.best.is_none());
        assert!(result.hall_of_fame.is_empty());
        assert_eq!(result.stats.evaluated, 0);
        assert_eq!(result.stats.failed + result.stats.rejected, 8);
        assert!(result.history.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_parametric_run() {
        let cfg = config(StrategyConfig::Parametric(ParametricConfig {
            trials: 10,
            class_mode: ClassMode::Mixed,
            ..Default::default()
        }));
        let mut engine = SearchEngine::from_config(cfg, radius_oracle()).unwrap();
        let result = engine.run().unwrap();
        assert_eq!(result.strategy, "parametric");
        assert_eq!(result.history.len(), 10);
    }

    #[test]
    fn test_genetic_generations() {
        let cfg = config(StrategyConfig::Genetic(GeneticConfig {
            generations: 2,
            population: 4,
            elitism: 1,
            ..Default::default()
        }));
        let mut engine = SearchEngine::from_config(cfg, radius_oracle()).unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.strategy, "genetic");
        assert_eq!(result.rounds.len(), 3);
        // The initial population, then two generations without their elite.
        assert_eq!(result.history.len(), 4 + 2 * 3);
        for (g, stats) in result.rounds.iter().enumerate() {
            assert_eq!(stats.round, g);
            assert_eq!(stats.evaluations, 4);
        }
        let best = result.best.unwrap();
        assert!(result.rounds.last().unwrap().best_so_far >= best.score);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = SearchEngine::from_config(sequential(10), radius_oracle())
            .unwrap()
            .run()
            .unwrap();
        let b = SearchEngine::from_config(sequential(10), radius_oracle())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = sequential(10);
        cfg.rings = 0;
        let err = SearchEngine::from_config(cfg, radius_oracle()).err().unwrap();
        assert!(matches!(err, SearchError::Config(SearchConfigError::NoRings)));
    }

    struct Malformed;

    impl SearchStrategy for Malformed {
        fn name(&self) -> &'static str {
            "malformed"
        }

        fn mode(&self) -> FeasibilityMode {
            FeasibilityMode::Exact
        }

        fn propose(&mut self, _rng: &mut SearchRng) -> Proposal {
            Proposal::new(Candidate::homogeneous(
                vec![100.0, 200.0],
                vec![ObjectClass::Short],
                vec![28, 40],
            ))
        }

        fn observe(&mut self, _record: &TrialRecord) -> Option<RoundClose> {
            Some(RoundClose::Iteration)
        }
    }

    #[test]
    fn test_layout_error_is_fatal() {
        let mut engine =
            SearchEngine::new(sequential(5), Box::new(Malformed), radius_oracle()).unwrap();
        let err = engine.run().unwrap_err();
        assert!(matches!(
            err,
            SearchError::Layout {
                trial: 0,
                source: LayoutError::LengthMismatch { .. },
                ..
            }
        ));
        assert!(engine.history().is_empty());
    }

    #[test]
    fn test_progress_phases() {
        let phases = RefCell::new(Vec::new());
        let mut engine = SearchEngine::from_config(sequential(3), radius_oracle()).unwrap();
        engine
            .run_with_callback(|p| phases.borrow_mut().push(p.phase))
            .unwrap();

        let phases = phases.into_inner();
        assert_eq!(phases.first(), Some(&SearchPhase::Init));
        assert_eq!(phases.last(), Some(&SearchPhase::Complete));
        assert_eq!(
            phases.iter().filter(|&&p| p == SearchPhase::Sample).count(),
            3
        );
        assert_eq!(
            phases.iter().filter(|&&p| p == SearchPhase::Record).count(),
            3
        );
    }

    #[test]
    fn test_results_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = sequential(6);
        cfg.output = OutputConfig {
            dir: Some(dir.path().to_path_buf()),
            save_trial_geometry: true,
            incremental_history: true,
            ..Default::default()
        };
        let mut engine = SearchEngine::from_config(cfg, radius_oracle()).unwrap();
        let result = engine.run().unwrap();

        let history = archive::load_history(dir.path()).unwrap();
        assert_eq!(history, result.history);
        let log = archive::load_history_log(dir.path()).unwrap();
        assert_eq!(log.len(), 6);
        assert!(dir.path().join(archive::SUMMARY_FILE).exists());
        assert!(dir.path().join(archive::ROUND_STATS_FILE).exists());

        let built = result
            .history
            .iter()
            .filter(|r| !matches!(r.outcome, TrialOutcome::Rejected { .. }))
            .count();
        let configs = dir.path().join(archive::TRIAL_CONFIGS_DIR);
        let saved = std::fs::read_dir(&configs).map(|d| d.count()).unwrap_or(0);
        assert_eq!(saved, built);

        if result.best.is_some() {
            assert!(dir.path().join(archive::BEST_PARAMETERS_FILE).exists());
            assert!(dir.path().join(archive::BEST_GEOMETRY_FILE).exists());
        }
    }

    #[test]
    fn test_trial_save_errors_do_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(archive::TRIAL_CONFIGS_DIR), "not a directory").unwrap();
        let mut cfg = sequential(30);
        cfg.output = OutputConfig {
            dir: Some(dir.path().to_path_buf()),
            save_trial_geometry: true,
            ..Default::default()
        };
        let mut engine = SearchEngine::from_config(cfg, radius_oracle()).unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.history.len(), 30);
        assert_eq!(archive::load_history(dir.path()).unwrap().len(), 30);
        assert!(dir.path().join(archive::SUMMARY_FILE).exists());
    }
}
