//! Result store for persisting search output.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compute::GeometryDocument;
use crate::schema::{BestParameters, RunStats, SearchResult, TrialRecord};

/// File names written into the output directory.
pub const BEST_PARAMETERS_FILE: &str = "best_parameters.json";
pub const HISTORY_FILE: &str = "optimization_history.json";
pub const ROUND_STATS_FILE: &str = "round_stats.json";
pub const BEST_GEOMETRY_FILE: &str = "best_geometry.json";
pub const HALL_OF_FAME_FILE: &str = "hall_of_fame.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const HISTORY_LOG_FILE: &str = "history.jsonl";
pub const TRIAL_CONFIGS_DIR: &str = "configs";

/// Run summary written next to the detailed files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub strategy: String,
    pub stats: RunStats,
}

/// Writes search results into one directory.
#[derive(Debug)]
pub struct ResultStore {
    dir: PathBuf,
    history_log: Option<File>,
}

impl ResultStore {
    /// Create the store, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            history_log: None,
        })
    }

    /// Append every recorded trial to `history.jsonl` as it happens.
    pub fn with_incremental_history(mut self) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.dir.join(HISTORY_LOG_FILE))?;
        self.history_log = Some(file);
        Ok(self)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one trial to the incremental log, if enabled.
    pub fn append(&mut self, record: &TrialRecord) -> io::Result<()> {
        if let Some(file) = self.history_log.as_mut() {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{line}")?;
            file.flush()?;
        }
        Ok(())
    }

    /// Save the geometry handed to the oracle for one trial.
    pub fn save_trial_geometry(&self, trial: usize, doc: &GeometryDocument) -> io::Result<PathBuf> {
        let dir = self.dir.join(TRIAL_CONFIGS_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("trial_{trial:04}.json"));
        doc.save(&path)?;
        Ok(path)
    }

    /// Write the final result files. Returns the paths written.
    pub fn save_result(
        &self,
        result: &SearchResult,
        best_geometry: Option<&GeometryDocument>,
    ) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        if let Some(best) = result
            .best
            .as_ref()
            .and_then(|record| BestParameters::from_record(&result.strategy, record))
        {
            paths.push(self.write_json(BEST_PARAMETERS_FILE, &best)?);
        }
        if let Some(doc) = best_geometry {
            let path = self.dir.join(BEST_GEOMETRY_FILE);
            doc.save(&path)?;
            paths.push(path);
        }

        paths.push(self.write_json(HISTORY_FILE, &result.history)?);
        paths.push(self.write_json(ROUND_STATS_FILE, &result.rounds)?);
        paths.push(self.write_json(HALL_OF_FAME_FILE, &result.hall_of_fame)?);
        paths.push(self.write_json(
            SUMMARY_FILE,
            &RunSummary {
                strategy: result.strategy.clone(),
                stats: result.stats.clone(),
            },
        )?);

        Ok(paths)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> io::Result<PathBuf> {
        let path = self.dir.join(name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

/// Load the full trial history from a result directory.
pub fn load_history<P: AsRef<Path>>(dir: P) -> io::Result<Vec<TrialRecord>> {
    let text = fs::read_to_string(dir.as_ref().join(HISTORY_FILE))?;
    Ok(serde_json::from_str(&text)?)
}

/// Load the incremental log, skipping a torn last line.
pub fn load_history_log<P: AsRef<Path>>(dir: P) -> io::Result<Vec<TrialRecord>> {
    let file = File::open(dir.as_ref().join(HISTORY_LOG_FILE))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("Skipping unreadable history line: {e}");
                break;
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Candidate, Efficiency, Envelope, ObjectClass, RoundStats, TrialOutcome};

    fn record(index: usize, score: f64) -> TrialRecord {
        let candidate = Candidate::homogeneous(
            vec![50.0, 100.0],
            vec![ObjectClass::Short, ObjectClass::Long],
            vec![7, 20],
        );
        TrialRecord {
            index,
            round: index,
            totals: candidate.class_totals(),
            candidate,
            score,
            outcome: TrialOutcome::Evaluated {
                report: Efficiency::new(score),
            },
            elapsed_seconds: index as f64,
        }
    }

    fn result() -> SearchResult {
        let history = vec![record(0, 1.0), record(1, 3.0)];
        SearchResult {
            strategy: "sequential".to_string(),
            best: Some(history[1].clone()),
            hall_of_fame: vec![history[1].clone(), history[0].clone()],
            rounds: vec![
                RoundStats::from_scores(0, &[1.0], 1.0),
                RoundStats::from_scores(1, &[1.0, 3.0], 3.0),
            ],
            history,
            stats: RunStats::default(),
        }
    }

    #[test]
    fn test_save_result_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("out")).unwrap();
        let doc = GeometryDocument::new(&Envelope::default(), Vec::new());
        let paths = store.save_result(&result(), Some(&doc)).unwrap();
        assert_eq!(paths.len(), 6);
        for path in &paths {
            assert!(path.exists(), "{} missing", path.display());
        }

        let best: BestParameters = serde_json::from_str(
            &fs::read_to_string(store.dir().join(BEST_PARAMETERS_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(best.trial, 1);
        assert_eq!(best.efficiency, 3.0);

        let history = load_history(store.dir()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], result().history[1]);
    }

    #[test]
    fn test_no_best_skips_best_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let mut r = result();
        r.best = None;
        store.save_result(&r, None).unwrap();
        assert!(!dir.path().join(BEST_PARAMETERS_FILE).exists());
        assert!(!dir.path().join(BEST_GEOMETRY_FILE).exists());
        assert!(dir.path().join(HISTORY_FILE).exists());
    }

    #[test]
    fn test_incremental_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::new(dir.path())
            .unwrap()
            .with_incremental_history()
            .unwrap();
        store.append(&record(0, 1.0)).unwrap();
        store.append(&record(1, 2.0)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(HISTORY_LOG_FILE))
            .unwrap();
        write!(file, "{{\"index\": 2, \"rou").unwrap();

        let records = load_history_log(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].score, 2.0);
    }

    #[test]
    fn test_trial_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let doc = GeometryDocument::new(&Envelope::default(), Vec::new());
        let path = store.save_trial_geometry(7, &doc).unwrap();
        assert!(path.ends_with("configs/trial_0007.json"));
        assert!(path.exists());
    }
}
