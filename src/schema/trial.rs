//! Trial history and search result types.

use serde::{Deserialize, Serialize};

use super::{Candidate, ClassTotals};
use crate::compute::Rejection;

/// Efficiency report returned by a successful oracle evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    /// Detection efficiency in percent, within [0, 100].
    pub efficiency: f64,
    /// Total hit count, when reported.
    #[serde(default)]
    pub n_hits: Option<u64>,
    /// Number of events with at least one hit, when reported.
    #[serde(default)]
    pub n_events_with_hits: Option<u64>,
}

impl Efficiency {
    /// Report carrying only the efficiency.
    pub fn new(efficiency: f64) -> Self {
        Self {
            efficiency,
            n_hits: None,
            n_events_with_hits: None,
        }
    }
}

/// What happened to a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    /// The oracle scored the candidate.
    Evaluated { report: Efficiency },
    /// The candidate failed a feasibility rule and was never built.
    Rejected { reason: Rejection, message: String },
    /// The oracle failed or timed out.
    OracleFailed { message: String },
}

impl TrialOutcome {
    /// Whether the oracle returned a score.
    pub fn is_evaluated(&self) -> bool {
        matches!(self, Self::Evaluated { .. })
    }

    /// Short status word for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Evaluated { .. } => "evaluated",
            Self::Rejected { .. } => "rejected",
            Self::OracleFailed { .. } => "oracle_failed",
        }
    }
}

/// Immutable record of one trial. Appended once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Ordinal across the whole run, starting at 0.
    pub index: usize,
    /// Iteration (strategies A/B) or generation (strategy C) the trial belongs to.
    pub round: usize,
    /// Snapshot of the candidate as evaluated.
    pub candidate: Candidate,
    /// Score; 0 for rejected or failed trials.
    pub score: f64,
    /// Outcome detail.
    pub outcome: TrialOutcome,
    /// Per-class totals of the candidate.
    pub totals: ClassTotals,
    /// Seconds since the run started when the record was appended.
    pub elapsed_seconds: f64,
}

/// Aggregate scores for one iteration or generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    /// Iteration or generation number.
    pub round: usize,
    /// Trials that contributed to this round.
    pub evaluations: usize,
    /// Mean score.
    pub mean: f64,
    /// Lowest score.
    pub min: f64,
    /// Highest score.
    pub max: f64,
    /// Best successful score seen so far in the run.
    pub best_so_far: f64,
}

impl RoundStats {
    /// Summarize a set of scores.
    pub fn from_scores(round: usize, scores: &[f64], best_so_far: f64) -> Self {
        if scores.is_empty() {
            return Self {
                round,
                evaluations: 0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                best_so_far,
            };
        }
        let sum: f64 = scores.iter().sum();
        Self {
            round,
            evaluations: scores.len(),
            mean: sum / scores.len() as f64,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            best_so_far,
        }
    }
}

/// Current phase of the search loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPhase {
    #[default]
    Init,
    Sample,
    Validate,
    Reject,
    Build,
    Evaluate,
    Record,
    Finalize,
    Complete,
}

/// Progress update passed to search callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchProgress {
    /// Current round.
    pub round: usize,
    /// Total rounds planned.
    pub total_rounds: usize,
    /// Trials recorded so far.
    pub trials: usize,
    /// Best successful score so far.
    pub best_score: Option<f64>,
    /// Score of the most recently recorded trial.
    pub last_score: Option<f64>,
    /// Phase the loop just entered.
    pub phase: SearchPhase,
}

/// Counters for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Rounds completed.
    pub rounds: usize,
    /// Trials recorded.
    pub trials: usize,
    /// Trials the oracle scored.
    pub evaluated: usize,
    /// Trials rejected by feasibility rules.
    pub rejected: usize,
    /// Trials whose evaluation failed.
    pub failed: usize,
    /// Best successful score.
    pub best_score: Option<f64>,
    /// Wall-clock duration.
    pub elapsed_seconds: f64,
}

/// Final result of a search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Strategy that produced the run.
    pub strategy: String,
    /// Best successfully evaluated trial, if any.
    pub best: Option<TrialRecord>,
    /// Top evaluated trials, best first; ties keep the earlier trial.
    pub hall_of_fame: Vec<TrialRecord>,
    /// Every trial in the order it was recorded.
    pub history: Vec<TrialRecord>,
    /// Per-round aggregate scores.
    pub rounds: Vec<RoundStats>,
    /// Run counters.
    pub stats: RunStats,
}

/// Persisted summary of the best trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestParameters {
    /// Strategy name.
    pub strategy: String,
    /// Trial ordinal.
    pub trial: usize,
    /// Ring radii in millimeters.
    pub radii: Vec<f64>,
    /// Class assignment.
    pub classes: super::ClassAssignment,
    /// Occupant count per ring.
    pub counts: Vec<u32>,
    /// Per-class totals.
    pub totals: ClassTotals,
    /// Achieved efficiency.
    pub efficiency: f64,
    #[serde(default)]
    pub n_hits: Option<u64>,
    #[serde(default)]
    pub n_events_with_hits: Option<u64>,
}

impl BestParameters {
    /// Build the summary from a successfully evaluated record.
    pub fn from_record(strategy: &str, record: &TrialRecord) -> Option<Self> {
        let TrialOutcome::Evaluated { report } = &record.outcome else {
            return None;
        };
        Some(Self {
            strategy: strategy.to_string(),
            trial: record.index,
            radii: record.candidate.radii.clone(),
            classes: record.candidate.classes.clone(),
            counts: record.candidate.counts.clone(),
            totals: record.totals,
            efficiency: report.efficiency,
            n_hits: report.n_hits,
            n_events_with_hits: report.n_events_with_hits,
        })
    }
}
