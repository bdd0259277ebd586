//! Simulation oracle: turns a placement list into an efficiency score.
//!
//! The search loop only sees the [`Oracle`] trait. [`CommandOracle`] drives an
//! external simulation (and optional analysis step) as child processes, each
//! trial in its own working directory under a wall-clock limit.

use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::compute::GeometryDocument;
use crate::schema::{
    CommandSpec, Efficiency, Envelope, OracleConfig, Placement, RunParameters, SourceSpec,
};

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome {
    Success(Efficiency),
    Failure(OracleFailure),
}

/// Why an evaluation produced no score. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleFailure {
    #[error("{stage} timed out after {limit_secs} s")]
    Timeout { stage: String, limit_secs: u64 },
    #[error("{stage} exited with status {code:?}: {stderr}")]
    ExitStatus {
        stage: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{stage} could not be started: {message}")]
    Spawn { stage: String, message: String },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("{stage} output has no EFFICIENCY line")]
    MissingReport { stage: String },
    #[error("Efficiency {0} is outside [0, 100]")]
    OutOfRange(f64),
}

impl From<io::Error> for OracleFailure {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Fatal problems detected before the first evaluation.
#[derive(Debug, thiserror::Error)]
pub enum OracleSetupError {
    #[error("Executable not found: {0}")]
    MissingProgram(PathBuf),
    #[error("Cannot create work root {path}: {source}")]
    WorkRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// External evaluator.
pub trait Oracle {
    /// Score a built placement list. Blocks until the evaluation finishes or fails.
    fn evaluate(&mut self, trial: usize, placements: &[Placement], run: &RunParameters) -> OracleOutcome;
}

/// Oracle backed by a closure.
pub struct FnOracle<F> {
    f: F,
}

impl<F> FnOracle<F>
where
    F: FnMut(usize, &[Placement], &RunParameters) -> OracleOutcome,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Oracle for FnOracle<F>
where
    F: FnMut(usize, &[Placement], &RunParameters) -> OracleOutcome,
{
    fn evaluate(&mut self, trial: usize, placements: &[Placement], run: &RunParameters) -> OracleOutcome {
        (self.f)(trial, placements, run)
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn evaluate(&mut self, trial: usize, placements: &[Placement], run: &RunParameters) -> OracleOutcome {
        (**self).evaluate(trial, placements, run)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_TAIL: usize = 2000;

/// Process-based oracle.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    config: OracleConfig,
    envelope: Envelope,
}

impl CommandOracle {
    /// Check the configured programs and prepare the work root.
    pub fn new(mut config: OracleConfig, envelope: Envelope) -> Result<Self, OracleSetupError> {
        check_program(&config.simulation.program)?;
        if let Some(analysis) = &config.analysis {
            check_program(&analysis.program)?;
        }
        // Children run inside their trial directory, so every path handed to them is absolute.
        config.work_root = fs::create_dir_all(&config.work_root)
            .and_then(|()| fs::canonicalize(&config.work_root))
            .map_err(|source| OracleSetupError::WorkRoot {
                path: config.work_root.clone(),
                source,
            })?;
        Ok(Self { config, envelope })
    }

    /// Working directory of a trial.
    pub fn trial_dir(&self, trial: usize) -> PathBuf {
        self.config.work_root.join(format!("trial_{trial:04}"))
    }

    fn run_trial(
        &self,
        dir: &Path,
        placements: &[Placement],
        run: &RunParameters,
    ) -> Result<Efficiency, OracleFailure> {
        fs::create_dir_all(dir)?;
        let geometry = dir.join("geometry.json");
        GeometryDocument::new(&self.envelope, placements.to_vec()).save(&geometry)?;
        let macro_path = dir.join("run.mac");
        fs::write(&macro_path, macro_text(run))?;

        let vars = Substitutions {
            geometry: &geometry,
            macro_path: &macro_path,
            workdir: dir,
            run,
        };

        let stdout = run_stage(
            "simulation",
            &self.config.simulation,
            &vars,
            dir,
            self.config.simulation_timeout(),
        )?;

        match (&self.config.analysis, self.config.analysis_timeout()) {
            (Some(analysis), Some(limit)) => {
                let stdout = run_stage("analysis", analysis, &vars, dir, limit)?;
                parse_report("analysis", &stdout)
            }
            _ => parse_report("simulation", &stdout),
        }
    }
}

impl Oracle for CommandOracle {
    fn evaluate(&mut self, trial: usize, placements: &[Placement], run: &RunParameters) -> OracleOutcome {
        let dir = self.trial_dir(trial);
        match self.run_trial(&dir, placements, run) {
            Ok(report) => {
                if self.config.cleanup
                    && let Err(e) = fs::remove_dir_all(&dir)
                {
                    log::debug!("Could not remove {}: {e}", dir.display());
                }
                OracleOutcome::Success(report)
            }
            Err(failure) => OracleOutcome::Failure(failure),
        }
    }
}

/// Macro file content for a run.
pub fn macro_text(run: &RunParameters) -> String {
    let mut text = String::from("/run/initialize\n");
    if let SourceSpec::Monoenergetic { energy, unit } = &run.source {
        text.push_str("/gun/particle neutron\n");
        text.push_str(&format!("/gun/energy {energy} {unit}\n"));
    }
    text.push_str(&format!("/run/beamOn {}\n", run.events));
    text
}

/// Parse `EFFICIENCY:`, `N_HITS:` and `N_EVENTS_WITH_HITS:` lines.
pub fn parse_report(stage: &str, stdout: &str) -> Result<Efficiency, OracleFailure> {
    let mut efficiency = None;
    let mut n_hits = None;
    let mut n_events_with_hits = None;

    for line in stdout.lines().map(str::trim) {
        if let Some(v) = line.strip_prefix("EFFICIENCY:") {
            efficiency = v.trim().parse::<f64>().ok();
        } else if let Some(v) = line.strip_prefix("N_HITS:") {
            n_hits = v.trim().parse::<u64>().ok();
        } else if let Some(v) = line.strip_prefix("N_EVENTS_WITH_HITS:") {
            n_events_with_hits = v.trim().parse::<u64>().ok();
        }
    }

    let efficiency = efficiency.ok_or_else(|| OracleFailure::MissingReport {
        stage: stage.to_string(),
    })?;
    if !(0.0..=100.0).contains(&efficiency) {
        return Err(OracleFailure::OutOfRange(efficiency));
    }
    Ok(Efficiency {
        efficiency,
        n_hits,
        n_events_with_hits,
    })
}

struct Substitutions<'a> {
    geometry: &'a Path,
    macro_path: &'a Path,
    workdir: &'a Path,
    run: &'a RunParameters,
}

impl Substitutions<'_> {
    fn apply(&self, template: &str) -> String {
        let source = match &self.run.source {
            SourceSpec::Spectrum { path } => path.display().to_string(),
            SourceSpec::Monoenergetic { .. } => String::new(),
        };
        template
            .replace("{geometry}", &self.geometry.display().to_string())
            .replace("{macro}", &self.macro_path.display().to_string())
            .replace("{workdir}", &self.workdir.display().to_string())
            .replace("{events}", &self.run.events.to_string())
            .replace("{source}", &source)
    }

    fn args(&self, spec: &CommandSpec) -> Vec<String> {
        let extra: &[String] = match self.run.source {
            SourceSpec::Spectrum { .. } => spec.spectrum_args.as_slice(),
            SourceSpec::Monoenergetic { .. } => &[],
        };
        spec.args.iter().chain(extra).map(|a| self.apply(a)).collect()
    }
}

fn run_stage(
    stage: &str,
    spec: &CommandSpec,
    vars: &Substitutions<'_>,
    dir: &Path,
    limit: Duration,
) -> Result<String, OracleFailure> {
    let stdout_path = dir.join(format!("{stage}.stdout"));
    let stderr_path = dir.join(format!("{stage}.stderr"));

    let mut command = Command::new(&spec.program);
    command
        .args(vars.args(spec))
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(File::create(&stdout_path)?)
        .stderr(File::create(&stderr_path)?);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so a timeout also reaches anything the stage spawned.
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .map_err(|e| OracleFailure::Spawn {
            stage: stage.to_string(),
            message: e.to_string(),
        })?;

    let status = wait_with_timeout(&mut child, limit)?.ok_or_else(|| OracleFailure::Timeout {
        stage: stage.to_string(),
        limit_secs: limit.as_secs(),
    })?;

    if !status.success() {
        let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
        return Err(OracleFailure::ExitStatus {
            stage: stage.to_string(),
            code: status.code(),
            stderr: tail(&stderr, STDERR_TAIL),
        });
    }

    Ok(fs::read_to_string(&stdout_path)?)
}

/// Wait for a child, killing it once `limit` elapses. `None` means timed out.
fn wait_with_timeout(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            kill_group(child);
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill the process group the child leads. Wrappers such as `sh -c` would
/// otherwise leave the real simulator running after a timeout.
#[cfg(unix)]
fn kill_group(child: &Child) {
    let group = format!("-{}", child.id());
    let result = Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = result {
        log::debug!("Could not signal process group {group}: {e}");
    }
}

/// Without process groups only the direct child is killed.
#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

fn check_program(program: &Path) -> Result<(), OracleSetupError> {
    let found = if program.components().count() > 1 || program.is_absolute() {
        program.is_file()
    } else {
        env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    };
    if found {
        Ok(())
    } else {
        Err(OracleSetupError::MissingProgram(program.to_path_buf()))
    }
}
