//! Experiment configuration and the aggregated sample.

use crate::error::HarnessError;
use serde::{Deserialize, Serialize};
use sojourn_core::{SimError, TrialConfig, TrialOutcome, TrialResult};
use std::fmt;
use tracing::{info, warn};

/// How each trial's reported mean is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragingMode {
    /// Mean over the trial's own sojourn times
    #[default]
    PerTrial,

    /// Mean over every sojourn time recorded since the experiment began.
    /// Later trials are dominated by earlier data; kept for comparison with
    /// legacy results only.
    Cumulative,
}

impl fmt::Display for AveragingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AveragingMode::PerTrial => write!(f, "per_trial"),
            AveragingMode::Cumulative => write!(f, "cumulative"),
        }
    }
}

/// Configuration for an experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Parameters shared by every trial
    pub trial: TrialConfig,

    /// Number of trials (SIM_NUM)
    pub trial_count: usize,

    /// Master seed for determinism
    pub seed: u64,

    /// How per-trial means are computed
    pub averaging: AveragingMode,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trial: TrialConfig::default(),
            trial_count: 20,
            seed: 42,
            averaging: AveragingMode::PerTrial,
        }
    }
}

impl ExperimentConfig {
    /// Sets the per-trial parameters.
    pub fn with_trial(mut self, trial: TrialConfig) -> Self {
        self.trial = trial;
        self
    }

    /// Sets the number of trials.
    pub fn with_trials(mut self, count: usize) -> Self {
        self.trial_count = count;
        self
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the averaging mode.
    pub fn with_averaging(mut self, averaging: AveragingMode) -> Self {
        self.averaging = averaging;
        self
    }

    /// Checks every parameter before any trial runs.
    pub fn validate(&self) -> Result<(), SimError> {
        self.trial.validate()?;
        if self.trial_count == 0 {
            return Err(SimError::config("trial count must be at least 1"));
        }
        Ok(())
    }
}

/// One plotted point: a trial index and its reported mean sojourn time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub trial: usize,
    pub mean_sojourn: f64,
}

/// The outcome of an experiment: one mean per completed trial plus the
/// theoretical prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSample {
    /// Configuration the sample was produced with
    pub config: ExperimentConfig,

    /// Reported means, in run order
    pub points: Vec<SamplePoint>,

    /// Full per-trial statistics, in run order
    pub trials: Vec<TrialResult>,

    /// Indices of trials excluded because nothing departed
    pub excluded: Vec<usize>,

    /// Closed-form expected sojourn time
    pub theoretical: f64,
}

impl ExperimentSample {
    /// Trial indices, the x axis of the plot.
    pub fn trial_indices(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.trial).collect()
    }

    /// Reported means, the y axis of the plot.
    pub fn means(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.mean_sojourn).collect()
    }

    /// Mean of the reported means.
    pub fn sample_mean(&self) -> f64 {
        self.points.iter().map(|p| p.mean_sojourn).sum::<f64>() / self.points.len() as f64
    }

    /// Sample standard deviation of the reported means (0 for one point).
    pub fn std_dev(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.sample_mean();
        let var = self
            .points
            .iter()
            .map(|p| (p.mean_sojourn - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        var.sqrt()
    }

    /// `|sample mean − R| / R`.
    pub fn relative_error(&self) -> f64 {
        (self.sample_mean() - self.theoretical).abs() / self.theoretical
    }
}

/// Folds trial outcomes into a sample, in run order.
pub(crate) struct SampleBuilder {
    config: ExperimentConfig,
    points: Vec<SamplePoint>,
    trials: Vec<TrialResult>,
    excluded: Vec<usize>,

    /// Running totals for cumulative averaging
    total_sojourn: f64,
    total_departures: usize,
}

impl SampleBuilder {
    pub(crate) fn new(config: ExperimentConfig) -> Self {
        Self {
            config,
            points: Vec::with_capacity(config.trial_count),
            trials: Vec::with_capacity(config.trial_count),
            excluded: Vec::new(),
            total_sojourn: 0.0,
            total_departures: 0,
        }
    }

    /// Adds the next trial. Empty trials are excluded and logged; any other
    /// error is returned.
    pub(crate) fn push(&mut self, outcome: TrialOutcome) -> Result<(), HarnessError> {
        let result = match outcome.summarize() {
            Ok(result) => result,
            Err(err @ SimError::EmptyTrial { .. }) => {
                warn!("{}; excluding it from the sample", err);
                self.excluded.push(outcome.trial);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        self.total_sojourn += outcome.sojourn_times.iter().sum::<f64>();
        self.total_departures += outcome.departures();

        let mean_sojourn = match self.config.averaging {
            AveragingMode::PerTrial => result.mean_sojourn,
            AveragingMode::Cumulative => self.total_sojourn / self.total_departures as f64,
        };
        info!(
            "trial {}: mean sojourn time {:.9}s ({} departures)",
            result.trial, mean_sojourn, result.departures
        );

        self.points.push(SamplePoint {
            trial: result.trial,
            mean_sojourn,
        });
        self.trials.push(result);
        Ok(())
    }

    pub(crate) fn finish(self, theoretical: f64) -> Result<ExperimentSample, HarnessError> {
        if self.points.is_empty() {
            return Err(HarnessError::NoCompletedTrials(self.excluded.len()));
        }
        Ok(ExperimentSample {
            config: self.config,
            points: self.points,
            trials: self.trials,
            excluded: self.excluded,
            theoretical,
        })
    }
}
