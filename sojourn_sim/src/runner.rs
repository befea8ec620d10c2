//! Experiment runner - repeats the trial engine and aggregates the sample.

use crate::context::SeedContext;
use crate::error::HarnessError;
use crate::experiment::{AveragingMode, ExperimentConfig, ExperimentSample, SampleBuilder};
use sojourn_core::{SimError, Trial, TrialConfig, TrialOutcome};
use tracing::{info, warn};

/// Runs `trial_count` independent trials with identical parameters.
pub struct ExperimentRunner {
    /// Experiment configuration
    config: ExperimentConfig,

    /// Per-trial random streams
    seeds: SeedContext,
}

impl ExperimentRunner {
    /// Creates a runner; the master seed comes from `config.seed`.
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            seeds: SeedContext::new(config.seed),
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Runs the trials one after another.
    ///
    /// # Errors
    /// Configuration and instability errors are returned before any trial
    /// runs. Empty trials are excluded, not fatal.
    pub fn run(&self) -> Result<ExperimentSample, HarnessError> {
        let theoretical = self.prepare()?;
        let mut builder = SampleBuilder::new(self.config);

        for trial in 1..=self.config.trial_count {
            builder.push(run_one(self.config.trial, self.seeds, trial)?)?;
        }

        builder.finish(theoretical)
    }

    /// Runs the trials on tokio's blocking pool.
    ///
    /// Produces exactly the same sample as [`run`](Self::run) for the same
    /// seed: results are folded in trial order regardless of which finishes
    /// first.
    pub async fn run_parallel(&self) -> Result<ExperimentSample, HarnessError> {
        let theoretical = self.prepare()?;

        let handles: Vec<_> = (1..=self.config.trial_count)
            .map(|trial| {
                let config = self.config.trial;
                let seeds = self.seeds;
                tokio::task::spawn_blocking(move || run_one(config, seeds, trial))
            })
            .collect();

        let mut builder = SampleBuilder::new(self.config);
        for handle in handles {
            builder.push(handle.await??)?;
        }

        builder.finish(theoretical)
    }

    /// Validates the configuration and computes the theoretical sojourn time.
    fn prepare(&self) -> Result<f64, SimError> {
        self.config.validate()?;
        let theoretical = self.config.trial.theoretical_sojourn()?;

        let trial = &self.config.trial;
        info!(
            "Experiment: {} trials, λ={} μ={} servers={} T={}s (seed={})",
            self.config.trial_count,
            trial.arrival_rate,
            trial.service_rate,
            trial.num_servers,
            trial.duration,
            self.seeds.seed()
        );
        info!("Theoretical sojourn time: {:.8}s", theoretical);
        if self.config.averaging == AveragingMode::Cumulative {
            warn!("Cumulative averaging: later trials include every earlier sojourn time");
        }
        Ok(theoretical)
    }
}

fn run_one(config: TrialConfig, seeds: SeedContext, trial: usize) -> Result<TrialOutcome, SimError> {
    Trial::new(config, seeds.trial_rng(trial))?
        .with_index(trial)
        .run()
}
