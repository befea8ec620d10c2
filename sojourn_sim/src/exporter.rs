//! JSON exporter for plotting.
//!
//! Writes the series a scatter plot needs: trial index on x, per-trial mean
//! sojourn time on y, and the theoretical value repeated as a reference line.

use crate::error::HarnessError;
use crate::experiment::{AveragingMode, ExperimentSample};
use serde::{Deserialize, Serialize};
use sojourn_core::TrialResult;
use std::fs::File;
use std::io::Write;
use uuid::Uuid;

/// Complete experiment export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleExport {
    /// Unique id of this run
    pub run_id: String,

    /// Scenario name, or "custom"
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Averaging mode used for `y`
    pub averaging: AveragingMode,

    pub arrival_rate: f64,
    pub service_rate: f64,
    pub num_servers: usize,
    pub duration_sec: f64,

    /// Trial indices
    pub x: Vec<usize>,

    /// Mean sojourn time per trial
    pub y: Vec<f64>,

    /// Theoretical sojourn time, once per trial
    pub reference: Vec<f64>,

    /// Theoretical sojourn time
    pub theoretical: f64,

    /// Mean of `y`
    pub sample_mean: f64,

    /// Trials excluded because nothing departed
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub excluded: Vec<usize>,

    /// Per-trial statistics
    pub trials: Vec<TrialResult>,
}

impl SampleExport {
    /// Builds an export from a finished sample.
    pub fn from_sample(scenario: &str, sample: &ExperimentSample) -> Self {
        let config = &sample.config;
        Self {
            run_id: Uuid::new_v4().to_string(),
            scenario: scenario.to_string(),
            seed: config.seed,
            averaging: config.averaging,
            arrival_rate: config.trial.arrival_rate,
            service_rate: config.trial.service_rate,
            num_servers: config.trial.num_servers,
            duration_sec: config.trial.duration,
            x: sample.trial_indices(),
            y: sample.means(),
            reference: vec![sample.theoretical; sample.points.len()],
            theoretical: sample.theoretical,
            sample_mean: sample.sample_mean(),
            excluded: sample.excluded.clone(),
            trials: sample.trials.clone(),
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), HarnessError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExperimentConfig, ExperimentRunner};
    use sojourn_core::TrialConfig;

    fn sample() -> ExperimentSample {
        let config = ExperimentConfig::default()
            .with_trials(4)
            .with_trial(TrialConfig::default().with_duration(10.0));
        ExperimentRunner::new(config).run().unwrap()
    }

    #[test]
    fn test_series_line_up() {
        let export = SampleExport::from_sample("custom", &sample());

        assert_eq!(export.x, vec![1, 2, 3, 4]);
        assert_eq!(export.y.len(), 4);
        assert_eq!(export.reference, vec![export.theoretical; 4]);
        assert_eq!(export.trials.len(), 4);
        assert!(Uuid::parse_str(&export.run_id).is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let export = SampleExport::from_sample("standard", &sample());
        let json = export.to_json().unwrap();
        assert!(!json.contains("excluded"));

        let back: SampleExport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scenario, "standard");
        assert_eq!(back.y.len(), export.y.len());
        for (a, b) in back.y.iter().zip(&export.y) {
            approx::assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
        assert_eq!(back.averaging, AveragingMode::PerTrial);
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("sojourn-export-{}.json", Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();

        SampleExport::from_sample("custom", &sample()).write_to_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(written.contains("\"theoretical\""));
    }
}
