//! Sojourn Experiment Harness
//!
//! Runs the single-trial engine from `sojourn_core` many times with
//! independent random streams and compares the resulting sample of mean
//! sojourn times with the closed-form prediction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ExperimentRunner                      │
//! │  validate config ─► theoretical R ─► trials 1..=N        │
//! │       │                                   │              │
//! │  ┌────▼─────┐                       ┌─────▼──────┐       │
//! │  │SeedContext│── ChaCha8 stream i ──►│ Trial (i)  │ ...  │
//! │  └──────────┘                       └─────┬──────┘       │
//! │                                           │ mean sojourn │
//! │                                     ┌─────▼──────┐       │
//! │                                     │ Experiment │       │
//! │                                     │   Sample   │       │
//! │                                     └─────┬──────┘       │
//! └───────────────────────────────────────────┼──────────────┘
//!                                             ▼
//!                                  SampleExport (JSON plot data)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sojourn_sim::{ExperimentConfig, ExperimentRunner};
//!
//! let config = ExperimentConfig::default().with_trials(20).with_seed(42);
//! let sample = ExperimentRunner::new(config).run()?;
//! println!("R = {:.8}, sample mean = {:.8}", sample.theoretical, sample.sample_mean());
//! ```

mod context;
mod error;
mod experiment;
mod exporter;
mod runner;
pub mod scenarios;

pub use context::SeedContext;
pub use error::HarnessError;
pub use experiment::{AveragingMode, ExperimentConfig, ExperimentSample, SamplePoint};
pub use exporter::SampleExport;
pub use runner::ExperimentRunner;
