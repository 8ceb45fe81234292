//! Pupilcourse - pupillometry time-course analysis for visual working-memory tasks
//!
//! Pupilcourse transforms per-sample eye-tracker recordings into bucketed,
//! window-labeled pupil time series and per-trial response measures through a
//! deterministic pipeline: ingestion → window labeling → time bucketing →
//! baseline computation → response derivation → trial summaries.
//!
//! ## Modules
//!
//! - **Ingestion** ([`io`]): fixed-layout CSV parsing, phase filtering, time ordering
//! - **Core passes** ([`labeler`], [`bucketer`], [`baseline`], [`windows`], [`response`]):
//!   the per-file analysis stages, each pure over its inputs
//! - **Assembly** ([`pipeline`], [`summary`]): orchestration and per-trial rollups

pub mod baseline;
pub mod bucketer;
pub mod config;
pub mod error;
pub mod io;
pub mod labeler;
pub mod pipeline;
pub mod response;
pub mod summary;
pub mod types;
pub mod validity;
pub mod windows;

pub use config::{AnalysisConfig, InvalidSamplePolicy, PupilSource};
pub use error::AnalysisError;
pub use pipeline::{analyze_csv, analyze_samples, FileAnalysis, TrialAnalysisContext};

// Core type exports
pub use types::{
    BucketRow, LabeledSample, Sample, ScoredRow, StimulusTag, TrialSummary, WindowLabel,
};

/// Engine version embedded in run reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
