//! Pipeline orchestration
//!
//! This module provides the public API for pupilcourse. One input file flows
//! through a fixed sequence of stages: window labeling → time bucketing →
//! baseline/window accumulation → response derivation → trial summaries.
//! Each pass is a pure function of the previous pass's finalized output; all
//! per-file aggregate state lives in an explicit [`TrialAnalysisContext`]
//! constructed per file and discarded with it. No state crosses files.

use crate::baseline::{
    compute_fixation_baselines, compute_trial_baselines, FixationBaselines, TrialBaselines,
};
use crate::bucketer::TimeBucketer;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::io::{read_samples, RawFile};
use crate::labeler::WindowLabeler;
use crate::response::derive_responses;
use crate::summary::build_summaries;
use crate::types::{Sample, ScoredRow, TrialSummary};
use crate::windows::{compute_window_stats, ConditionPools, WindowStats};
use chrono::{DateTime, Utc};

/// All per-file aggregate maps, built from the bucketed rows in pass order.
///
/// Passes 1-3 populate this context; pass 4 (response derivation) and the
/// summary builder consume it read-only.
#[derive(Debug, Clone)]
pub struct TrialAnalysisContext {
    pub trial_baselines: TrialBaselines,
    pub fixation_baselines: FixationBaselines,
    pub window_stats: WindowStats,
    pub pools: ConditionPools,
}

impl TrialAnalysisContext {
    pub fn build(rows: &[crate::types::BucketRow], config: &AnalysisConfig) -> Self {
        let trial_baselines = compute_trial_baselines(rows, config);
        let fixation_baselines = compute_fixation_baselines(rows, config);
        let (window_stats, pools) = compute_window_stats(rows, config);
        Self {
            trial_baselines,
            fixation_baselines,
            window_stats,
            pools,
        }
    }
}

/// Complete analysis of one input file.
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    /// Scored time-series rows, in stream order.
    pub rows: Vec<ScoredRow>,
    /// One summary record per trial, by first appearance.
    pub summaries: Vec<TrialSummary>,
    /// Condition-keyed value pools collected during pass 3.
    pub pools: ConditionPools,
    /// When this analysis was computed.
    pub computed_at: DateTime<Utc>,
}

impl FileAnalysis {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Run the full analysis over one file's samples.
///
/// Never fails: malformed trials degrade to unset output fields, and an
/// empty sample set yields an empty analysis.
pub fn analyze_samples(samples: &[Sample], config: &AnalysisConfig) -> FileAnalysis {
    let labeled = WindowLabeler::label(samples);
    let buckets = TimeBucketer::bucketize(&labeled, config);
    let context = TrialAnalysisContext::build(&buckets, config);
    let rows = derive_responses(
        buckets,
        &context.trial_baselines,
        &context.fixation_baselines,
        config,
    );
    let summaries = build_summaries(&rows, &context.window_stats);

    FileAnalysis {
        rows,
        summaries,
        pools: context.pools,
        computed_at: Utc::now(),
    }
}

/// Read one CSV file and analyze it.
///
/// Returns the file's header row alongside the analysis so callers can write
/// pass-through columns.
pub fn analyze_csv<R: std::io::Read>(
    reader: R,
    config: &AnalysisConfig,
) -> Result<(Vec<String>, FileAnalysis), AnalysisError> {
    let RawFile { headers, samples } = read_samples(reader, config)?;
    Ok((headers, analyze_samples(&samples, config)))
}
