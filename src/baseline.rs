//! Baseline accumulation
//!
//! The first two passes over the bucketed rows: the trial-level baseline
//! (mean value while the first item is on screen, 0-1500 ms) and the
//! per-item fixation baselines (mean value within each `fix1`..`fix4`
//! window). Both are accumulate-then-finalize; an average only exists once at
//! least one usable value contributed, so a trial with no valid first-item
//! data simply has no baseline and downstream derivations skip it.

use crate::config::AnalysisConfig;
use crate::types::{BaselineAccum, BucketRow, StimulusTag, WindowLabel};
use std::collections::HashMap;

/// Per-trial item1-window baseline accumulators.
pub type TrialBaselines = HashMap<i64, BaselineAccum>;

/// Per-trial, per-item-index fixation baseline accumulators.
pub type FixationBaselines = HashMap<i64, HashMap<u8, BaselineAccum>>;

/// Pass 1: accumulate the trial baseline from rows whose stimulus tag is the
/// first item. That tag spans both the `item1` and `fix1` sub-windows, so the
/// baseline covers the full 0-1500 ms reference interval.
///
/// An entry is created for every trial that shows the tag, even when no value
/// qualifies, so "baseline attempted but empty" is distinguishable from
/// "trial never reached the first item".
pub fn compute_trial_baselines(rows: &[BucketRow], config: &AnalysisConfig) -> TrialBaselines {
    let mut baselines = TrialBaselines::new();

    for row in rows {
        if row.sample.tag != Some(StimulusTag::FirstItem) {
            continue;
        }
        let accum = baselines.entry(row.sample.trial_id).or_default();
        if let Some(value) = config.chosen_value(row) {
            if value > 0.0 {
                accum.add(value);
            }
        }
    }

    baselines
}

/// Pass 2: accumulate per-item fixation baselines from `fix{n}`-labeled rows.
pub fn compute_fixation_baselines(
    rows: &[BucketRow],
    config: &AnalysisConfig,
) -> FixationBaselines {
    let mut baselines = FixationBaselines::new();

    for row in rows {
        let WindowLabel::Fix(n) = row.window else {
            continue;
        };
        let accum = baselines
            .entry(row.sample.trial_id)
            .or_default()
            .entry(n)
            .or_default();
        if let Some(value) = config.chosen_value(row) {
            if value > 0.0 {
                accum.add(value);
            }
        }
    }

    baselines
}
