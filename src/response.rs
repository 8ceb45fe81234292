//! Evoked-response derivation
//!
//! The final pass over the bucketed rows: with the trial and fixation
//! baseline maps finalized, each row receives its baseline-relative response
//! metrics. A missing baseline never aborts anything; the corresponding
//! metric is simply left unset.

use crate::baseline::{FixationBaselines, TrialBaselines};
use crate::config::AnalysisConfig;
use crate::types::{BucketRow, ScoredRow};

/// Pass 4: annotate every bucket row with TEPR, TEPR_fix and IEPR.
///
/// - `TEPR` subtracts the trial's item1-window baseline.
/// - `TEPR_fix` subtracts the trial's fix1 baseline.
/// - `IEPR` subtracts the fixation baseline preceding the row's item,
///   falling back to the same item's fixation when no preceding one exists.
///
/// The trial baseline average is copied onto every row of the trial whenever
/// it is defined, independent of the row's own value.
pub fn derive_responses(
    rows: Vec<BucketRow>,
    trial_baselines: &TrialBaselines,
    fixation_baselines: &FixationBaselines,
    config: &AnalysisConfig,
) -> Vec<ScoredRow> {
    rows.into_iter()
        .map(|row| {
            let trial_id = row.sample.trial_id;
            let trial_baseline = trial_baselines.get(&trial_id).and_then(|b| b.avg());
            let fix_avg = |index: u8| {
                fixation_baselines
                    .get(&trial_id)
                    .and_then(|m| m.get(&index))
                    .and_then(|b| b.avg())
            };

            let value = config.chosen_value(&row).filter(|v| *v > 0.0);
            let item = row.window.item_index();

            let tepr = match (value, trial_baseline) {
                (Some(v), Some(baseline)) => Some(v - baseline),
                _ => None,
            };
            let tepr_fix = value.and_then(|v| fix_avg(1).map(|baseline| v - baseline));
            let iepr = value.and_then(|v| {
                // item 1 has no preceding fixation; fix_avg(0) is always None
                fix_avg(item.wrapping_sub(1))
                    .or_else(|| fix_avg(item))
                    .map(|baseline| v - baseline)
            });

            ScoredRow {
                row,
                trial_baseline,
                tepr,
                tepr_fix,
                iepr,
            }
        })
        .collect()
}
