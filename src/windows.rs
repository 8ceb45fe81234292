//! Window-interval statistics and condition pools
//!
//! The third pass over the bucketed rows: a running per-trial, per-window
//! interval record (start/end timestamps plus a value accumulator), closed on
//! each window transition, and the condition-keyed pools that collect
//! encoding-phase values from correct trials.

use crate::config::AnalysisConfig;
use crate::types::{BaselineAccum, BucketRow, WindowLabel, WindowStat};
use serde::Serialize;
use std::collections::HashMap;

/// Per-trial, per-window interval aggregates.
pub type WindowStats = HashMap<i64, HashMap<WindowLabel, WindowStat>>;

/// Condition-keyed value pools fed from correct-response fixation rows.
///
/// The bias pools split `fix3` values by whether a SET was present; the
/// encoding-strategy pools split `fix2`/`fix3` SET values by category span.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConditionPools {
    pub set_bias: Vec<f64>,
    pub no_set_bias: Vec<f64>,
    pub span3_encoding: Vec<f64>,
    pub span12_encoding: Vec<f64>,
}

impl ConditionPools {
    pub fn mean_of(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

/// Pass 3: build window-interval aggregates and route values into the
/// condition pools.
pub fn compute_window_stats(
    rows: &[BucketRow],
    config: &AnalysisConfig,
) -> (WindowStats, ConditionPools) {
    let mut stats = WindowStats::new();
    let mut pools = ConditionPools::default();
    let mut prev: Option<(i64, WindowLabel, f64)> = None;

    for row in rows {
        let sample = &row.sample;

        let transition = match prev {
            Some((trial, window, _)) => trial != sample.trial_id || window != row.window,
            None => true,
        };
        if transition {
            if let Some((trial, window, ts)) = prev {
                if let Some(stat) = stats.get_mut(&trial).and_then(|m| m.get_mut(&window)) {
                    stat.end = ts;
                }
            }
            stats.entry(sample.trial_id).or_default().insert(
                row.window,
                WindowStat {
                    start: sample.timestamp_ms,
                    end: 0.0,
                    accum: BaselineAccum::default(),
                },
            );
        }

        if let Some(value) = config.chosen_value(row) {
            if value > 0.0 {
                if let Some(stat) = stats
                    .get_mut(&sample.trial_id)
                    .and_then(|m| m.get_mut(&row.window))
                {
                    stat.accum.add(value);
                }
                route_pools(&mut pools, row, value);
            }
        }

        prev = Some((sample.trial_id, row.window, sample.timestamp_ms));
    }

    // Close the stream's final open interval.
    if let Some((trial, window, ts)) = prev {
        if let Some(stat) = stats.get_mut(&trial).and_then(|m| m.get_mut(&window)) {
            stat.end = ts;
        }
    }

    (stats, pools)
}

/// Route one usable value into the bias and encoding pools.
///
/// Only correct trials contribute. The bias pools are mutually exclusive:
/// a `fix3` value goes to the SET pool when a SET was present, otherwise to
/// the noSET pool only when the false shape sat in the third position.
fn route_pools(pools: &mut ConditionPools, row: &BucketRow, value: f64) {
    if row.sample.accuracy != 1 {
        return;
    }
    let is_set = row.sample.set_condition == "SET";

    match row.window {
        WindowLabel::Fix(3) => {
            if is_set {
                pools.set_bias.push(value);
            } else if row.sample.position_false_shape == "3" {
                pools.no_set_bias.push(value);
            }
            if is_set {
                if row.sample.category == "span3" {
                    pools.span3_encoding.push(value);
                } else {
                    pools.span12_encoding.push(value);
                }
            }
        }
        WindowLabel::Fix(2) => {
            if is_set {
                if row.sample.category == "span3" {
                    pools.span3_encoding.push(value);
                } else {
                    pools.span12_encoding.push(value);
                }
            }
        }
        _ => {}
    }
}
