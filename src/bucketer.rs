//! Time bucketing
//!
//! Re-keys elapsed-time-within-trial onto a fixed grid and merges contiguous
//! runs of labeled samples sharing `(trial, window, tag, grid time)` into one
//! bucket per run. This is a strictly sequential merge: two samples with
//! identical keys separated by a differently-keyed sample are never merged.
//! In rolling mode a trailing FIFO buffer additionally produces a rolling
//! mean that is assigned to each bucket once the buffer spans the configured
//! window.

use crate::config::AnalysisConfig;
use crate::types::{BucketRow, LabeledSample};
use std::collections::VecDeque;

/// Round a millisecond offset onto the bucket grid (half away from zero).
pub fn round_to_nearest(value_ms: f64, step_ms: u32) -> i64 {
    let step = step_ms as f64;
    (step * (value_ms / step).round()) as i64
}

/// Time bucketer for collapsing labeled samples onto the grid
pub struct TimeBucketer;

impl TimeBucketer {
    /// Collapse labeled samples into bucket rows.
    ///
    /// With bucketing disabled each sample becomes its own row; normalized
    /// time is still computed so downstream passes see a uniform shape.
    pub fn bucketize(labeled: &[LabeledSample], config: &AnalysisConfig) -> Vec<BucketRow> {
        if !config.bucketing_enabled {
            return passthrough(labeled, config);
        }

        let mut out: Vec<BucketRow> = Vec::new();
        let mut run: Option<Run> = None;
        let mut rolling = if config.use_rolling_average {
            Some(RollingState::default())
        } else {
            None
        };
        let mut trial_start = 0.0;
        let mut prev_trial: Option<i64> = None;

        for ls in labeled {
            let sample = &ls.sample;

            if prev_trial != Some(sample.trial_id) {
                // Trial boundary: buckets never span trials, the elapsed-time
                // reference restarts, and pending buckets from the previous
                // trial keep no rolling value rather than borrowing the next
                // trial's first computation.
                if let Some(finished) = run.take() {
                    emit(&mut out, finished, config, rolling.as_mut());
                }
                if let Some(roll) = rolling.as_mut() {
                    roll.reset_for_trial();
                }
                trial_start = sample.timestamp_ms;
                prev_trial = Some(sample.trial_id);
            }

            let norm = round_to_nearest(sample.timestamp_ms - trial_start, config.time_step_ms);

            let same_run = run.as_ref().map_or(false, |r| {
                r.normalized_time_ms == norm
                    && r.head.window == ls.window
                    && r.head.sample.tag == sample.tag
            });
            if !same_run {
                if let Some(finished) = run.take() {
                    emit(&mut out, finished, config, rolling.as_mut());
                }
                run = Some(Run {
                    head: ls.clone(),
                    normalized_time_ms: norm,
                    values: Vec::new(),
                });
            }
            if let Some(r) = run.as_mut() {
                r.values.push(sample.pupil);
            }

            if let Some(roll) = rolling.as_mut() {
                if let Some(v) = config.invalid_policy.numeric(sample.pupil) {
                    roll.buffer.push_back((norm, v));
                }
            }
        }

        if let Some(finished) = run.take() {
            emit(&mut out, finished, config, rolling.as_mut());
        }

        out
    }
}

/// An open run of contiguous same-key samples.
struct Run {
    head: LabeledSample,
    normalized_time_ms: i64,
    values: Vec<Option<f64>>,
}

/// Trailing rolling-average state: the FIFO value buffer plus the indices of
/// emitted buckets still waiting for a rolling value.
#[derive(Default)]
struct RollingState {
    buffer: VecDeque<(i64, f64)>,
    pending: Vec<usize>,
}

impl RollingState {
    fn reset_for_trial(&mut self) {
        self.buffer.clear();
        self.pending.clear();
    }

    /// If the buffer spans the rolling window, average the entries within
    /// the span (measured back from the newest entry), assign that value to
    /// every pending bucket, and evict entries older than the span.
    fn try_assign(&mut self, rows: &mut [BucketRow], window_ms: u32) {
        let (first, last) = match (self.buffer.front(), self.buffer.back()) {
            (Some(&(first, _)), Some(&(last, _))) => (first, last),
            _ => return,
        };
        if last - first < window_ms as i64 {
            return;
        }

        self.buffer.retain(|&(t, _)| last - t <= window_ms as i64);
        let sum: f64 = self.buffer.iter().map(|&(_, v)| v).sum();
        let avg = sum / self.buffer.len() as f64;

        for &index in &self.pending {
            rows[index].pupil_roll = Some(avg);
        }
        self.pending.clear();
    }
}

/// Close a run into a bucket row and, in rolling mode, fold it into the
/// rolling bookkeeping.
fn emit(
    out: &mut Vec<BucketRow>,
    run: Run,
    config: &AnalysisConfig,
    rolling: Option<&mut RollingState>,
) {
    let contributing: Vec<f64> = run
        .values
        .iter()
        .filter_map(|&v| config.invalid_policy.numeric(v))
        .collect();
    let pupil_avg = if contributing.is_empty() {
        None
    } else {
        Some(contributing.iter().sum::<f64>() / contributing.len() as f64)
    };

    out.push(BucketRow {
        sample: run.head.sample,
        window: run.head.window,
        normalized_time_ms: run.normalized_time_ms,
        pupil_avg,
        pupil_roll: None,
        member_count: run.values.len() as u32,
    });

    if let Some(roll) = rolling {
        roll.pending.push(out.len() - 1);
        roll.try_assign(out, config.rolling_window_ms);
    }
}

/// One row per labeled sample, no merging, no rolling.
fn passthrough(labeled: &[LabeledSample], config: &AnalysisConfig) -> Vec<BucketRow> {
    let mut out = Vec::with_capacity(labeled.len());
    let mut trial_start = 0.0;
    let mut prev_trial: Option<i64> = None;

    for ls in labeled {
        let sample = &ls.sample;
        if prev_trial != Some(sample.trial_id) {
            trial_start = sample.timestamp_ms;
            prev_trial = Some(sample.trial_id);
        }
        out.push(BucketRow {
            sample: sample.clone(),
            window: ls.window,
            normalized_time_ms: round_to_nearest(
                sample.timestamp_ms - trial_start,
                config.time_step_ms,
            ),
            pupil_avg: config.invalid_policy.numeric(sample.pupil),
            pupil_roll: None,
            member_count: 1,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InvalidSamplePolicy;
    use crate::types::{Sample, StimulusTag, WindowLabel};

    fn make_labeled(
        trial: i64,
        ts: f64,
        tag: StimulusTag,
        window: WindowLabel,
        pupil: Option<f64>,
    ) -> LabeledSample {
        LabeledSample {
            sample: Sample {
                trial_id: trial,
                timestamp_ms: ts,
                tag: Some(tag),
                pupil,
                ..Default::default()
            },
            window,
        }
    }

    fn item1(trial: i64, ts: f64, pupil: Option<f64>) -> LabeledSample {
        make_labeled(trial, ts, StimulusTag::FirstItem, WindowLabel::Item(1), pupil)
    }

    #[test]
    fn test_round_to_nearest() {
        assert_eq!(round_to_nearest(0.0, 50), 0);
        assert_eq!(round_to_nearest(24.0, 50), 0);
        assert_eq!(round_to_nearest(25.0, 50), 50);
        assert_eq!(round_to_nearest(74.9, 50), 50);
        assert_eq!(round_to_nearest(130.0, 50), 150);
        assert_eq!(round_to_nearest(130.0, 20), 140);
    }

    #[test]
    fn test_on_grid_samples_stay_separate() {
        let labeled = vec![item1(7, 0.0, Some(4.0)), item1(7, 50.0, Some(4.2))];
        let rows = TimeBucketer::bucketize(&labeled, &AnalysisConfig::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].normalized_time_ms, 0);
        assert_eq!(rows[1].normalized_time_ms, 50);
        assert_eq!(rows[0].pupil_avg, Some(4.0));
        assert_eq!(rows[1].pupil_avg, Some(4.2));
    }

    #[test]
    fn test_same_grid_time_merges() {
        let labeled = vec![
            item1(7, 0.0, Some(4.0)),
            item1(7, 10.0, Some(4.2)),
            item1(7, 20.0, Some(4.4)),
        ];
        let rows = TimeBucketer::bucketize(&labeled, &AnalysisConfig::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].normalized_time_ms, 0);
        assert_eq!(rows[0].member_count, 3);
        assert!((rows[0].pupil_avg.unwrap() - 4.2).abs() < 1e-9);
    }

    #[test]
    fn test_merge_is_sequential_not_group_by() {
        // A differently-keyed sample in between splits identically keyed
        // neighbors into separate buckets.
        let labeled = vec![
            item1(7, 0.0, Some(4.0)),
            make_labeled(7, 10.0, StimulusTag::FirstItem, WindowLabel::Fix(1), Some(5.0)),
            item1(7, 20.0, Some(4.4)),
        ];
        let rows = TimeBucketer::bucketize(&labeled, &AnalysisConfig::default());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].pupil_avg, Some(4.0));
        assert_eq!(rows[2].pupil_avg, Some(4.4));
    }

    #[test]
    fn test_member_count_conservation() {
        let labeled = vec![
            item1(7, 0.0, Some(4.0)),
            item1(7, 10.0, None),
            item1(7, 60.0, Some(4.1)),
            item1(8, 500.0, Some(4.3)),
            item1(8, 510.0, Some(4.5)),
        ];
        let rows = TimeBucketer::bucketize(&labeled, &AnalysisConfig::default());

        let total: u32 = rows.iter().map(|r| r.member_count).sum();
        assert_eq!(total as usize, labeled.len());
    }

    #[test]
    fn test_invalid_policy_exclude_vs_sentinel() {
        let labeled = vec![item1(7, 0.0, Some(4.0)), item1(7, 10.0, None)];

        let exclude = AnalysisConfig::default();
        let rows = TimeBucketer::bucketize(&labeled, &exclude);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pupil_avg, Some(4.0));

        let compat = AnalysisConfig {
            invalid_policy: InvalidSamplePolicy::SentinelCompat,
            ..Default::default()
        };
        let rows = TimeBucketer::bucketize(&labeled, &compat);
        // (4.0 + -1.0) / 2
        assert!((rows[0].pupil_avg.unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_all_invalid_run_has_no_value() {
        let labeled = vec![item1(7, 0.0, None), item1(7, 10.0, None)];
        let rows = TimeBucketer::bucketize(&labeled, &AnalysisConfig::default());

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pupil_avg, None);
        assert_eq!(rows[0].member_count, 2);
    }

    #[test]
    fn test_trial_boundary_resets_time_reference() {
        let labeled = vec![item1(7, 1000.0, Some(4.0)), item1(8, 9000.0, Some(4.2))];
        let rows = TimeBucketer::bucketize(&labeled, &AnalysisConfig::default());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].normalized_time_ms, 0);
        assert_eq!(rows[1].normalized_time_ms, 0);
    }

    #[test]
    fn test_idempotent_on_single_sample_buckets() {
        let labeled = vec![
            item1(7, 0.0, Some(4.0)),
            item1(7, 50.0, Some(4.2)),
            item1(7, 100.0, Some(4.4)),
        ];
        let config = AnalysisConfig::default();
        let first = TimeBucketer::bucketize(&labeled, &config);

        // Feed the buckets back through: every bucket maps to itself.
        let again: Vec<LabeledSample> = first
            .iter()
            .map(|r| LabeledSample {
                sample: Sample {
                    pupil: r.pupil_avg,
                    ..r.sample.clone()
                },
                window: r.window,
            })
            .collect();
        let second = TimeBucketer::bucketize(&again, &config);

        assert_eq!(second.len(), first.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.normalized_time_ms, b.normalized_time_ms);
            assert_eq!(a.pupil_avg, b.pupil_avg);
        }
    }

    fn rolling_config() -> AnalysisConfig {
        AnalysisConfig {
            use_rolling_average: true,
            rolling_window_ms: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_rolling_assigned_once_span_reached() {
        let labeled = vec![
            item1(7, 0.0, Some(1.0)),
            item1(7, 50.0, Some(2.0)),
            item1(7, 100.0, Some(3.0)),
            item1(7, 150.0, Some(4.0)),
        ];
        let rows = TimeBucketer::bucketize(&labeled, &rolling_config());

        assert_eq!(rows.len(), 4);
        // Buffer first spans 100 ms when the bucket at t=100 is emitted:
        // mean(1, 2, 3) = 2 covers the first three buckets.
        for row in &rows[..3] {
            assert!((row.pupil_roll.unwrap() - 2.0).abs() < 1e-9);
        }
        // The final bucket is covered by mean(2, 3, 4) after eviction.
        assert!((rows[3].pupil_roll.unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_trailing_buckets_stay_unset_below_span() {
        let labeled = vec![item1(7, 0.0, Some(1.0)), item1(7, 50.0, Some(2.0))];
        let rows = TimeBucketer::bucketize(&labeled, &rolling_config());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pupil_roll, None);
        assert_eq!(rows[1].pupil_roll, None);
    }

    #[test]
    fn test_rolling_does_not_leak_across_trials() {
        let labeled = vec![
            item1(7, 0.0, Some(1.0)),
            item1(7, 50.0, Some(2.0)),
            item1(8, 5000.0, Some(8.0)),
            item1(8, 5050.0, Some(8.0)),
            item1(8, 5100.0, Some(8.0)),
            item1(8, 5150.0, Some(8.0)),
        ];
        let rows = TimeBucketer::bucketize(&labeled, &rolling_config());

        // Trial 7's buckets never reached the span and stay unset; the
        // boundary must not hand them trial 8's first rolling value.
        assert_eq!(rows[0].pupil_roll, None);
        assert_eq!(rows[1].pupil_roll, None);
        assert!((rows[2].pupil_roll.unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_coverage_spans_window() {
        // Whenever a rolling value is emitted the contributing entries span
        // at least the configured window.
        let labeled: Vec<LabeledSample> = (0..8)
            .map(|i| item1(7, i as f64 * 30.0, Some(i as f64)))
            .collect();
        let config = AnalysisConfig {
            use_rolling_average: true,
            rolling_window_ms: 90,
            time_step_ms: 30,
            ..Default::default()
        };
        let rows = TimeBucketer::bucketize(&labeled, &config);

        assert!(rows.iter().any(|r| r.pupil_roll.is_some()));
        // Every assigned value is a mean over entries 90 ms apart or closer,
        // so it can never exceed the max of the last four values seen.
        for row in &rows {
            if let Some(roll) = row.pupil_roll {
                assert!(roll >= 0.0 && roll <= 7.0);
            }
        }
    }

    #[test]
    fn test_passthrough_when_bucketing_disabled() {
        let labeled = vec![
            item1(7, 0.0, Some(4.0)),
            item1(7, 10.0, Some(4.2)),
            item1(7, 20.0, None),
        ];
        let config = AnalysisConfig {
            bucketing_enabled: false,
            ..Default::default()
        };
        let rows = TimeBucketer::bucketize(&labeled, &config);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].pupil_avg, Some(4.0));
        assert_eq!(rows[1].pupil_avg, Some(4.2));
        assert_eq!(rows[2].pupil_avg, None);
        assert_eq!(rows[1].normalized_time_ms, 0);
        assert!(rows.iter().all(|r| r.member_count == 1));
    }
}
