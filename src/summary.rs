//! Trial summaries
//!
//! Folds the per-bucket results into one record per trial: identity and
//! condition fields from the trial's first row, the four fixation-window
//! averages, and the pooled fix2+fix3 average.

use crate::types::{Sample, ScoredRow, TrialSummary, WindowLabel};
use crate::windows::WindowStats;
use std::collections::HashMap;

/// Build one summary record per trial, ordered by first appearance in the
/// row stream.
pub fn build_summaries(rows: &[ScoredRow], stats: &WindowStats) -> Vec<TrialSummary> {
    let mut order: Vec<i64> = Vec::new();
    let mut seeds: HashMap<i64, &Sample> = HashMap::new();

    for scored in rows {
        let trial_id = scored.row.sample.trial_id;
        if !seeds.contains_key(&trial_id) {
            order.push(trial_id);
            seeds.insert(trial_id, &scored.row.sample);
        }
    }

    order
        .into_iter()
        .map(|trial_id| {
            let sample = seeds[&trial_id];
            let windows = stats.get(&trial_id);
            let fix_avg = |n: u8| {
                windows
                    .and_then(|m| m.get(&WindowLabel::Fix(n)))
                    .and_then(|stat| stat.accum.avg())
            };

            // Pooled fix2+fix3: combined totals over combined counts, not a
            // mean of the two averages.
            let mut total = 0.0;
            let mut count = 0u32;
            for n in [2u8, 3] {
                if let Some(stat) = windows.and_then(|m| m.get(&WindowLabel::Fix(n))) {
                    total += stat.accum.total;
                    count += stat.accum.count;
                }
            }
            let fix2_fix3_avg = if count > 0 {
                Some(total / count as f64)
            } else {
                None
            };

            TrialSummary {
                subject: sample.subject.clone(),
                trial_id,
                accuracy: sample.accuracy,
                reaction_time_ms: sample.reaction_time_ms,
                category: sample.category.clone(),
                set_condition: sample.set_condition.clone(),
                position_false_shape: sample.position_false_shape.clone(),
                fix_pupil_avg: [fix_avg(1), fix_avg(2), fix_avg(3), fix_avg(4)],
                fix2_fix3_avg,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BaselineAccum, BucketRow, WindowStat};

    fn make_scored(trial: i64, subject: &str, window: WindowLabel) -> ScoredRow {
        ScoredRow {
            row: BucketRow {
                sample: Sample {
                    subject: subject.to_string(),
                    trial_id: trial,
                    accuracy: 1,
                    reaction_time_ms: 850,
                    category: "span3".to_string(),
                    set_condition: "SET".to_string(),
                    position_false_shape: "2".to_string(),
                    ..Default::default()
                },
                window,
                normalized_time_ms: 0,
                pupil_avg: Some(4.0),
                pupil_roll: None,
                member_count: 1,
            },
            trial_baseline: None,
            tepr: None,
            tepr_fix: None,
            iepr: None,
        }
    }

    fn stats_with(trial: i64, entries: &[(WindowLabel, u32, f64)]) -> WindowStats {
        let mut stats = WindowStats::new();
        let inner = stats.entry(trial).or_default();
        for &(window, count, total) in entries {
            inner.insert(
                window,
                WindowStat {
                    start: 0.0,
                    end: 0.0,
                    accum: BaselineAccum { count, total },
                },
            );
        }
        stats
    }

    #[test]
    fn test_summary_seeded_from_first_row() {
        let rows = vec![
            make_scored(7, "s01", WindowLabel::Item(1)),
            make_scored(7, "s01", WindowLabel::Fix(1)),
        ];
        let summaries = build_summaries(&rows, &WindowStats::new());

        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.subject, "s01");
        assert_eq!(summary.trial_id, 7);
        assert_eq!(summary.accuracy, 1);
        assert_eq!(summary.reaction_time_ms, 850);
        assert_eq!(summary.set_condition, "SET");
    }

    #[test]
    fn test_fixation_averages_and_pooled_average() {
        let rows = vec![make_scored(7, "s01", WindowLabel::Item(1))];
        let stats = stats_with(
            7,
            &[
                (WindowLabel::Fix(1), 2, 8.0),
                (WindowLabel::Fix(2), 1, 4.0),
                (WindowLabel::Fix(3), 3, 15.0),
            ],
        );
        let summaries = build_summaries(&rows, &stats);

        let summary = &summaries[0];
        assert_eq!(summary.fix_pupil_avg[0], Some(4.0));
        assert_eq!(summary.fix_pupil_avg[1], Some(4.0));
        assert_eq!(summary.fix_pupil_avg[2], Some(5.0));
        assert_eq!(summary.fix_pupil_avg[3], None);
        // (4.0 + 15.0) / (1 + 3), not mean(4.0, 5.0)
        assert!((summary.fix2_fix3_avg.unwrap() - 4.75).abs() < 1e-9);
    }

    #[test]
    fn test_pooled_average_unset_without_valid_samples() {
        let rows = vec![make_scored(7, "s01", WindowLabel::Item(1))];
        let stats = stats_with(
            7,
            &[
                (WindowLabel::Fix(2), 0, 0.0),
                (WindowLabel::Fix(3), 0, 0.0),
            ],
        );
        let summaries = build_summaries(&rows, &stats);

        assert_eq!(summaries[0].fix2_fix3_avg, None);
        assert_eq!(summaries[0].fix_pupil_avg, [None, None, None, None]);
    }

    #[test]
    fn test_trials_ordered_by_first_appearance() {
        let rows = vec![
            make_scored(9, "s01", WindowLabel::Item(1)),
            make_scored(3, "s01", WindowLabel::Item(1)),
            make_scored(9, "s01", WindowLabel::Fix(1)),
        ];
        let summaries = build_summaries(&rows, &WindowStats::new());

        let trials: Vec<i64> = summaries.iter().map(|s| s.trial_id).collect();
        assert_eq!(trials, vec![9, 3]);
    }
}
