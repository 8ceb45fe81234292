//! Window labeling
//!
//! Walks the per-trial sample stream and classifies each sample's stimulus
//! tag into a semantic window. Labeling is a two-pass process: a forward pass
//! records when each object first appears within its trial (the interval
//! map), then a second pass assigns the final label from the sample's elapsed
//! time since its own object's first appearance.

use crate::types::{LabeledSample, Sample, StimulusTag, WindowLabel};
use std::collections::HashMap;

/// Item presentation length in milliseconds.
pub const ITEM_DURATION_MS: f64 = 1000.0;

/// End of the post-item fixation sub-window, relative to item onset.
pub const FIX_END_MS: f64 = 1500.0;

/// First-appearance interval of one stimulus object within one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectInterval {
    pub start: f64,
    pub end: f64,
}

/// Per-(trial, tag) first-appearance intervals.
pub type IntervalMap = HashMap<(i64, StimulusTag), ObjectInterval>;

/// Window labeler for assigning semantic windows to raw samples
pub struct WindowLabeler;

impl WindowLabeler {
    /// Label all item-tag samples; fixation, feedback and unknown tags are
    /// dropped from the output.
    pub fn label(samples: &[Sample]) -> Vec<LabeledSample> {
        let intervals = build_intervals(samples);
        assign_labels(samples, &intervals)
    }
}

/// Forward pass: record each object's first-appearance interval per trial.
///
/// Fixation and feedback samples participate here even though they are never
/// labeled: their transitions are what close the surrounding item intervals.
pub fn build_intervals(samples: &[Sample]) -> IntervalMap {
    let mut intervals = IntervalMap::new();
    let mut prev: Option<(i64, StimulusTag, f64)> = None;

    for sample in samples {
        let Some(tag) = sample.tag else { continue };

        let transition = match prev {
            Some((trial, prev_tag, _)) => trial != sample.trial_id || prev_tag != tag,
            None => true,
        };
        if transition {
            if let Some((trial, prev_tag, prev_ts)) = prev {
                if let Some(interval) = intervals.get_mut(&(trial, prev_tag)) {
                    interval.end = prev_ts;
                }
            }
            intervals.insert(
                (sample.trial_id, tag),
                ObjectInterval {
                    start: sample.timestamp_ms,
                    end: 0.0,
                },
            );
        }
        prev = Some((sample.trial_id, tag, sample.timestamp_ms));
    }

    // Close the stream's final open interval.
    if let Some((trial, tag, ts)) = prev {
        if let Some(interval) = intervals.get_mut(&(trial, tag)) {
            interval.end = ts;
        }
    }

    intervals
}

/// Second pass: assign the final window from elapsed time since the sample's
/// own object first appeared.
fn assign_labels(samples: &[Sample], intervals: &IntervalMap) -> Vec<LabeledSample> {
    let mut labeled = Vec::new();

    for sample in samples {
        let Some(tag) = sample.tag else { continue };
        let Some(n) = tag.item_index() else { continue };
        let Some(interval) = intervals.get(&(sample.trial_id, tag)) else {
            continue;
        };

        let elapsed = sample.timestamp_ms - interval.start;
        let window = if elapsed < ITEM_DURATION_MS {
            WindowLabel::Item(n)
        } else if elapsed < FIX_END_MS {
            WindowLabel::Fix(n)
        } else if n == 4 {
            WindowLabel::Response
        } else {
            WindowLabel::Fix(n)
        };

        labeled.push(LabeledSample {
            sample: sample.clone(),
            window,
        });
    }

    labeled
}
