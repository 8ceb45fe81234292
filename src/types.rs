//! Core types for the pupilcourse pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw samples, labeled samples, time buckets, scored rows, and the
//! per-trial summary records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stimulus-object tag as recorded by the eye tracker.
///
/// Only these six tags participate in processing; anything else in the raw
/// `CurrentObject` field is excluded from labeling and analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusTag {
    Fixation,
    FirstItem,
    SecondItem,
    ThirdItem,
    FourthItem,
    Feedback,
}

impl StimulusTag {
    /// Parse a raw tag case-insensitively.
    ///
    /// The third item is spelled `thirditems` (plural) in the recordings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "fixation" => Some(StimulusTag::Fixation),
            "firstitem" => Some(StimulusTag::FirstItem),
            "seconditem" => Some(StimulusTag::SecondItem),
            "thirditems" => Some(StimulusTag::ThirdItem),
            "fourthitem" => Some(StimulusTag::FourthItem),
            "feedback" => Some(StimulusTag::Feedback),
            _ => None,
        }
    }

    /// Item position (1-4) for the item tags, `None` for fixation/feedback.
    pub fn item_index(&self) -> Option<u8> {
        match self {
            StimulusTag::FirstItem => Some(1),
            StimulusTag::SecondItem => Some(2),
            StimulusTag::ThirdItem => Some(3),
            StimulusTag::FourthItem => Some(4),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusTag::Fixation => "fixation",
            StimulusTag::FirstItem => "firstitem",
            StimulusTag::SecondItem => "seconditem",
            StimulusTag::ThirdItem => "thirditems",
            StimulusTag::FourthItem => "fourthitem",
            StimulusTag::Feedback => "feedback",
        }
    }
}

/// Semantic experimental window assigned to a sample.
///
/// Labels are derived from the stimulus tag plus elapsed time since the tag's
/// first appearance, not from the tag alone: a `firstitem` sample may sit in
/// `item1` (first 1000 ms) or `fix1` (1000-1500 ms). The fourth object's tail
/// past 1500 ms is the terminal `response` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowLabel {
    Item(u8),
    Fix(u8),
    Response,
}

impl WindowLabel {
    /// Item position this window belongs to; `Response` is positionally
    /// part of the fourth object.
    pub fn item_index(&self) -> u8 {
        match self {
            WindowLabel::Item(n) | WindowLabel::Fix(n) => *n,
            WindowLabel::Response => 4,
        }
    }

    pub fn is_fix(&self) -> bool {
        matches!(self, WindowLabel::Fix(_))
    }
}

impl fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowLabel::Item(n) => write!(f, "item{}", n),
            WindowLabel::Fix(n) => write!(f, "fix{}", n),
            WindowLabel::Response => write!(f, "response"),
        }
    }
}

/// One raw instrument reading.
///
/// Validity is carried as a tagged state: `pupil` is `None` when neither eye
/// produced usable data, never a numeric sentinel. Trial-constant metadata
/// (subject, accuracy, RT, condition flags) rides along on every sample and
/// is read off the first row of each trial when summaries are built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sample {
    pub subject: String,
    pub trial_id: i64,
    /// Raw instrument timestamp in milliseconds, monotonic within a trial.
    pub timestamp_ms: f64,
    pub tag: Option<StimulusTag>,
    pub validity_left: i64,
    pub validity_right: i64,
    pub diameter_left: f64,
    pub diameter_right: f64,
    pub accuracy: i64,
    pub reaction_time_ms: i64,
    pub category: String,
    pub set_condition: String,
    pub phase: String,
    pub position_false_shape: String,
    /// Validated pupil diameter, `None` when no eye had valid data.
    pub pupil: Option<f64>,
    /// Original CSV fields, retained for column pass-through on output.
    #[serde(default)]
    pub raw: Vec<String>,
}

/// A sample with its assigned experimental window.
///
/// Fixation, feedback and unknown-tag samples never become labeled samples;
/// they are dropped between labeling and bucketing.
#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub sample: Sample,
    pub window: WindowLabel,
}

/// One time-grid-aligned aggregation unit within a trial/window.
///
/// Produced by merging a contiguous run of labeled samples sharing
/// `(trial, window, tag, normalized_time_ms)`. The representative `sample`
/// is the first member of the run.
#[derive(Debug, Clone)]
pub struct BucketRow {
    pub sample: Sample,
    pub window: WindowLabel,
    /// Elapsed time from trial start, rounded onto the bucket grid.
    pub normalized_time_ms: i64,
    /// Mean validated pupil value of the run's contributing members.
    pub pupil_avg: Option<f64>,
    /// Trailing rolling mean, populated only in rolling mode.
    pub pupil_roll: Option<f64>,
    /// Number of samples merged into this bucket.
    pub member_count: u32,
}

/// A bucket row annotated with baseline-relative response metrics.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row: BucketRow,
    /// Trial-level (item1 window) baseline average, copied onto every row.
    pub trial_baseline: Option<f64>,
    /// Task-evoked pupil response: value minus the trial baseline.
    pub tepr: Option<f64>,
    /// Value minus the trial's fix1 baseline.
    pub tepr_fix: Option<f64>,
    /// Item-evoked pupil response: value minus the preceding fixation
    /// baseline (same-item fixation as fallback).
    pub iepr: Option<f64>,
}

/// Accumulate-then-finalize scalar aggregate.
///
/// The average is undefined (reported as `NA`) while `count` is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineAccum {
    pub count: u32,
    pub total: f64,
}

impl BaselineAccum {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
    }

    pub fn avg(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total / self.count as f64)
        }
    }
}

/// Running per-window interval aggregate: time extent plus value accumulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowStat {
    pub start: f64,
    pub end: f64,
    pub accum: BaselineAccum,
}

/// One record per trial: identity and condition fields copied verbatim from
/// the trial's first row, plus the finalized fixation averages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialSummary {
    pub subject: String,
    pub trial_id: i64,
    pub accuracy: i64,
    pub reaction_time_ms: i64,
    pub category: String,
    pub set_condition: String,
    pub position_false_shape: String,
    /// Average pupil value per fixation window (`fix1`..`fix4`).
    pub fix_pupil_avg: [Option<f64>; 4],
    /// Pooled fix2+fix3 average: combined totals over combined counts.
    pub fix2_fix3_avg: Option<f64>,
}
