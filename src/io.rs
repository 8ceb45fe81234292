//! CSV ingestion and serialization
//!
//! The engine's external interface: fixed-layout CSV files in (one per
//! subject/session), a combined time-series CSV plus a per-trial summary
//! table out. Ingestion is deliberately forgiving — short rows are skipped
//! and unparseable numeric fields coerce to zero — so a single bad row never
//! aborts a run. Row order within each trial is enforced here, before the
//! core sees the samples.

use crate::config::{AnalysisConfig, PupilSource};
use crate::error::AnalysisError;
use crate::types::{Sample, ScoredRow, StimulusTag, TrialSummary};
use crate::validity::combine_eyes;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Fixed input column layout (0-based indices).
pub mod columns {
    pub const SUBJECT: usize = 2;
    pub const TET_TIME: usize = 5;
    pub const DIAMETER_PUPIL_LEFT: usize = 15;
    pub const VALIDITY_LEFT: usize = 17;
    pub const DIAMETER_PUPIL_RIGHT: usize = 22;
    pub const VALIDITY_RIGHT: usize = 24;
    pub const TRIAL_ID: usize = 25;
    pub const ACC: usize = 28;
    pub const RT: usize = 29;
    pub const CATEGORY: usize = 30;
    pub const SET_OR_NOSET: usize = 31;
    pub const TRAIN_OR_EXP: usize = 32;
    pub const POSITION_FALSE_SHAPE: usize = 33;
    pub const CURRENT_OBJECT: usize = 40;
    /// Pupil data: filtered and interpolated.
    pub const INTERP_PUPIL: usize = 41;
    /// Pupil data: filtered only.
    pub const FILTERED_PUPIL: usize = 42;
    /// Pupil data with low-validity trials removed; the upstream-validated
    /// value the analysis reads by default.
    pub const VALIDATED_PUPIL: usize = 43;

    /// Rows with fewer fields than this are malformed and skipped.
    pub const REQUIRED_FIELDS: usize = 44;
}

/// Derived column headers appended to the time-series output, in order.
pub const DERIVED_HEADERS: [&str; 8] = [
    "Window",
    "PupilAvg",
    "PupilAvgRoll",
    "TrialBaseline",
    "TEPR",
    "TEPR_fix",
    "IEPR",
    "WindowTimeNormalized",
];

/// Coerce a raw field to f64; empty, `NA`, `NaN` and garbage become 0.
///
/// Zero is neutral for the averages these fields feed, at the documented
/// cost of silently biasing toward zero on corrupt data.
pub fn lenient_f64(field: &str) -> f64 {
    let trimmed = field.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return 0.0;
    }
    trimmed.parse().unwrap_or(0.0)
}

/// Coerce a raw field to i64 under the same rules as [`lenient_f64`].
pub fn lenient_i64(field: &str) -> i64 {
    let trimmed = field.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return 0;
    }
    trimmed.parse().unwrap_or(0)
}

/// Parse a field that may legitimately be absent: empty/`NA`/`NaN` and
/// unparseable values are `None` rather than zero.
pub fn optional_f64(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return None;
    }
    trimmed.parse().ok()
}

/// Render an optional value the way the output tables expect.
pub fn na(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NA".to_string(),
    }
}

/// One parsed input file: the header row and the analyzable samples.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub headers: Vec<String>,
    pub samples: Vec<Sample>,
}

/// Read and filter one session CSV.
///
/// Keeps experimental-phase rows only (practice is dropped), skips rows
/// shorter than the required column count, and — when reading the
/// prevalidated pupil column — drops rows without a validated value,
/// matching the upstream trial-removal convention. Samples come back
/// time-ordered within each trial.
pub fn read_samples<R: Read>(
    reader: R,
    config: &AnalysisConfig,
) -> Result<RawFile, AnalysisError> {
    let mut csv_reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();

    let mut samples = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if record.len() < columns::REQUIRED_FIELDS {
            continue;
        }
        let raw: Vec<String> = record.iter().map(str::to_string).collect();

        if raw[columns::TRAIN_OR_EXP] != "Exp" {
            continue;
        }

        let validity_left = lenient_i64(&raw[columns::VALIDITY_LEFT]);
        let validity_right = lenient_i64(&raw[columns::VALIDITY_RIGHT]);
        let diameter_left = lenient_f64(&raw[columns::DIAMETER_PUPIL_LEFT]);
        let diameter_right = lenient_f64(&raw[columns::DIAMETER_PUPIL_RIGHT]);

        let pupil = match config.pupil_source {
            PupilSource::PrevalidatedColumn => {
                match optional_f64(&raw[columns::VALIDATED_PUPIL]) {
                    Some(value) => Some(value),
                    // no validated value means the row was removed upstream
                    None => continue,
                }
            }
            PupilSource::TwoEyeAverage => {
                combine_eyes(validity_left, diameter_left, validity_right, diameter_right)
            }
        };

        samples.push(Sample {
            subject: raw[columns::SUBJECT].clone(),
            trial_id: lenient_i64(&raw[columns::TRIAL_ID]),
            timestamp_ms: lenient_f64(&raw[columns::TET_TIME]),
            tag: StimulusTag::parse(&raw[columns::CURRENT_OBJECT]),
            validity_left,
            validity_right,
            diameter_left,
            diameter_right,
            accuracy: lenient_i64(&raw[columns::ACC]),
            reaction_time_ms: lenient_i64(&raw[columns::RT]),
            category: raw[columns::CATEGORY].clone(),
            set_condition: raw[columns::SET_OR_NOSET].clone(),
            phase: raw[columns::TRAIN_OR_EXP].clone(),
            position_false_shape: raw[columns::POSITION_FALSE_SHAPE].clone(),
            pupil,
            raw,
        });
    }

    enforce_time_order(&mut samples);
    Ok(RawFile { headers, samples })
}

/// Make timestamps non-decreasing within each contiguous trial segment.
///
/// The labeler and bucketer require time-ordered input per trial; rather
/// than assume it, each out-of-order segment is stably sorted in place.
/// Trial segments keep their stream order.
pub fn enforce_time_order(samples: &mut [Sample]) {
    let mut start = 0;
    while start < samples.len() {
        let trial_id = samples[start].trial_id;
        let mut end = start + 1;
        while end < samples.len() && samples[end].trial_id == trial_id {
            end += 1;
        }
        let segment = &mut samples[start..end];
        let sorted = segment
            .windows(2)
            .all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms);
        if !sorted {
            segment.sort_by(|a, b| {
                a.timestamp_ms
                    .partial_cmp(&b.timestamp_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        start = end;
    }
}

/// Streaming writer for the combined time-series table.
///
/// Writes one header row (selected original columns plus the derived
/// columns) and then rows from any number of files.
pub struct TimeSeriesWriter<W: Write> {
    writer: csv::Writer<W>,
    selection: Option<BTreeSet<usize>>,
    wrote_header: bool,
}

impl<W: Write> TimeSeriesWriter<W> {
    pub fn new(writer: W, selection: Option<BTreeSet<usize>>) -> Self {
        Self {
            writer: WriterBuilder::new().from_writer(writer),
            selection,
            wrote_header: false,
        }
    }

    fn selected<'a>(&self, fields: &'a [String]) -> Vec<&'a str> {
        fields
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                self.selection
                    .as_ref()
                    .map_or(true, |selected| selected.contains(index))
            })
            .map(|(_, field)| field.as_str())
            .collect()
    }

    /// Write the header row once; later calls are no-ops so multiple input
    /// files can share one output.
    pub fn write_headers(&mut self, headers: &[String]) -> Result<(), AnalysisError> {
        if self.wrote_header {
            return Ok(());
        }
        let mut record: Vec<&str> = self.selected(headers);
        record.extend(DERIVED_HEADERS);
        self.writer.write_record(&record)?;
        self.wrote_header = true;
        Ok(())
    }

    pub fn write_rows(&mut self, rows: &[ScoredRow]) -> Result<(), AnalysisError> {
        for scored in rows {
            let mut record: Vec<String> = self
                .selected(&scored.row.sample.raw)
                .into_iter()
                .map(str::to_string)
                .collect();
            record.push(scored.row.window.to_string());
            record.push(na(scored.row.pupil_avg));
            record.push(na(scored.row.pupil_roll));
            record.push(na(scored.trial_baseline));
            record.push(na(scored.tepr));
            record.push(na(scored.tepr_fix));
            record.push(na(scored.iepr));
            record.push(scored.row.normalized_time_ms.to_string());
            self.writer.write_record(&record)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), AnalysisError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Write the per-trial summary table.
pub fn write_summary<W: Write>(
    writer: W,
    summaries: &[TrialSummary],
) -> Result<(), AnalysisError> {
    const HEADERS: [&str; 12] = [
        "Subject",
        "Trial",
        "ACC",
        "RT",
        "Category",
        "SETornoSET",
        "Position_false_shape",
        "fix1_pupil_av",
        "fix2_pupil_av",
        "fix3_pupil_av",
        "fix4_pupil_av",
        "TEPR_Fix2Fix3avg",
    ];

    let mut csv_writer = WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(HEADERS)?;
    for summary in summaries {
        csv_writer.write_record(&[
            summary.subject.clone(),
            summary.trial_id.to_string(),
            summary.accuracy.to_string(),
            summary.reaction_time_ms.to_string(),
            summary.category.clone(),
            summary.set_condition.clone(),
            summary.position_false_shape.clone(),
            na(summary.fix_pupil_avg[0]),
            na(summary.fix_pupil_avg[1]),
            na(summary.fix_pupil_avg[2]),
            na(summary.fix_pupil_avg[3]),
            na(summary.fix2_fix3_avg),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}
