//! Two-eye validity and averaging
//!
//! Combines the per-eye pupil-diameter readings into one validated scalar per
//! sample, gated by the tracker's validity codes. Invalid input never aborts
//! processing; it yields `None` and is filtered out of averages downstream.

/// Validity code reported by the tracker for a usable reading.
pub const VALIDITY_OK: i64 = 0;

/// Validity code reported for an unusable reading.
pub const VALIDITY_BAD: i64 = 4;

/// Combine the two eyes' diameters into a single validated value.
///
/// Both eyes valid: arithmetic mean. Exactly one valid: that eye's reading.
/// Neither valid: `None`.
pub fn combine_eyes(
    validity_left: i64,
    diameter_left: f64,
    validity_right: i64,
    diameter_right: f64,
) -> Option<f64> {
    match (validity_left == VALIDITY_OK, validity_right == VALIDITY_OK) {
        (true, true) => Some((diameter_left + diameter_right) / 2.0),
        (true, false) => Some(diameter_left),
        (false, true) => Some(diameter_right),
        (false, false) => None,
    }
}

/// Whether at least one eye produced a usable reading.
pub fn has_valid_eye(validity_left: i64, validity_right: i64) -> bool {
    validity_left == VALIDITY_OK || validity_right == VALIDITY_OK
}
