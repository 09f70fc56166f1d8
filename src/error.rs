use thiserror::Error;

/// Failures that abort an aggregation run.
///
/// Rows without a FIPS code and conflicting county labels are recovered
/// locally and only show up in [`crate::models::AggregationStats`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// `Enrolled` held something other than a non-negative integer or the
    /// suppression marker.
    #[error("row {row}: malformed Enrolled value {value:?} (FIPS {fips})")]
    MalformedEnrollment {
        row: usize,
        fips: String,
        value: String,
    },
    /// Summed enrollment for a group no longer fits in a `u64`. `fips` is the
    /// row that tipped it over, empty when that row has no FIPS code.
    #[error("enrollment for {group:?} overflows at FIPS {fips:?}")]
    EnrollmentOverflow { fips: String, group: String },
}
