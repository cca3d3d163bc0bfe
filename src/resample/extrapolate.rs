use std::collections::HashSet;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use super::interpolate;
use crate::models::Point;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ExtrapolationError {
    #[error("need at least 2 points with unique timestamps within the extrapolation gap")]
    InsufficientPoints,
}

/// Estimates the reading at `want` from the two samples nearest to it.
///
/// Only samples within `max_gap` of `want` (inclusive) are considered, and
/// of several samples sharing a timestamp only the first is used. Equally
/// distant candidates keep their input order. The address is taken from the
/// earlier of the two chosen samples.
pub fn linear_extrapolate(
    points: &[Point],
    want: OffsetDateTime,
    max_gap: Duration,
) -> Result<Point, ExtrapolationError> {
    let want_ns = want.unix_timestamp_nanos();
    let gap_ns = max_gap.whole_nanoseconds().abs();

    let mut seen = HashSet::new();
    let mut candidates: Vec<(i128, &Point)> = points
        .iter()
        .map(|p| (p.timestamp.unix_timestamp_nanos(), p))
        .filter(|(ts, _)| (ts - want_ns).abs() <= gap_ns)
        .filter(|(ts, _)| seen.insert(*ts))
        .collect();

    if candidates.len() < 2 {
        return Err(ExtrapolationError::InsufficientPoints);
    }

    candidates.sort_by_key(|(ts, _)| (want_ns - ts).abs());

    let (mut a, mut b) = (candidates[0], candidates[1]);
    if b.0 < a.0 {
        std::mem::swap(&mut a, &mut b);
    }

    let coeff = (want_ns - a.0) as f64 / (b.0 - a.0) as f64;
    Ok(interpolate(a.1, b.1, coeff, want))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn p(addr: &str, secs: i64, temperature: f64) -> Point {
        Point {
            temperature,
            ..Point::new(addr, at(secs))
        }
    }

    #[test]
    fn interpolates_between_neighbours() {
        let got = linear_extrapolate(
            &[p("A", 100, 10.0), p("A", 200, 20.0)],
            at(150),
            Duration::minutes(5),
        )
        .unwrap();
        assert_eq!(got.timestamp, at(150));
        assert!((got.temperature - 15.0).abs() < 1e-9);
    }

    #[test]
    fn extrapolates_past_the_newest_sample() {
        let got = linear_extrapolate(
            &[p("A", 200, 20.0), p("A", 100, 10.0)],
            at(250),
            Duration::minutes(5),
        )
        .unwrap();
        assert!((got.temperature - 25.0).abs() < 1e-9);
    }

    #[test]
    fn uses_the_two_nearest_samples() {
        let points = [
            p("A", 0, 0.0),
            p("A", 90, 100.0),
            p("B", 110, 200.0),
            p("A", 200, 1000.0),
        ];
        let got = linear_extrapolate(&points, at(100), Duration::minutes(5)).unwrap();
        assert!((got.temperature - 150.0).abs() < 1e-9);
        assert_eq!(got.address, "A");
    }

    #[test]
    fn duplicate_timestamps_count_once() {
        let err = linear_extrapolate(
            &[p("A", 100, 1.0), p("A", 100, 2.0)],
            at(100),
            Duration::minutes(5),
        )
        .unwrap_err();
        assert_eq!(err, ExtrapolationError::InsufficientPoints);
    }

    #[test]
    fn samples_outside_gap_are_ignored() {
        let points = [p("A", 0, 0.0), p("A", 1_000, 1.0)];
        assert_eq!(
            linear_extrapolate(&points, at(1_000), Duration::seconds(999)),
            Err(ExtrapolationError::InsufficientPoints)
        );
        assert!(linear_extrapolate(&points, at(1_000), Duration::seconds(1_000)).is_ok());
    }
}
