use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

use super::interpolate;
use crate::models::Point;

/// Resamples each address onto a grid of `resolution`-spaced timestamps.
///
/// Output points are grouped by address (ascending) and ordered in time within
/// a group. A grid timestamp is emitted only when a raw point sits exactly on
/// it, or when it lies between two neighbours at most `max_gap` apart. A
/// non-positive `resolution` returns the input unchanged.
pub fn resample(points: &[Point], resolution: Duration, max_gap: Duration) -> Vec<Point> {
    if !resolution.is_positive() {
        return points.to_vec();
    }
    resample_by_address(points, resolution, max_gap)
        .into_values()
        .flatten()
        .collect()
}

pub fn resample_by_address(
    points: &[Point],
    resolution: Duration,
    max_gap: Duration,
) -> BTreeMap<String, Vec<Point>> {
    let mut series: BTreeMap<String, Vec<Point>> = BTreeMap::new();
    for point in points {
        series
            .entry(point.address.clone())
            .or_default()
            .push(point.clone());
    }
    for raw in series.values_mut() {
        raw.sort_by_key(|p| p.timestamp);
    }

    if !resolution.is_positive() {
        return series;
    }

    let (resolution, max_gap) = (resolution.whole_nanoseconds(), max_gap.whole_nanoseconds());
    series
        .into_iter()
        .map(|(addr, raw)| (addr, align_series(&raw, resolution, max_gap)))
        .filter(|(_, aligned)| !aligned.is_empty())
        .collect()
}

/// Two-pointer walk over time-sorted `raw` points; all arithmetic in nanoseconds.
fn align_series(raw: &[Point], resolution: i128, max_gap: i128) -> Vec<Point> {
    let mut aligned = Vec::new();
    let (Some(first), Some(last)) = (raw.first(), raw.last()) else {
        return aligned;
    };

    let ts = |p: &Point| p.timestamp.unix_timestamp_nanos();
    let max_ts = ts(last);
    let mut out_ts = ts(first) - ts(first).rem_euclid(resolution);
    let mut i = 0;

    while out_ts <= max_ts {
        let left = &raw[i];
        let right = raw.get(i + 1);
        let left_ts = ts(left);

        // No data yet at this grid point.
        if out_ts < left_ts {
            out_ts += resolution;
            continue;
        }

        // Grid point lies beyond the current pair.
        if right.is_some_and(|r| ts(r) < out_ts) {
            i += 1;
            continue;
        }

        if left_ts == out_ts {
            aligned.push(left.clone());
            out_ts += resolution;
            continue;
        }

        let Some(right) = right else {
            break;
        };

        let right_ts = ts(right);
        if right_ts - left_ts > max_gap {
            i += 1;
            continue;
        }

        let Ok(at) = OffsetDateTime::from_unix_timestamp_nanos(out_ts) else {
            break;
        };
        let coeff = (out_ts - left_ts) as f64 / (right_ts - left_ts) as f64;
        aligned.push(interpolate(left, right, coeff, at));
        out_ts += resolution;
    }

    aligned
}
