/// Latest readings per device, for periodic pushes
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use time::{Duration, OffsetDateTime};

use super::extrapolate::linear_extrapolate;
use crate::models::Point;

const DEFAULT_DEPTH: usize = 2;

#[derive(Debug)]
struct Ring {
    readings: Vec<Point>,
    next: usize,
}

/// Keeps the last few readings of every device and estimates their values
/// at a common timestamp.
///
/// Safe to share between the scanner pushing readings and the task pulling them.
#[derive(Debug)]
pub struct ReadingBuffer {
    rings: RwLock<HashMap<String, Ring>>,
    depth: usize,
    extrapolation_gap: Duration,
    filter: HashSet<String>,
}

impl ReadingBuffer {
    pub fn new(extrapolation_gap: Duration) -> Self {
        Self {
            rings: RwLock::new(HashMap::new()),
            depth: DEFAULT_DEPTH,
            extrapolation_gap,
            filter: HashSet::new(),
        }
    }

    /// Only readings from these addresses are kept; empty keeps everything.
    pub fn with_filter<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filter = addresses
            .into_iter()
            .map(|a| a.as_ref().trim().to_uppercase())
            .collect();
        self
    }

    pub fn push(&self, point: Point) {
        if !self.filter.is_empty() && !self.filter.contains(&point.address.to_uppercase()) {
            return;
        }

        let mut rings = self.rings.write().unwrap_or_else(PoisonError::into_inner);
        let ring = rings.entry(point.address.clone()).or_insert_with(|| Ring {
            // Until the ring fills up, the first reading stands in for the missing ones.
            readings: vec![point.clone(); self.depth],
            next: 0,
        });
        ring.readings[ring.next] = point;
        ring.next = (ring.next + 1) % self.depth;
    }

    /// Every device's estimated reading at `timestamp`, sorted by address.
    ///
    /// Devices without two distinct readings near `timestamp` are left out.
    pub fn pull_all(&self, timestamp: OffsetDateTime) -> Vec<Point> {
        let rings = self.rings.read().unwrap_or_else(PoisonError::into_inner);
        let mut points: Vec<Point> = rings
            .values()
            .filter_map(|ring| {
                linear_extrapolate(&ring.readings, timestamp, self.extrapolation_gap).ok()
            })
            .collect();
        points.sort_by(|a, b| a.address.cmp(&b.address));
        points
    }

    pub fn len(&self) -> usize {
        self.rings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(addr: &str, secs: i64, temperature: f64) -> Point {
        Point {
            temperature,
            ..Point::new(addr, OffsetDateTime::from_unix_timestamp(secs).unwrap())
        }
    }

    #[test]
    fn needs_two_distinct_readings() {
        let buffer = ReadingBuffer::new(Duration::minutes(5));
        let at = OffsetDateTime::from_unix_timestamp(110).unwrap();

        buffer.push(reading("AA:AA:AA:AA:AA:AA", 100, 10.0));
        assert!(buffer.pull_all(at).is_empty());

        buffer.push(reading("AA:AA:AA:AA:AA:AA", 120, 30.0));
        let pulled = buffer.pull_all(at);
        assert_eq!(pulled.len(), 1);
        assert!((pulled[0].temperature - 20.0).abs() < 1e-9);
        assert_eq!(pulled[0].timestamp, at);
    }

    #[test]
    fn keeps_only_the_latest_two() {
        let buffer = ReadingBuffer::new(Duration::minutes(5));
        for (secs, temp) in [(0, 100.0), (100, 10.0), (200, 20.0)] {
            buffer.push(reading("AA:AA:AA:AA:AA:AA", secs, temp));
        }
        let at = OffsetDateTime::from_unix_timestamp(300).unwrap();
        let pulled = buffer.pull_all(at);
        assert!((pulled[0].temperature - 30.0).abs() < 1e-9);
    }

    #[test]
    fn filter_drops_other_devices() {
        let buffer = ReadingBuffer::new(Duration::minutes(5)).with_filter(["aa:aa:aa:aa:aa:aa"]);
        buffer.push(reading("AA:AA:AA:AA:AA:AA", 100, 1.0));
        buffer.push(reading("BB:BB:BB:BB:BB:BB", 100, 1.0));
        assert_eq!(buffer.len(), 1);
    }
}
