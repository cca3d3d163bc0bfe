/// Transactions against the store: points, aliases and retention
use log::{error, info, warn};
use redb::{Database, ReadableTable, TableError, TableHandle};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

use super::connection::open_with_retry;
use super::error::{Result, StorageError};
use super::keys::{
    reverse_key, window_prefix, PointKey, WindowSpec, POINT_KEY_LEN, WINDOW_PREFIX_LEN,
};
use super::schema::{self, SchemaVersion, ALIASES_TABLE, POINTS_TABLE};
use super::StoreOptions;
use crate::codec::{decode_point, encode_point};
use crate::models::Point;

/// Points returned by a range query, plus the entries that could not be decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointsQuery {
    pub points: Vec<Point>,
    pub warnings: Vec<String>,
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionSweep {
    pub windows: usize,
    pub points: usize,
}

/// Synchronous access to an open store.
///
/// Owned by exactly one [`StorageEngine`](super::StorageEngine) in a running
/// service; used directly by tools and tests.
pub struct Store {
    db: Database,
    window: WindowSpec,
    detected: SchemaVersion,
}

impl Store {
    /// Opens the store and brings its schema to the current version.
    pub fn open(options: &StoreOptions) -> Result<Self> {
        let window = WindowSpec::new(options.window_size)?;
        let db = open_with_retry(&options.path, options.lock_timeout)?;
        let detected = schema::initialize(&db, &window, options.allow_rewrite)?;
        Ok(Self {
            db,
            window,
            detected,
        })
    }

    /// Schema version found on disk before initialisation.
    pub fn detected_version(&self) -> SchemaVersion {
        self.detected
    }

    pub fn window(&self) -> &WindowSpec {
        &self.window
    }

    /// Writes all points in one transaction; any invalid point rejects the batch.
    pub fn push_points(&self, points: &[Point]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS_TABLE)?;
            for point in points {
                let value = encode_point(point)?;
                let key = PointKey::for_point(point, &self.window)?;
                table.insert(key.encode().as_slice(), value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Returns points with `start < timestamp <= end`, in storage order.
    pub fn query_points(&self, start: OffsetDateTime, end: OffsetDateTime) -> Result<PointsQuery> {
        let mut result = PointsQuery::default();
        let (start_ns, end_ns) = (clamp_nanos(start), clamp_nanos(end));
        if start_ns >= end_ns {
            return Ok(result);
        }

        let txn = self.db.begin_read()?;
        let table = match txn.open_table(POINTS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(result),
            Err(e) => return Err(e.into()),
        };

        // Newest window has the smallest prefix.
        let newest = self.window.window_end(end_ns).unwrap_or(i64::MAX);
        let oldest = self.window.window_end(start_ns).unwrap_or(i64::MAX);
        let mut lower = [0x00u8; POINT_KEY_LEN];
        lower[..WINDOW_PREFIX_LEN].copy_from_slice(&window_prefix(newest));
        let mut upper = [0xFFu8; POINT_KEY_LEN];
        upper[..WINDOW_PREFIX_LEN].copy_from_slice(&window_prefix(oldest));

        for entry in table.range::<&[u8]>(lower.as_slice()..=upper.as_slice())? {
            let (key, value) = entry?;
            let (key, raw) = (key.value(), value.value());

            let Some(parsed) = PointKey::decode(key) else {
                result
                    .warnings
                    .push(format!("bad key in {}: {:02X?}", POINTS_TABLE.name(), key));
                continue;
            };

            let window_start = self.window.window_start(parsed.window_end);
            if window_start >= end_ns || start_ns >= parsed.window_end {
                continue;
            }

            match decode_point(raw) {
                Ok(point) => {
                    if point.timestamp > start && point.timestamp <= end {
                        result.points.push(point);
                    }
                }
                Err(e) => result.warnings.push(format!(
                    "bad point @ {} / window {} / {} / ts {} ({}): {:02X?}",
                    POINTS_TABLE.name(),
                    parsed.window_end,
                    parsed.address,
                    parsed.timestamp,
                    e,
                    raw
                )),
            }
        }

        Ok(result)
    }

    /// Sets the alias for `addr`; an empty `name` removes it.
    pub fn set_alias(&self, addr: &str, name: &str) -> Result<()> {
        let addr = alias_key(addr);
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ALIASES_TABLE)?;
            if name.is_empty() {
                table.remove(addr.as_str())?;
            } else {
                table.insert(addr.as_str(), name)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Alias for `addr`, or an empty string when none is set.
    pub fn get_alias(&self, addr: &str) -> Result<String> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(ALIASES_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };
        let alias = table
            .get(alias_key(addr).as_str())?
            .map(|guard| guard.value().to_string())
            .unwrap_or_default();
        Ok(alias)
    }

    pub fn list_aliases(&self) -> Result<BTreeMap<String, String>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(ALIASES_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut aliases = BTreeMap::new();
        for entry in table.iter()? {
            let (addr, name) = entry?;
            aliases.insert(addr.value().to_string(), name.value().to_string());
        }
        Ok(aliases)
    }

    /// Deletes every window whose right boundary plus `retention` is before `now`.
    pub fn sweep_retention(
        &self,
        retention: time::Duration,
        now: OffsetDateTime,
    ) -> Result<RetentionSweep> {
        let mut sweep = RetentionSweep::default();
        if !retention.is_positive() {
            return Ok(sweep);
        }

        // Expired means window_end < now - retention.
        let cutoff = clamp_nanos(now) as i128 - retention.whole_nanoseconds();
        if cutoff <= i64::MIN as i128 {
            return Ok(sweep);
        }
        let first_expired = (reverse_key(cutoff as i64) + 1).to_be_bytes();

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(POINTS_TABLE)?;
            let mut expired = Vec::new();
            let mut windows = BTreeSet::new();
            for entry in table.range::<&[u8]>(first_expired.as_slice()..)? {
                let (key, _) = entry?;
                let key = key.value();
                windows.insert(key[..WINDOW_PREFIX_LEN.min(key.len())].to_vec());
                expired.push(key.to_vec());
            }

            for key in &expired {
                table.remove(key.as_slice())?;
            }
            sweep = RetentionSweep {
                windows: windows.len(),
                points: expired.len(),
            };
        }
        txn.commit()?;

        Ok(sweep)
    }

    /// Retention as run by the engine's timer: logged, never propagated.
    pub(crate) fn execute_retention(&self, retention: time::Duration) {
        match self.sweep_retention(retention, OffsetDateTime::now_utc()) {
            Ok(sweep) if sweep.windows > 0 => info!(
                "Retention removed {} windows ({} points)",
                sweep.windows, sweep.points
            ),
            Ok(_) => {}
            Err(e) => error!("Retention sweep failed: {}", e),
        }
    }

    pub(crate) fn log_warnings(query: &PointsQuery) {
        for warning in &query.warnings {
            warn!("{}", warning);
        }
    }
}

fn clamp_nanos(ts: OffsetDateTime) -> i64 {
    ts.unix_timestamp_nanos()
        .clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn alias_key(addr: &str) -> String {
    addr.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADDR: &str = "C4:7C:8D:6A:01:FF";

    fn open(dir: &TempDir) -> Store {
        Store::open(&StoreOptions::new(dir.path().join("store.redb"))).unwrap()
    }

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn point(addr: &str, secs: i64, temperature: f64) -> Point {
        Point {
            temperature,
            ..Point::new(addr, at(secs))
        }
    }

    #[test]
    fn fresh_store_is_stamped_current() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert_eq!(store.detected_version(), SchemaVersion::Fresh);
        drop(store);
        assert_eq!(open(&dir).detected_version(), SchemaVersion::Current);
    }

    #[test]
    fn same_address_and_timestamp_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.push_points(&[point(ADDR, 1_000, 20.0)]).unwrap();
        store.push_points(&[point(ADDR, 1_000, 21.5)]).unwrap();

        let got = store.query_points(at(0), at(2_000)).unwrap();
        assert_eq!(got.points.len(), 1);
        assert_eq!(got.points[0].temperature, 21.5);
    }

    #[test]
    fn interval_excludes_start_includes_end() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store
            .push_points(&[point(ADDR, 100, 1.0), point(ADDR, 150, 2.0), point(ADDR, 200, 3.0)])
            .unwrap();

        let got = store.query_points(at(100), at(200)).unwrap();
        let mut stamps: Vec<_> = got.points.iter().map(|p| p.timestamp).collect();
        stamps.sort();
        assert_eq!(stamps, vec![at(150), at(200)]);
        assert!(got.warnings.is_empty());
    }

    #[test]
    fn query_spans_windows_exactly_once() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let day = 86_400;
        let pushed: Vec<_> = (0..10)
            .map(|i| point(ADDR, i * day / 2 + 7, i as f64))
            .chain((0..10).map(|i| point("11:22:33:44:55:66", i * day / 2 + 9, i as f64)))
            .collect();
        store.push_points(&pushed).unwrap();

        let got = store.query_points(at(day), at(4 * day)).unwrap();
        let mut want: Vec<_> = pushed
            .iter()
            .filter(|p| p.timestamp > at(day) && p.timestamp <= at(4 * day))
            .map(|p| (p.address.clone(), p.timestamp))
            .collect();
        let mut have: Vec<_> = got
            .points
            .iter()
            .map(|p| (p.address.clone(), p.timestamp))
            .collect();
        want.sort();
        have.sort();
        assert_eq!(have, want);
    }

    #[test]
    fn invalid_point_rejects_whole_batch() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let err = store
            .push_points(&[point(ADDR, 10, 1.0), point("garage", 20, 2.0)])
            .unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
        assert!(store.query_points(at(0), at(100)).unwrap().points.is_empty());
    }

    #[test]
    fn corrupt_entries_become_warnings() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.push_points(&[point(ADDR, 500, 1.0)]).unwrap();

        let bad = PointKey::for_point(&point(ADDR, 600, 0.0), store.window()).unwrap();
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(POINTS_TABLE).unwrap();
            table.insert(bad.encode().as_slice(), &[1u8, 2, 3][..]).unwrap();
        }
        txn.commit().unwrap();

        let got = store.query_points(at(0), at(1_000)).unwrap();
        assert_eq!(got.points.len(), 1);
        assert_eq!(got.warnings.len(), 1);
        assert!(got.warnings[0].contains("bad point"));
    }

    #[test]
    fn retention_boundary_is_strict() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let day = 86_400;
        // Windows ending at day 1, 2 and 3.
        store
            .push_points(&[
                point(ADDR, day / 2, 1.0),
                point(ADDR, day + day / 2, 2.0),
                point(ADDR, 2 * day + day / 2, 3.0),
            ])
            .unwrap();

        // now = day 2 + retention: window ending at day 2 sits exactly on the boundary.
        let retention = time::Duration::hours(6);
        let now = at(2 * day) + retention;
        let sweep = store.sweep_retention(retention, now).unwrap();
        assert_eq!(sweep, RetentionSweep { windows: 1, points: 1 });

        let left = store.query_points(at(0), at(3 * day)).unwrap();
        let mut temps: Vec<_> = left.points.iter().map(|p| p.temperature).collect();
        temps.sort_by(f64::total_cmp);
        assert_eq!(temps, vec![2.0, 3.0]);
    }

    #[test]
    fn retention_disabled_keeps_everything() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.push_points(&[point(ADDR, 10, 1.0)]).unwrap();
        let sweep = store
            .sweep_retention(time::Duration::ZERO, OffsetDateTime::now_utc())
            .unwrap();
        assert_eq!(sweep, RetentionSweep::default());
        assert_eq!(store.query_points(at(0), at(20)).unwrap().points.len(), 1);
    }

    #[test]
    fn alias_set_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert_eq!(store.get_alias(ADDR).unwrap(), "");

        store.set_alias(ADDR, "Sauna").unwrap();
        assert_eq!(store.get_alias(&ADDR.to_lowercase()).unwrap(), "Sauna");
        assert_eq!(
            store.list_aliases().unwrap(),
            BTreeMap::from([(ADDR.to_string(), "Sauna".to_string())])
        );

        store.set_alias(ADDR, "").unwrap();
        assert_eq!(store.get_alias(ADDR).unwrap(), "");
        assert!(store.list_aliases().unwrap().is_empty());
    }
}
