//! Key layout of the `points` table.
//!
//! A key is `window(8) ++ address(6) ++ timestamp(8)`, both time components
//! stored as big-endian reverse keys so that newer windows and newer points
//! sort first. All entries of one window share the 8-byte prefix.

use super::error::{Result, StorageError};
use crate::codec::{timestamp_nanos, CodecError};
use crate::models::{MacAddress, Point};

pub const WINDOW_PREFIX_LEN: usize = 8;
pub const POINT_KEY_LEN: usize = 22;

/// Maps a timestamp to a key that sorts in the opposite order.
///
/// Equal to `i64::MAX - nanos`, evaluated without overflow so pre-epoch
/// timestamps keep the ordering instead of wrapping.
pub fn reverse_key(nanos: i64) -> u64 {
    (i64::MAX as i128 - nanos as i128) as u64
}

pub fn nanos_from_reverse_key(key: u64) -> i64 {
    (i64::MAX as i128 - key as i128) as i64
}

/// Fixed-size time partitioning of the `points` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    size_ns: i64,
}

impl WindowSpec {
    pub fn new(size: time::Duration) -> Result<Self> {
        let size_ns = i64::try_from(size.whole_nanoseconds())
            .ok()
            .filter(|ns| *ns > 0)
            .ok_or(StorageError::InvalidWindowSize(size))?;
        Ok(Self { size_ns })
    }

    pub fn size_ns(&self) -> i64 {
        self.size_ns
    }

    /// Right (inclusive) boundary of the window `(end - size, end]` holding `nanos`.
    pub fn window_end(&self, nanos: i64) -> Option<i64> {
        let rem = nanos.rem_euclid(self.size_ns);
        if rem == 0 {
            Some(nanos)
        } else {
            (nanos - rem).checked_add(self.size_ns)
        }
    }

    pub fn window_start(&self, window_end: i64) -> i64 {
        window_end.saturating_sub(self.size_ns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointKey {
    pub window_end: i64,
    pub address: MacAddress,
    pub timestamp: i64,
}

impl PointKey {
    pub fn for_point(point: &Point, window: &WindowSpec) -> Result<Self> {
        let address: MacAddress = point.address.parse().map_err(CodecError::from)?;
        let timestamp = timestamp_nanos(point.timestamp)?;
        let window_end = window
            .window_end(timestamp)
            .ok_or(StorageError::KeyOutOfRange(timestamp))?;
        Ok(Self {
            window_end,
            address,
            timestamp,
        })
    }

    pub fn encode(&self) -> [u8; POINT_KEY_LEN] {
        let mut key = [0u8; POINT_KEY_LEN];
        key[0..8].copy_from_slice(&window_prefix(self.window_end));
        key[8..14].copy_from_slice(&self.address.octets());
        key[14..22].copy_from_slice(&reverse_key(self.timestamp).to_be_bytes());
        key
    }

    pub fn decode(raw: &[u8]) -> Option<Self> {
        if raw.len() != POINT_KEY_LEN {
            return None;
        }
        let window_end = window_from_prefix(&raw[0..8])?;
        let mut address = [0u8; 6];
        address.copy_from_slice(&raw[8..14]);
        let mut ts = [0u8; 8];
        ts.copy_from_slice(&raw[14..22]);
        Some(Self {
            window_end,
            address: MacAddress(address),
            timestamp: nanos_from_reverse_key(u64::from_be_bytes(ts)),
        })
    }
}

pub fn window_prefix(window_end: i64) -> [u8; WINDOW_PREFIX_LEN] {
    reverse_key(window_end).to_be_bytes()
}

pub fn window_from_prefix(raw: &[u8]) -> Option<i64> {
    let prefix: [u8; WINDOW_PREFIX_LEN] = raw.get(..WINDOW_PREFIX_LEN)?.try_into().ok()?;
    Some(nanos_from_reverse_key(u64::from_be_bytes(prefix)))
}
