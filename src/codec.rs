/// Fixed-layout binary encoding of a `Point`
///
/// This is the on-disk value format. Layout (46 bytes, big-endian):
/// - Bytes 0-7: Timestamp (signed nanoseconds since the Unix epoch)
/// - Bytes 8-15: Temperature (f64 bit pattern)
/// - Bytes 16-23: Humidity (f64 bit pattern)
/// - Bytes 24-31: Pressure (f64 bit pattern)
/// - Bytes 32-39: Battery (f64 bit pattern)
/// - Bytes 40-45: Hardware address octets
use thiserror::Error;
use time::OffsetDateTime;

use crate::models::{InvalidAddress, MacAddress, Point};

pub const ENCODED_POINT_LEN: usize = 46;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error(transparent)]
    Address(#[from] InvalidAddress),

    #[error("got {got} bytes, want {want}")]
    Length { got: usize, want: usize },

    #[error("timestamp {0} ns does not fit in 64 bits")]
    TimestampOutOfRange(i128),
}

/// Nanoseconds since the epoch as a signed 64-bit value.
pub fn timestamp_nanos(ts: OffsetDateTime) -> Result<i64, CodecError> {
    let nanos = ts.unix_timestamp_nanos();
    i64::try_from(nanos).map_err(|_| CodecError::TimestampOutOfRange(nanos))
}

/// Inverse of [`timestamp_nanos`]; every `i64` maps to a valid UTC instant.
pub fn timestamp_from_nanos(nanos: i64) -> OffsetDateTime {
    // i64 nanoseconds span roughly 1677..2262, well inside time's range.
    OffsetDateTime::from_unix_timestamp_nanos(nanos as i128).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

pub fn encode_point(point: &Point) -> Result<[u8; ENCODED_POINT_LEN], CodecError> {
    let mac: MacAddress = point.address.parse()?;
    let nanos = timestamp_nanos(point.timestamp)?;

    let mut buf = [0u8; ENCODED_POINT_LEN];
    buf[0..8].copy_from_slice(&nanos.to_be_bytes());
    buf[8..16].copy_from_slice(&point.temperature.to_bits().to_be_bytes());
    buf[16..24].copy_from_slice(&point.humidity.to_bits().to_be_bytes());
    buf[24..32].copy_from_slice(&point.pressure.to_bits().to_be_bytes());
    buf[32..40].copy_from_slice(&point.battery.to_bits().to_be_bytes());
    buf[40..46].copy_from_slice(&mac.octets());

    Ok(buf)
}

pub fn decode_point(raw: &[u8]) -> Result<Point, CodecError> {
    if raw.len() != ENCODED_POINT_LEN {
        return Err(CodecError::Length {
            got: raw.len(),
            want: ENCODED_POINT_LEN,
        });
    }

    let word = |at: usize| {
        let mut b = [0u8; 8];
        b.copy_from_slice(&raw[at..at + 8]);
        u64::from_be_bytes(b)
    };

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&raw[40..46]);

    Ok(Point {
        address: MacAddress(mac).to_string(),
        timestamp: timestamp_from_nanos(word(0) as i64),
        temperature: f64::from_bits(word(8)),
        humidity: f64::from_bits(word(16)),
        pressure: f64::from_bits(word(24)),
        battery: f64::from_bits(word(32)),
    })
}
