/// RuuviTag broadcast payload decoding
///
/// Payloads start with the little-endian manufacturer ID followed by the data
/// format byte. Format 3 is tried first, then format 5; the first one that
/// validates wins.
pub mod format3;
pub mod format5;

use thiserror::Error;
use time::OffsetDateTime;

use crate::models::Point;

pub const RUUVITAG_MANUFACTURER_ID: u16 = 0x0499; // Ruuvi Innovations Ltd. manufacturer ID

/// Reason a payload does not match one particular data format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("manufacturer ID mismatch (got {got:04X}, want {want:04X})")]
    Manufacturer { got: u16, want: u16 },

    #[error("format mismatch (got {got}, want {want})")]
    Format { got: u8, want: u8 },

    #[error("packet length mismatch (got {got}, want at least {want})")]
    Length { got: usize, want: usize },
}

/// Neither supported format accepted the payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("format 3: {format3}; format 5: {format5}")]
pub struct ParseError {
    pub format3: FormatError,
    pub format5: FormatError,
}

/// Decodes a raw payload into an unstamped point.
///
/// The returned point has an empty address and the epoch as timestamp; see
/// [`parse_advertisement`] for the stamped variant.
pub fn parse_datagram(raw: &[u8]) -> Result<Point, ParseError> {
    let format3 = match format3::parse(raw) {
        Ok(point) => return Ok(point),
        Err(e) => e,
    };

    let format5 = match format5::parse(raw) {
        Ok(point) => return Ok(point),
        Err(e) => e,
    };

    Err(ParseError { format3, format5 })
}

/// Decodes manufacturer-specific data as delivered by a BLE stack, where the
/// manufacturer ID has already been split off the payload.
pub fn parse_manufacturer_data(mf_id: u16, data: &[u8]) -> Result<Point, ParseError> {
    let mut raw = Vec::with_capacity(data.len() + 2);
    raw.extend_from_slice(&mf_id.to_le_bytes());
    raw.extend_from_slice(data);
    parse_datagram(&raw)
}

/// Decodes an advertisement and stamps it with its sender and capture time.
pub fn parse_advertisement(
    sender: &str,
    mf_id: u16,
    data: &[u8],
    captured_at: OffsetDateTime,
) -> Result<Point, ParseError> {
    let mut point = parse_manufacturer_data(mf_id, data)?;
    point.address = sender.to_uppercase();
    point.timestamp = captured_at;
    Ok(point)
}

pub(crate) fn check_header(raw: &[u8], format: u8, min_len: usize) -> Result<(), FormatError> {
    if raw.len() < 3 {
        return Err(FormatError::Length {
            got: raw.len(),
            want: min_len,
        });
    }

    let mf_id = u16::from_le_bytes([raw[0], raw[1]]);
    if mf_id != RUUVITAG_MANUFACTURER_ID {
        return Err(FormatError::Manufacturer {
            got: mf_id,
            want: RUUVITAG_MANUFACTURER_ID,
        });
    }

    if raw[2] != format {
        return Err(FormatError::Format {
            got: raw[2],
            want: format,
        });
    }

    if raw.len() < min_len {
        return Err(FormatError::Length {
            got: raw.len(),
            want: min_len,
        });
    }

    Ok(())
}

pub(crate) fn unstamped() -> Point {
    Point::new(String::new(), OffsetDateTime::UNIX_EPOCH)
}
