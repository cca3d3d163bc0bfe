/// RuuviTag data format 5 ("RAWv2")
///
/// Payload layout, offsets from the start of the manufacturer data:
/// - Bytes 0-1: Manufacturer ID (little-endian, 0x0499)
/// - Byte 2: Data format (5)
/// - Bytes 3-4: Temperature (signed 16-bit, 0.005°C resolution)
/// - Bytes 5-6: Humidity (unsigned 16-bit, 0.0025% resolution)
/// - Bytes 7-8: Pressure (unsigned 16-bit, +50000 Pa offset, 1 Pa resolution)
/// - Bytes 9-14: Acceleration X/Y/Z (not used here)
/// - Bytes 15-16: Battery voltage (top 11 bits, +1600 mV) + TX power (low 5 bits)
/// - Byte 17: Movement counter (not used here)
/// - Bytes 18-19: Measurement sequence number (not used here)
/// - Bytes 20+: MAC address (not used here, we get it from BLE)
use super::{check_header, FormatError};
use crate::models::Point;

pub const DATA_FORMAT: u8 = 5;
pub const MIN_LEN: usize = 24;

pub fn parse(raw: &[u8]) -> Result<Point, FormatError> {
    check_header(raw, DATA_FORMAT, MIN_LEN)?;

    let temperature = f64::from(i16::from_be_bytes([raw[3], raw[4]])) * 0.005;
    let humidity = f64::from(u16::from_be_bytes([raw[5], raw[6]])) * 0.0025;
    let pressure = (f64::from(u16::from_be_bytes([raw[7], raw[8]])) + 50000.0) / 100.0;
    let power = u16::from_be_bytes([raw[15], raw[16]]);
    let battery = f64::from((power & 0xFFE0) >> 5) + 1600.0;

    Ok(Point {
        temperature,
        humidity,
        pressure,
        battery,
        ..super::unstamped()
    })
}
