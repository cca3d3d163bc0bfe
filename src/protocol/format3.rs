/// RuuviTag data format 3 ("RAWv1")
///
/// Payload layout, offsets from the start of the manufacturer data:
/// - Bytes 0-1: Manufacturer ID (little-endian, 0x0499)
/// - Byte 2: Data format (3)
/// - Byte 3: Humidity (0.5% resolution)
/// - Byte 4: Temperature integer part, MSB is the sign flag
/// - Byte 5: Temperature fraction (hundredths)
/// - Bytes 6-7: Pressure (unsigned 16-bit, +50000 Pa offset)
/// - Bytes 8-13: Acceleration X/Y/Z (not used here)
/// - Bytes 14-15: Battery voltage (millivolts)
use super::{check_header, FormatError};
use crate::models::Point;

pub const DATA_FORMAT: u8 = 3;
pub const MIN_LEN: usize = 16;

const SIGN_BIT: u8 = 1 << 7;

pub fn parse(raw: &[u8]) -> Result<Point, FormatError> {
    check_header(raw, DATA_FORMAT, MIN_LEN)?;

    let humidity = f64::from(raw[3]) / 2.0;
    let temperature = temperature(raw[4], raw[5]);
    let pressure = (f64::from(u16::from_be_bytes([raw[6], raw[7]])) + 50000.0) / 100.0;
    let battery = f64::from(u16::from_be_bytes([raw[14], raw[15]]));

    Ok(Point {
        temperature,
        humidity,
        pressure,
        battery,
        ..super::unstamped()
    })
}

fn temperature(integer: u8, fraction: u8) -> f64 {
    let magnitude = f64::from(integer & !SIGN_BIT) + f64::from(fraction) / 100.0;
    if integer & SIGN_BIT != 0 {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_reference_values() {
        let raw = [
            0x99, 0x04, 0x03, 0x32, 0x81, 0x19, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x0B, 0xB8,
        ];
        let point = parse(&raw).unwrap();
        assert_eq!(point.humidity, 25.0);
        assert!((point.temperature - -1.25).abs() < 1e-9);
        assert!((point.pressure - 500.0).abs() < 1e-9);
        assert_eq!(point.battery, 3000.0);
    }

    #[test]
    fn positive_temperature_and_pressure_offset() {
        assert!((temperature(0x15, 0x32) - 21.5).abs() < 1e-9);
        let mut raw = [0u8; MIN_LEN];
        raw[0..3].copy_from_slice(&[0x99, 0x04, 0x03]);
        raw[6..8].copy_from_slice(&51325u16.to_be_bytes());
        assert!((parse(&raw).unwrap().pressure - 1013.25).abs() < 1e-9);
    }

    #[test]
    fn rejects_short_payload() {
        let raw = [0x99, 0x04, 0x03, 0x32, 0x81];
        assert!(matches!(
            parse(&raw),
            Err(FormatError::Length { got: 5, want: 16 })
        ));
    }
}
