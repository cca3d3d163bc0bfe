use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

use crate::names::NameRegistry;

/// A single reading from a RuuviTag, stamped with its sender and capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub address: String,
    pub timestamp: OffsetDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub battery: f64,
}

impl Point {
    /// Creates a point with all measurements zeroed.
    pub fn new(address: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            address: address.into(),
            timestamp,
            temperature: 0.0,
            humidity: 0.0,
            pressure: 0.0,
            battery: 0.0,
        }
    }

    /// Human name from the registry, or the address when none is registered.
    pub fn name<'a>(&'a self, names: &'a NameRegistry) -> &'a str {
        names.lookup(&self.address).unwrap_or(&self.address)
    }

    /// One-line human-readable summary used by logging.
    pub fn summary(&self, names: &NameRegistry) -> String {
        format!(
            "{}: ({:.2} °C, {:.2}% humid, {:.2} hPa, {:.0} mV)",
            self.name(names),
            self.temperature,
            self.humidity,
            self.pressure,
            self.battery
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid hardware address {0:?}")]
pub struct InvalidAddress(pub String);

/// A 6-octet hardware (MAC) address.
///
/// Parses the colon, hyphen and dotted-quad notations and always renders as
/// uppercase colon-separated hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidAddress(s.to_string());

        // Dotted form: 0000.0000.0000
        if s.len() == 14 && s.as_bytes()[4] == b'.' && s.as_bytes()[9] == b'.' {
            let mut octets = [0u8; 6];
            for (i, group) in s.split('.').enumerate() {
                if i >= 3 || group.len() != 4 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(invalid());
                }
                let word = u16::from_str_radix(group, 16).map_err(|_| invalid())?;
                octets[i * 2..i * 2 + 2].copy_from_slice(&word.to_be_bytes());
            }
            return Ok(MacAddress(octets));
        }

        if s.len() != 17 {
            return Err(invalid());
        }
        let sep = s.as_bytes()[2];
        if sep != b':' && sep != b'-' {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        let mut count = 0;
        for group in s.split(sep as char) {
            if count >= 6 || group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            octets[count] = u8::from_str_radix(group, 16).map_err(|_| invalid())?;
            count += 1;
        }
        if count != 6 {
            return Err(invalid());
        }

        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}
