//! Turning irregular readings into evenly spaced series.

pub mod align;
pub mod buffer;
pub mod extrapolate;

pub use align::{resample, resample_by_address};
pub use buffer::ReadingBuffer;
pub use extrapolate::{linear_extrapolate, ExtrapolationError};

use time::OffsetDateTime;

use crate::models::Point;

/// `left.field + coeff * (right.field - left.field)` for every measurement.
///
/// `coeff` is 0 at `left` and 1 at `right`.
pub(crate) fn interpolate(left: &Point, right: &Point, coeff: f64, timestamp: OffsetDateTime) -> Point {
    let lerp = |a: f64, b: f64| a + coeff * (b - a);
    Point {
        address: left.address.clone(),
        timestamp,
        temperature: lerp(left.temperature, right.temperature),
        humidity: lerp(left.humidity, right.humidity),
        pressure: lerp(left.pressure, right.pressure),
        battery: lerp(left.battery, right.battery),
    }
}
