//! Storage service for RuuviTag environmental sensor readings.
//!
//! Broadcast payloads are decoded by [`protocol`], persisted by the
//! single-writer [`database`] engine in time-windowed partitions, and read
//! back as raw points that [`resample`] aligns onto an even grid.

#[cfg(feature = "bluetooth")]
pub mod bluetooth;
pub mod codec;
pub mod config;
pub mod database;
pub mod models;
pub mod names;
pub mod protocol;
pub mod resample;
pub mod utils;

pub use codec::{decode_point, encode_point, CodecError};
pub use database::{PointsQuery, StorageEngine, StorageError, StorageHandle, Store, StoreOptions};
pub use models::{MacAddress, Point};
pub use names::NameRegistry;
pub use resample::{linear_extrapolate, resample, ReadingBuffer};
