//! Core library for the flightlog application.
//!
//! This library reconstructs structured, unit-correct, time-aligned session
//! data from the raw textual logs produced by a wearable altimeter/GPS data
//! logger across two incompatible hardware generations. It covers generation
//! classification, raw record parsing, physics-derived quantities, clock
//! synchronization between the onboard sensor stream and the GPS track
//! stream, window trimming, and round-trippable CSV serialization.

pub mod config;
pub mod derive;
pub mod error;
pub mod generation;
pub mod parse;
pub mod session;
pub mod storage;
pub mod sync;
pub mod table;
pub mod trim;

pub use error::{FlightLogError, LogResult};
pub use generation::Generation;
pub use session::{ChannelSchema, DeviceInfo, FlightLog, LegacyFlightLog};
pub use table::{DataTable, TrackTable};
