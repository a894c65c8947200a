//! Charging station model for EV fleet simulations.
//!
//! A [`ChargingStation`] turns per-port control actions into currents, drives
//! the [`Vehicle`] plugged into each port and keeps the station statistics.

mod ev;
mod models;
mod normalize;
mod station;
mod stats;
mod vehicle;

pub use crate::ev::*;
pub use crate::models::*;
pub use crate::station::*;
pub use crate::stats::*;
pub use crate::vehicle::*;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StationError {
    #[error("Charging station {station_id} expects {expected} actions, got {actual}")]
    ActionCount {
        station_id: u32,
        expected: usize,
        actual: usize,
    },
    #[error(
        "Normalized action {action} for port {port} of charging station {station_id} is outside [-1, 1]"
    )]
    ActionOutOfRange {
        station_id: u32,
        port: usize,
        action: f64,
    },
    #[error("Charging station {station_id} has no free port")]
    NoFreePort { station_id: u32 },
    #[error(
        "Aggregate current {total_current} A of charging station {station_id} exceeds the max charge current {max_charge_current} A"
    )]
    CurrentLimitExceeded {
        station_id: u32,
        total_current: f64,
        max_charge_current: f64,
    },
    #[error("Invalid configuration for charging station {station_id}: {reason}")]
    InvalidConfig { station_id: u32, reason: String },
}
