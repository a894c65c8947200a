use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StationError;

/// Connector technology of a charger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub enum ChargerType {
    #[default]
    AC,
    DC,
}

impl fmt::Display for ChargerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargerType::AC => write!(f, "AC"),
            ChargerType::DC => write!(f, "DC"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Immutable description of a charging station.
///
/// Currents are in amperes, the voltage in volts and the timescale in minutes
/// per simulation step. Discharge currents are negative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargerConfig {
    pub id: u32,
    pub connected_bus: u32,
    pub connected_transformer: Vec<u32>,
    pub geo_location: Option<GeoLocation>,
    pub min_charge_current: f64,
    pub max_charge_current: f64,
    pub min_discharge_current: f64,
    pub max_discharge_current: f64,
    pub voltage: f64,
    pub n_ports: usize,
    pub charger_type: ChargerType,
    pub bi_directional: bool,
    pub timescale: u32,
    /// Narrate every step through `tracing`.
    pub verbose: bool,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        ChargerConfig {
            id: 0,
            connected_bus: 0,
            connected_transformer: vec![0],
            geo_location: None,
            min_charge_current: 8.0,
            max_charge_current: 32.0,
            min_discharge_current: -8.0,
            max_discharge_current: -32.0,
            voltage: 230.0,
            n_ports: 2,
            charger_type: ChargerType::AC,
            bi_directional: true,
            timescale: 5,
            verbose: false,
        }
    }
}

impl ChargerConfig {
    pub(crate) fn validate(&self) -> Result<(), StationError> {
        let reason = if self.n_ports == 0 {
            Some("a station needs at least one port".to_string())
        } else if !(self.voltage > 0.0) {
            Some(format!("voltage must be positive, got {}", self.voltage))
        } else if self.timescale == 0 {
            Some("timescale must be at least one minute".to_string())
        } else if self.min_charge_current < 0.0
            || self.min_charge_current > self.max_charge_current
        {
            Some(format!(
                "charge current range [{}, {}] is invalid",
                self.min_charge_current, self.max_charge_current
            ))
        } else if self.min_discharge_current > 0.0
            || self.max_discharge_current > self.min_discharge_current
        {
            Some(format!(
                "discharge current range [{}, {}] is invalid",
                self.max_discharge_current, self.min_discharge_current
            ))
        } else {
            None
        };

        match reason {
            Some(reason) => Err(StationError::InvalidConfig {
                station_id: self.id,
                reason,
            }),
            None => Ok(()),
        }
    }
}
