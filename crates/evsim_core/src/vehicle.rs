use std::fmt;

use crate::ChargerType;

/// Energy and current actually exchanged with a vehicle over one step.
///
/// Positive values flow into the vehicle, negative values back to the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortFlow {
    /// Energy over the step, in kWh.
    pub power: f64,
    /// Mean current over the step, in amperes.
    pub current: f64,
}

impl PortFlow {
    pub const IDLE: PortFlow = PortFlow {
        power: 0.0,
        current: 0.0,
    };
}

/// Capability a battery model exposes to the charging station.
///
/// The station never creates or destroys vehicles. It takes ownership on
/// `spawn_ev`, drives `step` once per simulation step and hands the vehicle
/// back once `is_departing` reports a departure.
pub trait Vehicle: fmt::Debug {
    /// Request `current` amperes (negative to discharge). The vehicle may
    /// deliver less than asked; a zero request still advances its idle state.
    fn step(&mut self, current: f64, voltage: f64, charger_type: ChargerType) -> PortFlow;

    /// `Some(user_satisfaction)` once the vehicle leaves at `timestep`.
    fn is_departing(&self, timestep: u64) -> Option<f64>;

    /// State of charge in [0, 1].
    fn soc(&self) -> f64;

    fn user_satisfaction(&self) -> f64;

    /// Two-element observation of the vehicle at `timestep`.
    fn state(&self, timestep: u64) -> [f64; 2];

    /// Record the port the vehicle is plugged into.
    fn assign_port(&mut self, port: usize);

    fn port(&self) -> Option<usize>;

    fn departure_step(&self) -> u64;
}
