//! Serial driver stepping several charging stations through an episode.

mod arrival;

pub use crate::arrival::*;

use evsim_core::{ChargingStation, ProfileError, StationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Station(#[from] StationError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("Arrival {arrival} targets unknown station index {station}")]
    UnknownStation { arrival: usize, station: usize },
    #[error(
        "Arrival {arrival} steps every {profile_timescale} min but station {station} every {station_timescale} min"
    )]
    TimescaleMismatch {
        arrival: usize,
        station: usize,
        station_timescale: u32,
        profile_timescale: u32,
    },
    #[error("Expected one action set per station ({expected}), got {actual}")]
    ActionSetCount { expected: usize, actual: usize },
    #[error("No prices left for step {step}")]
    PriceSeriesExhausted { step: u64 },
}

/// Unit prices applied to every station during one step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepPrices {
    pub charge: f64,
    pub discharge: f64,
}

/// Aggregated outcome of one engine step across all stations.
#[derive(Debug, Default, PartialEq)]
pub struct EngineStepReport {
    pub profit: f64,
    pub user_satisfaction: Vec<f64>,
    pub invalid_actions: usize,
    /// Arrivals turned away because their station was full.
    pub rejected_arrivals: usize,
}

pub struct Engine {
    stations: Vec<ChargingStation>,
    arrivals: Vec<Arrival>,
    next_arrival: usize,
    prices: Vec<StepPrices>,
    current_step: u64,
    rejected_arrivals: usize,
}

impl Engine {
    /// Build an engine and plug in the vehicles arriving at step 0.
    ///
    /// Every arrival is validated here, including that its timescale matches
    /// the station it targets.
    pub fn new(
        stations: Vec<ChargingStation>,
        mut arrivals: Vec<Arrival>,
        prices: Vec<StepPrices>,
    ) -> Result<Self, EngineError> {
        for (idx, arrival) in arrivals.iter().enumerate() {
            if arrival.station >= stations.len() {
                return Err(EngineError::UnknownStation {
                    arrival: idx,
                    station: arrival.station,
                });
            }
            arrival.validate()?;

            let station_timescale = stations[arrival.station].get_config().timescale;
            if arrival.profile.timescale != station_timescale {
                return Err(EngineError::TimescaleMismatch {
                    arrival: idx,
                    station: arrival.station,
                    station_timescale,
                    profile_timescale: arrival.profile.timescale,
                });
            }
        }
        arrivals.sort_by_key(|arrival| arrival.profile.time_of_arrival);

        let mut engine = Engine {
            stations,
            arrivals,
            next_arrival: 0,
            prices,
            current_step: 0,
            rejected_arrivals: 0,
        };
        engine.rejected_arrivals = engine.spawn_arrivals()?;
        Ok(engine)
    }

    pub fn stations(&self) -> &[ChargingStation] {
        &self.stations
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Arrivals rejected since the last reset.
    pub fn rejected_arrivals(&self) -> usize {
        self.rejected_arrivals
    }

    /// True once every step of the price series has been played.
    pub fn is_done(&self) -> bool {
        self.current_step as usize >= self.prices.len()
    }

    /// Step every station once with the prices of the current step, then plug
    /// in the vehicles arriving for the next one.
    pub fn step(&mut self, actions: &[Vec<f64>]) -> Result<EngineStepReport, EngineError> {
        if actions.len() != self.stations.len() {
            return Err(EngineError::ActionSetCount {
                expected: self.stations.len(),
                actual: actions.len(),
            });
        }
        let Some(prices) = self.prices.get(self.current_step as usize).copied() else {
            return Err(EngineError::PriceSeriesExhausted {
                step: self.current_step,
            });
        };

        let mut report = EngineStepReport::default();
        for (station, station_actions) in self.stations.iter_mut().zip(actions) {
            let step = station.step(station_actions, prices.charge, prices.discharge)?;
            report.profit += step.profit;
            report.invalid_actions += step.invalid_actions;
            report.user_satisfaction.extend(step.user_satisfaction);
        }
        tracing::debug!(
            "Step {}: profit {:.3}, {} departures",
            self.current_step,
            report.profit,
            report.user_satisfaction.len()
        );

        self.current_step += 1;
        report.rejected_arrivals = self.spawn_arrivals()?;
        self.rejected_arrivals += report.rejected_arrivals;
        Ok(report)
    }

    /// Plug in every arrival due by the current step. Returns how many were
    /// turned away.
    fn spawn_arrivals(&mut self) -> Result<usize, EngineError> {
        let mut rejected = 0;
        while let Some(arrival) = self.arrivals.get(self.next_arrival) {
            if arrival.profile.time_of_arrival > self.current_step {
                break;
            }
            self.next_arrival += 1;

            let station = &mut self.stations[arrival.station];
            if station.free_ports() == 0 {
                tracing::warn!(
                    "CS {} is full, rejecting EV arriving at step {}",
                    station.id(),
                    arrival.profile.time_of_arrival
                );
                rejected += 1;
                continue;
            }
            station.spawn_ev(arrival.build()?)?;
        }
        Ok(rejected)
    }

    /// Concatenated observation of every station.
    pub fn observation(&self) -> Vec<f64> {
        self.stations
            .iter()
            .flat_map(|station| station.get_state())
            .collect()
    }

    /// Restart the episode: empty stations, replay the arrival schedule.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        tracing::info!("Resetting engine with {} stations", self.stations.len());
        self.stations.iter_mut().for_each(ChargingStation::reset);
        self.current_step = 0;
        self.next_arrival = 0;
        self.rejected_arrivals = self.spawn_arrivals()?;
        Ok(())
    }
}

/// Baseline policy: charge at full share on every occupied port.
pub fn full_power_actions(station: &ChargingStation) -> Vec<f64> {
    (0..station.n_ports())
        .map(|port| if station.is_occupied(port) { 1.0 } else { 0.0 })
        .collect()
}
