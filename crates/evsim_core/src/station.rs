use std::fmt;

use crate::normalize::{normalize_actions, round_action};
use crate::{ChargerConfig, PortFlow, StationError, StationStats, Vehicle};

/// Slack allowed on the aggregate current before it counts as a violation.
const CURRENT_TOLERANCE: f64 = 1e-4;

/// Outcome of one [`ChargingStation::step`].
#[derive(Debug, Default)]
pub struct StepReport {
    /// Revenue of the step, `|energy| * price` summed over the ports.
    pub profit: f64,
    /// Satisfaction of every vehicle that left during the step, in port order.
    pub user_satisfaction: Vec<f64>,
    /// Number of actions that targeted an empty port.
    pub invalid_actions: usize,
    /// Vehicles released by the station during the step.
    pub departed: Vec<Box<dyn Vehicle>>,
}

/// A multi-port EV charger stepped once per simulation timestep.
#[derive(Debug)]
pub struct ChargingStation {
    config: ChargerConfig,
    current_power_output: f64,
    current_total_amps: f64,
    current_charge_price: f64,
    current_discharge_price: f64,
    current_step: u64,
    ports: Vec<Option<Box<dyn Vehicle>>>,
    n_evs_connected: usize,
    stats: StationStats,
}

impl ChargingStation {
    pub fn new(config: ChargerConfig) -> Result<Self, StationError> {
        config.validate()?;
        tracing::info!(
            "Creating {} charging station {} with {} ports on bus {}",
            config.charger_type,
            config.id,
            config.n_ports,
            config.connected_bus
        );
        let ports = (0..config.n_ports).map(|_| None).collect();
        Ok(ChargingStation {
            config,
            current_power_output: 0.0,
            current_total_amps: 0.0,
            current_charge_price: 0.0,
            current_discharge_price: 0.0,
            current_step: 0,
            ports,
            n_evs_connected: 0,
            stats: StationStats::default(),
        })
    }

    pub fn id(&self) -> u32 {
        self.config.id
    }

    pub fn get_config(&self) -> &ChargerConfig {
        &self.config
    }

    pub fn get_stats(&self) -> &StationStats {
        &self.stats
    }

    pub fn n_ports(&self) -> usize {
        self.ports.len()
    }

    pub fn n_evs_connected(&self) -> usize {
        self.n_evs_connected
    }

    pub fn free_ports(&self) -> usize {
        self.n_ports() - self.n_evs_connected
    }

    /// The vehicle plugged into `port`, if any.
    pub fn port(&self, port: usize) -> Option<&dyn Vehicle> {
        self.ports.get(port).and_then(|slot| slot.as_deref())
    }

    pub fn is_occupied(&self, port: usize) -> bool {
        self.port(port).is_some()
    }

    /// Signed energy exchanged during the last step: positive when drawing
    /// from the grid, negative when feeding it.
    pub fn current_power_output(&self) -> f64 {
        self.current_power_output
    }

    pub fn current_total_amps(&self) -> f64 {
        self.current_total_amps
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// `(charge, discharge)` prices of the last step.
    pub fn current_prices(&self) -> (f64, f64) {
        (self.current_charge_price, self.current_discharge_price)
    }

    pub fn get_avg_user_satisfaction(&self) -> f64 {
        self.stats.avg_user_satisfaction()
    }

    /// Advance the station by one timestep.
    ///
    /// `actions` holds one value per port: positive to charge, negative to
    /// discharge, as a fraction of the station capacity. Actions on empty
    /// ports are ignored and counted in [`StepReport::invalid_actions`].
    pub fn step(
        &mut self,
        actions: &[f64],
        charge_price: f64,
        discharge_price: f64,
    ) -> Result<StepReport, StationError> {
        if actions.len() != self.n_ports() {
            return Err(StationError::ActionCount {
                station_id: self.config.id,
                expected: self.n_ports(),
                actual: actions.len(),
            });
        }

        self.current_power_output = 0.0;
        self.current_total_amps = 0.0;
        self.current_charge_price = charge_price;
        self.current_discharge_price = discharge_price;

        let mut report = StepReport::default();
        let mut actions = actions.to_vec();
        for (action, slot) in actions.iter_mut().zip(&self.ports) {
            if slot.is_none() {
                *action = 0.0;
                report.invalid_actions += 1;
            }
        }

        let actions: Vec<f64> = normalize_actions(&actions)
            .into_iter()
            .map(round_action)
            .collect();
        if self.config.verbose {
            tracing::info!("CS {} normalized actions: {:?}", self.config.id, actions);
        }
        if let Some((port, &action)) = actions
            .iter()
            .enumerate()
            .find(|(_, a)| !(-1.0..=1.0).contains(*a))
        {
            tracing::error!(
                "CS {} port {} normalized action {} is out of range",
                self.config.id,
                port,
                action
            );
            return Err(StationError::ActionOutOfRange {
                station_id: self.config.id,
                port,
                action,
            });
        }

        for (port, &action) in actions.iter().enumerate() {
            let flow = self.dispatch(port, action);

            let price = if action > 0.0 {
                charge_price
            } else {
                discharge_price
            };
            report.profit += flow.power.abs() * price;
            if action > 0.0 {
                self.stats.total_energy_charged += flow.power.abs();
            } else if action < 0.0 {
                self.stats.total_energy_discharged += flow.power.abs();
            }
            self.current_power_output += flow.power;
            self.current_total_amps += flow.current;

            if self.current_total_amps - CURRENT_TOLERANCE > self.config.max_charge_current {
                tracing::error!(
                    "CS {} aggregate current {} A exceeds max charge current {} A",
                    self.config.id,
                    self.current_total_amps,
                    self.config.max_charge_current
                );
                return Err(StationError::CurrentLimitExceeded {
                    station_id: self.config.id,
                    total_current: self.current_total_amps,
                    max_charge_current: self.config.max_charge_current,
                });
            }

            if self.config.verbose && self.ports[port].is_some() {
                tracing::debug!(
                    "Actual power: {} kWh | Actual amps: {} A | Action: {}",
                    flow.power,
                    flow.current,
                    action
                );
            }
        }

        self.stats.total_profits += report.profit;
        self.release_departing(&mut report);
        self.current_step += 1;

        Ok(report)
    }

    /// Translate a normalized action into a current request for one port.
    fn dispatch(&mut self, port: usize, action: f64) -> PortFlow {
        let voltage = self.config.voltage;
        let charger_type = self.config.charger_type;
        let Some(ev) = self.ports[port].as_deref_mut() else {
            return PortFlow::IDLE;
        };

        if action > 0.0 {
            let mut amps = action * self.config.max_charge_current;
            if amps < self.config.min_charge_current {
                amps = 0.0;
            }
            ev.step(amps, voltage, charger_type)
        } else if action < 0.0 {
            if !self.config.bi_directional {
                return PortFlow::IDLE;
            }
            // Discharge at no less than the minimum discharge current
            let amps =
                (action * self.config.max_charge_current.abs()).min(self.config.min_discharge_current);
            ev.step(amps, voltage, charger_type)
        } else {
            ev.step(0.0, voltage, charger_type)
        }
    }

    fn release_departing(&mut self, report: &mut StepReport) {
        for (port, slot) in self.ports.iter_mut().enumerate() {
            let departing = slot
                .as_deref()
                .is_some_and(|ev| ev.is_departing(self.current_step).is_some());
            if !departing {
                continue;
            }
            let Some(ev) = slot.take() else {
                continue;
            };
            let user_satisfaction = ev.user_satisfaction();

            self.n_evs_connected -= 1;
            self.stats.record_departure(user_satisfaction);
            report.user_satisfaction.push(user_satisfaction);
            if self.config.verbose {
                tracing::info!(
                    "- EV {} is departing from CS {} port {} with user satisfaction {:.3} (SoC: {:.1}%)",
                    port,
                    self.config.id,
                    port,
                    user_satisfaction,
                    ev.soc() * 100.0
                );
            }
            report.departed.push(ev);
        }
    }

    /// Plug `ev` into the first free port and return the port index.
    pub fn spawn_ev(&mut self, mut ev: Box<dyn Vehicle>) -> Result<usize, StationError> {
        let Some(port) = self.ports.iter().position(Option::is_none) else {
            tracing::error!("CS {} has no free port", self.config.id);
            return Err(StationError::NoFreePort {
                station_id: self.config.id,
            });
        };

        ev.assign_port(port);
        if self.config.verbose {
            tracing::info!(
                "+ EV connected to Charger {} at port {} leaving at {} SoC {:.1}%",
                self.config.id,
                port,
                ev.departure_step(),
                ev.soc() * 100.0
            );
        }
        self.ports[port] = Some(ev);
        self.n_evs_connected += 1;
        Ok(port)
    }

    /// Observation vector: both prices, then two values per port (zeros for
    /// an empty port).
    pub fn get_state(&self) -> Vec<f64> {
        let mut state = Vec::with_capacity(2 + 2 * self.n_ports());
        state.push(self.current_charge_price);
        state.push(self.current_discharge_price);
        for slot in &self.ports {
            match slot {
                Some(ev) => state.extend(ev.state(self.current_step)),
                None => state.extend([0.0, 0.0]),
            }
        }
        state
    }

    /// Back to the start of an episode. Connected vehicles are dropped; the
    /// configuration and the last prices are kept.
    pub fn reset(&mut self) {
        tracing::info!("Resetting CS {}", self.config.id);
        self.current_power_output = 0.0;
        self.current_total_amps = 0.0;
        self.current_step = 0;
        self.ports.iter_mut().for_each(|slot| *slot = None);
        self.n_evs_connected = 0;
        self.stats = StationStats::default();
    }
}

impl fmt::Display for ChargingStation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CS{:3}:  Served {:4} EVs",
            self.config.id, self.stats.total_evs_served
        )?;
        if self.stats.total_evs_served == 0 {
            write!(f, " Avg. Sat.:  - ")?;
        } else {
            write!(
                f,
                " Avg. Sat.: {:5.1}%",
                self.get_avg_user_satisfaction() * 100.0
            )?;
        }
        write!(
            f,
            " in {:5} steps |{:7.1} € | +{:5.1} / -{:5.1} kWh",
            self.current_step,
            self.stats.total_profits,
            self.stats.total_energy_charged,
            self.stats.total_energy_discharged
        )
    }
}
