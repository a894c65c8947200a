use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChargerType, PortFlow, Vehicle};

#[derive(Error, Debug, PartialEq)]
pub enum ProfileError {
    #[error("Invalid EV profile: {reason}")]
    Invalid { reason: String },
}

/// Parameters of a single EV visit.
///
/// Energies are in kWh, powers in kW (the discharge limit is negative), times
/// in simulation steps and the timescale in minutes per step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvProfile {
    pub battery_capacity: f64,
    pub min_battery_capacity: f64,
    pub battery_capacity_at_arrival: f64,
    pub desired_capacity: f64,
    pub time_of_arrival: u64,
    pub time_of_departure: u64,
    pub max_ac_charge_power: f64,
    pub max_dc_charge_power: f64,
    pub max_discharge_power: f64,
    pub ev_phases: u8,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub timescale: u32,
}

impl Default for EvProfile {
    fn default() -> Self {
        EvProfile {
            battery_capacity: 50.0,
            min_battery_capacity: 10.0,
            battery_capacity_at_arrival: 25.0,
            desired_capacity: 50.0,
            time_of_arrival: 0,
            time_of_departure: 12,
            max_ac_charge_power: 22.0,
            max_dc_charge_power: 50.0,
            max_discharge_power: -22.0,
            ev_phases: 3,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            timescale: 5,
        }
    }
}

impl EvProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let reason = if !(self.battery_capacity > 0.0) {
            Some(format!(
                "battery capacity must be positive, got {}",
                self.battery_capacity
            ))
        } else if self.min_battery_capacity < 0.0
            || self.min_battery_capacity > self.battery_capacity
        {
            Some(format!(
                "minimum capacity {} is outside [0, {}]",
                self.min_battery_capacity, self.battery_capacity
            ))
        } else if self.battery_capacity_at_arrival < 0.0
            || self.battery_capacity_at_arrival > self.battery_capacity
        {
            Some(format!(
                "arrival capacity {} is outside [0, {}]",
                self.battery_capacity_at_arrival, self.battery_capacity
            ))
        } else if self.time_of_departure < self.time_of_arrival {
            Some(format!(
                "departure {} precedes arrival {}",
                self.time_of_departure, self.time_of_arrival
            ))
        } else if self.max_ac_charge_power < 0.0
            || self.max_dc_charge_power < 0.0
            || self.max_discharge_power > 0.0
        {
            Some("charge limits must be positive and the discharge limit negative".to_string())
        } else if !(self.charge_efficiency > 0.0 && self.charge_efficiency <= 1.0)
            || !(self.discharge_efficiency > 0.0 && self.discharge_efficiency <= 1.0)
        {
            Some("efficiencies must lie in (0, 1]".to_string())
        } else if self.ev_phases == 0 || self.timescale == 0 {
            Some("phases and timescale must be at least 1".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(ProfileError::Invalid { reason }),
            None => Ok(()),
        }
    }

    fn step_hours(&self) -> f64 {
        self.timescale as f64 / 60.0
    }
}

/// Stored energy bookkeeping shared by the battery models.
#[derive(Debug, Clone)]
struct Pack {
    profile: EvProfile,
    current_capacity: f64,
    port: Option<usize>,
}

impl Pack {
    fn new(profile: EvProfile) -> Result<Self, ProfileError> {
        profile.validate()?;
        Ok(Pack {
            current_capacity: profile.battery_capacity_at_arrival,
            profile,
            port: None,
        })
    }

    /// Exchange energy with the grid, charging no faster than `charge_cap_kw`
    /// and never above `usable_capacity`.
    fn exchange(
        &mut self,
        current: f64,
        voltage: f64,
        charger_type: ChargerType,
        charge_cap_kw: f64,
        usable_capacity: f64,
    ) -> PortFlow {
        if current == 0.0 || voltage <= 0.0 {
            return PortFlow::IDLE;
        }

        let phases = match charger_type {
            ChargerType::AC => self.profile.ev_phases as f64,
            ChargerType::DC => 1.0,
        };
        let hours = self.profile.step_hours();
        let requested_kw = current * voltage * phases / 1000.0;

        let energy = if requested_kw > 0.0 {
            let headroom = (usable_capacity - self.current_capacity).max(0.0)
                / self.profile.charge_efficiency;
            let energy = (requested_kw.min(charge_cap_kw) * hours).min(headroom);
            self.current_capacity += energy * self.profile.charge_efficiency;
            energy
        } else {
            let available = (self.current_capacity - self.profile.min_battery_capacity).max(0.0)
                * self.profile.discharge_efficiency;
            let energy = (requested_kw.max(self.profile.max_discharge_power) * hours).max(-available);
            self.current_capacity += energy / self.profile.discharge_efficiency;
            energy
        };

        PortFlow {
            power: energy,
            current: energy / hours * 1000.0 / (voltage * phases),
        }
    }

    fn user_satisfaction(&self) -> f64 {
        if self.profile.desired_capacity <= 0.0 {
            return 1.0;
        }
        (self.current_capacity / self.profile.desired_capacity).min(1.0)
    }

    fn is_departing(&self, timestep: u64) -> Option<f64> {
        (timestep >= self.profile.time_of_departure).then(|| self.user_satisfaction())
    }

    fn state(&self, soc: f64, timestep: u64) -> [f64; 2] {
        [
            soc,
            self.profile.time_of_departure as f64 - timestep as f64,
        ]
    }
}

/// Battery that accepts any power up to the charger and vehicle limits.
#[derive(Debug, Clone)]
pub struct LinearEv {
    pack: Pack,
}

impl LinearEv {
    pub fn new(profile: EvProfile) -> Result<Self, ProfileError> {
        Ok(LinearEv {
            pack: Pack::new(profile)?,
        })
    }

    pub fn profile(&self) -> &EvProfile {
        &self.pack.profile
    }

    /// Energy currently stored, in kWh.
    pub fn current_capacity(&self) -> f64 {
        self.pack.current_capacity
    }
}

impl Vehicle for LinearEv {
    fn step(&mut self, current: f64, voltage: f64, charger_type: ChargerType) -> PortFlow {
        let cap = match charger_type {
            ChargerType::AC => self.pack.profile.max_ac_charge_power,
            ChargerType::DC => self.pack.profile.max_dc_charge_power,
        };
        let usable = self.pack.profile.battery_capacity;
        self.pack.exchange(current, voltage, charger_type, cap, usable)
    }

    fn is_departing(&self, timestep: u64) -> Option<f64> {
        self.pack.is_departing(timestep)
    }

    fn soc(&self) -> f64 {
        self.pack.current_capacity / self.pack.profile.battery_capacity
    }

    fn user_satisfaction(&self) -> f64 {
        self.pack.user_satisfaction()
    }

    fn state(&self, timestep: u64) -> [f64; 2] {
        self.pack.state(self.soc(), timestep)
    }

    fn assign_port(&mut self, port: usize) {
        self.pack.port = Some(port);
    }

    fn port(&self) -> Option<usize> {
        self.pack.port
    }

    fn departure_step(&self) -> u64 {
        self.pack.profile.time_of_departure
    }
}

/// Aging coefficients of a [`DegradingEv`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Degradation {
    /// Above this SoC the charge power tapers linearly to zero at full charge.
    pub transition_soc: f64,
    /// Capacity fraction lost per kWh of throughput per kWh of capacity.
    pub cyclic_aging: f64,
    /// Capacity fraction lost per hour, whether or not the vehicle is used.
    pub calendar_aging: f64,
}

impl Default for Degradation {
    fn default() -> Self {
        Degradation {
            transition_soc: 0.8,
            cyclic_aging: 1e-4,
            calendar_aging: 2e-6,
        }
    }
}

impl Degradation {
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !(0.0..1.0).contains(&self.transition_soc) {
            return Err(ProfileError::Invalid {
                reason: format!("transition SoC {} is outside [0, 1)", self.transition_soc),
            });
        }
        if self.cyclic_aging < 0.0 || self.calendar_aging < 0.0 {
            return Err(ProfileError::Invalid {
                reason: "aging coefficients must not be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Battery with a two stage (constant current, constant voltage) charge curve
/// and capacity fade.
#[derive(Debug, Clone)]
pub struct DegradingEv {
    pack: Pack,
    degradation: Degradation,
    capacity_fade: f64,
}

impl DegradingEv {
    pub fn new(profile: EvProfile, degradation: Degradation) -> Result<Self, ProfileError> {
        degradation.validate()?;
        Ok(DegradingEv {
            pack: Pack::new(profile)?,
            degradation,
            capacity_fade: 0.0,
        })
    }

    /// Fraction of the nominal capacity lost so far.
    pub fn capacity_fade(&self) -> f64 {
        self.capacity_fade
    }

    pub fn usable_capacity(&self) -> f64 {
        self.pack.profile.battery_capacity * (1.0 - self.capacity_fade)
    }

    pub fn current_capacity(&self) -> f64 {
        self.pack.current_capacity
    }

    fn charge_cap(&self, charger_type: ChargerType) -> f64 {
        let cap = match charger_type {
            ChargerType::AC => self.pack.profile.max_ac_charge_power,
            ChargerType::DC => self.pack.profile.max_dc_charge_power,
        };
        let soc = self.soc();
        let transition = self.degradation.transition_soc;
        if soc <= transition {
            cap
        } else {
            cap * ((1.0 - soc) / (1.0 - transition)).max(0.0)
        }
    }

    fn age(&mut self, throughput: f64) {
        let profile = &self.pack.profile;
        let calendar = self.degradation.calendar_aging * profile.step_hours();
        let cyclic = self.degradation.cyclic_aging * throughput.abs() / profile.battery_capacity;
        self.capacity_fade = (self.capacity_fade + calendar + cyclic).min(1.0);

        let usable = self.usable_capacity();
        if self.pack.current_capacity > usable {
            self.pack.current_capacity = usable;
        }
    }
}

impl Vehicle for DegradingEv {
    fn step(&mut self, current: f64, voltage: f64, charger_type: ChargerType) -> PortFlow {
        let cap = self.charge_cap(charger_type);
        let usable = self.usable_capacity();
        let flow = self
            .pack
            .exchange(current, voltage, charger_type, cap, usable);
        self.age(flow.power);
        flow
    }

    fn is_departing(&self, timestep: u64) -> Option<f64> {
        self.pack.is_departing(timestep)
    }

    fn soc(&self) -> f64 {
        let usable = self.usable_capacity();
        if usable <= 0.0 {
            return 0.0;
        }
        (self.pack.current_capacity / usable).min(1.0)
    }

    fn user_satisfaction(&self) -> f64 {
        self.pack.user_satisfaction()
    }

    fn state(&self, timestep: u64) -> [f64; 2] {
        self.pack.state(self.soc(), timestep)
    }

    fn assign_port(&mut self, port: usize) {
        self.pack.port = Some(port);
    }

    fn port(&self) -> Option<usize> {
        self.pack.port
    }

    fn departure_step(&self) -> u64 {
        self.pack.profile.time_of_departure
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    // 60 minute steps keep kW and kWh numerically equal.
    fn hourly_profile() -> EvProfile {
        EvProfile {
            timescale: 60,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_profile() {
        let profile = EvProfile {
            min_battery_capacity: 60.0,
            ..Default::default()
        };
        assert!(matches!(
            LinearEv::new(profile),
            Err(ProfileError::Invalid { .. })
        ));

        let profile = EvProfile {
            time_of_arrival: 10,
            time_of_departure: 5,
            ..Default::default()
        };
        assert!(LinearEv::new(profile).is_err());
    }

    #[test]
    fn test_linear_charge_ac() {
        let mut ev = LinearEv::new(hourly_profile()).unwrap();

        // 16 A on three 230 V phases
        let flow = ev.step(16.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, 11.04, epsilon = 1e-9);
        assert_abs_diff_eq!(flow.current, 16.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ev.current_capacity(), 36.04, epsilon = 1e-9);
    }

    #[test]
    fn test_linear_charge_stops_at_capacity() {
        let profile = EvProfile {
            battery_capacity_at_arrival: 45.0,
            ..hourly_profile()
        };
        let mut ev = LinearEv::new(profile).unwrap();

        let flow = ev.step(32.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, 5.0, epsilon = 1e-9);
        assert!(flow.current < 32.0);
        assert_abs_diff_eq!(ev.soc(), 1.0, epsilon = 1e-12);

        let flow = ev.step(32.0, 230.0, ChargerType::AC);
        assert_eq!(flow, PortFlow::IDLE);
    }

    #[test]
    fn test_linear_charge_capped_by_vehicle() {
        let profile = EvProfile {
            max_ac_charge_power: 7.0,
            ..hourly_profile()
        };
        let mut ev = LinearEv::new(profile).unwrap();

        let flow = ev.step(32.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_linear_discharge_respects_min_capacity() {
        let profile = EvProfile {
            battery_capacity_at_arrival: 12.0,
            ..hourly_profile()
        };
        let mut ev = LinearEv::new(profile).unwrap();

        let flow = ev.step(-32.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, -2.0, epsilon = 1e-9);
        assert!(flow.current < 0.0);
        assert_abs_diff_eq!(ev.current_capacity(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_dc_uses_single_phase() {
        let mut ev = LinearEv::new(hourly_profile()).unwrap();

        let flow = ev.step(100.0, 400.0, ChargerType::DC);
        assert_abs_diff_eq!(flow.power, 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(flow.current, 62.5, epsilon = 1e-9);
    }

    #[test]
    fn test_departure_and_satisfaction() {
        let profile = EvProfile {
            battery_capacity_at_arrival: 20.0,
            desired_capacity: 40.0,
            time_of_departure: 3,
            ..hourly_profile()
        };
        let ev = LinearEv::new(profile).unwrap();

        assert_eq!(ev.is_departing(2), None);
        assert_eq!(ev.is_departing(3), Some(0.5));
        assert_eq!(ev.state(1), [0.4, 2.0]);
    }

    #[test]
    fn test_zero_request_is_idle() {
        let mut ev = LinearEv::new(hourly_profile()).unwrap();
        assert_eq!(ev.step(0.0, 230.0, ChargerType::AC), PortFlow::IDLE);
        assert_eq!(ev.current_capacity(), 25.0);
    }

    #[test]
    fn test_degrading_tapers_above_transition() {
        let degradation = Degradation {
            transition_soc: 0.8,
            cyclic_aging: 0.0,
            calendar_aging: 0.0,
        };
        let ev_at = |stored: f64| {
            let profile = EvProfile {
                battery_capacity: 200.0,
                desired_capacity: 200.0,
                battery_capacity_at_arrival: stored,
                ..hourly_profile()
            };
            DegradingEv::new(profile, degradation).unwrap()
        };

        // Below the transition the full 22 kW vehicle limit applies
        let flow = ev_at(100.0).step(32.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, 22.0, epsilon = 1e-9);

        // SoC 0.85: a quarter of the taper consumed
        let flow = ev_at(170.0).step(32.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, 16.5, epsilon = 1e-9);

        // SoC 0.9: halfway
        let flow = ev_at(180.0).step(32.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(flow.power, 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degrading_idle_step_ages_battery() {
        let degradation = Degradation {
            calendar_aging: 1e-3,
            ..Default::default()
        };
        let mut ev = DegradingEv::new(hourly_profile(), degradation).unwrap();

        let flow = ev.step(0.0, 230.0, ChargerType::AC);
        assert_eq!(flow, PortFlow::IDLE);
        assert_abs_diff_eq!(ev.capacity_fade(), 1e-3, epsilon = 1e-12);
        assert!(ev.usable_capacity() < 50.0);
    }

    #[test]
    fn test_degrading_cyclic_aging_grows_with_throughput() {
        let degradation = Degradation {
            calendar_aging: 0.0,
            cyclic_aging: 1e-2,
            ..Default::default()
        };
        let mut ev = DegradingEv::new(hourly_profile(), degradation).unwrap();

        let flow = ev.step(16.0, 230.0, ChargerType::AC);
        assert_abs_diff_eq!(
            ev.capacity_fade(),
            1e-2 * flow.power / 50.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_degrading_rejects_bad_transition() {
        let degradation = Degradation {
            transition_soc: 1.0,
            ..Default::default()
        };
        assert!(DegradingEv::new(EvProfile::default(), degradation).is_err());
    }
}
