/// Cumulative counters of a charging station over an episode.
///
/// Only the station mutates these; callers get a shared reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationStats {
    /// kWh delivered to vehicles.
    pub total_energy_charged: f64,
    /// kWh taken back from vehicles.
    pub total_energy_discharged: f64,
    pub total_profits: f64,
    pub total_evs_served: u64,
    pub total_user_satisfaction: f64,
}

impl StationStats {
    /// Average satisfaction of the departed vehicles, 0 when none departed yet.
    pub fn avg_user_satisfaction(&self) -> f64 {
        if self.total_evs_served == 0 {
            0.0
        } else {
            self.total_user_satisfaction / self.total_evs_served as f64
        }
    }

    pub(crate) fn record_departure(&mut self, user_satisfaction: f64) {
        self.total_evs_served += 1;
        self.total_user_satisfaction += user_satisfaction;
    }
}
