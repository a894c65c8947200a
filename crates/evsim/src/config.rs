use std::path::Path;

use anyhow::{Context, bail};
use evsim_core::{ChargerConfig, ChargingStation};
use evsim_engine::{Arrival, Engine, StepPrices};
use serde::{Deserialize, Serialize};

/// A full simulation scenario, read from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    pub stations: Vec<ChargerConfig>,
    #[serde(default)]
    pub arrivals: Vec<Arrival>,
    /// One entry per simulation step
    pub prices: Vec<StepPrices>,
    /// Number of steps to play, defaults to the length of the price series
    pub simulation_length: Option<usize>,
}

impl ScenarioConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Build the engine; `verbose` switches on the narration of every station.
    pub fn into_engine(self, verbose: bool) -> anyhow::Result<Engine> {
        if self.stations.is_empty() {
            bail!("The scenario has no charging station");
        }

        let mut prices = self.prices;
        if let Some(length) = self.simulation_length {
            if length > prices.len() {
                bail!(
                    "Simulation length {} exceeds the {} price steps",
                    length,
                    prices.len()
                );
            }
            prices.truncate(length);
        }

        let stations = self
            .stations
            .into_iter()
            .map(|config| {
                let id = config.id;
                let verbose = verbose || config.verbose;
                ChargingStation::new(ChargerConfig { verbose, ..config })
                    .with_context(|| format!("Failed to create charging station {id}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Engine::new(stations, self.arrivals, prices).context("Failed to build the engine")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
    {
      "stations": [
        {"id": 1, "nPorts": 2},
        {"id": 2, "nPorts": 1, "chargerType": "DC", "voltage": 400.0, "maxChargeCurrent": 125.0}
      ],
      "arrivals": [
        {"station": 0, "profile": {"timeOfArrival": 0, "timeOfDeparture": 6}},
        {"station": 1, "model": {"type": "degrading"}, "profile": {"timeOfDeparture": 3}}
      ],
      "prices": [
        {"charge": 0.25, "discharge": 0.1},
        {"charge": 0.30, "discharge": 0.12},
        {"charge": 0.20, "discharge": 0.08}
      ],
      "simulationLength": 2
    }
    "#;

    #[test]
    fn test_json_deserialization() {
        let config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        assert_eq!(config.stations.len(), 2);
        assert_eq!(config.stations[1].max_charge_current, 125.0);
        assert_eq!(config.arrivals.len(), 2);
        assert_eq!(config.prices[1].charge, 0.30);
        assert_eq!(config.simulation_length, Some(2));
    }

    #[test]
    fn test_into_engine() {
        let config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        let engine = config.into_engine(true).unwrap();

        assert_eq!(engine.stations().len(), 2);
        assert!(engine.stations().iter().all(|s| s.get_config().verbose));
        assert_eq!(engine.stations()[0].n_evs_connected(), 1);
        assert!(!engine.is_done());
    }

    #[test]
    fn test_simulation_length_too_long() {
        let mut config: ScenarioConfig = serde_json::from_str(SCENARIO).unwrap();
        config.simulation_length = Some(10);
        assert!(config.into_engine(false).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let error = ScenarioConfig::load(Path::new("/nonexistent/scenario.json")).unwrap_err();
        assert!(error.to_string().contains("Failed to read config file"));
    }
}
