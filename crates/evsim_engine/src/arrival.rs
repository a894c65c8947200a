use evsim_core::{Degradation, DegradingEv, EvProfile, LinearEv, ProfileError, Vehicle};
use serde::{Deserialize, Serialize};

/// Battery model used for an arriving vehicle.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum EvModel {
    #[default]
    Linear,
    Degrading {
        #[serde(default)]
        degradation: Degradation,
    },
}

/// A vehicle scheduled to plug into a station at `profile.time_of_arrival`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Arrival {
    /// Index of the target station in the engine.
    pub station: usize,
    #[serde(default)]
    pub model: EvModel,
    #[serde(default)]
    pub profile: EvProfile,
}

impl Arrival {
    /// Check every parameter `build` relies on.
    pub fn validate(&self) -> Result<(), ProfileError> {
        self.profile.validate()?;
        match self.model {
            EvModel::Linear => Ok(()),
            EvModel::Degrading { degradation } => degradation.validate(),
        }
    }

    pub fn build(&self) -> Result<Box<dyn Vehicle>, ProfileError> {
        let profile = self.profile.clone();
        Ok(match self.model {
            EvModel::Linear => Box::new(LinearEv::new(profile)?),
            EvModel::Degrading { degradation } => Box::new(DegradingEv::new(profile, degradation)?),
        })
    }
}
