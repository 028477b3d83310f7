use serde::{Deserialize, Serialize};

use crate::{
    Position, fusion::FusionEngine, navigation::DecisionRules, population::PopulationConfig,
    world::Bounds,
};

/// Reasons a configuration is rejected before the simulation starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("World dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("At least one GPS target is required")]
    NoTargets,
    #[error("Minimum confidence threshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),
    #[error("{what} {position} lies outside the {width}x{height} world")]
    OutsideWorld {
        what: &'static str,
        position: Position,
        width: u32,
        height: u32,
    },
    #[error("The tick budget must be at least 1")]
    ZeroTickBudget,
}

/// Everything needed to build and run one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub width: u32,
    pub height: u32,
    /// Where the car starts.
    pub start: Position,
    /// GPS targets, visited in order.
    pub targets: Vec<Position>,
    pub population: PopulationConfig,
    /// Seed for every random draw. Unset runs as seed 0.
    pub seed: Option<u64>,
    pub max_ticks: u32,
    pub min_confidence: f64,
    pub rules: DecisionRules,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            width: 40,
            height: 40,
            start: Position::new(0, 0),
            targets: Vec::new(),
            population: PopulationConfig::default(),
            seed: None,
            max_ticks: 100,
            min_confidence: FusionEngine::DEFAULT_MIN_CONFIDENCE,
            rules: DecisionRules::default(),
        }
    }
}

impl SimConfig {
    /// Checks everything the simulation assumes about its inputs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(ConfigError::InvalidDimensions { width, height });
        }
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::ThresholdOutOfRange(self.min_confidence));
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::ZeroTickBudget);
        }

        let bounds = Bounds::new(width, height);
        if !bounds.contains(self.start) {
            return Err(ConfigError::OutsideWorld {
                what: "Start position",
                position: self.start,
                width,
                height,
            });
        }
        if let Some(target) = self.targets.iter().find(|t| !bounds.contains(**t)) {
            return Err(ConfigError::OutsideWorld {
                what: "Target",
                position: *target,
                width,
                height,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SimConfig {
        SimConfig {
            targets: vec![Position::new(10, 10)],
            ..SimConfig::default()
        }
    }

    #[test]
    fn defaults_plus_a_target_are_valid() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_inputs() {
        let mut config = valid();
        config.width = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDimensions {
                width: 0,
                height: 40
            })
        );

        let mut config = valid();
        config.targets.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoTargets));

        let mut config = valid();
        config.min_confidence = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::ThresholdOutOfRange(1.5)));

        let mut config = valid();
        config.max_ticks = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickBudget));

        let mut config = valid();
        config.targets.push(Position::new(40, 3));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutsideWorld { what: "Target", .. })
        ));

        let mut config = valid();
        config.start = Position::new(-1, 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutsideWorld {
                what: "Start position",
                ..
            })
        ));
    }
}
