//! Configuration types for the snake grid world and its observation encoding.

use serde::{Deserialize, Serialize};

/// Smallest board width that fits the canonical three-cell starting snake.
pub const MIN_BOARD_WIDTH: usize = 4;

fn default_width() -> usize {
    10
}

fn default_height() -> usize {
    10
}

fn default_grow_on_eat() -> bool {
    true
}

/// Grid world configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Board width in cells.
    #[serde(default = "default_width")]
    pub width: usize,
    /// Board height in cells.
    #[serde(default = "default_height")]
    pub height: usize,
    /// Energy budget granted on reset and after every apple.
    /// Defaults to the board area when unset.
    #[serde(default)]
    pub initial_energy: Option<u32>,
    /// Whether eating an apple lengthens the snake.
    #[serde(default = "default_grow_on_eat")]
    pub grow_on_eat: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            initial_energy: None,
            grow_on_eat: default_grow_on_eat(),
        }
    }
}

impl GameConfig {
    /// Number of cells on the board.
    #[inline]
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Energy cap, falling back to the board area.
    #[inline]
    pub fn energy_cap(&self) -> u32 {
        self.initial_energy
            .unwrap_or_else(|| u32::try_from(self.area()).unwrap_or(u32::MAX))
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < MIN_BOARD_WIDTH || self.height == 0 {
            return Err(ConfigError::BoardTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        if self.initial_energy == Some(0) {
            return Err(ConfigError::ZeroEnergy);
        }
        Ok(())
    }
}

/// Which feature layout the encoder produces. The first layer of the network
/// must be exactly [`ObservationKind::feature_count`] wide.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ObservationKind {
    /// `[danger_forward, danger_right, danger_left, apple_distance, apple_angle, energy]`
    Basic,
    /// `[danger_forward, danger_right, danger_left, apple_angle, length,
    /// reach_forward, reach_right, reach_left]`
    #[default]
    TailReach,
}

impl ObservationKind {
    /// Number of features produced.
    pub const fn feature_count(self) -> usize {
        match self {
            Self::Basic => 6,
            Self::TailReach => 8,
        }
    }
}

fn default_fps() -> u32 {
    50
}

/// Display preferences for the replay viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Print every frame when replaying a genome.
    #[serde(default)]
    pub live: bool,
    /// Playback speed in frames per second.
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            live: false,
            fps: default_fps(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Board {width}x{height} is too small (width must be at least 4, height at least 1)")]
    BoardTooSmall { width: usize, height: usize },
    #[error("Initial energy must be positive")]
    ZeroEnergy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_energy_defaults_to_area() {
        let config = GameConfig {
            width: 7,
            height: 5,
            ..Default::default()
        };
        assert_eq!(config.energy_cap(), 35);

        let config = GameConfig {
            initial_energy: Some(12),
            ..config
        };
        assert_eq!(config.energy_cap(), 12);
    }

    #[test]
    fn test_rejects_narrow_board() {
        let config = GameConfig {
            width: 3,
            height: 10,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BoardTooSmall { width: 3, .. })
        ));
    }

    #[test]
    fn test_minimal_board_and_zero_energy() {
        let config = GameConfig {
            width: 4,
            height: 1,
            ..Default::default()
        };
        // 4 cells, 3 taken by the snake: still one free cell.
        assert!(config.validate().is_ok());

        let config = GameConfig {
            initial_energy: Some(0),
            ..config
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroEnergy)));
    }

    #[test]
    fn test_serde_defaults() {
        let config: GameConfig = serde_json::from_str(r#"{"width": 8}"#).unwrap();
        assert_eq!(config.width, 8);
        assert_eq!(config.height, 10);
        assert!(config.grow_on_eat);
        assert_eq!(config.initial_energy, None);
    }
}
