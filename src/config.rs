//! Table configuration
//!
//! Physics parameters, gameplay thresholds and table layout. Loaded from a
//! JSON file when one is given; missing fields take their defaults.

use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{BUMPER_POINTS, SIM_DT, SUBSTEPS_PER_UPDATE};
use crate::error::{PinballError, Result};

/// A bumper placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumperSpec {
    pub id: String,
    pub position: Vec2,
    pub points: u32,
}

impl BumperSpec {
    pub fn new(id: &str, x: f32, y: f32) -> Self {
        Self {
            id: id.to_string(),
            position: Vec2::new(x, y),
            points: BUMPER_POINTS,
        }
    }
}

/// Table layout, in screen coordinates (y grows downward)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableGeometry {
    /// Centre of the top arch
    pub arch_center: Vec2,
    /// Outer wall of the plunger lane; the arch spans symmetrically to it
    pub right_x: f32,
    /// Width of the plunger lane
    pub lane_width: f32,
    /// Where the side walls end and the inlane guides begin
    pub bottom_y: f32,
    /// Horizontal distance between the two flipper pivots
    pub flipper_spread: f32,
    pub flipper_y: f32,
    /// Drain sensor line, below the flippers
    pub drain_y: f32,
    /// Rest height of the plunger head
    pub plunger_y: f32,
    pub bumpers: Vec<BumperSpec>,
}

impl Default for TableGeometry {
    fn default() -> Self {
        Self {
            arch_center: Vec2::new(400.0, 200.0),
            right_x: 690.0,
            lane_width: 40.0,
            bottom_y: 600.0,
            flipper_spread: 150.0,
            flipper_y: 640.0,
            drain_y: 720.0,
            plunger_y: 650.0,
            bumpers: vec![
                BumperSpec::new("top_left", 220.0, 250.0),
                BumperSpec::new("top_right", 580.0, 250.0),
                BumperSpec::new("left_side", 180.0, 350.0),
                BumperSpec::new("right_side", 620.0, 350.0),
                BumperSpec::new("bottom_left_corner", 160.0, 570.0),
                BumperSpec::new("bottom_right_corner", 600.0, 570.0),
            ],
        }
    }
}

impl TableGeometry {
    pub fn arch_radius(&self) -> f32 {
        self.right_x - self.arch_center.x
    }

    /// Left side wall, mirror of the lane's outer wall about the arch centre
    pub fn left_x(&self) -> f32 {
        self.arch_center.x - self.arch_radius()
    }

    /// Inner wall of the plunger lane
    pub fn lane_left_x(&self) -> f32 {
        self.right_x - self.lane_width
    }

    pub fn lane_center_x(&self) -> f32 {
        self.right_x - self.lane_width * 0.5
    }

    pub fn plunger_rest(&self) -> Vec2 {
        Vec2::new(self.lane_center_x(), self.plunger_y)
    }

    pub fn left_pivot(&self) -> Vec2 {
        Vec2::new(self.arch_center.x - self.flipper_spread * 0.5, self.flipper_y)
    }

    pub fn right_pivot(&self) -> Vec2 {
        Vec2::new(self.arch_center.x + self.flipper_spread * 0.5, self.flipper_y)
    }
}

/// Complete table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    // === Physics ===
    pub gravity: Vec2,
    /// Fraction of velocity kept per second
    pub damping: f32,
    pub solver_iterations: usize,
    /// Sub-step length in seconds
    pub dt: f32,
    /// Sub-steps per `update()`
    pub substeps: u32,

    // === Gameplay thresholds ===
    /// Consecutive motionless sub-steps in the lane before a forced reset
    pub stuck_threshold: u32,
    /// Distance from the plunger head that triggers the catch-all reset
    pub catch_radius: f32,
    /// How far below the table bottom the ball may fall before the game ends
    pub out_of_bounds_margin: f32,
    /// Simulated seconds between ball position messages
    pub position_publish_interval: f32,
    /// Wall-clock seconds between game over and quit
    pub quit_grace_secs: f32,

    /// Seed for bumper jitter
    pub seed: u64,
    pub highscore_path: PathBuf,
    pub geometry: TableGeometry,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 500.0),
            damping: 0.95,
            solver_iterations: 10,
            dt: SIM_DT,
            substeps: SUBSTEPS_PER_UPDATE,

            stuck_threshold: 30,
            catch_radius: 20.0,
            out_of_bounds_margin: 800.0,
            position_publish_interval: 0.05,
            quit_grace_secs: 5.0,

            seed: 0x5eed_f11b,
            highscore_path: PathBuf::from("highscore.json"),
            geometry: TableGeometry::default(),
        }
    }
}

impl TableConfig {
    /// Load configuration from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                log::info!("Loaded table config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Using default table config ({}: {e})", path.display());
                Self::default()
            }
        }
    }

    /// Load and validate, reporting why a file was unusable
    pub fn try_load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::info!("Table config saved to {}", path.display());
        Ok(())
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PinballError::InvalidConfig(msg));
        if !self.gravity.is_finite() {
            return invalid("gravity must be finite".into());
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return invalid(format!("damping {} outside [0, 1]", self.damping));
        }
        if self.solver_iterations == 0 {
            return invalid("solver_iterations must be at least 1".into());
        }
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return invalid(format!("dt {} must be positive", self.dt));
        }
        if self.substeps == 0 {
            return invalid("substeps must be at least 1".into());
        }
        if self.catch_radius < 0.0 || self.out_of_bounds_margin < 0.0 {
            return invalid("catch_radius and out_of_bounds_margin must be non-negative".into());
        }
        if self.position_publish_interval < 0.0 || self.quit_grace_secs < 0.0 {
            return invalid("publish interval and quit grace must be non-negative".into());
        }

        let g = &self.geometry;
        if g.arch_radius() <= 0.0 {
            return invalid(format!(
                "right_x {} must lie right of the arch centre {}",
                g.right_x, g.arch_center.x
            ));
        }
        if !(g.lane_width > 0.0) || g.lane_width >= g.arch_radius() {
            return invalid(format!("lane_width {} out of range", g.lane_width));
        }
        if !(g.arch_center.y < g.bottom_y && g.bottom_y < g.flipper_y && g.flipper_y < g.drain_y) {
            return invalid("expected arch_center.y < bottom_y < flipper_y < drain_y".into());
        }
        if !(g.flipper_spread > 0.0) {
            return invalid("flipper_spread must be positive".into());
        }
        if g.bumpers.iter().any(|b| !b.position.is_finite()) {
            return invalid("bumper position must be finite".into());
        }
        Ok(())
    }

    /// Ball y beyond which the ball is considered lost
    pub fn out_of_bounds_y(&self) -> f32 {
        self.geometry.bottom_y + self.out_of_bounds_margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_matches_table() {
        let config = TableConfig::default();
        let g = &config.geometry;
        assert_eq!(g.left_x(), 110.0);
        assert_eq!(g.lane_left_x(), 650.0);
        assert_eq!(g.lane_center_x(), 670.0);
        assert_eq!(g.left_pivot(), Vec2::new(325.0, 640.0));
        assert_eq!(g.right_pivot(), Vec2::new(475.0, 640.0));
        assert_eq!(g.bumpers.len(), 6);
        assert_eq!(config.out_of_bounds_y(), 1400.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TableConfig::default();
        config.substeps = 0;
        assert!(matches!(config.validate(), Err(PinballError::InvalidConfig(_))));

        let mut config = TableConfig::default();
        config.damping = 1.5;
        assert!(config.validate().is_err());

        let mut config = TableConfig::default();
        config.geometry.drain_y = 500.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TableConfig = serde_json::from_str(r#"{"seed": 7, "geometry": {"flipper_y": 650.0}}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.geometry.flipper_y, 650.0);
        assert_eq!(config.geometry.bumpers.len(), 6);
        assert_eq!(config.stuck_threshold, 30);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("pinball_config_{}.json", std::process::id()));
        let mut config = TableConfig::default();
        config.seed = 1234;
        config.quit_grace_secs = 2.5;
        config.save(&path).unwrap();

        let loaded = TableConfig::load(&path);
        assert_eq!(loaded.seed, 1234);
        assert_eq!(loaded.quit_grace_secs, 2.5);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("pinball_config_does_not_exist.json");
        assert!(TableConfig::try_load(&path).is_err());
        let config = TableConfig::load(&path);
        assert_eq!(config.seed, TableConfig::default().seed);
    }
}
