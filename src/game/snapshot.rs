//! Read-only view of the table for renderers and replays

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::sim::Body;

/// Position and rotation of one body
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

impl Pose {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

impl From<&Body> for Pose {
    fn from(body: &Body) -> Self {
        Self {
            x: body.position.x,
            y: body.position.y,
            angle: body.angle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BumperView {
    pub id: String,
    pub pose: Pose,
    pub radius: f32,
    pub is_hit: bool,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub ball: Pose,
    pub ball_velocity: Vec2,
    pub ball_radius: f32,
    pub left_flipper: Pose,
    pub right_flipper: Pose,
    pub left_flipper_active: bool,
    pub right_flipper_active: bool,
    pub plunger: Pose,
    pub plunger_compression: f32,
    pub bumpers: Vec<BumperView>,
    pub score: u64,
    pub highscore: u64,
    pub started: bool,
    pub game_over: bool,
    /// Show the "new highscore" banner
    pub new_highscore: bool,
}

impl TableSnapshot {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
