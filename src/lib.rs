//! Pinball - a single-table pinball simulation
//!
//! Core modules:
//! - `sim`: Rigid-body world (bodies, shapes, constraints, collision handlers)
//! - `game`: Playfield, actuators and the game manager driving them
//! - `telemetry`: Fire-and-forget status/score/position publishing
//! - `highscores`: Persisted best score
//! - `config`: Data-driven table configuration

pub mod config;
pub mod error;
pub mod game;
pub mod highscores;
pub mod sim;
pub mod telemetry;

pub use config::{BumperSpec, TableConfig, TableGeometry};
pub use error::{PinballError, Result};
pub use game::{InputEvent, PinballGame, Side, TableSnapshot};
pub use highscores::{HighscoreStore, JsonHighscoreStore, MemoryHighscoreStore};
pub use telemetry::{GameStatus, LogTelemetry, Payload, Telemetry};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (two sub-steps per 45 Hz update)
    pub const SIM_DT: f32 = 1.0 / 90.0;
    /// Physics sub-steps per game update
    pub const SUBSTEPS_PER_UPDATE: u32 = 2;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 15.0;
    pub const BALL_DENSITY: f32 = 0.02;
    pub const BALL_ELASTICITY: f32 = 0.5;
    pub const BALL_FRICTION: f32 = 0.3;

    /// Wall segments
    pub const WALL_THICKNESS: f32 = 3.0;
    pub const WALL_ELASTICITY: f32 = 0.7;
    pub const WALL_FRICTION: f32 = 0.5;
    /// Speed kept after bouncing off a wall
    pub const WALL_REFLECT_DAMPING: f32 = 0.9;
    /// Segments approximating the top arch
    pub const ARCH_SEGMENTS: usize = 20;

    /// Flipper geometry and drive
    pub const FLIPPER_LENGTH: f32 = 60.0;
    pub const FLIPPER_BASE_HALF_WIDTH: f32 = 7.0;
    pub const FLIPPER_TIP_HALF_WIDTH: f32 = 4.0;
    pub const FLIPPER_MASS: f32 = 10.0;
    pub const FLIPPER_ELASTICITY: f32 = 0.4;
    pub const FLIPPER_FRICTION: f32 = 0.6;
    /// Swing range either side of horizontal (radians)
    pub const FLIPPER_ANGLE_LIMIT: f32 = 0.4;
    pub const FLIPPER_SPRING_STIFFNESS: f32 = 2.0e6;
    pub const FLIPPER_SPRING_DAMPING: f32 = 3.0e5;
    pub const FLIPPER_MOTOR_RATE: f32 = 20.0;
    pub const FLIPPER_MOTOR_MAX_FORCE: f32 = 5.0e7;
    /// Kick impulse = base + surface speed * factor
    pub const FLIPPER_KICK_BASE: f32 = 500.0;
    pub const FLIPPER_KICK_SPEED_FACTOR: f32 = 0.8;

    /// Plunger
    pub const PLUNGER_RADIUS: f32 = 20.0;
    pub const PLUNGER_SENSOR_RADIUS: f32 = 30.0;
    pub const PLUNGER_ELASTICITY: f32 = 0.6;
    pub const PLUNGER_MAX_COMPRESSION: f32 = 50.0;
    pub const PLUNGER_SPRING_CONSTANT: f32 = 500.0;
    /// Ball is placed this far above the plunger rest point before launch
    pub const PLUNGER_LAUNCH_OFFSET: f32 = 40.0;
    /// Upward impulse when the ball is caught under the plunger head
    pub const PLUNGER_CATCH_IMPULSE: f32 = 3000.0;
    pub const PLUNGER_CATCH_GAP: f32 = 5.0;
    /// Ball snapped this far above the head when it slips out of the sensor downward
    pub const PLUNGER_RELEASE_OFFSET: f32 = 30.0;
    pub const PLUNGER_RELEASE_SPEED: f32 = 100.0;
    /// Compression added per hold tick
    pub const PLUNGER_HOLD_STEP: f32 = 2.0;

    /// Bumpers
    pub const BUMPER_RADIUS: f32 = 23.0;
    pub const BUMPER_POINTS: u32 = 10;
    pub const BUMPER_ELASTICITY: f32 = 0.9;
    /// Extra speed along the contact normal on a bumper hit
    pub const BUMPER_KICK: f32 = 150.0;
    /// Game ticks a bumper stays lit after a hit
    pub const BUMPER_HIT_TICKS: u32 = 10;
    /// Maximum jitter offset while lit (per axis)
    pub const BUMPER_JITTER: f32 = 2.0;

    /// Ball reset height above the plunger head
    pub const RESET_OFFSET: f32 = 40.0;
    /// Horizontal slack around the plunger lane for the stuck test
    pub const LANE_MARGIN: f32 = 15.0;
    /// Depth of the stuck-test rectangle below the table bottom
    pub const LANE_STUCK_DEPTH: f32 = 150.0;
    /// Speeds under which a ball in the lane counts as motionless
    pub const STUCK_MAX_VX: f32 = 10.0;
    pub const STUCK_MAX_VY: f32 = 50.0;
}
