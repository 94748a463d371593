//! Gameplay on top of the rigid-body world
//!
//! Pure game logic with no platform dependencies.

pub mod ball;
pub mod bumper;
pub mod flipper;
pub mod input;
pub mod manager;
pub mod playfield;
pub mod plunger;
pub mod session;
pub mod snapshot;

pub use ball::Ball;
pub use bumper::Bumper;
pub use flipper::{Flipper, Side};
pub use input::InputEvent;
pub use manager::{PinballGame, Table};
pub use playfield::{LaneBounds, Playfield};
pub use plunger::Plunger;
pub use session::{EndReason, GameSession};
pub use snapshot::{BumperView, Pose, TableSnapshot};
