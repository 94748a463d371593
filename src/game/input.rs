//! Player input
//!
//! Events are applied between updates, never during a world step.

use serde::{Deserialize, Serialize};

use super::flipper::Side;

/// A single input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// Flipper button down
    FlipperPressed(Side),
    /// Flipper button up
    FlipperReleased(Side),
    /// Plunger key down: start pulling back
    PlungerHold,
    /// Sent once per frame while the plunger key stays down
    PlungerHoldTick,
    /// Plunger key up: fire with the power built up so far
    PlungerRelease,
}

impl InputEvent {
    /// Flipper events map to (side, pressed)
    pub fn flipper(self) -> Option<(Side, bool)> {
        match self {
            InputEvent::FlipperPressed(side) => Some((side, true)),
            InputEvent::FlipperReleased(side) => Some((side, false)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flipper_mapping() {
        assert_eq!(InputEvent::FlipperPressed(Side::Left).flipper(), Some((Side::Left, true)));
        assert_eq!(InputEvent::FlipperReleased(Side::Right).flipper(), Some((Side::Right, false)));
        assert_eq!(InputEvent::PlungerHoldTick.flipper(), None);
    }

    #[test]
    fn test_serializes_for_replays() {
        let json = serde_json::to_string(&InputEvent::FlipperPressed(Side::Right)).unwrap();
        assert_eq!(json, r#"{"FlipperPressed":"Right"}"#);
        let back: InputEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, InputEvent::FlipperPressed(Side::Right));
    }
}
