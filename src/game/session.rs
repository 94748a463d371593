//! Per-session bookkeeping

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// Ball crossed the drain sensor
    Drained,
    /// Ball fell far below the table
    OutOfBounds,
}

/// Score and lifecycle flags for one game
///
/// `score` only grows and `game_over` latches; both are enforced here.
#[derive(Debug, Clone, Default)]
pub struct GameSession {
    score: u64,
    pub highscore: u64,
    game_over: bool,
    end_reason: Option<EndReason>,
    ended_at: Option<Instant>,
    started: bool,
    /// A new highscore was set this session
    pub new_highscore: bool,
    /// Consecutive motionless sub-steps in the plunger lane
    pub stuck_counter: u32,
    pub(crate) stopped: bool,
}

impl GameSession {
    pub fn new(highscore: u64) -> Self {
        Self {
            highscore,
            ..Self::default()
        }
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn add_score(&mut self, points: u32) -> u64 {
        self.score = self.score.saturating_add(u64::from(points));
        self.score
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns true only for the first call
    pub fn mark_started(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Quit is requested together with game over
    pub fn quit_requested(&self) -> bool {
        self.game_over
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn ended_at(&self) -> Option<Instant> {
        self.ended_at
    }

    /// Latch game over; false if the session had already ended
    pub fn finish(&mut self, reason: EndReason, now: Instant) -> bool {
        if self.game_over {
            return false;
        }
        self.game_over = true;
        self.end_reason = Some(reason);
        self.ended_at = Some(now);
        true
    }

    /// Adopt the score as highscore if it beats it
    pub fn take_highscore(&mut self) -> bool {
        if self.score > self.highscore {
            self.highscore = self.score;
            self.new_highscore = true;
            true
        } else {
            false
        }
    }
}
