//! Pinball entry point
//!
//! Runs a headless attract-mode session: the plunger is pulled and released
//! on a timer and the flippers fire whenever the ball comes near them.
//!
//! Usage: `pinball [config.json]`. Set `PINBALL_TELEMETRY=stdout` to stream
//! telemetry as JSON lines instead of logging it.

#[cfg(not(target_arch = "wasm32"))]
mod attract {
    use std::path::Path;
    use std::time::{Duration, Instant};

    use pinball::game::TableSnapshot;
    use pinball::telemetry::ChannelTelemetry;
    use pinball::{
        HighscoreStore, InputEvent, JsonHighscoreStore, LogTelemetry, PinballGame, Result, Side, TableConfig,
        Telemetry,
    };

    const FRAME: Duration = Duration::from_micros(16_667);
    /// Two minutes at 60 Hz
    const MAX_FRAMES: u64 = 60 * 120;
    /// Frames between plunger pulls
    const PULL_PERIOD: u64 = 240;
    /// Hold ticks per pull (about 50% power)
    const PULL_TICKS: u64 = 12;
    /// Frames a flipper stays up once fired
    const FLIP_FRAMES: u64 = 8;

    pub fn run() -> Result<()> {
        let config = match std::env::args().nth(1) {
            Some(path) => TableConfig::load(Path::new(&path)),
            None => TableConfig::default(),
        };
        let store = JsonHighscoreStore::new(config.highscore_path.clone());

        if std::env::var("PINBALL_TELEMETRY").is_ok_and(|v| v == "stdout") {
            let (telemetry, writer) = ChannelTelemetry::spawn(std::io::stdout());
            play(PinballGame::new(config, telemetry, store)?);
            if writer.join().is_err() {
                log::warn!("Telemetry writer thread panicked");
            }
        } else {
            play(PinballGame::new(config, LogTelemetry, store)?);
        }
        Ok(())
    }

    /// Drive the game until the quit grace period ends or the frame cap is hit
    fn play<T: Telemetry, S: HighscoreStore>(mut game: PinballGame<T, S>) {
        let mut flip_until = [0u64; 2];
        for frame in 0..MAX_FRAMES {
            let started = Instant::now();
            if game.should_exit(started) {
                log::info!("Quit grace elapsed after {frame} frames");
                break;
            }

            for event in scripted_input(frame, &game.snapshot(), &mut flip_until) {
                game.handle_input(event);
            }
            game.update();

            if frame % 600 == 0 {
                let snapshot = game.snapshot();
                log::info!(
                    "frame {frame}: ball ({:.0}, {:.0}) score {} highscore {}",
                    snapshot.ball.x,
                    snapshot.ball.y,
                    snapshot.score,
                    snapshot.highscore
                );
            }

            if let Some(rest) = FRAME.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        game.stop();
        // Dropping the game closes the telemetry channel
    }

    fn scripted_input(frame: u64, snapshot: &TableSnapshot, flip_until: &mut [u64; 2]) -> Vec<InputEvent> {
        let mut events = Vec::new();
        match frame % PULL_PERIOD {
            0 => events.push(InputEvent::PlungerHold),
            t if t <= PULL_TICKS => events.push(InputEvent::PlungerHoldTick),
            t if t == PULL_TICKS + 1 => events.push(InputEvent::PlungerRelease),
            _ => {}
        }

        let ball = snapshot.ball.position();
        let falling = snapshot.ball_velocity.y > 0.0;
        for (i, (side, flipper)) in [(Side::Left, snapshot.left_flipper), (Side::Right, snapshot.right_flipper)]
            .into_iter()
            .enumerate()
        {
            let near = (ball - flipper.position()).length() < 80.0 && falling;
            let active = match side {
                Side::Left => snapshot.left_flipper_active,
                Side::Right => snapshot.right_flipper_active,
            };
            if near && !active {
                events.push(InputEvent::FlipperPressed(side));
                flip_until[i] = frame + FLIP_FRAMES;
            } else if active && frame >= flip_until[i] {
                events.push(InputEvent::FlipperReleased(side));
            }
        }
        events
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Pinball (native) starting...");

    if let Err(e) = attract::run() {
        log::error!("Pinball failed to start: {e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is embedded by a host page; there is no native loop to run
}
