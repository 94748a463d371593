//! Game manager
//!
//! Owns the world, the collision handlers and a [`Table`] holding every
//! actuator plus the session. The table is the context handed to collision
//! callbacks, so gameplay reactions happen inline during a world step while
//! the world itself stays borrowed only by the solver.

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::ball::Ball;
use super::bumper::{self, Bumper};
use super::flipper::{Flipper, Side};
use super::input::InputEvent;
use super::playfield::Playfield;
use super::plunger::Plunger;
use super::session::{EndReason, GameSession};
use super::snapshot::{BumperView, Pose, TableSnapshot};
use crate::config::TableConfig;
use crate::consts::{PLUNGER_HOLD_STEP, RESET_OFFSET, STUCK_MAX_VX, STUCK_MAX_VY};
use crate::error::{PinballError, Result};
use crate::highscores::HighscoreStore;
use crate::sim::{Arbiter, Bodies, BodyHandle, Category, CollisionHandlers, World};
use crate::telemetry::{
    GameStatus, Payload, TOPIC_BALL_POSITION, TOPIC_BUMPER_HIT, TOPIC_GAME_STATUS, TOPIC_SCORE, Telemetry,
    unix_timestamp,
};

/// Actuators, session and collaborators; the collision callback context
pub struct Table<T, S> {
    pub ball: Ball,
    pub left_flipper: Flipper,
    pub right_flipper: Flipper,
    pub plunger: Plunger,
    pub bumpers: Vec<Bumper>,
    pub playfield: Playfield,
    pub session: GameSession,
    config: TableConfig,
    telemetry: T,
    store: S,
    rng: Pcg32,
    plunger_held: bool,
    /// A highscore that could not be written yet
    unsaved_highscore: bool,
    /// Simulated seconds since construction
    sim_time: f64,
    last_position_publish: Option<f64>,
}

impl<T: Telemetry, S: HighscoreStore> Table<T, S> {
    fn publish(&mut self, topic: &str, payload: Payload) {
        if let Err(e) = self.telemetry.publish(topic, payload) {
            log::warn!("Telemetry publish on {topic} failed: {e}");
        }
    }

    fn publish_status(&mut self, status: GameStatus, value: Option<f64>) {
        self.publish(TOPIC_GAME_STATUS, Payload::status(status, value));
    }

    fn mark_started(&mut self) {
        if self.session.mark_started() {
            log::info!("Game started");
            self.publish_status(GameStatus::Started, None);
        }
    }

    pub fn flipper(&self, side: Side) -> &Flipper {
        match side {
            Side::Left => &self.left_flipper,
            Side::Right => &self.right_flipper,
        }
    }

    fn flipper_mut(&mut self, side: Side) -> &mut Flipper {
        match side {
            Side::Left => &mut self.left_flipper,
            Side::Right => &mut self.right_flipper,
        }
    }

    fn flipper_for_body(&self, body: BodyHandle) -> Option<&Flipper> {
        [&self.left_flipper, &self.right_flipper]
            .into_iter()
            .find(|f| f.body == body)
    }

    /// Save a pending highscore; publishes `NEW_HIGHSCORE` only once it is on disk
    fn persist_highscore(&mut self) {
        let highscore = self.session.highscore;
        match self.store.save(highscore) {
            Ok(()) => {
                self.unsaved_highscore = false;
                log::info!("New highscore: {highscore}");
                self.publish_status(GameStatus::NewHighscore, Some(highscore as f64));
            }
            Err(e) => {
                self.unsaved_highscore = true;
                log::warn!("Failed to save highscore {highscore}: {e}");
            }
        }
    }

    /// The one terminal transition, shared by drain and out-of-bounds
    fn end_game(&mut self, reason: EndReason) -> bool {
        if !self.session.finish(reason, Instant::now()) {
            return false;
        }
        let score = self.session.score();
        log::info!("Game over ({reason:?}), final score {score}");
        if self.session.take_highscore() {
            self.persist_highscore();
        }
        self.publish_status(GameStatus::GameOver, Some(score as f64));
        true
    }

    fn score_bumper(&mut self, bodies: &mut Bodies, body: BodyHandle) -> Result<()> {
        let Some(bumper) = self.bumpers.iter_mut().find(|b| b.body == body) else {
            return Err(PinballError::Handler(format!("no bumper owns body {}", body.index())));
        };
        let points = bumper.hit(bodies, &mut self.rng);
        let id = bumper.id.clone();
        let total = self.session.add_score(points);
        log::debug!("Bumper {id} hit: +{points}, score {total}");

        let timestamp = unix_timestamp();
        self.publish(
            TOPIC_SCORE,
            Payload::Score {
                points,
                total,
                timestamp,
            },
        );
        self.publish(TOPIC_BUMPER_HIT, Payload::BumperHit { id, points, timestamp });
        Ok(())
    }
}

// === Collision callbacks ===

fn wall_hit<T: Telemetry, S: HighscoreStore>(arb: &Arbiter, bodies: &mut Bodies, table: &mut Table<T, S>) -> Result<bool> {
    if table.ball.reflect_off_wall(bodies, arb.normal) {
        log::trace!("Wall bounce at {}", arb.point);
    }
    Ok(true)
}

fn flipper_hit<T: Telemetry, S: HighscoreStore>(
    arb: &Arbiter,
    bodies: &mut Bodies,
    table: &mut Table<T, S>,
) -> Result<bool> {
    let ball = table.ball.body;
    let Some(flipper) = table.flipper_for_body(arb.bodies.0) else {
        return Err(PinballError::Handler(format!("no flipper owns body {}", arb.bodies.0.index())));
    };
    if let Some(impulse) = flipper.kick(bodies, ball, arb.point) {
        log::trace!("{} flipper kick {impulse}", flipper.side.as_str());
    }
    Ok(true)
}

fn plunger_hit<T: Telemetry, S: HighscoreStore>(
    _arb: &Arbiter,
    bodies: &mut Bodies,
    table: &mut Table<T, S>,
) -> Result<bool> {
    table.plunger.catch_ball(bodies, &table.ball);
    Ok(true)
}

fn plunger_sensor_left<T: Telemetry, S: HighscoreStore>(
    _arb: &Arbiter,
    bodies: &mut Bodies,
    table: &mut Table<T, S>,
) -> Result<()> {
    table.plunger.release_ball(bodies, &table.ball);
    Ok(())
}

fn bumper_bounce<T: Telemetry, S: HighscoreStore>(
    arb: &Arbiter,
    bodies: &mut Bodies,
    table: &mut Table<T, S>,
) -> Result<bool> {
    if !arb.is_first_contact() {
        return Ok(true);
    }
    let bumper_position = bodies[arb.bodies.0].position;
    let ball = &mut bodies[arb.bodies.1];
    ball.velocity = bumper::bounce(ball.position, bumper_position, ball.velocity);
    table.mark_started();
    Ok(true)
}

fn bumper_score<T: Telemetry, S: HighscoreStore>(
    arb: &Arbiter,
    bodies: &mut Bodies,
    table: &mut Table<T, S>,
) -> Result<()> {
    if !arb.is_first_contact() || table.session.is_game_over() {
        return Ok(());
    }
    table.score_bumper(bodies, arb.bodies.0)
}

fn drained<T: Telemetry, S: HighscoreStore>(_arb: &Arbiter, _bodies: &mut Bodies, table: &mut Table<T, S>) -> Result<()> {
    table.end_game(EndReason::Drained);
    Ok(())
}

/// A complete pinball table: physics world, actuators, session and telemetry
pub struct PinballGame<T, S> {
    world: World,
    handlers: CollisionHandlers<Table<T, S>>,
    table: Table<T, S>,
}

impl<T: Telemetry, S: HighscoreStore> PinballGame<T, S> {
    /// Build the table and publish `READY`
    pub fn new(config: TableConfig, telemetry: T, mut store: S) -> Result<Self> {
        config.validate()?;
        let g = &config.geometry;
        let mut world = World::new(config.gravity, config.damping, config.solver_iterations);

        let playfield = Playfield::build(&mut world, g)?;
        let plunger = Plunger::new(&mut world, g.plunger_rest())?;
        let ball = Ball::spawn(
            &mut world,
            Vec2::new(g.lane_center_x(), g.plunger_rest().y - RESET_OFFSET),
        )?;
        let left_flipper = Flipper::new(&mut world, Side::Left, g.left_pivot())?;
        let right_flipper = Flipper::new(&mut world, Side::Right, g.right_pivot())?;
        let bumpers = g
            .bumpers
            .iter()
            .map(|spec| Bumper::new(&mut world, spec))
            .collect::<Result<Vec<_>>>()?;

        let highscore = store.load();
        let rng = Pcg32::seed_from_u64(config.seed);
        log::info!(
            "Table ready: {} bumpers, {} walls, highscore {highscore}",
            bumpers.len(),
            playfield.walls.len()
        );

        let mut table = Table {
            ball,
            left_flipper,
            right_flipper,
            plunger,
            bumpers,
            playfield,
            session: GameSession::new(highscore),
            config,
            telemetry,
            store,
            rng,
            plunger_held: false,
            unsaved_highscore: false,
            sim_time: 0.0,
            last_position_publish: None,
        };
        table.publish_status(GameStatus::Ready, None);

        Ok(Self {
            world,
            handlers: Self::collision_handlers(),
            table,
        })
    }

    fn collision_handlers() -> CollisionHandlers<Table<T, S>> {
        let mut handlers = CollisionHandlers::new();
        handlers
            .on_pre_solve(Category::Wall, Category::Ball, wall_hit::<T, S>)
            .on_pre_solve(Category::Flipper, Category::Ball, flipper_hit::<T, S>)
            .on_pre_solve(Category::Plunger, Category::Ball, plunger_hit::<T, S>)
            .on_separate(Category::Ball, Category::PlungerSensor, plunger_sensor_left::<T, S>)
            .on_pre_solve(Category::Bumper, Category::Ball, bumper_bounce::<T, S>)
            .on_post_solve(Category::Bumper, Category::Ball, bumper_score::<T, S>)
            .on_post_solve(Category::Drain, Category::Ball, drained::<T, S>);
        handlers
    }

    /// One game tick: fixed sub-steps, bumper timers, position telemetry
    pub fn update(&mut self) {
        if self.table.session.is_game_over() {
            return;
        }
        for _ in 0..self.table.config.substeps {
            self.substep();
            if self.table.session.is_game_over() {
                break;
            }
        }
        for bumper in self.table.bumpers.iter_mut() {
            bumper.update(self.world.bodies_mut());
        }
        self.publish_position();
    }

    /// Bounds check followed by one world step
    pub fn substep(&mut self) {
        self.check_ball_bounds();
        if self.table.session.is_game_over() {
            return;
        }
        let dt = self.table.config.dt;
        self.world.step(dt, &self.handlers, &mut self.table);
        self.table.sim_time += f64::from(dt);
    }

    fn publish_position(&mut self) {
        let interval = f64::from(self.table.config.position_publish_interval);
        let due = self
            .table
            .last_position_publish
            .is_none_or(|last| self.table.sim_time - last >= interval);
        if !due {
            return;
        }
        self.table.last_position_publish = Some(self.table.sim_time);
        let body = self.world.body(self.table.ball.body);
        let payload = Payload::Position {
            x: body.position.x,
            y: body.position.y,
            vx: body.velocity.x,
            vy: body.velocity.y,
            timestamp: unix_timestamp(),
        };
        self.table.publish(TOPIC_BALL_POSITION, payload);
    }

    /// Recover a lost or stuck ball, or end the game when it left the table
    pub fn check_ball_bounds(&mut self) {
        if self.table.session.is_game_over() {
            return;
        }
        let body = self.world.body(self.table.ball.body);
        let (position, velocity) = (body.position, body.velocity);

        if position.y > self.table.config.out_of_bounds_y() {
            log::warn!("Ball fell out of bounds at {position}");
            self.table.end_game(EndReason::OutOfBounds);
            return;
        }

        let still = velocity.x.abs() < STUCK_MAX_VX && velocity.y.abs() < STUCK_MAX_VY;
        if self.table.playfield.lane.contains(position) && still {
            self.table.session.stuck_counter += 1;
            if self.table.session.stuck_counter > self.table.config.stuck_threshold {
                log::debug!("Ball stuck in the plunger lane at {position}");
                self.reset_ball();
                return;
            }
        } else {
            self.table.session.stuck_counter = 0;
        }

        let head = self.table.plunger.head(self.world.bodies());
        if position.distance(head) < self.table.config.catch_radius && position.y > head.y {
            log::debug!("Ball caught under the plunger head at {position}");
            self.reset_ball();
        }
    }

    /// Put the ball back in the plunger lane above the head, at rest
    pub fn reset_ball(&mut self) {
        let head = self.table.plunger.head(self.world.bodies());
        let x = self.table.config.geometry.lane_center_x();
        let position = Vec2::new(x, head.y - RESET_OFFSET);
        self.table.ball.reset_to(self.world.bodies_mut(), position);
        self.table.session.stuck_counter = 0;
        log::info!("Ball reset to {position}");
        self.table.publish_status(GameStatus::BallReset, None);
    }

    /// Fire the plunger; false when uncompressed or after game over
    pub fn launch_ball(&mut self, power: f32) -> bool {
        if self.table.session.is_game_over() {
            log::debug!("Launch ignored after game over");
            return false;
        }
        self.table.mark_started();
        let ball = self.table.ball.body;
        let launched = self.table.plunger.launch(self.world.bodies_mut(), ball, power);
        if launched {
            log::info!("Ball launched with power {power:.2}");
            self.table.publish_status(GameStatus::BallLaunched, Some(f64::from(power)));
        }
        launched
    }

    pub fn activate_flipper(&mut self, side: Side) -> bool {
        match self.table.flipper_mut(side).activate(&mut self.world) {
            Ok(changed) => changed,
            Err(e) => {
                log::warn!("Could not engage {} flipper: {e}", side.as_str());
                false
            }
        }
    }

    pub fn deactivate_flipper(&mut self, side: Side) -> bool {
        self.table.flipper_mut(side).deactivate(&mut self.world)
    }

    /// Apply one input event between updates
    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::FlipperPressed(side) => {
                self.activate_flipper(side);
            }
            InputEvent::FlipperReleased(side) => {
                self.deactivate_flipper(side);
            }
            InputEvent::PlungerHold => {
                if !self.table.session.is_game_over() {
                    self.table.plunger_held = true;
                }
            }
            InputEvent::PlungerHoldTick => {
                if self.table.plunger_held {
                    let amount = self.table.plunger.compression() + PLUNGER_HOLD_STEP;
                    self.table.plunger.compress(self.world.bodies_mut(), amount);
                }
            }
            InputEvent::PlungerRelease => {
                if std::mem::take(&mut self.table.plunger_held) {
                    let plunger = &self.table.plunger;
                    let power = plunger.compression() / plunger.max_compression();
                    self.launch_ball(power);
                }
            }
        }
    }

    /// True once the quit grace period after game over has elapsed
    pub fn should_exit(&self, now: Instant) -> bool {
        let Some(ended_at) = self.table.session.ended_at() else {
            return false;
        };
        let grace = Duration::try_from_secs_f32(self.table.config.quit_grace_secs).unwrap_or(Duration::ZERO);
        now.duration_since(ended_at) >= grace
    }

    /// Shut down: persist any pending highscore and publish `STOPPED` once
    pub fn stop(&mut self) {
        if std::mem::replace(&mut self.table.session.stopped, true) {
            return;
        }
        if self.table.session.take_highscore() || self.table.unsaved_highscore {
            self.table.persist_highscore();
        }
        let score = self.table.session.score();
        log::info!("Game stopped with score {score}");
        self.table.publish_status(GameStatus::Stopped, Some(score as f64));
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let bodies = self.world.bodies();
        let table = &self.table;
        let ball = &bodies[table.ball.body];
        TableSnapshot {
            ball: Pose::from(ball),
            ball_velocity: ball.velocity,
            ball_radius: table.ball.radius,
            left_flipper: Pose::from(&bodies[table.left_flipper.body]),
            right_flipper: Pose::from(&bodies[table.right_flipper.body]),
            left_flipper_active: table.left_flipper.is_active(),
            right_flipper_active: table.right_flipper.is_active(),
            plunger: Pose::from(&bodies[table.plunger.body]),
            plunger_compression: table.plunger.compression(),
            bumpers: table
                .bumpers
                .iter()
                .map(|b| BumperView {
                    id: b.id.clone(),
                    pose: Pose::from(&bodies[b.body]),
                    radius: b.radius,
                    is_hit: b.is_hit(),
                })
                .collect(),
            score: table.session.score(),
            highscore: table.session.highscore,
            started: table.session.is_started(),
            game_over: table.session.is_game_over(),
            new_highscore: table.session.new_highscore,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.table.session
    }

    pub fn table(&self) -> &Table<T, S> {
        &self.table
    }

    pub fn config(&self) -> &TableConfig {
        &self.table.config
    }

    pub fn telemetry(&self) -> &T {
        &self.table.telemetry
    }

    pub fn store(&self) -> &S {
        &self.table.store
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Simulated seconds so far
    pub fn sim_time(&self) -> f64 {
        self.table.sim_time
    }

    /// Move the ball by hand and stop it (debugging and tests)
    pub fn place_ball(&mut self, position: Vec2) {
        self.table.ball.reset_to(self.world.bodies_mut(), position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BUMPER_POINTS, FLIPPER_ANGLE_LIMIT};
    use crate::highscores::MemoryHighscoreStore;
    use crate::telemetry::RecordingTelemetry;

    type TestGame = PinballGame<RecordingTelemetry, MemoryHighscoreStore>;

    fn game_with(store: MemoryHighscoreStore) -> TestGame {
        PinballGame::new(TableConfig::default(), RecordingTelemetry::new(), store).unwrap()
    }

    fn game() -> TestGame {
        game_with(MemoryHighscoreStore::default())
    }

    fn ball_position(game: &TestGame) -> Vec2 {
        game.world().body(game.table().ball.body).position
    }

    fn status_value(game: &TestGame, wanted: GameStatus) -> Option<f64> {
        game.telemetry().messages.iter().find_map(|(_, payload)| match payload {
            Payload::Status { status, value, .. } if *status == wanted => *value,
            _ => None,
        })
    }

    #[test]
    fn test_new_publishes_ready_and_spawns_ball_in_lane() {
        let game = game();
        assert_eq!(game.telemetry().statuses(), vec![GameStatus::Ready]);
        assert_eq!(ball_position(&game), Vec2::new(670.0, 610.0));
        assert_eq!(game.table().bumpers.len(), 6);
        assert!(!game.session().is_started());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TableConfig {
            substeps: 0,
            ..TableConfig::default()
        };
        let result = PinballGame::new(config, RecordingTelemetry::new(), MemoryHighscoreStore::default());
        assert!(matches!(result, Err(PinballError::InvalidConfig(_))));
    }

    #[test]
    fn test_launch_requires_compression() {
        let mut game = game();
        assert!(!game.launch_ball(1.0));
        assert_eq!(game.telemetry().count_status(GameStatus::BallLaunched), 0);
        assert_eq!(ball_position(&game), Vec2::new(670.0, 610.0));
    }

    #[test]
    fn test_plunger_input_builds_power() {
        let mut game = game();
        game.handle_input(InputEvent::PlungerHold);
        for _ in 0..5 {
            game.handle_input(InputEvent::PlungerHoldTick);
        }
        assert_eq!(game.table().plunger.compression(), 10.0);
        game.handle_input(InputEvent::PlungerRelease);

        let power = status_value(&game, GameStatus::BallLaunched).unwrap();
        assert!((power - 0.2).abs() < 1e-6);
        assert_eq!(game.table().plunger.compression(), 0.0);
        assert!(game.world().body(game.table().ball.body).velocity.y < 0.0);
        assert_eq!(game.telemetry().count_status(GameStatus::Started), 1);

        // Release without hold does nothing
        game.handle_input(InputEvent::PlungerRelease);
        assert_eq!(game.telemetry().count_status(GameStatus::BallLaunched), 1);
    }

    #[test]
    fn test_tick_without_hold_is_ignored() {
        let mut game = game();
        game.handle_input(InputEvent::PlungerHoldTick);
        assert_eq!(game.table().plunger.compression(), 0.0);
    }

    #[test]
    fn test_started_published_once() {
        let mut game = game();
        game.launch_ball(1.0);
        game.launch_ball(1.0);
        assert_eq!(game.telemetry().count_status(GameStatus::Started), 1);
        assert!(game.session().is_started());
    }

    #[test]
    fn test_drain_latches_game_over_once() {
        let mut game = game();
        game.place_ball(Vec2::new(400.0, 720.0));
        game.update();
        assert!(game.session().is_game_over());
        assert!(game.session().quit_requested());
        assert_eq!(game.session().end_reason(), Some(EndReason::Drained));
        assert_eq!(game.telemetry().count_status(GameStatus::GameOver), 1);

        // Second drain contact: nothing changes
        game.place_ball(Vec2::new(400.0, 720.0));
        game.update();
        assert!(!game.table.end_game(EndReason::Drained));
        assert_eq!(game.telemetry().count_status(GameStatus::GameOver), 1);
    }

    #[test]
    fn test_new_highscore_saved_once() {
        let mut game = game_with(MemoryHighscoreStore::with_value(50));
        assert_eq!(game.session().highscore, 50);
        game.table.session.add_score(70);
        game.place_ball(Vec2::new(400.0, 720.0));
        game.update();

        assert_eq!(game.session().highscore, 70);
        assert!(game.session().new_highscore);
        assert_eq!(game.store().saves, 1);
        assert_eq!(game.store().value, 70);
        assert_eq!(game.telemetry().count_status(GameStatus::NewHighscore), 1);
        assert_eq!(status_value(&game, GameStatus::GameOver), Some(70.0));

        game.stop();
        assert_eq!(game.store().saves, 1);
    }

    #[test]
    fn test_lower_score_keeps_highscore() {
        let mut game = game_with(MemoryHighscoreStore::with_value(50));
        game.table.session.add_score(30);
        game.place_ball(Vec2::new(400.0, 720.0));
        game.update();
        assert_eq!(game.session().highscore, 50);
        assert_eq!(game.store().saves, 0);
        assert_eq!(game.telemetry().count_status(GameStatus::NewHighscore), 0);
    }

    #[test]
    fn test_failed_highscore_save_retried_on_stop() {
        let mut store = MemoryHighscoreStore::with_value(5);
        store.fail = true;
        let mut game = game_with(store);
        game.table.session.add_score(20);
        game.place_ball(Vec2::new(400.0, 720.0));
        game.update();
        assert!(game.session().is_game_over());
        assert_eq!(game.telemetry().count_status(GameStatus::NewHighscore), 0);

        game.table.store.fail = false;
        game.stop();
        assert_eq!(game.store().value, 20);
        assert_eq!(game.telemetry().count_status(GameStatus::NewHighscore), 1);
        assert_eq!(game.telemetry().count_status(GameStatus::Stopped), 1);
    }

    #[test]
    fn test_out_of_bounds_ends_game() {
        let mut game = game();
        game.place_ball(Vec2::new(400.0, 1500.0));
        game.update();
        assert_eq!(game.session().end_reason(), Some(EndReason::OutOfBounds));
        assert_eq!(game.telemetry().count_status(GameStatus::GameOver), 1);
    }

    #[test]
    fn test_update_is_noop_after_game_over() {
        let mut game = game();
        game.place_ball(Vec2::new(400.0, 1500.0));
        game.update();
        let before = ball_position(&game);
        let time = game.sim_time();
        let messages = game.telemetry().messages.len();

        game.update();
        assert_eq!(ball_position(&game), before);
        assert_eq!(game.sim_time(), time);
        assert_eq!(game.telemetry().messages.len(), messages);
    }

    #[test]
    fn test_launch_and_hold_ignored_after_game_over() {
        let mut game = game();
        game.place_ball(Vec2::new(400.0, 1500.0));
        game.update();
        game.handle_input(InputEvent::PlungerHold);
        game.handle_input(InputEvent::PlungerHoldTick);
        assert_eq!(game.table().plunger.compression(), 0.0);
        assert!(!game.launch_ball(1.0));
    }

    #[test]
    fn test_stuck_ball_reset_after_threshold() {
        let mut game = game();
        game.place_ball(Vec2::new(670.0, 620.0));
        for _ in 0..30 {
            game.check_ball_bounds();
        }
        assert_eq!(game.telemetry().count_status(GameStatus::BallReset), 0);
        assert_eq!(game.session().stuck_counter, 30);

        game.check_ball_bounds();
        assert_eq!(game.telemetry().count_status(GameStatus::BallReset), 1);
        assert_eq!(game.session().stuck_counter, 0);
        assert_eq!(ball_position(&game), Vec2::new(670.0, 610.0));
    }

    #[test]
    fn test_moving_ball_resets_stuck_counter() {
        let mut game = game();
        game.place_ball(Vec2::new(670.0, 620.0));
        for _ in 0..20 {
            game.check_ball_bounds();
        }
        let ball = game.table.ball.body;
        game.world_mut().body_mut(ball).velocity = Vec2::new(0.0, -300.0);
        game.check_ball_bounds();
        assert_eq!(game.session().stuck_counter, 0);
    }

    #[test]
    fn test_ball_under_plunger_head_is_reset() {
        let mut game = game();
        game.place_ball(Vec2::new(672.0, 660.0));
        game.check_ball_bounds();
        assert_eq!(game.telemetry().count_status(GameStatus::BallReset), 1);
        assert_eq!(ball_position(&game), Vec2::new(670.0, 610.0));
    }

    #[test]
    fn test_reset_uses_current_plunger_head() {
        let mut game = game();
        game.handle_input(InputEvent::PlungerHold);
        for _ in 0..10 {
            game.handle_input(InputEvent::PlungerHoldTick);
        }
        game.reset_ball();
        assert_eq!(ball_position(&game), Vec2::new(670.0, 630.0));
    }

    #[test]
    fn test_bumper_contact_scores_once() {
        let mut game = game();
        game.place_ball(Vec2::new(220.0, 214.0));
        game.update();

        assert_eq!(game.session().score(), u64::from(BUMPER_POINTS));
        let bumper = &game.table().bumpers[0];
        assert_eq!(bumper.id, "top_left");
        assert!(bumper.is_hit());
        assert_eq!(game.telemetry().count_topic(TOPIC_SCORE), 1);
        assert_eq!(game.telemetry().count_topic(TOPIC_BUMPER_HIT), 1);
        assert_eq!(game.telemetry().count_status(GameStatus::Started), 1);
        // Kicked away upward
        assert!(game.world().body(game.table().ball.body).velocity.y < -100.0);
    }

    #[test]
    fn test_flipper_inputs_toggle_motor() {
        let mut game = game();
        game.handle_input(InputEvent::FlipperPressed(Side::Left));
        assert!(game.table().flipper(Side::Left).is_active());
        assert!(!game.table().flipper(Side::Right).is_active());
        assert!(!game.activate_flipper(Side::Left));
        game.handle_input(InputEvent::FlipperReleased(Side::Left));
        assert!(!game.table().flipper(Side::Left).is_active());
    }

    #[test]
    fn test_position_publish_interval() {
        let mut game = game();
        for _ in 0..10 {
            game.update();
        }
        assert_eq!(game.telemetry().count_topic(TOPIC_BALL_POSITION), 4);
    }

    #[test]
    fn test_should_exit_after_grace() {
        let mut game = game();
        let now = Instant::now();
        assert!(!game.should_exit(now + Duration::from_secs(60)));

        game.place_ball(Vec2::new(400.0, 1500.0));
        game.update();
        assert!(!game.should_exit(Instant::now()));
        assert!(game.should_exit(Instant::now() + Duration::from_secs(6)));
    }

    #[test]
    fn test_failing_telemetry_does_not_stop_game() {
        let mut game = PinballGame::new(
            TableConfig::default(),
            RecordingTelemetry::failing(),
            MemoryHighscoreStore::default(),
        )
        .unwrap();
        game.handle_input(InputEvent::PlungerHold);
        game.handle_input(InputEvent::PlungerHoldTick);
        game.handle_input(InputEvent::PlungerRelease);
        game.update();
        game.place_ball(Vec2::new(400.0, 720.0));
        game.update();
        assert!(game.session().is_game_over());
        assert!(game.telemetry().messages.is_empty());
    }

    #[test]
    fn test_stop_publishes_once() {
        let mut game = game();
        game.stop();
        game.stop();
        assert_eq!(game.telemetry().count_status(GameStatus::Stopped), 1);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut game = game();
        game.handle_input(InputEvent::FlipperPressed(Side::Right));
        let snapshot = game.snapshot();
        assert_eq!(snapshot.ball.position(), Vec2::new(670.0, 610.0));
        assert!(snapshot.right_flipper_active);
        assert!(!snapshot.left_flipper_active);
        assert_eq!(snapshot.bumpers.len(), 6);
        assert!(!snapshot.game_over);
        assert!(snapshot.to_json().unwrap().contains("\"score\":0"));
    }

    #[test]
    fn test_attract_run_keeps_invariants() {
        let mut game = game();
        let mut last_score = 0;
        let mut was_over = false;
        for frame in 0..900u32 {
            match frame % 120 {
                0 => game.handle_input(InputEvent::PlungerHold),
                1..=25 => game.handle_input(InputEvent::PlungerHoldTick),
                26 => game.handle_input(InputEvent::PlungerRelease),
                _ => {}
            }
            let side = if frame % 40 < 20 { Side::Left } else { Side::Right };
            if frame % 20 == 0 {
                game.handle_input(InputEvent::FlipperPressed(side));
            } else if frame % 20 == 10 {
                game.handle_input(InputEvent::FlipperReleased(side));
            }
            game.update();

            for side in [Side::Left, Side::Right] {
                let angle = game.table().flipper(side).angle(game.world());
                assert!(angle.abs() <= FLIPPER_ANGLE_LIMIT + 1e-5, "frame {frame}: {side:?} at {angle}");
            }
            for bumper in &game.table().bumpers {
                if !bumper.is_hit() {
                    assert_eq!(game.world().body(bumper.body).position, bumper.rest_position());
                }
            }
            let plunger = &game.table().plunger;
            let offset = plunger.head(game.world().bodies()) - plunger.rest_position();
            assert_eq!(offset, Vec2::new(0.0, plunger.compression()));

            let score = game.session().score();
            assert!(score >= last_score);
            last_score = score;
            if was_over {
                assert!(game.session().is_game_over());
            }
            was_over = game.session().is_game_over();
        }
    }
}
