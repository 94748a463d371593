//! Pop bumpers
//!
//! Kinematic circles that kick the ball away and score. A hit lights the
//! bumper for a few ticks, during which it jitters around its rest point.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::config::BumperSpec;
use crate::consts::{BUMPER_ELASTICITY, BUMPER_HIT_TICKS, BUMPER_JITTER, BUMPER_KICK, BUMPER_RADIUS};
use crate::error::Result;
use crate::sim::{Bodies, Body, BodyHandle, Category, Shape, ShapeHandle, ShapeKind, World, reflect_velocity};

#[derive(Debug, Clone)]
pub struct Bumper {
    pub id: String,
    pub body: BodyHandle,
    pub shape: ShapeHandle,
    pub radius: f32,
    rest_position: Vec2,
    points: u32,
    is_hit: bool,
    hit_timer: u32,
}

impl Bumper {
    pub fn new(world: &mut World, spec: &BumperSpec) -> Result<Self> {
        let body = world.add_body(Body::kinematic().at(spec.position));
        let shape = world.add_shape(
            Shape::new(body, ShapeKind::circle(BUMPER_RADIUS), Category::Bumper).with_elasticity(BUMPER_ELASTICITY),
        )?;
        Ok(Self {
            id: spec.id.clone(),
            body,
            shape,
            radius: BUMPER_RADIUS,
            rest_position: spec.position,
            points: spec.points,
            is_hit: false,
            hit_timer: 0,
        })
    }

    pub fn rest_position(&self) -> Vec2 {
        self.rest_position
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn is_hit(&self) -> bool {
        self.is_hit
    }

    pub fn hit_timer(&self) -> u32 {
        self.hit_timer
    }

    /// Light the bumper, jitter it and return the points scored
    pub fn hit(&mut self, bodies: &mut Bodies, rng: &mut Pcg32) -> u32 {
        self.is_hit = true;
        self.hit_timer = BUMPER_HIT_TICKS;
        let jitter = Vec2::new(
            rng.random_range(-BUMPER_JITTER..=BUMPER_JITTER),
            rng.random_range(-BUMPER_JITTER..=BUMPER_JITTER),
        );
        bodies[self.body].set_position(self.rest_position + jitter);
        self.points
    }

    /// Once per game tick: count down and snap back to rest when done
    pub fn update(&mut self, bodies: &mut Bodies) {
        if !self.is_hit {
            return;
        }
        self.hit_timer = self.hit_timer.saturating_sub(1);
        if self.hit_timer == 0 {
            self.is_hit = false;
            bodies[self.body].set_position(self.rest_position);
        }
    }
}

/// Ball velocity after touching a bumper
///
/// An approaching ball is mirrored about the contact normal, then every ball
/// gets an extra push along it, so the ball always leaves faster.
pub fn bounce(ball_position: Vec2, bumper_position: Vec2, velocity: Vec2) -> Vec2 {
    let normal = (ball_position - bumper_position).try_normalize().unwrap_or(Vec2::NEG_Y);
    let out = if velocity.dot(normal) < 0.0 {
        reflect_velocity(velocity, normal)
    } else {
        velocity
    };
    out + normal * BUMPER_KICK
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn setup() -> (World, Bumper) {
        let mut world = World::new(Vec2::ZERO, 1.0, 1);
        let bumper = Bumper::new(&mut world, &BumperSpec::new("top_left", 220.0, 250.0)).unwrap();
        (world, bumper)
    }

    #[test]
    fn test_hit_lights_and_jitters_within_range() {
        let (mut world, mut bumper) = setup();
        let mut rng = Pcg32::seed_from_u64(7);
        assert_eq!(bumper.hit(world.bodies_mut(), &mut rng), 10);
        assert!(bumper.is_hit());
        assert_eq!(bumper.hit_timer(), BUMPER_HIT_TICKS);
        let offset = world.body(bumper.body).position - bumper.rest_position();
        assert!(offset.x.abs() <= BUMPER_JITTER && offset.y.abs() <= BUMPER_JITTER);
    }

    #[test]
    fn test_update_returns_to_rest_after_timer() {
        let (mut world, mut bumper) = setup();
        let mut rng = Pcg32::seed_from_u64(7);
        bumper.hit(world.bodies_mut(), &mut rng);
        for _ in 0..BUMPER_HIT_TICKS - 1 {
            bumper.update(world.bodies_mut());
            assert!(bumper.is_hit());
        }
        bumper.update(world.bodies_mut());
        assert!(!bumper.is_hit());
        assert_eq!(world.body(bumper.body).position, bumper.rest_position());

        // Idle update is a no-op
        bumper.update(world.bodies_mut());
        assert_eq!(bumper.hit_timer(), 0);
    }

    #[test]
    fn test_same_seed_same_jitter() {
        let (mut world_a, mut a) = setup();
        let (mut world_b, mut b) = setup();
        a.hit(world_a.bodies_mut(), &mut Pcg32::seed_from_u64(99));
        b.hit(world_b.bodies_mut(), &mut Pcg32::seed_from_u64(99));
        assert_eq!(world_a.body(a.body).position, world_b.body(b.body).position);
    }

    #[test]
    fn test_bounce_reflects_then_kicks() {
        // Ball straight above, falling onto the bumper
        let v = bounce(Vec2::new(0.0, -38.0), Vec2::ZERO, Vec2::new(0.0, 100.0));
        assert!((v - Vec2::new(0.0, -250.0)).length() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_bumper_contact_always_speeds_ball_up(
            vx in -1500.0f32..1500.0,
            vy in -1500.0f32..1500.0,
            theta in 0.0f32..std::f32::consts::TAU,
        ) {
            let bumper = Vec2::new(220.0, 250.0);
            let ball = bumper + Vec2::from_angle(theta) * 38.0;
            let v = Vec2::new(vx, vy);
            let out = bounce(ball, bumper, v);
            prop_assert!(out.length() > v.length());
        }
    }
}
