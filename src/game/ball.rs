//! The ball and its wall response

use glam::Vec2;

use crate::consts::{BALL_DENSITY, BALL_ELASTICITY, BALL_FRICTION, BALL_RADIUS, WALL_REFLECT_DAMPING};
use crate::error::Result;
use crate::sim::{
    Bodies, Body, BodyHandle, Category, Shape, ShapeHandle, ShapeKind, World, mass_for_circle, moment_for_circle,
    reflect_velocity,
};

/// The single ball on the table
#[derive(Debug, Clone)]
pub struct Ball {
    pub body: BodyHandle,
    pub shape: ShapeHandle,
    pub radius: f32,
}

impl Ball {
    pub fn spawn(world: &mut World, position: Vec2) -> Result<Self> {
        let mass = mass_for_circle(BALL_DENSITY, BALL_RADIUS);
        let body = world.add_body(Body::dynamic(mass, moment_for_circle(mass, BALL_RADIUS)).at(position));
        let shape = world.add_shape(
            Shape::new(body, ShapeKind::circle(BALL_RADIUS), Category::Ball)
                .with_elasticity(BALL_ELASTICITY)
                .with_friction(BALL_FRICTION),
        )?;
        Ok(Self {
            body,
            shape,
            radius: BALL_RADIUS,
        })
    }

    /// Stop the ball dead at `position`
    pub fn reset_to(&self, bodies: &mut Bodies, position: Vec2) {
        let body = &mut bodies[self.body];
        body.halt();
        body.set_position(position);
    }

    /// Bounce off a wall whose normal points toward the ball
    ///
    /// Only an approaching ball is reflected; resting and sliding contacts
    /// are left to the solver. Returns whether the velocity was replaced.
    pub fn reflect_off_wall(&self, bodies: &mut Bodies, normal: Vec2) -> bool {
        let body = &mut bodies[self.body];
        match reflect(body.velocity, normal, WALL_REFLECT_DAMPING) {
            Some(v) => {
                body.velocity = v;
                true
            }
            None => false,
        }
    }
}

/// Damped mirror reflection of an approaching velocity, `None` otherwise
pub fn reflect(velocity: Vec2, normal: Vec2, damping: f32) -> Option<Vec2> {
    if velocity.dot(normal) >= 0.0 {
        return None;
    }
    Some(reflect_velocity(velocity, normal) * damping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reflect_ignores_receding_ball() {
        let n = Vec2::new(0.0, -1.0);
        assert!(reflect(Vec2::new(10.0, -5.0), n, 0.9).is_none());
        assert!(reflect(Vec2::new(10.0, 0.0), n, 0.9).is_none());
        let out = reflect(Vec2::new(10.0, 20.0), n, 0.9).unwrap();
        assert!((out - Vec2::new(9.0, -18.0)).length() < 1e-4);
    }

    #[test]
    fn test_reset_to_stops_ball() {
        let mut world = World::new(Vec2::ZERO, 1.0, 1);
        let ball = Ball::spawn(&mut world, Vec2::new(10.0, 10.0)).unwrap();
        {
            let body = world.body_mut(ball.body);
            body.velocity = Vec2::new(300.0, -20.0);
            body.angular_velocity = 4.0;
            body.force = Vec2::new(1.0, 1.0);
        }
        ball.reset_to(world.bodies_mut(), Vec2::new(670.0, 610.0));
        let body = world.body(ball.body);
        assert_eq!(body.position, Vec2::new(670.0, 610.0));
        assert_eq!(body.velocity, Vec2::ZERO);
        assert_eq!(body.angular_velocity, 0.0);
        assert_eq!(body.force, Vec2::ZERO);
    }

    proptest! {
        #[test]
        fn prop_wall_reflection_preserves_angle_and_loses_speed(
            vx in -2000.0f32..2000.0,
            vy in -2000.0f32..2000.0,
            theta in 0.0f32..std::f32::consts::TAU,
        ) {
            let n = Vec2::from_angle(theta);
            let v = Vec2::new(vx, vy);
            prop_assume!(v.dot(n) < -1.0);

            let out = reflect(v, n, WALL_REFLECT_DAMPING).unwrap();
            // Angle of incidence equals angle of reflection
            let incidence = (-v).normalize().dot(n);
            let reflection = out.normalize().dot(n);
            prop_assert!((incidence - reflection).abs() < 1e-3);
            // Tangential direction preserved
            let t = n.perp();
            prop_assert!((out.dot(t) - v.dot(t) * WALL_REFLECT_DAMPING).abs() < 1e-1);
            prop_assert!(out.length() <= v.length() + 1e-3);
        }
    }
}
