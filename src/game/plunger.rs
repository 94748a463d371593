//! Plunger
//!
//! A kinematic head in the plunger lane. Compressing pulls it down from its
//! rest point; launching converts the stored compression into an upward
//! impulse on the ball. A larger sensor circle around the head catches a
//! ball that slips underneath.

use glam::Vec2;

use super::ball::Ball;
use crate::consts::{
    PLUNGER_CATCH_GAP, PLUNGER_CATCH_IMPULSE, PLUNGER_ELASTICITY, PLUNGER_LAUNCH_OFFSET, PLUNGER_MAX_COMPRESSION,
    PLUNGER_RADIUS, PLUNGER_RELEASE_OFFSET, PLUNGER_RELEASE_SPEED, PLUNGER_SENSOR_RADIUS, PLUNGER_SPRING_CONSTANT,
};
use crate::error::Result;
use crate::sim::{Bodies, Body, BodyHandle, Category, Shape, ShapeHandle, ShapeKind, World};

#[derive(Debug, Clone)]
pub struct Plunger {
    pub body: BodyHandle,
    pub shape: ShapeHandle,
    pub sensor: ShapeHandle,
    pub radius: f32,
    rest_position: Vec2,
    compression: f32,
    max_compression: f32,
    spring_constant: f32,
}

impl Plunger {
    pub fn new(world: &mut World, rest_position: Vec2) -> Result<Self> {
        let body = world.add_body(Body::kinematic().at(rest_position));
        let shape = world.add_shape(
            Shape::new(body, ShapeKind::circle(PLUNGER_RADIUS), Category::Plunger).with_elasticity(PLUNGER_ELASTICITY),
        )?;
        let sensor = world.add_shape(
            Shape::new(body, ShapeKind::circle(PLUNGER_SENSOR_RADIUS), Category::PlungerSensor).as_sensor(),
        )?;
        Ok(Self {
            body,
            shape,
            sensor,
            radius: PLUNGER_RADIUS,
            rest_position,
            compression: 0.0,
            max_compression: PLUNGER_MAX_COMPRESSION,
            spring_constant: PLUNGER_SPRING_CONSTANT,
        })
    }

    pub fn rest_position(&self) -> Vec2 {
        self.rest_position
    }

    pub fn compression(&self) -> f32 {
        self.compression
    }

    pub fn max_compression(&self) -> f32 {
        self.max_compression
    }

    /// Current head position
    pub fn head(&self, bodies: &Bodies) -> Vec2 {
        bodies[self.body].position
    }

    /// Set the compression (clamped) and move the head down by that much
    pub fn compress(&mut self, bodies: &mut Bodies, amount: f32) {
        self.compression = if amount.is_nan() {
            0.0
        } else {
            amount.clamp(0.0, self.max_compression)
        };
        bodies[self.body].set_position(self.rest_position + Vec2::new(0.0, self.compression));
    }

    /// Fire the ball upward; false (and nothing touched) when uncompressed
    pub fn launch(&mut self, bodies: &mut Bodies, ball: BodyHandle, power: f32) -> bool {
        if self.compression <= 0.0 {
            return false;
        }
        let power = if power.is_nan() { 0.0 } else { power.clamp(0.0, 1.0) };
        let force = self.spring_constant * self.compression * power;

        let body = &mut bodies[ball];
        body.velocity = Vec2::ZERO;
        body.angular_velocity = 0.0;
        let x = body.position.x;
        body.set_position(Vec2::new(x, self.rest_position.y - PLUNGER_LAUNCH_OFFSET));
        body.apply_impulse(Vec2::new(0.0, -force));
        log::debug!("Plunger fired: compression {:.1}, power {power:.2}, impulse {force:.0}", self.compression);

        self.compress(bodies, 0.0);
        true
    }

    /// Pre-solve response to a ball touching the head
    ///
    /// A ball at or below the head is shoved upward and, if still
    /// overlapping, lifted clear of it.
    pub fn catch_ball(&self, bodies: &mut Bodies, ball: &Ball) {
        let head = self.head(bodies);
        let body = &mut bodies[ball.body];
        if body.position.y < head.y {
            return;
        }
        body.apply_impulse(Vec2::new(0.0, -PLUNGER_CATCH_IMPULSE));
        if body.position.distance(head) < ball.radius + self.radius {
            let x = body.position.x;
            body.set_position(Vec2::new(x, head.y - ball.radius - self.radius - PLUNGER_CATCH_GAP));
            log::debug!("Ball lifted off the plunger head");
        }
    }

    /// Separate response: a ball leaving the sensor downward is put back above the head
    pub fn release_ball(&self, bodies: &mut Bodies, ball: &Ball) {
        let head = self.head(bodies);
        let body = &mut bodies[ball.body];
        if body.position.y > head.y && body.velocity.y > 0.0 {
            let x = body.position.x;
            body.set_position(Vec2::new(x, head.y - PLUNGER_RELEASE_OFFSET));
            body.velocity.y = -PLUNGER_RELEASE_SPEED;
            log::debug!("Ball slipped under the plunger, snapped back above");
        }
    }
}
