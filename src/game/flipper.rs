//! Flippers
//!
//! A flipper is a dynamic polygon pinned to the static body at its pivot,
//! held in `[-limit, limit]` by a rotary limit and pulled to its rest angle
//! by a damped spring. Pressing the button adds a motor constraint; letting
//! go removes it and the spring swings the flipper back down.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{
    FLIPPER_ANGLE_LIMIT, FLIPPER_BASE_HALF_WIDTH, FLIPPER_ELASTICITY, FLIPPER_FRICTION, FLIPPER_KICK_BASE,
    FLIPPER_KICK_SPEED_FACTOR, FLIPPER_LENGTH, FLIPPER_MASS, FLIPPER_MOTOR_MAX_FORCE, FLIPPER_MOTOR_RATE,
    FLIPPER_SPRING_DAMPING, FLIPPER_SPRING_STIFFNESS, FLIPPER_TIP_HALF_WIDTH,
};
use crate::error::Result;
use crate::sim::{
    Bodies, Body, BodyHandle, Category, Constraint, ConstraintHandle, Shape, ShapeHandle, ShapeKind, World,
    moment_for_polygon,
};

/// Which flipper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// +1 for the left flipper (its blade points toward +x), -1 for the right
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flipper {
    pub side: Side,
    pub body: BodyHandle,
    pub shape: ShapeHandle,
    pub pivot: Vec2,
    anchor: BodyHandle,
    motor: Option<ConstraintHandle>,
}

impl Flipper {
    pub fn new(world: &mut World, side: Side, pivot: Vec2) -> Result<Self> {
        let s = side.sign();
        let vertices = vec![
            Vec2::new(-FLIPPER_BASE_HALF_WIDTH * s, -FLIPPER_BASE_HALF_WIDTH),
            Vec2::new(FLIPPER_LENGTH * s, -FLIPPER_TIP_HALF_WIDTH),
            Vec2::new(FLIPPER_LENGTH * s, FLIPPER_TIP_HALF_WIDTH),
            Vec2::new(-FLIPPER_BASE_HALF_WIDTH * s, FLIPPER_BASE_HALF_WIDTH),
        ];
        let moment = moment_for_polygon(FLIPPER_MASS, &vertices);
        let rest = Self::rest_angle_for(side);

        let body = world.add_body(Body::dynamic(FLIPPER_MASS, moment).at(pivot).with_angle(rest));
        let shape = world.add_shape(
            Shape::new(body, ShapeKind::polygon(vertices), Category::Flipper)
                .with_elasticity(FLIPPER_ELASTICITY)
                .with_friction(FLIPPER_FRICTION),
        )?;

        let anchor = world.static_body();
        world.add_constraint(Constraint::pivot(anchor, body, pivot, Vec2::ZERO))?;
        world.add_constraint(Constraint::rotary_limit(
            anchor,
            body,
            -FLIPPER_ANGLE_LIMIT,
            FLIPPER_ANGLE_LIMIT,
        ))?;
        world.add_constraint(Constraint::damped_rotary_spring(
            anchor,
            body,
            rest,
            FLIPPER_SPRING_STIFFNESS,
            FLIPPER_SPRING_DAMPING,
        ))?;

        Ok(Self {
            side,
            body,
            shape,
            pivot,
            anchor,
            motor: None,
        })
    }

    /// Blade tip down: +limit for the left flipper, -limit for the right
    pub fn rest_angle_for(side: Side) -> f32 {
        FLIPPER_ANGLE_LIMIT * side.sign()
    }

    /// Blade tip up
    pub fn active_angle_for(side: Side) -> f32 {
        -Self::rest_angle_for(side)
    }

    /// Motor rate for `a.w - b.w`, anchor first; swings the tip upward
    pub fn motor_rate(&self) -> f32 {
        FLIPPER_MOTOR_RATE * self.side.sign()
    }

    pub fn is_active(&self) -> bool {
        self.motor.is_some()
    }

    pub fn angle(&self, world: &World) -> f32 {
        world.body(self.body).angle
    }

    /// Idle -> active; returns false when already active
    pub fn activate(&mut self, world: &mut World) -> Result<bool> {
        if self.motor.is_some() {
            return Ok(false);
        }
        let motor = world.add_constraint(Constraint::simple_motor(
            self.anchor,
            self.body,
            self.motor_rate(),
            FLIPPER_MOTOR_MAX_FORCE,
        ))?;
        self.motor = Some(motor);
        log::debug!("{} flipper up", self.side.as_str());
        Ok(true)
    }

    /// Active -> idle; returns false when already idle
    pub fn deactivate(&mut self, world: &mut World) -> bool {
        let Some(motor) = self.motor.take() else {
            return false;
        };
        if world.remove_constraint(motor).is_none() {
            log::warn!("{} flipper motor was already gone", self.side.as_str());
        }
        log::debug!("{} flipper down", self.side.as_str());
        true
    }

    /// Extra impulse on the ball from a swinging flipper
    ///
    /// Only while the motor is engaged. Direction is up and outward for this
    /// side; magnitude grows with the flipper's surface speed at `point`.
    pub fn kick(&self, bodies: &mut Bodies, ball: BodyHandle, point: Vec2) -> Option<Vec2> {
        if !self.is_active() {
            return None;
        }
        let surface_speed = bodies[self.body].velocity_at_world_point(point).length();
        let impulse = kick_impulse(self.side, surface_speed);
        bodies[ball].apply_impulse_at_world_point(impulse, point);
        Some(impulse)
    }
}

/// Kick along `normalize((-1, -3))` for the left flipper, `(1, -3)` for the right
pub fn kick_impulse(side: Side, surface_speed: f32) -> Vec2 {
    let direction = Vec2::new(-side.sign(), -3.0).normalize();
    direction * (FLIPPER_KICK_BASE + surface_speed * FLIPPER_KICK_SPEED_FACTOR)
}
