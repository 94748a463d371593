//! Rigid bodies
//!
//! A body carries the kinematic state (position, angle, velocities) and the
//! mass properties. Shapes and constraints refer to bodies by `BodyHandle`.

use std::ops::{Index, IndexMut};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// How the world treats a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves
    Static,
    /// Moved by direct assignment (or its own velocity), never by forces
    Kinematic,
    /// Integrated under gravity, forces and impulses
    Dynamic,
}

/// Index of a body inside a `World`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub(crate) usize);

impl BodyHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A rigid body
#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Rotation in radians (y-down screen space, positive turns +x toward +y)
    pub angle: f32,
    pub angular_velocity: f32,
    /// Accumulated force, applied during the next step
    pub force: Vec2,
    /// Accumulated torque, applied during the next step
    pub torque: f32,
    mass: f32,
    inv_mass: f32,
    moment: f32,
    inv_moment: f32,
    /// Position at the start of the last step (segment tunnelling test)
    pub(crate) prev_position: Vec2,
}

impl Body {
    fn with_kind(kind: BodyKind, mass: f32, moment: f32) -> Self {
        let inv = |v: f32| if kind == BodyKind::Dynamic && v > 0.0 && v.is_finite() { 1.0 / v } else { 0.0 };
        Self {
            kind,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass: inv(mass),
            moment,
            inv_moment: inv(moment),
            prev_position: Vec2::ZERO,
        }
    }

    /// Create a dynamic body with the given mass and moment of inertia
    pub fn dynamic(mass: f32, moment: f32) -> Self {
        Self::with_kind(BodyKind::Dynamic, mass, moment)
    }

    pub fn kinematic() -> Self {
        Self::with_kind(BodyKind::Kinematic, f32::INFINITY, f32::INFINITY)
    }

    pub fn fixed() -> Self {
        Self::with_kind(BodyKind::Static, f32::INFINITY, f32::INFINITY)
    }

    /// Builder: place the body
    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self.prev_position = position;
        self
    }

    /// Builder: set the initial angle
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn moment(&self) -> f32 {
        self.moment
    }

    #[inline]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    #[inline]
    pub fn inv_moment(&self) -> f32 {
        self.inv_moment
    }

    /// Rotate a body-local offset into world orientation (no translation)
    #[inline]
    pub fn rotate(&self, local: Vec2) -> Vec2 {
        Vec2::from_angle(self.angle).rotate(local)
    }

    /// Transform a body-local point to world space
    #[inline]
    pub fn local_to_world(&self, local: Vec2) -> Vec2 {
        self.position + self.rotate(local)
    }

    /// Velocity of the material point of this body located at `point`
    #[inline]
    pub fn velocity_at_world_point(&self, point: Vec2) -> Vec2 {
        let r = point - self.position;
        self.velocity + r.perp() * self.angular_velocity
    }

    /// Apply an instantaneous impulse at a world-space point
    pub fn apply_impulse_at_world_point(&mut self, impulse: Vec2, point: Vec2) {
        if !self.is_dynamic() {
            return;
        }
        let r = point - self.position;
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity += r.perp_dot(impulse) * self.inv_moment;
    }

    /// Apply an impulse through the centre of mass
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        if self.is_dynamic() {
            self.velocity += impulse * self.inv_mass;
        }
    }

    /// Stop all motion and clear accumulated force/torque
    pub fn halt(&mut self) {
        self.velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    /// Teleport the body; the tunnelling test treats this as the new origin
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.prev_position = position;
    }
}

/// Mass of a solid disc of the given density
pub fn mass_for_circle(density: f32, radius: f32) -> f32 {
    density * std::f32::consts::PI * radius * radius
}

/// Moment of inertia of a solid disc about its centre
pub fn moment_for_circle(mass: f32, radius: f32) -> f32 {
    0.5 * mass * radius * radius
}

/// Moment of inertia of a uniform convex polygon about the body origin
pub fn moment_for_polygon(mass: f32, vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let cross = a.perp_dot(b).abs();
        num += cross * (a.dot(a) + a.dot(b) + b.dot(b));
        den += cross;
    }
    if den <= 0.0 {
        return 0.0;
    }
    mass * num / (6.0 * den)
}

/// Body storage lent to collision handlers during a step
#[derive(Debug, Default, Clone)]
pub struct Bodies {
    items: Vec<Body>,
}

impl Bodies {
    pub(crate) fn insert(&mut self, body: Body) -> BodyHandle {
        self.items.push(body);
        BodyHandle(self.items.len() - 1)
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.items.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.items.get_mut(handle.0)
    }

    /// Mutable access to two distinct bodies at once
    pub fn pair_mut(&mut self, a: BodyHandle, b: BodyHandle) -> Option<(&mut Body, &mut Body)> {
        if a == b || a.0 >= self.items.len() || b.0 >= self.items.len() {
            return None;
        }
        if a.0 < b.0 {
            let (lo, hi) = self.items.split_at_mut(b.0);
            Some((&mut lo[a.0], &mut hi[0]))
        } else {
            let (lo, hi) = self.items.split_at_mut(a.0);
            Some((&mut hi[0], &mut lo[b.0]))
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Body> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.items.iter_mut()
    }
}

impl Index<BodyHandle> for Bodies {
    type Output = Body;

    fn index(&self, handle: BodyHandle) -> &Body {
        &self.items[handle.0]
    }
}

impl IndexMut<BodyHandle> for Bodies {
    fn index_mut(&mut self, handle: BodyHandle) -> &mut Body {
        &mut self.items[handle.0]
    }
}
