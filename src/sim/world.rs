//! Rigid-body world and the fixed-step solver
//!
//! One call to [`World::step`] runs, in order: velocity integration,
//! constraint pre-step, narrow phase, pre-solve callbacks, sequential-impulse
//! iterations, position integration, positional correction, post-solve
//! callbacks and separate callbacks.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use super::body::{Bodies, Body, BodyHandle, BodyKind};
use super::collision::{Contact, collide};
use super::constraint::{Constraint, ConstraintHandle, Constraints, Joint};
use super::handlers::{Arbiter, CollisionHandlers};
use super::shape::{Shape, ShapeHandle};
use crate::error::{PinballError, Result};

/// Penetration allowed before positional correction kicks in
const CONTACT_SLOP: f32 = 0.5;
/// Fraction of the remaining penetration removed per step
const CORRECTION_PERCENT: f32 = 0.8;
/// Approach speeds below this do not bounce (keeps resting contacts quiet)
const RESTITUTION_THRESHOLD: f32 = 10.0;

/// Solver state for one accepted contact
struct ContactPoint {
    bodies: (BodyHandle, BodyHandle),
    point: Vec2,
    normal: Vec2,
    normal_mass: f32,
    tangent_mass: f32,
    bounce: f32,
    friction: f32,
    normal_impulse: f32,
    tangent_impulse: f32,
}

/// A detected pair for the current step
struct Pending {
    /// Shape pair in narrow-phase order (lower index first)
    key: (ShapeHandle, ShapeHandle),
    contact: Contact,
    arbiter: Arbiter,
    sensor: bool,
    accepted: bool,
}

/// Owns bodies, shapes and constraints and advances them in time
pub struct World {
    gravity: Vec2,
    damping: f32,
    iterations: usize,
    bodies: Bodies,
    shapes: Vec<Shape>,
    constraints: Constraints,
    static_body: BodyHandle,
    /// Pairs in contact at the end of the last step
    touching: HashMap<(ShapeHandle, ShapeHandle), Arbiter>,
}

impl World {
    /// Create a world; gravity, damping and iteration count are fixed for its lifetime
    ///
    /// `damping` is the fraction of velocity kept per second of simulated time.
    pub fn new(gravity: Vec2, damping: f32, iterations: usize) -> Self {
        let mut bodies = Bodies::default();
        let static_body = bodies.insert(Body::fixed());
        Self {
            gravity,
            damping: damping.clamp(0.0, 1.0),
            iterations: iterations.max(1),
            bodies,
            shapes: Vec::new(),
            constraints: Constraints::default(),
            static_body,
            touching: HashMap::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The shared static body walls are attached to
    pub fn static_body(&self) -> BodyHandle {
        self.static_body
    }

    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        self.bodies.insert(body)
    }

    /// Attach a shape after validating its geometry
    pub fn add_shape(&mut self, shape: Shape) -> Result<ShapeHandle> {
        self.check_body(shape.body)?;
        shape.validate()?;
        self.shapes.push(shape);
        Ok(ShapeHandle(self.shapes.len() - 1))
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintHandle> {
        self.check_body(constraint.a)?;
        self.check_body(constraint.b)?;
        constraint.validate()?;
        Ok(self.constraints.insert(constraint))
    }

    /// Remove a constraint; `None` if the handle is stale
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Option<Constraint> {
        self.constraints.remove(handle)
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle)
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    fn check_body(&self, handle: BodyHandle) -> Result<()> {
        if handle.index() < self.bodies.len() {
            Ok(())
        } else {
            Err(PinballError::UnknownHandle {
                kind: "body",
                index: handle.index(),
            })
        }
    }

    /// Handles are only minted by this world, so indexing cannot miss
    pub fn body(&self, handle: BodyHandle) -> &Body {
        &self.bodies[handle]
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> &mut Body {
        &mut self.bodies[handle]
    }

    pub fn bodies(&self) -> &Bodies {
        &self.bodies
    }

    pub fn bodies_mut(&mut self) -> &mut Bodies {
        &mut self.bodies
    }

    pub fn shape(&self, handle: ShapeHandle) -> Option<&Shape> {
        self.shapes.get(handle.0)
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Whether two shapes were in contact at the end of the last step
    pub fn is_touching(&self, a: ShapeHandle, b: ShapeHandle) -> bool {
        let key = if a.0 <= b.0 { (a, b) } else { (b, a) };
        self.touching.contains_key(&key)
    }

    /// Advance the world by `dt`, dispatching collision callbacks with `ctx`
    pub fn step<C>(&mut self, dt: f32, handlers: &CollisionHandlers<C>, ctx: &mut C) {
        if !(dt > 0.0) {
            return;
        }

        self.integrate_velocities(dt);
        for constraint in self.constraints.iter_mut() {
            constraint.pre_step(&mut self.bodies, dt);
        }

        let mut pending = self.narrow_phase(handlers);

        for p in pending.iter_mut() {
            let Some(f) = handlers
                .lookup(p.arbiter.categories.0, p.arbiter.categories.1)
                .and_then(|(pair, _)| pair.pre_solve)
            else {
                continue;
            };
            match f(&p.arbiter, &mut self.bodies, ctx) {
                Ok(accept) => p.accepted = accept,
                Err(e) => log::warn!("pre-solve handler for {:?} failed: {e}", p.arbiter.categories),
            }
        }

        let mut points: Vec<ContactPoint> = pending
            .iter()
            .filter(|p| p.accepted && !p.sensor)
            .filter_map(|p| self.prepare_contact(p))
            .collect();

        for _ in 0..self.iterations {
            // Motors first so limits get the final word each iteration
            for constraint in self.constraints.iter_mut().filter(|c| is_motor(c)) {
                constraint.solve_velocity(&mut self.bodies, dt);
            }
            for constraint in self.constraints.iter_mut().filter(|c| !is_motor(c)) {
                constraint.solve_velocity(&mut self.bodies, dt);
            }
            for point in points.iter_mut() {
                solve_contact(point, &mut self.bodies);
            }
        }

        self.integrate_positions(dt);

        let rejected: HashSet<(ShapeHandle, ShapeHandle)> =
            pending.iter().filter(|p| !p.accepted).map(|p| p.key).collect();
        self.correct_positions(&rejected);

        for p in pending.iter().filter(|p| p.accepted) {
            let Some(f) = handlers
                .lookup(p.arbiter.categories.0, p.arbiter.categories.1)
                .and_then(|(pair, _)| pair.post_solve)
            else {
                continue;
            };
            if let Err(e) = f(&p.arbiter, &mut self.bodies, ctx) {
                log::warn!("post-solve handler for {:?} failed: {e}", p.arbiter.categories);
            }
        }

        let now: HashMap<_, _> = pending.iter().map(|p| (p.key, p.arbiter)).collect();
        let previous = std::mem::replace(&mut self.touching, now);
        let mut ended: Vec<_> = previous
            .into_iter()
            .filter(|(key, _)| !self.touching.contains_key(key))
            .collect();
        ended.sort_by_key(|(key, _)| *key);
        for (_, arbiter) in ended {
            let Some(f) = handlers
                .lookup(arbiter.categories.0, arbiter.categories.1)
                .and_then(|(pair, _)| pair.separate)
            else {
                continue;
            };
            if let Err(e) = f(&arbiter, &mut self.bodies, ctx) {
                log::warn!("separate handler for {:?} failed: {e}", arbiter.categories);
            }
        }
    }

    fn integrate_velocities(&mut self, dt: f32) {
        let damping = self.damping.powf(dt);
        let gravity = self.gravity;
        for body in self.bodies.iter_mut() {
            body.prev_position = body.position;
            if body.is_dynamic() {
                body.velocity = (body.velocity + (gravity + body.force * body.inv_mass()) * dt) * damping;
                body.angular_velocity = (body.angular_velocity + body.torque * body.inv_moment() * dt) * damping;
            }
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    fn integrate_positions(&mut self, dt: f32) {
        for body in self.bodies.iter_mut() {
            if body.kind == BodyKind::Static {
                continue;
            }
            body.position += body.velocity * dt;
            body.angle += body.angular_velocity * dt;
        }
    }

    /// Shape pairs that may interact: different bodies, at least one
    /// dynamic body, not both sensors
    fn candidate_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.shapes.len() {
            for j in (i + 1)..self.shapes.len() {
                let (sa, sb) = (&self.shapes[i], &self.shapes[j]);
                if sa.body == sb.body || (sa.sensor && sb.sensor) {
                    continue;
                }
                if !self.bodies[sa.body].is_dynamic() && !self.bodies[sb.body].is_dynamic() {
                    continue;
                }
                pairs.push((i, j));
            }
        }
        pairs
    }

    fn narrow_phase<C>(&self, handlers: &CollisionHandlers<C>) -> Vec<Pending> {
        let mut pending = Vec::new();
        for (i, j) in self.candidate_pairs() {
            let (sa, sb) = (&self.shapes[i], &self.shapes[j]);
            let Some(contact) = collide(sa, &self.bodies[sa.body], sb, &self.bodies[sb.body]) else {
                continue;
            };
            let key = (ShapeHandle(i), ShapeHandle(j));
            let arbiter = Arbiter {
                shapes: key,
                bodies: (sa.body, sb.body),
                categories: (sa.category, sb.category),
                normal: contact.normal,
                point: contact.point,
                depth: contact.depth,
                first_contact: !self.touching.contains_key(&key),
            };
            let swapped = handlers
                .lookup(sa.category, sb.category)
                .is_some_and(|(_, swapped)| swapped);
            pending.push(Pending {
                key,
                contact,
                arbiter: if swapped { arbiter.swapped() } else { arbiter },
                sensor: sa.sensor || sb.sensor,
                accepted: true,
            });
        }
        pending
    }

    fn prepare_contact(&self, p: &Pending) -> Option<ContactPoint> {
        let (sa, sb) = (&self.shapes[p.key.0.0], &self.shapes[p.key.1.0]);
        let (a, b) = (&self.bodies[sa.body], &self.bodies[sb.body]);
        let point = p.contact.point;
        let normal = p.contact.normal;
        let tangent = normal.perp();
        let r_a = point - a.position;
        let r_b = point - b.position;

        let effective = |dir: Vec2| {
            let ra = r_a.perp_dot(dir);
            let rb = r_b.perp_dot(dir);
            let k = a.inv_mass() + b.inv_mass() + a.inv_moment() * ra * ra + b.inv_moment() * rb * rb;
            if k > 0.0 { 1.0 / k } else { 0.0 }
        };
        let normal_mass = effective(normal);
        if normal_mass <= 0.0 {
            return None;
        }

        let approach = (b.velocity_at_world_point(point) - a.velocity_at_world_point(point)).dot(normal);
        let elasticity = sa.elasticity * sb.elasticity;
        let bounce = if approach < -RESTITUTION_THRESHOLD {
            -elasticity * approach
        } else {
            0.0
        };

        Some(ContactPoint {
            bodies: (sa.body, sb.body),
            point,
            normal,
            normal_mass,
            tangent_mass: effective(tangent),
            bounce,
            friction: sa.friction * sb.friction,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        })
    }

    /// Push overlapping non-sensor pairs apart, then fix up joints
    fn correct_positions(&mut self, rejected: &HashSet<(ShapeHandle, ShapeHandle)>) {
        for (i, j) in self.candidate_pairs() {
            if rejected.contains(&(ShapeHandle(i), ShapeHandle(j))) {
                continue;
            }
            let (sa, sb) = (&self.shapes[i], &self.shapes[j]);
            if sa.sensor || sb.sensor {
                continue;
            }
            let Some(contact) = collide(sa, &self.bodies[sa.body], sb, &self.bodies[sb.body]) else {
                continue;
            };
            if contact.depth <= CONTACT_SLOP {
                continue;
            }
            let Some((a, b)) = self.bodies.pair_mut(sa.body, sb.body) else {
                continue;
            };
            let m_sum = a.inv_mass() + b.inv_mass();
            if m_sum <= 0.0 {
                continue;
            }
            let correction = contact.normal * ((contact.depth - CONTACT_SLOP) * CORRECTION_PERCENT / m_sum);
            a.position -= correction * a.inv_mass();
            b.position += correction * b.inv_mass();
        }

        for constraint in self.constraints.iter() {
            constraint.correct_position(&mut self.bodies);
        }
    }
}

fn is_motor(constraint: &Constraint) -> bool {
    matches!(constraint.joint, Joint::SimpleMotor { .. })
}

fn solve_contact(c: &mut ContactPoint, bodies: &mut Bodies) {
    let Some((a, b)) = bodies.pair_mut(c.bodies.0, c.bodies.1) else {
        return;
    };

    let relative = b.velocity_at_world_point(c.point) - a.velocity_at_world_point(c.point);
    let vn = relative.dot(c.normal);
    let jn = (c.bounce - vn) * c.normal_mass;
    let old = c.normal_impulse;
    c.normal_impulse = (old + jn).max(0.0);
    let jn = c.normal_impulse - old;
    let impulse = c.normal * jn;
    a.apply_impulse_at_world_point(-impulse, c.point);
    b.apply_impulse_at_world_point(impulse, c.point);

    if c.friction <= 0.0 || c.tangent_mass <= 0.0 {
        return;
    }
    let tangent = c.normal.perp();
    let relative = b.velocity_at_world_point(c.point) - a.velocity_at_world_point(c.point);
    let jt = -relative.dot(tangent) * c.tangent_mass;
    let max_friction = c.friction * c.normal_impulse;
    let old = c.tangent_impulse;
    c.tangent_impulse = (old + jt).clamp(-max_friction, max_friction);
    let jt = c.tangent_impulse - old;
    let impulse = tangent * jt;
    a.apply_impulse_at_world_point(-impulse, c.point);
    b.apply_impulse_at_world_point(impulse, c.point);
}
