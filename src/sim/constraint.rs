//! Joints between two bodies
//!
//! Angles are measured as `b.angle - a.angle` (anchor body first), except the
//! motor which drives `a.w - b.w` toward its rate.

use glam::{Mat2, Vec2};

use super::body::{Bodies, Body, BodyHandle};
use crate::error::{PinballError, Result};

/// Joint variant and parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Joint {
    /// Keeps two body-local anchors at the same world point
    Pivot { anchor_a: Vec2, anchor_b: Vec2 },
    /// Clamps the relative angle to `[min, max]`
    RotaryLimit { min: f32, max: f32 },
    /// Pulls the relative angle toward `rest_angle`
    DampedRotarySpring {
        rest_angle: f32,
        stiffness: f32,
        damping: f32,
    },
    /// Drives the relative angular velocity, bounded by `max_force`
    SimpleMotor { rate: f32, max_force: f32 },
}

/// A joint and the two bodies it connects
#[derive(Debug, Clone)]
pub struct Constraint {
    pub a: BodyHandle,
    pub b: BodyHandle,
    pub joint: Joint,
    /// Impulse accumulated by the motor during the current step
    accumulated: f32,
}

impl Constraint {
    pub fn new(a: BodyHandle, b: BodyHandle, joint: Joint) -> Self {
        Self {
            a,
            b,
            joint,
            accumulated: 0.0,
        }
    }

    pub fn pivot(a: BodyHandle, b: BodyHandle, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        Self::new(a, b, Joint::Pivot { anchor_a, anchor_b })
    }

    pub fn rotary_limit(a: BodyHandle, b: BodyHandle, min: f32, max: f32) -> Self {
        Self::new(a, b, Joint::RotaryLimit { min, max })
    }

    pub fn damped_rotary_spring(
        a: BodyHandle,
        b: BodyHandle,
        rest_angle: f32,
        stiffness: f32,
        damping: f32,
    ) -> Self {
        Self::new(
            a,
            b,
            Joint::DampedRotarySpring {
                rest_angle,
                stiffness,
                damping,
            },
        )
    }

    pub fn simple_motor(a: BodyHandle, b: BodyHandle, rate: f32, max_force: f32) -> Self {
        Self::new(a, b, Joint::SimpleMotor { rate, max_force })
    }

    pub fn validate(&self) -> Result<()> {
        if self.a == self.b {
            return Err(PinballError::InvalidConstraint(format!(
                "constraint joins body {} to itself",
                self.a.index()
            )));
        }
        match self.joint {
            Joint::Pivot { anchor_a, anchor_b } if !anchor_a.is_finite() || !anchor_b.is_finite() => {
                Err(PinballError::InvalidConstraint("pivot anchor is not finite".into()))
            }
            Joint::RotaryLimit { min, max } if !(min <= max) => Err(PinballError::InvalidConstraint(
                format!("rotary limit min {min} exceeds max {max}"),
            )),
            Joint::DampedRotarySpring {
                stiffness, damping, ..
            } if stiffness < 0.0 || damping < 0.0 => Err(PinballError::InvalidConstraint(
                "spring stiffness and damping must be non-negative".into(),
            )),
            Joint::SimpleMotor { max_force, .. } if !(max_force >= 0.0) => Err(
                PinballError::InvalidConstraint("motor max force must be non-negative".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Spring torque and damping, applied once per step before the solver
    pub(crate) fn pre_step(&mut self, bodies: &mut Bodies, dt: f32) {
        self.accumulated = 0.0;
        let Joint::DampedRotarySpring {
            rest_angle,
            stiffness,
            damping,
        } = self.joint
        else {
            return;
        };
        let Some((a, b)) = bodies.pair_mut(self.a, self.b) else {
            return;
        };
        let i_sum = a.inv_moment() + b.inv_moment();
        if i_sum <= 0.0 {
            return;
        }

        let relative = b.angle - a.angle;
        let j_spring = -(relative - rest_angle) * stiffness * dt;
        apply_angular(a, b, j_spring);

        let w_rel = b.angular_velocity - a.angular_velocity;
        let w_coef = 1.0 - (-damping * dt * i_sum).exp();
        let j_damp = -w_rel * w_coef / i_sum;
        apply_angular(a, b, j_damp);
    }

    /// One sequential-impulse velocity iteration
    pub(crate) fn solve_velocity(&mut self, bodies: &mut Bodies, dt: f32) {
        let Some((a, b)) = bodies.pair_mut(self.a, self.b) else {
            return;
        };
        match self.joint {
            Joint::Pivot { anchor_a, anchor_b } => solve_pivot(a, b, anchor_a, anchor_b),
            Joint::RotaryLimit { min, max } => {
                let i_sum = a.inv_moment() + b.inv_moment();
                if i_sum <= 0.0 || dt <= 0.0 {
                    return;
                }
                let relative = b.angle - a.angle;
                let w_rel = b.angular_velocity - a.angular_velocity;
                // Fastest relative rates that keep the next angle in range
                let lowest = (min - relative) / dt;
                let highest = (max - relative) / dt;
                let target = if w_rel < lowest {
                    lowest
                } else if w_rel > highest {
                    highest
                } else {
                    return;
                };
                apply_angular(a, b, (target - w_rel) / i_sum);
            }
            Joint::DampedRotarySpring { .. } => {}
            Joint::SimpleMotor { rate, max_force } => {
                let i_sum = a.inv_moment() + b.inv_moment();
                if i_sum <= 0.0 {
                    return;
                }
                let w_rel = a.angular_velocity - b.angular_velocity;
                let j = (rate - w_rel) / i_sum;
                let max_impulse = max_force * dt;
                let old = self.accumulated;
                self.accumulated = (old + j).clamp(-max_impulse, max_impulse);
                let applied = self.accumulated - old;
                // Positive j raises a.w and lowers b.w
                apply_angular(a, b, -applied);
            }
        }
    }

    /// Positional fix-up after integration
    pub(crate) fn correct_position(&self, bodies: &mut Bodies) {
        let Some((a, b)) = bodies.pair_mut(self.a, self.b) else {
            return;
        };
        match self.joint {
            Joint::Pivot { anchor_a, anchor_b } => {
                let error = b.local_to_world(anchor_b) - a.local_to_world(anchor_a);
                let m_sum = a.inv_mass() + b.inv_mass();
                if m_sum <= 0.0 || error.length_squared() < 1e-12 {
                    return;
                }
                a.position += error * (a.inv_mass() / m_sum);
                b.position -= error * (b.inv_mass() / m_sum);
            }
            Joint::RotaryLimit { min, max } => {
                let relative = b.angle - a.angle;
                let clamped = relative.clamp(min, max);
                if clamped == relative {
                    return;
                }
                let moving_out = |w_rel: f32| (relative > max && w_rel > 0.0) || (relative < min && w_rel < 0.0);
                if b.inv_moment() > 0.0 {
                    b.angle = a.angle + clamped;
                    if moving_out(b.angular_velocity - a.angular_velocity) {
                        b.angular_velocity = a.angular_velocity;
                    }
                } else if a.inv_moment() > 0.0 {
                    a.angle = b.angle - clamped;
                    if moving_out(b.angular_velocity - a.angular_velocity) {
                        a.angular_velocity = b.angular_velocity;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Angular impulse `j` on b, `-j` on a
fn apply_angular(a: &mut Body, b: &mut Body, j: f32) {
    a.angular_velocity -= j * a.inv_moment();
    b.angular_velocity += j * b.inv_moment();
}

fn solve_pivot(a: &mut Body, b: &mut Body, anchor_a: Vec2, anchor_b: Vec2) {
    let r1 = a.rotate(anchor_a);
    let r2 = b.rotate(anchor_b);
    let (ma, mb) = (a.inv_mass(), b.inv_mass());
    let (ia, ib) = (a.inv_moment(), b.inv_moment());

    let k11 = ma + mb + ia * r1.y * r1.y + ib * r2.y * r2.y;
    let k12 = -ia * r1.x * r1.y - ib * r2.x * r2.y;
    let k22 = ma + mb + ia * r1.x * r1.x + ib * r2.x * r2.x;
    let k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
    if k.determinant().abs() < 1e-12 {
        return;
    }

    let vr = b.velocity + r2.perp() * b.angular_velocity - a.velocity - r1.perp() * a.angular_velocity;
    let j = -(k.inverse() * vr);

    a.velocity -= j * ma;
    a.angular_velocity -= r1.perp_dot(j) * ia;
    b.velocity += j * mb;
    b.angular_velocity += r2.perp_dot(j) * ib;
}

/// Generational index of a constraint in the world arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    constraint: Option<Constraint>,
}

/// Arena of live constraints; removed slots are reused
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl Constraints {
    pub(crate) fn insert(&mut self, constraint: Constraint) -> ConstraintHandle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.constraint = Some(constraint);
            return ConstraintHandle {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            constraint: Some(constraint),
        });
        ConstraintHandle {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub(crate) fn remove(&mut self, handle: ConstraintHandle) -> Option<Constraint> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let removed = slot.constraint.take()?;
        self.free.push(handle.index);
        self.live -= 1;
        Some(removed)
    }

    pub fn get(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.constraint.as_ref())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Constraint> {
        self.slots.iter_mut().filter_map(|slot| slot.constraint.as_mut())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.slots.iter().filter_map(|slot| slot.constraint.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchored_pair() -> (Bodies, BodyHandle, BodyHandle) {
        let mut bodies = Bodies::default();
        let anchor = bodies.insert(Body::fixed());
        let arm = bodies.insert(Body::dynamic(1.0, 10.0));
        (bodies, anchor, arm)
    }

    #[test]
    fn test_self_constraint_rejected() {
        let c = Constraint::pivot(BodyHandle(1), BodyHandle(1), Vec2::ZERO, Vec2::ZERO);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_inverted_limit_rejected() {
        let c = Constraint::rotary_limit(BodyHandle(0), BodyHandle(1), 0.5, -0.5);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rotary_limit_projection_is_exact() {
        let (mut bodies, anchor, arm) = anchored_pair();
        bodies[arm].angle = 0.9;
        bodies[arm].angular_velocity = 3.0;
        let c = Constraint::rotary_limit(anchor, arm, -0.4, 0.4);
        c.correct_position(&mut bodies);
        assert_eq!(bodies[arm].angle, 0.4);
        assert_eq!(bodies[arm].angular_velocity, 0.0);
    }

    #[test]
    fn test_motor_reaches_rate_and_respects_sign() {
        let (mut bodies, anchor, arm) = anchored_pair();
        let mut c = Constraint::simple_motor(anchor, arm, 20.0, 1e6);
        c.pre_step(&mut bodies, 1.0 / 90.0);
        c.solve_velocity(&mut bodies, 1.0 / 90.0);
        // a.w - b.w == rate with a static anchor
        assert!((bodies[arm].angular_velocity + 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_motor_bounded_by_max_force() {
        let (mut bodies, anchor, arm) = anchored_pair();
        let mut c = Constraint::simple_motor(anchor, arm, 20.0, 90.0);
        c.pre_step(&mut bodies, 1.0 / 90.0);
        for _ in 0..10 {
            c.solve_velocity(&mut bodies, 1.0 / 90.0);
        }
        // Max impulse 1.0 over moment 10
        assert!((bodies[arm].angular_velocity + 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_spring_pulls_toward_rest() {
        let (mut bodies, anchor, arm) = anchored_pair();
        bodies[arm].angle = 0.5;
        let mut c = Constraint::damped_rotary_spring(anchor, arm, 0.0, 100.0, 0.0);
        c.pre_step(&mut bodies, 0.1);
        assert!(bodies[arm].angular_velocity < 0.0);
    }

    #[test]
    fn test_arena_reuses_slots_with_fresh_handles() {
        let mut arena = Constraints::default();
        let first = arena.insert(Constraint::simple_motor(BodyHandle(0), BodyHandle(1), 1.0, 1.0));
        assert!(arena.remove(first).is_some());
        assert!(arena.remove(first).is_none());
        let second = arena.insert(Constraint::simple_motor(BodyHandle(0), BodyHandle(1), 1.0, 1.0));
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert!(arena.get(second).is_some());
        assert_eq!(arena.len(), 1);
    }
}
