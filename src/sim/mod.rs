//! Rigid-body simulation module
//!
//! A small 2D sequential-impulse solver:
//! - Fixed timestep, fixed iteration count
//! - Circles, rounded segments and convex polygons
//! - Pivot, rotary limit, damped rotary spring and motor joints
//! - Collision callbacks keyed by category pairs

pub mod body;
pub mod collision;
pub mod constraint;
pub mod handlers;
pub mod shape;
pub mod world;

pub use body::{Bodies, Body, BodyHandle, BodyKind, mass_for_circle, moment_for_circle, moment_for_polygon};
pub use collision::{Contact, reflect_velocity};
pub use constraint::{Constraint, ConstraintHandle, Joint};
pub use handlers::{Arbiter, CollisionHandlers, PairHandlers, PostSolveFn, PreSolveFn, SeparateFn};
pub use shape::{Category, Shape, ShapeHandle, ShapeKind};
pub use world::World;
