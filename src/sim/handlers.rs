//! Collision handler registry
//!
//! Handlers are plain function pointers keyed by an ordered pair of
//! categories, so one callback can serve several pairs. Each receives the
//! arbiter for the contact, the world's bodies and a caller-supplied context.

use std::collections::HashMap;

use glam::Vec2;

use super::body::{Bodies, BodyHandle};
use super::shape::{Category, ShapeHandle};
use crate::error::Result;

/// A contacting shape pair as seen by a handler
///
/// Shapes, bodies and categories are listed in the order the handler was
/// registered with; `normal` points from the first toward the second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arbiter {
    pub shapes: (ShapeHandle, ShapeHandle),
    pub bodies: (BodyHandle, BodyHandle),
    pub categories: (Category, Category),
    pub normal: Vec2,
    pub point: Vec2,
    pub depth: f32,
    pub(crate) first_contact: bool,
}

impl Arbiter {
    /// True on the first step of a contact event
    pub fn is_first_contact(&self) -> bool {
        self.first_contact
    }

    /// The same contact seen from the other shape
    pub fn swapped(&self) -> Self {
        Self {
            shapes: (self.shapes.1, self.shapes.0),
            bodies: (self.bodies.1, self.bodies.0),
            categories: (self.categories.1, self.categories.0),
            normal: -self.normal,
            ..*self
        }
    }
}

/// Called before the solver; returning `false` drops the collision response
pub type PreSolveFn<C> = fn(&Arbiter, &mut Bodies, &mut C) -> Result<bool>;
/// Called after positions are integrated, for contacts that were accepted
pub type PostSolveFn<C> = fn(&Arbiter, &mut Bodies, &mut C) -> Result<()>;
/// Called once when a pair that touched last step no longer touches
pub type SeparateFn<C> = fn(&Arbiter, &mut Bodies, &mut C) -> Result<()>;

/// Callbacks registered for one category pair
pub struct PairHandlers<C> {
    pub pre_solve: Option<PreSolveFn<C>>,
    pub post_solve: Option<PostSolveFn<C>>,
    pub separate: Option<SeparateFn<C>>,
}

impl<C> Default for PairHandlers<C> {
    fn default() -> Self {
        Self {
            pre_solve: None,
            post_solve: None,
            separate: None,
        }
    }
}

/// Registry of handlers keyed by ordered category pair
pub struct CollisionHandlers<C> {
    pairs: HashMap<(Category, Category), PairHandlers<C>>,
}

impl<C> Default for CollisionHandlers<C> {
    fn default() -> Self {
        Self {
            pairs: HashMap::new(),
        }
    }
}

impl<C> CollisionHandlers<C> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, first: Category, second: Category) -> &mut PairHandlers<C> {
        self.pairs.entry((first, second)).or_default()
    }

    pub fn on_pre_solve(&mut self, first: Category, second: Category, f: PreSolveFn<C>) -> &mut Self {
        self.entry(first, second).pre_solve = Some(f);
        self
    }

    pub fn on_post_solve(&mut self, first: Category, second: Category, f: PostSolveFn<C>) -> &mut Self {
        self.entry(first, second).post_solve = Some(f);
        self
    }

    pub fn on_separate(&mut self, first: Category, second: Category, f: SeparateFn<C>) -> &mut Self {
        self.entry(first, second).separate = Some(f);
        self
    }

    /// Find handlers for a pair; the flag is true when the pair was
    /// registered in the opposite order
    pub fn lookup(&self, a: Category, b: Category) -> Option<(&PairHandlers<C>, bool)> {
        if let Some(handlers) = self.pairs.get(&(a, b)) {
            return Some((handlers, false));
        }
        self.pairs.get(&(b, a)).map(|handlers| (handlers, true))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
