//! Collision shapes
//!
//! Shapes are attached to exactly one body and described in that body's
//! local frame. The category tag selects collision handlers.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::BodyHandle;
use crate::error::{PinballError, Result};

/// Collision category of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Ball,
    Wall,
    Flipper,
    Plunger,
    PlungerSensor,
    Bumper,
    Drain,
}

/// Geometry of a shape, in body-local coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Circle { radius: f32, offset: Vec2 },
    /// Rounded segment; `radius` thickens it into a capsule
    Segment { a: Vec2, b: Vec2, radius: f32 },
    /// Convex polygon, counter-clockwise in a y-up sense
    Polygon { vertices: Vec<Vec2> },
}

impl ShapeKind {
    pub fn circle(radius: f32) -> Self {
        ShapeKind::Circle { radius, offset: Vec2::ZERO }
    }

    pub fn segment(a: Vec2, b: Vec2, radius: f32) -> Self {
        ShapeKind::Segment { a, b, radius }
    }

    /// Build a polygon, normalising winding so outward normals are `(e.y, -e.x)`
    pub fn polygon(mut vertices: Vec<Vec2>) -> Self {
        if signed_area(&vertices) < 0.0 {
            vertices.reverse();
        }
        ShapeKind::Polygon { vertices }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ShapeKind::Circle { radius, offset } => {
                if !(*radius > 0.0) || !radius.is_finite() || !offset.is_finite() {
                    return Err(PinballError::InvalidShape(format!(
                        "circle radius must be positive and finite, got {radius}"
                    )));
                }
            }
            ShapeKind::Segment { a, b, radius } => {
                if a.distance_squared(*b) < 1e-8 {
                    return Err(PinballError::DegenerateSegment(*a, *b));
                }
                if *radius < 0.0 || !radius.is_finite() || !a.is_finite() || !b.is_finite() {
                    return Err(PinballError::InvalidShape(format!(
                        "segment radius must be non-negative and finite, got {radius}"
                    )));
                }
            }
            ShapeKind::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(PinballError::InvalidShape(format!(
                        "polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    )));
                }
                if signed_area(vertices).abs() < 1e-6 {
                    return Err(PinballError::InvalidShape("polygon has zero area".into()));
                }
                if !is_convex(vertices) {
                    return Err(PinballError::InvalidShape("polygon is not convex".into()));
                }
            }
        }
        Ok(())
    }
}

/// Twice the signed area, positive for counter-clockwise (y-up) winding
fn signed_area(vertices: &[Vec2]) -> f32 {
    let n = vertices.len();
    (0..n).map(|i| vertices[i].perp_dot(vertices[(i + 1) % n])).sum()
}

fn is_convex(vertices: &[Vec2]) -> bool {
    let n = vertices.len();
    let sign = signed_area(vertices).signum();
    (0..n).all(|i| {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let c = vertices[(i + 2) % n];
        (b - a).perp_dot(c - b) * sign >= -1e-6
    })
}

/// Index of a shape inside a `World`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeHandle(pub(crate) usize);

impl ShapeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A shape attached to a body
#[derive(Debug, Clone)]
pub struct Shape {
    pub body: BodyHandle,
    pub kind: ShapeKind,
    pub elasticity: f32,
    pub friction: f32,
    pub category: Category,
    /// Sensors detect contact but never receive a collision response
    pub sensor: bool,
}

impl Shape {
    pub fn new(body: BodyHandle, kind: ShapeKind, category: Category) -> Self {
        Self {
            body,
            kind,
            elasticity: 0.0,
            friction: 0.0,
            category,
            sensor: false,
        }
    }

    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn as_sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    /// Reject geometry the narrow phase cannot handle
    pub fn validate(&self) -> Result<()> {
        self.kind.validate()?;
        if self.elasticity < 0.0 || self.friction < 0.0 {
            return Err(PinballError::InvalidShape(format!(
                "elasticity and friction must be non-negative ({}, {})",
                self.elasticity, self.friction
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() -> BodyHandle {
        BodyHandle(0)
    }

    #[test]
    fn test_degenerate_segment_rejected() {
        let p = Vec2::new(5.0, 5.0);
        let shape = Shape::new(body(), ShapeKind::segment(p, p, 1.0), Category::Wall);
        assert!(matches!(shape.validate(), Err(PinballError::DegenerateSegment(_, _))));
    }

    #[test]
    fn test_non_positive_radius_rejected() {
        let shape = Shape::new(body(), ShapeKind::circle(0.0), Category::Ball);
        assert!(shape.validate().is_err());
        let shape = Shape::new(body(), ShapeKind::circle(-3.0), Category::Ball);
        assert!(shape.validate().is_err());
    }

    #[test]
    fn test_polygon_winding_normalised() {
        // Clockwise in y-up terms
        let kind = ShapeKind::polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
        ]);
        let ShapeKind::Polygon { vertices } = &kind else {
            panic!("expected polygon");
        };
        assert!(signed_area(vertices) > 0.0);
        assert!(kind.validate().is_ok());
    }

    #[test]
    fn test_concave_polygon_rejected() {
        let kind = ShapeKind::polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 4.0),
        ]);
        assert!(kind.validate().is_err());
    }
}
