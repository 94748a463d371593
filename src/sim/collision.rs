//! Narrow-phase collision detection
//!
//! Every supported pair involves at least one circle: the ball is the only
//! dynamic round body on the table, and flippers/walls/bumpers only ever need
//! to be tested against it. Normals always point from the first shape toward
//! the second.

use glam::Vec2;

use super::body::Body;
use super::shape::{Shape, ShapeKind};

/// A single contact point between two shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World-space contact point
    pub point: Vec2,
    /// Unit normal from shape A toward shape B
    pub normal: Vec2,
    /// Penetration depth (positive when overlapping)
    pub depth: f32,
}

impl Contact {
    pub fn flipped(self) -> Self {
        Self {
            normal: -self.normal,
            ..self
        }
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Closest point to `p` on segment `a`-`b`
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Circle vs circle
pub fn circle_vs_circle(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> Option<Contact> {
    let delta = pos_b - pos_a;
    let dist_sq = delta.length_squared();
    let sum_r = radius_a + radius_b;
    if dist_sq > sum_r * sum_r {
        return None;
    }

    let dist = dist_sq.sqrt();
    // Concentric: push B upward
    let normal = if dist > 1e-6 { delta / dist } else { Vec2::NEG_Y };
    let depth = sum_r - dist;
    Some(Contact {
        point: pos_a + normal * (radius_a - depth * 0.5),
        normal,
        depth,
    })
}

/// Rounded segment vs circle, normal from segment toward circle
///
/// `prev_centre` is where the circle was at the start of the step. If the
/// centre crossed the segment's line within its extent, the contact is
/// reported against the side it came from, so a fast ball cannot tunnel
/// through a thin wall.
pub fn segment_vs_circle(
    seg_a: Vec2,
    seg_b: Vec2,
    seg_radius: f32,
    centre: Vec2,
    radius: f32,
    prev_centre: Vec2,
) -> Option<Contact> {
    let sum_r = seg_radius + radius;
    let edge = seg_b - seg_a;
    let len = edge.length();
    if len < 1e-6 {
        return None;
    }
    let line_normal = Vec2::new(edge.y, -edge.x) / len;

    let side_now = (centre - seg_a).dot(line_normal);
    let side_prev = (prev_centre - seg_a).dot(line_normal);
    if side_now.signum() != side_prev.signum() && side_prev.abs() > 1e-4 {
        let travel = side_prev - side_now;
        if travel.abs() > 1e-6 {
            let s = side_prev / travel;
            let crossing = prev_centre + (centre - prev_centre) * s;
            let u = (crossing - seg_a).dot(edge) / (len * len);
            if (0.0..=1.0).contains(&u) {
                let normal = line_normal * side_prev.signum();
                let closest = seg_a + edge * u.clamp(0.0, 1.0);
                log::trace!("segment crossing resolved back to the entry side at {closest}");
                return Some(Contact {
                    point: closest + normal * seg_radius,
                    normal,
                    depth: sum_r + side_now.abs(),
                });
            }
        }
    }

    let closest = closest_point_on_segment(seg_a, seg_b, centre);
    let delta = centre - closest;
    let dist_sq = delta.length_squared();
    if dist_sq > sum_r * sum_r {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist > 1e-6 {
        delta / dist
    } else if side_prev.abs() > 1e-6 {
        line_normal * side_prev.signum()
    } else {
        line_normal
    };
    Some(Contact {
        point: closest + normal * seg_radius,
        normal,
        depth: sum_r - dist,
    })
}

/// Convex polygon (world-space vertices) vs circle, normal from polygon toward circle
///
/// Separating-axis search over the edges, then Voronoi classification of the
/// best edge into vertex or edge region.
pub fn polygon_vs_circle(vertices: &[Vec2], centre: Vec2, radius: f32) -> Option<Contact> {
    let n = vertices.len();
    if n < 3 {
        return None;
    }

    let mut best_dist = f32::NEG_INFINITY;
    let mut best_normal = Vec2::ZERO;
    let mut best_idx = 0;
    for i in 0..n {
        let a = vertices[i];
        let edge = vertices[(i + 1) % n] - a;
        let normal = Vec2::new(edge.y, -edge.x).normalize_or_zero();
        let d = (centre - a).dot(normal);
        if d > best_dist {
            best_dist = d;
            best_normal = normal;
            best_idx = i;
        }
    }

    if best_dist > radius {
        return None;
    }

    let a = vertices[best_idx];
    let b = vertices[(best_idx + 1) % n];
    let edge = b - a;
    let edge_len_sq = edge.length_squared();
    let t = if edge_len_sq > 0.0 {
        (centre - a).dot(edge) / edge_len_sq
    } else {
        0.0
    };

    let vertex_contact = |v: Vec2| {
        let delta = centre - v;
        let dist = delta.length();
        if dist > radius || dist < 1e-6 {
            return None;
        }
        Some(Contact {
            point: v,
            normal: delta / dist,
            depth: radius - dist,
        })
    };

    if best_dist > 0.0 && t < 0.0 {
        vertex_contact(a)
    } else if best_dist > 0.0 && t > 1.0 {
        vertex_contact(b)
    } else {
        Some(Contact {
            point: centre - best_normal * best_dist,
            normal: best_normal,
            depth: radius - best_dist,
        })
    }
}

fn world_circle(body: &Body, offset: Vec2) -> (Vec2, Vec2) {
    let centre = body.local_to_world(offset);
    let prev = body.prev_position + body.rotate(offset);
    (centre, prev)
}

/// Test two attached shapes; `None` when apart or when the pair has no test
///
/// Only pairs with at least one circle are supported.
pub fn collide(shape_a: &Shape, body_a: &Body, shape_b: &Shape, body_b: &Body) -> Option<Contact> {
    match (&shape_a.kind, &shape_b.kind) {
        (ShapeKind::Circle { radius: ra, offset: oa }, ShapeKind::Circle { radius: rb, offset: ob }) => {
            let (ca, _) = world_circle(body_a, *oa);
            let (cb, _) = world_circle(body_b, *ob);
            circle_vs_circle(ca, *ra, cb, *rb)
        }
        (ShapeKind::Segment { a, b, radius: sr }, ShapeKind::Circle { radius, offset }) => {
            let (centre, prev) = world_circle(body_b, *offset);
            segment_vs_circle(
                body_a.local_to_world(*a),
                body_a.local_to_world(*b),
                *sr,
                centre,
                *radius,
                prev,
            )
        }
        (ShapeKind::Circle { radius, offset }, ShapeKind::Segment { a, b, radius: sr }) => {
            let (centre, prev) = world_circle(body_a, *offset);
            segment_vs_circle(
                body_b.local_to_world(*a),
                body_b.local_to_world(*b),
                *sr,
                centre,
                *radius,
                prev,
            )
            .map(Contact::flipped)
        }
        (ShapeKind::Polygon { vertices }, ShapeKind::Circle { radius, offset }) => {
            let world: Vec<Vec2> = vertices.iter().map(|v| body_a.local_to_world(*v)).collect();
            let (centre, _) = world_circle(body_b, *offset);
            polygon_vs_circle(&world, centre, *radius)
        }
        (ShapeKind::Circle { radius, offset }, ShapeKind::Polygon { vertices }) => {
            let world: Vec<Vec2> = vertices.iter().map(|v| body_b.local_to_world(*v)).collect();
            let (centre, _) = world_circle(body_a, *offset);
            polygon_vs_circle(&world, centre, *radius).map(Contact::flipped)
        }
        _ => None,
    }
}
