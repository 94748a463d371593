//! Static table geometry
//!
//! Walls are rounded segments on the world's static body: a segmented top
//! arch, the left side wall, the inlane guides toward the flipper pivots,
//! the two plunger lane walls with a floor, and a drain sensor line under
//! the flippers.

use glam::Vec2;

use crate::config::TableGeometry;
use crate::consts::{
    ARCH_SEGMENTS, FLIPPER_BASE_HALF_WIDTH, LANE_MARGIN, LANE_STUCK_DEPTH, WALL_ELASTICITY, WALL_FRICTION,
    WALL_THICKNESS,
};
use crate::error::Result;
use crate::sim::{Category, Shape, ShapeHandle, ShapeKind, World};

/// Rectangle in which a motionless ball counts as stuck in the plunger lane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl LaneBounds {
    pub fn from_geometry(g: &TableGeometry) -> Self {
        Self {
            min_x: g.lane_left_x() - LANE_MARGIN,
            max_x: g.right_x + LANE_MARGIN,
            min_y: g.bottom_y,
            max_y: g.bottom_y + LANE_STUCK_DEPTH,
        }
    }

    /// Strictly inside (edges excluded)
    pub fn contains(&self, p: Vec2) -> bool {
        p.x > self.min_x && p.x < self.max_x && p.y > self.min_y && p.y < self.max_y
    }
}

/// Handles of the static table shapes
#[derive(Debug, Clone)]
pub struct Playfield {
    pub walls: Vec<ShapeHandle>,
    pub drain: ShapeHandle,
    pub lane: LaneBounds,
}

impl Playfield {
    pub fn build(world: &mut World, g: &TableGeometry) -> Result<Self> {
        let mut walls = Vec::new();
        let center = g.arch_center;
        let radius = g.arch_radius();
        let left_x = g.left_x();
        let lane_left = g.lane_left_x();
        let lane_floor = g.bottom_y + LANE_STUCK_DEPTH;

        // Top arch, left to right over the top (y-down: angles pi..2pi are above the centre)
        for i in 0..ARCH_SEGMENTS {
            let step = std::f32::consts::PI / ARCH_SEGMENTS as f32;
            let a1 = std::f32::consts::PI + i as f32 * step;
            let a2 = a1 + step;
            let p1 = center + Vec2::new(a1.cos(), a1.sin()) * radius;
            let p2 = center + Vec2::new(a2.cos(), a2.sin()) * radius;
            walls.push(add_wall(world, p1, p2)?);
        }

        // Side wall and plunger lane
        walls.push(add_wall(world, Vec2::new(left_x, center.y), Vec2::new(left_x, g.bottom_y))?);
        walls.push(add_wall(world, Vec2::new(lane_left, center.y), Vec2::new(lane_left, lane_floor))?);
        walls.push(add_wall(world, Vec2::new(g.right_x, center.y), Vec2::new(g.right_x, lane_floor))?);
        walls.push(add_wall(world, Vec2::new(lane_left, lane_floor), Vec2::new(g.right_x, lane_floor))?);

        // Inlane guides ending just outside each flipper pivot
        let guide_gap = Vec2::new(FLIPPER_BASE_HALF_WIDTH + 5.0, -FLIPPER_BASE_HALF_WIDTH);
        let left_end = g.left_pivot() + Vec2::new(-guide_gap.x, guide_gap.y);
        let right_end = g.right_pivot() + guide_gap;
        walls.push(add_wall(world, Vec2::new(left_x, g.bottom_y), left_end)?);
        walls.push(add_wall(world, Vec2::new(lane_left, g.bottom_y), right_end)?);

        let drain = world.add_shape(
            Shape::new(
                world.static_body(),
                ShapeKind::segment(Vec2::new(left_x, g.drain_y), Vec2::new(lane_left, g.drain_y), WALL_THICKNESS),
                Category::Drain,
            )
            .as_sensor(),
        )?;

        log::debug!("Playfield built: {} wall segments", walls.len());
        Ok(Self {
            walls,
            drain,
            lane: LaneBounds::from_geometry(g),
        })
    }
}

fn add_wall(world: &mut World, a: Vec2, b: Vec2) -> Result<ShapeHandle> {
    world.add_shape(
        Shape::new(world.static_body(), ShapeKind::segment(a, b, WALL_THICKNESS), Category::Wall)
            .with_elasticity(WALL_ELASTICITY)
            .with_friction(WALL_FRICTION),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PinballError;

    #[test]
    fn test_default_table_builds() {
        let mut world = World::new(Vec2::new(0.0, 500.0), 0.95, 10);
        let playfield = Playfield::build(&mut world, &TableGeometry::default()).unwrap();
        assert_eq!(playfield.walls.len(), ARCH_SEGMENTS + 6);
        let drain = world.shape(playfield.drain).unwrap();
        assert!(drain.sensor);
        assert_eq!(drain.category, Category::Drain);
    }

    #[test]
    fn test_arch_is_continuous() {
        let mut world = World::new(Vec2::ZERO, 1.0, 1);
        let g = TableGeometry::default();
        let playfield = Playfield::build(&mut world, &g).unwrap();
        let ends: Vec<(Vec2, Vec2)> = playfield.walls[..ARCH_SEGMENTS]
            .iter()
            .map(|h| match &world.shape(*h).unwrap().kind {
                ShapeKind::Segment { a, b, .. } => (*a, *b),
                _ => unreachable!(),
            })
            .collect();
        assert!((ends[0].0 - Vec2::new(110.0, 200.0)).length() < 1e-3);
        assert!((ends[ARCH_SEGMENTS - 1].1 - Vec2::new(690.0, 200.0)).length() < 1e-3);
        for pair in ends.windows(2) {
            assert!((pair[0].1 - pair[1].0).length() < 1e-3);
        }
        // Highest point sits above the centre
        assert!(ends.iter().any(|(a, _)| a.y < 200.0 - 280.0));
    }

    #[test]
    fn test_degenerate_geometry_is_rejected() {
        let mut world = World::new(Vec2::ZERO, 1.0, 1);
        let mut g = TableGeometry::default();
        // Lane collapses to zero width: floor segment becomes a point
        g.lane_width = 0.0;
        let result = Playfield::build(&mut world, &g);
        assert!(matches!(result, Err(PinballError::DegenerateSegment(_, _))));
    }

    #[test]
    fn test_lane_bounds() {
        let lane = LaneBounds::from_geometry(&TableGeometry::default());
        assert!(lane.contains(Vec2::new(670.0, 620.0)));
        assert!(!lane.contains(Vec2::new(670.0, 600.0)));
        assert!(!lane.contains(Vec2::new(600.0, 620.0)));
        assert!(lane.contains(Vec2::new(700.0, 749.0)));
    }
}
