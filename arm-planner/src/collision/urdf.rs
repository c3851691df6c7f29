use std::f64::consts::{FRAC_PI_4, PI};

use ncollide3d::{
    math::{Point, Vector},
    shape::{Ball, ConvexHull, Cuboid, ShapeHandle},
};
use tracing::*;

use super::{to_collision_pose, CollisionPose};

const NUM_RING_POINTS: usize = 24;

/// Converts a URDF collision geometry into a collision shape.
///
/// Cylinders and capsules become convex hulls around the z axis. Meshes are
/// not supported and are skipped.
pub(crate) fn urdf_geometry_to_shape_handle(
    collision_geometry: &urdf_rs::Geometry,
) -> Option<ShapeHandle<f64>> {
    match *collision_geometry {
        urdf_rs::Geometry::Box { ref size } => Some(ShapeHandle::new(Cuboid::new(Vector::new(
            size[0] * 0.5,
            size[1] * 0.5,
            size[2] * 0.5,
        )))),
        urdf_rs::Geometry::Cylinder { radius, length } => {
            let half = length * 0.5;
            let points = ring(radius, -half)
                .chain(ring(radius, half))
                .collect::<Vec<_>>();
            convex_hull(&points)
        }
        urdf_rs::Geometry::Capsule { radius, length } => {
            let half = length * 0.5;
            let cap_radius = radius * FRAC_PI_4.cos();
            let cap_offset = radius * FRAC_PI_4.sin();
            let points = ring(radius, -half)
                .chain(ring(radius, half))
                .chain(ring(cap_radius, -half - cap_offset))
                .chain(ring(cap_radius, half + cap_offset))
                .chain([
                    Point::new(0.0, 0.0, -half - radius),
                    Point::new(0.0, 0.0, half + radius),
                ])
                .collect::<Vec<_>>();
            convex_hull(&points)
        }
        urdf_rs::Geometry::Sphere { radius } => Some(ShapeHandle::new(Ball::new(radius))),
        urdf_rs::Geometry::Mesh { ref filename, .. } => {
            warn!("mesh collision geometry is not supported, {filename} is skipped");
            None
        }
    }
}

fn ring(radius: f64, z: f64) -> impl Iterator<Item = Point<f64>> {
    (0..NUM_RING_POINTS).map(move |i| {
        let (sin, cos) = (2.0 * PI * i as f64 / NUM_RING_POINTS as f64).sin_cos();
        Point::new(radius * cos, radius * sin, z)
    })
}

fn convex_hull(points: &[Point<f64>]) -> Option<ShapeHandle<f64>> {
    match ConvexHull::try_from_points(points) {
        Some(hull) => Some(ShapeHandle::new(hull)),
        None => {
            error!("failed to build a convex hull from {} points", points.len());
            None
        }
    }
}

/// Pose of a `<collision>` element relative to its link
pub(crate) fn urdf_collision_pose(origin: &urdf_rs::Pose) -> CollisionPose {
    to_collision_pose(&k::urdf::isometry_from(origin))
}
