mod collision_detector;
mod robot_collision_detector;
mod urdf;

use ncollide3d::{
    math::{Isometry, Vector},
    shape::{Compound, ShapeHandle},
};

pub use self::{collision_detector::*, robot_collision_detector::*};

/// Pose type used by the collision shapes
pub type CollisionPose = Isometry<f64>;

/// Converts a kinematics pose into the pose type of the collision library.
pub fn to_collision_pose(pose: &k::Isometry3<f64>) -> CollisionPose {
    let translation = pose.translation.vector;
    let axis_angle = pose.rotation.scaled_axis();
    CollisionPose::new(
        Vector::new(translation.x, translation.y, translation.z),
        Vector::new(axis_angle.x, axis_angle.y, axis_angle.z),
    )
}

/// Builds an obstacle compound from shapes placed at kinematics poses.
pub fn compound_from_shapes<I>(shapes: I) -> Compound<f64>
where
    I: IntoIterator<Item = (k::Isometry3<f64>, ShapeHandle<f64>)>,
{
    Compound::new(
        shapes
            .into_iter()
            .map(|(pose, shape)| (to_collision_pose(&pose), shape))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;

    #[test]
    fn test_to_collision_pose() {
        let pose = k::Isometry3::from_parts(
            k::Translation3::new(0.1, -0.2, 0.3),
            k::UnitQuaternion::from_euler_angles(0.3, -0.4, 1.2),
        );
        let converted = to_collision_pose(&pose);
        assert_approx_eq!(converted.translation.vector.x, 0.1);
        assert_approx_eq!(converted.translation.vector.y, -0.2);
        assert_approx_eq!(converted.translation.vector.z, 0.3);
        let (roll, pitch, yaw) = converted.rotation.euler_angles();
        assert_approx_eq!(roll, 0.3);
        assert_approx_eq!(pitch, -0.4);
        assert_approx_eq!(yaw, 1.2);
    }
}
