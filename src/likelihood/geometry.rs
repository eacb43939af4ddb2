//! Geometric transforms applied to template frames.

use nalgebra::storage::RawStorage;
use nalgebra::{DVector, Dim, Matrix, Rotation2, Rotation3, Vector2, Vector3, U1};

/// Scale `frame` elementwise, then rotate it.
///
/// Rotation is a planar rotation by `rotations[0]` for 2D frames, an Euler
/// rotation (roll, pitch, yaw) = `rotations[0..3]` for 3D frames, and the
/// identity for any other dimensionality or when `rotations` is empty.
pub fn transform_frame<R1, S1, R2, S2>(
    frame: &DVector<f64>,
    scalings: &Matrix<f64, R1, U1, S1>,
    rotations: &Matrix<f64, R2, U1, S2>,
) -> DVector<f64>
where
    R1: Dim,
    S1: RawStorage<f64, R1, U1>,
    R2: Dim,
    S2: RawStorage<f64, R2, U1>,
{
    let mut predicted = frame.clone();
    for d in 0..predicted.len().min(scalings.len()) {
        predicted[d] *= scalings[d];
    }
    rotate(&mut predicted, rotations);
    predicted
}

/// Rotate `point` in place by the given angles.
pub fn rotate<R, S>(point: &mut DVector<f64>, angles: &Matrix<f64, R, U1, S>)
where
    R: Dim,
    S: RawStorage<f64, R, U1>,
{
    match (point.len(), angles.len()) {
        (2, n) if n >= 1 => {
            let rotated = Rotation2::new(angles[0]) * Vector2::new(point[0], point[1]);
            point[0] = rotated.x;
            point[1] = rotated.y;
        }
        (3, n) if n >= 3 => {
            let rotation = Rotation3::from_euler_angles(angles[0], angles[1], angles[2]);
            let rotated = rotation * Vector3::new(point[0], point[1], point[2]);
            point[0] = rotated.x;
            point[1] = rotated.y;
            point[2] = rotated.z;
        }
        _ => {}
    }
}

/// Weighted squared Euclidean distance `Σ w_d (a_d - b_d)²`.
pub fn weighted_squared_distance(a: &DVector<f64>, b: &DVector<f64>, weights: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .zip(weights.iter())
        .map(|((x, y), w)| w * (x - y) * (x - y))
        .sum()
}
