use super::bounds::Bounds3;
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Vector3};
use thiserror::Error;

const RIGIDITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum RigidTransformError {
    #[error("Matrix bottom row must be [0, 0, 0, 1]")]
    NotAffine,
    #[error("Rotation block is not orthonormal (deviation {deviation:.3e})")]
    NotOrthonormal { deviation: f64 },
    #[error("Rotation block is a reflection (determinant {determinant:.6})")]
    Reflection { determinant: f64 },
}

/// A translation + rotation between two frame coordinate systems, as a 4×4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix4<f64>,
}

impl RigidTransform {
    /// Wraps a homogeneous matrix after checking that it is a proper rigid motion.
    pub fn new(matrix: Matrix4<f64>) -> Result<Self, RigidTransformError> {
        let bottom = matrix.row(3);
        if bottom[0].abs() > RIGIDITY_TOLERANCE
            || bottom[1].abs() > RIGIDITY_TOLERANCE
            || bottom[2].abs() > RIGIDITY_TOLERANCE
            || (bottom[3] - 1.0).abs() > RIGIDITY_TOLERANCE
        {
            return Err(RigidTransformError::NotAffine);
        }
        let rotation: Matrix3<f64> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        let deviation = (rotation.transpose() * rotation - Matrix3::identity()).amax();
        if deviation > RIGIDITY_TOLERANCE {
            return Err(RigidTransformError::NotOrthonormal { deviation });
        }
        let determinant = rotation.determinant();
        if determinant < 0.0 {
            return Err(RigidTransformError::Reflection { determinant });
        }
        Ok(Self { matrix })
    }

    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    pub fn from_parts(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        let mut matrix = rotation.to_homogeneous();
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Exact inverse of a rigid motion: `[Rᵀ | -Rᵀt]`.
    pub fn inverse(&self) -> RigidTransform {
        let rt = self.rotation().transpose();
        let t = -(rt * self.translation());
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&t);
        RigidTransform { matrix }
    }

    /// Multiplies the homogeneous point by the matrix.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        let h = self.matrix * point.to_homogeneous();
        Point3::new(h.x, h.y, h.z)
    }

    /// Axis-aligned box enclosing the transformed corners of `bounds`.
    pub fn apply_bounds(&self, bounds: &Bounds3) -> Bounds3 {
        let corners = bounds.corners().map(|c| self.apply(&c));
        let mut result = Bounds3::new(corners[0], corners[0]);
        for c in &corners[1..] {
            result = result.union(&Bounds3::new(*c, *c));
        }
        result
    }

    pub fn then(&self, next: &RigidTransform) -> RigidTransform {
        RigidTransform {
            matrix: next.matrix * self.matrix,
        }
    }
}
