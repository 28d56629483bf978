// SPDX-License-Identifier: CEPL-1.0
use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Translation, scale and Tait-Bryan rotation (Y, then X, then Z).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformComponent {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl TransformComponent {
    fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// `T * Ry * Rx * Rz * S`
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.translation)
    }

    /// Rotation times inverse scale; keeps normals perpendicular under
    /// non-uniform scaling.
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.orientation()) * Mat3::from_diagonal(self.scale.recip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn close(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    // Column-by-column expansion of Ry * Rx * Rz * S.
    fn expanded(t: &TransformComponent) -> Mat4 {
        let (s1, c1) = t.rotation.y.sin_cos();
        let (s2, c2) = t.rotation.x.sin_cos();
        let (s3, c3) = t.rotation.z.sin_cos();
        Mat4::from_cols(
            Vec4::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1, 0.0) * t.scale.x,
            Vec4::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3, 0.0) * t.scale.y,
            Vec4::new(c2 * s1, -s2, c1 * c2, 0.0) * t.scale.z,
            t.translation.extend(1.0),
        )
    }

    #[test]
    fn identity_by_default() {
        let t = TransformComponent::default();
        assert!(close(t.mat4(), Mat4::IDENTITY));
        assert!(t.normal_matrix().abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn matches_yxz_expansion() {
        let t = TransformComponent {
            translation: Vec3::new(1.0, -2.0, 3.5),
            scale: Vec3::new(0.5, 2.0, 1.5),
            rotation: Vec3::new(0.3, 1.1, -0.7),
        };
        assert!(close(t.mat4(), expanded(&t)));
    }

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let t = TransformComponent {
            scale: Vec3::new(2.0, 1.0, 4.0),
            ..Default::default()
        };
        let n = t.normal_matrix();
        assert!(n.abs_diff_eq(Mat3::from_diagonal(Vec3::new(0.5, 1.0, 0.25)), 1e-6));
    }
}
