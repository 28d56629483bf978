// SPDX-License-Identifier: CEPL-1.0
use std::f32::consts::TAU;

use bitflags::bitflags;
use glam::Vec3;

use crate::TransformComponent;

bitflags! {
    /// Movement intents for one frame, decoupled from any key codes.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Movement: u16 {
        const MOVE_LEFT     = 1 << 0;
        const MOVE_RIGHT    = 1 << 1;
        const MOVE_FORWARD  = 1 << 2;
        const MOVE_BACKWARD = 1 << 3;
        const MOVE_UP       = 1 << 4;
        const MOVE_DOWN     = 1 << 5;
        const LOOK_LEFT     = 1 << 6;
        const LOOK_RIGHT    = 1 << 7;
        const LOOK_UP       = 1 << 8;
        const LOOK_DOWN     = 1 << 9;
    }
}

const PITCH_LIMIT: f32 = 1.5;

#[derive(Clone, Copy, Debug)]
pub struct KeyboardMovementController {
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for KeyboardMovementController {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl KeyboardMovementController {
    /// Fly-camera movement on the XZ plane; up is -Y.
    pub fn move_in_plane_xz(&self, input: Movement, dt: f32, transform: &mut TransformComponent) {
        let mut rotate = Vec3::ZERO;
        if input.contains(Movement::LOOK_RIGHT) {
            rotate.y += 1.0;
        }
        if input.contains(Movement::LOOK_LEFT) {
            rotate.y -= 1.0;
        }
        if input.contains(Movement::LOOK_UP) {
            rotate.x += 1.0;
        }
        if input.contains(Movement::LOOK_DOWN) {
            rotate.x -= 1.0;
        }

        if rotate.length_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }

        transform.rotation.x = transform.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        transform.rotation.y = transform.rotation.y.rem_euclid(TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let mut dir = Vec3::ZERO;
        if input.contains(Movement::MOVE_FORWARD) {
            dir += forward;
        }
        if input.contains(Movement::MOVE_BACKWARD) {
            dir -= forward;
        }
        if input.contains(Movement::MOVE_RIGHT) {
            dir += right;
        }
        if input.contains(Movement::MOVE_LEFT) {
            dir -= right;
        }
        if input.contains(Movement::MOVE_UP) {
            dir += up;
        }
        if input.contains(Movement::MOVE_DOWN) {
            dir -= up;
        }

        if dir.length_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * dir.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_input_leaves_transform_alone() {
        let ctl = KeyboardMovementController::default();
        let mut t = TransformComponent::default();
        ctl.move_in_plane_xz(Movement::empty(), 0.016, &mut t);
        assert_eq!(t, TransformComponent::default());
    }

    #[test]
    fn forward_at_zero_yaw_moves_plus_z() {
        let ctl = KeyboardMovementController::default();
        let mut t = TransformComponent::default();
        ctl.move_in_plane_xz(Movement::MOVE_FORWARD, 1.0, &mut t);
        assert!(t.translation.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-6));
    }

    #[test]
    fn diagonal_motion_is_normalised() {
        let ctl = KeyboardMovementController::default();
        let mut t = TransformComponent::default();
        ctl.move_in_plane_xz(Movement::MOVE_FORWARD | Movement::MOVE_RIGHT, 1.0, &mut t);
        assert!((t.translation.length() - ctl.move_speed).abs() < 1e-5);
    }

    #[test]
    fn up_is_negative_y() {
        let ctl = KeyboardMovementController::default();
        let mut t = TransformComponent::default();
        ctl.move_in_plane_xz(Movement::MOVE_UP, 0.5, &mut t);
        assert!(t.translation.abs_diff_eq(Vec3::new(0.0, -1.5, 0.0), 1e-6));
    }

    #[test]
    fn opposing_keys_cancel() {
        let ctl = KeyboardMovementController::default();
        let mut t = TransformComponent::default();
        ctl.move_in_plane_xz(Movement::MOVE_LEFT | Movement::MOVE_RIGHT, 1.0, &mut t);
        assert_eq!(t.translation, Vec3::ZERO);
    }

    #[test]
    fn pitch_clamps_and_yaw_wraps() {
        let ctl = KeyboardMovementController::default();
        let mut t = TransformComponent {
            rotation: Vec3::new(1.4, TAU - 0.1, 0.0),
            ..Default::default()
        };
        ctl.move_in_plane_xz(Movement::LOOK_UP, 1.0, &mut t);
        assert_eq!(t.rotation.x, PITCH_LIMIT);

        ctl.move_in_plane_xz(Movement::LOOK_RIGHT, 1.0, &mut t);
        assert!(t.rotation.y >= 0.0 && t.rotation.y < TAU);
        assert!((t.rotation.y - 1.4).abs() < 1e-4);
    }
}
