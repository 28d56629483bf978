// SPDX-License-Identifier: CEPL-1.0
use std::collections::HashSet;

use lumen_math::Movement;
use winit::keyboard::KeyCode;

/// Physical key -> movement intent.
#[derive(Clone, Debug)]
pub struct KeyMappings {
    pub move_left: KeyCode,
    pub move_right: KeyCode,
    pub move_forward: KeyCode,
    pub move_backward: KeyCode,
    pub move_up: KeyCode,
    pub move_down: KeyCode,
    pub look_left: KeyCode,
    pub look_right: KeyCode,
    pub look_up: KeyCode,
    pub look_down: KeyCode,
}

impl Default for KeyMappings {
    fn default() -> Self {
        Self {
            move_left: KeyCode::KeyA,
            move_right: KeyCode::KeyD,
            move_forward: KeyCode::KeyW,
            move_backward: KeyCode::KeyS,
            move_up: KeyCode::KeyE,
            move_down: KeyCode::KeyQ,
            look_left: KeyCode::ArrowLeft,
            look_right: KeyCode::ArrowRight,
            look_up: KeyCode::ArrowUp,
            look_down: KeyCode::ArrowDown,
        }
    }
}

#[derive(Debug, Default)]
pub struct KeyState {
    held: HashSet<KeyCode>,
    pub mappings: KeyMappings,
}

impl KeyState {
    pub fn on_key(&mut self, code: KeyCode, pressed: bool) {
        if pressed {
            self.held.insert(code);
        } else {
            self.held.remove(&code);
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.held.contains(&code)
    }

    /// Focus loss swallows key releases.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn movement(&self) -> Movement {
        let m = &self.mappings;
        [
            (m.move_left, Movement::MOVE_LEFT),
            (m.move_right, Movement::MOVE_RIGHT),
            (m.move_forward, Movement::MOVE_FORWARD),
            (m.move_backward, Movement::MOVE_BACKWARD),
            (m.move_up, Movement::MOVE_UP),
            (m.move_down, Movement::MOVE_DOWN),
            (m.look_left, Movement::LOOK_LEFT),
            (m.look_right, Movement::LOOK_RIGHT),
            (m.look_up, Movement::LOOK_UP),
            (m.look_down, Movement::LOOK_DOWN),
        ]
        .into_iter()
        .filter(|(key, _)| self.is_held(*key))
        .fold(Movement::empty(), |acc, (_, flag)| acc | flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_map_to_movement() {
        let mut keys = KeyState::default();
        keys.on_key(KeyCode::KeyW, true);
        keys.on_key(KeyCode::ArrowLeft, true);
        keys.on_key(KeyCode::KeyZ, true);
        assert_eq!(keys.movement(), Movement::MOVE_FORWARD | Movement::LOOK_LEFT);

        keys.on_key(KeyCode::KeyW, false);
        assert_eq!(keys.movement(), Movement::LOOK_LEFT);
    }

    #[test]
    fn release_all_clears_movement() {
        let mut keys = KeyState::default();
        keys.on_key(KeyCode::KeyE, true);
        keys.release_all();
        assert!(keys.movement().is_empty());
    }

    #[test]
    fn remapped_keys_are_honoured() {
        let mut keys = KeyState::default();
        keys.mappings.move_up = KeyCode::Space;
        keys.on_key(KeyCode::Space, true);
        keys.on_key(KeyCode::KeyE, true);
        assert_eq!(keys.movement(), Movement::MOVE_UP);
    }
}
