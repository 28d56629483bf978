// SPDX-License-Identifier: CEPL-1.0
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;
use lumen_math::TransformComponent;
use portable_atomic::{AtomicU32, Ordering};

use crate::model::Model;

pub type Id = u32;

/// Iteration order is id order, i.e. creation order.
pub type GameObjectMap = BTreeMap<Id, GameObject>;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLightComponent {
    pub light_intensity: f32,
}

impl Default for PointLightComponent {
    fn default() -> Self {
        Self { light_intensity: 1.0 }
    }
}

pub struct GameObject {
    id: Id,
    pub model: Option<Rc<Model>>,
    pub color: Vec3,
    pub transform: TransformComponent,
    pub point_light: Option<PointLightComponent>,
}

impl GameObject {
    pub fn create() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            model: None,
            color: Vec3::ZERO,
            transform: TransformComponent::default(),
            point_light: None,
        }
    }

    /// A light is drawn as a billboard; `radius` lands in `transform.scale.x`.
    pub fn make_point_light(intensity: f32, radius: f32, color: Vec3) -> Self {
        let mut obj = Self::create();
        obj.color = color;
        obj.transform.scale.x = radius;
        obj.point_light = Some(PointLightComponent {
            light_intensity: intensity,
        });
        obj
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn insert_into(self, map: &mut GameObjectMap) -> Id {
        let id = self.id;
        map.insert(id, self);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = GameObject::create();
        let b = GameObject::create();
        let c = GameObject::create();
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
    }

    #[test]
    fn point_light_stores_radius_in_scale() {
        let light = GameObject::make_point_light(10.0, 0.1, Vec3::ONE);
        assert_eq!(light.transform.scale.x, 0.1);
        assert_eq!(light.color, Vec3::ONE);
        assert_eq!(
            light.point_light,
            Some(PointLightComponent { light_intensity: 10.0 })
        );
        assert!(light.model.is_none());
    }

    #[test]
    fn map_iterates_in_creation_order() {
        let mut map = GameObjectMap::new();
        let first = GameObject::create();
        let second = GameObject::create();
        let second_id = second.insert_into(&mut map);
        let first_id = first.insert_into(&mut map);
        let order: Vec<Id> = map.keys().copied().collect();
        assert_eq!(order, vec![first_id, second_id]);
    }
}
