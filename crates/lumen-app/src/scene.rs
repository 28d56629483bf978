// SPDX-License-Identifier: CEPL-1.0
//! Initial scene: user models or a built-in cube, a floor, a ring of lights.

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use glam::{Mat4, Vec3};
use lumen_render_vk::{Builder, Device, GameObject, GameObjectMap, Model, Vertex};
use tracing::{info, warn};

use crate::config::SceneCfg;

pub const LIGHT_COLORS: [Vec3; 6] = [
    Vec3::new(1.0, 0.1, 0.1),
    Vec3::new(0.1, 0.1, 1.0),
    Vec3::new(0.1, 1.0, 0.1),
    Vec3::new(1.0, 1.0, 0.1),
    Vec3::new(0.1, 1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

const LIGHT_INTENSITY: f32 = 0.2;
const LIGHT_RADIUS: f32 = 0.1;
const FLOOR_Y: f32 = 0.5;

pub fn build_scene(device: &Rc<Device>, cfg: &SceneCfg) -> Result<GameObjectMap> {
    let mut objects = GameObjectMap::new();

    let loaded = load_models(device, &cfg.models);
    if loaded.is_empty() {
        let mut cube = GameObject::create();
        cube.model = Some(Rc::new(Model::new(device.clone(), &cube_builder())?));
        cube.transform.scale = Vec3::splat(0.5);
        cube.insert_into(&mut objects);
    } else {
        let offsets = model_offsets(loaded.len());
        for (model, x) in loaded.into_iter().zip(offsets) {
            let mut obj = GameObject::create();
            obj.model = Some(model);
            obj.transform.translation = Vec3::new(x, FLOOR_Y, 0.0);
            obj.insert_into(&mut objects);
        }
    }

    let mut floor = GameObject::create();
    floor.model = Some(Rc::new(Model::new(device.clone(), &floor_builder())?));
    floor.transform.translation = Vec3::new(0.0, FLOOR_Y, 0.0);
    floor.transform.scale = Vec3::new(3.0, 1.0, 3.0);
    floor.insert_into(&mut objects);

    if cfg.point_lights {
        for light in light_ring(&LIGHT_COLORS) {
            light.insert_into(&mut objects);
        }
    }

    info!("scene has {} objects", objects.len());
    Ok(objects)
}

/// Unreadable files are skipped so one bad path does not stop startup.
fn load_models(device: &Rc<Device>, paths: &[PathBuf]) -> Vec<Rc<Model>> {
    paths
        .iter()
        .filter_map(|path| match Model::from_file(device.clone(), path) {
            Ok(model) => {
                info!(
                    "loaded {} ({} vertices, {} indices)",
                    path.display(),
                    model.vertex_count(),
                    model.index_count()
                );
                Some(Rc::new(model))
            }
            Err(e) => {
                warn!("skipping {}: {e:#}", path.display());
                None
            }
        })
        .collect()
}

/// X positions one unit apart, centred on the origin.
fn model_offsets(count: usize) -> Vec<f32> {
    let mid = (count as f32 - 1.0) / 2.0;
    (0..count).map(|i| i as f32 - mid).collect()
}

fn face(normal: Vec3, color: Vec3) -> [Vertex; 4] {
    let u = if normal.x != 0.0 { Vec3::Y } else { Vec3::X };
    let v = normal.cross(u);
    [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].map(|(su, sv)| Vertex {
        position: (0.5 * (normal + su * u + sv * v)).to_array(),
        color: color.to_array(),
        normal: normal.to_array(),
        uv: [(su + 1.0) / 2.0, (sv + 1.0) / 2.0],
    })
}

/// Unit cube centred on the origin, one color per face.
pub fn cube_builder() -> Builder {
    let faces = [
        (Vec3::NEG_X, Vec3::new(0.9, 0.9, 0.9)),
        (Vec3::X, Vec3::new(0.8, 0.8, 0.1)),
        (Vec3::NEG_Y, Vec3::new(0.9, 0.6, 0.1)),
        (Vec3::Y, Vec3::new(0.8, 0.1, 0.1)),
        (Vec3::Z, Vec3::new(0.1, 0.1, 0.8)),
        (Vec3::NEG_Z, Vec3::new(0.1, 0.8, 0.1)),
    ];
    let mut builder = Builder::default();
    for (normal, color) in faces {
        let base = builder.vertices.len() as u32;
        builder.vertices.extend(face(normal, color));
        builder
            .indices
            .extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
    }
    builder
}

/// 2x2 quad in the XZ plane facing up (-Y).
pub fn floor_builder() -> Builder {
    let mut builder = Builder::default();
    builder.vertices.extend(
        face(Vec3::NEG_Y, Vec3::splat(0.8)).map(|mut v| {
            // Flatten onto y = 0 and double the extent.
            v.position = [v.position[0] * 2.0, 0.0, v.position[2] * 2.0];
            v
        }),
    );
    builder.indices.extend([0, 1, 2, 0, 2, 3]);
    builder
}

/// One light per color, spaced evenly around the Y axis.
pub fn light_ring(colors: &[Vec3]) -> Vec<GameObject> {
    let step = TAU / colors.len().max(1) as f32;
    colors
        .iter()
        .enumerate()
        .map(|(i, &color)| {
            let mut light = GameObject::make_point_light(LIGHT_INTENSITY, LIGHT_RADIUS, color);
            light.transform.translation = Mat4::from_axis_angle(Vec3::NEG_Y, i as f32 * step)
                .transform_point3(Vec3::new(-1.0, -1.0, -1.0));
            light
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_flat_shaded_faces() {
        let cube = cube_builder();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| i < 24));

        for v in &cube.vertices {
            let n = Vec3::from(v.normal);
            let p = Vec3::from(v.position);
            assert!((n.length() - 1.0).abs() < 1e-6);
            assert!((p.dot(n) - 0.5).abs() < 1e-6, "vertex off its face plane");
            assert!(p.abs().max_element() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn floor_lies_flat_and_faces_up() {
        let floor = floor_builder();
        assert_eq!(floor.vertices.len(), 4);
        for v in &floor.vertices {
            assert_eq!(v.position[1], 0.0);
            assert_eq!(v.normal, [0.0, -1.0, 0.0]);
            assert_eq!(v.position[0].abs(), 1.0);
            assert_eq!(v.position[2].abs(), 1.0);
        }
    }

    #[test]
    fn lights_share_radius_and_height() {
        let ring = light_ring(&LIGHT_COLORS);
        assert_eq!(ring.len(), 6);
        let first = ring[0].transform.translation;
        assert!(first.abs_diff_eq(Vec3::new(-1.0, -1.0, -1.0), 1e-6));
        for light in &ring {
            let p = light.transform.translation;
            assert!((p.y + 1.0).abs() < 1e-5);
            assert!((Vec3::new(p.x, 0.0, p.z).length() - 2f32.sqrt()).abs() < 1e-5);
            assert!(light.point_light.is_some());
        }
    }

    #[test]
    fn model_offsets_are_centred() {
        assert_eq!(model_offsets(1), vec![0.0]);
        assert_eq!(model_offsets(2), vec![-0.5, 0.5]);
        assert_eq!(model_offsets(3), vec![-1.0, 0.0, 1.0]);
        assert!(model_offsets(0).is_empty());
    }
}
