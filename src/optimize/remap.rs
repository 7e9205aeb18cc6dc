use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use tracing::debug;

use crate::optimize::builder::EXPORT_UV_LAYER;
use crate::optimize::grouper::AtlasGroup;
use crate::optimize::layout::TILE_SIZE;
use crate::scene::{MaterialId, MeshData, ObjectId, Scene};

/// Working name of the remapped UV channel. Finalization renames it to the
/// canonical export name once a mesh is fully atlased.
pub const ATLAS_UV_LAYER: &str = "AtlasUV";

/// Remap UVs and material slots on every mesh that uses any of the group's
/// source materials.
///
/// Per mesh: copy the source UVs into the atlas layer, squeeze each
/// affected polygon's coordinates into its material's tile, point the
/// affected slots at the atlas material, and consolidate duplicate atlas
/// slots onto the lowest index. Polygons on unrelated materials keep their
/// original coordinates.
pub fn apply_group(
    scene: &mut Scene,
    mesh_objects: &[ObjectId],
    group: &AtlasGroup,
    atlas_material: MaterialId,
) {
    let tile_by_material: HashMap<MaterialId, usize> = group
        .items
        .iter()
        .enumerate()
        .map(|(tile, item)| (item.material, tile))
        .collect();

    let layout = group.layout;
    let atlas_size = Vec2::new(layout.width as f32, layout.height as f32);
    let scale = Vec2::splat(TILE_SIZE as f32) / atlas_size;

    for &obj_id in mesh_objects {
        let Some(mesh) = scene.object_mut(obj_id).and_then(|o| o.mesh.as_mut()) else {
            continue;
        };

        // Slot index -> tile index, for slots holding group materials.
        let slot_map: BTreeMap<usize, usize> = mesh
            .material_slots
            .iter()
            .enumerate()
            .filter_map(|(slot, assigned)| {
                assigned
                    .and_then(|m| tile_by_material.get(&m))
                    .map(|&tile| (slot, tile))
            })
            .collect();
        if slot_map.is_empty() {
            continue;
        }

        // A mesh with no loops has no UV data to remap, but its slots
        // still switch to the atlas material.
        if mesh.loop_count == 0 {
            for &slot in slot_map.keys() {
                mesh.material_slots[slot] = Some(atlas_material);
            }
            continue;
        }

        let source_idx = match mesh.source_uv_layer_index() {
            Some(idx) => idx,
            None => mesh.add_uv_layer(EXPORT_UV_LAYER),
        };
        let mut atlas_data = mesh.uv_layers[source_idx].data.clone();
        atlas_data.resize(mesh.loop_count * 2, 0.0);

        let atlas_idx = match mesh.uv_layer_index(ATLAS_UV_LAYER) {
            Some(idx) => idx,
            None => mesh.add_uv_layer(ATLAS_UV_LAYER),
        };

        let mut remapped_polygons = 0usize;
        for poly in &mesh.polygons {
            let Some(&tile) = slot_map.get(&poly.material_index) else {
                continue;
            };
            remapped_polygons += 1;

            let (x_off, y_off) = layout.tiles[tile];
            let offset = Vec2::new(x_off as f32, y_off as f32) / atlas_size;
            for &li in &poly.loop_indices {
                let bi = li as usize * 2;
                if bi + 1 >= atlas_data.len() {
                    continue;
                }
                let uv = Vec2::new(atlas_data[bi], atlas_data[bi + 1]) * scale + offset;
                atlas_data[bi] = uv.x;
                atlas_data[bi + 1] = uv.y;
            }
        }
        mesh.write_uv_layer(atlas_idx, atlas_data);

        // Replace slots in place; the lowest affected index becomes the
        // canonical atlas slot.
        let mut first_atlas_slot: Option<usize> = None;
        for &slot in slot_map.keys() {
            mesh.material_slots[slot] = Some(atlas_material);
            if first_atlas_slot.is_none() {
                first_atlas_slot = Some(slot);
            }
        }
        if let Some(first) = first_atlas_slot {
            if slot_map.len() > 1 {
                for poly in &mut mesh.polygons {
                    if slot_map.contains_key(&poly.material_index) {
                        poly.material_index = first;
                    }
                }
            }
        }

        finalize_uv_layers(mesh, atlas_material, atlas_idx);

        debug!(
            polygons = remapped_polygons,
            slots = slot_map.len(),
            "Remapped mesh into atlas tiles"
        );
    }
}

/// Make sure the remapped coordinates are what an exporter will read.
///
/// A fully atlased mesh keeps only the atlas layer, renamed to the
/// canonical export name. A mixed mesh instead broadcasts the atlas data
/// into every layer, because many export pipelines read a single
/// designated UV channel regardless of layer naming.
fn finalize_uv_layers(mesh: &mut MeshData, atlas_material: MaterialId, atlas_idx: usize) {
    let all_atlas = mesh.polygons.iter().all(|poly| {
        mesh.material_slots
            .get(poly.material_index)
            .is_some_and(|slot| *slot == Some(atlas_material))
    });

    let atlas_data = mesh.uv_layers[atlas_idx].data.clone();

    if all_atlas {
        let atlas_name = mesh.uv_layers[atlas_idx].name.clone();
        mesh.uv_layers.retain(|layer| layer.name == atlas_name);
        if let Some(layer) = mesh.uv_layers.first_mut() {
            layer.name = EXPORT_UV_LAYER.to_string();
            layer.data = atlas_data;
            layer.active_render = true;
        }
        mesh.active_uv = Some(0);
    } else {
        for (idx, layer) in mesh.uv_layers.iter_mut().enumerate() {
            if idx != atlas_idx {
                layer.data = atlas_data.clone();
            }
        }
    }
}
