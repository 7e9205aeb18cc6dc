pub mod analyzer;
pub mod builder;
pub mod grouper;
pub mod layout;
pub mod pixels;
pub mod remap;
pub mod report;
pub mod state;

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::AtlasConfig;
use crate::error::Result;
use crate::scene::{ImageId, NodeKind, ObjectId, Scene};

pub use analyzer::{ChannelSource, CompatKey, MaterialAnalysis};
pub use grouper::AtlasGroup;
pub use layout::{LAYOUT_PAIR, LAYOUT_QUAD, TILE_SIZE, TileLayout};
pub use report::OptimizeReport;
pub use state::AtlasState;

use builder::ComposedAtlas;
use pixels::PixelCache;

/// Run the material atlas optimization over `export_objects`.
///
/// The originals are never touched: the set is duplicated first and only
/// the copies are rewritten. Everything created along the way is owned by
/// the returned [`AtlasState`]; call [`AtlasState::cleanup`] once the
/// duplicated set has been consumed, on success and failure paths alike.
///
/// A group that fails to build is recorded as a warning and skipped; the
/// meshes using its materials keep their original slots.
pub fn run(
    scene: &mut Scene,
    export_objects: &[ObjectId],
    config: &AtlasConfig,
) -> (AtlasState, OptimizeReport) {
    let mut state = AtlasState::default();

    info!(objects = export_objects.len(), "Duplicating export set");
    state.temp_objects = scene.duplicate_objects(export_objects);
    let mesh_objects = mesh_only(scene, &state.temp_objects);

    let (before_materials, before_textures) = count_used_assets(scene, &mesh_objects);
    let mut report = OptimizeReport {
        before_materials,
        before_textures,
        ..Default::default()
    };

    let analyses = analyzer::collect_candidates(scene, &mesh_objects, config, &mut report);
    report.candidate_materials = analyses.len();

    let groups = grouper::build_groups(analyses);
    debug!(groups = groups.len(), "Formed atlas groups");

    // Decode every referenced source once up front; tiles and groups share
    // the decoded buffers.
    let mut cache = PixelCache::default();
    cache.prime(
        scene,
        groups.iter().flat_map(|g| g.items.iter().flat_map(source_images)),
    );

    // Compositing is pure and per-group independent, so it fans out across
    // threads. Application stays sequential: later groups re-read layers
    // earlier groups broadcast into.
    let composed: Vec<Result<ComposedAtlas>> = groups
        .par_iter()
        .map(|group| builder::compose_group(group, &cache))
        .collect();

    let mut resized: HashSet<ImageId> = HashSet::new();
    for (group_index, (group, composed)) in groups.iter().zip(composed).enumerate() {
        match composed {
            Ok(composed) => {
                resized.extend(composed.resized.iter().copied());
                match builder::install_atlas(scene, &mut state, group_index, group, composed) {
                    Ok(atlas_material) => {
                        remap::apply_group(scene, &mesh_objects, group, atlas_material);
                        match group.items.len() {
                            4 => report.merged_quartets += 1,
                            2 => report.merged_pairs += 1,
                            _ => {}
                        }
                    }
                    Err(e) => {
                        warn!(group = group_index + 1, error = %e, "Atlas group skipped");
                        report
                            .warnings
                            .push(format!("Group {} skipped: {e}", group_index + 1));
                    }
                }
            }
            Err(e) => {
                warn!(group = group_index + 1, error = %e, "Atlas group skipped");
                report
                    .warnings
                    .push(format!("Group {} skipped: {e}", group_index + 1));
            }
        }
    }

    report.leftover_materials = report
        .candidate_materials
        .saturating_sub(report.merged_material_count());
    report.drawcall_reduction_estimate = report.merged_quartets * 3 + report.merged_pairs;
    report.resized_textures = resized.len();

    let (after_materials, after_textures) = count_used_assets(scene, &mesh_objects);
    report.after_materials = after_materials;
    report.after_textures = after_textures;

    info!(
        quartets = report.merged_quartets,
        pairs = report.merged_pairs,
        leftover = report.leftover_materials,
        "Atlas optimization complete"
    );

    (state, report)
}

/// Analysis and grouping only, with no duplication and no scene mutation.
/// Reports what a real run would merge.
pub fn plan(scene: &Scene, export_objects: &[ObjectId], config: &AtlasConfig) -> OptimizeReport {
    let mesh_objects = mesh_only(scene, export_objects);
    let (before_materials, before_textures) = count_used_assets(scene, &mesh_objects);
    let mut report = OptimizeReport {
        before_materials,
        before_textures,
        after_materials: before_materials,
        after_textures: before_textures,
        ..Default::default()
    };

    let analyses = analyzer::collect_candidates(scene, &mesh_objects, config, &mut report);
    report.candidate_materials = analyses.len();

    for group in grouper::build_groups(analyses) {
        match group.items.len() {
            4 => report.merged_quartets += 1,
            2 => report.merged_pairs += 1,
            _ => {}
        }
    }
    report.leftover_materials = report
        .candidate_materials
        .saturating_sub(report.merged_material_count());
    report.drawcall_reduction_estimate = report.merged_quartets * 3 + report.merged_pairs;
    report
}

fn mesh_only(scene: &Scene, objects: &[ObjectId]) -> Vec<ObjectId> {
    objects
        .iter()
        .copied()
        .filter(|&id| scene.object(id).is_some_and(|o| o.mesh.is_some()))
        .collect()
}

/// Distinct materials and image textures reachable from the given meshes'
/// slots, for the before/after report counters.
fn count_used_assets(scene: &Scene, mesh_objects: &[ObjectId]) -> (usize, usize) {
    let mut materials = HashSet::new();
    let mut images = HashSet::new();
    for &obj_id in mesh_objects {
        let Some(mesh) = scene.object(obj_id).and_then(|o| o.mesh.as_ref()) else {
            continue;
        };
        for &slot in mesh.material_slots.iter().flatten() {
            let Some(material) = scene.material(slot) else {
                continue;
            };
            materials.insert(slot);
            for (_, node) in material.graph.nodes() {
                if let NodeKind::ImageTexture { image: Some(image) } = node.kind {
                    images.insert(image);
                }
            }
        }
    }
    (materials.len(), images.len())
}

fn source_images(item: &MaterialAnalysis) -> Vec<ImageId> {
    let mut ids = vec![item.base_image];
    if let Some(normal) = item.normal_image {
        ids.push(normal);
    }
    if let ChannelSource::Image { image, .. } = item.rough_source {
        ids.push(image);
    }
    if let ChannelSource::Image { image, .. } = item.metal_source {
        ids.push(image);
    }
    ids
}
