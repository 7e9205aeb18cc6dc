use std::collections::HashSet;

use tracing::debug;

use crate::config::{AtlasConfig, ResizeMode};
use crate::optimize::layout::TILE_SIZE;
use crate::optimize::report::OptimizeReport;
use crate::scene::{
    BlendMode, ImageId, Material, MaterialId, MixBlend, NodeGraph, NodeId, NodeKind, ObjectId,
    Scene, SocketValue,
};

/// Maximum upstream hops when tracing a socket back to an image texture.
/// Guards against cyclic and pathological graphs.
pub const MAX_TRACE_DEPTH: usize = 16;

/// UV bounds accepted as "unit square", with a small margin for
/// floating-point imprecision. Anything outside means the material relies
/// on texture wrapping and cannot be atlased.
const UV_MIN: f32 = -0.01;
const UV_MAX: f32 = 1.01;

/// How a scalar PBR channel (roughness / metallic) is sourced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelSource {
    Scalar(f32),
    Image { image: ImageId, channel: usize },
}

/// Equality criterion for sharing an atlas: blend mode, alpha cutoff
/// (fixed-point, only meaningful for clip materials), and actual alpha use.
///
/// Normal/roughness/metallic differences do not prevent merging; they are
/// handled per tile at composite time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompatKey {
    pub blend: BlendMode,
    pub alpha_cutoff_key: i32,
    pub uses_alpha: bool,
}

/// Result of analyzing one material for atlas compatibility.
#[derive(Debug, Clone)]
pub struct MaterialAnalysis {
    pub material: MaterialId,
    pub material_name: String,
    pub key: CompatKey,
    pub base_image: ImageId,
    pub normal_image: Option<ImageId>,
    pub rough_source: ChannelSource,
    pub metal_source: ChannelSource,
    pub uses_alpha: bool,
    /// Multiply tint found between the base texture and the shader,
    /// applied in linear space at composite time. `None` means (1,1,1).
    pub base_color_tint: Option<[f32; 3]>,
}

/// Analyze one material, or return `None` if it cannot be atlased.
pub fn analyze_material(scene: &Scene, id: MaterialId) -> Option<MaterialAnalysis> {
    let material = scene.material(id)?;
    let graph = &material.graph;
    if graph.is_empty() {
        return None;
    }

    let principled = find_principled(graph)?;

    let base_input = graph.input_index(principled, "Base Color")?;
    let (base_image, base_color_tint) = extract_base_image(graph, principled, base_input)?;

    let normal_image = graph
        .input_index(principled, "Normal")
        .and_then(|idx| extract_normal_image(graph, principled, idx))
        .map(|(image, _strength)| image);

    let rough_source = match graph.input_index(principled, "Roughness") {
        Some(idx) => extract_channel_source(graph, principled, idx),
        None => ChannelSource::Scalar(0.5),
    };
    let metal_source = match graph.input_index(principled, "Metallic") {
        Some(idx) => extract_channel_source(graph, principled, idx),
        None => ChannelSource::Scalar(0.0),
    };

    // Alpha counts only when the blend mode allows it AND the socket is
    // actually wired; an unlinked alpha socket on a blended material still
    // renders effectively opaque.
    let alpha_linked = graph
        .input_index(principled, "Alpha")
        .map(|idx| graph.is_input_linked(principled, idx))
        .unwrap_or(false);
    let uses_alpha = material.blend != BlendMode::Opaque && alpha_linked;

    let alpha_cutoff_key = if material.blend == BlendMode::Clip {
        (material.alpha_threshold * 10_000.0).round() as i32
    } else {
        0
    };

    Some(MaterialAnalysis {
        material: id,
        material_name: material.name.clone(),
        key: CompatKey {
            blend: material.blend,
            alpha_cutoff_key,
            uses_alpha,
        },
        base_image,
        normal_image,
        rough_source,
        metal_source,
        uses_alpha,
        base_color_tint,
    })
}

/// Find the shading node: the principled node feeding the active output is
/// preferred, falling back to the first principled node in the graph.
fn find_principled(graph: &NodeGraph) -> Option<NodeId> {
    for (id, node) in graph.nodes() {
        if !matches!(node.kind, NodeKind::Output { active: true }) {
            continue;
        }
        let Some(surface) = graph.input_index(id, "Surface") else {
            continue;
        };
        if let Some((from, _)) = graph.incoming(id, surface) {
            if matches!(graph.node(from).kind, NodeKind::Principled) {
                return Some(from);
            }
        }
    }
    graph
        .nodes()
        .find(|(_, node)| matches!(node.kind, NodeKind::Principled))
        .map(|(id, _)| id)
}

/// Extract the base color image and any multiply tint applied to it.
///
/// Handles the common wirings:
///   - texture straight into the shader (no tint)
///   - texture through a mix node, tint read from the other color socket
fn extract_base_image(
    graph: &NodeGraph,
    node: NodeId,
    input: usize,
) -> Option<(ImageId, Option<[f32; 3]>)> {
    if let Some(result) = extract_base_image_and_tint(graph, node, input) {
        return Some(result);
    }
    trace_to_image(graph, node, input).map(|image| (image, None))
}

fn extract_base_image_and_tint(
    graph: &NodeGraph,
    node: NodeId,
    input: usize,
) -> Option<(ImageId, Option<[f32; 3]>)> {
    let (mix_id, _) = graph.incoming(node, input)?;
    let mix = graph.node(mix_id);
    let NodeKind::Mix { blend } = mix.kind else {
        return None;
    };
    if !matches!(blend, MixBlend::Multiply | MixBlend::Mix) {
        return None;
    }

    let (a_idx, b_idx) = find_mix_color_inputs(graph, mix_id)?;

    let tex_a = linked_image(graph, mix_id, a_idx);
    let tex_b = linked_image(graph, mix_id, b_idx);

    let (image, mut tint) = match (tex_a, tex_b) {
        (Some(image), None) => (image, socket_color(graph, mix_id, b_idx)),
        (None, Some(image)) => (image, socket_color(graph, mix_id, a_idx)),
        (Some(image), Some(_)) => (image, None),
        (None, None) => return None,
    };

    // A plain Mix at (nearly) zero factor leaves the texture untouched.
    if blend == MixBlend::Mix && tint.is_some() {
        if let Some(fac_idx) = find_mix_factor_input(graph, mix_id) {
            if !graph.is_input_linked(mix_id, fac_idx) {
                if let SocketValue::Scalar(fac) = graph.node(mix_id).inputs[fac_idx].value {
                    if fac < 0.01 {
                        tint = None;
                    }
                }
            }
        }
    }

    Some((image, tint))
}

fn linked_image(graph: &NodeGraph, node: NodeId, input: usize) -> Option<ImageId> {
    if graph.is_input_linked(node, input) {
        trace_to_image(graph, node, input)
    } else {
        None
    }
}

/// The two color inputs of a mix node.
///
/// Legacy nodes name them `Color1`/`Color2`. Generic mix nodes expose
/// `A`/`B` pairs for several data types; the color pair is the one whose
/// defaults have four components.
fn find_mix_color_inputs(graph: &NodeGraph, id: NodeId) -> Option<(usize, usize)> {
    let node = graph.node(id);

    let c1 = node.inputs.iter().position(|s| s.name == "Color1");
    let c2 = node.inputs.iter().position(|s| s.name == "Color2");
    if let (Some(c1), Some(c2)) = (c1, c2) {
        return Some((c1, c2));
    }

    let mut color_a = None;
    let mut color_b = None;
    for (idx, socket) in node.inputs.iter().enumerate() {
        if !matches!(socket.value, SocketValue::Color(_)) {
            continue;
        }
        match socket.name.trim() {
            "A" if color_a.is_none() => color_a = Some(idx),
            "B" if color_b.is_none() => color_b = Some(idx),
            _ => {}
        }
    }
    match (color_a, color_b) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    }
}

/// The scalar factor input of a mix node (`Fac` or `Factor`).
fn find_mix_factor_input(graph: &NodeGraph, id: NodeId) -> Option<usize> {
    graph.node(id).inputs.iter().position(|s| {
        matches!(s.value, SocketValue::Scalar(_)) && matches!(s.name.as_str(), "Fac" | "Factor")
    })
}

fn socket_color(graph: &NodeGraph, id: NodeId, input: usize) -> Option<[f32; 3]> {
    match graph.node(id).inputs[input].value {
        SocketValue::Color([r, g, b, _]) => Some([r, g, b]),
        _ => None,
    }
}

/// Trace the normal input to its image, through an optional decode node.
/// Returns the image plus the decode strength (1.0 when wired directly).
fn extract_normal_image(graph: &NodeGraph, node: NodeId, input: usize) -> Option<(ImageId, f32)> {
    let (from, _) = graph.incoming(node, input)?;
    match &graph.node(from).kind {
        NodeKind::NormalMap => {
            let color = graph.input_index(from, "Color")?;
            if !graph.is_input_linked(from, color) {
                return None;
            }
            let image = trace_to_image(graph, from, color)?;
            let strength = match graph.input_socket(from, "Strength").map(|s| s.value) {
                Some(SocketValue::Scalar(v)) => v,
                _ => 1.0,
            };
            Some((image, strength))
        }
        NodeKind::ImageTexture { image: Some(image) } => Some((*image, 1.0)),
        _ => trace_to_image(graph, node, input).map(|image| (image, 1.0)),
    }
}

/// Resolve a scalar shader input to an image channel or a constant.
///
/// A linked socket with no recognizable separator upstream samples
/// channel 0 of the first reachable texture.
fn extract_channel_source(graph: &NodeGraph, node: NodeId, input: usize) -> ChannelSource {
    let scalar = match graph.node(node).inputs[input].value {
        SocketValue::Scalar(v) => v,
        _ => 0.0,
    };

    let Some((from, from_output)) = graph.incoming(node, input) else {
        return ChannelSource::Scalar(scalar);
    };

    match &graph.node(from).kind {
        NodeKind::ImageTexture { image: Some(image) } => {
            let channel = if graph.node(from).outputs[from_output].name == "Alpha" {
                3
            } else {
                0
            };
            return ChannelSource::Image {
                image: *image,
                channel,
            };
        }
        NodeKind::SeparateColor => {
            let channel = channel_from_socket_name(&graph.node(from).outputs[from_output].name);
            let color = graph
                .input_index(from, "Image")
                .or_else(|| graph.input_index(from, "Color"));
            if let Some(color) = color {
                if graph.is_input_linked(from, color) {
                    if let Some(image) = trace_to_image(graph, from, color) {
                        return ChannelSource::Image { image, channel };
                    }
                }
            }
        }
        _ => {}
    }

    if let Some(image) = trace_to_image(graph, node, input) {
        return ChannelSource::Image { image, channel: 0 };
    }
    ChannelSource::Scalar(scalar)
}

fn channel_from_socket_name(name: &str) -> usize {
    match name.to_lowercase().as_str() {
        "r" | "red" => 0,
        "g" | "green" => 1,
        "b" | "blue" => 2,
        "a" | "alpha" => 3,
        _ => 0,
    }
}

/// Depth-first upstream search for the first image texture reachable from
/// an input socket. Depth-limited, with a visited set so diamond and
/// cyclic graphs terminate.
fn trace_to_image(graph: &NodeGraph, node: NodeId, input: usize) -> Option<ImageId> {
    let mut visited = HashSet::new();
    trace_inner(graph, node, input, 0, &mut visited)
}

fn trace_inner(
    graph: &NodeGraph,
    node: NodeId,
    input: usize,
    depth: usize,
    visited: &mut HashSet<NodeId>,
) -> Option<ImageId> {
    if depth > MAX_TRACE_DEPTH {
        return None;
    }
    let (from, _) = graph.incoming(node, input)?;
    if !visited.insert(from) {
        return None;
    }

    match &graph.node(from).kind {
        NodeKind::ImageTexture { image: Some(image) } => return Some(*image),
        NodeKind::SeparateColor => {
            if let Some(color) = graph
                .input_index(from, "Image")
                .or_else(|| graph.input_index(from, "Color"))
            {
                return trace_inner(graph, from, color, depth + 1, visited);
            }
        }
        _ => {}
    }

    for idx in 0..graph.node(from).inputs.len() {
        if graph.is_input_linked(from, idx) {
            if let Some(found) = trace_inner(graph, from, idx, depth + 1, visited) {
                return Some(found);
            }
        }
    }
    None
}

/// Largest dimension among all image textures used by a material.
pub fn material_max_texture_size(scene: &Scene, material: &Material) -> u32 {
    let mut max_size = 0;
    for (_, node) in material.graph.nodes() {
        if let NodeKind::ImageTexture { image: Some(image) } = node.kind {
            if let Some(buffer) = scene.image(image) {
                max_size = max_size.max(buffer.max_dimension());
            }
        }
    }
    max_size
}

/// Collect analyses for every unique, policy-passing material used by the
/// given mesh objects.
///
/// Materials are visited in name order so the run is deterministic.
/// Rejection reasons become report warnings (when enabled); rejected
/// materials are excluded from the candidate set entirely.
pub fn collect_candidates(
    scene: &Scene,
    mesh_objects: &[ObjectId],
    config: &AtlasConfig,
    report: &mut OptimizeReport,
) -> Vec<MaterialAnalysis> {
    let mut unique: Vec<MaterialId> = Vec::new();
    let mut seen: HashSet<MaterialId> = HashSet::new();
    let mut tiled: HashSet<MaterialId> = HashSet::new();

    for &obj_id in mesh_objects {
        let Some(mesh) = scene.object(obj_id).and_then(|o| o.mesh.as_ref()) else {
            continue;
        };
        if mesh.material_slots.is_empty() {
            continue;
        }

        let uv_data = mesh
            .source_uv_layer_index()
            .map(|idx| mesh.uv_layers[idx].data.as_slice())
            .filter(|data| !data.is_empty());

        for slot in mesh.used_slot_indices() {
            let Some(&Some(mat_id)) = mesh.material_slots.get(slot) else {
                continue;
            };

            if let Some(uvs) = uv_data {
                if !tiled.contains(&mat_id) && slot_uvs_outside_unit(mesh, slot, uvs) {
                    tiled.insert(mat_id);
                }
            }

            if seen.insert(mat_id) {
                unique.push(mat_id);
            }
        }
    }

    unique.sort_by_key(|&id| {
        scene
            .material(id)
            .map(|m| m.name.clone())
            .unwrap_or_default()
    });

    let mut analyses = Vec::new();
    for mat_id in unique {
        let Some(material) = scene.material(mat_id) else {
            continue;
        };

        if tiled.contains(&mat_id) {
            if config.detailed_warnings {
                report.warnings.push(format!(
                    "Material '{}' uses tiled UVs (outside 0-1), skipped",
                    material.name
                ));
            }
            continue;
        }

        if config.resize_mode == ResizeMode::Conservative {
            let max_tex = material_max_texture_size(scene, material);
            if max_tex > TILE_SIZE {
                if config.detailed_warnings {
                    report.warnings.push(format!(
                        "Material '{}' has {max_tex}px textures, skipped (conservative mode keeps larger textures intact)",
                        material.name
                    ));
                }
                continue;
            }
        }

        match analyze_material(scene, mat_id) {
            Some(analysis) => analyses.push(analysis),
            None => {
                if config.detailed_warnings {
                    report.warnings.push(format!(
                        "Material '{}' not compatible with atlas rules",
                        material.name
                    ));
                }
            }
        }
    }

    debug!(candidates = analyses.len(), "Material analysis complete");
    analyses
}

/// True if any polygon on the slot has a UV coordinate outside the unit
/// square (plus tolerance).
fn slot_uvs_outside_unit(
    mesh: &crate::scene::MeshData,
    slot: usize,
    uv_data: &[f32],
) -> bool {
    for poly in &mesh.polygons {
        if poly.material_index != slot {
            continue;
        }
        for &li in &poly.loop_indices {
            let bi = li as usize * 2;
            if bi + 1 >= uv_data.len() {
                continue;
            }
            let (u, v) = (uv_data[bi], uv_data[bi + 1]);
            if u < UV_MIN || u > UV_MAX || v < UV_MIN || v > UV_MAX {
                return true;
            }
        }
    }
    false
}
