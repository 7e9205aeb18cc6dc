use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{AtlasBakerError, Result};
use crate::scene::{
    BlendMode, ColorSpace, ImageBuffer, ImageId, Material, MaterialId, MeshData, MixBlend, Node,
    Polygon, Scene, SceneObject, SocketValue, UvLayer,
};

/// Load a glTF or GLB file into a [`Scene`].
///
/// Each glTF material is rebuilt as a shader graph in the shape renderers
/// author: texture into principled shader, with an optional multiply node
/// for a non-white base-color factor, a channel split for the packed
/// metallic-roughness texture, and a decode node for normals.
pub fn load_scene(path: &Path) -> Result<Scene> {
    let (document, buffers, images) = gltf::import(path)
        .map_err(|e| AtlasBakerError::Input(format!("Failed to load glTF: {e}")))?;

    debug!(
        meshes = document.meshes().len(),
        materials = document.materials().len(),
        images = images.len(),
        "Loaded glTF document"
    );

    let mut scene = Scene::default();

    // Images referenced as metallic-roughness or normal input carry raw
    // data; everything else is color.
    let mut non_color: HashSet<usize> = HashSet::new();
    for material in document.materials() {
        let pbr = material.pbr_metallic_roughness();
        if let Some(info) = pbr.metallic_roughness_texture() {
            non_color.insert(info.texture().source().index());
        }
        if let Some(info) = material.normal_texture() {
            non_color.insert(info.texture().source().index());
        }
    }

    let mut image_ids = Vec::with_capacity(images.len());
    for (img, data) in document.images().zip(images.iter()) {
        let name = img
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Image_{}", img.index()));
        let colorspace = if non_color.contains(&img.index()) {
            ColorSpace::NonColor
        } else {
            ColorSpace::Srgb
        };
        image_ids.push(scene.add_image(convert_gltf_image(name, colorspace, data)));
    }

    let mut material_ids = Vec::new();
    for material in document.materials() {
        material_ids.push(scene.add_material(convert_gltf_material(&material, &image_ids)?));
    }

    for mesh in document.meshes() {
        let object = convert_gltf_mesh(&mesh, &buffers, &material_ids);
        scene.add_object(object);
    }

    Ok(scene)
}

/// Convert decoded glTF image data to a scene image buffer.
///
/// Rows are flipped so row 0 sits at the bottom, the convention the tile
/// offsets and UV remapping assume.
fn convert_gltf_image(
    name: String,
    colorspace: ColorSpace,
    data: &gltf::image::Data,
) -> ImageBuffer {
    let rgba = to_rgba8(data);
    let rgba = flip_rows(data.width, data.height, rgba);
    ImageBuffer::from_rgba8(name, data.width, data.height, colorspace, rgba)
}

/// Normalize any glTF pixel format to 8-bit RGBA.
fn to_rgba8(data: &gltf::image::Data) -> Vec<u8> {
    use gltf::image::Format;

    match data.format {
        Format::R8 => expand(&data.pixels, 1),
        Format::R8G8 => expand(&data.pixels, 2),
        Format::R8G8B8 => expand(&data.pixels, 3),
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R16 => expand(&narrow_u16(&data.pixels), 1),
        Format::R16G16 => expand(&narrow_u16(&data.pixels), 2),
        Format::R16G16B16 => expand(&narrow_u16(&data.pixels), 3),
        Format::R16G16B16A16 => expand(&narrow_u16(&data.pixels), 4),
        Format::R32G32B32FLOAT => expand(&narrow_f32(&data.pixels), 3),
        Format::R32G32B32A32FLOAT => expand(&narrow_f32(&data.pixels), 4),
    }
}

fn narrow_u16(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks_exact(2)
        .map(|c| (u16::from_ne_bytes([c[0], c[1]]) >> 8) as u8)
        .collect()
}

fn narrow_f32(bytes: &[u8]) -> Vec<u8> {
    bytes
        .chunks_exact(4)
        .map(|c| {
            let v = f32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        })
        .collect()
}

/// Expand N-component samples to RGBA. Gray replicates, two-component
/// data is treated as gray + alpha.
fn expand(samples: &[u8], components: usize) -> Vec<u8> {
    match components {
        1 => samples.iter().flat_map(|&v| [v, v, v, 255]).collect(),
        2 => samples
            .chunks_exact(2)
            .flat_map(|c| [c[0], c[0], c[0], c[1]])
            .collect(),
        3 => samples
            .chunks_exact(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        _ => samples.to_vec(),
    }
}

fn flip_rows(width: u32, height: u32, data: Vec<u8>) -> Vec<u8> {
    let stride = width as usize * 4;
    if stride == 0 || data.len() != stride * height as usize {
        return data;
    }
    let mut out = vec![0u8; data.len()];
    for y in 0..height as usize {
        let src = y * stride;
        let dst = (height as usize - 1 - y) * stride;
        out[dst..dst + stride].copy_from_slice(&data[src..src + stride]);
    }
    out
}

/// Rebuild a glTF material as a scene material with a shader graph.
fn convert_gltf_material(
    material: &gltf::Material<'_>,
    image_ids: &[ImageId],
) -> Result<Material> {
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Material_{}", material.index().unwrap_or(0)));
    let pbr = material.pbr_metallic_roughness();

    let mut out = Material::new(name);
    out.blend = match material.alpha_mode() {
        gltf::material::AlphaMode::Opaque => BlendMode::Opaque,
        gltf::material::AlphaMode::Mask => BlendMode::Clip,
        gltf::material::AlphaMode::Blend => BlendMode::Blend,
    };
    out.alpha_threshold = material.alpha_cutoff().unwrap_or(0.5);
    out.use_backface_culling = !material.double_sided();

    let g = &mut out.graph;
    let bsdf = g.add(Node::principled("Principled BSDF"));
    let output = g.add(Node::output_material("Material Output", true));

    let base_factor = pbr.base_color_factor();
    match pbr.base_color_texture() {
        Some(info) => {
            let image = image_ids.get(info.texture().source().index()).copied();
            let tex = g.add(Node::image_texture("Base Color Texture", image));
            if base_factor[..3] != [1.0, 1.0, 1.0] {
                let mix = g.add(Node::mix_rgb("Base Color Factor", MixBlend::Multiply));
                set_input(g, mix, "Fac", SocketValue::Scalar(1.0));
                set_input(
                    g,
                    mix,
                    "Color2",
                    SocketValue::Color([base_factor[0], base_factor[1], base_factor[2], 1.0]),
                );
                g.connect(tex, "Color", mix, "Color1")?;
                g.connect(mix, "Color", bsdf, "Base Color")?;
            } else {
                g.connect(tex, "Color", bsdf, "Base Color")?;
            }
            if out.blend != BlendMode::Opaque {
                g.connect(tex, "Alpha", bsdf, "Alpha")?;
            }
        }
        None => set_input(g, bsdf, "Base Color", SocketValue::Color(base_factor)),
    }

    if let Some(info) = pbr.metallic_roughness_texture() {
        let image = image_ids.get(info.texture().source().index()).copied();
        let tex = g.add(Node::image_texture("Metallic Roughness Texture", image));
        let sep = g.add(Node::separate_color("Separate Color"));
        g.connect(tex, "Color", sep, "Color")?;
        g.connect(sep, "Green", bsdf, "Roughness")?;
        g.connect(sep, "Blue", bsdf, "Metallic")?;
    }
    set_input(g, bsdf, "Roughness", SocketValue::Scalar(pbr.roughness_factor()));
    set_input(g, bsdf, "Metallic", SocketValue::Scalar(pbr.metallic_factor()));

    if let Some(normal) = material.normal_texture() {
        let image = image_ids.get(normal.texture().source().index()).copied();
        let tex = g.add(Node::image_texture("Normal Texture", image));
        let decode = g.add(Node::normal_map("Normal Map"));
        set_input(g, decode, "Strength", SocketValue::Scalar(normal.scale()));
        g.connect(tex, "Color", decode, "Color")?;
        g.connect(decode, "Normal", bsdf, "Normal")?;
    }

    g.connect(bsdf, "BSDF", output, "Surface")?;
    Ok(out)
}

fn set_input(
    g: &mut crate::scene::NodeGraph,
    node: crate::scene::NodeId,
    name: &str,
    value: SocketValue,
) {
    if let Some(idx) = g.input_index(node, name) {
        g.node_mut(node).inputs[idx].value = value;
    }
}

/// Convert one glTF mesh into a scene object.
///
/// Every primitive becomes a material slot; its triangles become polygons
/// on that slot. V coordinates flip from the glTF top-left origin to the
/// scene's bottom-left origin.
fn convert_gltf_mesh(
    mesh: &gltf::Mesh<'_>,
    buffers: &[gltf::buffer::Data],
    material_ids: &[MaterialId],
) -> SceneObject {
    let name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Mesh_{}", mesh.index()));

    let mut data = MeshData::default();
    let mut uv_data: Vec<f32> = Vec::new();
    let mut any_uvs = false;

    for primitive in mesh.primitives() {
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let Some(indices) = reader.read_indices() else {
            warn!(mesh = %name, "Skipping primitive without indices");
            continue;
        };
        let indices: Vec<u32> = indices.into_u32().collect();

        let uvs: Option<Vec<[f32; 2]>> = reader
            .read_tex_coords(0)
            .map(|tc| tc.into_f32().map(|[u, v]| [u, 1.0 - v]).collect());
        if uvs.is_some() {
            any_uvs = true;
        }

        let slot = data.material_slots.len();
        data.material_slots.push(
            primitive
                .material()
                .index()
                .and_then(|i| material_ids.get(i).copied()),
        );

        for tri in indices.chunks_exact(3) {
            let loop_start = (uv_data.len() / 2) as u32;
            for &vi in tri {
                let uv = uvs
                    .as_ref()
                    .and_then(|list| list.get(vi as usize).copied())
                    .unwrap_or([0.0, 1.0]);
                uv_data.extend_from_slice(&uv);
            }
            data.polygons.push(Polygon {
                material_index: slot,
                loop_indices: vec![loop_start, loop_start + 1, loop_start + 2],
            });
        }
    }

    data.loop_count = uv_data.len() / 2;
    if any_uvs {
        data.uv_layers.push(UvLayer {
            name: "UVMap".into(),
            data: uv_data,
            active_render: true,
        });
        data.active_uv = Some(0);
    }

    SceneObject {
        name,
        parent: None,
        mesh: Some(data),
    }
}
