use std::collections::HashSet;

use crate::error::{AtlasBakerError, Result};
use crate::optimize::analyzer::ChannelSource;
use crate::optimize::grouper::AtlasGroup;
use crate::optimize::layout::{TILE_SIZE, TileLayout};
use crate::optimize::pixels::{PixelCache, SourcePixels};
use crate::optimize::state::AtlasState;
use crate::scene::{
    BlendMode, ColorSpace, ImageBuffer, ImageId, Material, MaterialId, Node, PixelData, Scene,
    linear_to_srgb, srgb_to_linear,
};

/// Canonical UV layer name the atlas material samples; finalization renames
/// the atlas layer to this so it exports as the primary texture channel.
pub const EXPORT_UV_LAYER: &str = "UVMap";

/// Default fills written before any tile is composited: opaque black base
/// color, ORM at (AO=1, roughness=0.5, metallic=0), flat tangent normal.
pub const BASE_FILL: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const ORM_FILL: [f32; 4] = [1.0, 0.5, 0.0, 1.0];
pub const NORMAL_FILL: [f32; 4] = [0.5, 0.5, 1.0, 1.0];

/// The three pixel buffers of one atlas page set, fully composited but not
/// yet installed into a scene.
#[derive(Debug)]
pub struct ComposedAtlas {
    pub base: Vec<f32>,
    pub orm: Vec<f32>,
    pub normal: Vec<f32>,
    /// Source images whose dimensions differed from the tile size.
    pub resized: HashSet<ImageId>,
}

/// Composite every member of a group into fresh BaseColor / ORM / Normal
/// buffers.
///
/// Pure with respect to the scene: reads go through the pixel cache only,
/// so groups can be composited in parallel.
pub fn compose_group(group: &AtlasGroup, cache: &PixelCache) -> Result<ComposedAtlas> {
    let layout = group.layout;
    if group.items.len() != layout.tiles.len() {
        return Err(AtlasBakerError::AtlasBuild(format!(
            "group of {} does not fit layout '{}'",
            group.items.len(),
            layout.name
        )));
    }
    let total = (layout.width * layout.height) as usize * 4;

    let mut base = filled(total, BASE_FILL);
    let mut orm = filled(total, ORM_FILL);
    let mut normal = filled(total, NORMAL_FILL);
    let mut resized = HashSet::new();

    for (tile_idx, item) in group.items.iter().enumerate() {
        let (x_off, y_off) = layout.tiles[tile_idx];

        let src = fetch(cache, item.base_image, &item.material_name)?;
        blit_rgba(
            src,
            item.base_image,
            &mut base,
            layout.width,
            x_off,
            y_off,
            item.base_color_tint,
            &mut resized,
        );

        if let Some(normal_image) = item.normal_image {
            let src = fetch(cache, normal_image, &item.material_name)?;
            blit_rgba(
                src,
                normal_image,
                &mut normal,
                layout.width,
                x_off,
                y_off,
                None,
                &mut resized,
            );
        }
        // A member with no normal map keeps the flat-normal fill.

        blit_orm(
            &item.rough_source,
            &item.metal_source,
            &item.material_name,
            cache,
            &mut orm,
            layout.width,
            x_off,
            y_off,
            &mut resized,
        )?;
    }

    Ok(ComposedAtlas {
        base,
        orm,
        normal,
        resized,
    })
}

fn filled(len: usize, fill: [f32; 4]) -> Vec<f32> {
    let mut buf = vec![0.0; len];
    for px in buf.chunks_exact_mut(4) {
        px.copy_from_slice(&fill);
    }
    buf
}

fn fetch<'a>(cache: &'a PixelCache, id: ImageId, material: &str) -> Result<&'a SourcePixels> {
    cache.get(id).ok_or_else(|| {
        AtlasBakerError::AtlasBuild(format!("missing pixel data for a texture of '{material}'"))
    })
}

/// Copy a source image into one 512px tile, resampling by proportional
/// center sampling: `src = floor((dst + 0.5) * src_size / tile_size)`,
/// clamped.
///
/// A tint multiplies in linear space and converts back, so the atlas
/// stores correct sRGB values; without a tint the pixel is copied as-is.
#[allow(clippy::too_many_arguments)]
fn blit_rgba(
    src: &SourcePixels,
    src_id: ImageId,
    dst: &mut [f32],
    atlas_width: u32,
    x_off: u32,
    y_off: u32,
    tint: Option<[f32; 3]>,
    resized: &mut HashSet<ImageId>,
) {
    let tile = TILE_SIZE as usize;
    let src_w = src.width as usize;
    let src_h = src.height as usize;
    if src.width != TILE_SIZE || src.height != TILE_SIZE {
        resized.insert(src_id);
    }

    let tint = tint.filter(|&t| t != [1.0, 1.0, 1.0]);
    let atlas_width = atlas_width as usize;
    let (x_off, y_off) = (x_off as usize, y_off as usize);
    let data = &src.data;

    for y in 0..tile {
        let src_y = (((y as f32 + 0.5) * src_h as f32 / tile as f32) as usize).min(src_h - 1);
        let dst_row = (y + y_off) * atlas_width;
        for x in 0..tile {
            let src_x = (((x as f32 + 0.5) * src_w as f32 / tile as f32) as usize).min(src_w - 1);
            let si = (src_y * src_w + src_x) * 4;
            let di = (dst_row + x + x_off) * 4;
            match tint {
                Some([tr, tg, tb]) => {
                    dst[di] = linear_to_srgb(srgb_to_linear(data[si]) * tr);
                    dst[di + 1] = linear_to_srgb(srgb_to_linear(data[si + 1]) * tg);
                    dst[di + 2] = linear_to_srgb(srgb_to_linear(data[si + 2]) * tb);
                    dst[di + 3] = data[si + 3];
                }
                None => dst[di..di + 4].copy_from_slice(&data[si..si + 4]),
            }
        }
    }
}

/// Fill one ORM tile: R = occlusion (always 1), G = roughness,
/// B = metallic. Image-backed channels resample like the color blit;
/// scalar channels flood the tile with the constant.
#[allow(clippy::too_many_arguments)]
fn blit_orm(
    rough: &ChannelSource,
    metal: &ChannelSource,
    material: &str,
    cache: &PixelCache,
    dst: &mut [f32],
    atlas_width: u32,
    x_off: u32,
    y_off: u32,
    resized: &mut HashSet<ImageId>,
) -> Result<()> {
    let tile = TILE_SIZE as usize;

    let mut resolve = |source: &ChannelSource| -> Result<(Option<(SourcePixels, usize)>, f32)> {
        match source {
            ChannelSource::Scalar(v) => Ok((None, *v)),
            ChannelSource::Image { image, channel } => {
                let src = fetch(cache, *image, material)?;
                if src.width != TILE_SIZE || src.height != TILE_SIZE {
                    resized.insert(*image);
                }
                Ok((Some((src.clone(), *channel)), 0.0))
            }
        }
    };

    let (rough_tap, rough_scalar) = resolve(rough)?;
    let (metal_tap, metal_scalar) = resolve(metal)?;

    let atlas_width = atlas_width as usize;
    let (x_off, y_off) = (x_off as usize, y_off as usize);

    for y in 0..tile {
        let dst_row = (y + y_off) * atlas_width;
        for x in 0..tile {
            let di = (dst_row + x + x_off) * 4;

            let rough_val = match &rough_tap {
                Some((src, channel)) => sample_channel(src, x, y, *channel),
                None => rough_scalar,
            };
            let metal_val = match &metal_tap {
                Some((src, channel)) => sample_channel(src, x, y, *channel),
                None => metal_scalar,
            };

            dst[di] = 1.0;
            dst[di + 1] = rough_val;
            dst[di + 2] = metal_val;
            dst[di + 3] = 1.0;
        }
    }
    Ok(())
}

fn sample_channel(src: &SourcePixels, x: usize, y: usize, channel: usize) -> f32 {
    let tile = TILE_SIZE as usize;
    let src_w = src.width as usize;
    let src_h = src.height as usize;
    let sx = (((x as f32 + 0.5) * src_w as f32 / tile as f32) as usize).min(src_w - 1);
    let sy = (((y as f32 + 0.5) * src_h as f32 / tile as f32) as usize).min(src_h - 1);
    src.channel_at(sx, sy, channel)
}

/// Install a composed atlas into the scene: three images plus the atlas
/// material, all registered with the state for cleanup.
///
/// Surface settings come from the first group member; the blend mode is
/// forced opaque unless some member actually uses alpha, and the texture's
/// alpha output is only wired in that case.
pub fn install_atlas(
    scene: &mut Scene,
    state: &mut AtlasState,
    group_index: usize,
    group: &AtlasGroup,
    composed: ComposedAtlas,
) -> Result<MaterialId> {
    let layout = group.layout;
    let group_name = format!("Atlas_{}", group_index + 1);
    let size_label = format!("{}x{}", layout.width, layout.height);

    let base_img = add_atlas_image(
        scene,
        state,
        format!("{group_name}_BaseColor_{size_label}"),
        ColorSpace::Srgb,
        layout,
        composed.base,
    );
    let orm_img = add_atlas_image(
        scene,
        state,
        format!("{group_name}_ORM_{size_label}"),
        ColorSpace::NonColor,
        layout,
        composed.orm,
    );
    let normal_img = add_atlas_image(
        scene,
        state,
        format!("{group_name}_Normal_{size_label}"),
        ColorSpace::NonColor,
        layout,
        composed.normal,
    );

    let first = &group.items[0];
    let reference = scene.material(first.material).ok_or_else(|| {
        AtlasBakerError::AtlasBuild(format!(
            "reference material '{}' vanished mid-run",
            first.material_name
        ))
    })?;

    let group_uses_alpha = group.items.iter().any(|item| item.uses_alpha);
    let mut material = Material::new(format!("{group_name}_Material"));
    material.blend = if group_uses_alpha {
        reference.blend
    } else {
        BlendMode::Opaque
    };
    material.alpha_threshold = reference.alpha_threshold;
    material.use_backface_culling = reference.use_backface_culling;

    let g = &mut material.graph;
    let out = g.add(Node::output_material("Material Output", true));
    let bsdf = g.add(Node::principled("Principled BSDF"));
    let tex_base = g.add(Node::image_texture("BaseColor", Some(base_img)));
    let tex_orm = g.add(Node::image_texture("ORM", Some(orm_img)));
    let sep = g.add(Node::separate_color("Separate Color"));
    let tex_normal = g.add(Node::image_texture("Normal", Some(normal_img)));
    let normal_map = g.add(Node::normal_map("Normal Map"));
    let uv = g.add(Node::uv_map("UV Map", EXPORT_UV_LAYER));

    g.connect(uv, "UV", tex_base, "Vector")?;
    g.connect(uv, "UV", tex_orm, "Vector")?;
    g.connect(uv, "UV", tex_normal, "Vector")?;

    g.connect(tex_base, "Color", bsdf, "Base Color")?;
    if group_uses_alpha {
        g.connect(tex_base, "Alpha", bsdf, "Alpha")?;
    }

    g.connect(tex_orm, "Color", sep, "Color")?;
    g.connect(sep, "Green", bsdf, "Roughness")?;
    g.connect(sep, "Blue", bsdf, "Metallic")?;

    g.connect(tex_normal, "Color", normal_map, "Color")?;
    g.connect(normal_map, "Normal", bsdf, "Normal")?;

    g.connect(bsdf, "BSDF", out, "Surface")?;

    let material_id = scene.add_material(material);
    state.created_materials.push(material_id);
    Ok(material_id)
}

fn add_atlas_image(
    scene: &mut Scene,
    state: &mut AtlasState,
    name: String,
    colorspace: ColorSpace,
    layout: &TileLayout,
    pixels: Vec<f32>,
) -> ImageId {
    let id = scene.add_image(ImageBuffer {
        name,
        width: layout.width,
        height: layout.height,
        colorspace,
        pixels: PixelData::F32(pixels),
    });
    state.created_images.push(id);
    id
}
