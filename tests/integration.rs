//! End-to-end integration tests.
//!
//! These tests author synthetic GLB files, run the full pipeline, and
//! validate the written atlas pages and the report.

use std::fs;
use std::path::Path;

use atlas_baker::config::{AtlasConfig, PipelineConfig};
use atlas_baker::Pipeline;
use serde_json::json;

/// One material in the synthetic scene: a solid-color 16x16 base texture
/// plus an optional base-color factor.
struct MaterialSpec {
    name: &'static str,
    color: [u8; 3],
    base_color_factor: Option<[f32; 4]>,
    textured: bool,
}

impl MaterialSpec {
    fn solid(name: &'static str, color: [u8; 3]) -> Self {
        Self {
            name,
            color,
            base_color_factor: None,
            textured: true,
        }
    }
}

fn png_bytes(color: [u8; 3]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(
        16,
        16,
        image::Rgba([color[0], color[1], color[2], 255]),
    );
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn pad4(buf: &mut Vec<u8>, fill: u8) {
    while buf.len() % 4 != 0 {
        buf.push(fill);
    }
}

/// Write a GLB with one mesh holding one textured unit quad per material.
fn write_glb(path: &Path, specs: &[MaterialSpec]) {
    let mut bin: Vec<u8> = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();
    let mut images = Vec::new();
    let mut textures = Vec::new();
    let mut materials = Vec::new();
    let mut primitives = Vec::new();

    for (i, spec) in specs.iter().enumerate() {
        let x = i as f32;
        let positions: [f32; 12] = [
            x, 0.0, 0.0, //
            x + 1.0, 0.0, 0.0, //
            x + 1.0, 1.0, 0.0, //
            x, 1.0, 0.0,
        ];
        let uvs: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];

        let pos_offset = bin.len();
        bin.extend_from_slice(bytemuck::cast_slice(&positions));
        let uv_offset = bin.len();
        bin.extend_from_slice(bytemuck::cast_slice(&uvs));
        let idx_offset = bin.len();
        bin.extend_from_slice(bytemuck::cast_slice(&indices));
        pad4(&mut bin, 0);

        let pos_view = buffer_views.len();
        buffer_views.push(json!({"buffer": 0, "byteOffset": pos_offset, "byteLength": 48}));
        let uv_view = buffer_views.len();
        buffer_views.push(json!({"buffer": 0, "byteOffset": uv_offset, "byteLength": 32}));
        let idx_view = buffer_views.len();
        buffer_views.push(json!({"buffer": 0, "byteOffset": idx_offset, "byteLength": 12}));

        let pos_acc = accessors.len();
        accessors.push(json!({
            "bufferView": pos_view, "componentType": 5126, "count": 4, "type": "VEC3",
            "min": [x, 0.0, 0.0], "max": [x + 1.0, 1.0, 0.0],
        }));
        let uv_acc = accessors.len();
        accessors.push(json!({
            "bufferView": uv_view, "componentType": 5126, "count": 4, "type": "VEC2",
        }));
        let idx_acc = accessors.len();
        accessors.push(json!({
            "bufferView": idx_view, "componentType": 5123, "count": 6, "type": "SCALAR",
        }));

        let mut pbr = json!({"metallicFactor": 0.0, "roughnessFactor": 0.5});
        if spec.textured {
            let png = png_bytes(spec.color);
            let png_offset = bin.len();
            let png_len = png.len();
            bin.extend_from_slice(&png);
            pad4(&mut bin, 0);

            let png_view = buffer_views.len();
            buffer_views.push(
                json!({"buffer": 0, "byteOffset": png_offset, "byteLength": png_len}),
            );
            let image_index = images.len();
            images.push(json!({
                "bufferView": png_view,
                "mimeType": "image/png",
                "name": format!("{}_tex", spec.name),
            }));
            let texture_index = textures.len();
            textures.push(json!({"source": image_index}));
            pbr["baseColorTexture"] = json!({"index": texture_index});
        }
        if let Some(factor) = spec.base_color_factor {
            pbr["baseColorFactor"] = json!(factor);
        }

        materials.push(json!({"name": spec.name, "pbrMetallicRoughness": pbr}));
        primitives.push(json!({
            "attributes": {"POSITION": pos_acc, "TEXCOORD_0": uv_acc},
            "indices": idx_acc,
            "material": i,
        }));
    }

    let mut root = json!({
        "asset": {"version": "2.0"},
        "buffers": [{"byteLength": bin.len()}],
        "bufferViews": buffer_views,
        "accessors": accessors,
        "materials": materials,
        "meshes": [{"name": "scene", "primitives": primitives}],
        "nodes": [{"mesh": 0}],
        "scenes": [{"nodes": [0]}],
        "scene": 0,
    });
    // Empty arrays are invalid glTF; only emit these when textures exist.
    if !images.is_empty() {
        root["images"] = json!(images);
        root["textures"] = json!(textures);
    }

    let mut json_bytes = serde_json::to_vec(&root).unwrap();
    pad4(&mut json_bytes, b' ');
    pad4(&mut bin, 0);

    let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json_bytes);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);

    fs::write(path, glb).unwrap();
}

fn run_pipeline(input: &Path, output: &Path, config: AtlasConfig) -> atlas_baker::pipeline::ProcessingResult {
    let config = PipelineConfig {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        atlas: config,
        ..Default::default()
    };
    Pipeline::run(&config).expect("pipeline should succeed")
}

#[test]
fn four_materials_bake_one_quad_atlas() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scene.glb");
    let output = tmp.path().join("atlases");

    let colors = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];
    write_glb(
        &input,
        &[
            MaterialSpec::solid("mat0", colors[0]),
            MaterialSpec::solid("mat1", colors[1]),
            MaterialSpec::solid("mat2", colors[2]),
            MaterialSpec::solid("mat3", colors[3]),
        ],
    );

    let result = run_pipeline(&input, &output, AtlasConfig::default());

    assert_eq!(result.report.candidate_materials, 4);
    assert_eq!(result.report.merged_quartets, 1);
    assert_eq!(result.report.merged_pairs, 0);
    assert_eq!(result.report.leftover_materials, 0);
    assert_eq!(result.report.drawcall_reduction_estimate, 3);
    // All four 16px sources were resampled up to the tile size.
    assert_eq!(result.report.resized_textures, 4);
    assert_eq!(result.report.before_materials, 4);
    assert_eq!(result.report.after_materials, 1);
    assert_eq!(result.atlases_written, 3);

    // BaseColor page: four distinct quadrants, name-sorted materials in
    // tile order top-left, top-right, bottom-left, bottom-right.
    let base = image::open(output.join("Atlas_1_BaseColor_1024x1024.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(base.dimensions(), (1024, 1024));
    let probe = |x: u32, y: u32| {
        let p = base.get_pixel(x, y);
        [p[0], p[1], p[2]]
    };
    assert_eq!(probe(256, 256), colors[0]);
    assert_eq!(probe(768, 256), colors[1]);
    assert_eq!(probe(256, 768), colors[2]);
    assert_eq!(probe(768, 768), colors[3]);

    // ORM page is uniform (AO=1, rough=0.5, metal=0).
    let orm = image::open(output.join("Atlas_1_ORM_1024x1024.png"))
        .unwrap()
        .to_rgba8();
    for (x, y) in [(0, 0), (512, 512), (1023, 1023)] {
        let p = orm.get_pixel(x, y);
        assert_eq!(p[0], 255);
        assert_eq!(p[1], 128);
        assert_eq!(p[2], 0);
    }

    // Normal page is flat.
    let normal = image::open(output.join("Atlas_1_Normal_1024x1024.png"))
        .unwrap()
        .to_rgba8();
    let p = normal.get_pixel(100, 900);
    assert_eq!([p[0], p[1], p[2]], [128, 128, 255]);
}

#[test]
fn three_materials_bake_one_pair() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scene.glb");
    let output = tmp.path().join("atlases");

    write_glb(
        &input,
        &[
            MaterialSpec::solid("a", [200, 10, 10]),
            MaterialSpec::solid("b", [10, 200, 10]),
            MaterialSpec::solid("c", [10, 10, 200]),
        ],
    );

    let result = run_pipeline(&input, &output, AtlasConfig::default());

    assert_eq!(result.report.candidate_materials, 3);
    assert_eq!(result.report.merged_quartets, 0);
    assert_eq!(result.report.merged_pairs, 1);
    assert_eq!(result.report.leftover_materials, 1);
    assert_eq!(result.atlases_written, 3);

    let base = image::open(output.join("Atlas_1_BaseColor_512x1024.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(base.dimensions(), (512, 1024));
    // Top tile holds 'a', bottom tile holds 'b'.
    let top = base.get_pixel(256, 256);
    assert_eq!([top[0], top[1], top[2]], [200, 10, 10]);
    let bottom = base.get_pixel(256, 768);
    assert_eq!([bottom[0], bottom[1], bottom[2]], [10, 200, 10]);
}

#[test]
fn base_color_factor_tints_in_linear_space() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scene.glb");
    let output = tmp.path().join("atlases");

    let mut tinted = MaterialSpec::solid("tinted", [255, 255, 255]);
    tinted.base_color_factor = Some([0.5, 0.5, 0.5, 1.0]);
    write_glb(&input, &[tinted, MaterialSpec::solid("plain", [255, 255, 255])]);

    let result = run_pipeline(&input, &output, AtlasConfig::default());
    assert_eq!(result.report.merged_pairs, 1);

    let base = image::open(output.join("Atlas_1_BaseColor_512x1024.png"))
        .unwrap()
        .to_rgba8();
    // Name order puts 'plain' in the top tile and 'tinted' in the bottom
    // one. White tinted by 0.5 in linear space encodes back to sRGB
    // ~0.7354, i.e. 187-188 -- not the naive 128.
    let px = base.get_pixel(256, 768);
    assert!(
        (186..=189).contains(&px[0]),
        "expected linear-space tint, got {}",
        px[0]
    );
    let plain = base.get_pixel(256, 256);
    assert_eq!([plain[0], plain[1], plain[2]], [255, 255, 255]);
}

#[test]
fn untextured_material_is_left_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scene.glb");
    let output = tmp.path().join("atlases");

    let mut untextured = MaterialSpec::solid("flat", [0, 0, 0]);
    untextured.textured = false;
    untextured.base_color_factor = Some([0.8, 0.2, 0.2, 1.0]);
    write_glb(&input, &[untextured]);

    let result = run_pipeline(&input, &output, AtlasConfig::default());

    assert_eq!(result.report.candidate_materials, 0);
    assert_eq!(result.report.merged_quartets, 0);
    assert_eq!(result.report.merged_pairs, 0);
    assert_eq!(result.atlases_written, 0);
    assert!(
        result
            .report
            .warnings
            .iter()
            .any(|w| w.contains("flat") && w.contains("not compatible"))
    );
}

#[test]
fn dry_run_plans_without_writing() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scene.glb");
    let output = tmp.path().join("atlases");

    write_glb(
        &input,
        &[
            MaterialSpec::solid("a", [255, 0, 0]),
            MaterialSpec::solid("b", [0, 255, 0]),
        ],
    );

    let config = PipelineConfig {
        input: input.clone(),
        output: output.clone(),
        dry_run: true,
        ..Default::default()
    };
    let result = Pipeline::run(&config).unwrap();

    assert_eq!(result.report.merged_pairs, 1);
    assert_eq!(result.atlases_written, 0);
    assert!(!output.exists());
}

#[test]
fn report_json_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let input = tmp.path().join("scene.glb");
    let output = tmp.path().join("atlases");
    let report_path = tmp.path().join("report.json");

    write_glb(
        &input,
        &[
            MaterialSpec::solid("a", [255, 0, 0]),
            MaterialSpec::solid("b", [0, 255, 0]),
            MaterialSpec::solid("c", [0, 0, 255]),
        ],
    );

    let config = PipelineConfig {
        input: input.clone(),
        output: output.clone(),
        report_json: Some(report_path.clone()),
        ..Default::default()
    };
    Pipeline::run(&config).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(parsed["candidate_materials"], 3);
    assert_eq!(parsed["merged_pairs"], 1);
    assert_eq!(parsed["leftover_materials"], 1);
}
