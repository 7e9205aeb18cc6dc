pub mod gltf_loader;

use std::path::Path;

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::{AtlasBakerError, Result};
use crate::scene::Scene;

/// Result of the ingestion stage.
#[derive(Debug)]
pub struct IngestionResult {
    pub scene: Scene,
    pub stats: IngestionStats,
}

/// Statistics about the ingested scene.
#[derive(Debug)]
pub struct IngestionStats {
    pub objects: usize,
    pub polygons: usize,
    pub materials: usize,
    pub images: usize,
    pub has_uvs: bool,
    pub input_format: String,
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Gltf,
    Glb,
}

impl InputFormat {
    /// Detect format from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "gltf" => Ok(InputFormat::Gltf),
            "glb" => Ok(InputFormat::Glb),
            _ => Err(AtlasBakerError::Input(format!(
                "Unsupported file format: .{ext}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Gltf => "glTF",
            InputFormat::Glb => "GLB",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run the full ingestion stage.
pub fn ingest(config: &PipelineConfig) -> Result<IngestionResult> {
    if !config.input.exists() {
        return Err(AtlasBakerError::Input(format!(
            "Input file not found: {}",
            config.input.display()
        )));
    }

    let format = InputFormat::from_path(&config.input)?;
    info!(format = %format, path = %config.input.display(), "Detected input format");

    let scene = gltf_loader::load_scene(&config.input)?;

    let stats = compute_stats(&scene, format);
    debug!(
        objects = stats.objects,
        polygons = stats.polygons,
        materials = stats.materials,
        images = stats.images,
        "Ingestion stats"
    );

    Ok(IngestionResult { scene, stats })
}

/// Compute summary statistics for an ingested scene.
pub fn compute_stats(scene: &Scene, format: InputFormat) -> IngestionStats {
    let mut polygons = 0;
    let mut has_uvs = false;
    for id in scene.object_ids() {
        if let Some(mesh) = scene.object(id).and_then(|o| o.mesh.as_ref()) {
            polygons += mesh.polygons.len();
            has_uvs |= mesh.has_uvs();
        }
    }

    IngestionStats {
        objects: scene.object_count(),
        polygons,
        materials: scene.material_count(),
        images: scene.image_count(),
        has_uvs,
        input_format: format.to_string(),
    }
}
