use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{AtlasBakerError, Result};
use crate::ingestion;
use crate::optimize::{self, AtlasState, OptimizeReport};
use crate::scene::{ImageBuffer, Scene};

/// Summary of a completed pipeline run.
#[derive(Debug)]
pub struct ProcessingResult {
    pub report: OptimizeReport,
    pub atlases_written: usize,
    pub duration: Duration,
}

/// Pipeline orchestrator -- ingest, optimize, write, clean up.
pub struct Pipeline;

impl Pipeline {
    /// Run the full pipeline.
    pub fn run(config: &PipelineConfig) -> Result<ProcessingResult> {
        let start = Instant::now();

        info!(input = %config.input.display(), "Starting pipeline");

        let ingestion = ingestion::ingest(config)?;
        let mut scene = ingestion.scene;
        let export_objects = scene.object_ids();

        if config.dry_run {
            info!("--dry-run: analyzing materials and planning groups");
            let report = optimize::plan(&scene, &export_objects, &config.atlas);
            print_report(&report);
            return Ok(ProcessingResult {
                report,
                atlases_written: 0,
                duration: start.elapsed(),
            });
        }

        info!("Stage 1/3: Atlas optimization");
        let (mut state, report) = optimize::run(&mut scene, &export_objects, &config.atlas);

        info!("Stage 2/3: Writing atlas images");
        let atlases_written = write_atlases(&scene, &state, &config.output)?;

        if let Some(path) = &config.report_json {
            write_report_json(&report, path)?;
        }

        info!("Stage 3/3: Cleanup");
        state.cleanup(&mut scene);

        print_report(&report);

        let duration = start.elapsed();
        info!(atlases = atlases_written, elapsed = ?duration, "Pipeline complete");

        Ok(ProcessingResult {
            report,
            atlases_written,
            duration,
        })
    }
}

/// Write every atlas page the run created as a PNG in `out_dir`.
fn write_atlases(scene: &Scene, state: &AtlasState, out_dir: &Path) -> Result<usize> {
    fs::create_dir_all(out_dir)?;

    let mut written = 0;
    for &image_id in &state.created_images {
        let Some(image) = scene.image(image_id) else {
            continue;
        };
        let path = out_dir.join(format!("{}.png", image.name));
        let rgba = to_rgba8_image(image);
        rgba.save(&path).map_err(|e| {
            AtlasBakerError::Output(format!("Failed to write {}: {e}", path.display()))
        })?;
        written += 1;
    }
    Ok(written)
}

/// Quantize a float image to 8-bit and flip rows back to the top-down
/// order image files use.
fn to_rgba8_image(image: &ImageBuffer) -> RgbaImage {
    let pixels = image.decoded();
    let (w, h) = (image.width, image.height);
    let mut out = RgbaImage::new(w, h);
    for y in 0..h {
        let src_row = ((h - 1 - y) * w) as usize;
        for x in 0..w {
            let i = (src_row + x as usize) * 4;
            out.put_pixel(
                x,
                y,
                Rgba([
                    quantize(pixels[i]),
                    quantize(pixels[i + 1]),
                    quantize(pixels[i + 2]),
                    quantize(pixels[i + 3]),
                ]),
            );
        }
    }
    out
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn write_report_json(report: &OptimizeReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| AtlasBakerError::Output(format!("Failed to serialize report: {e}")))?;
    fs::write(path, json)?;
    Ok(())
}

/// Print the human-readable report summary.
fn print_report(report: &OptimizeReport) {
    println!("=== Atlas Report ===");
    println!("  Candidates:     {}", report.candidate_materials);
    println!("  Quartets:       {}", report.merged_quartets);
    println!("  Pairs:          {}", report.merged_pairs);
    println!("  Leftover:       {}", report.leftover_materials);
    println!("  Draw calls saved (est.): {}", report.drawcall_reduction_estimate);
    println!("  Resized to 512: {}", report.resized_textures);
    println!(
        "  Materials:      {} → {}",
        report.before_materials, report.after_materials
    );
    println!(
        "  Textures:       {} → {}",
        report.before_textures, report.after_textures
    );
    if report.warnings.is_empty() {
        println!("  Warnings:       none");
    } else {
        println!("  Warnings:       {}", report.warnings.len());
        for warning in &report.warnings {
            println!("    - {warning}");
        }
    }
}
