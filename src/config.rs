use std::path::PathBuf;

use clap::Parser;

/// Texture size policy for atlas candidates.
///
/// Conservative mode refuses to touch materials whose textures are larger
/// than one tile, keeping their full resolution; aggressive mode resamples
/// everything down to the tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResizeMode {
    #[value(name = "conservative")]
    Conservative,
    #[value(name = "aggressive")]
    Aggressive,
}

impl std::fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResizeMode::Conservative => write!(f, "conservative"),
            ResizeMode::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Atlas optimizer parameters.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub resize_mode: ResizeMode,
    /// Record per-material rejection reasons in the report warnings.
    /// Group failures are always recorded.
    pub detailed_warnings: bool,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            resize_mode: ResizeMode::Aggressive,
            detailed_warnings: true,
        }
    }
}

/// Fully resolved pipeline configuration (constructed from CLI args).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub atlas: AtlasConfig,
    pub report_json: Option<PathBuf>,
    pub dry_run: bool,
    pub verbose: bool,
    pub threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            atlas: AtlasConfig::default(),
            report_json: None,
            dry_run: false,
            verbose: false,
            threads: None,
        }
    }
}

/// CLI argument definition (clap derive).
#[derive(Parser, Debug)]
#[command(
    name = "atlas-baker",
    about = "PBR material atlas optimizer for glTF scene export",
    version
)]
pub struct CliArgs {
    /// Input file (glTF or GLB)
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output directory for atlas images
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Texture size policy: conservative skips materials above tile size
    #[arg(long, value_enum, default_value = "aggressive")]
    pub resize_mode: ResizeMode,

    /// Omit per-material rejection reasons from the report
    #[arg(long)]
    pub quiet_warnings: bool,

    /// Write the structured report as JSON to this path
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Analyze and plan groups without building atlases
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for PipelineConfig {
    fn from(args: CliArgs) -> Self {
        PipelineConfig {
            input: args.input,
            output: args.output,
            atlas: AtlasConfig {
                resize_mode: args.resize_mode,
                detailed_warnings: !args.quiet_warnings,
            },
            report_json: args.report_json,
            dry_run: args.dry_run,
            verbose: args.verbose,
            threads: args.threads,
        }
    }
}
