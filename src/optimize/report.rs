use serde::Serialize;

/// Structured result of one optimizer run, the sole channel for surfacing
/// both successes and degradations.
///
/// Rejected materials and skipped groups land in `warnings`; they never
/// abort a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizeReport {
    /// Materials that passed analysis and were eligible for grouping.
    pub candidate_materials: usize,
    /// Groups of four merged into a 1024x1024 atlas.
    pub merged_quartets: usize,
    /// Groups of two merged into a 512x1024 atlas.
    pub merged_pairs: usize,
    /// Candidates left unmerged (bucket remainders and failed groups).
    pub leftover_materials: usize,
    /// Net material-switch reduction: 3 per quartet, 1 per pair.
    pub drawcall_reduction_estimate: usize,
    /// Source textures whose dimensions differed from the tile size.
    pub resized_textures: usize,
    pub before_materials: usize,
    pub before_textures: usize,
    pub after_materials: usize,
    pub after_textures: usize,
    pub warnings: Vec<String>,
}

impl OptimizeReport {
    /// Number of source materials consumed by merged groups.
    pub fn merged_material_count(&self) -> usize {
        self.merged_quartets * 4 + self.merged_pairs * 2
    }
}
