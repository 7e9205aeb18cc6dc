use std::collections::BTreeMap;

use tracing::debug;

use crate::optimize::analyzer::{CompatKey, MaterialAnalysis};
use crate::optimize::layout::{LAYOUT_PAIR, LAYOUT_QUAD, TileLayout};

/// A set of 2 or 4 compatible materials bound for one atlas page.
#[derive(Debug, Clone)]
pub struct AtlasGroup {
    pub items: Vec<MaterialAnalysis>,
    pub layout: &'static TileLayout,
}

/// Partition analyses by compatibility key and pack each bucket greedily:
/// as many quartets as possible, then pairs from the remainder. A leftover
/// of 0 or 1 stays unmerged.
///
/// Buckets are visited in key order and consumed in material-name order,
/// so the same scene always produces the same groups.
pub fn build_groups(analyses: Vec<MaterialAnalysis>) -> Vec<AtlasGroup> {
    let mut buckets: BTreeMap<CompatKey, Vec<MaterialAnalysis>> = BTreeMap::new();
    for analysis in analyses {
        buckets.entry(analysis.key).or_default().push(analysis);
    }

    let mut groups = Vec::new();
    for (key, mut bucket) in buckets {
        bucket.sort_by(|a, b| a.material_name.cmp(&b.material_name));

        let leftover_preview = bucket.len() % 4 % 2;
        debug!(
            blend = %key.blend,
            uses_alpha = key.uses_alpha,
            materials = bucket.len(),
            leftover = leftover_preview,
            "Packing compatibility bucket"
        );

        while bucket.len() >= 4 {
            let items: Vec<MaterialAnalysis> = bucket.drain(..4).collect();
            groups.push(AtlasGroup {
                items,
                layout: &LAYOUT_QUAD,
            });
        }
        while bucket.len() >= 2 {
            let items: Vec<MaterialAnalysis> = bucket.drain(..2).collect();
            groups.push(AtlasGroup {
                items,
                layout: &LAYOUT_PAIR,
            });
        }
    }

    groups
}
