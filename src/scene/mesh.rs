use std::collections::BTreeSet;

use crate::scene::MaterialId;

/// One face: a material slot index plus the loop (face-corner) indices
/// that carry its per-corner UV data.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub material_index: usize,
    pub loop_indices: Vec<u32>,
}

/// A named per-loop UV channel. `data` is flat `[u0, v0, u1, v1, ...]`
/// with one pair per loop.
#[derive(Debug, Clone)]
pub struct UvLayer {
    pub name: String,
    pub data: Vec<f32>,
    pub active_render: bool,
}

/// Mesh data as the optimizer sees it: polygons, material slots, and UV
/// layers. Vertex positions stay with the host; only texture coordinates
/// and slot assignments are ever rewritten.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub polygons: Vec<Polygon>,
    pub loop_count: usize,
    pub uv_layers: Vec<UvLayer>,
    pub active_uv: Option<usize>,
    pub material_slots: Vec<Option<MaterialId>>,
}

impl MeshData {
    /// Slot indices referenced by at least one polygon, in ascending order.
    pub fn used_slot_indices(&self) -> BTreeSet<usize> {
        self.polygons.iter().map(|p| p.material_index).collect()
    }

    /// The UV layer a renderer would sample: the render-active layer if one
    /// is flagged, else the active layer, else the first.
    pub fn source_uv_layer_index(&self) -> Option<usize> {
        if self.uv_layers.is_empty() {
            return None;
        }
        if let Some(idx) = self.uv_layers.iter().position(|l| l.active_render) {
            return Some(idx);
        }
        if let Some(idx) = self.active_uv {
            if idx < self.uv_layers.len() {
                return Some(idx);
            }
        }
        Some(0)
    }

    /// Index of the UV layer with the given name.
    pub fn uv_layer_index(&self, name: &str) -> Option<usize> {
        self.uv_layers.iter().position(|l| l.name == name)
    }

    /// Append a zero-filled UV layer sized for this mesh and return its index.
    pub fn add_uv_layer(&mut self, name: impl Into<String>) -> usize {
        self.uv_layers.push(UvLayer {
            name: name.into(),
            data: vec![0.0; self.loop_count * 2],
            active_render: false,
        });
        self.uv_layers.len() - 1
    }

    /// Write flat UV data into a layer, padding or truncating to the mesh's
    /// loop count so a short buffer can never leave stale coordinates.
    pub fn write_uv_layer(&mut self, index: usize, mut data: Vec<f32>) {
        let target = self.loop_count * 2;
        data.resize(target, 0.0);
        self.uv_layers[index].data = data;
    }

    pub fn has_uvs(&self) -> bool {
        !self.uv_layers.is_empty()
    }
}
