use tracing::debug;

use crate::scene::{ImageId, MaterialId, ObjectId, Scene};

/// Bookkeeping for everything one optimizer run creates: duplicated
/// objects, atlas images, and atlas materials.
///
/// The caller exports the duplicated set, then calls [`cleanup`] exactly
/// once on every exit path. Cleanup is safe to call again and safe on
/// partially created state, since scene removal of a dead id is a no-op.
///
/// [`cleanup`]: AtlasState::cleanup
#[derive(Debug, Default)]
pub struct AtlasState {
    pub temp_objects: Vec<ObjectId>,
    pub created_images: Vec<ImageId>,
    pub created_materials: Vec<MaterialId>,
    cleaned: bool,
}

impl AtlasState {
    /// Release everything this run created. Objects go first so the atlas
    /// materials and images they reference are unreferenced when removed.
    pub fn cleanup(&mut self, scene: &mut Scene) {
        if self.cleaned {
            return;
        }
        for &id in &self.temp_objects {
            scene.remove_object(id);
        }
        for &id in &self.created_materials {
            scene.remove_material(id);
        }
        for &id in &self.created_images {
            scene.remove_image(id);
        }
        debug!(
            objects = self.temp_objects.len(),
            materials = self.created_materials.len(),
            images = self.created_images.len(),
            "Released temporary atlas resources"
        );
        self.cleaned = true;
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }
}
