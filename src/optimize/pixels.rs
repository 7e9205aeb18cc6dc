use std::collections::HashMap;
use std::sync::Arc;

use crate::scene::{ImageId, Scene};

/// Decoded pixels of one source image, shared across tiles and groups.
#[derive(Debug, Clone)]
pub struct SourcePixels {
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<f32>>,
}

impl SourcePixels {
    /// Sample one channel at a pixel coordinate (row 0 at the bottom).
    pub fn channel_at(&self, x: usize, y: usize, channel: usize) -> f32 {
        self.data[(y * self.width as usize + x) * 4 + channel]
    }
}

/// Run-scoped memoization of source-image decodes.
///
/// The same source image is often sampled into several tiles (and several
/// groups), so each image is decoded to floats once per run. The cache is
/// dropped with the run; it is not a persistent cache with eviction.
#[derive(Debug, Default)]
pub struct PixelCache {
    entries: HashMap<ImageId, SourcePixels>,
}

impl PixelCache {
    /// Decode and memoize every listed image that exists in the scene.
    pub fn prime(&mut self, scene: &Scene, ids: impl IntoIterator<Item = ImageId>) {
        for id in ids {
            if self.entries.contains_key(&id) {
                continue;
            }
            let Some(image) = scene.image(id) else {
                continue;
            };
            self.entries.insert(
                id,
                SourcePixels {
                    width: image.width.max(1),
                    height: image.height.max(1),
                    data: Arc::new(image.decoded()),
                },
            );
        }
    }

    pub fn get(&self, id: ImageId) -> Option<&SourcePixels> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
