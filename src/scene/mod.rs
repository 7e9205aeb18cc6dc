pub mod image;
pub mod mesh;
pub mod shader;

use std::collections::HashMap;

pub use self::image::{ColorSpace, ImageBuffer, PixelData, linear_to_srgb, srgb_to_linear};
pub use mesh::{MeshData, Polygon, UvLayer};
pub use shader::{
    BlendMode, Link, Material, MixBlend, Node, NodeGraph, NodeId, NodeKind, Socket, SocketValue,
};

/// Handle to an object slot in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

/// Handle to a material slot in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(usize);

/// Handle to an image slot in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(usize);

/// A named scene object. Non-mesh objects (cameras, lights, empties) carry
/// no mesh data and pass through the optimizer untouched.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub parent: Option<ObjectId>,
    pub mesh: Option<MeshData>,
}

/// The scene arena: every object, material, and image in scope, addressed
/// by copyable ids.
///
/// Removal tombstones the slot so ids stay stable and a second removal of
/// the same id is a no-op; that property is what makes end-of-run cleanup
/// idempotent.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<Option<SceneObject>>,
    materials: Vec<Option<Material>>,
    images: Vec<Option<ImageBuffer>>,
}

impl Scene {
    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        self.objects.push(Some(object));
        ObjectId(self.objects.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(Some(material));
        MaterialId(self.materials.len() - 1)
    }

    pub fn add_image(&mut self, image: ImageBuffer) -> ImageId {
        self.images.push(Some(image));
        ImageId(self.images.len() - 1)
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageBuffer> {
        self.images.get(id.0).and_then(|s| s.as_ref())
    }

    pub fn image_mut(&mut self, id: ImageId) -> Option<&mut ImageBuffer> {
        self.images.get_mut(id.0).and_then(|s| s.as_mut())
    }

    pub fn remove_object(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.get_mut(id.0).and_then(|s| s.take())
    }

    pub fn remove_material(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.get_mut(id.0).and_then(|s| s.take())
    }

    pub fn remove_image(&mut self, id: ImageId) -> Option<ImageBuffer> {
        self.images.get_mut(id.0).and_then(|s| s.take())
    }

    /// Ids of all live objects, in insertion order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| ObjectId(i))
            .collect()
    }

    /// Ids of all live materials, in insertion order.
    pub fn material_ids(&self) -> Vec<MaterialId> {
        self.materials
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| MaterialId(i))
            .collect()
    }

    /// Ids of all live images, in insertion order.
    pub fn image_ids(&self) -> Vec<ImageId> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| ImageId(i))
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.iter().filter(|s| s.is_some()).count()
    }

    pub fn material_count(&self) -> usize {
        self.materials.iter().filter(|s| s.is_some()).count()
    }

    pub fn image_count(&self) -> usize {
        self.images.iter().filter(|s| s.is_some()).count()
    }

    /// Deep-copy a set of objects (and their mesh data) into new slots.
    ///
    /// Materials and images are shared, not copied. Parent links between
    /// members of the set are remapped to the new copies; parents outside
    /// the set are dropped, since the copy is exported as a standalone
    /// group.
    pub fn duplicate_objects(&mut self, ids: &[ObjectId]) -> Vec<ObjectId> {
        let mut mapping: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut duplicated = Vec::with_capacity(ids.len());

        for &id in ids {
            let Some(original) = self.object(id) else {
                continue;
            };
            let copy = SceneObject {
                name: format!("{}.export", original.name),
                parent: original.parent,
                mesh: original.mesh.clone(),
            };
            let new_id = self.add_object(copy);
            mapping.insert(id, new_id);
            duplicated.push(new_id);
        }

        for &new_id in mapping.values() {
            if let Some(obj) = self.object_mut(new_id) {
                obj.parent = obj.parent.and_then(|p| mapping.get(&p).copied());
            }
        }

        duplicated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_object(name: &str) -> SceneObject {
        SceneObject {
            name: name.into(),
            parent: None,
            mesh: Some(MeshData::default()),
        }
    }

    #[test]
    fn add_and_lookup() {
        let mut scene = Scene::default();
        let id = scene.add_object(mesh_object("cube"));
        assert_eq!(scene.object(id).unwrap().name, "cube");
        assert_eq!(scene.object_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut scene = Scene::default();
        let id = scene.add_object(mesh_object("cube"));
        assert!(scene.remove_object(id).is_some());
        assert!(scene.remove_object(id).is_none());
        assert!(scene.object(id).is_none());
        assert_eq!(scene.object_count(), 0);
    }

    #[test]
    fn ids_stay_stable_after_removal() {
        let mut scene = Scene::default();
        let a = scene.add_object(mesh_object("a"));
        let b = scene.add_object(mesh_object("b"));
        scene.remove_object(a);
        assert_eq!(scene.object(b).unwrap().name, "b");
        assert_eq!(scene.object_ids(), vec![b]);
    }

    #[test]
    fn duplicate_copies_mesh_data() {
        let mut scene = Scene::default();
        let mut mesh = MeshData::default();
        mesh.loop_count = 4;
        mesh.add_uv_layer("UVMap");
        let id = scene.add_object(SceneObject {
            name: "plane".into(),
            parent: None,
            mesh: Some(mesh),
        });

        let copies = scene.duplicate_objects(&[id]);
        assert_eq!(copies.len(), 1);
        let copy = scene.object(copies[0]).unwrap();
        assert_eq!(copy.name, "plane.export");

        // Mutating the copy's UVs must not touch the original.
        let copy_id = copies[0];
        scene
            .object_mut(copy_id)
            .unwrap()
            .mesh
            .as_mut()
            .unwrap()
            .uv_layers[0]
            .data[0] = 9.0;
        let original = scene.object(id).unwrap().mesh.as_ref().unwrap();
        assert_eq!(original.uv_layers[0].data[0], 0.0);
    }

    #[test]
    fn duplicate_remaps_parents_within_set() {
        let mut scene = Scene::default();
        let parent = scene.add_object(mesh_object("parent"));
        let mut child = mesh_object("child");
        child.parent = Some(parent);
        let child = scene.add_object(child);

        let copies = scene.duplicate_objects(&[parent, child]);
        let child_copy = scene.object(copies[1]).unwrap();
        assert_eq!(child_copy.parent, Some(copies[0]));
    }

    #[test]
    fn duplicate_drops_parents_outside_set() {
        let mut scene = Scene::default();
        let parent = scene.add_object(mesh_object("parent"));
        let mut child = mesh_object("child");
        child.parent = Some(parent);
        let child = scene.add_object(child);

        let copies = scene.duplicate_objects(&[child]);
        assert_eq!(scene.object(copies[0]).unwrap().parent, None);
    }
}
