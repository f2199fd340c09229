//! Scene-graph primitives and the [`SceneGraph`] capability.
//!
//! The renderer is an external collaborator; this module models only what
//! the optimisation passes need to read and rewrite: geometry size,
//! material texture slots, object placement, and the per-frame cost those
//! produce.

use std::collections::BTreeMap;
use std::fmt;

use scenepulse_types::Vec3;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Handle for a top-level object in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Geometry, textures, materials
// ─────────────────────────────────────────────────────────────────────────────

/// A non-indexed triangle list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFilter {
    Nearest,
    Linear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub anisotropy: u16,
    pub generate_mipmaps: bool,
}

impl Texture {
    /// An RGBA8 texture with renderer defaults (trilinear, no anisotropy).
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            min_filter: TextureFilter::LinearMipmapLinear,
            mag_filter: TextureFilter::Linear,
            anisotropy: 1,
            generate_mipmaps: true,
        }
    }

    /// Approximate GPU footprint in bytes, mip chain included.
    pub fn byte_size(&self) -> u64 {
        let base = u64::from(self.width) * u64::from(self.height) * 4;
        if self.generate_mipmaps {
            base * 4 / 3
        } else {
            base
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// `0xRRGGBB`.
    pub color: u32,
    pub roughness: f32,
    pub metalness: f32,
    pub map: Option<Texture>,
    pub normal_map: Option<Texture>,
    pub roughness_map: Option<Texture>,
    pub ao_map: Option<Texture>,
    pub light_map: Option<Texture>,
    pub emissive_map: Option<Texture>,
    /// Bumped whenever the renderer must re-upload the material.
    pub version: u32,
}

impl Material {
    pub fn new(name: impl Into<String>, color: u32) -> Self {
        Self {
            name: name.into(),
            color,
            roughness: 0.5,
            metalness: 0.0,
            map: None,
            normal_map: None,
            roughness_map: None,
            ao_map: None,
            light_map: None,
            emissive_map: None,
            version: 0,
        }
    }

    pub fn mark_needs_update(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Every texture slot currently populated.
    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        [
            &self.map,
            &self.normal_map,
            &self.roughness_map,
            &self.ao_map,
            &self.light_map,
            &self.emissive_map,
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: Material,
}

/// A renderable object made of one or more meshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub position: Vec3,
    /// Rotation about the vertical axis, radians.
    pub rotation_y: f32,
    pub scale: f32,
    pub meshes: Vec<Mesh>,
}

impl Model {
    pub fn new(name: impl Into<String>, position: Vec3, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.into(),
            position,
            rotation_y: 0.0,
            scale: 1.0,
            meshes,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.geometry.vertex_count()).sum()
    }

    fn cost(&self) -> FrameCost {
        FrameCost {
            draw_calls: self.meshes.len() as u64,
            triangles: self
                .meshes
                .iter()
                .map(|m| m.geometry.triangle_count() as u64)
                .sum(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Level-of-detail objects
// ─────────────────────────────────────────────────────────────────────────────

/// One generated resolution variant of a [`LodObject`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodVariant {
    /// Camera distance from which this variant applies.
    pub distance: f32,
    pub model: Model,
}

/// A distance-switched multi-resolution object.
///
/// `variants` is never empty and `active` always indexes into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodObject {
    pub name: String,
    pub position: Vec3,
    pub(crate) variants: Vec<LodVariant>,
    pub(crate) active: usize,
}

impl LodObject {
    pub fn variants(&self) -> &[LodVariant] {
        &self.variants
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_model(&self) -> &Model {
        &self.variants[self.active].model
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scene objects
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneObject {
    Model(Model),
    Lod(LodObject),
}

impl SceneObject {
    pub fn name(&self) -> &str {
        match self {
            SceneObject::Model(m) => &m.name,
            SceneObject::Lod(l) => &l.name,
        }
    }

    pub fn position(&self) -> Vec3 {
        match self {
            SceneObject::Model(m) => m.position,
            SceneObject::Lod(l) => l.position,
        }
    }

    /// Visit every material, across all LOD variants.
    pub fn for_each_material_mut(&mut self, mut f: impl FnMut(&mut Material)) {
        let models: Vec<&mut Model> = match self {
            SceneObject::Model(m) => vec![m],
            SceneObject::Lod(l) => l.variants.iter_mut().map(|v| &mut v.model).collect(),
        };
        for model in models {
            for mesh in &mut model.meshes {
                f(&mut mesh.material);
            }
        }
    }

    /// What this object costs to draw this frame.
    pub fn frame_cost(&self) -> FrameCost {
        match self {
            SceneObject::Model(m) => m.cost(),
            SceneObject::Lod(l) => l.active_model().cost(),
        }
    }
}

/// Draw calls and triangles submitted for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameCost {
    pub draw_calls: u64,
    pub triangles: u64,
}

impl std::ops::Add for FrameCost {
    type Output = FrameCost;

    fn add(self, rhs: FrameCost) -> FrameCost {
        FrameCost {
            draw_calls: self.draw_calls + rhs.draw_calls,
            triangles: self.triangles + rhs.triangles,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SceneGraph capability
// ─────────────────────────────────────────────────────────────────────────────

/// Mutation primitives the optimisation passes rely on.
pub trait SceneGraph {
    fn add(&mut self, object: SceneObject) -> NodeId;
    fn remove(&mut self, id: NodeId) -> Option<SceneObject>;
    fn get(&self, id: NodeId) -> Option<&SceneObject>;
    fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneObject>;
    /// Top-level object ids in insertion order.
    fn ids(&self) -> Vec<NodeId>;
}

/// In-memory scene keyed by monotonically increasing [`NodeId`]s.
#[derive(Debug, Default)]
pub struct Scene {
    next_id: u64,
    objects: BTreeMap<NodeId, SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Plain (not yet LOD-converted) models, in insertion order.
    pub fn top_level_models(&self) -> Vec<NodeId> {
        self.objects
            .iter()
            .filter(|(_, obj)| matches!(obj, SceneObject::Model(_)))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut SceneObject)> {
        self.objects.iter_mut().map(|(id, obj)| (*id, obj))
    }

    /// Total draw cost of the scene as currently configured.
    pub fn frame_cost(&self) -> FrameCost {
        self.objects
            .values()
            .map(SceneObject::frame_cost)
            .fold(FrameCost::default(), |acc, c| acc + c)
    }
}

impl SceneGraph for Scene {
    fn add(&mut self, object: SceneObject) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.objects.insert(id, object);
        id
    }

    fn remove(&mut self, id: NodeId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    fn get(&self, id: NodeId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    fn ids(&self) -> Vec<NodeId> {
        self.objects.keys().copied().collect()
    }
}

/// Simple test and demo content.
pub mod fixtures {
    use super::*;

    /// A flat grid of `triangles` triangles.
    pub fn triangle_soup(triangles: usize) -> Geometry {
        let positions = (0..triangles)
            .flat_map(|i| {
                let x = i as f32;
                [
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::new(x + 1.0, 0.0, 0.0),
                    Vec3::new(x, 1.0, 0.0),
                ]
            })
            .collect();
        Geometry::new(positions)
    }

    /// A textured single-mesh model with every auxiliary map populated.
    pub fn detailed_model(name: &str, position: Vec3, triangles: usize) -> Model {
        let mut material = Material::new(format!("{name}-material"), 0xffffff);
        material.map = Some(Texture::new("albedo", 2048, 2048));
        material.normal_map = Some(Texture::new("normal", 2048, 2048));
        material.roughness_map = Some(Texture::new("roughness", 1024, 1024));
        material.ao_map = Some(Texture::new("ao", 1024, 1024));
        material.light_map = Some(Texture::new("light", 512, 512));
        material.emissive_map = Some(Texture::new("emissive", 512, 512));
        if let Some(map) = material.map.as_mut() {
            map.anisotropy = 16;
        }
        Model::new(
            name,
            position,
            vec![Mesh {
                geometry: triangle_soup(triangles),
                material,
            }],
        )
    }
}
