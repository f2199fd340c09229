//! `scenepulse-scene` – scene capability and the adaptive rendering passes.
//!
//! # Modules
//!
//! - [`graph`] – geometry, textures, materials, models, [`LodObject`]s and
//!   the [`SceneGraph`] mutation capability with its in-memory [`Scene`].
//! - [`simplify`] – the [`MeshSimplifier`] capability and a uniform
//!   triangle decimator.
//! - [`lod`] – [`LodManager`]: model-to-LOD conversion and per-frame level
//!   selection.
//! - [`optimizer`] – [`ResourceOptimizer`]: material filtering / anisotropy
//!   clamping and auxiliary map release, plus texture downscaling.

pub mod graph;
pub mod lod;
pub mod optimizer;
pub mod simplify;

pub use graph::{
    FrameCost, Geometry, LodObject, LodVariant, Material, Mesh, Model, NodeId, Scene, SceneGraph,
    SceneObject, Texture, TextureFilter,
};
pub use lod::{LodConfig, LodLevel, LodManager, select_level, validate_levels};
pub use optimizer::{MaterialOptimization, ResourceOptimizer, downscale_texture};
pub use simplify::{MeshSimplifier, UniformDecimator};
