//! [`LodManager`] – distance-switched level-of-detail conversion.
//!
//! # Conversion
//!
//! [`LodManager::create_lod_from_model`] takes a plain model already in the
//! scene and a list of `(distance, detail_fraction)` levels sorted by
//! ascending distance. For every level it clones the model and
//!
//! - when `detail_fraction < 1`, simplifies each mesh to
//!   `floor(vertex_count × detail_fraction)` vertices;
//! - when `distance > material_strip_distance`, strips the normal and
//!   roughness maps and flattens roughness / metalness to `1.0` / `0.0`.
//!
//! All variants are built before the scene is touched, so a failure leaves
//! the original model in place. On success the original is removed and a
//! [`LodObject`] takes its place at the same position.
//!
//! # Selection
//!
//! Each frame [`LodManager::update`] activates, per managed object, the
//! coarsest level whose threshold is ≤ the camera distance, falling back to
//! level 0.
//!
//! ```rust
//! use scenepulse_scene::lod::{LodLevel, select_level};
//!
//! let levels = LodLevel::default_levels();
//! assert_eq!(select_level(&levels, 5.0), 0);
//! assert_eq!(select_level(&levels, 15.0), 1);
//! assert_eq!(select_level(&levels, 1000.0), 2);
//! ```

use scenepulse_types::{PulseError, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::graph::{LodObject, LodVariant, Material, Model, NodeId, SceneGraph, SceneObject};
use crate::simplify::MeshSimplifier;

/// One requested level: applies from `distance` onward, keeping
/// `detail_fraction` of the original vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub distance: f32,
    pub detail_fraction: f32,
}

impl LodLevel {
    pub const fn new(distance: f32, detail_fraction: f32) -> Self {
        Self {
            distance,
            detail_fraction,
        }
    }

    /// `[(0, 1.0), (10, 0.5), (30, 0.25)]`
    pub fn default_levels() -> Vec<LodLevel> {
        vec![
            LodLevel::new(0.0, 1.0),
            LodLevel::new(10.0, 0.5),
            LodLevel::new(30.0, 0.25),
        ]
    }
}

/// Anything that carries a switch distance.
pub trait DistanceThreshold {
    fn threshold(&self) -> f32;
}

impl DistanceThreshold for LodLevel {
    fn threshold(&self) -> f32 {
        self.distance
    }
}

impl DistanceThreshold for LodVariant {
    fn threshold(&self) -> f32 {
        self.distance
    }
}

/// Index of the coarsest level whose threshold is ≤ `distance`, or 0.
pub fn select_level<T: DistanceThreshold>(levels: &[T], distance: f32) -> usize {
    levels
        .iter()
        .rposition(|level| level.threshold() <= distance)
        .unwrap_or(0)
}

/// Check that `levels` is non-empty, strictly ascending by distance, and
/// that every fraction lies in `(0, 1]`.
pub fn validate_levels(levels: &[LodLevel]) -> Result<(), PulseError> {
    if levels.is_empty() {
        return Err(PulseError::InvalidLodLevels("no levels given".to_string()));
    }
    for (i, level) in levels.iter().enumerate() {
        if !level.distance.is_finite() || level.distance < 0.0 {
            return Err(PulseError::InvalidLodLevels(format!(
                "level {i}: distance {} must be finite and non-negative",
                level.distance
            )));
        }
        if !(level.detail_fraction > 0.0 && level.detail_fraction <= 1.0) {
            return Err(PulseError::InvalidLodLevels(format!(
                "level {i}: detail fraction {} outside (0, 1]",
                level.detail_fraction
            )));
        }
    }
    if let Some(pair) = levels.windows(2).find(|w| w[1].distance <= w[0].distance) {
        return Err(PulseError::InvalidLodLevels(format!(
            "distances must ascend, got {} then {}",
            pair[0].distance, pair[1].distance
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct LodConfig {
    /// Levels beyond this distance also get their detail maps stripped.
    pub material_strip_distance: f32,
    pub default_levels: Vec<LodLevel>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            material_strip_distance: 10.0,
            default_levels: LodLevel::default_levels(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LodManager
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LodManager {
    config: LodConfig,
    managed: Vec<NodeId>,
}

impl LodManager {
    pub fn new(config: LodConfig) -> Self {
        Self {
            config,
            managed: Vec::new(),
        }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Ids of the LOD objects created by this manager still being tracked.
    pub fn managed(&self) -> &[NodeId] {
        &self.managed
    }

    /// Convert the model `id` into a [`LodObject`] and return the new id.
    pub fn create_lod_from_model<S>(
        &mut self,
        scene: &mut S,
        simplifier: &dyn MeshSimplifier,
        id: NodeId,
        levels: &[LodLevel],
    ) -> Result<NodeId, PulseError>
    where
        S: SceneGraph + ?Sized,
    {
        validate_levels(levels)?;
        let source = match scene.get(id) {
            Some(SceneObject::Model(model)) => model,
            Some(SceneObject::Lod(_)) => return Err(PulseError::AlreadyLod(id.0)),
            None => return Err(PulseError::ObjectNotFound(id.0)),
        };

        let variants = levels
            .iter()
            .map(|level| {
                Ok(LodVariant {
                    distance: level.distance,
                    model: self.build_variant(source, simplifier, level)?,
                })
            })
            .collect::<Result<Vec<_>, PulseError>>()?;

        let lod = LodObject {
            name: source.name.clone(),
            position: source.position,
            variants,
            active: 0,
        };

        scene.remove(id);
        let lod_id = scene.add(SceneObject::Lod(lod));
        self.managed.push(lod_id);
        info!(
            source = %id,
            lod = %lod_id,
            levels = levels.len(),
            "model converted to level-of-detail"
        );
        Ok(lod_id)
    }

    fn build_variant(
        &self,
        source: &Model,
        simplifier: &dyn MeshSimplifier,
        level: &LodLevel,
    ) -> Result<Model, PulseError> {
        let mut model = source.clone();
        for mesh in &mut model.meshes {
            if level.detail_fraction < 1.0 {
                let target =
                    (mesh.geometry.vertex_count() as f64 * f64::from(level.detail_fraction)).floor()
                        as usize;
                mesh.geometry = simplifier.simplify(&mesh.geometry, target)?;
            }
            if level.distance > self.config.material_strip_distance {
                strip_detail_maps(&mut mesh.material);
            }
        }
        Ok(model)
    }

    /// Sync every managed object's active level to the camera distance.
    ///
    /// Returns how many objects switched level. Objects removed from the
    /// scene are forgotten.
    pub fn update<S>(&mut self, scene: &mut S, camera: Vec3) -> usize
    where
        S: SceneGraph + ?Sized,
    {
        self.managed
            .retain(|id| matches!(scene.get(*id), Some(SceneObject::Lod(_))));

        let mut switched = 0;
        for id in &self.managed {
            let Some(SceneObject::Lod(lod)) = scene.get_mut(*id) else {
                continue;
            };
            let level = select_level(&lod.variants, camera.distance(lod.position));
            if level != lod.active {
                debug!(object = %id, from = lod.active, to = level, "lod level switched");
                lod.active = level;
                switched += 1;
            }
        }
        switched
    }
}

/// Drop normal / roughness maps and flatten the PBR response.
fn strip_detail_maps(material: &mut Material) {
    material.normal_map = None;
    material.roughness_map = None;
    material.roughness = 1.0;
    material.metalness = 0.0;
    material.mark_needs_update();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Scene;
    use crate::graph::fixtures::detailed_model;
    use crate::simplify::UniformDecimator;
    use scenepulse_types::Vec3;

    struct FailingSimplifier;

    impl MeshSimplifier for FailingSimplifier {
        fn simplify(
            &self,
            _geometry: &crate::graph::Geometry,
            _target: usize,
        ) -> Result<crate::graph::Geometry, PulseError> {
            Err(PulseError::Simplification("boom".to_string()))
        }
    }

    fn scene_with_model(triangles: usize) -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let id = scene.add(SceneObject::Model(detailed_model(
            "statue",
            Vec3::new(0.0, 0.0, 0.0),
            triangles,
        )));
        (scene, id)
    }

    fn lod<'a>(scene: &'a Scene, id: NodeId) -> &'a LodObject {
        match scene.get(id) {
            Some(SceneObject::Lod(lod)) => lod,
            other => panic!("expected lod object, got {other:?}"),
        }
    }

    #[test]
    fn level_selection_matches_distance_bands() {
        let levels = LodLevel::default_levels();
        assert_eq!(select_level(&levels, 0.0), 0);
        assert_eq!(select_level(&levels, 5.0), 0);
        assert_eq!(select_level(&levels, 10.0), 1);
        assert_eq!(select_level(&levels, 15.0), 1);
        assert_eq!(select_level(&levels, 1000.0), 2);
        assert_eq!(select_level(&levels, f32::NAN), 0);
    }

    #[test]
    fn conversion_replaces_original_and_builds_every_level() {
        let (mut scene, id) = scene_with_model(100);
        let mut manager = LodManager::new(LodConfig::default());

        let lod_id = manager
            .create_lod_from_model(&mut scene, &UniformDecimator, id, &LodLevel::default_levels())
            .unwrap();

        assert!(scene.get(id).is_none(), "original must be retired");
        assert_eq!(scene.len(), 1);
        assert_eq!(manager.managed(), &[lod_id]);

        let lod = lod(&scene, lod_id);
        assert_eq!(lod.active(), 0);
        let vertices: Vec<usize> = lod.variants().iter().map(|v| v.model.vertex_count()).collect();
        assert_eq!(vertices, [300, 150, 75]);
    }

    #[test]
    fn distant_levels_lose_detail_maps() {
        let (mut scene, id) = scene_with_model(30);
        let mut manager = LodManager::new(LodConfig::default());
        let lod_id = manager
            .create_lod_from_model(&mut scene, &UniformDecimator, id, &LodLevel::default_levels())
            .unwrap();
        let lod = lod(&scene, lod_id);

        // Level at distance 10 is not beyond the strip distance.
        let near = &lod.variants()[1].model.meshes[0].material;
        assert!(near.normal_map.is_some());

        let far = &lod.variants()[2].model.meshes[0].material;
        assert!(far.normal_map.is_none());
        assert!(far.roughness_map.is_none());
        assert_eq!(far.roughness, 1.0);
        assert_eq!(far.metalness, 0.0);
        // Albedo is kept.
        assert!(far.map.is_some());
    }

    #[test]
    fn failed_simplification_leaves_scene_untouched() {
        let (mut scene, id) = scene_with_model(30);
        let before = scene.get(id).cloned();
        let mut manager = LodManager::new(LodConfig::default());

        let err = manager
            .create_lod_from_model(&mut scene, &FailingSimplifier, id, &LodLevel::default_levels())
            .unwrap_err();

        assert!(matches!(err, PulseError::Simplification(_)));
        assert_eq!(scene.get(id).cloned(), before);
        assert!(manager.managed().is_empty());
    }

    #[test]
    fn invalid_levels_are_rejected() {
        let bad: [&[LodLevel]; 4] = [
            &[],
            &[LodLevel::new(0.0, 0.0)],
            &[LodLevel::new(0.0, 1.5)],
            &[LodLevel::new(10.0, 1.0), LodLevel::new(5.0, 0.5)],
        ];
        for levels in bad {
            assert!(matches!(
                validate_levels(levels),
                Err(PulseError::InvalidLodLevels(_))
            ));
        }
    }

    #[test]
    fn missing_or_converted_objects_are_errors() {
        let (mut scene, id) = scene_with_model(30);
        let mut manager = LodManager::new(LodConfig::default());
        let levels = LodLevel::default_levels();

        assert_eq!(
            manager.create_lod_from_model(&mut scene, &UniformDecimator, NodeId(999), &levels),
            Err(PulseError::ObjectNotFound(999))
        );
        let lod_id = manager
            .create_lod_from_model(&mut scene, &UniformDecimator, id, &levels)
            .unwrap();
        assert_eq!(
            manager.create_lod_from_model(&mut scene, &UniformDecimator, lod_id, &levels),
            Err(PulseError::AlreadyLod(lod_id.0))
        );
    }

    #[test]
    fn update_tracks_camera_and_is_idempotent() {
        let (mut scene, id) = scene_with_model(30);
        let mut manager = LodManager::new(LodConfig::default());
        let lod_id = manager
            .create_lod_from_model(&mut scene, &UniformDecimator, id, &LodLevel::default_levels())
            .unwrap();

        let far = Vec3::new(0.0, 0.0, 40.0);
        assert_eq!(manager.update(&mut scene, far), 1);
        assert_eq!(lod(&scene, lod_id).active(), 2);
        assert_eq!(manager.update(&mut scene, far), 0);
        assert_eq!(lod(&scene, lod_id).active(), 2);

        manager.update(&mut scene, Vec3::new(0.0, 0.0, 12.0));
        assert_eq!(lod(&scene, lod_id).active(), 1);
    }

    #[test]
    fn single_level_is_always_active() {
        let (mut scene, id) = scene_with_model(30);
        let mut manager = LodManager::new(LodConfig::default());
        let lod_id = manager
            .create_lod_from_model(&mut scene, &UniformDecimator, id, &[LodLevel::new(5.0, 1.0)])
            .unwrap();

        for z in [0.0, 5.0, 500.0] {
            manager.update(&mut scene, Vec3::new(0.0, 0.0, z));
            assert_eq!(lod(&scene, lod_id).active(), 0);
        }
    }

    #[test]
    fn removed_objects_are_forgotten() {
        let (mut scene, id) = scene_with_model(30);
        let mut manager = LodManager::new(LodConfig::default());
        let lod_id = manager
            .create_lod_from_model(&mut scene, &UniformDecimator, id, &LodLevel::default_levels())
            .unwrap();
        scene.remove(lod_id);

        assert_eq!(manager.update(&mut scene, Vec3::ZERO), 0);
        assert!(manager.managed().is_empty());
    }
}
