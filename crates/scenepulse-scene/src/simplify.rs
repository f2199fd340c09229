//! Mesh simplification capability.
//!
//! The LOD manager only needs "reduce this geometry to roughly N vertices";
//! how that happens is up to the [`MeshSimplifier`] implementation.
//! [`UniformDecimator`] keeps an evenly spaced subset of whole triangles,
//! which is cheap and deterministic but makes no attempt to preserve shape.

use scenepulse_types::PulseError;

use crate::graph::Geometry;

pub trait MeshSimplifier {
    /// Return a copy of `geometry` with approximately `target_vertices`
    /// vertices. Never returns more vertices than the input.
    fn simplify(&self, geometry: &Geometry, target_vertices: usize) -> Result<Geometry, PulseError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UniformDecimator;

impl MeshSimplifier for UniformDecimator {
    fn simplify(&self, geometry: &Geometry, target_vertices: usize) -> Result<Geometry, PulseError> {
        if geometry.vertex_count() % 3 != 0 {
            return Err(PulseError::Simplification(format!(
                "{} vertices is not a triangle list",
                geometry.vertex_count()
            )));
        }
        let triangles = geometry.triangle_count();
        if triangles == 0 || target_vertices >= geometry.vertex_count() {
            return Ok(geometry.clone());
        }

        // Keep at least one triangle so the object stays visible.
        let keep = (target_vertices / 3).clamp(1, triangles);
        let positions = (0..keep)
            .map(|i| i * triangles / keep)
            .flat_map(|t| geometry.positions[t * 3..t * 3 + 3].iter().copied())
            .collect();
        Ok(Geometry::new(positions))
    }
}
