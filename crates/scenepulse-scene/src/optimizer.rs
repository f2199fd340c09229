//! [`ResourceOptimizer`] – in-place material cost reduction.
//!
//! Works only on the materials it is handed; walking the scene is the
//! caller's job.

use tracing::debug;

use crate::graph::{Material, Texture, TextureFilter};

/// Longest texture side kept by [`downscale_texture`] by default.
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 1024;

/// What a single [`ResourceOptimizer::optimize_material`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaterialOptimization {
    pub changed: bool,
    pub removed_maps: usize,
    /// Approximate texture memory released by dropping auxiliary maps.
    pub freed_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOptimizer {
    pub min_filter: TextureFilter,
    pub max_anisotropy: u16,
}

impl Default for ResourceOptimizer {
    fn default() -> Self {
        Self {
            min_filter: TextureFilter::LinearMipmapLinear,
            max_anisotropy: 4,
        }
    }
}

impl ResourceOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp filtering and anisotropy on the remaining texture slots and
    /// release the ambient-occlusion, light and emissive maps.
    ///
    /// Idempotent: a second call reports `changed == false` and leaves the
    /// material (including its version) untouched.
    pub fn optimize_material(&self, material: &mut Material) -> MaterialOptimization {
        let mut result = MaterialOptimization::default();

        for slot in [
            &mut material.ao_map,
            &mut material.light_map,
            &mut material.emissive_map,
        ] {
            if let Some(texture) = slot.take() {
                result.removed_maps += 1;
                result.freed_bytes += texture.byte_size();
            }
        }

        let mut clamped = false;
        for texture in [
            &mut material.map,
            &mut material.normal_map,
            &mut material.roughness_map,
        ]
        .into_iter()
        .flatten()
        {
            clamped |= self.clamp_sampling(texture);
        }

        result.changed = clamped || result.removed_maps > 0;
        if result.changed {
            material.mark_needs_update();
            debug!(
                material = %material.name,
                removed_maps = result.removed_maps,
                freed_bytes = result.freed_bytes,
                "material optimized"
            );
        }
        result
    }

    fn clamp_sampling(&self, texture: &mut Texture) -> bool {
        let mut changed = false;
        if texture.min_filter != self.min_filter {
            texture.min_filter = self.min_filter;
            changed = true;
        }
        if texture.anisotropy > self.max_anisotropy {
            texture.anisotropy = self.max_anisotropy;
            changed = true;
        }
        changed
    }
}

/// Scale `texture` so its longest side is at most `max_size`, keeping the
/// aspect ratio, and switch it to mipmapped trilinear sampling.
pub fn downscale_texture(texture: &Texture, max_size: u32) -> Texture {
    let max_size = max_size.max(1);
    let longest = texture.width.max(texture.height);
    let (width, height) = if longest > max_size {
        let shrink = |side: u32| {
            let scaled = u64::from(side) * u64::from(max_size) / u64::from(longest);
            (scaled as u32).max(1)
        };
        (shrink(texture.width), shrink(texture.height))
    } else {
        (texture.width, texture.height)
    };

    Texture {
        label: texture.label.clone(),
        width,
        height,
        min_filter: TextureFilter::LinearMipmapLinear,
        mag_filter: TextureFilter::Linear,
        anisotropy: texture.anisotropy,
        generate_mipmaps: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::detailed_model;
    use scenepulse_types::Vec3;

    fn heavy_material() -> Material {
        let mut material = detailed_model("m", Vec3::ZERO, 1).meshes[0].material.clone();
        if let Some(map) = material.map.as_mut() {
            map.min_filter = TextureFilter::Linear;
        }
        material
    }

    #[test]
    fn removes_auxiliary_maps_and_clamps_sampling() {
        let mut material = heavy_material();
        let result = ResourceOptimizer::new().optimize_material(&mut material);

        assert!(result.changed);
        assert_eq!(result.removed_maps, 3);
        assert!(result.freed_bytes > 0);
        assert!(material.ao_map.is_none());
        assert!(material.light_map.is_none());
        assert!(material.emissive_map.is_none());

        let map = material.map.as_ref().unwrap();
        assert_eq!(map.anisotropy, 4);
        assert_eq!(map.min_filter, TextureFilter::LinearMipmapLinear);
        assert!(material.normal_map.is_some());
        assert_eq!(material.version, 1);
    }

    #[test]
    fn second_call_changes_nothing() {
        let optimizer = ResourceOptimizer::new();
        let mut once = heavy_material();
        optimizer.optimize_material(&mut once);

        let mut twice = once.clone();
        let result = optimizer.optimize_material(&mut twice);

        assert_eq!(result, MaterialOptimization::default());
        assert_eq!(twice, once);
    }

    #[test]
    fn low_anisotropy_is_not_raised() {
        let mut material = Material::new("plain", 0);
        let mut map = Texture::new("albedo", 64, 64);
        map.anisotropy = 2;
        material.map = Some(map);

        let result = ResourceOptimizer::new().optimize_material(&mut material);
        assert!(!result.changed);
        assert_eq!(material.map.unwrap().anisotropy, 2);
        assert_eq!(material.version, 0);
    }

    #[test]
    fn downscale_caps_longest_side() {
        let mut tex = Texture::new("big", 4096, 2048);
        tex.generate_mipmaps = false;
        tex.min_filter = TextureFilter::Nearest;

        let out = downscale_texture(&tex, DEFAULT_MAX_TEXTURE_SIZE);
        assert_eq!((out.width, out.height), (1024, 512));
        assert!(out.generate_mipmaps);
        assert_eq!(out.min_filter, TextureFilter::LinearMipmapLinear);
        assert_eq!(out.mag_filter, TextureFilter::Linear);
    }

    #[test]
    fn downscale_keeps_small_textures() {
        let tex = Texture::new("small", 300, 1);
        let out = downscale_texture(&tex, 256);
        assert_eq!((out.width, out.height), (256, 1));

        let out = downscale_texture(&Texture::new("tiny", 64, 32), 1024);
        assert_eq!((out.width, out.height), (64, 32));
    }
}
