//! Surface material. Only the constant terms are modelled; texture lookup
//! belongs to the shading layer.

use crate::util::{Vec2, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: Vec3,
    pub emission: Vec3,
    pub metallic: f32,
    pub ior: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "boring".to_string(),
            diffuse: Vec3::new(1.0, 0.0, 1.0),
            emission: Vec3::ZERO,
            metallic: 0.0,
            ior: 1.0,
        }
    }
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Emissive material with the given radiance.
    pub fn emissive(name: impl Into<String>, emission: Vec3) -> Self {
        Self { name: name.into(), emission, ..Default::default() }
    }

    /// Emission at a surface uv.
    #[inline]
    pub fn emission_at(&self, _uv: Vec2) -> Vec3 {
        self.emission
    }

    #[inline]
    pub fn is_emissive_at(&self, uv: Vec2) -> bool {
        self.emission_at(uv).length() > 0.0
    }
}
