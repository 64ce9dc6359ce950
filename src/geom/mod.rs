//! Geometry consumed by the BVH.
//!
//! - [`Model`] - immutable triangle soup with a material table
//! - [`Triangle`] / [`Vertex`] - per-vertex position, normal and uv
//! - [`Material`] - constant surface terms, used to detect emitters

mod material;
mod mesh;

pub use material::Material;
pub use mesh::{quad_triangles, Model, Triangle, Vertex};
