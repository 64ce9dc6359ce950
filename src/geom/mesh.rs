//! Triangle soup with per-triangle material ids.

use crate::util::{next_id, BBox, Handle, Vec2, Vec3};

use super::Material;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

impl Vertex {
    /// Vertex with only a position; normal and uv are zero.
    #[inline]
    pub fn at(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }
}

/// One triangle. A negative `material_id` means "no material".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vertex,
    pub b: Vertex,
    pub c: Vertex,
    pub material_id: i32,
}

impl Triangle {
    pub fn new(a: Vertex, b: Vertex, c: Vertex, material_id: i32) -> Self {
        Self { a, b, c, material_id }
    }

    /// Triangle from three positions without material.
    pub fn from_positions(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self::new(Vertex::at(a), Vertex::at(b), Vertex::at(c), -1)
    }

    pub fn positions(&self) -> [Vec3; 3] {
        [self.a.position, self.b.position, self.c.position]
    }

    pub fn bbox(&self) -> BBox {
        let mut b = BBox::EMPTY;
        b.enclose(self.a.position);
        b.enclose(self.b.position);
        b.enclose(self.c.position);
        b
    }

    pub fn centroid(&self) -> Vec3 {
        (self.a.position + self.b.position + self.c.position) / 3.0
    }
}

/// Immutable triangle mesh plus its material table.
///
/// A [`crate::bvh::Bvh`] references triangles of a model by index and keeps
/// the model alive through an `Arc`.
#[derive(Debug)]
pub struct Model {
    id: Handle,
    triangles: Vec<Triangle>,
    materials: Vec<Material>,
}

impl Model {
    pub fn new(triangles: Vec<Triangle>, materials: Vec<Material>) -> Self {
        Self { id: next_id(), triangles, materials }
    }

    /// Model without any material table.
    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        Self::new(triangles, Vec::new())
    }

    /// Two triangles spanning `min`..`max` in the `z = min.z` plane.
    pub fn quad(min: Vec3, max: Vec3, material_id: i32) -> Self {
        Self::from_triangles(quad_triangles(min, max, material_id).to_vec())
    }

    #[inline]
    pub fn id(&self) -> Handle {
        self.id
    }

    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Triangle by index. Panics when out of range.
    #[inline]
    pub fn triangle(&self, index: usize) -> &Triangle {
        assert!(index < self.triangles.len(), "Triangle index {index} out of bounds (count: {})", self.triangles.len());
        &self.triangles[index]
    }

    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[inline]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Material for a triangle's material id. Negative or unknown ids have none.
    pub fn material(&self, material_id: i32) -> Option<&Material> {
        usize::try_from(material_id).ok().and_then(|i| self.materials.get(i))
    }
}

/// Two triangles covering an axis-aligned rectangle at height `min.z`.
pub fn quad_triangles(min: Vec3, max: Vec3, material_id: i32) -> [Triangle; 2] {
    let z = min.z;
    let corners = [
        Vec3::new(min.x, min.y, z),
        Vec3::new(max.x, min.y, z),
        Vec3::new(max.x, max.y, z),
        Vec3::new(min.x, max.y, z),
    ];
    let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
    let v = |i: usize| Vertex { position: corners[i], normal: Vec3::Z, tex_coord: uvs[i] };

    [
        Triangle::new(v(0), v(1), v(2), material_id),
        Triangle::new(v(2), v(3), v(0), material_id),
    ]
}
