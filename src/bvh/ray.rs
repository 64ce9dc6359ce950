//! Ray primitives: slab test against boxes, Moller-Trumbore against triangles.

use crate::geom::Triangle;
use crate::util::{BBox, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Closest hit. `triangle` is the model triangle index, `u`/`v` are
/// barycentrics of vertices `b` and `c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub triangle: usize,
}

/// Entry distance of the ray into `bbox` within `[t_min, t_max]`.
#[inline]
pub fn intersect_bbox(bbox: &BBox, origin: Vec3, inv_dir: Vec3, t_min: f32, t_max: f32) -> Option<f32> {
    if bbox.is_empty() {
        return None;
    }
    let t0 = (bbox.min - origin) * inv_dir;
    let t1 = (bbox.max - origin) * inv_dir;
    let near = t0.min(t1).max_element().max(t_min);
    let far = t0.max(t1).min_element().min(t_max);
    (near <= far).then_some(near)
}

/// Returns `(t, u, v)` for a hit strictly inside `(t_min, t_max)`.
#[inline]
pub fn intersect_triangle(ray: &Ray, tri: &Triangle, t_min: f32, t_max: f32) -> Option<(f32, f32, f32)> {
    const EPSILON: f32 = 1e-8;

    let [a, b, c] = tri.positions();
    let e1 = b - a;
    let e2 = c - a;
    let p = ray.dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let s = ray.origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(e1);
    let v = ray.dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(q) * inv_det;
    (t > t_min && t < t_max).then_some((t, u, v))
}
