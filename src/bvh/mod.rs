//! Bounding volume hierarchy over a model's triangles.
//!
//! The BVH only owns mechanism: a reorderable reference array, an
//! append-only node array and the emitter list. Deciding where to split is
//! left to the caller, which drives construction through
//! [`Bvh::make_node`], [`Bvh::partition`] and [`Bvh::set_children`].
//! [`build::split_sah`] is one such caller.
//!
//! Index arguments are contracts: out-of-range indices panic.

pub mod build;
mod node;
mod ray;

pub use build::{split_sah, BuildSettings, BuildStats};
pub use node::{Node, PartitionTable};
pub use ray::{intersect_bbox, intersect_triangle, Hit, Ray};

use std::sync::Arc;

use rayon::prelude::*;

use crate::geom::{Model, Triangle};
use crate::util::{next_id, BBox, Handle, Vec2};

/// Options for [`Bvh::with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvhOptions {
    /// Collect emissive triangles for light sampling.
    pub collect_emitters: bool,
}

impl Default for BvhOptions {
    fn default() -> Self {
        Self { collect_emitters: true }
    }
}

/// BVH over one [`Model`]. Move-only; share it through the resource store.
#[derive(Debug)]
pub struct Bvh {
    id: Handle,
    model: Arc<Model>,
    /// Model triangle index per position. Only this array is reordered.
    refs: Vec<usize>,
    nodes: Vec<Node>,
    /// Model triangle indices of emitters, in model order.
    emitters: Vec<usize>,
}

impl Bvh {
    /// Build the root node (and emitter list) over every triangle of `model`.
    pub fn new(model: Arc<Model>) -> Self {
        Self::with_options(model, BvhOptions::default())
    }

    #[tracing::instrument(skip_all, fields(tri_count = model.num_triangles()))]
    pub fn with_options(model: Arc<Model>, options: BvhOptions) -> Self {
        let tris = model.triangles();

        let root_bbox = tris
            .par_iter()
            .map(Triangle::bbox)
            .reduce(
                || BBox::EMPTY,
                |mut acc, b| {
                    acc.union(&b);
                    acc
                },
            );

        let emitters = if options.collect_emitters {
            (0..tris.len())
                .into_par_iter()
                .filter(|&i| is_emitter(&model, &tris[i]))
                .collect()
        } else {
            Vec::new()
        };

        let refs: Vec<usize> = (0..tris.len()).collect();
        let mut bvh = Self {
            id: next_id(),
            model,
            refs,
            nodes: Vec::new(),
            emitters,
        };
        bvh.make_node(root_bbox, 0, bvh.refs.len(), 0, 0);

        tracing::debug!(
            id = bvh.id,
            triangles = bvh.refs.len(),
            emitters = bvh.emitters.len(),
            "BVH root built"
        );
        bvh
    }

    #[inline]
    pub fn id(&self) -> Handle {
        self.id
    }

    /// The model whose triangles this BVH references.
    #[inline]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Append a node and return its index. Indices stay valid for the
    /// BVH's lifetime. No range validation is performed.
    pub fn make_node(&mut self, bbox: BBox, start: usize, size: usize, left: usize, right: usize) -> usize {
        self.nodes.push(Node::new(bbox, start, size, left, right));
        self.nodes.len() - 1
    }

    /// Node by index. Panics when out of range.
    #[inline]
    pub fn node(&self, index: usize) -> &Node {
        assert!(index < self.nodes.len(), "Node index {index} out of bounds (count: {})", self.nodes.len());
        &self.nodes[index]
    }

    #[inline]
    pub fn try_node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// All nodes in creation order (index 0 = root).
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Attach children to a node. Only `left`/`right` change.
    pub fn set_children(&mut self, index: usize, left: usize, right: usize) {
        assert!(index < self.nodes.len(), "Node index {index} out of bounds (count: {})", self.nodes.len());
        let node = &mut self.nodes[index];
        node.left = left;
        node.right = right;
    }

    /// Fresh all-false predicate table sized to the triangle count.
    pub fn make_partitioning_table(&self) -> PartitionTable {
        PartitionTable::new(self.refs.len())
    }

    /// Hoare-style in-place partition of positions `begin..=end` (`end` is
    /// the last valid position, inclusive).
    ///
    /// Positions flagged `true` in `table` end up before the returned split
    /// index, the rest from it through `end`. Only the reference array is
    /// permuted; flags travel with their triangles. `begin > end` denotes
    /// an empty range and returns `begin` untouched.
    pub fn partition(&mut self, mut table: PartitionTable, begin: usize, end: usize) -> usize {
        assert_eq!(
            table.len(),
            self.refs.len(),
            "Partition table has {} entries, BVH has {} triangles",
            table.len(),
            self.refs.len()
        );
        if begin > end {
            return begin;
        }
        assert!(end < self.refs.len(), "Partition end {end} out of bounds (count: {})", self.refs.len());

        // `hi` is one past the last unclassified position.
        let mut lo = begin;
        let mut hi = end + 1;
        while lo < hi {
            if table[lo] {
                lo += 1;
            } else {
                hi -= 1;
                self.refs.swap(lo, hi);
                table.swap(lo, hi);
            }
        }
        lo
    }

    /// Triangle at reference position `index`. Panics when out of range.
    #[inline]
    pub fn triangle(&self, index: usize) -> &Triangle {
        self.model.triangle(self.triangle_index(index))
    }

    /// Model triangle index stored at reference position `index`.
    #[inline]
    pub fn triangle_index(&self, index: usize) -> usize {
        assert!(index < self.refs.len(), "Triangle index {index} out of bounds (count: {})", self.refs.len());
        self.refs[index]
    }

    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.refs.len()
    }

    /// Emitter by index into the emitter list. Panics when out of range.
    #[inline]
    pub fn emitter(&self, index: usize) -> &Triangle {
        assert!(index < self.emitters.len(), "Emitter index {index} out of bounds (count: {})", self.emitters.len());
        self.model.triangle(self.emitters[index])
    }

    #[inline]
    pub fn num_emitters(&self) -> usize {
        self.emitters.len()
    }

    /// Bounding box of the triangles at positions `[start, start + size)`.
    pub fn range_bbox(&self, start: usize, size: usize) -> BBox {
        assert!(start + size <= self.refs.len(), "Range {start}+{size} out of bounds (count: {})", self.refs.len());
        let mut b = BBox::EMPTY;
        for &i in &self.refs[start..start + size] {
            b.union(&self.model.triangle(i).bbox());
        }
        b
    }

    /// Closest hit along `ray` within `(t_min, t_max)`.
    ///
    /// Walks the node array from the root; leaves test their triangle range.
    pub fn intersect(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
        let inv_dir = ray.dir.recip();
        let mut closest = t_max;
        let mut hit = None;

        let mut stack: Vec<usize> = Vec::with_capacity(64);
        stack.push(0);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if intersect_bbox(&node.bbox, ray.origin, inv_dir, t_min, closest).is_none() {
                continue;
            }

            if node.is_leaf() {
                for pos in node.range() {
                    let tri_index = self.refs[pos];
                    if let Some((t, u, v)) = intersect_triangle(ray, self.model.triangle(tri_index), t_min, closest) {
                        closest = t;
                        hit = Some(Hit { t, u, v, triangle: tri_index });
                    }
                }
                continue;
            }

            if node.right != 0 {
                stack.push(node.right);
            }
            if node.left != 0 {
                stack.push(node.left);
            }
        }

        hit
    }
}

/// A triangle emits when it has no material or its material glows at the
/// center of its texture space.
fn is_emitter(model: &Model, tri: &Triangle) -> bool {
    match model.material(tri.material_id) {
        None => true,
        Some(material) => material.is_emissive_at(Vec2::splat(0.5)),
    }
}
