//! Reference SAH splitter.
//!
//! Refines a freshly constructed [`Bvh`] using nothing but its public
//! primitives: read a node, flag its triangles, partition, append the two
//! children and link them. Scripted builders follow the same recipe with
//! their own split policy.

use serde::{Deserialize, Serialize};

use super::{Bvh, Node};
use crate::util::{BBox, Vec3};

/// Split policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Nodes with at most this many triangles stay leaves.
    pub max_leaf_size: usize,
    /// SAH bins per axis.
    pub bins: usize,
    pub traversal_cost: f32,
    pub intersect_cost: f32,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_leaf_size: 4,
            bins: 12,
            traversal_cost: 1.0,
            intersect_cost: 1.0,
        }
    }
}

/// Shape of the tree produced by [`split_sah`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: usize,
}

/// SAH bin for evaluating split candidates.
#[derive(Clone, Copy)]
struct Bin {
    bounds: BBox,
    count: usize,
}

impl Bin {
    const EMPTY: Self = Self { bounds: BBox::EMPTY, count: 0 };
}

struct Candidate {
    axis: usize,
    position: f32,
    cost: f32,
}

/// Recursively split every leaf of `bvh` reachable from the root.
///
/// Leaves already split by someone else are left alone; only nodes without
/// children are considered.
#[tracing::instrument(skip_all, fields(bvh = bvh.id(), tri_count = bvh.num_triangles()))]
pub fn split_sah(bvh: &mut Bvh, settings: &BuildSettings) -> BuildStats {
    let max_leaf = settings.max_leaf_size.max(1);
    let mut stats = BuildStats::default();

    let mut stack = vec![(0usize, 0usize)];
    while let Some((index, depth)) = stack.pop() {
        stats.max_depth = stats.max_depth.max(depth);
        let node = *bvh.node(index);

        if !node.is_leaf() {
            stack.push((node.right, depth + 1));
            stack.push((node.left, depth + 1));
            continue;
        }

        if node.size <= max_leaf {
            stats.leaves += 1;
            continue;
        }

        let Some(split) = find_split(bvh, &node, settings) else {
            stats.leaves += 1;
            continue;
        };

        let mut table = bvh.make_partitioning_table();
        for pos in node.range() {
            table.set(pos, bvh.triangle(pos).centroid()[split.axis] < split.position);
        }
        let mut mid = bvh.partition(table, node.start, node.start + node.size - 1);

        // Degenerate partition: fall back to an even split of the range.
        if mid == node.start || mid == node.start + node.size {
            mid = node.start + node.size / 2;
        }

        let left_size = mid - node.start;
        let right_size = node.size - left_size;
        let left = bvh.make_node(bvh.range_bbox(node.start, left_size), node.start, left_size, 0, 0);
        let right = bvh.make_node(bvh.range_bbox(mid, right_size), mid, right_size, 0, 0);
        bvh.set_children(index, left, right);

        // Right first so the left subtree is processed first.
        stack.push((right, depth + 1));
        stack.push((left, depth + 1));
    }

    stats.nodes = bvh.num_nodes();
    tracing::debug!(nodes = stats.nodes, leaves = stats.leaves, depth = stats.max_depth, "SAH split done");
    stats
}

/// Best binned SAH split for a leaf, or `None` when keeping the leaf is cheaper.
fn find_split(bvh: &Bvh, node: &Node, settings: &BuildSettings) -> Option<Candidate> {
    let num_bins = settings.bins.max(2);

    let mut centroid_bounds = BBox::EMPTY;
    for pos in node.range() {
        centroid_bounds.enclose(bvh.triangle(pos).centroid());
    }

    // Child areas are taken relative to the parent so the costs do not depend on the mesh scale.
    let parent_area = node.bbox.surface_area();
    if parent_area <= 0.0 {
        return None;
    }

    let mut best: Option<Candidate> = None;
    for axis in 0..3 {
        let lo = centroid_bounds.min[axis];
        let extent = centroid_bounds.max[axis] - lo;
        if extent < 1e-8 {
            continue;
        }
        let scale = num_bins as f32 / extent;

        let mut bins = vec![Bin::EMPTY; num_bins];
        for pos in node.range() {
            let tri = bvh.triangle(pos);
            let slot = (((tri.centroid()[axis] - lo) * scale) as usize).min(num_bins - 1);
            bins[slot].bounds.union(&tri.bbox());
            bins[slot].count += 1;
        }

        // Prefix sweep from the left.
        let mut left_area = vec![0.0f32; num_bins - 1];
        let mut left_count = vec![0usize; num_bins - 1];
        let mut sweep = BBox::EMPTY;
        let mut sweep_count = 0;
        for i in 0..num_bins - 1 {
            sweep.union(&bins[i].bounds);
            sweep_count += bins[i].count;
            left_area[i] = sweep.surface_area();
            left_count[i] = sweep_count;
        }

        // Suffix sweep from the right, scoring each boundary.
        sweep = BBox::EMPTY;
        sweep_count = 0;
        for i in (1..num_bins).rev() {
            sweep.union(&bins[i].bounds);
            sweep_count += bins[i].count;
            let weighted = left_count[i - 1] as f32 * left_area[i - 1] + sweep_count as f32 * sweep.surface_area();
            let cost = settings.traversal_cost + settings.intersect_cost * weighted / parent_area;

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                best = Some(Candidate {
                    axis,
                    position: lo + (i as f32 / num_bins as f32) * extent,
                    cost,
                });
            }
        }
    }

    let leaf_cost = node.size as f32 * settings.intersect_cost;
    best.filter(|b| b.cost < leaf_cost)
}

/// Sum of node bounding-box areas, a rough tree-quality metric.
pub fn total_area(bvh: &Bvh) -> f32 {
    bvh.nodes().iter().map(|n| n.bbox.surface_area()).sum::<f32>()
}

/// Centroid of every triangle in a node, in reference order.
pub fn node_centroids(bvh: &Bvh, node: &Node) -> Vec<Vec3> {
    node.range().map(|pos| bvh.triangle(pos).centroid()).collect()
}
