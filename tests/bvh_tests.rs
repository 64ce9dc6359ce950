//! BVH construction through the public primitives.

use std::sync::Arc;

use scriptrace::bvh::{split_sah, BuildSettings, Bvh, BvhOptions, Ray};
use scriptrace::geom::{quad_triangles, Material, Model, Triangle};
use scriptrace::util::{BBox, Vec3};

/// Small deterministic generator so the property tests need no extra crates.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn coin(&mut self) -> bool {
        self.next() & 1 == 1
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    fn unit(&mut self) -> f32 {
        (self.next() % 10_000) as f32 / 10_000.0
    }
}

fn random_soup(rng: &mut Lcg, n: usize) -> Model {
    let tris = (0..n)
        .map(|_| {
            let base = Vec3::new(rng.unit(), rng.unit(), rng.unit()) * 20.0;
            Triangle::from_positions(
                base,
                base + Vec3::new(rng.unit() + 0.1, 0.0, 0.0),
                base + Vec3::new(0.0, rng.unit() + 0.1, rng.unit()),
            )
        })
        .collect();
    Model::from_triangles(tris)
}

#[test]
fn test_unit_quad_root() {
    let model = Arc::new(Model::quad(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0), -1));
    let bvh = Bvh::new(model);

    let root = bvh.node(0);
    assert_eq!(root.bbox.min, Vec3::new(-1.0, -1.0, 0.0));
    assert_eq!(root.bbox.max, Vec3::new(1.0, 1.0, 0.0));
    assert_eq!((root.start, root.size), (0, 2));
    assert!(root.is_leaf());
    assert_eq!(bvh.num_nodes(), 1);
}

#[test]
fn test_root_is_exact_bounds() {
    let mut rng = Lcg(7);
    let model = Arc::new(random_soup(&mut rng, 300));

    let mut expected = BBox::EMPTY;
    for tri in model.triangles() {
        for p in tri.positions() {
            expected.enclose(p);
        }
    }
    let bvh = Bvh::new(Arc::clone(&model));
    assert_eq!(bvh.node(0).bbox, expected);
}

#[test]
fn test_empty_model_keeps_sentinel() {
    let bvh = Bvh::new(Arc::new(Model::from_triangles(Vec::new())));
    let root = bvh.node(0);
    assert_eq!(root.bbox.min, Vec3::splat(f32::INFINITY));
    assert_eq!(root.bbox.max, Vec3::splat(f32::NEG_INFINITY));
    assert_eq!(root.size, 0);
    assert_eq!(bvh.num_emitters(), 0);
}

#[test]
fn test_partition_property() {
    let mut rng = Lcg(42);
    for round in 0..200 {
        let n = 1 + rng.below(40);
        let model = Arc::new(random_soup(&mut rng, n));
        let mut bvh = Bvh::new(model);

        let lo = rng.below(n);
        let hi = lo + rng.below(n - lo);

        // Decide the predicate per model triangle so it can be checked after the shuffle.
        let wanted: Vec<bool> = (0..n).map(|_| rng.coin()).collect();
        let mut table = bvh.make_partitioning_table();
        for pos in 0..n {
            table[pos] = wanted[bvh.triangle_index(pos)];
        }

        let before: Vec<usize> = (0..n).map(|i| bvh.triangle_index(i)).collect();
        let split = bvh.partition(table, lo, hi);
        let after: Vec<usize> = (0..n).map(|i| bvh.triangle_index(i)).collect();

        assert!((lo..=hi + 1).contains(&split), "round {round}: split {split} outside [{lo}, {}]", hi + 1);
        for pos in lo..split {
            assert!(wanted[after[pos]], "round {round}: position {pos} should be flagged");
        }
        for pos in split..=hi {
            assert!(!wanted[after[pos]], "round {round}: position {pos} should not be flagged");
        }

        // Outside the range nothing moves; inside it is a permutation.
        assert_eq!(before[..lo], after[..lo]);
        assert_eq!(before[hi + 1..], after[hi + 1..]);
        let mut a = before[lo..=hi].to_vec();
        let mut b = after[lo..=hi].to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }
}

#[test]
fn test_node_stability_during_build() {
    let mut rng = Lcg(3);
    let mut bvh = Bvh::new(Arc::new(random_soup(&mut rng, 64)));

    let root = *bvh.node(0);
    let extra = bvh.make_node(root.bbox, 0, 10, 0, 0);
    let snapshot = *bvh.node(extra);

    split_sah(&mut bvh, &BuildSettings::default());
    assert!(bvh.num_nodes() > extra + 1);

    // Only the root's links changed; the detached node is untouched.
    let root_after = bvh.node(0);
    assert_eq!((root_after.bbox, root_after.start, root_after.size), (root.bbox, root.start, root.size));
    assert_eq!(*bvh.node(extra), snapshot);
}

/// Median split along the longest axis, driven only through the public API.
fn build_median(bvh: &mut Bvh, index: usize) {
    let node = *bvh.node(index);
    if node.size <= 2 {
        return;
    }
    let axis = node.bbox.longest_axis();
    let mut centers: Vec<f32> = node.range().map(|p| bvh.triangle(p).centroid()[axis]).collect();
    centers.sort_by(f32::total_cmp);
    let pivot = centers[centers.len() / 2];

    let mut table = bvh.make_partitioning_table();
    for pos in node.range() {
        table.set(pos, bvh.triangle(pos).centroid()[axis] < pivot);
    }
    let mut mid = bvh.partition(table, node.start, node.start + node.size - 1);
    if mid == node.start || mid == node.start + node.size {
        mid = node.start + node.size / 2;
    }

    let left_size = mid - node.start;
    let right_size = node.size - left_size;
    let left = bvh.make_node(bvh.range_bbox(node.start, left_size), node.start, left_size, 0, 0);
    let right = bvh.make_node(bvh.range_bbox(mid, right_size), mid, right_size, 0, 0);
    bvh.set_children(index, left, right);

    build_median(bvh, left);
    build_median(bvh, right);
}

#[test]
fn test_external_builder_matches_brute_force() {
    let mut rng = Lcg(99);
    let model = Arc::new(random_soup(&mut rng, 120));
    let mut bvh = Bvh::new(Arc::clone(&model));
    build_median(&mut bvh, 0);
    assert!(bvh.num_nodes() > 1);

    for _ in 0..200 {
        // Offset keeps origins off the vertex grid.
        let origin = Vec3::new(rng.unit() * 20.0 + 0.0007, rng.unit() * 20.0 + 0.0007, 40.0);
        let ray = Ray::new(origin, Vec3::NEG_Z);

        let brute = model
            .triangles()
            .iter()
            .enumerate()
            .filter_map(|(i, tri)| scriptrace::bvh::intersect_triangle(&ray, tri, 0.0, f32::INFINITY).map(|(t, _, _)| (i, t)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        let hit = bvh.intersect(&ray, 0.0, f32::INFINITY);
        match (brute, hit) {
            (None, None) => {}
            (Some((_, t)), Some(hit)) => assert!((t - hit.t).abs() < 1e-4),
            (brute, hit) => panic!("mismatch: brute {brute:?}, bvh {hit:?}"),
        }
    }
}

#[test]
fn test_emitters_follow_materials() {
    let materials = vec![Material::named("matte"), Material::emissive("lamp", Vec3::ONE)];
    let mut triangles = Vec::new();
    triangles.extend(quad_triangles(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0), 0));
    triangles.extend(quad_triangles(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 1.0, 0.0), 1));
    triangles.extend(quad_triangles(Vec3::new(4.0, 0.0, 0.0), Vec3::new(5.0, 1.0, 0.0), -1));
    triangles.extend(quad_triangles(Vec3::new(6.0, 0.0, 0.0), Vec3::new(7.0, 1.0, 0.0), 9));
    let model = Arc::new(Model::new(triangles, materials));

    // Lamp, no material and an id outside the table all emit.
    let bvh = Bvh::new(Arc::clone(&model));
    assert_eq!(bvh.num_emitters(), 6);
    for i in 0..bvh.num_emitters() {
        assert_ne!(bvh.emitter(i).material_id, 0);
    }

    let quiet = Bvh::with_options(model, BvhOptions { collect_emitters: false });
    assert_eq!(quiet.num_emitters(), 0);
}

#[test]
fn test_sah_settings_respected() {
    let mut rng = Lcg(5);
    let model = Arc::new(random_soup(&mut rng, 500));

    let mut coarse = Bvh::new(Arc::clone(&model));
    let coarse_stats = split_sah(&mut coarse, &BuildSettings { max_leaf_size: 32, ..Default::default() });
    let mut fine = Bvh::new(model);
    let fine_stats = split_sah(&mut fine, &BuildSettings { max_leaf_size: 1, ..Default::default() });

    assert!(fine_stats.nodes > coarse_stats.nodes);
    assert!(fine_stats.max_depth >= coarse_stats.max_depth);
}
