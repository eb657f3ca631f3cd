//! Median-split binary partitioning tree over ellipsoid centers (PT,
//! spec.md §4.1).

use crate::geometry::{Aabb, Ellipsoid};

/// Leaf bucket capacity. Tuned empirically in the reference (`LSIZE` in
/// `original_source/partition.h`); kept as the same constant here.
pub const LSIZE: usize = 96;

enum Node {
    Leaf(Vec<usize>),
    Internal {
        dim: usize,
        coord: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Binary tree over (non-analytical) ellipsoid centers, rebuilt whenever a
/// `store` reports imbalance.
pub struct PartitionTree {
    root: Option<Node>,
}

impl PartitionTree {
    pub fn empty() -> Self {
        Self { root: None }
    }

    /// Recursive median split along the longest extent, stopping at
    /// buckets of at most `LSIZE` entries (spec.md §4.1).
    pub fn create(ellipsoids: &[Ellipsoid], indices: &[usize]) -> Self {
        if indices.is_empty() {
            return Self::empty();
        }
        let root = Self::build(ellipsoids, indices.to_vec());
        Self { root: Some(root) }
    }

    fn build(ellipsoids: &[Ellipsoid], mut indices: Vec<usize>) -> Node {
        if indices.len() <= LSIZE {
            return Node::Leaf(indices);
        }

        let bounds = indices
            .iter()
            .map(|&i| ellipsoids[i].center)
            .fold(None::<Aabb>, |acc, c| {
                let point = Aabb { min: c, max: c };
                Some(match acc {
                    Some(a) => a.union(&point),
                    None => point,
                })
            })
            .expect("non-empty indices");

        let dim = bounds.longest_axis();
        indices.sort_by(|&a, &b| {
            let ca = ellipsoids[a].center[dim];
            let cb = ellipsoids[b].center[dim];
            ca.partial_cmp(&cb).unwrap()
        });

        let mid = indices.len() / 2;
        let coord = ellipsoids[indices[mid]].center[dim];
        let right_indices = indices.split_off(mid);

        Node::Internal {
            dim,
            coord,
            left: Box::new(Self::build(ellipsoids, indices)),
            right: Box::new(Self::build(ellipsoids, right_indices)),
        }
    }

    /// Re-buckets ellipsoids into the existing split structure without
    /// rebuilding it. Returns the number of leaves whose bucket exceeded
    /// `LSIZE`; a nonzero return means the caller should call `create`
    /// again (spec.md §4.1, "Store policy").
    pub fn store(&mut self, ellipsoids: &[Ellipsoid], indices: &[usize]) -> usize {
        let Some(root) = self.root.as_mut() else {
            return 0;
        };
        // Walk each ellipsoid down the existing split planes, recording the
        // left/right choice made at each internal node, then reassign leaf
        // contents in one pass keyed by that path.
        fn route(node: &Node, center: glam::DVec3) -> Vec<bool> {
            match node {
                Node::Leaf(_) => vec![],
                Node::Internal {
                    dim,
                    coord,
                    left,
                    right,
                } => {
                    let go_left = center[*dim] <= *coord;
                    let mut path = vec![go_left];
                    let child = if go_left { left.as_ref() } else { right.as_ref() };
                    path.extend(route(child, center));
                    path
                }
            }
        }

        let mut routed: Vec<(Vec<bool>, usize)> = Vec::with_capacity(indices.len());
        for &idx in indices {
            let path = route(root, ellipsoids[idx].center);
            routed.push((path, idx));
        }

        fn assign(node: &mut Node, routed: &[(Vec<bool>, usize)], depth: usize, imbalance: &mut usize) {
            match node {
                Node::Leaf(bucket) => {
                    bucket.clear();
                    bucket.extend(routed.iter().map(|(_, idx)| *idx));
                    if bucket.len() > LSIZE {
                        *imbalance += 1;
                    }
                }
                Node::Internal { left, right, .. } => {
                    let (left_items, right_items): (Vec<_>, Vec<_>) =
                        routed.iter().cloned().partition(|(path, _)| path[depth]);
                    assign(left, &left_items, depth + 1, imbalance);
                    assign(right, &right_items, depth + 1, imbalance);
                }
            }
        }

        let mut imbalance = 0;
        assign(root, &routed, 0, &mut imbalance);
        imbalance
    }

    /// Visits every ellipsoid index whose leaf bucket's bounding region may
    /// overlap `aabb`.
    pub fn query_aabb(&self, ellipsoids: &[Ellipsoid], aabb: &Aabb, mut callback: impl FnMut(usize)) {
        let Some(root) = &self.root else { return };
        Self::query_node(root, ellipsoids, aabb, &mut callback);
    }

    fn query_node(
        node: &Node,
        ellipsoids: &[Ellipsoid],
        aabb: &Aabb,
        callback: &mut impl FnMut(usize),
    ) {
        match node {
            Node::Leaf(bucket) => {
                for &idx in bucket {
                    if ellipsoids[idx].aabb().overlaps(aabb) {
                        callback(idx);
                    }
                }
            }
            Node::Internal {
                dim,
                coord,
                left,
                right,
            } => {
                if aabb.min[*dim] <= *coord {
                    Self::query_node(left, ellipsoids, aabb, callback);
                }
                if aabb.max[*dim] >= *coord {
                    Self::query_node(right, ellipsoids, aabb, callback);
                }
            }
        }
    }

    pub fn destroy(&mut self) {
        self.root = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DMat3, DVec3};

    fn sphere(owner: usize, center: DVec3, radius: f64) -> Ellipsoid {
        Ellipsoid {
            owner,
            center,
            center_ref: DVec3::ZERO,
            radii: DVec3::new(radius, -1.0, -1.0),
            orientation: DMat3::IDENTITY,
            orientation_ref: DMat3::IDENTITY,
            color: 0,
        }
    }

    #[test]
    fn query_finds_overlapping_leaf_entries() {
        let ellipsoids: Vec<_> = (0..300)
            .map(|i| sphere(i, DVec3::new(i as f64, 0.0, 0.0), 0.4))
            .collect();
        let indices: Vec<usize> = (0..ellipsoids.len()).collect();
        let tree = PartitionTree::create(&ellipsoids, &indices);

        let query = Aabb {
            min: DVec3::new(9.5, -1.0, -1.0),
            max: DVec3::new(10.5, 1.0, 1.0),
        };
        let mut hits = vec![];
        tree.query_aabb(&ellipsoids, &query, |i| hits.push(i));
        assert!(hits.contains(&10));
    }

    #[test]
    fn store_rebuckets_without_rebuilding_splits() {
        let ellipsoids: Vec<_> = (0..200)
            .map(|i| sphere(i, DVec3::new(i as f64, 0.0, 0.0), 0.4))
            .collect();
        let indices: Vec<usize> = (0..ellipsoids.len()).collect();
        let mut tree = PartitionTree::create(&ellipsoids, &indices);
        let imbalance = tree.store(&ellipsoids, &indices);
        assert_eq!(imbalance, 0);
    }
}
