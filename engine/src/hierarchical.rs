//! Top-down hierarchical clustering over a flat node arena.
//!
//! The tree is built by repeated farthest-pair bisection, level by level,
//! until the requested number of leaves exists or the depth reaches
//! `ceil(log2(k))`. This is a balanced-depth partition, not a
//! linkage-driven agglomeration: merge heights are the pole distances of
//! each split.
//!
//! Nodes refer to each other by [`NodeId`] (an index into the arena), so
//! parents and children never own one another.
//!
//! The full pairwise distance matrix is materialized, which costs O(n²)
//! time and memory.

use crate::error::{ClusterError, Result};
use crate::math::{check_dimensions, euclidean_distance};
use crate::types::{Cluster, Embedding};

/// Index of a node in a [`ClusterTree`].
pub type NodeId = usize;

/// A tree node: a cluster plus its position in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalCluster {
    pub cluster: Cluster,
    /// Child nodes, in split order.
    pub children: Vec<NodeId>,
    /// Depth of this node; the root is level 0.
    pub level: usize,
    /// Distance between the two poles this node was split on.
    /// `None` for leaves.
    pub height: Option<f32>,
    pub parent: Option<NodeId>,
}

impl HierarchicalCluster {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of [`HierarchicalCluster`] nodes. Node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTree {
    nodes: Vec<HierarchicalCluster>,
}

impl ClusterTree {
    pub fn root_id(&self) -> NodeId {
        0
    }

    pub fn root(&self) -> &HierarchicalCluster {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&HierarchicalCluster> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[HierarchicalCluster] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &HierarchicalCluster> {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&c| self.nodes.get(c))
    }

    pub fn parent(&self, id: NodeId) -> Option<&HierarchicalCluster> {
        self.nodes.get(id)?.parent.and_then(|p| self.nodes.get(p))
    }

    /// Leaf ids, left to right.
    pub fn leaves(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root_id()];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                out.push(id);
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Level of the deepest node.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }

    /// Ids from `id` up to and including the root. Empty for an unknown id.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cur = self.nodes.get(id).map(|_| id);
        while let Some(c) = cur {
            path.push(c);
            cur = self.nodes[c].parent;
        }
        path
    }

    /// Flattens the tree into its leaf clusters.
    pub fn cut(&self) -> Vec<Cluster> {
        self.leaves()
            .into_iter()
            .map(|id| self.nodes[id].cluster.clone())
            .collect()
    }
}

/// Builds a [`ClusterTree`] with about `k` leaves.
#[derive(Debug, Clone)]
pub struct Hierarchical {
    k: usize,
}

impl Hierarchical {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Maximum tree depth for `k` leaves: `ceil(log2(k))`.
    pub fn max_depth(k: usize) -> usize {
        if k <= 1 {
            0
        } else {
            (usize::BITS - (k - 1).leading_zeros()) as usize
        }
    }

    pub fn build(&self, embeddings: &[Embedding]) -> Result<ClusterTree> {
        if embeddings.is_empty() {
            return Err(ClusterError::InvalidArgument(
                "hierarchical: no embeddings".into(),
            ));
        }
        if self.k == 0 {
            return Err(ClusterError::InvalidArgument(
                "hierarchical: k must be positive".into(),
            ));
        }
        check_dimensions(embeddings)?;

        let n = embeddings.len();
        let k = self.k.min(n);
        let max_depth = Self::max_depth(k);
        let dist = DistanceMatrix::new(embeddings);

        let all: Vec<usize> = (0..n).collect();
        let mut nodes = vec![HierarchicalCluster {
            cluster: Cluster::from_indices("node-0", embeddings, &all),
            children: Vec::new(),
            level: 0,
            height: None,
            parent: None,
        }];
        let mut members: Vec<Vec<usize>> = vec![all];

        let mut leaves = 1;
        let mut frontier: Vec<NodeId> = vec![0];

        for level in 0..max_depth {
            if leaves >= k {
                break;
            }

            let mut splits: Vec<(NodeId, Split)> = frontier
                .iter()
                .filter_map(|&id| bisect(&members[id], &dist).map(|s| (id, s)))
                .collect();
            // Stable: equal heights keep frontier order.
            splits.sort_by(|a, b| b.1.height.total_cmp(&a.1.height));

            let mut next = Vec::new();
            for (parent, split) in splits {
                if leaves >= k {
                    break;
                }
                nodes[parent].height = Some(split.height);
                for part in [split.left, split.right] {
                    let id = nodes.len();
                    nodes.push(HierarchicalCluster {
                        cluster: Cluster::from_indices(format!("node-{id}"), embeddings, &part),
                        children: Vec::new(),
                        level: level + 1,
                        height: None,
                        parent: Some(parent),
                    });
                    members.push(part);
                    nodes[parent].children.push(id);
                    next.push(id);
                }
                leaves += 1;
            }

            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        tracing::debug!(
            points = n,
            k,
            leaves,
            nodes = nodes.len(),
            "hierarchical: tree built"
        );
        Ok(ClusterTree { nodes })
    }
}

struct Split {
    left: Vec<usize>,
    right: Vec<usize>,
    height: f32,
}

/// Splits `members` around its two mutually farthest points.
///
/// Each member joins the nearer pole, ties going to the first. When all
/// members coincide the set is halved by position. Returns `None` for
/// fewer than two members.
fn bisect(members: &[usize], dist: &DistanceMatrix) -> Option<Split> {
    if members.len() < 2 {
        return None;
    }

    let mut poles = (members[0], members[1]);
    let mut height = f32::NEG_INFINITY;
    for (a, &i) in members.iter().enumerate() {
        for &j in &members[a + 1..] {
            let d = dist.get(i, j);
            if d > height {
                height = d;
                poles = (i, j);
            }
        }
    }

    if height <= 0.0 {
        let mid = members.len() / 2;
        return Some(Split {
            left: members[..mid].to_vec(),
            right: members[mid..].to_vec(),
            height: 0.0,
        });
    }

    let (p, q) = poles;
    let (left, right): (Vec<usize>, Vec<usize>) = members
        .iter()
        .partition(|&&m| dist.get(m, p) <= dist.get(m, q));
    Some(Split {
        left,
        right,
        height,
    })
}

/// Condensed upper-triangular matrix of pairwise Euclidean distances.
struct DistanceMatrix {
    n: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    fn new(embeddings: &[Embedding]) -> Self {
        let n = embeddings.len();
        let mut data = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                data.push(euclidean_distance(
                    &embeddings[i].vector,
                    &embeddings[j].vector,
                ));
            }
        }
        Self { n, data }
    }

    fn get(&self, i: usize, j: usize) -> f32 {
        if i == j {
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.data[i * self.n - i * (i + 1) / 2 + (j - i - 1)]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn line(xs: &[f32]) -> Vec<Embedding> {
        xs.iter()
            .enumerate()
            .map(|(i, &x)| Embedding::new(format!("e{i}"), vec![x, 1.0]))
            .collect()
    }

    fn four_groups() -> Vec<Embedding> {
        line(&[
            0.0, 1.0, 2.0, 10.0, 11.0, 12.0, 100.0, 101.0, 102.0, 110.0, 111.0, 112.0,
        ])
    }

    fn member_sets(tree: &ClusterTree) -> Vec<HashSet<String>> {
        tree.cut()
            .into_iter()
            .map(|c| c.members.into_iter().collect())
            .collect()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn max_depth_is_ceil_log2() {
        assert_eq!(Hierarchical::max_depth(1), 0);
        assert_eq!(Hierarchical::max_depth(2), 1);
        assert_eq!(Hierarchical::max_depth(3), 2);
        assert_eq!(Hierarchical::max_depth(4), 2);
        assert_eq!(Hierarchical::max_depth(5), 3);
        assert_eq!(Hierarchical::max_depth(8), 3);
        assert_eq!(Hierarchical::max_depth(9), 4);
    }

    #[test]
    fn clear_separation() {
        let embeddings = vec![
            Embedding::new("A", vec![0.0, 0.0]),
            Embedding::new("B", vec![0.0, 1.0]),
            Embedding::new("C", vec![10.0, 10.0]),
            Embedding::new("D", vec![10.0, 11.0]),
        ];
        let tree = Hierarchical::new(2).build(&embeddings).unwrap();
        let sets = member_sets(&tree);
        assert_eq!(sets.len(), 2);
        assert!(sets.contains(&set(&["A", "B"])));
        assert!(sets.contains(&set(&["C", "D"])));
        assert_eq!(tree.depth(), 1);
        assert!(tree.root().height.unwrap() > 14.0);
    }

    #[test]
    fn four_groups_four_leaves() {
        let tree = Hierarchical::new(4).build(&four_groups()).unwrap();
        let sets = member_sets(&tree);
        assert_eq!(sets.len(), 4);
        assert!(sets.contains(&set(&["e0", "e1", "e2"])));
        assert!(sets.contains(&set(&["e3", "e4", "e5"])));
        assert!(sets.contains(&set(&["e6", "e7", "e8"])));
        assert!(sets.contains(&set(&["e9", "e10", "e11"])));
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn odd_k_splits_widest_first_and_stops() {
        let tree = Hierarchical::new(3).build(&four_groups()).unwrap();
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 3);
        // Both level-1 nodes are equally wide; the first one splits.
        let sets = member_sets(&tree);
        assert!(sets.contains(&set(&["e0", "e1", "e2"])));
        assert!(sets.contains(&set(&["e3", "e4", "e5"])));
        assert!(sets.contains(&set(&["e6", "e7", "e8", "e9", "e10", "e11"])));
    }

    #[test]
    fn depth_bounded_and_cut_partitions() {
        let xs: Vec<f32> = (0..20).map(|i| ((i * 37) % 23) as f32 * 1.5).collect();
        let embeddings = line(&xs);
        for k in 1..=9 {
            let tree = Hierarchical::new(k).build(&embeddings).unwrap();
            assert!(tree.depth() <= Hierarchical::max_depth(k), "k={k}");
            assert!(tree.leaves().len() <= k, "k={k}");

            let mut seen = HashSet::new();
            for c in tree.cut() {
                for m in c.members {
                    assert!(seen.insert(m), "k={k}: duplicate member");
                }
            }
            assert_eq!(seen.len(), 20, "k={k}");
        }
    }

    #[test]
    fn parent_child_links_agree() {
        let tree = Hierarchical::new(4).build(&four_groups()).unwrap();
        assert!(tree.root().parent.is_none());
        assert_eq!(tree.root().level, 0);
        for (id, node) in tree.nodes().iter().enumerate() {
            for &child in &node.children {
                assert_eq!(tree.node(child).unwrap().level, node.level + 1);
                assert_eq!(tree.parent(child), Some(node));
            }
            let child_size: usize = tree.children(id).map(|c| c.cluster.size).sum();
            if !node.is_leaf() {
                assert_eq!(child_size, node.cluster.size);
                assert!(node.height.is_some());
            } else {
                assert!(node.height.is_none());
            }
        }
    }

    #[test]
    fn path_to_root() {
        let tree = Hierarchical::new(4).build(&four_groups()).unwrap();
        let leaf = *tree.leaves().last().unwrap();
        let path = tree.path_to_root(leaf);
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], leaf);
        assert_eq!(*path.last().unwrap(), tree.root_id());
        assert!(tree.path_to_root(999).is_empty());
    }

    #[test]
    fn identical_points_halve() {
        let embeddings = line(&[5.0; 6]);
        let tree = Hierarchical::new(2).build(&embeddings).unwrap();
        let cut = tree.cut();
        assert_eq!(cut.len(), 2);
        assert_eq!(cut[0].size, 3);
        assert_eq!(cut[1].size, 3);
        assert_eq!(tree.root().height, Some(0.0));
    }

    #[test]
    fn k_one_is_root_only_and_k_capped() {
        let tree = Hierarchical::new(1).build(&four_groups()).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.cut()[0].size, 12);

        let tree = Hierarchical::new(50).build(&line(&[0.0, 5.0, 9.0])).unwrap();
        assert!(tree.leaves().len() <= 3);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Hierarchical::new(2).build(&[]).unwrap_err().is_invalid_argument());
        assert!(Hierarchical::new(0).build(&four_groups()).unwrap_err().is_invalid_argument());
        let ragged = vec![Embedding::new("a", vec![1.0]), Embedding::new("b", vec![1.0, 2.0])];
        assert!(Hierarchical::new(2).build(&ragged).unwrap_err().is_invalid_argument());
    }
}
