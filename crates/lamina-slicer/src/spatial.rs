//! Dynamic bounding volume hierarchy over 2D rectangles.
//!
//! Unlike a bulk-built BVH, this tree supports incremental insertion and
//! removal: reconstruction removes and re-inserts a segment every time one
//! of its endpoints is snapped. Nodes live in a [`SlotMap`] arena so
//! parent/child links are plain keys.
//!
//! Insertion descends towards the sibling that minimises the growth of the
//! tree's total half-perimeter (the 2D analogue of the surface area
//! heuristic), then splices a new internal node above it. Ancestors are
//! rebalanced with AVL rotations so that spatially sorted input, which is
//! what mesh-ordered segments look like, still yields a logarithmic height.

use std::collections::HashMap;
use std::hash::Hash;

use slotmap::SlotMap;

use crate::aabb::Aabb2;

slotmap::new_key_type! {
    /// Handle to a node of an [`AabbTree`].
    pub struct NodeId;
}

/// Anything that can report an axis-aligned bounding rectangle.
pub trait Bounded {
    /// Bounding rectangle of the object.
    fn aabb(&self) -> Aabb2;
}

impl Bounded for Aabb2 {
    fn aabb(&self) -> Aabb2 {
        *self
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeKind<K> {
    Leaf { item: K },
    Internal { left: NodeId, right: NodeId },
}

#[derive(Debug, Clone)]
struct Node<K> {
    aabb: Aabb2,
    parent: Option<NodeId>,
    /// 0 for leaves.
    height: u32,
    kind: NodeKind<K>,
}

/// A mutable set of keyed rectangles with overlap queries.
///
/// Keys identify items (for the slicer, segment indices in a shape's
/// arena); each key appears at most once.
#[derive(Debug, Clone)]
pub struct AabbTree<K> {
    nodes: SlotMap<NodeId, Node<K>>,
    root: Option<NodeId>,
    leaves: HashMap<K, NodeId>,
}

impl<K: Copy + Eq + Hash> AabbTree<K> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            leaves: HashMap::new(),
        }
    }

    /// Create an empty tree with room for `n` items.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(n.saturating_mul(2)),
            root: None,
            leaves: HashMap::with_capacity(n),
        }
    }

    /// Number of items stored.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// True if the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// True if `item` is stored.
    pub fn contains(&self, item: &K) -> bool {
        self.leaves.contains_key(item)
    }

    /// The rectangle stored for `item`.
    pub fn aabb_of(&self, item: &K) -> Option<Aabb2> {
        self.leaves.get(item).map(|&id| self.nodes[id].aabb)
    }

    /// Bounds of everything in the tree.
    pub fn bounds(&self) -> Option<Aabb2> {
        self.root.map(|id| self.nodes[id].aabb)
    }

    /// Insert `item` with the bounds of `bounded`.
    ///
    /// An item that is already present is moved to the new bounds.
    pub fn insert(&mut self, item: K, bounded: &impl Bounded) {
        self.remove(&item);
        let leaf = self.nodes.insert(Node {
            aabb: bounded.aabb(),
            parent: None,
            height: 0,
            kind: NodeKind::Leaf { item },
        });
        self.leaves.insert(item, leaf);
        self.insert_leaf(leaf);
    }

    /// Remove `item`. Returns false (and does nothing) if it was absent.
    pub fn remove(&mut self, item: &K) -> bool {
        let Some(leaf) = self.leaves.remove(item) else {
            return false;
        };
        self.remove_leaf(leaf);
        self.nodes.remove(leaf);
        true
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.root = None;
    }

    /// Items whose rectangle overlaps `rect`, in no particular order.
    pub fn query(&self, rect: &Aabb2) -> Vec<K> {
        let mut out = Vec::new();
        self.query_with(rect, |item| out.push(item));
        out
    }

    /// Visit every item whose rectangle overlaps `rect`.
    pub fn query_with(&self, rect: &Aabb2, mut visit: impl FnMut(K)) {
        let Some(root) = self.root else {
            return;
        };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if !node.aabb.overlaps(rect) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { item } => visit(item),
                NodeKind::Internal { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
    }

    /// Height of the tree (0 when empty, 1 for a single leaf).
    pub fn depth(&self) -> usize {
        self.root
            .map_or(0, |root| self.nodes[root].height as usize + 1)
    }

    /// Check parent links, bounds containment and leaf bookkeeping.
    pub fn is_consistent(&self) -> bool {
        let Some(root) = self.root else {
            return self.leaves.is_empty() && self.nodes.is_empty();
        };
        if self.nodes[root].parent.is_some() {
            return false;
        }
        let mut leaf_count = 0;
        for (id, node) in &self.nodes {
            match node.kind {
                NodeKind::Leaf { item } => {
                    leaf_count += 1;
                    if self.leaves.get(&item) != Some(&id) {
                        return false;
                    }
                }
                NodeKind::Internal { left, right } => {
                    let (Some(l), Some(r)) = (self.nodes.get(left), self.nodes.get(right))
                    else {
                        return false;
                    };
                    if node.height != 1 + l.height.max(r.height) {
                        return false;
                    }
                    for c in [l, r] {
                        if c.parent != Some(id) || !node.aabb.contains(&c.aabb) {
                            return false;
                        }
                    }
                }
            }
        }
        leaf_count == self.leaves.len() && self.nodes.len() == 2 * leaf_count - 1
    }

    fn insert_leaf(&mut self, leaf: NodeId) {
        let Some(root) = self.root else {
            self.root = Some(leaf);
            return;
        };

        let leaf_aabb = self.nodes[leaf].aabb;
        let sibling = self.find_sibling(root, &leaf_aabb);

        let old_parent = self.nodes[sibling].parent;
        let new_parent = self.nodes.insert(Node {
            aabb: leaf_aabb.union(&self.nodes[sibling].aabb),
            parent: old_parent,
            height: self.nodes[sibling].height + 1,
            kind: NodeKind::Internal {
                left: sibling,
                right: leaf,
            },
        });
        self.nodes[sibling].parent = Some(new_parent);
        self.nodes[leaf].parent = Some(new_parent);

        match old_parent {
            Some(p) => {
                self.replace_child(p, sibling, new_parent);
                self.fix_upwards(Some(p));
            }
            None => self.root = Some(new_parent),
        }
    }

    fn find_sibling(&self, root: NodeId, leaf_aabb: &Aabb2) -> NodeId {
        let mut index = root;
        loop {
            let node = &self.nodes[index];
            let NodeKind::Internal { left, right } = node.kind else {
                return index;
            };

            let area = node.aabb.half_perimeter();
            let combined = node.aabb.union(leaf_aabb).half_perimeter();

            // Cost of making a new parent for this node and the leaf
            let cost = 2.0 * combined;
            // Minimum cost pushed down to the children
            let inheritance = 2.0 * (combined - area);

            let cost_left = self.descend_cost(left, leaf_aabb) + inheritance;
            let cost_right = self.descend_cost(right, leaf_aabb) + inheritance;

            if cost < cost_left && cost < cost_right {
                return index;
            }
            index = if cost_left <= cost_right { left } else { right };
        }
    }

    fn descend_cost(&self, child: NodeId, leaf_aabb: &Aabb2) -> f64 {
        let node = &self.nodes[child];
        let union = leaf_aabb.union(&node.aabb).half_perimeter();
        match node.kind {
            NodeKind::Leaf { .. } => union,
            NodeKind::Internal { .. } => union - node.aabb.half_perimeter(),
        }
    }

    fn remove_leaf(&mut self, leaf: NodeId) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }
        let Some(parent) = self.nodes[leaf].parent else {
            return;
        };
        let NodeKind::Internal { left, right } = self.nodes[parent].kind else {
            return;
        };
        let sibling = if left == leaf { right } else { left };
        let grand = self.nodes[parent].parent;

        self.nodes.remove(parent);
        self.nodes[sibling].parent = grand;
        match grand {
            Some(g) => {
                self.replace_child(g, parent, sibling);
                self.fix_upwards(Some(g));
            }
            None => self.root = Some(sibling),
        }
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if let NodeKind::Internal { left, right } = &mut self.nodes[parent].kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            }
        }
    }

    /// Rebalance and recompute bounds/heights from `start` up to the root.
    fn fix_upwards(&mut self, start: Option<NodeId>) {
        let mut cursor = start;
        while let Some(id) = cursor {
            let id = self.balance(id);
            self.update_node(id);
            cursor = self.nodes[id].parent;
        }
    }

    fn update_node(&mut self, id: NodeId) {
        if let NodeKind::Internal { left, right } = self.nodes[id].kind {
            let (l, r) = (&self.nodes[left], &self.nodes[right]);
            let aabb = l.aabb.union(&r.aabb);
            let height = 1 + l.height.max(r.height);
            let node = &mut self.nodes[id];
            node.aabb = aabb;
            node.height = height;
        }
    }

    /// Rotate the taller child of `a` up if the subtree is out of balance.
    /// Returns the node now at `a`'s position.
    fn balance(&mut self, a: NodeId) -> NodeId {
        let NodeKind::Internal { left, right } = self.nodes[a].kind else {
            return a;
        };
        let (hl, hr) = (self.nodes[left].height, self.nodes[right].height);
        if hr > hl + 1 {
            self.rotate_up(a, right)
        } else if hl > hr + 1 {
            self.rotate_up(a, left)
        } else {
            a
        }
    }

    /// Promote child `c` of `a`. `c` keeps its taller child and adopts `a`;
    /// `a` takes over `c`'s shorter child.
    fn rotate_up(&mut self, a: NodeId, c: NodeId) -> NodeId {
        let NodeKind::Internal { left: f, right: g } = self.nodes[c].kind else {
            return a;
        };
        let (tall, short) = if self.nodes[f].height > self.nodes[g].height {
            (f, g)
        } else {
            (g, f)
        };
        let grand = self.nodes[a].parent;

        self.replace_child(a, c, short);
        self.nodes[short].parent = Some(a);

        self.nodes[c].kind = NodeKind::Internal {
            left: a,
            right: tall,
        };
        self.nodes[c].parent = grand;
        self.nodes[a].parent = Some(c);

        match grand {
            Some(p) => self.replace_child(p, a, c),
            None => self.root = Some(c),
        }

        self.update_node(a);
        self.update_node(c);
        c
    }
}

impl<K: Copy + Eq + Hash> Default for AabbTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Aabb2 {
        Aabb2::new([x, y], [x + w, y + h])
    }

    fn brute_force(items: &[(u32, Aabb2)], q: &Aabb2) -> Vec<u32> {
        let mut v: Vec<u32> = items
            .iter()
            .filter(|(_, a)| a.overlaps(q))
            .map(|(k, _)| *k)
            .collect();
        v.sort_unstable();
        v
    }

    fn grid(n: u32) -> Vec<(u32, Aabb2)> {
        (0..n * n)
            .map(|i| {
                let x = f64::from(i % n);
                let y = f64::from(i / n);
                (i, rect(x, y, 0.5, 0.5))
            })
            .collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree: AabbTree<u32> = AabbTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
        assert!(tree.query(&rect(0.0, 0.0, 10.0, 10.0)).is_empty());
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_query_matches_brute_force() {
        let items = grid(12);
        let mut tree = AabbTree::new();
        for (k, a) in &items {
            tree.insert(*k, a);
        }
        assert_eq!(tree.len(), 144);
        assert!(tree.is_consistent());

        for q in [
            rect(0.0, 0.0, 0.1, 0.1),
            rect(2.2, 3.7, 3.0, 1.0),
            rect(-5.0, -5.0, 100.0, 100.0),
            rect(20.0, 20.0, 1.0, 1.0),
            rect(5.5, 5.5, 0.0, 0.0),
        ] {
            let mut got = tree.query(&q);
            got.sort_unstable();
            assert_eq!(got, brute_force(&items, &q));
        }
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut tree = AabbTree::new();
        tree.insert(1u32, &rect(0.0, 0.0, 1.0, 1.0));
        tree.insert(2u32, &rect(5.0, 5.0, 1.0, 1.0));
        assert!(tree.remove(&1));
        assert!(!tree.remove(&1));
        assert!(!tree.remove(&42));
        assert_eq!(tree.len(), 1);
        assert!(tree.is_consistent());
        assert!(tree.query(&rect(0.0, 0.0, 1.0, 1.0)).is_empty());
        assert!(tree.remove(&2));
        assert!(tree.is_empty());
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_reinsert_moves_item() {
        let mut tree = AabbTree::new();
        for (k, a) in grid(4) {
            tree.insert(k, &a);
        }
        tree.insert(0u32, &rect(50.0, 50.0, 1.0, 1.0));
        assert_eq!(tree.len(), 16);
        assert!(tree.is_consistent());
        assert!(!tree.query(&rect(0.0, 0.0, 0.2, 0.2)).contains(&0));
        assert_eq!(tree.query(&rect(50.5, 50.5, 0.0, 0.0)), vec![0]);
        assert_eq!(tree.aabb_of(&0), Some(rect(50.0, 50.0, 1.0, 1.0)));
    }

    #[test]
    fn test_interleaved_remove_insert_stays_consistent() {
        let items = grid(10);
        let mut tree = AabbTree::new();
        for (k, a) in &items {
            tree.insert(*k, a);
        }
        // Remove every third item, shift every fifth
        let mut live: Vec<(u32, Aabb2)> = Vec::new();
        for (k, a) in &items {
            if k % 3 == 0 {
                tree.remove(k);
            } else if k % 5 == 0 {
                let mut moved = *a;
                moved.expand(0.3);
                tree.insert(*k, &moved);
                live.push((*k, moved));
            } else {
                live.push((*k, *a));
            }
            assert!(tree.is_consistent());
        }
        let q = rect(1.9, 1.9, 4.0, 2.5);
        let mut got = tree.query(&q);
        got.sort_unstable();
        assert_eq!(got, brute_force(&live, &q));
    }

    #[test]
    fn test_depth_is_reasonable_for_sorted_input() {
        let mut tree = AabbTree::new();
        for i in 0..1024u32 {
            tree.insert(i, &rect(f64::from(i), 0.0, 0.9, 0.9));
        }
        // A degenerate list would have depth 1024
        assert!(tree.depth() < 64, "depth {}", tree.depth());
        assert!(tree.bounds().is_some());
    }
}
