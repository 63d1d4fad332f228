// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree backend generic over scalar `T: Scalar` with SAH-like split.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar, cmp_t};

/// Default maximum fan-out of a node.
pub(crate) const DEFAULT_MAX_CHILDREN: usize = 9;

/// Smallest fan-out accepted by [`RTree::with_max_children`].
const MIN_MAX_CHILDREN: usize = 4;

/// R-tree backend using SAH-like splits and widened accumulator metrics.
///
/// Entries can be inserted one at a time or loaded in bulk with a packed
/// sort-tile-recursive layout; both produce the same query results.
pub struct RTree<T: Scalar> {
    max_children: usize,
    min_children: usize,
    root: Option<NodeIdx>,
    arena: Vec<RNode<T>>,
    len: usize,
}

#[derive(Clone)]
struct RNode<T: Scalar> {
    bbox: Aabb2D<T>,
    leaf: bool,
    children: Vec<RChild<T>>,
}

#[derive(Copy, Clone)]
enum RChild<T: Scalar> {
    Node(NodeIdx),
    Item { slot: usize, bbox: Aabb2D<T> },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

impl<T: Scalar> Default for RTree<T> {
    fn default() -> Self {
        Self::with_max_children(DEFAULT_MAX_CHILDREN)
    }
}

impl<T: Scalar> RTree<T> {
    /// Create an empty tree whose nodes hold at most `max_children` entries.
    ///
    /// Values below 4 are raised to 4. The minimum fill used when splitting is
    /// 40% of the maximum, and never less than 2.
    pub fn with_max_children(max_children: usize) -> Self {
        let max_children = max_children.max(MIN_MAX_CHILDREN);
        Self {
            max_children,
            min_children: (max_children * 2).div_ceil(5).max(2),
            root: None,
            arena: Vec::new(),
            len: 0,
        }
    }

    /// Maximum fan-out of a node.
    pub fn max_children(&self) -> usize {
        self.max_children
    }

    /// Number of entries stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn child_bbox(arena: &[RNode<T>], child: &RChild<T>) -> Aabb2D<T> {
        match child {
            RChild::Node(i) => arena[i.0].bbox,
            RChild::Item { bbox, .. } => *bbox,
        }
    }

    fn node_bbox(arena: &[RNode<T>], children: &[RChild<T>]) -> Aabb2D<T> {
        let mut it = children.iter();
        let first = match it.next() {
            Some(c) => Self::child_bbox(arena, c),
            None => Aabb2D::new(T::zero(), T::zero(), T::zero(), T::zero()),
        };
        it.fold(first, |acc, c| acc.union(Self::child_bbox(arena, c)))
    }

    fn sort_along(arena: &[RNode<T>], children: &mut [RChild<T>], axis: Axis) {
        children.sort_by(|a, b| {
            let (a, b) = (Self::child_bbox(arena, a), Self::child_bbox(arena, b));
            match axis {
                Axis::X => cmp_t(&a.center_x(), &b.center_x()),
                Axis::Y => cmp_t(&a.center_y(), &b.center_y()),
            }
        });
    }

    fn choose_child(arena: &[RNode<T>], children: &[RChild<T>], bbox: &Aabb2D<T>) -> usize {
        let mut best_idx = 0_usize;
        let mut best_cost: Option<T::Acc> = None;
        for (i, c) in children.iter().enumerate() {
            let cb = Self::child_bbox(arena, c);
            let cost = cb.union(*bbox).area() - cb.area();
            if best_cost.is_none_or(|bc| cost < bc) {
                best_cost = Some(cost);
                best_idx = i;
            }
        }
        best_idx
    }

    /// SAH-like split: sort along an axis, precompute prefix/suffix AABBs, and
    /// choose `k` that minimizes `area(LB_k) * k + area(RB_k) * (n - k)`.
    fn split_children(
        arena: &[RNode<T>],
        mut children: Vec<RChild<T>>,
        min_children: usize,
    ) -> (Vec<RChild<T>>, Vec<RChild<T>>) {
        let n = children.len();
        let mut best: Option<(T::Acc, Axis, usize)> = None;
        if n >= 2 * min_children {
            for axis in [Axis::X, Axis::Y] {
                Self::sort_along(arena, &mut children, axis);
                let boxes: Vec<Aabb2D<T>> = children
                    .iter()
                    .map(|c| Self::child_bbox(arena, c))
                    .collect();

                // Prefix and suffix bounding boxes make every candidate O(1).
                let mut prefix = boxes.clone();
                for i in 1..n {
                    prefix[i] = prefix[i - 1].union(prefix[i]);
                }
                let mut suffix = boxes;
                for i in (0..n - 1).rev() {
                    suffix[i] = suffix[i].union(suffix[i + 1]);
                }

                for k in min_children..=(n - min_children) {
                    let cost = prefix[k - 1].area() * T::acc_from_usize(k)
                        + suffix[k].area() * T::acc_from_usize(n - k);
                    if best.is_none_or(|(bc, _, _)| cost < bc) {
                        best = Some((cost, axis, k));
                    }
                }
            }
        }
        let (axis, k) = best.map_or((Axis::X, n / 2), |(_, axis, k)| (axis, k));
        Self::sort_along(arena, &mut children, axis);
        let right = children.split_off(k);
        (children, right)
    }

    /// Insert below `node_idx`. Returns the arena index of a new right sibling
    /// when the node had to be split.
    fn insert_node(
        arena: &mut Vec<RNode<T>>,
        node_idx: usize,
        slot: usize,
        bbox: Aabb2D<T>,
        max_children: usize,
        min_children: usize,
    ) -> Option<usize> {
        if !arena[node_idx].leaf {
            let idx = Self::choose_child(arena, &arena[node_idx].children, &bbox);
            let split = match arena[node_idx].children[idx] {
                RChild::Node(child) => {
                    Self::insert_node(arena, child.0, slot, bbox, max_children, min_children)
                }
                RChild::Item { .. } => None,
            };
            arena[node_idx].bbox = arena[node_idx].bbox.union(bbox);
            let new_right = split?;
            arena[node_idx]
                .children
                .insert(idx + 1, RChild::Node(NodeIdx(new_right)));
        } else {
            let node = &mut arena[node_idx];
            node.children.push(RChild::Item { slot, bbox });
            node.bbox = node.bbox.union(bbox);
        }

        if arena[node_idx].children.len() <= max_children {
            return None;
        }

        // Overflow: split the node in two, keeping the left half in place.
        let children = core::mem::take(&mut arena[node_idx].children);
        let (left, right) = Self::split_children(arena, children, min_children);
        let leaf = arena[node_idx].leaf;
        let l_bbox = Self::node_bbox(arena, &left);
        let r_bbox = Self::node_bbox(arena, &right);
        arena[node_idx].children = left;
        arena[node_idx].bbox = l_bbox;
        arena.push(RNode {
            bbox: r_bbox,
            leaf,
            children: right,
        });
        Some(arena.len() - 1)
    }

    /// Group `level` into parents of at most `max_children` children using one
    /// sort-tile-recursive pass.
    fn pack_level(
        arena: &mut Vec<RNode<T>>,
        mut level: Vec<RChild<T>>,
        leaf: bool,
        max_children: usize,
    ) -> Vec<RChild<T>> {
        let n = level.len();
        let num_parents = n.div_ceil(max_children);
        // Roughly square tiles: ceil(sqrt(parents)) vertical slices.
        let mut slice_count = num_parents.isqrt().max(1);
        if slice_count * slice_count < num_parents {
            slice_count += 1;
        }
        let slice_size = n.div_ceil(slice_count);

        Self::sort_along(arena, &mut level, Axis::X);
        let mut parents = Vec::with_capacity(num_parents);
        for slice in level.chunks_mut(slice_size) {
            Self::sort_along(arena, slice, Axis::Y);
            for chunk in slice.chunks(max_children) {
                let children = chunk.to_vec();
                let bbox = Self::node_bbox(arena, &children);
                arena.push(RNode {
                    bbox,
                    leaf,
                    children,
                });
                parents.push(RChild::Node(NodeIdx(arena.len() - 1)));
            }
        }
        parents
    }

    fn bulk_build(&mut self, items: &[(usize, Aabb2D<T>)]) {
        let mut level: Vec<RChild<T>> = items
            .iter()
            .map(|&(slot, bbox)| RChild::Item { slot, bbox })
            .collect();
        let mut leaf = true;
        // Always pack at least once so the root is a node, never a bare item.
        loop {
            level = Self::pack_level(&mut self.arena, level, leaf, self.max_children);
            leaf = false;
            if level.len() <= 1 {
                break;
            }
        }
        self.root = match level.first() {
            Some(RChild::Node(idx)) => Some(*idx),
            _ => None,
        };
        self.len = items.len();
    }
}

impl<T: Scalar> Backend<T> for RTree<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if !aabb.is_comparable() {
            return;
        }
        self.len += 1;
        let Some(root_idx) = self.root else {
            self.arena.push(RNode {
                bbox: aabb,
                leaf: true,
                children: vec![RChild::Item { slot, bbox: aabb }],
            });
            self.root = Some(NodeIdx(self.arena.len() - 1));
            return;
        };
        let split = Self::insert_node(
            &mut self.arena,
            root_idx.0,
            slot,
            aabb,
            self.max_children,
            self.min_children,
        );
        if let Some(right_idx) = split {
            // Grow a new root above the old root and its new sibling.
            let bbox = self.arena[root_idx.0]
                .bbox
                .union(self.arena[right_idx].bbox);
            self.arena.push(RNode {
                bbox,
                leaf: false,
                children: vec![RChild::Node(root_idx), RChild::Node(NodeIdx(right_idx))],
            });
            self.root = Some(NodeIdx(self.arena.len() - 1));
        }
    }

    fn clear(&mut self) {
        self.root = None;
        self.arena.clear();
        self.len = 0;
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, mut f: F) {
        let Some(root_idx) = self.root else {
            return;
        };
        let mut stack = vec![root_idx];
        while let Some(i) = stack.pop() {
            let n = &self.arena[i.0];
            if !n.bbox.overlaps(&rect) {
                continue;
            }
            for c in &n.children {
                match c {
                    RChild::Item { slot, bbox } if bbox.overlaps(&rect) => f(*slot),
                    RChild::Item { .. } => {}
                    RChild::Node(ci) => stack.push(*ci),
                }
            }
        }
    }

    fn bulk_load(&mut self, items: &[(usize, Aabb2D<T>)]) {
        if !self.is_empty() || items.is_empty() {
            for &(slot, aabb) in items {
                self.insert(slot, aabb);
            }
            return;
        }
        let items: Vec<(usize, Aabb2D<T>)> = items
            .iter()
            .copied()
            .filter(|(_, aabb)| aabb.is_comparable())
            .collect();
        if !items.is_empty() {
            self.bulk_build(&items);
        }
    }
}

impl<T: Scalar> Debug for RTree<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("max_children", &self.max_children)
            .field("min_children", &self.min_children)
            .field("arena_nodes", &self.arena.len())
            .field("len", &self.len)
            .field("has_root", &self.root.is_some())
            .finish_non_exhaustive()
    }
}

/// R-tree with i64 coordinates and i128 metrics.
pub type RTreeI64 = RTree<i64>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64 = RTree<f64>;
