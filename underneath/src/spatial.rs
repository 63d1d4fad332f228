// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial index over projected point features.
//!
//! Each feature is stored as a degenerate box at its projected position in an
//! [`underneath_index`] index. The working set grows tile by tile and is only
//! ever dropped as a whole.

use std::rc::Rc;

use kurbo::{Point, Rect};
use underneath_index::backends::{FlatVec, Grid, RTree};
use underneath_index::{Aabb2D, Index, IndexGeneric};

use crate::feature::PointFeature;

/// Default R-tree node fan-out.
pub const DEFAULT_MAX_ENTRIES: usize = 9;

/// Cell size used when a grid is configured with an unusable one.
const FALLBACK_CELL_SIZE: f64 = 256.0;

/// Range-search structure backing a [`SpatialIndex`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SpatialBackend {
    /// R-tree with at most `max_entries` children per node.
    RTree {
        /// Node fan-out. Values below 4 are raised to 4.
        max_entries: usize,
    },
    /// Uniform grid of square cells in projected units.
    Grid {
        /// Cell edge length. Must be positive and finite.
        cell_size: f64,
    },
    /// Linear scan. Only sensible for a handful of features.
    Linear,
}

impl Default for SpatialBackend {
    fn default() -> Self {
        Self::RTree {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

enum Tree {
    RTree(IndexGeneric<f64, usize, RTree<f64>>),
    Grid(IndexGeneric<f64, usize, Grid<f64>>),
    Linear(IndexGeneric<f64, usize, FlatVec<f64>>),
}

macro_rules! with_tree {
    ($tree:expr, $idx:ident => $body:expr) => {
        match $tree {
            Tree::RTree($idx) => $body,
            Tree::Grid($idx) => $body,
            Tree::Linear($idx) => $body,
        }
    };
}

/// Grow-only index of point features keyed by projected position.
pub struct SpatialIndex {
    tree: Tree,
    backend: SpatialBackend,
    features: Vec<Rc<PointFeature>>,
}

impl core::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("backend", &self.backend)
            .field("len", &self.features.len())
            .finish_non_exhaustive()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(SpatialBackend::default())
    }
}

impl SpatialIndex {
    /// Create an empty index on `backend`.
    pub fn new(backend: SpatialBackend) -> Self {
        let backend = match backend {
            SpatialBackend::Grid { cell_size } if !(cell_size.is_finite() && cell_size > 0.0) => {
                tracing::warn!(cell_size, "unusable grid cell size, using {FALLBACK_CELL_SIZE}");
                SpatialBackend::Grid {
                    cell_size: FALLBACK_CELL_SIZE,
                }
            }
            other => other,
        };
        let tree = match backend {
            SpatialBackend::RTree { max_entries } => Tree::RTree(IndexGeneric::with_backend(
                RTree::with_max_children(max_entries),
            )),
            SpatialBackend::Grid { cell_size } => Tree::Grid(Index::with_grid(cell_size)),
            SpatialBackend::Linear => Tree::Linear(Index::new()),
        };
        Self {
            tree,
            backend,
            features: Vec::new(),
        }
    }

    /// The backend in use.
    pub fn backend(&self) -> SpatialBackend {
        self.backend
    }

    /// Insert one feature. It is searchable right away.
    pub fn insert(&mut self, feature: Rc<PointFeature>) {
        self.stage(feature);
        with_tree!(&mut self.tree, t => t.commit());
    }

    /// Insert a batch of features, making them searchable together.
    ///
    /// A batch landing in an empty index is bulk-loaded. Returns how many were inserted.
    pub fn extend(&mut self, features: impl IntoIterator<Item = Rc<PointFeature>>) -> usize {
        for feature in features {
            self.stage(feature);
        }
        with_tree!(&mut self.tree, t => t.commit())
    }

    fn stage(&mut self, feature: Rc<PointFeature>) {
        let p = feature.position;
        let slot = self.features.len();
        with_tree!(&mut self.tree, t => t.insert(Aabb2D::point(p.x, p.y), slot));
        self.features.push(feature);
    }

    /// Every feature inside `rect`, edges included, in index iteration order.
    pub fn search(&self, rect: Rect) -> Vec<Rc<PointFeature>> {
        let rect = rect.abs();
        let query = Aabb2D::new(rect.x0, rect.y0, rect.x1, rect.y1);
        let mut out = Vec::new();
        with_tree!(&self.tree, t => t.visit_rect(query, |_, slot| {
            if let Some(f) = self.features.get(slot) {
                out.push(Rc::clone(f));
            }
        }));
        out
    }

    /// Features within `tolerance / 2` of `point` along each axis.
    pub fn search_around(&self, point: Point, tolerance: f64) -> Vec<Rc<PointFeature>> {
        self.search(query_rect(point, tolerance))
    }

    /// Drop every feature.
    pub fn clear(&mut self) {
        with_tree!(&mut self.tree, t => t.clear());
        self.features.clear();
    }

    /// Number of indexed features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Indexed features in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rc<PointFeature>> + '_ {
        self.features.iter()
    }
}

/// Square query box of edge `tolerance` centered on `point`.
pub fn query_rect(point: Point, tolerance: f64) -> Rect {
    let half = tolerance / 2.0;
    Rect::new(point.x - half, point.y - half, point.x + half, point.y + half)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Properties;
    use crate::projection::LngLat;
    use crate::tile::TileKey;

    fn feature_at(id: u64, x: f64, y: f64) -> Rc<PointFeature> {
        Rc::new(PointFeature {
            tile: TileKey::new(0, 0),
            layer: "poi".into(),
            id: Some(id),
            properties: Properties::new(),
            geometry: LngLat::default(),
            position: Point::new(x, y),
        })
    }

    fn ids(features: &[Rc<PointFeature>]) -> Vec<u64> {
        let mut ids: Vec<u64> = features.iter().filter_map(|f| f.id).collect();
        ids.sort_unstable();
        ids
    }

    fn all_backends() -> [SpatialBackend; 3] {
        [
            SpatialBackend::default(),
            SpatialBackend::Grid { cell_size: 32.0 },
            SpatialBackend::Linear,
        ]
    }

    #[test]
    fn single_inserts_are_searchable() {
        for backend in all_backends() {
            let mut index = SpatialIndex::new(backend);
            index.insert(feature_at(1, 10.0, 10.0));
            index.insert(feature_at(2, 10.0, 11.0));
            index.insert(feature_at(3, 50.0, 50.0));
            assert_eq!(ids(&index.search_around(Point::new(10.0, 10.0), 4.0)), [1, 2], "{backend:?}");
        }
    }

    #[test]
    fn batches_on_top_of_batches() {
        for backend in all_backends() {
            let mut index = SpatialIndex::new(backend);
            let first: Vec<_> = (0..50_u32)
                .map(|i| feature_at(u64::from(i), f64::from(i), 0.0))
                .collect();
            assert_eq!(index.extend(first), 50);
            let second: Vec<_> = (50..100_u32)
                .map(|i| feature_at(u64::from(i), f64::from(i), 0.0))
                .collect();
            assert_eq!(index.extend(second), 50);
            assert_eq!(index.len(), 100);
            let hits = index.search(Rect::new(45.0, -1.0, 55.0, 1.0));
            assert_eq!(ids(&hits), (45..=55).collect::<Vec<_>>(), "{backend:?}");
        }
    }

    #[test]
    fn nan_position_does_not_hide_valid_features() {
        for backend in all_backends() {
            let mut index = SpatialIndex::new(backend);
            index.insert(feature_at(1, f64::NAN, f64::NAN));
            index.insert(feature_at(2, 10.0, 10.0));
            index.extend(
                (3..40_u32).map(|i| feature_at(u64::from(i), f64::from(i) * 4.0 - 2.0, 10.0)),
            );
            let hits = index.search_around(Point::new(10.0, 10.0), 4.0);
            assert_eq!(ids(&hits), [2, 3], "{backend:?}");
        }
    }

    #[test]
    fn boundary_points_are_included() {
        let mut index = SpatialIndex::default();
        index.insert(feature_at(7, 12.0, 8.0));
        assert_eq!(ids(&index.search_around(Point::new(10.0, 10.0), 4.0)), [7]);
        assert!(index.search_around(Point::new(10.0, 10.0), 3.9).is_empty());
    }

    #[test]
    fn clear_empties_the_index() {
        let mut index = SpatialIndex::default();
        index.extend((0..20).map(|i| feature_at(i, 1.0, 1.0)));
        index.clear();
        assert!(index.is_empty());
        assert!(index.search(Rect::new(-10.0, -10.0, 10.0, 10.0)).is_empty());
        index.insert(feature_at(1, 1.0, 1.0));
        assert_eq!(index.search(Rect::new(0.0, 0.0, 2.0, 2.0)).len(), 1);
    }

    #[test]
    fn bad_grid_cell_size_falls_back() {
        let index = SpatialIndex::new(SpatialBackend::Grid { cell_size: 0.0 });
        assert_eq!(index.backend(), SpatialBackend::Grid { cell_size: 256.0 });
    }
}
