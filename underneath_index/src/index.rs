// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::{FlatVec, RTree};
use crate::types::{Aabb2D, Scalar};

/// Handle for an entry, valid until the index is cleared.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys are intentionally 32-bit; higher bits are truncated by design."
    )]
    const fn new(idx: usize) -> Self {
        Self(idx as u32)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
struct Entry<T, P> {
    aabb: Aabb2D<T>,
    payload: P,
}

/// A generic AABB index parameterized by a spatial backend.
///
/// The index only grows: entries are staged with [`insert`][Self::insert] and
/// become visible to queries once [`commit`][Self::commit] hands them to the
/// backend. [`clear`][Self::clear] drops everything at once.
#[derive(Debug)]
pub struct IndexGeneric<T: Copy + PartialOrd + Debug, P: Copy + Debug, B: Backend<T>> {
    entries: Vec<Entry<T, P>>,
    /// Entries below this position have been handed to the backend.
    committed: usize,
    backend: B,
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T> + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T>,
{
    /// Create an empty index using an explicit backend instance.
    ///
    /// This is useful when higher layers want to choose a backend type or
    /// configure it before wiring it into the index.
    pub fn with_backend(backend: B) -> Self {
        Self {
            entries: Vec::new(),
            committed: 0,
            backend,
        }
    }

    /// Reserve space for at least `n` more entries.
    pub fn reserve(&mut self, n: usize) {
        self.entries.reserve(n);
    }

    /// Stage a new AABB with payload. Returns a stable handle `Key`.
    ///
    /// The entry is not returned by queries until the next [`commit`][Self::commit].
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> Key {
        self.entries.push(Entry { aabb, payload });
        Key::new(self.entries.len() - 1)
    }

    /// Hand all staged entries to the backend. Returns how many were committed.
    ///
    /// Staged entries are passed as one batch, so backends with a packed layout
    /// can bulk-load them when they are still empty.
    pub fn commit(&mut self) -> usize {
        let staged: Vec<(usize, Aabb2D<T>)> = self.entries[self.committed..]
            .iter()
            .enumerate()
            .map(|(i, e)| (self.committed + i, e.aabb))
            .collect();
        if !staged.is_empty() {
            self.backend.bulk_load(&staged);
        }
        self.committed = self.entries.len();
        staged.len()
    }

    /// Clear the index, staged entries included. Previously issued keys become invalid.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.committed = 0;
        self.backend.clear();
    }

    /// Number of entries, staged ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries waiting for the next commit.
    pub fn staged(&self) -> usize {
        self.entries.len() - self.committed
    }

    /// Look up an entry's AABB and payload.
    pub fn get(&self, key: Key) -> Option<(Aabb2D<T>, P)> {
        self.entries.get(key.idx()).map(|e| (e.aabb, e.payload))
    }

    /// Query for committed entries whose AABB intersects the given rectangle.
    pub fn query_rect(&self, rect: Aabb2D<T>) -> impl Iterator<Item = (Key, P)> + '_ {
        let mut out = Vec::new();
        self.visit_rect(rect, |k, p| out.push((k, p)));
        out.into_iter()
    }

    /// Visit committed entries whose AABB intersects the given rectangle (does not
    /// allocate result storage).
    ///
    /// Calls `f(key, payload)` for each match. The order is backend-dependent but
    /// stable for an unchanged index.
    pub fn visit_rect<F: FnMut(Key, P)>(&self, rect: Aabb2D<T>, mut f: F) {
        self.backend.visit_rect(rect, |i| {
            if let Some(e) = self.entries.get(i) {
                f(Key::new(i), e.payload);
            }
        });
    }

    /// Access the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Default index using a flat vector backend.
pub type Index<T, P> = IndexGeneric<T, P, FlatVec<T>>;

impl<T: Copy + PartialOrd + Debug, P: Copy + Debug> Default for Index<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, P: Copy + Debug> Index<T, P> {
    /// Create an R-tree-backed index with the default node fan-out.
    pub fn with_rtree() -> IndexGeneric<T, P, RTree<T>> {
        IndexGeneric::with_backend(RTree::default())
    }

    /// Build an R-tree-backed index in bulk from entries.
    ///
    /// The entries are committed and immediately queryable.
    pub fn with_rtree_bulk(entries: &[(Aabb2D<T>, P)]) -> IndexGeneric<T, P, RTree<T>> {
        let mut idx = Self::with_rtree();
        idx.reserve(entries.len());
        for &(aabb, payload) in entries {
            idx.insert(aabb, payload);
        }
        idx.commit();
        idx
    }
}

#[cfg(feature = "backend_grid")]
impl<T: crate::backends::GridScalar, P: Copy + Debug> Index<T, P> {
    /// Create a uniform-grid-backed index with the given cell size.
    pub fn with_grid(cell_size: T) -> IndexGeneric<T, P, crate::backends::Grid<T>> {
        IndexGeneric::with_backend(crate::backends::Grid::new(cell_size))
    }
}
