// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::types::Aabb2D;
use core::fmt::Debug;

/// Spatial backend abstraction used by [`IndexGeneric`][crate::IndexGeneric].
///
/// Backends only ever grow between two calls to [`clear`][Backend::clear]; the
/// index built on top of them never moves or removes individual slots.
pub trait Backend<T: Copy + PartialOrd + Debug> {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Clear all spatial structures.
    fn clear(&mut self);

    /// Visit slots whose AABB intersects the rectangle.
    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, f: F);

    /// Query slots whose AABB intersects the rectangle.
    ///
    /// The default implementation collects [`visit_rect`][Backend::visit_rect].
    fn query_rect<'a>(&'a self, rect: Aabb2D<T>) -> Box<dyn Iterator<Item = usize> + 'a> {
        let mut out = Vec::new();
        self.visit_rect(rect, |i| out.push(i));
        Box::new(out.into_iter())
    }

    /// Load a batch of slots at once.
    ///
    /// Called by the index when a batch is committed into an empty backend. The
    /// default implementation inserts one slot at a time; backends with a packed
    /// bulk layout override it. Either way the observable query results are the same.
    fn bulk_load(&mut self, items: &[(usize, Aabb2D<T>)]) {
        for &(slot, aabb) in items {
            self.insert(slot, aabb);
        }
    }
}
