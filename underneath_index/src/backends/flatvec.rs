// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat vector backend: linear scans over every live slot.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::types::Aabb2D;

/// Flat vector backend.
///
/// Queries visit slots in ascending slot order, which makes this backend handy
/// when a deterministic iteration order matters more than query cost.
pub struct FlatVec<T> {
    slots: Vec<Option<Aabb2D<T>>>,
}

impl<T> Default for FlatVec<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Debug for FlatVec<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let live = self.slots.iter().filter(|s| s.is_some()).count();
        f.debug_struct("FlatVec")
            .field("total_slots", &self.slots.len())
            .field("live_slots", &live)
            .finish_non_exhaustive()
    }
}

impl<T: Copy + PartialOrd + Debug> Backend<T> for FlatVec<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(aabb);
    }

    fn clear(&mut self) {
        self.slots.clear();
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, mut f: F) {
        for (slot, aabb) in self.slots.iter().enumerate() {
            if let Some(aabb) = aabb
                && aabb.overlaps(&rect)
            {
                f(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn visits_in_slot_order() {
        let mut flat = FlatVec::<i64>::default();
        flat.insert(2, Aabb2D::point(1, 1));
        flat.insert(0, Aabb2D::point(2, 2));
        flat.insert(1, Aabb2D::point(50, 50));
        let hits: Vec<_> = flat.query_rect(Aabb2D::new(0, 0, 5, 5)).collect();
        assert_eq!(hits, vec![0, 2]);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut flat = FlatVec::<f64>::default();
        flat.bulk_load(&[(0, Aabb2D::point(0.0, 0.0)), (1, Aabb2D::point(1.0, 1.0))]);
        flat.clear();
        assert_eq!(flat.query_rect(Aabb2D::new(-1.0, -1.0, 2.0, 2.0)).count(), 0);
    }
}
