// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uniform grid backend for 2D AABBs.
//!
//! This backend buckets AABBs into fixed-size grid cells and answers queries
//! by touching only the cells overlapping the query rectangle. It suits
//! workloads where:
//! - entries are roughly uniformly spread (map features decoded per tile),
//! - the index only grows between clears, and
//! - query rectangles are small compared to the full world extent.

use alloc::vec::Vec;
use core::fmt::Debug;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar};

/// Scalar types supported by the grid backend.
///
/// This is kept separate from [`Scalar`] so that the grid implementation can
/// use type-specific logic (e.g., Euclidean division for integers).
pub trait GridScalar: Scalar {
    /// Map a scalar coordinate to a grid coordinate along one axis.
    ///
    /// The mapping is based on an origin and uniform cell size. Implementations
    /// are expected to be monotonic in `value` for fixed `origin` and
    /// `cell_size`.
    fn cell_coord(value: Self, origin: Self, cell_size: Self) -> i32;
}

impl GridScalar for f64 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Grid cell indices are intentionally i32; out-of-range values are saturated."
    )]
    #[inline]
    fn cell_coord(value: Self, origin: Self, cell_size: Self) -> i32 {
        debug_assert!(
            cell_size > 0.0,
            "grid cell_size must be strictly positive (f64)"
        );
        let t = (value - origin) / cell_size;
        let coord = t as i32;

        // Round towards -∞ (the cast above has already truncated).
        if t < 0.0 && (coord as Self) > t {
            coord.saturating_sub(1)
        } else {
            coord
        }
    }
}

impl GridScalar for i64 {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Grid cell indices are intentionally i32; out-of-range values are saturated."
    )]
    #[inline]
    fn cell_coord(value: Self, origin: Self, cell_size: Self) -> i32 {
        debug_assert!(
            cell_size > 0,
            "grid cell_size must be strictly positive (i64)"
        );
        let rel = value - origin;
        // Euclidean division rounds toward -∞, which matches floor for all
        // integer values.
        let coord = rel.div_euclid(cell_size);

        if coord >= Self::from(i32::MAX) {
            i32::MAX
        } else if coord <= Self::from(i32::MIN) {
            i32::MIN
        } else {
            coord as i32
        }
    }
}

/// Uniform grid backend with fixed cell size.
pub struct Grid<T: GridScalar> {
    cell_size: T,
    origin_x: T,
    origin_y: T,
    cells: HashMap<(i32, i32), Cell>,
    slots: Vec<Option<Aabb2D<T>>>,
}

#[derive(Default)]
struct Cell {
    slots: SmallVec<[usize; 8]>,
}

impl<T: GridScalar> Debug for Grid<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total_slots = self.slots.len();
        let live_slots = self.slots.iter().filter(|s| s.is_some()).count();
        let num_cells = self.cells.len();
        f.debug_struct("Grid")
            .field("cell_size", &self.cell_size)
            .field("origin_x", &self.origin_x)
            .field("origin_y", &self.origin_y)
            .field("total_slots", &total_slots)
            .field("live_slots", &live_slots)
            .field("cells", &num_cells)
            .finish_non_exhaustive()
    }
}

impl<T: GridScalar> Grid<T> {
    /// Create a new grid backend with the given cell size and origin at (0, 0).
    pub fn new(cell_size: T) -> Self {
        Self::with_origin(cell_size, T::zero(), T::zero())
    }

    /// Create a new grid backend with the given cell size and origin.
    pub fn with_origin(cell_size: T, origin_x: T, origin_y: T) -> Self {
        debug_assert!(cell_size > T::zero(), "cell_size must be strictly positive");
        Self {
            cell_size,
            origin_x,
            origin_y,
            cells: HashMap::new(),
            slots: Vec::new(),
        }
    }

    fn cell_range(&self, min: T, max: T, origin: T) -> (i32, i32) {
        let c0 = T::cell_coord(min, origin, self.cell_size);
        let c1 = T::cell_coord(max, origin, self.cell_size);
        if c0 <= c1 { (c0, c1) } else { (c1, c0) }
    }
}

impl<T: GridScalar> Backend<T> for Grid<T> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if !aabb.is_comparable() {
            return;
        }
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        let (ix0, ix1) = self.cell_range(aabb.min_x, aabb.max_x, self.origin_x);
        let (iy0, iy1) = self.cell_range(aabb.min_y, aabb.max_y, self.origin_y);
        for ix in ix0..=ix1 {
            for iy in iy0..=iy1 {
                self.cells.entry((ix, iy)).or_default().slots.push(slot);
            }
        }
        self.slots[slot] = Some(aabb);
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.slots.clear();
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Aabb2D<T>, mut f: F) {
        let (ix0, ix1) = self.cell_range(rect.min_x, rect.max_x, self.origin_x);
        let (iy0, iy1) = self.cell_range(rect.min_y, rect.max_y, self.origin_y);

        // Boxes spanning several cells are listed once per cell.
        let mut seen: HashSet<usize> = HashSet::new();

        let mut visit_cell = |cell: &Cell| {
            for &slot in &cell.slots {
                if !seen.insert(slot) {
                    continue;
                }
                if let Some(Some(aabb)) = self.slots.get(slot)
                    && aabb.overlaps(&rect)
                {
                    f(slot);
                }
            }
        };

        // Large query ranges walk the occupied cells instead of the range.
        let span = (i64::from(ix1) - i64::from(ix0) + 1)
            .saturating_mul(i64::from(iy1) - i64::from(iy0) + 1);
        if usize::try_from(span).is_ok_and(|span| span <= self.cells.len()) {
            for ix in ix0..=ix1 {
                for iy in iy0..=iy1 {
                    if let Some(cell) = self.cells.get(&(ix, iy)) {
                        visit_cell(cell);
                    }
                }
            }
        } else {
            for (_, cell) in self
                .cells
                .iter()
                .filter(|((ix, iy), _)| (ix0..=ix1).contains(ix) && (iy0..=iy1).contains(iy))
            {
                visit_cell(cell);
            }
        }
    }
}

/// Grid backend over `f64` coordinates.
pub type GridF64 = Grid<f64>;
/// Grid backend over `i64` coordinates.
pub type GridI64 = Grid<i64>;
