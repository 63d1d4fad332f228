// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans (small, simple).
//! - `rtree`: generic R-tree (`T: Scalar`) with SAH-like split and STR bulk loading
//!   (aliases: `RTreeI64`, `RTreeF64`).
//! - `grid` (feature `backend_grid`): uniform grid with configurable cell size.
//!
//! SAH note
//! --------
//! The R-tree uses an SAH-like split heuristic.
//! For a split point `k` along a sorted axis we minimize:
//!
//! `cost(k) = area(LB_k) * k + area(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` are the bounding boxes of the first `k` and remaining `n - k` items.
//! We evaluate all `k` in O(n) per axis using prefix/suffix bounding boxes, and pick the lowest cost.
//! Accumulators are widened (`f64`→`f64`, `i64`→`i128`) for robust comparisons.
//!
//! Point entries have zero area, so for point-only workloads the cost degenerates to the
//! area of the enclosing boxes of the two halves, which still favors spatially tight splits.

pub(crate) mod flatvec;
#[cfg(feature = "backend_grid")]
pub(crate) mod grid;
pub(crate) mod rtree;

pub use flatvec::FlatVec;
#[cfg(feature = "backend_grid")]
pub use grid::{Grid, GridF64, GridI64, GridScalar};
pub use rtree::{RTree, RTreeF64, RTreeI64};
