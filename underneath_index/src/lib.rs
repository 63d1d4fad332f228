// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Underneath Index: a grow-only 2D AABB index for point features.
//!
//! Underneath Index is the spatial building block under the POI overlay.
//!
//! - Stage axis-aligned bounding boxes (AABBs) with small `Copy` payloads.
//! - Make a batch queryable with [`IndexGeneric::commit`].
//! - Query by intersecting rectangle. Rectangle edges are inclusive, so degenerate
//!   point boxes on the boundary of the query are reported.
//! - Drop everything at once with [`IndexGeneric::clear`].
//!
//! Entries are never moved or removed individually. It is generic over the scalar
//! type `T` and does not depend on any geometry crate.
//!
//! Backends are pluggable via a simple trait so you can swap the spatial strategy without API churn.
//! The default backend is a flat vector (linear scan). Additional backends include a uniform grid
//! (feature `backend_grid`) and an R-tree with SAH-like splits and packed bulk loading.
//!
//! ## Features
//!
//! - `backend_grid` *(default)*: enables a uniform grid backend backed by `hashbrown`. Disable
//!   this feature to avoid the `hashbrown` dependency and grid types.
//!
//! # Example
//!
//! ```rust
//! use underneath_index::{Index, Aabb2D};
//!
//! let mut idx: Index<i64, u32> = Index::new();
//! idx.insert(Aabb2D::point(2, 3), 1);
//! idx.insert(Aabb2D::point(40, 40), 2);
//!
//! // Nothing is visible before the batch is committed.
//! assert_eq!(idx.query_rect(Aabb2D::new(0, 0, 10, 10)).count(), 0);
//! assert_eq!(idx.commit(), 2);
//!
//! let hits: Vec<_> = idx.query_rect(Aabb2D::new(0, 0, 10, 10)).collect();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].1, 1);
//! ```
//!
//! The R-tree is the usual choice for scattered points:
//!
//! ```rust
//! use underneath_index::{Index, Aabb2D};
//!
//! let mut idx = Index::<f64, u32>::with_rtree();
//! for i in 0..100_u32 {
//!     idx.insert(Aabb2D::point(f64::from(i), f64::from(i)), i);
//! }
//! idx.commit();
//!
//! let hits: Vec<_> = idx.query_rect(Aabb2D::new(9.5, 9.5, 12.0, 12.0)).collect();
//! // (10, 10), (11, 11) and (12, 12) on the edge.
//! assert_eq!(hits.len(), 3);
//! ```
//!
//! With the `backend_grid` feature enabled (default), you can also use a uniform grid backend:
//!
//! ```rust
//! # #[cfg(feature = "backend_grid")]
//! # {
//! use underneath_index::{Index, Aabb2D};
//!
//! // Use a grid backend (f64) with a 64-unit cell size.
//! let mut idx = Index::<f64, u32>::with_grid(64.0);
//! idx.insert(Aabb2D::point(5.0, 5.0), 1);
//! idx.commit();
//!
//! assert_eq!(idx.query_rect(Aabb2D::new(0.0, 0.0, 10.0, 10.0)).count(), 1);
//! # }
//! ```
//!
//! ## Choosing a backend
//!
//! - `FlatVec` (default): simplest and smallest, linear scans. Results come back in
//!   insertion order.
//! - `GridF64`/`GridI64` *(feature `backend_grid`)*: uniform grid with configurable
//!   cell size. A good fit when points are spread evenly and query rectangles are small
//!   compared to the world extent.
//! - `RTreeF64`/`RTreeI64`: R-tree with SAH-like splits and widened metrics; good
//!   general-purpose index when the distribution is irregular.
//!   See the [`backends`] docs for a brief SAH overview.
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates. Debug builds may assert.

#![no_std]

extern crate alloc;

mod backend;
pub mod backends;
mod index;
mod types;

pub use backend::Backend;
pub use index::{Index, IndexGeneric, Key};
pub use types::{Aabb2D, Scalar, ScalarAcc};
