// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay configuration, fixed at construction.

use std::rc::Rc;

use crate::decoder::FeatureFilter;
use crate::feature::RawFeature;
use crate::query::{DEFAULT_TOLERANCE, DefaultDuplicate, DuplicatePredicate};
use crate::spatial::SpatialBackend;

/// Default tile edge length in projected units.
pub const DEFAULT_TILE_SIZE: f64 = 256.0;

/// Host-supplied configuration of an [`Overlay`][crate::Overlay].
///
/// ```
/// use underneath::{OverlayOptions, SpatialBackend};
///
/// let options = OverlayOptions::default()
///     .with_layers(["poi_label"])
///     .with_tolerance(40.0)
///     .with_backend(SpatialBackend::RTree { max_entries: 16 })
///     .with_filter(|f| f.properties.contains_key("name"));
/// assert!(options.lazy);
/// assert_eq!(options.layers, ["poi_label"]);
/// ```
#[derive(Clone)]
pub struct OverlayOptions {
    /// Layers to extract, in the order their features are indexed.
    pub layers: Vec<String>,
    /// Keeps only the raw features it accepts. `None` keeps everything.
    pub filter: Option<FeatureFilter>,
    /// Removes repeats from query results.
    pub duplicate: Rc<dyn DuplicatePredicate>,
    /// Tolerance of queries that do not pass one, in projected units.
    pub tolerance: f64,
    /// Load tiles only when a query needs them.
    ///
    /// When `false`, the host loads the visible tiles with
    /// [`Overlay::load_bounds`][crate::Overlay::load_bounds].
    pub lazy: bool,
    /// Tile edge length in projected units.
    pub tile_size: f64,
    /// Range-search structure of the spatial index.
    pub backend: SpatialBackend,
}

impl core::fmt::Debug for OverlayOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverlayOptions")
            .field("layers", &self.layers)
            .field("filter", &self.filter.is_some())
            .field("tolerance", &self.tolerance)
            .field("lazy", &self.lazy)
            .field("tile_size", &self.tile_size)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            filter: None,
            duplicate: Rc::new(DefaultDuplicate::default()),
            tolerance: DEFAULT_TOLERANCE,
            lazy: true,
            tile_size: DEFAULT_TILE_SIZE,
            backend: SpatialBackend::default(),
        }
    }
}

impl OverlayOptions {
    /// Set the layers to extract.
    pub fn with_layers<S: Into<String>>(mut self, layers: impl IntoIterator<Item = S>) -> Self {
        self.layers = layers.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only features accepted by `filter`.
    pub fn with_filter(mut self, filter: impl Fn(&RawFeature) -> bool + 'static) -> Self {
        self.filter = Some(Rc::new(filter));
        self
    }

    /// Replace the duplicate predicate.
    pub fn with_duplicate(mut self, duplicate: impl DuplicatePredicate + 'static) -> Self {
        self.duplicate = Rc::new(duplicate);
        self
    }

    /// Set the default query tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Choose between lazy and eager tile loading.
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Set the tile edge length in projected units.
    pub fn with_tile_size(mut self, tile_size: f64) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Choose the spatial index backend.
    pub fn with_backend(mut self, backend: SpatialBackend) -> Self {
        self.backend = backend;
        self
    }
}
