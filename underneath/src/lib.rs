// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Underneath: a tile-backed point-of-interest index for map overlays.
//!
//! Underneath answers "what is near this point?" against the vector tiles a map
//! view has loaded. It owns the moving parts between the tiles and the answer:
//!
//! - a [`TileStore`] tracking which tiles are pending, loaded or failed, with at
//!   most one fetch in flight per tile,
//! - a [`FeatureDecoder`] extracting point features from configured layers,
//! - a [`SpatialIndex`] over projected positions (an [`underneath_index`] R-tree
//!   by default),
//! - a [`QueryEngine`] returning features within a tolerance box, nearest first,
//!   with duplicates removed by a pluggable [`DuplicatePredicate`],
//! - an [`Overlay`] tying these together with a reset lifecycle and an
//!   [`Observers`] registry for notifications.
//!
//! I/O stays with the host. The overlay hands out [`FetchRequest`]s and the host
//! reports each outcome back, so it can fetch over HTTP, from a tile archive or
//! from memory in tests.
//!
//! ## Features
//!
//! - `mvt`: enables [`MvtReader`], a [`TileReader`] for Mapbox Vector Tiles
//!   backed by `mvt-reader`.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use kurbo::Point;
//! use underneath::{
//!     DecodeError, Overlay, OverlayOptions, QueryOutcome, RawFeature, RawLayer, TileKey,
//!     UrlTemplate,
//! };
//!
//! // A reader for a toy format: every tile holds one café in its top-left corner.
//! let reader = |_: &[u8]| -> Result<Vec<RawLayer>, DecodeError> {
//!     Ok(vec![RawLayer {
//!         name: "poi".into(),
//!         extent: 4096,
//!         features: vec![RawFeature::point(0.0, 0.0).with_property("name", "Café")],
//!     }])
//! };
//! let options = OverlayOptions::default().with_layers(["poi"]);
//! let mut overlay = Overlay::new(reader, UrlTemplate::new("https://tiles.test/{z}/{x}/{y}.pbf"), options)
//!     .with_zoom(2);
//!
//! // The first query waits for its tile.
//! let answer = Rc::new(RefCell::new(None));
//! let slot = Rc::clone(&answer);
//! let outcome = overlay.query(Point::new(260.0, 2.0), None, move |r| *slot.borrow_mut() = Some(r));
//! assert_eq!(outcome, QueryOutcome::Deferred(TileKey::new(1, 0)));
//!
//! // The host performs the fetch and reports back.
//! let fetch = overlay.poll_fetch().unwrap();
//! assert_eq!(fetch.url, "https://tiles.test/2/1/0.pbf");
//! overlay.finish_fetch(fetch, Ok(b"tile bytes".to_vec()));
//!
//! let results = answer.borrow_mut().take().unwrap().unwrap();
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0].property("name").and_then(|v| v.as_str()), Some("Café"));
//! ```

mod decoder;
mod error;
mod events;
mod feature;
#[cfg(feature = "mvt")]
mod mvt;
mod options;
mod overlay;
mod projection;
mod query;
mod spatial;
mod store;
mod tile;
mod url;

pub use decoder::{DecodedTile, FeatureDecoder, FeatureFilter, RejectedFeature, TileReader};
pub use error::{DecodeError, FetchError, GeometryError, TileError};
pub use events::{EventKinds, Observers, OverlayEvent, SubscriptionId};
pub use feature::{GeometryKind, PointFeature, Properties, PropertyValue, RawFeature, RawLayer};
#[cfg(feature = "mvt")]
pub use mvt::MvtReader;
pub use options::{DEFAULT_TILE_SIZE, OverlayOptions};
pub use overlay::{DeferredQuery, Overlay, QueryOutcome, QueryResult};
pub use projection::{LngLat, MAX_LATITUDE, Projection, WebMercator, tile_local_to_lnglat};
pub use query::{DEFAULT_TOLERANCE, DefaultDuplicate, DuplicatePredicate, QueryContext, QueryEngine};
pub use spatial::{DEFAULT_MAX_ENTRIES, SpatialBackend, SpatialIndex, query_rect};
pub use store::{FetchRequest, TileRecord, TileState, TileStore};
pub use tile::TileKey;
pub use url::{TileUrlResolver, UrlTemplate};
