// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The overlay: one tile store, one spatial index and the queries over them.
//!
//! An [`Overlay`] is driven by its host. The host forwards view changes
//! ([`set_zoom`][Overlay::set_zoom], [`load_bounds`][Overlay::load_bounds]),
//! performs the fetches the overlay asks for ([`poll_fetch`][Overlay::poll_fetch],
//! [`finish_fetch`][Overlay::finish_fetch]) and asks proximity questions
//! ([`query`][Overlay::query]). Everything runs on the host's thread; a query
//! waiting for its tile is parked on the tile and resumed when the fetch
//! completes.

use std::rc::Rc;

use kurbo::{Point, Rect};
use tracing::{debug, warn};

use crate::decoder::{DecodedTile, FeatureDecoder, TileReader};
use crate::error::{FetchError, TileError};
use crate::events::{EventKinds, Observers, OverlayEvent, SubscriptionId};
use crate::feature::PointFeature;
use crate::options::{DEFAULT_TILE_SIZE, OverlayOptions};
use crate::projection::{Projection, WebMercator};
use crate::query::QueryEngine;
use crate::spatial::SpatialIndex;
use crate::store::{FetchRequest, TileState, TileStore};
use crate::tile::TileKey;
use crate::url::TileUrlResolver;

/// What a query callback receives.
pub type QueryResult = Result<Vec<Rc<PointFeature>>, TileError>;

/// How [`Overlay::query`] handled a query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The callback has already run.
    Answered,
    /// The callback runs once this tile settles.
    Deferred(TileKey),
}

/// A query parked on a pending tile.
pub struct DeferredQuery {
    point: Point,
    tolerance: Option<f64>,
    callback: Box<dyn FnOnce(QueryResult)>,
}

impl core::fmt::Debug for DeferredQuery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeferredQuery")
            .field("point", &self.point)
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl DeferredQuery {
    fn answer(self, engine: &QueryEngine, index: &SpatialIndex) {
        (self.callback)(Ok(engine.search(index, self.point, self.tolerance)));
    }

    fn fail(self, error: TileError) {
        (self.callback)(Err(error));
    }
}

/// Tile-backed point feature index with lazy loading and proximity queries.
pub struct Overlay {
    engine: QueryEngine,
    decoder: FeatureDecoder,
    resolver: Box<dyn TileUrlResolver>,
    projection: Box<dyn Projection>,
    tile_size: f64,
    lazy: bool,
    zoom: u8,
    store: TileStore<DeferredQuery>,
    index: SpatialIndex,
    observers: Observers,
}

impl core::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Overlay")
            .field("engine", &self.engine)
            .field("decoder", &self.decoder)
            .field("tile_size", &self.tile_size)
            .field("lazy", &self.lazy)
            .field("zoom", &self.zoom)
            .field("store", &self.store)
            .field("index", &self.index)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl Overlay {
    /// Create an overlay at zoom 0 reading tiles with `reader` from the URLs
    /// given by `resolver`.
    ///
    /// Projection defaults to [`WebMercator`] with the configured tile size.
    pub fn new(
        reader: impl TileReader + 'static,
        resolver: impl TileUrlResolver + 'static,
        options: OverlayOptions,
    ) -> Self {
        let tile_size = if options.tile_size.is_finite() && options.tile_size > 0.0 {
            options.tile_size
        } else {
            warn!(tile_size = options.tile_size, "unusable tile size, using {DEFAULT_TILE_SIZE}");
            DEFAULT_TILE_SIZE
        };
        Self {
            engine: QueryEngine::new(options.tolerance, options.duplicate),
            decoder: FeatureDecoder::new(reader, options.layers).with_filter(options.filter),
            resolver: Box::new(resolver),
            projection: Box::new(WebMercator::new(tile_size)),
            tile_size,
            lazy: options.lazy,
            zoom: 0,
            store: TileStore::new(),
            index: SpatialIndex::new(options.backend),
            observers: Observers::new(),
        }
    }

    /// Use `projection` instead of Web Mercator.
    pub fn with_projection(mut self, projection: impl Projection + 'static) -> Self {
        self.projection = Box::new(projection);
        self
    }

    /// Start at `zoom` instead of 0.
    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    /// Current zoom.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Whether tiles are only loaded for queries.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Tile edge length in projected units.
    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Move to `zoom`. Resets the overlay when the zoom actually changes.
    ///
    /// Returns whether a reset happened.
    pub fn set_zoom(&mut self, zoom: u8) -> bool {
        if zoom == self.zoom {
            return false;
        }
        debug!(from = self.zoom, to = zoom, "zoom changed");
        self.zoom = zoom;
        self.reset();
        true
    }

    /// Listen for events of `kinds`.
    pub fn subscribe(
        &mut self,
        kinds: EventKinds,
        handler: impl FnMut(&OverlayEvent<'_>) + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(kinds, handler)
    }

    /// Stop listening. Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Tile containing a projected point at the current zoom.
    pub fn tile_for(&self, point: Point) -> TileKey {
        TileKey::containing(point, self.tile_size)
    }

    /// Request `key` unless it is already known. Returns whether a fetch was queued.
    pub fn request(&mut self, key: TileKey) -> bool {
        if self.store.has(key) {
            return false;
        }
        let url = self.resolver.resolve(key, self.zoom);
        self.store.request(key, self.zoom, url)
    }

    /// Whether `key` has been requested since the last reset.
    pub fn has(&self, key: TileKey) -> bool {
        self.store.has(key)
    }

    /// Load state of `key`.
    pub fn state(&self, key: TileKey) -> TileState {
        self.store.state(key)
    }

    /// The tile store.
    pub fn store(&self) -> &TileStore<DeferredQuery> {
        &self.store
    }

    /// The spatial index.
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Request every tile touching the visible projected rectangle, center first.
    ///
    /// Rows outside the world are skipped and the rectangle is cut down to at
    /// most one world width around its center. Lazy overlays and non-finite
    /// rectangles request nothing. Returns how many fetches were queued.
    pub fn load_bounds(&mut self, visible: Rect) -> usize {
        if self.lazy {
            return 0;
        }
        if !visible.is_finite() {
            warn!(?visible, "ignoring non-finite bounds");
            return 0;
        }
        let mut visible = visible.abs();
        let zoom = self.zoom;
        let world = self.tile_size * 2_f64.powi(i32::from(zoom.min(62)));
        visible.y0 = visible.y0.max(0.0);
        visible.y1 = visible.y1.min(world);
        if visible.y0 > visible.y1 {
            return 0;
        }
        if visible.width() > world {
            let cx = visible.center().x;
            visible.x0 = cx - world * 0.5;
            visible.x1 = cx + world * 0.5;
        }
        let mut queued = 0;
        for key in TileKey::covering(visible, self.tile_size) {
            if key.row_in_world(zoom) && self.request(key) {
                queued += 1;
            }
        }
        debug!(queued, zoom, "requested visible tiles");
        queued
    }

    /// Take the next fetch the host has to perform.
    pub fn poll_fetch(&mut self) -> Option<FetchRequest> {
        self.store.poll_fetch()
    }

    /// Report the outcome of a fetch taken from [`poll_fetch`][Self::poll_fetch].
    ///
    /// Completions from before the last reset are ignored.
    pub fn finish_fetch(&mut self, request: FetchRequest, result: Result<Vec<u8>, FetchError>) {
        if !self.store.accepts(&request) {
            debug!(
                tile = %request.key,
                epoch = request.epoch,
                current = self.store.epoch(),
                "ignoring stale tile completion"
            );
            return;
        }
        let FetchRequest { key, zoom, url, .. } = request;
        let decoded = result
            .map_err(|source| TileError::Fetch {
                key,
                url: url.clone(),
                source,
            })
            .and_then(|bytes| {
                self.decoder
                    .decode(&bytes, key, zoom, &*self.projection)
                    .map_err(|source| TileError::Decode {
                        key,
                        url: url.clone(),
                        source,
                    })
            });
        match decoded {
            Ok(tile) => self.tile_loaded(key, &url, tile),
            Err(error) => self.tile_failed(key, &url, error),
        }
    }

    fn tile_loaded(&mut self, key: TileKey, url: &str, tile: DecodedTile) {
        let DecodedTile {
            layers,
            features,
            rejected,
        } = tile;

        for r in &rejected {
            debug!(tile = %key, layer = %r.layer, error = %r.error, "skipping feature");
            self.observers
                .emit(&OverlayEvent::FeatureError { key, rejected: r });
        }

        let features: Vec<Rc<PointFeature>> = features.into_iter().map(Rc::new).collect();
        let count = self.index.extend(features.iter().cloned());
        if self.observers.wants(EventKinds::FEATURE_ADDED) {
            for feature in &features {
                self.observers
                    .emit(&OverlayEvent::FeatureAdded { feature });
            }
        }

        let waiting = self.store.finish_loaded(key, layers, count);
        debug!(
            tile = %key,
            features = count,
            rejected = rejected.len(),
            waiting = waiting.len(),
            "tile loaded"
        );
        self.observers.emit(&OverlayEvent::TileLoaded {
            key,
            url,
            features: count,
        });
        for query in waiting {
            query.answer(&self.engine, &self.index);
        }
    }

    fn tile_failed(&mut self, key: TileKey, url: &str, error: TileError) {
        warn!(tile = %key, url, error = %error, "tile load failed");
        let waiting = self.store.finish_errored(key);
        self.observers.emit(&OverlayEvent::TileError {
            key,
            url,
            error: &error,
        });
        for query in waiting {
            query.fail(error.clone());
        }
    }

    /// Find the features near `point`, nearest first, without duplicates.
    ///
    /// `tolerance` is the edge of the square search box in projected units; `None`
    /// uses the configured default. The callback receives the results, or the load
    /// error of the tile the query waited for.
    ///
    /// In lazy mode a query whose tile was never requested requests it and waits
    /// for it. Only that one tile is awaited: features of neighbouring tiles show
    /// up once those tiles are loaded. Everything else is answered immediately
    /// from what is indexed, including queries on a tile that is still pending.
    pub fn query(
        &mut self,
        point: Point,
        tolerance: Option<f64>,
        callback: impl FnOnce(QueryResult) + 'static,
    ) -> QueryOutcome {
        let query = DeferredQuery {
            point,
            tolerance,
            callback: Box::new(callback),
        };
        let key = self.tile_for(point);
        let query = if self.lazy && !self.store.has(key) && key.row_in_world(self.zoom) {
            self.request(key);
            match self.store.defer(key, query) {
                Ok(()) => {
                    debug!(tile = %key, "query waits for tile");
                    return QueryOutcome::Deferred(key);
                }
                Err(query) => query,
            }
        } else {
            query
        };
        query.answer(&self.engine, &self.index);
        QueryOutcome::Answered
    }

    /// Search what is currently indexed, synchronously.
    pub fn search(&self, point: Point, tolerance: Option<f64>) -> Vec<Rc<PointFeature>> {
        self.engine.search(&self.index, point, tolerance)
    }

    /// Drop every tile record and indexed feature, then emit
    /// [`OverlayEvent::FeaturesCleared`].
    ///
    /// Fetches still in flight are ignored when they complete, and queries
    /// waiting on them are dropped without being called.
    pub fn reset(&mut self) {
        let abandoned = self.store.clear();
        self.index.clear();
        debug!(
            epoch = self.store.epoch(),
            abandoned_queries = abandoned.len(),
            "overlay reset"
        );
        drop(abandoned);
        self.observers.emit(&OverlayEvent::FeaturesCleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::RejectedFeature;
    use crate::error::DecodeError;
    use crate::feature::{RawFeature, RawLayer};
    use crate::projection::LngLat;
    use crate::spatial::SpatialBackend;
    use geo_types::Geometry;
    use std::cell::RefCell;

    /// Tile-local coordinates are offset by the tile origin; no Mercator.
    struct Grid256;

    impl Projection for Grid256 {
        fn project(&self, lnglat: LngLat, _: u8) -> Point {
            Point::new(lnglat.lng, lnglat.lat)
        }

        fn unproject(&self, point: Point, _: u8) -> LngLat {
            LngLat::new(point.x, point.y)
        }

        fn project_tile_local(&self, key: TileKey, _: u8, _: u32, local: Point) -> (LngLat, Point) {
            let p = Point::new(
                f64::from(key.col) * 256.0 + local.x,
                f64::from(key.row) * 256.0 + local.y,
            );
            (LngLat::new(p.x, p.y), p)
        }
    }

    /// Tile bytes are the single byte `n`: `n` point features plus one line.
    /// `n = 255` yields a layer with a zero extent.
    fn reader(bytes: &[u8]) -> Result<Vec<RawLayer>, DecodeError> {
        let Some(&n) = bytes.first() else {
            return Err(DecodeError::Malformed("empty body".into()));
        };
        let mut features: Vec<RawFeature> = (0..n)
            .map(|i| {
                RawFeature::point(f32::from(i) * 2.0, 0.0)
                    .with_property("osm_id", i64::from(i))
                    .with_property("name", format!("poi {i}"))
            })
            .collect();
        features.push(RawFeature {
            geometry: Geometry::LineString(geo_types::LineString::from(vec![(0.0_f32, 0.0), (1.0, 1.0)])),
            ..RawFeature::point(0.0, 0.0)
        });
        Ok(vec![RawLayer {
            name: "poi".into(),
            extent: if n == u8::MAX { 0 } else { 256 },
            features,
        }])
    }

    fn overlay(lazy: bool) -> Overlay {
        let options = OverlayOptions::default()
            .with_layers(["poi"])
            .with_lazy(lazy)
            .with_backend(SpatialBackend::default());
        Overlay::new(reader, |key: TileKey, zoom: u8| format!("mem://{zoom}/{key}"), options)
            .with_projection(Grid256)
            .with_zoom(3)
    }

    type Answers = Rc<RefCell<Vec<QueryResult>>>;

    fn recorder() -> (Answers, impl FnOnce(QueryResult) + 'static) {
        let answers: Answers = Rc::default();
        let sink = Rc::clone(&answers);
        (answers, move |r: QueryResult| sink.borrow_mut().push(r))
    }

    fn kinds_log(o: &mut Overlay) -> Rc<RefCell<Vec<EventKinds>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        o.subscribe(EventKinds::all(), move |e| sink.borrow_mut().push(e.kind()));
        log
    }

    #[test]
    fn lazy_query_waits_for_its_tile() {
        let mut o = overlay(true);
        let (answers, cb) = recorder();
        let outcome = o.query(Point::new(300.0, 0.0), Some(10.0), cb);
        assert_eq!(outcome, QueryOutcome::Deferred(TileKey::new(1, 0)));
        assert!(answers.borrow().is_empty());
        assert_eq!(o.state(TileKey::new(1, 0)), TileState::Pending);

        let fetch = o.poll_fetch().unwrap();
        assert_eq!(fetch.url, "mem://3/1:0");
        assert_eq!(fetch.zoom, 3);
        o.finish_fetch(fetch, Ok(vec![30]));

        assert_eq!(o.state(TileKey::new(1, 0)), TileState::Loaded);
        let answers = answers.borrow();
        assert_eq!(answers.len(), 1);
        let results = answers[0].as_ref().unwrap();
        // Points at x = 256 + 2i; the box is [295, 305].
        let mut xs: Vec<f64> = results.iter().map(|f| f.position.x).collect();
        assert_eq!(xs[0], 300.0);
        xs.sort_by(f64::total_cmp);
        assert_eq!(xs, [296.0, 298.0, 300.0, 302.0, 304.0]);
    }

    #[test]
    fn repeated_requests_fetch_once() {
        let mut o = overlay(true);
        let (a, cb1) = recorder();
        let (b, cb2) = recorder();
        assert!(matches!(o.query(Point::new(1.0, 1.0), None, cb1), QueryOutcome::Deferred(_)));
        // Tile is pending: the second query is answered right away from the empty index.
        assert_eq!(o.query(Point::new(2.0, 2.0), None, cb2), QueryOutcome::Answered);
        assert!(!o.request(TileKey::new(0, 0)));

        let fetch = o.poll_fetch().unwrap();
        assert!(o.poll_fetch().is_none());
        assert_eq!(b.borrow().len(), 1);
        assert!(b.borrow()[0].as_ref().unwrap().is_empty());

        o.finish_fetch(fetch, Ok(vec![3]));
        assert_eq!(a.borrow().len(), 1);
        assert_eq!(b.borrow().len(), 1);
    }

    #[test]
    fn failed_fetch_reaches_the_waiting_query() {
        let mut o = overlay(true);
        let log = kinds_log(&mut o);
        let (answers, cb) = recorder();
        // Tile 17 of row 0.
        o.query(Point::new(17.0 * 256.0 + 5.0, 5.0), None, cb);
        let fetch = o.poll_fetch().unwrap();
        assert_eq!(fetch.key, TileKey::new(17, 0));
        o.finish_fetch(fetch, Err(FetchError::msg("503 Service Unavailable")));

        let answers = answers.borrow();
        let Err(err) = &answers[0] else {
            panic!("expected the fetch error");
        };
        assert!(matches!(err, TileError::Fetch { .. }));
        assert_eq!(err.key(), TileKey::new(17, 0));
        assert!(o.index().is_empty());
        assert_eq!(o.state(TileKey::new(17, 0)), TileState::Errored);
        assert_eq!(*log.borrow(), [EventKinds::TILE_ERROR]);

        // Errored tiles are not retried before a reset.
        assert!(!o.request(TileKey::new(17, 0)));
    }

    #[test]
    fn undecodable_tile_is_a_tile_error() {
        let mut o = overlay(true);
        let (answers, cb) = recorder();
        o.query(Point::new(5.0, 5.0), None, cb);
        let fetch = o.poll_fetch().unwrap();
        o.finish_fetch(fetch, Ok(Vec::new()));
        assert!(matches!(answers.borrow()[0], Err(TileError::Decode { .. })));
        assert_eq!(o.state(TileKey::new(0, 0)), TileState::Errored);
    }

    #[test]
    fn line_features_are_reported_and_skipped() {
        let mut o = overlay(false);
        let errors: Rc<RefCell<Vec<RejectedFeature>>> = Rc::default();
        let sink = Rc::clone(&errors);
        o.subscribe(EventKinds::FEATURE_ERROR, move |e| {
            if let OverlayEvent::FeatureError { rejected, .. } = e {
                sink.borrow_mut().push((*rejected).clone());
            }
        });
        let added = Rc::new(RefCell::new(0_usize));
        let count = Rc::clone(&added);
        o.subscribe(EventKinds::FEATURE_ADDED, move |_| *count.borrow_mut() += 1);

        assert!(o.request(TileKey::new(0, 0)));
        let fetch = o.poll_fetch().unwrap();
        o.finish_fetch(fetch, Ok(vec![4]));

        assert_eq!(o.state(TileKey::new(0, 0)), TileState::Loaded);
        assert_eq!(errors.borrow().len(), 1);
        assert_eq!(
            errors.borrow()[0].error,
            crate::GeometryError::NotAPoint {
                found: crate::GeometryKind::LineString
            }
        );
        assert_eq!(*added.borrow(), 4);
        assert_eq!(o.index().len(), 4);
        let record = o.store().record(TileKey::new(0, 0)).unwrap();
        assert_eq!(record.feature_count(), 4);
        assert_eq!(record.decoded_layers(), Some(&["poi".to_owned()][..]));
    }

    #[test]
    fn zero_extent_tile_does_not_hide_other_tiles() {
        let mut o = overlay(false);
        assert!(o.request(TileKey::new(0, 0)));
        assert!(o.request(TileKey::new(1, 1)));
        let broken = o.poll_fetch().unwrap();
        let fine = o.poll_fetch().unwrap();
        o.finish_fetch(broken, Ok(vec![u8::MAX]));
        o.finish_fetch(fine, Ok(vec![3]));

        assert_eq!(o.state(TileKey::new(0, 0)), TileState::Errored);
        assert_eq!(o.state(TileKey::new(1, 1)), TileState::Loaded);
        assert_eq!(o.index().len(), 3);
        // Points of tile 1:1 sit at (256 + 2i, 256).
        let hits = o.search(Point::new(258.0, 256.0), Some(10.0));
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn eager_mode_answers_immediately() {
        let mut o = overlay(false);
        let (answers, cb) = recorder();
        assert_eq!(o.query(Point::new(1.0, 1.0), None, cb), QueryOutcome::Answered);
        assert!(o.poll_fetch().is_none());
        assert!(answers.borrow()[0].as_ref().unwrap().is_empty());
    }

    #[test]
    fn load_bounds_requests_visible_tiles() {
        let mut o = overlay(false);
        // Zoom 3 has rows 0..8; the rect also covers row -1.
        let queued = o.load_bounds(Rect::new(0.0, -10.0, 600.0, 300.0));
        assert_eq!(queued, 6);
        assert_eq!(o.load_bounds(Rect::new(0.0, 0.0, 600.0, 300.0)), 0);
        let first = o.poll_fetch().unwrap();
        assert_eq!(first.key, TileKey::new(1, 0));

        let mut lazy = overlay(true);
        assert_eq!(lazy.load_bounds(Rect::new(0.0, 0.0, 600.0, 300.0)), 0);
        assert!(lazy.poll_fetch().is_none());
    }

    #[test]
    fn load_bounds_is_limited_to_the_world() {
        let mut o = overlay(false);
        assert_eq!(o.load_bounds(Rect::new(0.0, f64::NEG_INFINITY, 10.0, 10.0)), 0);
        assert_eq!(o.load_bounds(Rect::new(0.0, f64::NAN, 10.0, 10.0)), 0);
        assert_eq!(o.load_bounds(Rect::new(0.0, -900.0, 10.0, -600.0)), 0);
        assert!(o.poll_fetch().is_none());

        // Zoom 3 is 2048 units across: one column, all eight rows.
        assert_eq!(o.load_bounds(Rect::new(0.0, -1e12, 10.0, 1e12)), 8);

        // One world width around x = 0 spans columns -4..=4 of row 0.
        let mut o = overlay(false);
        assert_eq!(o.load_bounds(Rect::new(-1e12, 0.0, 1e12, 10.0)), 9);
    }

    #[test]
    fn reset_clears_everything() {
        let mut o = overlay(false);
        let log = kinds_log(&mut o);
        o.request(TileKey::new(0, 0));
        let fetch = o.poll_fetch().unwrap();
        o.finish_fetch(fetch, Ok(vec![5]));
        assert_eq!(o.search(Point::new(4.0, 0.0), None).len(), 5);

        o.reset();
        assert!(o.index().is_empty());
        assert!(o.store().is_empty());
        assert!(o.search(Point::new(4.0, 0.0), None).is_empty());
        assert_eq!(log.borrow().last(), Some(&EventKinds::FEATURES_CLEARED));
    }

    #[test]
    fn stale_completions_are_ignored() {
        let mut o = overlay(true);
        let (answers, cb) = recorder();
        o.query(Point::new(5.0, 5.0), None, cb);
        let stale = o.poll_fetch().unwrap();

        assert!(o.set_zoom(4));
        assert!(!o.set_zoom(4));
        o.finish_fetch(stale, Ok(vec![5]));
        assert!(o.index().is_empty());
        assert_eq!(o.state(TileKey::new(0, 0)), TileState::Absent);
        // The abandoned query is dropped, never answered.
        assert!(answers.borrow().is_empty());
        assert_eq!(Rc::strong_count(&answers), 1);
    }

    #[test]
    fn off_world_queries_do_not_fetch() {
        let mut o = overlay(true);
        let (answers, cb) = recorder();
        assert_eq!(o.query(Point::new(10.0, -50.0), None, cb), QueryOutcome::Answered);
        assert!(o.poll_fetch().is_none());
        assert_eq!(answers.borrow().len(), 1);
    }
}
