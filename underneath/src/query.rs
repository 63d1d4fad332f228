// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query engine: tolerance box search, nearest-first ordering and de-duplication.
//!
//! A query runs in three steps over whatever is currently indexed:
//!
//! 1. collect every feature in the square box of edge `tolerance` around the point,
//! 2. order them by squared distance to the point (stable, so ties keep index order),
//! 3. fold through a [`DuplicatePredicate`] with a fresh [`QueryContext`].
//!
//! ```
//! use std::rc::Rc;
//! use kurbo::Point;
//! use underneath::{LngLat, PointFeature, QueryEngine, SpatialIndex, TileKey};
//!
//! let mut index = SpatialIndex::default();
//! for (id, name, x, y) in [(1, "Cafe", 10.0, 10.0), (2, "Cafe", 10.0, 11.0), (3, "Bank", 50.0, 50.0)] {
//!     index.insert(Rc::new(PointFeature {
//!         tile: TileKey::new(0, 0),
//!         layer: "poi".into(),
//!         id: None,
//!         properties: [
//!             ("osm_id".to_owned(), (id as i64).into()),
//!             ("name".to_owned(), name.into()),
//!         ]
//!         .into_iter()
//!         .collect(),
//!         geometry: LngLat::default(),
//!         position: Point::new(x, y),
//!     }));
//! }
//!
//! let engine = QueryEngine::default();
//! let hits = engine.search(&index, Point::new(10.0, 10.0), Some(4.0));
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].position, Point::new(10.0, 10.0));
//! ```

use std::rc::Rc;

use hashbrown::HashSet;
use kurbo::Point;
use tracing::trace;

use crate::feature::{PointFeature, PropertyValue};
use crate::spatial::SpatialIndex;

/// Tolerance used when a query does not supply a usable one.
pub const DEFAULT_TOLERANCE: f64 = 100.0;

/// Scratch state shared by the duplicate predicate across one query.
///
/// A fresh context is created for every query and dropped once the query has
/// produced its results.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    marks: HashSet<String>,
}

impl QueryContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was marked earlier in this query.
    pub fn is_marked(&self, key: &str) -> bool {
        self.marks.contains(key)
    }

    /// Mark `key`. Returns `false` if it was already marked.
    pub fn mark(&mut self, key: impl Into<String>) -> bool {
        self.marks.insert(key.into())
    }

    /// Number of marked keys.
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Whether nothing was marked yet.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Decides whether a feature repeats one already accepted in the same query.
///
/// Features are offered nearest first. Returning `false` accepts the feature;
/// the predicate is expected to record whatever it needs in the context.
pub trait DuplicatePredicate {
    /// Whether `feature` is a repeat.
    fn is_duplicate(&self, feature: &PointFeature, cx: &mut QueryContext) -> bool;
}

impl<F: Fn(&PointFeature, &mut QueryContext) -> bool> DuplicatePredicate for F {
    fn is_duplicate(&self, feature: &PointFeature, cx: &mut QueryContext) -> bool {
        self(feature, cx)
    }
}

/// Accepts the first feature for each distinct id and each distinct name.
///
/// The id is the `id_field` property, or the tile's feature id when that property
/// is absent. Missing, null or empty values never collide with anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultDuplicate {
    /// Property holding the stable id.
    pub id_field: String,
    /// Property holding the display name.
    pub name_field: String,
}

impl Default for DefaultDuplicate {
    fn default() -> Self {
        Self {
            id_field: "osm_id".into(),
            name_field: "name".into(),
        }
    }
}

impl DefaultDuplicate {
    fn id_key(&self, feature: &PointFeature) -> Option<String> {
        match feature.property(&self.id_field) {
            Some(v) if !v.is_blank() => Some(format!("id:{v}")),
            Some(_) => None,
            None => feature.id.map(|id| format!("id:{id}")),
        }
    }

    fn name_key(&self, feature: &PointFeature) -> Option<String> {
        feature
            .property(&self.name_field)
            .filter(|v| !v.is_blank())
            .map(|v: &PropertyValue| format!("name:{v}"))
    }
}

impl DuplicatePredicate for DefaultDuplicate {
    fn is_duplicate(&self, feature: &PointFeature, cx: &mut QueryContext) -> bool {
        let keys = [self.id_key(feature), self.name_key(feature)];
        if keys.iter().flatten().any(|k| cx.is_marked(k)) {
            return true;
        }
        for key in keys.into_iter().flatten() {
            cx.mark(key);
        }
        false
    }
}

/// Turns a point and tolerance into a deduplicated, nearest-first result list.
#[derive(Clone)]
pub struct QueryEngine {
    default_tolerance: f64,
    duplicate: Rc<dyn DuplicatePredicate>,
}

impl core::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("default_tolerance", &self.default_tolerance)
            .finish_non_exhaustive()
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE, Rc::new(DefaultDuplicate::default()))
    }
}

impl QueryEngine {
    /// Engine with a default tolerance and duplicate predicate.
    ///
    /// An unusable default tolerance (non-finite or not positive) is replaced
    /// with [`DEFAULT_TOLERANCE`].
    pub fn new(default_tolerance: f64, duplicate: Rc<dyn DuplicatePredicate>) -> Self {
        Self {
            default_tolerance: usable(default_tolerance).unwrap_or(DEFAULT_TOLERANCE),
            duplicate,
        }
    }

    /// Tolerance applied when a query supplies none.
    pub fn default_tolerance(&self) -> f64 {
        self.default_tolerance
    }

    /// The tolerance a query will actually use.
    pub fn tolerance(&self, requested: Option<f64>) -> f64 {
        requested.and_then(usable).unwrap_or(self.default_tolerance)
    }

    /// Search `index` around `point`.
    ///
    /// Results lie inside the tolerance box, are ordered by non-decreasing
    /// squared distance to `point` and contain no duplicates.
    pub fn search(
        &self,
        index: &SpatialIndex,
        point: Point,
        tolerance: Option<f64>,
    ) -> Vec<Rc<PointFeature>> {
        let tolerance = self.tolerance(tolerance);
        let mut hits: Vec<(f64, Rc<PointFeature>)> = index
            .search_around(point, tolerance)
            .into_iter()
            .map(|f| (f.position.distance_squared(point), f))
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));

        let candidates = hits.len();
        let mut cx = QueryContext::new();
        let results: Vec<_> = hits
            .into_iter()
            .filter_map(|(_, f)| (!self.duplicate.is_duplicate(&f, &mut cx)).then_some(f))
            .collect();
        trace!(
            x = point.x,
            y = point.y,
            tolerance,
            candidates,
            results = results.len(),
            "query"
        );
        results
    }
}

fn usable(tolerance: f64) -> Option<f64> {
    (tolerance.is_finite() && tolerance > 0.0).then_some(tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Properties;
    use crate::projection::LngLat;
    use crate::tile::TileKey;

    fn poi(osm_id: Option<i64>, name: Option<&str>, x: f64, y: f64) -> Rc<PointFeature> {
        let mut properties = Properties::new();
        if let Some(id) = osm_id {
            properties.insert("osm_id".into(), id.into());
        }
        if let Some(name) = name {
            properties.insert("name".into(), name.into());
        }
        Rc::new(PointFeature {
            tile: TileKey::new(0, 0),
            layer: "poi".into(),
            id: None,
            properties,
            geometry: LngLat::default(),
            position: Point::new(x, y),
        })
    }

    fn names(results: &[Rc<PointFeature>]) -> Vec<String> {
        results
            .iter()
            .map(|f| f.property("name").map_or_else(String::new, ToString::to_string))
            .collect()
    }

    #[test]
    fn cafe_bank_scenario() {
        let mut index = SpatialIndex::default();
        index.insert(poi(Some(1), Some("Cafe"), 10.0, 10.0));
        index.insert(poi(Some(2), Some("Cafe"), 10.0, 11.0));
        index.insert(poi(Some(3), Some("Bank"), 50.0, 50.0));

        let results = QueryEngine::default().search(&index, Point::new(10.0, 10.0), Some(4.0));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].property("osm_id"), Some(&PropertyValue::Int(1)));
    }

    #[test]
    fn ordered_by_distance_and_inside_box() {
        let mut index = SpatialIndex::default();
        let points = [(7.0, 0.0), (1.0, 1.0), (-3.0, 2.0), (0.0, -0.5), (60.0, 0.0), (0.0, 49.0)];
        for (i, (x, y)) in points.into_iter().enumerate() {
            index.insert(poi(Some(i as i64), Some(&format!("p{i}")), x, y));
        }
        let p = Point::new(0.0, 0.0);
        let results = QueryEngine::default().search(&index, p, None);
        assert_eq!(names(&results), ["p3", "p1", "p2", "p0", "p5"]);

        let d: Vec<f64> = results.iter().map(|f| f.position.distance_squared(p)).collect();
        assert!(d.windows(2).all(|w| w[0] <= w[1]), "{d:?}");
        assert!(
            results
                .iter()
                .all(|f| f.position.x.abs() <= 50.0 && f.position.y.abs() <= 50.0)
        );
    }

    #[test]
    fn nearest_duplicate_wins() {
        let mut index = SpatialIndex::default();
        index.insert(poi(Some(9), Some("Far"), 5.0, 5.0));
        index.insert(poi(Some(9), Some("Near"), 1.0, 1.0));
        let results = QueryEngine::default().search(&index, Point::ZERO, Some(20.0));
        assert_eq!(names(&results), ["Near"]);
    }

    #[test]
    fn missing_identity_never_collides() {
        let mut index = SpatialIndex::default();
        index.insert(poi(None, None, 1.0, 0.0));
        index.insert(poi(None, None, 2.0, 0.0));
        index.insert(poi(None, Some(""), 3.0, 0.0));
        index.insert(poi(Some(4), None, 4.0, 0.0));
        index.insert(poi(Some(5), None, 5.0, 0.0));
        let results = QueryEngine::default().search(&index, Point::ZERO, Some(20.0));
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn ids_and_names_are_separate_namespaces() {
        let mut index = SpatialIndex::default();
        index.insert(poi(Some(7), None, 1.0, 0.0));
        index.insert(poi(None, Some("7"), 2.0, 0.0));
        let results = QueryEngine::default().search(&index, Point::ZERO, Some(20.0));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn feature_id_backs_up_missing_id_property() {
        let a = PointFeature {
            id: Some(11),
            ..(*poi(None, Some("A"), 0.0, 0.0)).clone()
        };
        let b = PointFeature {
            id: Some(11),
            ..(*poi(None, Some("B"), 1.0, 0.0)).clone()
        };
        let pred = DefaultDuplicate::default();
        let mut cx = QueryContext::new();
        assert!(!pred.is_duplicate(&a, &mut cx));
        assert!(pred.is_duplicate(&b, &mut cx));
        assert_eq!(cx.len(), 2);
    }

    #[test]
    fn custom_predicates_and_tolerance_fallback() {
        let mut index = SpatialIndex::default();
        for i in 0..4_i32 {
            index.insert(poi(Some(i64::from(i)), Some("same"), f64::from(i), 0.0));
        }
        let keep_all = |_: &PointFeature, _: &mut QueryContext| false;
        let engine = QueryEngine::new(f64::NAN, Rc::new(keep_all));
        assert_eq!(engine.default_tolerance(), DEFAULT_TOLERANCE);
        assert_eq!(engine.tolerance(Some(-1.0)), DEFAULT_TOLERANCE);
        assert_eq!(engine.tolerance(Some(f64::INFINITY)), DEFAULT_TOLERANCE);
        assert_eq!(engine.search(&index, Point::ZERO, Some(0.0)).len(), 4);
        // Tolerance 2 reaches x = 1 only.
        assert_eq!(engine.search(&index, Point::ZERO, Some(2.0)).len(), 2);
    }
}
