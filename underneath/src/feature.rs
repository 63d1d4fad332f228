// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Feature model: raw tile layers as readers produce them, and indexed point features.

use std::collections::BTreeMap;
use std::fmt;

use geo_types::Geometry;
use kurbo::Point;

use crate::projection::LngLat;
use crate::tile::TileKey;

/// A feature property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// Text.
    String(String),
    /// Floating point number.
    Float(f64),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Boolean.
    Bool(bool),
    /// Explicit absence of a value.
    Null,
}

impl PropertyValue {
    /// The text, when this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value carries no identity: null or an empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Feature properties keyed by name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Coarse classification of a raw geometry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// A single point.
    Point,
    /// Several points.
    MultiPoint,
    /// A single segment.
    Line,
    /// A polyline.
    LineString,
    /// Several polylines.
    MultiLineString,
    /// A polygon, possibly with holes.
    Polygon,
    /// Several polygons.
    MultiPolygon,
    /// An axis-aligned rectangle.
    Rect,
    /// A triangle.
    Triangle,
    /// A mix of geometries.
    GeometryCollection,
}

impl GeometryKind {
    /// Classify a geometry.
    pub fn of<T: geo_types::CoordNum>(geometry: &Geometry<T>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            Geometry::Line(_) => Self::Line,
            Geometry::LineString(_) => Self::LineString,
            Geometry::MultiLineString(_) => Self::MultiLineString,
            Geometry::Polygon(_) => Self::Polygon,
            Geometry::MultiPolygon(_) => Self::MultiPolygon,
            Geometry::Rect(_) => Self::Rect,
            Geometry::Triangle(_) => Self::Triangle,
            Geometry::GeometryCollection(_) => Self::GeometryCollection,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One layer of a decoded tile, in tile-local units.
#[derive(Clone, Debug, PartialEq)]
pub struct RawLayer {
    /// Layer name.
    pub name: String,
    /// Local coordinate range of the tile (usually 4096).
    pub extent: u32,
    /// Features in tile order.
    pub features: Vec<RawFeature>,
}

/// One feature of a decoded tile, in tile-local units.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFeature {
    /// Feature id, when the tile carries one.
    pub id: Option<u64>,
    /// Feature properties.
    pub properties: Properties,
    /// Geometry in tile-local coordinates.
    pub geometry: Geometry<f32>,
}

impl RawFeature {
    /// A point feature at tile-local `(x, y)` with no properties.
    pub fn point(x: f32, y: f32) -> Self {
        Self {
            id: None,
            properties: Properties::new(),
            geometry: Geometry::Point(geo_types::Point::new(x, y)),
        }
    }

    /// Set the feature id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Add a property.
    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_owned(), value.into());
        self
    }

    /// Classification of the geometry.
    pub fn kind(&self) -> GeometryKind {
        GeometryKind::of(&self.geometry)
    }
}

/// A point feature placed in the host's projected space.
///
/// Immutable once indexed; the index and query results share it through `Rc`.
#[derive(Clone, Debug, PartialEq)]
pub struct PointFeature {
    /// Tile the feature was decoded from.
    pub tile: TileKey,
    /// Layer the feature was decoded from.
    pub layer: String,
    /// Feature id, when the tile carries one.
    pub id: Option<u64>,
    /// Feature properties.
    pub properties: Properties,
    /// Geographic position.
    pub geometry: LngLat,
    /// Projected position the feature is indexed at.
    pub position: Point,
}

impl PointFeature {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}
