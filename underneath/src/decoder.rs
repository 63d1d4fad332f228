// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Feature decoder: raw tile bytes to projected point features.
//!
//! Parsing the binary tile format is delegated to a [`TileReader`]. The decoder
//! picks the configured layers in declaration order, applies the optional filter,
//! rejects anything that is not a single point and places the rest in projected
//! space through the [`Projection`] collaborator.

use std::rc::Rc;

use geo_types::Geometry;
use kurbo::Point;
use tracing::trace;

use crate::error::{DecodeError, GeometryError};
use crate::feature::{PointFeature, RawFeature, RawLayer};
use crate::projection::Projection;
use crate::tile::TileKey;

/// Parses tile bytes into layers of tile-local features.
pub trait TileReader {
    /// Read every layer of a tile.
    fn read(&self, bytes: &[u8]) -> Result<Vec<RawLayer>, DecodeError>;
}

impl<F: Fn(&[u8]) -> Result<Vec<RawLayer>, DecodeError>> TileReader for F {
    fn read(&self, bytes: &[u8]) -> Result<Vec<RawLayer>, DecodeError> {
        self(bytes)
    }
}

/// Predicate deciding whether a raw feature is kept.
pub type FeatureFilter = Rc<dyn Fn(&RawFeature) -> bool>;

/// A feature that was dropped because it cannot be indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedFeature {
    /// Layer the feature came from.
    pub layer: String,
    /// Why it was dropped.
    pub error: GeometryError,
    /// The feature as read from the tile.
    pub feature: RawFeature,
}

/// Output of decoding one tile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedTile {
    /// Configured layers present in the tile, in declaration order.
    pub layers: Vec<String>,
    /// Accepted point features, by layer then tile order.
    pub features: Vec<PointFeature>,
    /// Features rejected for their geometry, in the same order.
    pub rejected: Vec<RejectedFeature>,
}

/// Extracts point features from the configured layers of a tile.
pub struct FeatureDecoder {
    reader: Box<dyn TileReader>,
    layers: Vec<String>,
    filter: Option<FeatureFilter>,
}

impl core::fmt::Debug for FeatureDecoder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FeatureDecoder")
            .field("layers", &self.layers)
            .field("filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl FeatureDecoder {
    /// Decode the `layers` of tiles read by `reader`.
    pub fn new(reader: impl TileReader + 'static, layers: Vec<String>) -> Self {
        Self {
            reader: Box::new(reader),
            layers,
            filter: None,
        }
    }

    /// Only keep features accepted by `filter`.
    pub fn with_filter(mut self, filter: Option<FeatureFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Configured layer names.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Decode `bytes` of tile `key` at `zoom`.
    ///
    /// A non-point feature, or a point that does not project to a finite
    /// position, is reported in [`DecodedTile::rejected`] and does not fail the
    /// tile. Unreadable bytes and configured layers with a zero extent do.
    pub fn decode(
        &self,
        bytes: &[u8],
        key: TileKey,
        zoom: u8,
        projection: &dyn Projection,
    ) -> Result<DecodedTile, DecodeError> {
        let raw = self.reader.read(bytes)?;
        let mut out = DecodedTile::default();

        for name in &self.layers {
            let Some(layer) = raw.iter().find(|l| &l.name == name) else {
                continue;
            };
            if layer.extent == 0 {
                return Err(DecodeError::Layer {
                    layer: layer.name.clone(),
                    message: "extent is 0".into(),
                });
            }
            out.layers.push(layer.name.clone());

            for feature in &layer.features {
                if let Some(filter) = &self.filter
                    && !filter(feature)
                {
                    continue;
                }
                let reject = |error| RejectedFeature {
                    layer: layer.name.clone(),
                    error,
                    feature: feature.clone(),
                };
                let Geometry::Point(p) = &feature.geometry else {
                    out.rejected.push(reject(GeometryError::NotAPoint {
                        found: feature.kind(),
                    }));
                    continue;
                };
                let local = Point::new(f64::from(p.x()), f64::from(p.y()));
                let (geometry, position) =
                    projection.project_tile_local(key, zoom, layer.extent, local);
                // Index entries must have finite coordinates.
                if !position.is_finite() {
                    out.rejected.push(reject(GeometryError::NotFinite {
                        x: position.x,
                        y: position.y,
                    }));
                    continue;
                }
                out.features.push(PointFeature {
                    tile: key,
                    layer: layer.name.clone(),
                    id: feature.id,
                    properties: feature.properties.clone(),
                    geometry,
                    position,
                });
            }
        }

        trace!(
            tile = %key,
            zoom,
            layers = out.layers.len(),
            features = out.features.len(),
            rejected = out.rejected.len(),
            "decoded tile"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::GeometryKind;
    use crate::projection::{LngLat, WebMercator};

    /// Places tile-local coordinates directly in projected space.
    struct Identity;

    impl Projection for Identity {
        fn project(&self, lnglat: LngLat, _zoom: u8) -> Point {
            Point::new(lnglat.lng, lnglat.lat)
        }

        fn unproject(&self, point: Point, _zoom: u8) -> LngLat {
            LngLat::new(point.x, point.y)
        }

        fn project_tile_local(&self, _: TileKey, _: u8, _: u32, local: Point) -> (LngLat, Point) {
            (LngLat::new(local.x, local.y), local)
        }
    }

    fn layer(name: &str, features: Vec<RawFeature>) -> RawLayer {
        RawLayer {
            name: name.into(),
            extent: 4096,
            features,
        }
    }

    fn line() -> RawFeature {
        RawFeature {
            geometry: Geometry::LineString(geo_types::LineString::from(vec![(0.0_f32, 0.0), (4.0, 4.0)])),
            ..RawFeature::point(0.0, 0.0)
        }
        .with_id(99)
    }

    fn sample(_: &[u8]) -> Result<Vec<RawLayer>, DecodeError> {
        Ok(vec![
            layer("roads", vec![RawFeature::point(9.0, 9.0).with_id(50)]),
            layer("poi", vec![
                RawFeature::point(1.0, 2.0).with_id(1).with_property("name", "Cafe"),
                line(),
                RawFeature::point(3.0, 4.0).with_id(2),
            ]),
            layer("labels", vec![RawFeature::point(5.0, 6.0).with_id(3)]),
        ])
    }

    #[test]
    fn follows_layer_declaration_order() {
        let decoder = FeatureDecoder::new(sample, vec!["labels".into(), "missing".into(), "poi".into()]);
        let tile = decoder.decode(&[], TileKey::new(0, 0), 0, &Identity).unwrap();
        assert_eq!(tile.layers, ["labels", "poi"]);
        let ids: Vec<_> = tile.features.iter().map(|f| f.id).collect();
        assert_eq!(ids, [Some(3), Some(1), Some(2)]);
        assert_eq!(tile.features[1].position, Point::new(1.0, 2.0));
        assert_eq!(tile.features[1].layer, "poi");
    }

    #[test]
    fn non_points_are_rejected_not_fatal() {
        let decoder = FeatureDecoder::new(sample, vec!["poi".into()]);
        let tile = decoder.decode(&[], TileKey::new(4, 2), 3, &Identity).unwrap();
        assert_eq!(tile.features.len(), 2);
        assert_eq!(tile.rejected.len(), 1);
        let rejected = &tile.rejected[0];
        assert_eq!(
            rejected.error,
            GeometryError::NotAPoint {
                found: GeometryKind::LineString
            }
        );
        assert_eq!(rejected.feature.id, Some(99));
        assert!(tile.features.iter().all(|f| f.tile == TileKey::new(4, 2)));
    }

    #[test]
    fn filter_runs_before_geometry_check() {
        let filter: FeatureFilter = Rc::new(|f: &RawFeature| f.id != Some(99) && f.id != Some(2));
        let decoder = FeatureDecoder::new(sample, vec!["poi".into()]).with_filter(Some(filter));
        let tile = decoder.decode(&[], TileKey::new(0, 0), 0, &Identity).unwrap();
        assert!(tile.rejected.is_empty());
        assert_eq!(tile.features.len(), 1);
        assert_eq!(tile.features[0].id, Some(1));
    }

    /// Sends everything right of x = 2 to NaN.
    struct Cliff;

    impl Projection for Cliff {
        fn project(&self, lnglat: LngLat, _zoom: u8) -> Point {
            Point::new(lnglat.lng, lnglat.lat)
        }

        fn unproject(&self, point: Point, _zoom: u8) -> LngLat {
            LngLat::new(point.x, point.y)
        }

        fn project_tile_local(&self, _: TileKey, _: u8, _: u32, local: Point) -> (LngLat, Point) {
            let p = if local.x > 2.0 { Point::new(f64::NAN, local.y) } else { local };
            (LngLat::new(p.x, p.y), p)
        }
    }

    #[test]
    fn non_finite_positions_are_rejected() {
        let decoder = FeatureDecoder::new(sample, vec!["poi".into()]);
        let tile = decoder.decode(&[], TileKey::new(0, 0), 0, &Cliff).unwrap();
        let ids: Vec<_> = tile.features.iter().map(|f| f.id).collect();
        assert_eq!(ids, [Some(1)]);
        assert_eq!(tile.rejected.len(), 2);
        let rejected = &tile.rejected[1];
        assert_eq!(rejected.feature.id, Some(2));
        assert!(matches!(rejected.error, GeometryError::NotFinite { x, .. } if x.is_nan()));
    }

    #[test]
    fn zero_extent_fails_the_tile() {
        let flat = |_: &[u8]| -> Result<Vec<RawLayer>, DecodeError> {
            Ok(vec![RawLayer {
                name: "poi".into(),
                extent: 0,
                features: vec![RawFeature::point(1.0, 1.0)],
            }])
        };
        let decoder = FeatureDecoder::new(flat, vec!["poi".into()]);
        let err = decoder.decode(&[], TileKey::new(0, 0), 3, &WebMercator::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Layer { ref layer, .. } if layer == "poi"));

        // Unconfigured layers are never looked at.
        let decoder = FeatureDecoder::new(flat, vec!["roads".into()]);
        assert!(decoder.decode(&[], TileKey::new(0, 0), 3, &WebMercator::default()).is_ok());
    }

    #[test]
    fn reader_errors_fail_the_tile() {
        let broken = |_: &[u8]| -> Result<Vec<RawLayer>, DecodeError> {
            Err(DecodeError::Malformed("truncated varint".into()))
        };
        let decoder = FeatureDecoder::new(broken, vec!["poi".into()]);
        let err = decoder.decode(&[1, 2], TileKey::new(0, 0), 0, &Identity).unwrap_err();
        assert_eq!(err, DecodeError::Malformed("truncated varint".into()));
    }
}
