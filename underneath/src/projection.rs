// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geographic coordinates and the projection collaborator.
//!
//! Decoded vector tiles carry geometry in tile-local units. The overlay turns
//! them into longitude/latitude with [`tile_local_to_lnglat`] and then into the
//! host's projected space with a [`Projection`]. Hosts with their own map widget
//! implement [`Projection`] on top of it; [`WebMercator`] covers the common
//! slippy-map pixel space.

use core::f64::consts::PI;

use kurbo::Point;

use crate::tile::TileKey;

/// Latitude limit of the square Web Mercator world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A geographic coordinate in degrees.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LngLat {
    /// Longitude, east positive.
    pub lng: f64,
    /// Latitude, north positive.
    pub lat: f64,
}

impl LngLat {
    /// Create a coordinate from longitude and latitude.
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Conversion between geographic coordinates and the host's projected space.
pub trait Projection {
    /// Project a geographic coordinate at `zoom`.
    fn project(&self, lnglat: LngLat, zoom: u8) -> Point;

    /// Inverse of [`project`][Self::project].
    fn unproject(&self, point: Point, zoom: u8) -> LngLat;

    /// Geographic and projected position of a tile-local point.
    ///
    /// `extent` is the tile's local coordinate range (4096 for most vector tiles).
    fn project_tile_local(
        &self,
        key: TileKey,
        zoom: u8,
        extent: u32,
        local: Point,
    ) -> (LngLat, Point) {
        let lnglat = tile_local_to_lnglat(key, zoom, extent, local);
        (lnglat, self.project(lnglat, zoom))
    }
}

/// Spherical Mercator in pixel units: the world is `tile_size * 2^zoom` wide.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WebMercator {
    /// Edge length of one tile in projected units.
    pub tile_size: f64,
}

impl Default for WebMercator {
    fn default() -> Self {
        Self { tile_size: 256.0 }
    }
}

impl WebMercator {
    /// Projection for tiles of `tile_size` units.
    pub const fn new(tile_size: f64) -> Self {
        Self { tile_size }
    }

    fn scale(&self, zoom: u8) -> f64 {
        self.tile_size * zoom_factor(zoom)
    }
}

impl Projection for WebMercator {
    fn project(&self, lnglat: LngLat, zoom: u8) -> Point {
        let scale = self.scale(zoom);
        let lat = lnglat.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin = lat.to_radians().sin();
        let x = (lnglat.lng + 180.0) / 360.0 * scale;
        let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * scale;
        Point::new(x, y)
    }

    fn unproject(&self, point: Point, zoom: u8) -> LngLat {
        let scale = self.scale(zoom);
        let lng = point.x / scale * 360.0 - 180.0;
        let n = PI - 2.0 * PI * point.y / scale;
        let lat = n.sinh().atan().to_degrees();
        LngLat::new(lng, lat)
    }
}

/// Convert a tile-local vector tile coordinate to longitude/latitude.
///
/// ```
/// use kurbo::Point;
/// use underneath::{TileKey, tile_local_to_lnglat};
///
/// // The center of the single zoom-0 tile is null island.
/// let ll = tile_local_to_lnglat(TileKey::new(0, 0), 0, 4096, Point::new(2048.0, 2048.0));
/// assert!(ll.lng.abs() < 1e-9 && ll.lat.abs() < 1e-9);
/// ```
pub fn tile_local_to_lnglat(key: TileKey, zoom: u8, extent: u32, local: Point) -> LngLat {
    let extent = f64::from(extent);
    let size = extent * zoom_factor(zoom);
    let x0 = extent * f64::from(key.col);
    let y0 = extent * f64::from(key.row);
    let lng = (local.x + x0) * 360.0 / size - 180.0;
    let y = 180.0 - (local.y + y0) * 360.0 / size;
    let lat = 360.0 / PI * (y * PI / 180.0).exp().atan() - 90.0;
    LngLat::new(lng, lat)
}

fn zoom_factor(zoom: u8) -> f64 {
    2_f64.powi(i32::from(zoom))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn mercator_corners() {
        let m = WebMercator::default();
        let p = m.project(LngLat::new(-180.0, MAX_LATITUDE), 0);
        assert!(close(p.x, 0.0) && close(p.y, 0.0), "{p:?}");
        let p = m.project(LngLat::new(0.0, 0.0), 1);
        assert!(close(p.x, 256.0) && close(p.y, 256.0), "{p:?}");
    }

    #[test]
    fn mercator_round_trips() {
        let m = WebMercator::new(512.0);
        let ll = LngLat::new(13.4050, 52.5200);
        let back = m.unproject(m.project(ll, 12), 12);
        assert!(close(back.lng, ll.lng) && close(back.lat, ll.lat), "{back:?}");
    }

    #[test]
    fn tile_origin_matches_mercator() {
        // The top-left corner of a tile projects onto the tile grid.
        let m = WebMercator::default();
        let key = TileKey::new(5, 9);
        let (_, p) = m.project_tile_local(key, 4, 4096, Point::ZERO);
        assert!(close(p.x, 5.0 * 256.0) && close(p.y, 9.0 * 256.0), "{p:?}");
    }
}
