// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile addressing: keys, point-to-tile mapping and visible tile ranges.

use core::fmt;

use kurbo::{Point, Rect};

/// Column and row of a tile at the current zoom.
///
/// The zoom is not part of the key. Keys from different zooms are never mixed
/// because the overlay drops every key when the zoom changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Tile column, growing east.
    pub col: i32,
    /// Tile row, growing south.
    pub row: i32,
}

impl TileKey {
    /// Create a key from a column and a row.
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// The tile containing a projected point, for square tiles of `tile_size` units.
    ///
    /// ```
    /// use kurbo::Point;
    /// use underneath::TileKey;
    ///
    /// assert_eq!(TileKey::containing(Point::new(300.0, 10.0), 256.0), TileKey::new(1, 0));
    /// assert_eq!(TileKey::containing(Point::new(-1.0, 256.0), 256.0), TileKey::new(-1, 1));
    /// ```
    pub fn containing(point: Point, tile_size: f64) -> Self {
        Self::new(tile_coord(point.x, tile_size), tile_coord(point.y, tile_size))
    }

    /// Every tile touching `rect`, nearest to the center of the range first.
    ///
    /// Ties keep row-major order so the result is deterministic. The whole range is
    /// materialized, so callers bound `rect` first.
    pub fn covering(rect: Rect, tile_size: f64) -> Vec<Self> {
        let rect = rect.abs();
        let (c0, c1) = (tile_coord(rect.x0, tile_size), tile_coord(rect.x1, tile_size));
        let (r0, r1) = (tile_coord(rect.y0, tile_size), tile_coord(rect.y1, tile_size));
        let center = Point::new(
            (f64::from(c0) + f64::from(c1) + 1.0) * 0.5,
            (f64::from(r0) + f64::from(r1) + 1.0) * 0.5,
        );

        let mut keys: Vec<Self> = (r0..=r1)
            .flat_map(|row| (c0..=c1).map(move |col| Self::new(col, row)))
            .collect();
        keys.sort_by(|a, b| {
            let da = a.center().distance_squared(center);
            let db = b.center().distance_squared(center);
            da.total_cmp(&db)
        });
        keys
    }

    /// Column wrapped into `[0, 2^zoom)`, for worlds that repeat horizontally.
    pub fn wrapped_col(self, zoom: u8) -> i32 {
        let span = world_span(zoom);
        i32::try_from(i64::from(self.col).rem_euclid(span)).unwrap_or(self.col)
    }

    /// Whether the row exists at `zoom`. Rows do not wrap.
    pub fn row_in_world(self, zoom: u8) -> bool {
        (0..world_span(zoom)).contains(&i64::from(self.row))
    }

    /// Center of the tile in tile units.
    fn center(self) -> Point {
        Point::new(f64::from(self.col) + 0.5, f64::from(self.row) + 0.5)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.col, self.row)
    }
}

/// Number of tiles along one axis at `zoom`.
pub(crate) fn world_span(zoom: u8) -> i64 {
    1_i64 << zoom.min(62)
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Tile coordinates of real maps fit in i32; `as` saturates anything beyond."
)]
fn tile_coord(v: f64, tile_size: f64) -> i32 {
    (v / tile_size).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_floors_toward_negative_infinity() {
        assert_eq!(TileKey::containing(Point::new(0.0, 0.0), 256.0), TileKey::new(0, 0));
        assert_eq!(TileKey::containing(Point::new(255.9, 511.0), 256.0), TileKey::new(0, 1));
        assert_eq!(TileKey::containing(Point::new(-0.5, -300.0), 256.0), TileKey::new(-1, -2));
    }

    #[test]
    fn covering_is_center_out() {
        let keys = TileKey::covering(Rect::new(0.0, 0.0, 767.0, 767.0), 256.0);
        assert_eq!(keys.len(), 9);
        assert_eq!(keys[0], TileKey::new(1, 1));
        // Edge neighbours come before corners.
        for k in &keys[1..5] {
            assert!(k.col == 1 || k.row == 1, "{k} should be an edge neighbour");
        }
    }

    #[test]
    fn covering_accepts_flipped_rects() {
        let a = TileKey::covering(Rect::new(10.0, 10.0, 300.0, 20.0), 256.0);
        let b = TileKey::covering(Rect::new(300.0, 20.0, 10.0, 10.0), 256.0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn columns_wrap_and_rows_are_bounded() {
        let zoom = 2;
        assert_eq!(TileKey::new(-1, 0).wrapped_col(zoom), 3);
        assert_eq!(TileKey::new(5, 0).wrapped_col(zoom), 1);
        assert!(TileKey::new(9, 3).row_in_world(zoom));
        assert!(!TileKey::new(0, 4).row_in_world(zoom));
        assert!(!TileKey::new(0, -1).row_in_world(zoom));
    }

    #[test]
    fn display_matches_col_row() {
        assert_eq!(TileKey::new(3, -7).to_string(), "3:-7");
    }
}
