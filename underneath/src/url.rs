// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile URL resolution.

use crate::tile::{TileKey, world_span};

/// Resolves the URL a tile is fetched from.
pub trait TileUrlResolver {
    /// URL of `key` at `zoom`.
    fn resolve(&self, key: TileKey, zoom: u8) -> String;
}

impl<F: Fn(TileKey, u8) -> String> TileUrlResolver for F {
    fn resolve(&self, key: TileKey, zoom: u8) -> String {
        self(key, zoom)
    }
}

/// A slippy-map URL template such as `https://{s}.tiles.test/{z}/{x}/{y}.pbf`.
///
/// Placeholders:
/// - `{z}` zoom,
/// - `{x}` column, wrapped into `[0, 2^z)`,
/// - `{y}` row, `{-y}` the row counted from the bottom (TMS),
/// - `{s}` one of the subdomains, picked from the tile position.
///
/// Unknown placeholders are kept verbatim.
///
/// ```
/// use underneath::{TileKey, TileUrlResolver, UrlTemplate};
///
/// let t = UrlTemplate::new("https://{s}.tiles.test/{z}/{x}/{-y}.pbf").with_subdomains(["a", "b"]);
/// assert_eq!(t.resolve(TileKey::new(-1, 0), 2), "https://b.tiles.test/2/3/3.pbf");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    /// Create a template. Subdomains default to `a`, `b` and `c`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            subdomains: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    /// Replace the subdomains used for `{s}`.
    pub fn with_subdomains<S: Into<String>>(mut self, subdomains: impl IntoIterator<Item = S>) -> Self {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    /// The raw template.
    pub fn template(&self) -> &str {
        &self.template
    }

    fn placeholder(&self, name: &str, col: i64, row: i64, zoom: u8) -> Option<String> {
        match name {
            "z" => Some(zoom.to_string()),
            "x" => Some(col.to_string()),
            "y" => Some(row.to_string()),
            "-y" => Some((world_span(zoom) - 1 - row).to_string()),
            "s" => {
                let n = i64::try_from(self.subdomains.len()).ok().filter(|n| *n > 0)?;
                let i = usize::try_from((col + row).abs() % n).ok()?;
                self.subdomains.get(i).cloned()
            }
            _ => None,
        }
    }
}

impl TileUrlResolver for UrlTemplate {
    fn resolve(&self, key: TileKey, zoom: u8) -> String {
        let col = i64::from(key.wrapped_col(zoom));
        let row = i64::from(key.row);
        let mut out = String::with_capacity(self.template.len() + 16);
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                rest = &rest[open..];
                break;
            };
            let name = &after[..close];
            match self.placeholder(name, col, row, zoom) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[open..open + close + 2]),
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}
