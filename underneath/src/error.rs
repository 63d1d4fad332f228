// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types. Every failure is scoped to one tile or one feature.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::feature::GeometryKind;
use crate::tile::TileKey;

/// Transport failure reported by the host's fetch collaborator.
///
/// The underlying error is opaque and passed through unchanged. It is shared so
/// the same failure can reach the notification and a waiting query.
#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct FetchError(Arc<dyn StdError + Send + Sync>);

impl FetchError {
    /// Wrap a transport error.
    pub fn new(error: impl StdError + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    /// A transport error that only has a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = message.into().into();
        Self(Arc::from(boxed))
    }

    /// The wrapped error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }
}

/// Tile bytes that the reader could not parse.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not a readable tile.
    #[error("malformed tile: {0}")]
    Malformed(String),
    /// One layer of the tile could not be read.
    #[error("unreadable layer `{layer}`: {message}")]
    Layer {
        /// Layer name.
        layer: String,
        /// Reader message.
        message: String,
    },
}

/// A feature that cannot be placed in the index.
#[derive(Copy, Clone, Debug, Error, PartialEq)]
pub enum GeometryError {
    /// The geometry is not a single point.
    #[error("feature does not have a point geometry (found {found})")]
    NotAPoint {
        /// The geometry the feature actually had.
        found: GeometryKind,
    },
    /// The point projects to a NaN or infinite position.
    #[error("feature position ({x}, {y}) is not finite")]
    NotFinite {
        /// Projected x.
        x: f64,
        /// Projected y.
        y: f64,
    },
}

/// Failure of one tile load. Nothing from the tile is indexed.
#[derive(Clone, Debug, Error)]
pub enum TileError {
    /// The fetch collaborator failed.
    #[error("failed to fetch tile {key} from {url}")]
    Fetch {
        /// Tile that failed.
        key: TileKey,
        /// URL the tile was requested from.
        url: String,
        /// Transport error.
        #[source]
        source: FetchError,
    },
    /// The bytes arrived but could not be decoded.
    #[error("failed to decode tile {key} from {url}")]
    Decode {
        /// Tile that failed.
        key: TileKey,
        /// URL the tile was requested from.
        url: String,
        /// Reader error.
        #[source]
        source: DecodeError,
    },
}

impl TileError {
    /// Tile that failed.
    pub fn key(&self) -> TileKey {
        match self {
            Self::Fetch { key, .. } | Self::Decode { key, .. } => *key,
        }
    }

    /// URL the tile was requested from.
    pub fn url(&self) -> &str {
        match self {
            Self::Fetch { url, .. } | Self::Decode { url, .. } => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_keeps_the_message() {
        let err = FetchError::msg("connection reset");
        assert_eq!(err.to_string(), "connection reset");
        assert_eq!(err.clone().inner().to_string(), "connection reset");
    }

    #[derive(Debug, Error)]
    #[error("tls handshake failed")]
    struct Handshake;

    #[derive(Debug, Error)]
    #[error("connect to tiles.test")]
    struct Connect(#[source] Handshake);

    #[test]
    fn fetch_error_keeps_the_cause_chain() {
        let err = FetchError::new(Connect(Handshake));
        assert_eq!(err.to_string(), "connect to tiles.test");
        let cause = err.source().map(ToString::to_string);
        assert_eq!(cause.as_deref(), Some("tls handshake failed"));
    }

    #[test]
    fn tile_error_exposes_source() {
        let err = TileError::Fetch {
            key: TileKey::new(1, 2),
            url: "https://tiles.test/3/1/2.pbf".into(),
            source: FetchError::msg("404"),
        };
        assert_eq!(err.key(), TileKey::new(1, 2));
        assert_eq!(err.url(), "https://tiles.test/3/1/2.pbf");
        assert_eq!(err.to_string(), "failed to fetch tile 1:2 from https://tiles.test/3/1/2.pbf");
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("404"));
    }
}
