// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile store: per-key load state, fetch de-duplication and deferred continuations.
//!
//! The store never performs I/O. A request for an unknown key creates a
//! [`TileState::Pending`] record and queues one [`FetchRequest`] in an outbox;
//! the host drains the outbox, fetches the bytes however it likes and reports
//! back. Every request carries the store's epoch, so completions that arrive
//! after a [`clear`][TileStore::clear] are recognised as stale and ignored.
//!
//! ```
//! use underneath::{TileKey, TileState, TileStore};
//!
//! let mut store: TileStore<()> = TileStore::new();
//! let key = TileKey::new(3, 5);
//! assert!(store.request(key, 4, "https://tiles.test/4/3/5.pbf".into()));
//! assert!(!store.request(key, 4, "https://tiles.test/4/3/5.pbf".into()));
//!
//! let fetch = store.poll_fetch().unwrap();
//! assert_eq!(fetch.key, key);
//! assert!(store.poll_fetch().is_none());
//! assert_eq!(store.state(key), TileState::Pending);
//! ```

use std::collections::VecDeque;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::tile::TileKey;

/// Load state of one tile.
///
/// Moves forward only: `Absent` → `Pending` → `Loaded` or `Errored`, until the
/// whole store is cleared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Never requested since the last clear.
    #[default]
    Absent,
    /// Fetch queued or in flight.
    Pending,
    /// Decoded and indexed.
    Loaded,
    /// Fetch or decode failed. Stays so until the next clear.
    Errored,
}

/// One fetch the host has to perform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Tile to fetch.
    pub key: TileKey,
    /// Zoom the tile was requested at.
    pub zoom: u8,
    /// Where to fetch it from.
    pub url: String,
    /// Store epoch at request time.
    pub epoch: u64,
}

/// Bookkeeping for one requested tile.
pub struct TileRecord<C> {
    key: TileKey,
    state: TileState,
    url: String,
    decoded_layers: Option<Vec<String>>,
    feature_count: usize,
    deferred: SmallVec<[C; 1]>,
}

impl<C> core::fmt::Debug for TileRecord<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileRecord")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("url", &self.url)
            .field("decoded_layers", &self.decoded_layers)
            .field("feature_count", &self.feature_count)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl<C> TileRecord<C> {
    /// Tile key.
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Current state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// URL the tile was requested from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Configured layers found in the tile, once loaded.
    pub fn decoded_layers(&self) -> Option<&[String]> {
        self.decoded_layers.as_deref()
    }

    /// Number of features indexed from this tile.
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Number of continuations waiting for this tile.
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }
}

/// Per-key tile state with an outbox of pending fetches.
///
/// `C` is the continuation type parked on a pending tile until it settles.
pub struct TileStore<C> {
    records: HashMap<TileKey, TileRecord<C>>,
    outbox: VecDeque<FetchRequest>,
    epoch: u64,
}

impl<C> core::fmt::Debug for TileStore<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileStore")
            .field("records", &self.records.len())
            .field("outbox", &self.outbox.len())
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<C> Default for TileStore<C> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            outbox: VecDeque::new(),
            epoch: 0,
        }
    }
}

impl<C> TileStore<C> {
    /// Create an empty store at epoch 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch. Bumped by every [`clear`][Self::clear].
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// State of `key`; [`TileState::Absent`] when it has no record.
    pub fn state(&self, key: TileKey) -> TileState {
        self.records.get(&key).map_or(TileState::Absent, |r| r.state)
    }

    /// Whether `key` has a record, whatever its state.
    pub fn has(&self, key: TileKey) -> bool {
        self.records.contains_key(&key)
    }

    /// The record of `key`.
    pub fn record(&self, key: TileKey) -> Option<&TileRecord<C>> {
        self.records.get(&key)
    }

    /// All records, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &TileRecord<C>> + '_ {
        self.records.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Request `key`. Returns `true` if this queued a new fetch.
    ///
    /// Keys that already have a record are left alone, including errored ones.
    pub fn request(&mut self, key: TileKey, zoom: u8, url: String) -> bool {
        if self.records.contains_key(&key) {
            return false;
        }
        debug!(tile = %key, zoom, url = %url, epoch = self.epoch, "queue tile fetch");
        self.outbox.push_back(FetchRequest {
            key,
            zoom,
            url: url.clone(),
            epoch: self.epoch,
        });
        self.records.insert(
            key,
            TileRecord {
                key,
                state: TileState::Pending,
                url,
                decoded_layers: None,
                feature_count: 0,
                deferred: SmallVec::new(),
            },
        );
        true
    }

    /// Take the next fetch the host has to perform.
    pub fn poll_fetch(&mut self) -> Option<FetchRequest> {
        self.outbox.pop_front()
    }

    /// Number of fetches not yet taken by the host.
    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    /// Park `continuation` on a pending tile.
    ///
    /// Hands it back if the tile is not pending.
    pub fn defer(&mut self, key: TileKey, continuation: C) -> Result<(), C> {
        match self.records.get_mut(&key) {
            Some(r) if r.state == TileState::Pending => {
                r.deferred.push(continuation);
                Ok(())
            }
            _ => Err(continuation),
        }
    }

    /// Whether a completion for `request` should be applied.
    ///
    /// Only completions from the current epoch for a still pending tile are.
    pub fn accepts(&self, request: &FetchRequest) -> bool {
        request.epoch == self.epoch && self.state(request.key) == TileState::Pending
    }

    /// Mark `key` loaded and take its continuations.
    pub fn finish_loaded(
        &mut self,
        key: TileKey,
        layers: Vec<String>,
        feature_count: usize,
    ) -> SmallVec<[C; 1]> {
        self.settle(key, TileState::Loaded, |r| {
            r.decoded_layers = Some(layers);
            r.feature_count = feature_count;
        })
    }

    /// Mark `key` errored and take its continuations.
    pub fn finish_errored(&mut self, key: TileKey) -> SmallVec<[C; 1]> {
        self.settle(key, TileState::Errored, |_| {})
    }

    fn settle(
        &mut self,
        key: TileKey,
        state: TileState,
        update: impl FnOnce(&mut TileRecord<C>),
    ) -> SmallVec<[C; 1]> {
        match self.records.get_mut(&key) {
            Some(r) if r.state == TileState::Pending => {
                r.state = state;
                update(r);
                core::mem::take(&mut r.deferred)
            }
            _ => SmallVec::new(),
        }
    }

    /// Drop every record and queued fetch and start a new epoch.
    ///
    /// Returns the continuations that were still waiting on pending tiles; they
    /// will never be resumed.
    pub fn clear(&mut self) -> Vec<C> {
        let abandoned: Vec<C> = self
            .records
            .drain()
            .flat_map(|(_, r)| r.deferred)
            .collect();
        self.outbox.clear();
        self.epoch += 1;
        abandoned
    }
}
