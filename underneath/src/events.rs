// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay notifications and the observer registry.
//!
//! Handlers are fire-and-forget: they receive each event by reference and
//! return nothing. A subscription names the [`EventKinds`] it cares about, so
//! the overlay can skip building events nobody listens to.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use underneath::{EventKinds, Observers, OverlayEvent};
//!
//! let cleared = Rc::new(Cell::new(0));
//! let mut observers = Observers::new();
//! let seen = Rc::clone(&cleared);
//! let id = observers.subscribe(EventKinds::FEATURES_CLEARED, move |_| seen.set(seen.get() + 1));
//!
//! observers.emit(&OverlayEvent::FeaturesCleared);
//! assert!(observers.unsubscribe(id));
//! observers.emit(&OverlayEvent::FeaturesCleared);
//! assert_eq!(cleared.get(), 1);
//! ```

use bitflags::bitflags;

use crate::decoder::RejectedFeature;
use crate::error::TileError;
use crate::feature::PointFeature;
use crate::tile::TileKey;

bitflags! {
    /// Set of notification kinds.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        /// [`OverlayEvent::TileLoaded`].
        const TILE_LOADED = 1 << 0;
        /// [`OverlayEvent::TileError`].
        const TILE_ERROR = 1 << 1;
        /// [`OverlayEvent::FeatureError`].
        const FEATURE_ERROR = 1 << 2;
        /// [`OverlayEvent::FeatureAdded`].
        const FEATURE_ADDED = 1 << 3;
        /// [`OverlayEvent::FeaturesCleared`].
        const FEATURES_CLEARED = 1 << 4;
    }
}

/// A notification emitted by the overlay.
#[derive(Clone, Copy, Debug)]
pub enum OverlayEvent<'a> {
    /// A tile was decoded and its features indexed.
    TileLoaded {
        /// Tile key.
        key: TileKey,
        /// URL the tile came from.
        url: &'a str,
        /// Number of features indexed from it.
        features: usize,
    },
    /// A tile could not be fetched or decoded. Nothing from it was indexed.
    TileError {
        /// Tile key.
        key: TileKey,
        /// URL the tile was requested from.
        url: &'a str,
        /// What went wrong.
        error: &'a TileError,
    },
    /// A feature was skipped because it is not a point.
    FeatureError {
        /// Tile the feature belongs to.
        key: TileKey,
        /// The skipped feature and the reason.
        rejected: &'a RejectedFeature,
    },
    /// A feature was indexed.
    FeatureAdded {
        /// The indexed feature.
        feature: &'a PointFeature,
    },
    /// Every tile and feature was dropped.
    FeaturesCleared,
}

impl OverlayEvent<'_> {
    /// The kind of this event.
    pub fn kind(&self) -> EventKinds {
        match self {
            Self::TileLoaded { .. } => EventKinds::TILE_LOADED,
            Self::TileError { .. } => EventKinds::TILE_ERROR,
            Self::FeatureError { .. } => EventKinds::FEATURE_ERROR,
            Self::FeatureAdded { .. } => EventKinds::FEATURE_ADDED,
            Self::FeaturesCleared => EventKinds::FEATURES_CLEARED,
        }
    }
}

/// Handle returned by [`Observers::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&OverlayEvent<'_>)>;

struct Subscription {
    id: SubscriptionId,
    kinds: EventKinds,
    handler: Handler,
}

/// Registry of event handlers, called in subscription order.
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

impl core::fmt::Debug for Observers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds: Vec<EventKinds> = self.subscriptions.iter().map(|s| s.kinds).collect();
        f.debug_struct("Observers")
            .field("subscriptions", &kinds)
            .finish_non_exhaustive()
    }
}

impl Observers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `handler` for every event whose kind is in `kinds`.
    pub fn subscribe(
        &mut self,
        kinds: EventKinds,
        handler: impl FnMut(&OverlayEvent<'_>) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kinds,
            handler: Box::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Whether any subscription listens for one of `kinds`.
    pub fn wants(&self, kinds: EventKinds) -> bool {
        self.subscriptions.iter().any(|s| s.kinds.intersects(kinds))
    }

    /// Deliver `event` to every interested handler.
    pub fn emit(&mut self, event: &OverlayEvent<'_>) {
        let kind = event.kind();
        for s in &mut self.subscriptions {
            if s.kinds.contains(kind) {
                (s.handler)(event);
            }
        }
    }

    /// Number of subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn handlers_only_see_their_kinds() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut observers = Observers::new();
        let l = Rc::clone(&log);
        observers.subscribe(EventKinds::TILE_LOADED | EventKinds::FEATURES_CLEARED, move |e| {
            l.borrow_mut().push(("a", e.kind()));
        });
        let l = Rc::clone(&log);
        observers.subscribe(EventKinds::all(), move |e| l.borrow_mut().push(("b", e.kind())));

        observers.emit(&OverlayEvent::TileLoaded {
            key: TileKey::new(0, 0),
            url: "u",
            features: 0,
        });
        observers.emit(&OverlayEvent::FeaturesCleared);

        assert_eq!(
            *log.borrow(),
            [
                ("a", EventKinds::TILE_LOADED),
                ("b", EventKinds::TILE_LOADED),
                ("a", EventKinds::FEATURES_CLEARED),
                ("b", EventKinds::FEATURES_CLEARED),
            ]
        );
    }

    #[test]
    fn wants_and_unsubscribe() {
        let mut observers = Observers::new();
        assert!(!observers.wants(EventKinds::FEATURE_ADDED));
        let id = observers.subscribe(EventKinds::FEATURE_ADDED, |_| {});
        assert!(observers.wants(EventKinds::FEATURE_ADDED | EventKinds::TILE_ERROR));
        assert!(!observers.wants(EventKinds::TILE_ERROR));
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        assert!(observers.is_empty());
    }
}
