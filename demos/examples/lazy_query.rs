// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy loading and proximity queries against an in-memory tile source.
//!
//! This example plays the host of an [`Overlay`]:
//! - tiles are served from memory in a small text format, one of them failing,
//! - queries wait for their tile and are answered once the host reports back,
//! - a feature shared by two neighbouring tiles is returned only once,
//! - a zoom change clears everything, then an eager overlay loads a viewport.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p underneath_demos --example lazy_query`

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use geo_types::{Geometry, LineString};
use kurbo::{Point, Rect};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use underneath::{
    DecodeError, EventKinds, FetchError, FetchRequest, Overlay, OverlayEvent, OverlayOptions,
    QueryResult, RawFeature, RawLayer, TileKey, UrlTemplate,
};

const EXTENT: u32 = 4096;

/// Parse the demo tile format.
///
/// One feature per line, `point x y osm_id name` or `line x0 y0 x1 y1`, in
/// tile-local units.
fn read_text_tile(bytes: &[u8]) -> Result<Vec<RawLayer>, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let mut features = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut fields = line.split_whitespace();
        let feature = match fields.next() {
            Some("point") => {
                let x = number(fields.next(), line)?;
                let y = number(fields.next(), line)?;
                let id: i64 = number(fields.next(), line)?;
                let name = fields.collect::<Vec<_>>().join(" ");
                RawFeature::point(x, y)
                    .with_property("osm_id", id)
                    .with_property("name", name)
            }
            Some("line") => {
                let coords: [f32; 4] = [
                    number(fields.next(), line)?,
                    number(fields.next(), line)?,
                    number(fields.next(), line)?,
                    number(fields.next(), line)?,
                ];
                RawFeature {
                    id: None,
                    properties: Default::default(),
                    geometry: Geometry::LineString(LineString::from(vec![
                        (coords[0], coords[1]),
                        (coords[2], coords[3]),
                    ])),
                }
            }
            _ => return Err(DecodeError::Malformed(format!("unknown record `{line}`"))),
        };
        features.push(feature);
    }
    Ok(vec![RawLayer {
        name: "poi".into(),
        extent: EXTENT,
        features,
    }])
}

fn number<T: FromStr>(field: Option<&str>, line: &str) -> Result<T, DecodeError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| DecodeError::Malformed(format!("bad number in `{line}`")))
}

/// The "network": serves tile bodies by URL.
fn fetch(request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
    let body = match request.url.as_str() {
        "mem://2/1/1" => {
            "point 2048 2048 1 Market Hall\n\
             point 2100 2000 2 Bakery\n\
             point 4095 1024 9 Harbour Café\n\
             line 0 0 4096 4096\n"
        }
        "mem://2/2/1" => "point 1 1024 9 Harbour Café\npoint 300 1100 10 Ferry Pier\n",
        "mem://2/3/3" => return Err(FetchError::msg("503 Service Unavailable")),
        url if url.starts_with("mem://") => "",
        url => return Err(FetchError::msg(format!("unknown scheme in {url}"))),
    };
    Ok(body.as_bytes().to_vec())
}

/// Perform every fetch the overlay asked for.
fn drain(overlay: &mut Overlay) {
    while let Some(request) = overlay.poll_fetch() {
        let result = fetch(&request);
        overlay.finish_fetch(request, result);
    }
}

fn print_answer(label: &'static str) -> impl FnOnce(QueryResult) {
    move |result| match result {
        Ok(features) => {
            let names: Vec<String> = features
                .iter()
                .map(|f| f.property("name").map_or_else(String::new, |n| n.to_string()))
                .collect();
            info!(query = label, results = ?names, "answered");
        }
        Err(error) => warn!(query = label, %error, "query failed"),
    }
}

fn log_events(overlay: &mut Overlay) {
    overlay.subscribe(EventKinds::all(), |event| match event {
        OverlayEvent::TileLoaded { key, url, features } => {
            info!(tile = %key, url, features, "tile loaded");
        }
        OverlayEvent::TileError { key, error, .. } => info!(tile = %key, %error, "tile error"),
        OverlayEvent::FeatureError { key, rejected } => {
            info!(tile = %key, layer = %rejected.layer, error = %rejected.error, "feature skipped");
        }
        OverlayEvent::FeatureAdded { feature } => {
            info!(tile = %feature.tile, lng = feature.geometry.lng, lat = feature.geometry.lat, "feature added");
        }
        OverlayEvent::FeaturesCleared => info!("features cleared"),
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = OverlayOptions::default().with_layers(["poi"]).with_tolerance(40.0);
    let mut overlay = Overlay::new(read_text_tile, UrlTemplate::new("mem://{z}/{x}/{y}"), options)
        .with_zoom(2);
    log_events(&mut overlay);

    // Zoom 2 is a 4x4 grid of 256 unit tiles.
    let market = Point::new(1.5 * 256.0, 1.5 * 256.0);
    let harbour = Point::new(2.0 * 256.0, 1.25 * 256.0);
    let outcome = overlay.query(market, None, print_answer("market"));
    info!(?outcome, "market query");
    let outcome = overlay.query(harbour, None, print_answer("harbour, waiting"));
    info!(?outcome, "harbour query");
    drain(&mut overlay);

    // Both tiles around the harbour are loaded now; the shared café shows up once.
    overlay.query(harbour, Some(8.0), print_answer("harbour"));

    let failing = Point::new(3.5 * 256.0, 3.5 * 256.0);
    overlay.query(failing, None, print_answer("failing tile"));
    drain(&mut overlay);
    info!(state = ?overlay.state(TileKey::new(3, 3)), "after failure");

    // A pending query is dropped when the zoom changes under it.
    overlay.query(Point::new(10.0, 10.0), None, print_answer("never answered"));
    overlay.set_zoom(3);
    drain(&mut overlay);
    info!(tiles = overlay.store().len(), features = overlay.index().len(), "after zoom change");

    // Eager loading: the host announces the viewport and queries answer right away.
    let options = OverlayOptions::default().with_layers(["poi"]).with_lazy(false);
    let mut eager = Overlay::new(read_text_tile, UrlTemplate::new("mem://{z}/{x}/{y}"), options)
        .with_zoom(2);
    let queued = eager.load_bounds(Rect::new(300.0, 300.0, 600.0, 400.0));
    info!(queued, "viewport requested");
    drain(&mut eager);

    let found = Rc::new(RefCell::new(0));
    let count = Rc::clone(&found);
    eager.query(market, None, move |r| *count.borrow_mut() = r.map_or(0, |f| f.len()));
    info!(found = *found.borrow(), "eager market query");
}
