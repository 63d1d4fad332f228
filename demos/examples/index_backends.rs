// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The three `underneath_index` backends side by side.
//!
//! Loads the same scattered points into a flat vector, a uniform grid and an
//! R-tree, commits them in tile-sized batches, then runs the same tolerance
//! boxes against each and checks that they agree.
//!
//! Run:
//! - `cargo run --release -p underneath_demos --example index_backends`

use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;
use underneath_index::backends::RTree;
use underneath_index::{Aabb2D, Backend, Index, IndexGeneric};

const POINTS: usize = 20_000;
const BATCH: usize = 500;
const WORLD: f64 = 4096.0;

/// Deterministic scatter so every run sees the same data.
fn scatter(n: usize) -> Vec<(f64, f64)> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        (state >> 11) as f64 / (1_u64 << 53) as f64 * WORLD
    };
    (0..n).map(|_| (next(), next())).collect()
}

fn load<B: Backend<f64>>(index: &mut IndexGeneric<f64, usize, B>, points: &[(f64, f64)]) {
    for (batch, chunk) in points.chunks(BATCH).enumerate() {
        for (i, &(x, y)) in chunk.iter().enumerate() {
            index.insert(Aabb2D::point(x, y), batch * BATCH + i);
        }
        index.commit();
    }
}

fn run<B: Backend<f64>>(
    name: &str,
    mut index: IndexGeneric<f64, usize, B>,
    points: &[(f64, f64)],
    queries: &[Aabb2D<f64>],
) -> Vec<usize> {
    let start = Instant::now();
    load(&mut index, points);
    let loaded = start.elapsed();

    let start = Instant::now();
    let mut hits = Vec::with_capacity(queries.len());
    for query in queries {
        let mut n = 0;
        index.visit_rect(*query, |_, _| n += 1);
        hits.push(n);
    }
    info!(
        backend = name,
        entries = index.len(),
        load = ?loaded,
        query = ?start.elapsed(),
        total_hits = hits.iter().sum::<usize>(),
        "done"
    );
    hits
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let points = scatter(POINTS);
    let queries: Vec<Aabb2D<f64>> = scatter(1_000)
        .into_iter()
        .map(|(x, y)| Aabb2D::new(x - 50.0, y - 50.0, x + 50.0, y + 50.0))
        .collect();

    let flat = run("flat", Index::<f64, usize>::new(), &points, &queries);
    let grid = run("grid", Index::<f64, usize>::with_grid(256.0), &points, &queries);
    let rtree = run(
        "rtree",
        IndexGeneric::with_backend(RTree::with_max_children(16)),
        &points,
        &queries,
    );

    assert_eq!(flat, grid, "grid disagrees with the linear scan");
    assert_eq!(flat, rtree, "rtree disagrees with the linear scan");
    info!(queries = queries.len(), "all backends agree");
}
