//! Spatial indexing for agent neighbourhood queries.
//!
//! The index is rebuilt from scratch every tick: [`NeighborhoodIndex::clear`] followed by
//! one [`NeighborhoodIndex::insert`] per live agent, then any number of read-only range
//! queries. Individual removal is intentionally absent.

pub mod geometry;
mod quadtree;

pub use geometry::{BoundingBox, BoundingCircle, Vec2, wrap_angle, wrap_signed_angle};
pub use quadtree::QuadTree;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., zero node capacity).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The collider centre lies outside the root boundary.
    #[error("collider centre ({x}, {y}) lies outside the index boundary")]
    OutOfBounds { x: f32, y: f32 },
}

/// Outcome of a full clear-and-repopulate pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RebuildStats {
    /// Entries accepted by the index.
    pub inserted: usize,
    /// Entries rejected because their centre was outside the boundary.
    pub dropped: usize,
}

/// Common behaviour exposed by neighbourhood indices.
pub trait NeighborhoodIndex<T> {
    /// Drop every stored entry.
    fn clear(&mut self);

    /// Store `item` with its collider. Returns `false` (and leaves the index untouched)
    /// when the collider cannot be placed.
    fn insert(&mut self, item: T, collider: BoundingCircle) -> bool;

    /// Visit every entry whose collider intersects `range`, together with the squared
    /// distance between the two centres.
    fn visit_range(&self, range: &BoundingCircle, visitor: &mut dyn FnMut(&T, OrderedFloat<f32>));

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect the items whose colliders intersect `range`.
    fn query(&self, range: &BoundingCircle) -> Vec<T>
    where
        T: Clone,
    {
        let mut found = Vec::new();
        self.visit_range(range, &mut |item, _| found.push(item.clone()));
        found
    }

    /// Clear the index and insert every entry from `entries`.
    fn rebuild<I>(&mut self, entries: I) -> RebuildStats
    where
        I: IntoIterator<Item = (T, BoundingCircle)>,
        Self: Sized,
    {
        self.clear();
        let mut stats = RebuildStats::default();
        for (item, collider) in entries {
            if self.insert(item, collider) {
                stats.inserted += 1;
            } else {
                stats.dropped += 1;
            }
        }
        stats
    }
}

/// Brute-force index that scans every entry per query.
///
/// Useful as a reference when validating [`QuadTree`] and as a baseline in benchmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearIndex<T> {
    boundary: BoundingBox,
    entries: Vec<(T, BoundingCircle)>,
}

impl<T> LinearIndex<T> {
    /// Create an empty index that admits colliders centred inside `boundary`.
    #[must_use]
    pub fn new(boundary: BoundingBox) -> Self {
        Self {
            boundary,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn boundary(&self) -> BoundingBox {
        self.boundary
    }
}

impl<T> NeighborhoodIndex<T> for LinearIndex<T> {
    fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, item: T, collider: BoundingCircle) -> bool {
        if !self.boundary.contains_circle_center(&collider) {
            return false;
        }
        self.entries.push((item, collider));
        true
    }

    fn visit_range(&self, range: &BoundingCircle, visitor: &mut dyn FnMut(&T, OrderedFloat<f32>)) {
        for (item, collider) in &self.entries {
            if collider.intersects(range) {
                let dist_sq = collider.center.distance_squared(range.center);
                visitor(item, OrderedFloat(dist_sq));
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
