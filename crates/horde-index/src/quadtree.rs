use ordered_float::OrderedFloat;

use crate::geometry::{BoundingBox, BoundingCircle, Vec2};
use crate::{IndexError, NeighborhoodIndex, RebuildStats};

/// Recursive quad-partition tree storing `(item, collider)` pairs.
///
/// Every node admits up to `capacity` entries of its own. The first insertion that
/// finds a full node splits it into four equal quadrants (NW, NE, SW, SE) and routes
/// the entry by comparing its centre with the node centre, so anything the root
/// admits finds a home. Entries already held by a node stay there after the split,
/// so each item lives in exactly one node.
///
/// Each node also tracks the axis-aligned reach of every collider stored in its
/// subtree. Range queries prune against that reach rather than the node box, which
/// keeps results exact for colliders that overhang their node.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    boundary: BoundingBox,
    capacity: usize,
    entries: Vec<(T, BoundingCircle)>,
    children: Option<Box<[QuadTree<T>; 4]>>,
    reach: Option<Reach>,
}

/// Axis-aligned box covering every collider in a subtree.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reach {
    min: Vec2,
    max: Vec2,
}

impl Reach {
    fn of(collider: &BoundingCircle) -> Self {
        let extent = Vec2::new(collider.radius, collider.radius);
        Self {
            min: collider.center - extent,
            max: collider.center + extent,
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            min: Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    fn intersects(&self, range: &BoundingCircle) -> bool {
        let closest = Vec2::new(
            range.center.x.max(self.min.x).min(self.max.x),
            range.center.y.max(self.min.y).min(self.max.y),
        );
        closest.distance_squared(range.center) <= range.radius * range.radius
    }
}

impl<T> QuadTree<T> {
    /// Create an empty tree covering `boundary`.
    pub fn new(boundary: BoundingBox, capacity: usize) -> Result<Self, IndexError> {
        if capacity == 0 {
            return Err(IndexError::InvalidConfig("node capacity must be non-zero"));
        }
        if !boundary.is_valid() {
            return Err(IndexError::InvalidConfig(
                "boundary extents must be positive and finite",
            ));
        }
        Ok(Self::leaf(boundary, capacity))
    }

    fn leaf(boundary: BoundingBox, capacity: usize) -> Self {
        Self {
            boundary,
            capacity,
            entries: Vec::with_capacity(capacity),
            children: None,
            reach: None,
        }
    }

    #[must_use]
    pub fn boundary(&self) -> BoundingBox {
        self.boundary
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true once this node has split into quadrants.
    #[must_use]
    pub fn is_divided(&self) -> bool {
        self.children.is_some()
    }

    /// Entries stored directly in this node (not in its descendants).
    #[must_use]
    pub fn entries(&self) -> &[(T, BoundingCircle)] {
        &self.entries
    }

    /// Child quadrants in NW, NE, SW, SE order, if divided.
    #[must_use]
    pub fn children(&self) -> Option<&[QuadTree<T>; 4]> {
        self.children.as_deref()
    }

    /// Total number of entries in this subtree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
            + self
                .children
                .as_deref()
                .map_or(0, |children| children.iter().map(QuadTree::len).sum())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of nodes in this subtree, including this one.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.as_deref().map_or(0, |children| {
            children.iter().map(QuadTree::node_count).sum()
        })
    }

    /// Longest root-to-leaf path, counting nodes (an undivided tree has depth 1).
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.as_deref().map_or(0, |children| {
            children.iter().map(QuadTree::depth).max().unwrap_or(0)
        })
    }

    /// Boundaries of every node in pre-order, for debug overlays.
    #[must_use]
    pub fn node_boundaries(&self) -> Vec<BoundingBox> {
        let mut out = Vec::with_capacity(self.node_count());
        self.collect_boundaries(&mut out);
        out
    }

    fn collect_boundaries(&self, out: &mut Vec<BoundingBox>) {
        out.push(self.boundary);
        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.collect_boundaries(out);
            }
        }
    }

    /// Insert `item` with `collider`.
    ///
    /// Returns `false`, leaving the tree untouched, when the collider centre is
    /// outside the boundary. Every admitted entry is stored.
    pub fn insert(&mut self, item: T, collider: BoundingCircle) -> bool {
        if !self.boundary.contains_circle_center(&collider) {
            return false;
        }
        self.insert_admitted(item, collider);
        true
    }

    fn insert_admitted(&mut self, item: T, collider: BoundingCircle) {
        let reach = Reach::of(&collider);
        self.reach = Some(self.reach.map_or(reach, |current| current.union(reach)));

        if self.children.is_none() && self.entries.len() < self.capacity {
            self.entries.push((item, collider));
            return;
        }

        let boundary = self.boundary;
        let capacity = self.capacity;
        let children = self.children.get_or_insert_with(|| {
            let [nw, ne, sw, se] = boundary.quadrants();
            Box::new([
                Self::leaf(nw, capacity),
                Self::leaf(ne, capacity),
                Self::leaf(sw, capacity),
                Self::leaf(se, capacity),
            ])
        });

        children[boundary.quadrant_of(collider.center)].insert_admitted(item, collider);
    }

    /// Like [`QuadTree::insert`] but reports rejection as an error.
    pub fn try_insert(&mut self, item: T, collider: BoundingCircle) -> Result<(), IndexError> {
        if self.insert(item, collider) {
            Ok(())
        } else {
            Err(IndexError::OutOfBounds {
                x: collider.center.x,
                y: collider.center.y,
            })
        }
    }

    /// Visit every entry whose collider intersects `range`.
    ///
    /// Order is this node's entries in insertion order, then the NW, NE, SW and SE
    /// subtrees; it is stable for a fixed tree.
    pub fn visit_range<F>(&self, range: &BoundingCircle, visitor: &mut F)
    where
        F: FnMut(&T, OrderedFloat<f32>) + ?Sized,
    {
        if !self.reach.is_some_and(|reach| reach.intersects(range)) {
            return;
        }

        for (item, collider) in &self.entries {
            if collider.intersects(range) {
                visitor(
                    item,
                    OrderedFloat(collider.center.distance_squared(range.center)),
                );
            }
        }

        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.visit_range(range, visitor);
            }
        }
    }

    /// Items whose colliders intersect `range`.
    #[must_use]
    pub fn query(&self, range: &BoundingCircle) -> Vec<T>
    where
        T: Clone,
    {
        let mut found = Vec::new();
        self.visit_range(range, &mut |item: &T, _| found.push(item.clone()));
        found
    }

    /// Reset to a single empty leaf with the boundary and capacity it was built with.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.children = None;
        self.reach = None;
    }

    /// Clear and repopulate from `entries`.
    pub fn rebuild<I>(&mut self, entries: I) -> RebuildStats
    where
        I: IntoIterator<Item = (T, BoundingCircle)>,
    {
        NeighborhoodIndex::rebuild(self, entries)
    }
}

impl<T> NeighborhoodIndex<T> for QuadTree<T> {
    fn clear(&mut self) {
        QuadTree::clear(self);
    }

    fn insert(&mut self, item: T, collider: BoundingCircle) -> bool {
        QuadTree::insert(self, item, collider)
    }

    fn visit_range(&self, range: &BoundingCircle, visitor: &mut dyn FnMut(&T, OrderedFloat<f32>)) {
        QuadTree::visit_range(self, range, visitor);
    }

    fn len(&self) -> usize {
        QuadTree::len(self)
    }
}
