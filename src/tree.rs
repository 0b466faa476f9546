use ulid::Ulid;

use crate::model::{BookingRecord, DateRange, Ms};

/// One stored booking interval. Immutable once inserted — the tree never
/// mutates a stored range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Booked {
    pub range: DateRange,
    pub booking_id: Ulid,
}

#[derive(Debug)]
struct Node {
    booked: Booked,
    /// Max `range.end` across this node and both subtrees.
    max_end: Ms,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn new(booked: Booked) -> Self {
        let max_end = booked.range.end;
        Self { booked, max_end, left: None, right: None }
    }
}

/// Augmented interval search tree over one unit's confirmed bookings.
///
/// Plain BST keyed on `range.start` (ties descend right), each node carrying
/// the max `end` of its subtree so overlap search can prune in O(log N)
/// expected time. No rebalancing: insertion in chronological order degrades
/// toward a list, which is acceptable for the booking counts a single unit
/// sees. The tree assumes well-formed ranges; validation happens upstream.
#[derive(Debug, Default)]
pub struct IntervalTree {
    root: Option<Box<Node>>,
    len: usize,
}

impl IntervalTree {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Build a tree from persisted records, keeping only confirmed bookings
    /// that have not ended by `now`. Insertion order affects only shape,
    /// never query results.
    pub fn from_records(records: &[BookingRecord], now: Ms) -> Self {
        let mut tree = Self::new();
        for record in records.iter().filter(|r| r.is_active(now)) {
            tree.insert(Booked {
                range: record.range,
                booking_id: record.id,
            });
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, booked: Booked) {
        insert_node(&mut self.root, booked);
        self.len += 1;
    }

    /// First stored interval overlapping `query`, or `None` if the slot is
    /// free. When several overlap, which one comes back is unspecified.
    pub fn find_overlap(&self, query: &DateRange) -> Option<&Booked> {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            if node.booked.range.overlaps(query) {
                return Some(&node.booked);
            }
            // An overlap can hide on the left only if something there ends
            // past the query's start; otherwise the right subtree is the
            // only candidate.
            cur = match node.left.as_deref() {
                Some(left) if left.max_end > query.start => Some(left),
                _ => node.right.as_deref(),
            };
        }
        None
    }

    /// Every stored interval overlapping `query`, collected eagerly.
    pub fn find_all_overlaps(&self, query: &DateRange) -> Vec<&Booked> {
        let mut hits = Vec::new();
        collect_overlaps(self.root.as_deref(), query, &mut hits);
        hits
    }
}

fn insert_node(node: &mut Option<Box<Node>>, booked: Booked) {
    match node {
        None => *node = Some(Box::new(Node::new(booked))),
        Some(n) => {
            let inserted_end = booked.range.end;
            if booked.range.start < n.booked.range.start {
                insert_node(&mut n.left, booked);
            } else {
                insert_node(&mut n.right, booked);
            }
            if n.max_end < inserted_end {
                n.max_end = inserted_end;
            }
        }
    }
}

fn collect_overlaps<'a>(node: Option<&'a Node>, query: &DateRange, hits: &mut Vec<&'a Booked>) {
    let Some(n) = node else { return };
    if n.booked.range.overlaps(query) {
        hits.push(&n.booked);
    }
    if let Some(left) = n.left.as_deref()
        && left.max_end > query.start {
            collect_overlaps(Some(left), query, hits);
        }
    // BST order on start: once this node starts at or past query.end, so
    // does everything to its right.
    if n.booked.range.start < query.end {
        collect_overlaps(n.right.as_deref(), query, hits);
    }
}
