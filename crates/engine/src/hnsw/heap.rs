//! Distance-ordered heaps over (id, distance) pairs.
//!
//! One heap type, parameterized by which end sits at the root:
//! - [`MinHeap`]: closest element on top. Used for unexplored candidates.
//! - [`MaxHeap`]: farthest element on top. Used for a bounded result set so
//!   the worst accepted result can be inspected and evicted in O(log n).
//!
//! Ordering is total: distance via `f32::total_cmp`, then id ascending.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;
use vectory_core::VectorId;

/// A vertex id paired with its distance to some query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// Vertex id
    pub id: VectorId,
    /// Distance to the query (lower = closer)
    pub distance: f32,
}

impl Element {
    /// Create a new element
    pub fn new(id: VectorId, distance: f32) -> Self {
        Self { id, distance }
    }

    /// Ascending order: closer first, then lower id
    pub fn cmp_closest_first(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Which element a heap keeps at its root
pub trait HeapOrder {
    /// Ordering under which the root is the greatest element
    fn cmp(a: &Element, b: &Element) -> Ordering;
}

/// Root is the closest element
#[derive(Debug)]
pub enum MinFirst {}

/// Root is the farthest element
#[derive(Debug)]
pub enum MaxFirst {}

impl HeapOrder for MinFirst {
    fn cmp(a: &Element, b: &Element) -> Ordering {
        b.cmp_closest_first(a)
    }
}

impl HeapOrder for MaxFirst {
    fn cmp(a: &Element, b: &Element) -> Ordering {
        a.cmp_closest_first(b)
    }
}

struct Ranked<O> {
    element: Element,
    _order: PhantomData<O>,
}

impl<O: HeapOrder> PartialEq for Ranked<O> {
    fn eq(&self, other: &Self) -> bool {
        O::cmp(&self.element, &other.element) == Ordering::Equal
    }
}

impl<O: HeapOrder> Eq for Ranked<O> {}

impl<O: HeapOrder> PartialOrd for Ranked<O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<O: HeapOrder> Ord for Ranked<O> {
    fn cmp(&self, other: &Self) -> Ordering {
        O::cmp(&self.element, &other.element)
    }
}

fn ranked<O>(element: Element) -> Ranked<O> {
    Ranked {
        element,
        _order: PhantomData,
    }
}

/// Array-backed binary heap of [`Element`]s
pub struct DistanceHeap<O: HeapOrder> {
    inner: BinaryHeap<Ranked<O>>,
}

/// Closest-first heap
pub type MinHeap = DistanceHeap<MinFirst>;

/// Farthest-first heap
pub type MaxHeap = DistanceHeap<MaxFirst>;

impl<O: HeapOrder> DistanceHeap<O> {
    /// Create an empty heap
    pub fn new() -> Self {
        Self {
            inner: BinaryHeap::new(),
        }
    }

    /// Create an empty heap that holds `capacity` elements without reallocating
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: BinaryHeap::with_capacity(capacity),
        }
    }

    /// Build a heap from a slice in O(n), reserving room for `extra` more pushes
    pub fn from_slice(elements: &[Element], extra: usize) -> Self {
        let mut items = Vec::with_capacity(elements.len() + extra);
        items.extend(elements.iter().copied().map(ranked::<O>));
        Self {
            inner: BinaryHeap::from(items),
        }
    }

    /// Push an element
    pub fn push(&mut self, element: Element) {
        self.inner.push(ranked(element));
    }

    /// Remove and return the root
    pub fn pop(&mut self) -> Option<Element> {
        self.inner.pop().map(|r| r.element)
    }

    /// Return the root without removing it
    pub fn peek(&self) -> Option<&Element> {
        self.inner.peek().map(|r| &r.element)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Elements in arbitrary order
    pub fn into_vec(self) -> Vec<Element> {
        self.inner.into_iter().map(|r| r.element).collect()
    }

    /// Elements ranked closest first, ties by ascending id
    pub fn into_sorted_vec(self) -> Vec<Element> {
        let mut v = self.into_vec();
        v.sort_by(Element::cmp_closest_first);
        v
    }
}

impl<O: HeapOrder> Default for DistanceHeap<O> {
    fn default() -> Self {
        Self::new()
    }
}
