//! Time-ordered event queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::Event;
use crate::time::SimTime;

/// An event tagged with an insertion epoch, ordered by time in inverse order
/// with epoch-based ordering for equal times.
struct Item<T: SimTime> {
    event: Event<T>,
    epoch: u64,
}

impl<T: SimTime> Ord for Item<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.event
            .time()
            .total_cmp(&other.event.time())
            .then_with(|| self.epoch.cmp(&other.epoch))
            .reverse()
    }
}

impl<T: SimTime> PartialOrd for Item<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: SimTime> Eq for Item<T> {}

impl<T: SimTime> PartialEq for Item<T> {
    fn eq(&self, other: &Self) -> bool {
        self.epoch == other.epoch
    }
}

/// A container optimized for extraction of the earliest event, based on a
/// binary heap.
///
/// The insertion order of events with equal times is preserved, with FIFO
/// ordering.
pub(crate) struct EventQueue<T: SimTime> {
    heap: BinaryHeap<Item<T>>,
    next_epoch: u64,
}

impl<T: SimTime> EventQueue<T> {
    /// Creates an empty `EventQueue`.
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_epoch: 0,
        }
    }

    /// Inserts a new event.
    ///
    /// This operation has *O*(log(*N*)) amortized worse-case theoretical
    /// complexity.
    pub(crate) fn insert(&mut self, event: Event<T>) {
        let epoch = self.next_epoch;
        assert_ne!(epoch, u64::MAX);
        self.next_epoch += 1;
        self.heap.push(Item { event, epoch });
    }

    /// Pulls the event with the earliest time.
    ///
    /// If several events share the earliest time, the event which was
    /// inserted first is returned.
    pub(crate) fn pull(&mut self) -> Option<Event<T>> {
        let Item { event, .. } = self.heap.pop()?;

        Some(event)
    }

    /// Peeks a reference to the event with the earliest time, leaving it in
    /// the queue.
    pub(crate) fn peek(&self) -> Option<&Event<T>> {
        let Item { ref event, .. } = self.heap.peek()?;

        Some(event)
    }
}
