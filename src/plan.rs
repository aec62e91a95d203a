//! Time-ordered plans.
//!
//! The `Context` keeps its scheduled callbacks, one per time step, in a
//! `Queue<Box<dyn FnOnce(&mut Context)>>`. Adding and removing are
//! *O*(log *n*).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Plans ordered by time. Plans at the same time come out in the order they
/// were added.
pub struct Queue<T> {
    queue: BinaryHeap<Entry<T>>,
    plan_counter: u64,
}

impl<T> Queue<T> {
    #[must_use]
    pub fn new() -> Queue<T> {
        Queue {
            queue: BinaryHeap::new(),
            plan_counter: 0,
        }
    }

    /// Schedules `data` at `time`.
    pub fn add_plan(&mut self, time: f64, data: T) {
        let id = self.plan_counter;
        self.queue.push(Entry { time, id, data });
        self.plan_counter += 1;
    }

    /// Drops every pending plan.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Removes and returns the earliest plan.
    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        self.queue.pop().map(|entry| Plan {
            time: entry.time,
            data: entry.data,
        })
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Ordered by time and id only; the payload takes no part.
struct Entry<T> {
    time: f64,
    id: u64,
    data: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `BinaryHeap` is a max-heap, so both orderings are reversed.
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.total_cmp(&other.time).reverse() {
            Ordering::Equal => self.id.cmp(&other.id).reverse(),
            time_ordering => time_ordering,
        }
    }
}

pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}
