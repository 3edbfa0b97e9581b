// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-interface expected-message queues.
//!
//! Each interface under test owns one bounded queue of expectation
//! descriptors. The command handler (shell thread) is the only producer,
//! the verifier (poll thread) the only consumer, so a two-slot lock-free
//! ring with acquire/release head and tail is enough; there is never
//! contention beyond the ring's own memory ordering.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use astarte_device::value::{AstarteData, ObjectEntry};
use astarte_device::Interface;

/// Slots per interface. Tests are expected to keep at most two messages in
/// flight per interface.
pub const QUEUE_CAPACITY: usize = 2;

/// One expected message, as described by an `expect_*` command.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// An individually aggregated datastream value.
    Individual {
        /// Concrete mapping path.
        path: String,
        /// The expected value.
        data: AstarteData,
        /// Timestamp from the command line, logged but not matched.
        timestamp: Option<i64>,
    },
    /// A property set.
    PropertySet {
        /// Concrete mapping path.
        path: String,
        /// The expected value.
        data: AstarteData,
    },
    /// A property unset.
    PropertyUnset {
        /// Concrete mapping path.
        path: String,
    },
    /// An object aggregated record.
    Object {
        /// Common path of the record.
        path: String,
        /// Expected entries; wire order is irrelevant.
        entries: Vec<ObjectEntry>,
        /// Timestamp from the command line, logged but not matched.
        timestamp: Option<i64>,
    },
}

/// Two-slot single-producer/single-consumer ring.
///
/// `push` may only be called from one thread at a time, `pop` from one
/// other; the type is `Sync` so both halves can share one `Arc`.
pub struct SpscRing<T> {
    slots: [UnsafeCell<Option<T>>; QUEUE_CAPACITY],
    /// Next slot to pop. Written by the consumer only.
    head: AtomicUsize,
    /// Next slot to fill. Written by the producer only.
    tail: AtomicUsize,
}

// SAFETY: the SPSC contract means each slot is touched by exactly one side
// at a time; the release store on head/tail publishes the slot contents to
// the other side.
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Empty ring.
    pub fn new() -> Self {
        Self {
            slots: [UnsafeCell::new(None), UnsafeCell::new(None)],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Producer side: append one value, handing it back when the ring is
    /// full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= QUEUE_CAPACITY {
            return Err(value);
        }
        // SAFETY: the slot at `tail` is past the consumer's head, so only
        // this producer touches it until the tail store below.
        unsafe {
            *self.slots[tail % QUEUE_CAPACITY].get() = Some(value);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Consumer side: remove the oldest value.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // SAFETY: head != tail means the producer published this slot and
        // will not touch it again until head advances.
        let value = unsafe { (*self.slots[head % QUEUE_CAPACITY].get()).take() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        value
    }

    /// Queued element count. Exact only on the producer or consumer
    /// thread; advisory anywhere else.
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Whether the ring holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SpscRing<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct IdataEntry {
    interface: Interface,
    queue: SpscRing<Expected>,
}

/// Interface metadata plus one expectation queue per interface.
pub struct Idata {
    entries: HashMap<String, IdataEntry>,
}

impl Idata {
    /// Build the map for the interfaces under test.
    pub fn new(interfaces: &[Interface]) -> Self {
        let entries = interfaces
            .iter()
            .map(|interface| {
                (
                    interface.name().to_string(),
                    IdataEntry {
                        interface: interface.clone(),
                        queue: SpscRing::new(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// The interface registered under `name`.
    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.entries.get(name).map(|e| &e.interface)
    }

    /// Producer side: queue one expectation for `name`.
    pub fn push(&self, name: &str, expected: Expected) -> Result<(), String> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| format!("unknown interface {}", name))?;
        entry
            .queue
            .push(expected)
            .map_err(|_| format!("expectation queue for {} is full", name))
    }

    /// Consumer side: pop the oldest expectation for `name`.
    pub fn pop(&self, name: &str) -> Option<Expected> {
        self.entries.get(name)?.queue.pop()
    }

    /// Interfaces that still hold expectations, with their counts.
    pub fn pending(&self) -> Vec<(String, usize)> {
        let mut pending: Vec<(String, usize)> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.queue.is_empty())
            .map(|(name, e)| (name.clone(), e.queue.len()))
            .collect();
        pending.sort();
        pending
    }
}
