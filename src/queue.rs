// Copyright 2021 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! The handoff queue between the acceptor and the worker pool: a FIFO
//! guarded by a mutex and paired with a condition variable so that idle
//! workers park instead of spinning.
//!
//! Shutdown uses a closed flag: `close()` broadcasts so every parked
//! worker is released, and `pop_blocking` keeps draining whatever the
//! acceptor already queued before reporting `None`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A thread-safe FIFO with blocking pop.
pub struct RequestQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake one waiter. Items pushed after `close()`
    /// are dropped; the acceptor stops pushing before the queue is closed,
    /// so this only guards against misuse.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return;
        }
        inner.items.push_back(item);
        self.available.notify_one();
    }

    /// Remove and return the oldest item, parking until one is available.
    /// Returns `None` once the queue is closed and drained.
    pub fn pop_blocking(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self.available.wait(inner).unwrap();
        }
    }

    /// Close the queue and release every waiter. One broadcast is enough
    /// for the whole pool; `pop_blocking` re-checks state on each wakeup.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.available.notify_all();
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
