// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event batching.
//!
//! Rows coalesce into batches of up to `batch_size`, or whatever has
//! accumulated when the flush interval fires, whichever comes first. The
//! pipe owns the timer; the batcher is just the buffer.

use fustor_core::Event;

#[derive(Debug)]
pub struct Batcher {
    cap: usize,
    events: Vec<Event>,
}

impl Batcher {
    pub fn new(cap: usize) -> Self {
        Self { cap: cap.max(1), events: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Buffer an event; returns a full batch once `cap` is reached.
    pub fn push(&mut self, event: Event) -> Option<Vec<Event>> {
        self.events.push(event);
        if self.events.len() >= self.cap {
            Some(self.take())
        } else {
            None
        }
    }

    /// Drain whatever has accumulated (interval flush, drain on stop).
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
