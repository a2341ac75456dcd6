// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed observer lists.
//!
//! A [`Signal`] holds callbacks that are invoked in connection order each
//! time the signal is emitted. Delivery is synchronous: every observer has
//! seen the value by the time [`Signal::emit`] returns, so notifications
//! raised during one loop iteration are never reordered or lost.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// Handle returned by [`Signal::connect`], used to disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

type Slot<T> = Box<dyn FnMut(&T)>;

/// An ordered list of observers of values of type `T`.
pub struct Signal<T> {
    slots: Vec<(ConnectionId, Slot<T>)>,
    next: u64,
}

impl<T> Signal<T> {
    /// Creates a signal with no observers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            next: 0,
        }
    }

    /// Registers `slot`; it runs after every previously connected slot.
    pub fn connect(&mut self, slot: impl FnMut(&T) + 'static) -> ConnectionId {
        let id = ConnectionId(self.next);
        self.next += 1;
        self.slots.push((id, Box::new(slot)));
        id
    }

    /// Removes the slot registered under `id`. Returns `false` if it was
    /// already gone.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        self.slots.len() != before
    }

    /// Invokes every slot with `value`, in connection order.
    pub fn emit(&mut self, value: &T) {
        for (_, slot) in &mut self.slots {
            slot(value);
        }
    }

    /// Number of connected slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.len())
            .finish()
    }
}
