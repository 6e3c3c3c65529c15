//! Bounded SPSC pending-IRQ ring.
//!
//! Architecture-independent cross-CPU interrupt injection: the CPU that
//! decides an IRQ belongs to another CPU's cell pushes it here, and the
//! target CPU drains its own ring on the next VM-entry path. Single
//! producer, single consumer per ring — one ring per target CPU — so the
//! push/pop sequence only needs acquire/release fencing, no lock.

use core::sync::atomic::{AtomicUsize, Ordering};

const RING_CAPACITY: usize = 32;

pub struct PendingIrqRing {
    head: AtomicUsize,
    tail: AtomicUsize,
    slots: [AtomicUsize; RING_CAPACITY],
}

impl PendingIrqRing {
    pub const fn new() -> Self {
        const INIT: AtomicUsize = AtomicUsize::new(0);
        PendingIrqRing {
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            slots: [INIT; RING_CAPACITY],
        }
    }

    /// Push one pending vector. Returns `false` if the ring is full (the
    /// caller should fall back to a maintenance-interrupt re-poll rather
    /// than block).
    pub fn push(&self, vector: u8) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= RING_CAPACITY {
            return false;
        }
        let idx = tail % RING_CAPACITY;
        self.slots[idx].store(vector as usize, Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    pub fn pop(&self) -> Option<u8> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let idx = head % RING_CAPACITY;
        let vector = self.slots[idx].load(Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(vector as u8)
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }
}

impl Default for PendingIrqRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_preserves_order() {
        let ring = PendingIrqRing::new();
        assert!(ring.push(32));
        assert!(ring.push(33));
        assert_eq!(ring.pop(), Some(32));
        assert_eq!(ring.pop(), Some(33));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn full_ring_rejects_further_pushes() {
        let ring = PendingIrqRing::new();
        for i in 0..RING_CAPACITY {
            assert!(ring.push(i as u8));
        }
        assert!(!ring.push(200));
        assert_eq!(ring.pop(), Some(0));
        assert!(ring.push(201));
    }

    #[test]
    fn empty_ring_reports_empty() {
        let ring = PendingIrqRing::new();
        assert!(ring.is_empty());
        ring.push(1);
        assert!(!ring.is_empty());
    }
}
