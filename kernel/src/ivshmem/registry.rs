//! Link registry: breaks the two-endpoint pointer cycle.
//!
//! An ivshmem link connects exactly two PCI endpoints (one per cell, or
//! one cell + the root cell) that share one physical memory region. The
//! naive representation has each endpoint hold a pointer to its peer,
//! which creates a reference cycle neither side can safely tear down
//! alone. Instead, each endpoint holds a non-owning [`LinkHandle`] and the
//! actual shared state lives once in this registry, keyed by the region's
//! identity — grounded on the arena design note applied to ivshmem's
//! specific two-party case.

use crate::error::{HvError, HvResult};
use alloc::collections::BTreeMap;
use crate::pci::Bdf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkKey {
    pub phys_start: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHandle(pub LinkKey);

pub struct LinkState {
    pub endpoints: [Option<Bdf>; 2],
    pub phys_start: u64,
    pub size: u64,
    /// Doorbell bits set by one side, cleared by the other's read.
    pub doorbell: [u32; 2],
    /// CPU each slot's cell is scheduled on, for interrupt injection into
    /// the peer. Set once when the endpoint attaches.
    pub target_cpu: [u32; 2],
}

#[derive(Default)]
pub struct LinkRegistry {
    links: BTreeMap<LinkKey, LinkState>,
}

impl LinkRegistry {
    pub const fn new() -> Self {
        LinkRegistry { links: BTreeMap::new() }
    }

    pub fn create(&mut self, phys_start: u64, size: u64) -> HvResult<LinkHandle> {
        let key = LinkKey { phys_start, size };
        if self.links.contains_key(&key) {
            return Err(HvError::Exists);
        }
        self.links.insert(key, LinkState {
            endpoints: [None, None],
            phys_start,
            size,
            doorbell: [0, 0],
            target_cpu: [0, 0],
        });
        Ok(LinkHandle(key))
    }

    /// Attach an endpoint to slot 0 or 1 of a link. Fails if both slots
    /// are already occupied.
    pub fn attach(&mut self, handle: LinkHandle, bdf: Bdf) -> HvResult<u8> {
        let link = self.links.get_mut(&handle.0).ok_or(HvError::NotFound)?;
        for (i, slot) in link.endpoints.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(bdf);
                return Ok(i as u8);
            }
        }
        Err(HvError::TooBig)
    }

    pub fn detach(&mut self, handle: LinkHandle, bdf: Bdf) {
        if let Some(link) = self.links.get_mut(&handle.0) {
            for slot in link.endpoints.iter_mut() {
                if *slot == Some(bdf) {
                    *slot = None;
                }
            }
        }
    }

    /// Destroy the link once neither endpoint references it.
    pub fn destroy_if_unreferenced(&mut self, handle: LinkHandle) -> bool {
        if let Some(link) = self.links.get(&handle.0) {
            if link.endpoints.iter().all(|e| e.is_none()) {
                self.links.remove(&handle.0);
                return true;
            }
        }
        false
    }

    pub fn ring_doorbell(&mut self, handle: LinkHandle, from_slot: u8) -> HvResult<()> {
        let link = self.links.get_mut(&handle.0).ok_or(HvError::NotFound)?;
        let target = 1 - from_slot as usize;
        link.doorbell[target] |= 1;
        Ok(())
    }

    pub fn peer_of(&self, handle: LinkHandle, slot: u8) -> Option<Bdf> {
        self.links.get(&handle.0)?.endpoints[1 - slot as usize]
    }

    /// Record which CPU `slot`'s owning cell is scheduled on, so a
    /// doorbell write from the other slot knows where to inject.
    pub fn set_target_cpu(&mut self, handle: LinkHandle, slot: u8, cpu: u32) -> HvResult<()> {
        let link = self.links.get_mut(&handle.0).ok_or(HvError::NotFound)?;
        link.target_cpu[slot as usize] = cpu;
        Ok(())
    }

    /// The CPU to inject an interrupt on when `slot` rings its peer.
    /// `None` if the peer hasn't attached yet.
    pub fn peer_target_cpu(&self, handle: LinkHandle, slot: u8) -> Option<u32> {
        let link = self.links.get(&handle.0)?;
        let peer = 1 - slot as usize;
        link.endpoints[peer]?;
        Some(link.target_cpu[peer])
    }

    /// The shared region's physical base and size, for the vendor
    /// capability a guest driver reads instead of sizing BAR2.
    pub fn region_of(&self, handle: LinkHandle) -> Option<(u64, u64)> {
        let link = self.links.get(&handle.0)?;
        Some((link.phys_start, link.size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_attaches_fill_both_slots() {
        let mut reg = LinkRegistry::new();
        let h = reg.create(0x8000_0000, 0x10000).unwrap();
        let a = reg.attach(h, Bdf::new(0, 2, 0)).unwrap();
        let b = reg.attach(h, Bdf::new(0, 3, 0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.attach(h, Bdf::new(0, 4, 0)), Err(HvError::TooBig));
    }

    #[test]
    fn detach_allows_destroy() {
        let mut reg = LinkRegistry::new();
        let h = reg.create(0x8000_0000, 0x10000).unwrap();
        let bdf = Bdf::new(0, 2, 0);
        reg.attach(h, bdf).unwrap();
        assert!(!reg.destroy_if_unreferenced(h));
        reg.detach(h, bdf);
        assert!(reg.destroy_if_unreferenced(h));
    }

    #[test]
    fn doorbell_rings_the_peer_not_the_sender() {
        let mut reg = LinkRegistry::new();
        let h = reg.create(0, 0x1000).unwrap();
        reg.attach(h, Bdf::new(0, 1, 0)).unwrap();
        reg.attach(h, Bdf::new(0, 2, 0)).unwrap();
        reg.ring_doorbell(h, 0).unwrap();
        assert_eq!(reg.links.get(&h.0).unwrap().doorbell, [0, 1]);
    }

    #[test]
    fn peer_of_resolves_other_slot() {
        let mut reg = LinkRegistry::new();
        let h = reg.create(0, 0x1000).unwrap();
        let bdf_a = Bdf::new(0, 1, 0);
        let bdf_b = Bdf::new(0, 2, 0);
        reg.attach(h, bdf_a).unwrap();
        reg.attach(h, bdf_b).unwrap();
        assert_eq!(reg.peer_of(h, 0), Some(bdf_b));
        assert_eq!(reg.peer_of(h, 1), Some(bdf_a));
    }
}
