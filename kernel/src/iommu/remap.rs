//! Shared interrupt-remapping validation.
//!
//! Every IOMMU variant routes MSI/MSI-X and wired interrupts through an
//! IRTE-equivalent table before delivery; all four need the same target
//! sanity check (destination must name a CPU that's actually owned by
//! some configured cell, and logical/physical addressing must agree with
//! what the target's local APIC or redistributor supports) before
//! installing the entry, so that logic lives here instead of once per
//! variant.

use super::IrqTarget;
use crate::error::{HvError, HvResult};
use alloc::vec::Vec;

/// Validate an interrupt-remap target before any variant installs it.
pub fn validate_target(target: &IrqTarget) -> HvResult<()> {
    if target.vector < 32 {
        return Err(HvError::Invalid);
    }
    if !crate::cell::cpu_is_owned(target.cpu_id) {
        return Err(HvError::Invalid);
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct Irte {
    device_id: u32,
    target: IrqTarget,
}

/// An IRTE-equivalent array shared by all four variants: `map_interrupt`
/// writes (or rewrites) one entry per device and returns its index into
/// this array — the opaque remapping index a variant hands back to the
/// PCI layer's MSI/MSI-X programming path. Reused across calls for the
/// same `device_id` rather than leaking a fresh slot every reconfigure.
pub struct IrteTable {
    entries: Vec<Option<Irte>>,
    capacity: usize,
}

impl IrteTable {
    pub fn new(capacity: usize) -> Self {
        IrteTable { entries: Vec::new(), capacity }
    }

    pub fn install(&mut self, device_id: u32, target: IrqTarget) -> HvResult<u32> {
        if let Some(idx) = self.entries.iter().position(|e| e.map(|e| e.device_id) == Some(device_id)) {
            self.entries[idx] = Some(Irte { device_id, target });
            return Ok(idx as u32);
        }
        if let Some(idx) = self.entries.iter().position(|e| e.is_none()) {
            self.entries[idx] = Some(Irte { device_id, target });
            return Ok(idx as u32);
        }
        if self.entries.len() >= self.capacity {
            return Err(HvError::NoMemory);
        }
        self.entries.push(Some(Irte { device_id, target }));
        Ok((self.entries.len() - 1) as u32)
    }

    pub fn remove(&mut self, device_id: u32) {
        for e in self.entries.iter_mut() {
            if e.map(|e| e.device_id) == Some(device_id) {
                *e = None;
            }
        }
    }

    pub fn entry(&self, index: u32) -> Option<(u32, IrqTarget)> {
        self.entries.get(index as usize).copied().flatten().map(|e| (e.device_id, e.target))
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_below_32_is_rejected() {
        let t = IrqTarget { vector: 2, cpu_id: 0, logical: false };
        assert_eq!(validate_target(&t), Err(HvError::Invalid));
    }

    #[test]
    fn install_reuses_slot_for_same_device() {
        let mut table = IrteTable::new(4);
        let t1 = IrqTarget { vector: 40, cpu_id: 0, logical: false };
        let t2 = IrqTarget { vector: 41, cpu_id: 1, logical: false };
        let idx1 = table.install(7, t1).unwrap();
        let idx2 = table.install(7, t2).unwrap();
        assert_eq!(idx1, idx2);
        assert_eq!(table.entry(idx1), Some((7, t2)));
    }

    #[test]
    fn install_exhausts_capacity() {
        let mut table = IrteTable::new(1);
        let t = IrqTarget { vector: 40, cpu_id: 0, logical: false };
        table.install(1, t).unwrap();
        assert_eq!(table.install(2, t), Err(HvError::NoMemory));
    }

    #[test]
    fn remove_frees_slot_for_reuse() {
        let mut table = IrteTable::new(1);
        let t = IrqTarget { vector: 40, cpu_id: 0, logical: false };
        let idx = table.install(1, t).unwrap();
        table.remove(1);
        assert_eq!(table.install(2, t), Ok(idx));
    }
}
