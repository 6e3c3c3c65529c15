//! ARM GICv2/v3 virtualization: distributor trap + partial redistributor
//! passthrough.
//!
//! Grounded on `hypervisor::arm_hv::vgic`. The distributor's group/enable/
//! priority/target registers are trapped and moderated per cell (a cell
//! may only enable and target SPIs it was assigned); each CPU's private
//! redistributor frame (SGI/PPI state) is passed through directly since
//! it's already per-CPU and needs no cross-cell moderation.

use crate::error::{HvError, HvResult};
use alloc::vec::Vec;

const GICD_ISENABLER: u64 = 0x100;
const GICD_ICENABLER: u64 = 0x180;
const GICD_IPRIORITYR: u64 = 0x400;
const GICD_ITARGETSR: u64 = 0x800;

pub struct GicVersion(pub u8);

/// Per-cell set of SPIs (shared peripheral interrupts, id >= 32) the cell
/// is allowed to enable and target.
pub struct AssignedSpis {
    ids: Vec<u32>,
}

impl AssignedSpis {
    pub fn new(ids: Vec<u32>) -> Self {
        AssignedSpis { ids }
    }

    pub fn owns(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }
}

pub struct DistributorState {
    enabled: [bool; 1024],
    priority: [u8; 1024],
    target_cpu: [u8; 1024],
}

impl DistributorState {
    pub fn new() -> Self {
        DistributorState { enabled: [false; 1024], priority: [0; 1024], target_cpu: [0; 1024] }
    }

    /// Moderate a distributor MMIO write on behalf of `cell`: SGI/PPI
    /// registers (id < 32) pass straight through since they're private;
    /// SPI registers are rejected unless the cell owns that interrupt ID.
    pub fn write(&mut self, offset: u64, value: u32, assigned: &AssignedSpis) -> HvResult<()> {
        let (base, per_reg_bits) = match offset {
            o if (GICD_ISENABLER..GICD_ISENABLER + 0x80).contains(&o) => (GICD_ISENABLER, 1),
            o if (GICD_ICENABLER..GICD_ICENABLER + 0x80).contains(&o) => (GICD_ICENABLER, 1),
            o if (GICD_IPRIORITYR..GICD_IPRIORITYR + 0x400).contains(&o) => (GICD_IPRIORITYR, 8),
            o if (GICD_ITARGETSR..GICD_ITARGETSR + 0x400).contains(&o) => (GICD_ITARGETSR, 8),
            _ => return Err(HvError::Invalid),
        };
        let reg_idx = (offset - base) as usize;
        let first_id = (reg_idx * 8 / per_reg_bits) as u32;
        if first_id >= 32 && !assigned.owns(first_id) {
            return Err(HvError::Perm);
        }
        match base {
            GICD_ISENABLER => self.enabled[first_id as usize] = value & 1 != 0,
            GICD_ICENABLER => self.enabled[first_id as usize] = false,
            GICD_IPRIORITYR => self.priority[first_id as usize] = value as u8,
            GICD_ITARGETSR => self.target_cpu[first_id as usize] = value as u8,
            _ => unreachable!(),
        }
        Ok(())
    }

    pub fn is_enabled(&self, id: u32) -> bool {
        self.enabled.get(id as usize).copied().unwrap_or(false)
    }
}

impl Default for DistributorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sgi_write_passes_through_without_ownership() {
        let mut dist = DistributorState::new();
        let assigned = AssignedSpis::new(alloc::vec![]);
        assert!(dist.write(GICD_ISENABLER, 1, &assigned).is_ok());
        assert!(dist.is_enabled(0));
    }

    #[test]
    fn spi_write_rejected_without_ownership() {
        let mut dist = DistributorState::new();
        let assigned = AssignedSpis::new(alloc::vec![]);
        let offset = GICD_ISENABLER + 4; // covers ids 32..64
        assert_eq!(dist.write(offset, 1, &assigned), Err(HvError::Perm));
    }

    #[test]
    fn spi_write_permitted_with_ownership() {
        let mut dist = DistributorState::new();
        let assigned = AssignedSpis::new(alloc::vec![32]);
        let offset = GICD_ISENABLER + 4;
        assert!(dist.write(offset, 1, &assigned).is_ok());
        assert!(dist.is_enabled(32));
    }
}
