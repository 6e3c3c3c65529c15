//! ARM SMMUv2 unit: stream-id-to-context-bank matching.
//!
//! Grounded on `examples/original_source/hypervisor/arch/arm64/smmu.c`:
//! a fixed bank of context banks, each bound to exactly one stream-match
//! register pair (id, mask). Mapping a device routes its stream ID through
//! the matching context bank's second-level table.

use super::remap::IrteTable;
use super::{Domain, IrqTarget};
use crate::error::{HvError, HvResult};

const NUM_CONTEXT_BANKS: usize = 16;
const IRTE_TABLE_SIZE: usize = 128;

#[derive(Clone, Copy)]
struct ContextBank {
    in_use: bool,
    stream_id: u32,
    stream_mask: u32,
    domain_id: u16,
}

pub struct SmmuV2Unit {
    register_base: u64,
    banks: [ContextBank; NUM_CONTEXT_BANKS],
    irte_table: IrteTable,
}

impl SmmuV2Unit {
    pub fn new(register_base: u64) -> Self {
        SmmuV2Unit {
            register_base,
            banks: [ContextBank { in_use: false, stream_id: 0, stream_mask: 0, domain_id: 0 }; NUM_CONTEXT_BANKS],
            irte_table: IrteTable::new(IRTE_TABLE_SIZE),
        }
    }

    pub fn register_base(&self) -> u64 {
        self.register_base
    }

    /// Bind a stream ID to a fresh context bank for `domain_id`.
    pub fn bind_stream(&mut self, stream_id: u32, stream_mask: u32, domain_id: u16) -> HvResult<usize> {
        for (i, bank) in self.banks.iter_mut().enumerate() {
            if !bank.in_use {
                *bank = ContextBank { in_use: true, stream_id, stream_mask, domain_id };
                return Ok(i);
            }
        }
        Err(HvError::NoMemory)
    }

    pub fn unbind_stream(&mut self, stream_id: u32) {
        for bank in self.banks.iter_mut() {
            if bank.in_use && bank.stream_id == stream_id {
                bank.in_use = false;
            }
        }
    }

    fn matching_bank(&self, stream_id: u32) -> Option<&ContextBank> {
        self.banks.iter().find(|b| b.in_use && (b.stream_id & b.stream_mask) == (stream_id & b.stream_mask))
    }

    pub fn map(&mut self, domain: &mut Domain, iova: u64, phys: u64, size: u64) -> HvResult<()> {
        domain.table.map(iova, phys, size, true, false)
    }

    pub fn unmap(&mut self, domain: &mut Domain, iova: u64, size: u64) -> HvResult<()> {
        let mut off = 0u64;
        while off < size {
            domain.table.unmap_page(iova + off)?;
            off += 4096;
        }
        Ok(())
    }

    /// SMMUv2 routes interrupts through the GIC directly; this layer's
    /// job is to own the routing record (stream-id to GIC target) that
    /// the distributor's IROUTER/ITARGETSR programming is driven from.
    pub fn map_interrupt(&mut self, device_id: u32, target: IrqTarget) -> HvResult<u32> {
        self.irte_table.install(device_id, target)
    }

    pub fn irte(&self, index: u32) -> Option<(u32, IrqTarget)> {
        self.irte_table.entry(index)
    }

    pub fn invalidate(&mut self, _domain: &Domain) -> HvResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_unbind_frees_a_bank() {
        let mut unit = SmmuV2Unit::new(0);
        let idx = unit.bind_stream(0x10, 0xFFFF, 1).unwrap();
        assert!(unit.banks[idx].in_use);
        unit.unbind_stream(0x10);
        assert!(!unit.banks[idx].in_use);
    }

    #[test]
    fn exhausting_context_banks_fails() {
        let mut unit = SmmuV2Unit::new(0);
        for i in 0..NUM_CONTEXT_BANKS as u32 {
            unit.bind_stream(i, 0xFFFF, 0).unwrap();
        }
        assert_eq!(unit.bind_stream(999, 0xFFFF, 0), Err(HvError::NoMemory));
    }

    #[test]
    fn stream_match_respects_mask() {
        let mut unit = SmmuV2Unit::new(0);
        unit.bind_stream(0x0100, 0xFF00, 7);
        let bank = unit.matching_bank(0x0123).unwrap();
        assert_eq!(bank.domain_id, 7);
        assert!(unit.matching_bank(0x0200).is_none());
    }

    #[test]
    fn map_interrupt_stores_a_real_irte() {
        let mut unit = SmmuV2Unit::new(0);
        let target = IrqTarget { vector: 48, cpu_id: 0, logical: false };
        let idx = unit.map_interrupt(0x10, target).unwrap();
        assert_eq!(unit.irte(idx), Some((0x10, target)));
    }
}
