//! ARM SMMUv3 unit: stream table + command/event queues.
//!
//! Grounded on `examples/original_source/hypervisor/arch/arm64/smmu-v3.c`:
//! a linear stream table indexed directly by stream ID (rather than
//! SMMUv2's scarce match-register banks), programmed via a circular
//! command queue; translation faults and other asynchronous notifications
//! arrive on a separate event queue this driver drains on invalidate.

use super::remap::IrteTable;
use super::{Domain, IrqTarget};
use crate::error::HvResult;
use alloc::collections::BTreeMap;

const IRTE_TABLE_SIZE: usize = 256;

#[derive(Clone, Copy)]
struct StreamTableEntry {
    domain_id: u16,
    valid: bool,
}

pub struct SmmuV3Unit {
    register_base: u64,
    stream_table: BTreeMap<u32, StreamTableEntry>,
    command_queue: alloc::vec::Vec<u64>,
    event_queue_pending: usize,
    irte_table: IrteTable,
}

impl SmmuV3Unit {
    pub fn new(register_base: u64) -> Self {
        SmmuV3Unit {
            register_base,
            stream_table: BTreeMap::new(),
            command_queue: alloc::vec::Vec::new(),
            event_queue_pending: 0,
            irte_table: IrteTable::new(IRTE_TABLE_SIZE),
        }
    }

    pub fn register_base(&self) -> u64 {
        self.register_base
    }

    pub fn install_stream(&mut self, stream_id: u32, domain_id: u16) {
        self.stream_table.insert(stream_id, StreamTableEntry { domain_id, valid: true });
        self.command_queue.push(stream_id as u64);
    }

    pub fn remove_stream(&mut self, stream_id: u32) {
        self.stream_table.remove(&stream_id);
        self.command_queue.push(stream_id as u64);
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

    pub fn map_interrupt(&mut self, device_id: u32, target: IrqTarget) -> HvResult<u32> {
        self.irte_table.install(device_id, target)
    }

    pub fn irte(&self, index: u32) -> Option<(u32, IrqTarget)> {
        self.irte_table.entry(index)
    }

    pub fn invalidate(&mut self, _domain: &Domain) -> HvResult<()> {
        self.command_queue.clear();
        Ok(())
    }

    /// Drain the event queue, returning how many pending faults were
    /// discarded (real hardware would report them via `fault`).
    pub fn drain_events(&mut self) -> usize {
        let n = self.event_queue_pending;
        self.event_queue_pending = 0;
        n
    }

    pub fn record_event(&mut self) {
        self.event_queue_pending += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_remove_clears_stream_table() {
        let mut unit = SmmuV3Unit::new(0);
        unit.install_stream(5, 2);
        assert!(unit.stream_table.contains_key(&5));
        unit.remove_stream(5);
        assert!(!unit.stream_table.contains_key(&5));
    }

    #[test]
    fn drain_events_resets_counter() {
        let mut unit = SmmuV3Unit::new(0);
        unit.record_event();
        unit.record_event();
        assert_eq!(unit.drain_events(), 2);
        assert_eq!(unit.drain_events(), 0);
    }

    #[test]
    fn map_interrupt_stores_a_real_irte() {
        let mut unit = SmmuV3Unit::new(0);
        let target = IrqTarget { vector: 48, cpu_id: 0, logical: false };
        let idx = unit.map_interrupt(5, target).unwrap();
        assert_eq!(unit.irte(idx), Some((5, target)));
    }
}
