//! Headless boot path: parse the system/root-cell configuration blob and
//! bring the root cell up.
//!
//! A one-shot call that carves `mem_pool`/`remap_pool` out of the
//! configured hypervisor memory range and builds the root cell from the
//! configuration's own CPU set. Never re-entered afterward: `mem_pool`,
//! `remap_pool` and the root cell are process-wide singletons for the
//! life of the hypervisor.

use crate::cell::CELL_MANAGER;
use crate::config::cell::CellConfig;
use crate::config::system::{self, SystemConfig};
use crate::error::{HvError, HvResult};
use crate::irqchip::{ChipKind, IrqChip, IRQCHIP};
use crate::mm::paging::PagingFormat;
use crate::mm::pool::{self, PAGE_SIZE};

#[cfg(target_arch = "x86_64")]
const ROOT_PAGING_FORMAT: PagingFormat = PagingFormat::Ept;
#[cfg(not(target_arch = "x86_64"))]
const ROOT_PAGING_FORMAT: PagingFormat = PagingFormat::ArmStage2;

#[cfg(target_arch = "x86_64")]
const ROOT_CHIP_KIND: ChipKind = ChipKind::LocalApic;
#[cfg(not(target_arch = "x86_64"))]
const ROOT_CHIP_KIND: ChipKind = ChipKind::Gic(crate::irqchip::gic::GicVersion(2));

/// One-shot hypervisor bring-up from a combined system-config + root-cell-
/// config byte blob (the contents of the Limine "system-config" boot
/// module). Must not be called a second time: `mem_pool`/`remap_pool` and
/// the root cell are process-wide singletons.
///
/// IOMMU unit bring-up is intentionally not performed here: the unit
/// constructors (`VtdUnit`, `SmmuV2Unit`, `SmmuV3Unit`) each need a real
/// platform register base address that `SystemConfig` doesn't model yet
/// (its `platform_info` is still opaque past the fixed header). Only the
/// local interrupt controller, which needs no such address, is built.
pub fn hypervisor_init(bytes: &[u8]) -> HvResult<()> {
    if CELL_MANAGER.lock().has_root() {
        return Err(HvError::Busy);
    }

    let sys = SystemConfig::parse(bytes)?;
    let root_bytes = bytes.get(system::HEADER_LEN..).ok_or(HvError::Invalid)?;
    let root_cfg = CellConfig::parse(root_bytes)?;

    // Split the configured hypervisor memory range two thirds `mem_pool`
    // (cell bookkeeping, page tables) to one third `remap_pool` (the
    // temporary guest-page mapping window).
    let total_pages = (sys.hypervisor_memory.size / PAGE_SIZE) as usize;
    let mem_pages = total_pages * 2 / 3;
    let remap_pages = total_pages - mem_pages;
    let mem_base = sys.hypervisor_memory.phys_start;
    let remap_base = mem_base + mem_pages as u64 * PAGE_SIZE;
    pool::init(mem_base, mem_pages, remap_base, remap_pages);

    let mut mgr = CELL_MANAGER.lock();
    let handle = mgr.init_root(root_cfg.cpu_ids());
    let result = (|| -> HvResult<()> {
        let cell = mgr.get_mut(handle).ok_or(HvError::Invalid)?;
        cell.memory_regions = root_cfg.memory_regions.clone();
        cell.pci_devices = root_cfg.pci_devices.clone();
        cell.irqchips = root_cfg.irqchips.clone();
        cell.console = root_cfg.console;
        cell.attach_paging(ROOT_PAGING_FORMAT)
    })();
    drop(mgr);
    result?;

    *IRQCHIP.lock() = Some(IrqChip::new(ROOT_CHIP_KIND));

    crate::serial_println!(
        "[BOOT] root cell: {} CPUs, {} memory regions, {} PCI devices",
        root_cfg.cpu_ids().len(),
        root_cfg.memory_regions.len(),
        root_cfg.pci_devices.len(),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn sample_blob() -> Vec<u8> {
        let mut v = Vec::new();
        // SystemConfig header
        v.extend_from_slice(b"JHSYSCFG");
        v.extend_from_slice(&14u16.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&0x10_0000u64.to_le_bytes()); // hv phys_start
        v.extend_from_slice(&(256 * PAGE_SIZE).to_le_bytes()); // hv size
        v.extend_from_slice(&0x3F8u64.to_le_bytes());
        v.extend_from_slice(&8u32.to_le_bytes());
        v.push(0);
        v.push(0);

        // CellConfig header: signature, revision, id, name[32], flags,
        // num_cpus, 7 counts, vpci_irq_base, cpu_reset_address,
        // msg_reply_timeout_ms, console.
        v.extend_from_slice(b"JHCELCFG");
        v.extend_from_slice(&14u16.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes()); // id
        let mut name = [0u8; 32];
        name[..4].copy_from_slice(b"root");
        v.extend_from_slice(&name);
        v.extend_from_slice(&0u32.to_le_bytes()); // flags
        v.extend_from_slice(&1u32.to_le_bytes()); // num_cpus
        for _ in 0..7 {
            v.extend_from_slice(&0u32.to_le_bytes()); // all array counts zero
        }
        v.extend_from_slice(&0u32.to_le_bytes()); // vpci_irq_base
        v.extend_from_slice(&0u64.to_le_bytes()); // cpu_reset_address
        v.extend_from_slice(&0u32.to_le_bytes()); // msg_reply_timeout_ms
        v.extend_from_slice(&1u32.to_le_bytes()); // console
        // cpu_set bitmap: ceil(num_cpus/8) = 1 byte, bit 0 set (CPU 0)
        v.push(0b0000_0001);
        v
    }

    #[test]
    fn refuses_a_second_init() {
        let mut mgr = CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(alloc::vec![0]);
        }
        drop(mgr);
        assert_eq!(hypervisor_init(&sample_blob()), Err(HvError::Busy));
    }
}
