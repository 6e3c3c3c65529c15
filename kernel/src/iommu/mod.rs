//! IOMMU abstraction.
//!
//! One enum, four variants, each owning its own mechanism end-to-end —
//! no shared vtable, no dynamic dispatch. The system configuration names
//! exactly one IOMMU family for the whole platform (VT-d, SMMUv2, SMMUv3,
//! or TI's PVU), so there is never a need for more than one variant to be
//! live at once. Grounded on `examples/original_source/hypervisor/arch/{x86/vtd.c,
//! arm64/{smmu.c,smmu-v3.c,ti-pvu.c}}`, re-expressed in the teacher's
//! struct-plus-impl idiom instead of a C function-pointer table.

use crate::error::{HvError, HvResult};
use crate::mm::paging::{PagingFormat, PagingStructure};

pub mod remap;
pub mod vtd;
pub mod smmu_v2;
pub mod smmu_v3;
pub mod pvu;

/// Target CPU a remapped interrupt is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqTarget {
    pub vector: u8,
    pub cpu_id: u32,
    pub logical: bool,
}

/// Lifecycle state of one domain's mapping, used by the PVU driver to
/// resolve the "runtime unmap" open question: unmapping while the owning
/// cell is RUNNING is refused outright rather than silently deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRunState {
    Running,
    Stopped,
}

/// One DMA translation domain: a cell's or the root cell's IOMMU page
/// table plus whatever device-scoped routing state the active variant
/// needs (stream IDs, context entries, PVU region descriptors...).
pub struct Domain {
    pub cell: u16,
    pub table: PagingStructure,
}

impl Domain {
    pub fn new(cell: u16, format: PagingFormat) -> HvResult<Self> {
        Ok(Domain { cell, table: PagingStructure::create(format)? })
    }

    pub fn destroy(self) {
        self.table.destroy();
    }
}

/// The platform's single IOMMU family, selected once from the system
/// configuration at `hypervisor_init` time.
pub enum IommuUnit {
    VtD(vtd::VtdUnit),
    SmmuV2(smmu_v2::SmmuV2Unit),
    SmmuV3(smmu_v3::SmmuV3Unit),
    Pvu(pvu::PvuUnit),
}

impl IommuUnit {
    pub fn paging_format(&self) -> PagingFormat {
        match self {
            IommuUnit::VtD(_) => PagingFormat::VtdSecondLevel,
            IommuUnit::SmmuV2(_) | IommuUnit::SmmuV3(_) => PagingFormat::ArmStage2,
            IommuUnit::Pvu(_) => PagingFormat::ArmStage2,
        }
    }

    pub fn map(&mut self, domain: &mut Domain, iova: u64, phys: u64, size: u64) -> HvResult<()> {
        #[cfg(feature = "iommu-trace")]
        crate::serial_println!("[IOMMU] map iova={:#x} phys={:#x} size={:#x}", iova, phys, size);
        match self {
            IommuUnit::VtD(u) => u.map(domain, iova, phys, size),
            IommuUnit::SmmuV2(u) => u.map(domain, iova, phys, size),
            IommuUnit::SmmuV3(u) => u.map(domain, iova, phys, size),
            IommuUnit::Pvu(u) => u.map(domain, iova, phys, size),
        }
    }

    pub fn unmap(&mut self, domain: &mut Domain, iova: u64, size: u64, run_state: CellRunState) -> HvResult<()> {
        match self {
            IommuUnit::VtD(u) => u.unmap(domain, iova, size),
            IommuUnit::SmmuV2(u) => u.unmap(domain, iova, size),
            IommuUnit::SmmuV3(u) => u.unmap(domain, iova, size),
            // TI PVU open question, resolved: a runtime unmap while the
            // cell is RUNNING is rejected outright rather than queued or
            // silently warned about.
            IommuUnit::Pvu(u) => u.unmap(domain, iova, size, run_state),
        }
    }

    /// Validate the target, install a real IRTE-equivalent entry in the
    /// active variant, and return its opaque remapping index — the value
    /// the PCI layer programs into the device's MSI/MSI-X address/data
    /// pair in place of the raw CPU/vector pair.
    pub fn map_interrupt(&mut self, device_id: u32, target: IrqTarget) -> HvResult<u32> {
        remap::validate_target(&target)?;
        match self {
            IommuUnit::VtD(u) => u.map_interrupt(device_id, target),
            IommuUnit::SmmuV2(u) => u.map_interrupt(device_id, target),
            IommuUnit::SmmuV3(u) => u.map_interrupt(device_id, target),
            IommuUnit::Pvu(u) => u.map_interrupt(device_id, target),
        }
    }

    pub fn invalidate(&mut self, domain: &Domain) -> HvResult<()> {
        match self {
            IommuUnit::VtD(u) => u.invalidate(domain),
            IommuUnit::SmmuV2(u) => u.invalidate(domain),
            IommuUnit::SmmuV3(u) => u.invalidate(domain),
            IommuUnit::Pvu(u) => u.invalidate(domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_format_matches_variant() {
        let unit = IommuUnit::VtD(vtd::VtdUnit::new(0));
        assert_eq!(unit.paging_format(), PagingFormat::VtdSecondLevel);
        let unit = IommuUnit::Pvu(pvu::PvuUnit::new());
        assert_eq!(unit.paging_format(), PagingFormat::ArmStage2);
    }
}
