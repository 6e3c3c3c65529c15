//! vCPU core: per-architecture guest state plus the shared exit dispatch
//! loop every architecture funnels through.
//!
//! One enum over the three supported cores (Intel VMX, AMD SVM, ARM EL2),
//! grounded on `hypervisor::vmx`/`vmcs`/`ept` (Intel), `hypervisor::svm`/
//! `svm_vm` (AMD) and `hypervisor::arm_hv` (ARM), generalized from "one
//! fixed guest" to "whichever cell owns this CPU". `ExitReason` is the
//! architecture-neutral classification the dispatcher switches on; each
//! arch module's own raw exit code is translated into one of these before
//! `dispatch` ever sees it.

pub mod hypercall;
pub mod x86;
pub mod arm;

use crate::cell::arena::CellHandle;
use crate::cell::PerCpuStats;
use crate::config::cell::region_flags;
use crate::error::HvResult;
use crate::mm::mmio::{MmioAccess, MmioDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Cpuid,
    /// Only CR0/CR4 writes are intercepted; `cr` is 0 or 4.
    ControlRegisterAccess { cr: u8, new_value: u64 },
    MsrAccess { msr: u32, is_write: bool, value: u64 },
    IoPort { port: u16, is_write: bool },
    Mmio { address: u64 },
    Xsetbv { value: u64 },
    Hypercall,
    TimerOrMaintenance,
    Nmi,
    DebugOrAlignmentCheck,
    Unknown(u32),
}

/// CR0 bits the guest must never clear: PE (protected mode) and PG
/// (paging). Either one going to 0 collapses the stage-2 translation
/// contract the hypervisor depends on.
const CR0_MUST_STAY_SET: u64 = (1 << 0) | (1 << 31);

/// CR4 bits the guest must never set. VMXE (nested virtualization) is not
/// supported by any cell; letting a guest set it would let it attempt its
/// own VMXON on hardware the hypervisor itself has already claimed.
const CR4_MUST_STAY_CLEAR: u64 = 1 << 13;

/// Host XCR0 capability mask XSETBV is validated against — whatever
/// extended state the host itself enabled via `cpu::simd::enable_*`, never
/// more. Kept in sync with the widest mask those functions can produce.
const HOST_XCR0_CAPABILITIES: u64 = 0b1110_0111;

fn msr_write_allowed(msr: u32) -> bool {
    const IA32_APIC_BASE: u32 = 0x001B;
    const IA32_MTRRCAP: u32 = 0x00FE;
    const IA32_PAT: u32 = 0x0277;
    const IA32_MTRR_DEF_TYPE: u32 = 0x02FF;
    const IA32_EFER: u32 = 0xC000_0080;
    matches!(msr, IA32_APIC_BASE | IA32_MTRRCAP | IA32_PAT | IA32_MTRR_DEF_TYPE | IA32_EFER)
        || (0x0200..=0x020F).contains(&msr)
}

/// What the dispatcher tells the arch-specific resume path to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    Resume,
    InjectFault,
    Reset,
    Park,
}

pub enum VcpuCore {
    X86Vmx(x86::vmx::VmxVcpu),
    X86Svm(x86::svm::SvmVcpu),
    Arm(arm::ArmVcpu),
}

impl VcpuCore {
    pub fn cpu_id(&self) -> u32 {
        match self {
            VcpuCore::X86Vmx(v) => v.cpu_id,
            VcpuCore::X86Svm(v) => v.cpu_id,
            VcpuCore::Arm(v) => v.cpu_id,
        }
    }
}

/// Shared exit-handling logic: classify, update stats, and decide the
/// resume action. Architecture modules call this after translating their
/// own raw exit code into an [`ExitReason`].
pub fn dispatch(
    cell: CellHandle,
    cpu_id: u32,
    reason: ExitReason,
    stats: &mut PerCpuStats,
) -> HvResult<ExitAction> {
    stats.vmexits += 1;
    match reason {
        // Feature-bit/vendor-leaf filtering happens in the arch layer that
        // owns the real CPUID leaf data; by the time a plain `Cpuid` reaches
        // here the leaf has already been sanitized and the guest just needs
        // to resume into it.
        ExitReason::Cpuid => Ok(ExitAction::Resume),
        ExitReason::ControlRegisterAccess { cr, new_value } => {
            let disallowed = match cr {
                0 => new_value & CR0_MUST_STAY_SET != CR0_MUST_STAY_SET,
                4 => new_value & CR4_MUST_STAY_CLEAR != 0,
                _ => false,
            };
            if disallowed {
                stats.boundary_violations += 1;
                Ok(ExitAction::Park)
            } else {
                Ok(ExitAction::Resume)
            }
        }
        ExitReason::MsrAccess { msr, is_write, .. } => {
            if is_write && !msr_write_allowed(msr) {
                Ok(ExitAction::InjectFault)
            } else {
                Ok(ExitAction::Resume)
            }
        }
        ExitReason::IoPort { port, .. } => {
            if cell_owns_io_port(cell, port) {
                Ok(ExitAction::Resume)
            } else {
                stats.boundary_violations += 1;
                Ok(ExitAction::Park)
            }
        }
        ExitReason::Xsetbv { value } => {
            if value & !HOST_XCR0_CAPABILITIES != 0 {
                Ok(ExitAction::InjectFault)
            } else {
                Ok(ExitAction::Resume)
            }
        }
        ExitReason::Mmio { address } => {
            stats.mmio_accesses += 1;
            dispatch_mmio(cell, address)
        }
        ExitReason::Hypercall => {
            stats.hypercalls += 1;
            Ok(ExitAction::Resume)
        }
        ExitReason::TimerOrMaintenance => Ok(ExitAction::Resume),
        ExitReason::Nmi => Ok(ExitAction::Resume),
        // #DB/#AC are re-injected into the guest, not treated as a cell
        // boundary violation — CVE-2015-5307/8104 both rely on the host
        // catching one of these and looping instead of letting the guest's
        // own handler run.
        ExitReason::DebugOrAlignmentCheck => Ok(ExitAction::InjectFault),
        ExitReason::Unknown(_) => {
            stats.boundary_violations += 1;
            Ok(ExitAction::Park)
        }
    }
    .map(|action| {
        let _ = cpu_id;
        action
    })
}

/// Per-cell port-I/O bitmap, expressed the same way Jailhouse's own
/// `JAILHOUSE_MEM_IO` regions are: a memory region flagged `IO` whose
/// `phys_start`/`size` name a port range rather than a physical address
/// range.
fn cell_owns_io_port(cell: CellHandle, port: u16) -> bool {
    let mgr = crate::cell::CELL_MANAGER.lock();
    let Some(c) = mgr.get(cell) else { return false };
    c.memory_regions.iter().any(|r| {
        r.flags & region_flags::IO != 0
            && (port as u64) >= r.phys_start
            && (port as u64) < r.phys_start + r.size
    })
}

fn dispatch_mmio(cell: CellHandle, address: u64) -> HvResult<ExitAction> {
    let mut mgr = crate::cell::CELL_MANAGER.lock();
    let Some(c) = mgr.get_mut(cell) else {
        return Ok(ExitAction::Park);
    };
    let access = MmioAccess { address, direction: MmioDirection::Read, size: 4, value: 0 };
    match c.mmio.dispatch(access) {
        Some(crate::mm::mmio::MmioResult::Handled) => Ok(ExitAction::Resume),
        Some(crate::mm::mmio::MmioResult::Error) => Ok(ExitAction::InjectFault),
        None => Ok(ExitAction::InjectFault),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpuid_exit_resumes_and_counts() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let action = dispatch(root, 0, ExitReason::Cpuid, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Resume);
        assert_eq!(stats.vmexits, 1);
    }

    #[test]
    fn debug_exception_is_reinjected_not_a_boundary_violation() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let action = dispatch(root, 0, ExitReason::DebugOrAlignmentCheck, &mut stats).unwrap();
        assert_eq!(action, ExitAction::InjectFault);
        assert_eq!(stats.boundary_violations, 0);
    }

    #[test]
    fn clearing_cr0_pg_is_parked() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::ControlRegisterAccess { cr: 0, new_value: 0x1 }; // PG cleared
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Park);
        assert_eq!(stats.boundary_violations, 1);
    }

    #[test]
    fn setting_cr4_vmxe_is_parked() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::ControlRegisterAccess { cr: 4, new_value: 1 << 13 };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Park);
    }

    #[test]
    fn benign_cr_write_resumes() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::ControlRegisterAccess { cr: 0, new_value: CR0_MUST_STAY_SET };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Resume);
    }

    #[test]
    fn msr_write_outside_whitelist_injects_fault() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::MsrAccess { msr: 0xDEAD_BEEF, is_write: true, value: 0 };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::InjectFault);
    }

    #[test]
    fn msr_write_to_efer_resumes() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::MsrAccess { msr: 0xC000_0080, is_write: true, value: 0 };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Resume);
    }

    #[test]
    fn msr_read_never_checked_against_the_write_whitelist() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::MsrAccess { msr: 0xDEAD_BEEF, is_write: false, value: 0 };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Resume);
    }

    // `cell_owns_io_port` reads the live, process-wide CellManager (the
    // same contract `dispatch_mmio` already relies on), so these two
    // scenarios populate it for real, under distinct cell ids so they
    // don't collide with each other or with other self-tests.

    #[test]
    fn io_port_outside_cell_regions_is_parked() {
        const TEST_CPU: u32 = 9_000_001;
        const TEST_CELL_ID: u32 = 0x5EED_0001;
        let mut mgr = crate::cell::CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(alloc::vec![0]);
        }
        let root = mgr.root();
        if let Some(root_cell) = mgr.get_mut(root) {
            if !root_cell.owns_cpu(TEST_CPU) {
                root_cell.cpu_set.push(TEST_CPU);
                root_cell.stats.push(PerCpuStats::default());
            }
        }
        let handle = mgr.create(TEST_CELL_ID, alloc::string::String::from("vcpu-io-a"), alloc::vec![TEST_CPU]).unwrap();
        drop(mgr);

        let mut stats = PerCpuStats::default();
        let reason = ExitReason::IoPort { port: 0x3F8, is_write: false };
        let action = dispatch(handle, 0, reason, &mut stats).unwrap();

        crate::cell::CELL_MANAGER.lock().destroy(handle).ok();

        assert_eq!(action, ExitAction::Park);
        assert_eq!(stats.boundary_violations, 1);
    }

    #[test]
    fn io_port_inside_a_granted_region_resumes() {
        const TEST_CPU: u32 = 9_000_002;
        const TEST_CELL_ID: u32 = 0x5EED_0002;
        let mut mgr = crate::cell::CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(alloc::vec![0]);
        }
        let root = mgr.root();
        if let Some(root_cell) = mgr.get_mut(root) {
            if !root_cell.owns_cpu(TEST_CPU) {
                root_cell.cpu_set.push(TEST_CPU);
                root_cell.stats.push(PerCpuStats::default());
            }
        }
        let handle = mgr.create(TEST_CELL_ID, alloc::string::String::from("vcpu-io-b"), alloc::vec![TEST_CPU]).unwrap();
        if let Some(c) = mgr.get_mut(handle) {
            c.memory_regions.push(crate::config::cell::MemoryRegion {
                phys_start: 0x3F8,
                virt_start: 0x3F8,
                size: 8,
                flags: region_flags::IO,
            });
        }
        drop(mgr);

        let mut stats = PerCpuStats::default();
        let reason = ExitReason::IoPort { port: 0x3F8, is_write: false };
        let action = dispatch(handle, 0, reason, &mut stats).unwrap();

        crate::cell::CELL_MANAGER.lock().destroy(handle).ok();

        assert_eq!(action, ExitAction::Resume);
    }

    #[test]
    fn xsetbv_within_host_capabilities_resumes() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::Xsetbv { value: 0b11 };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::Resume);
    }

    #[test]
    fn xsetbv_beyond_host_capabilities_injects_fault() {
        let mut stats = PerCpuStats::default();
        let mut mgr = crate::cell::CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        drop(mgr);
        let reason = ExitReason::Xsetbv { value: 1 << 20 };
        let action = dispatch(root, 0, reason, &mut stats).unwrap();
        assert_eq!(action, ExitAction::InjectFault);
    }
}
