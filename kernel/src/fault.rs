//! Fault taxonomy and dispatch.
//!
//! `cell::panic` owns the two halt primitives (`panic_stop`/`panic_park`);
//! this module owns the *classification* step that decides which one a
//! given fault reaches, mirroring the teacher's `hypervisor::isolation`
//! violation bookkeeping generalized to the full boundary-violation
//! taxonomy in the error handling design (EINVAL/EBUSY/EPERM/... mapped to
//! whether the fault is attributable to one cell or to the hypervisor
//! itself).

use crate::cell::arena::CellHandle;
use crate::cell::CELL_MANAGER;
use crate::error::HvError;

/// A fault observed on one CPU, already attributed to a cause.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// A cell's vCPU touched memory/MMIO/PCI outside what its
    /// configuration grants. Attributable: the owning cell is marked
    /// FAILED and its CPUs parked.
    BoundaryViolation { cell: CellHandle, detail: HvError },
    /// An invariant the hypervisor itself relies on (page pool corruption,
    /// a reconfiguration observed in an impossible state) has been
    /// violated. Not attributable to any single cell: every CPU halts.
    InternalInvariant,
}

/// Record the fault's statistics, then hand it to the matching halt
/// primitive. Never returns.
pub fn dispatch(cpu_id: u32, fault: Fault) -> ! {
    match fault {
        Fault::BoundaryViolation { cell, detail } => {
            if let Some(c) = CELL_MANAGER.lock().get_mut(cell) {
                if let Some(stats) = c.stats.get_mut(0) {
                    stats.boundary_violations += 1;
                }
            }
            crate::cell::panic::panic_park(
                cell,
                cpu_id,
                &alloc::format!("boundary violation: {}", detail),
            )
        }
        Fault::InternalInvariant => {
            crate::cell::panic::panic_stop(cpu_id, "internal invariant violated")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellManager;

    #[test]
    fn boundary_violation_variant_carries_detail() {
        let mut mgr = CellManager::new();
        let handle = mgr.init_root(alloc::vec![0]);
        let f = Fault::BoundaryViolation { cell: handle, detail: HvError::Perm };
        match f {
            Fault::BoundaryViolation { detail, .. } => assert_eq!(detail, HvError::Perm),
            _ => panic!("wrong variant"),
        }
    }
}
