//! Hypercall encoding and dispatch.
//!
//! Guests issue hypercalls to manage their own (or, for the root cell,
//! any) cell: start/stop/query. The wire encoding is architecture-neutral
//! — a call number plus up to two arguments in fixed registers — so the
//! x86 (VMCALL) and ARM (HVC) exit paths both decode into the same
//! [`Hypercall`] before reaching [`dispatch`].

use crate::cell::CELL_MANAGER;
use crate::config::cell::CellConfig;
use crate::error::HvError;

/// Wire-visible hypercall numbers, per the hypervisor's ABI.
pub mod code {
    pub const DISABLE: u64 = 0;
    pub const CELL_CREATE: u64 = 1;
    pub const CELL_START: u64 = 2;
    pub const CELL_SET_LOADABLE: u64 = 3;
    pub const CELL_DESTROY: u64 = 4;
    pub const HYPERVISOR_GET_INFO: u64 = 5;
    pub const CELL_GET_STATE: u64 = 6;
    pub const CPU_GET_INFO: u64 = 7;
    pub const DEBUG_CONSOLE_PUTC: u64 = 8;
}

/// Selectors for `HYPERVISOR_GET_INFO`'s `arg1`.
pub mod info {
    pub const MEM_POOL_TOTAL: u32 = 0;
    pub const MEM_POOL_USED: u32 = 1;
    pub const REMAP_POOL_TOTAL: u32 = 2;
    pub const REMAP_POOL_USED: u32 = 3;
    pub const NUM_CELLS: u32 = 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hypercall {
    Disable,
    CellCreate { config_address: u64 },
    CellStart { index: u16 },
    CellSetLoadable { index: u16 },
    CellDestroy { index: u16 },
    HypervisorGetInfo { selector: u32 },
    CellGetState { index: u16 },
    CpuGetInfo { cpu_id: u32 },
    DebugConsolePutc { ch: u8 },
}

pub fn decode(number: u64, arg1: u64, _arg2: u64) -> Option<Hypercall> {
    match number {
        code::DISABLE => Some(Hypercall::Disable),
        code::CELL_CREATE => Some(Hypercall::CellCreate { config_address: arg1 }),
        code::CELL_START => Some(Hypercall::CellStart { index: arg1 as u16 }),
        code::CELL_SET_LOADABLE => Some(Hypercall::CellSetLoadable { index: arg1 as u16 }),
        code::CELL_DESTROY => Some(Hypercall::CellDestroy { index: arg1 as u16 }),
        code::HYPERVISOR_GET_INFO => Some(Hypercall::HypervisorGetInfo { selector: arg1 as u32 }),
        code::CELL_GET_STATE => Some(Hypercall::CellGetState { index: arg1 as u16 }),
        code::CPU_GET_INFO => Some(Hypercall::CpuGetInfo { cpu_id: arg1 as u32 }),
        code::DEBUG_CONSOLE_PUTC => Some(Hypercall::DebugConsolePutc { ch: arg1 as u8 }),
        _ => None,
    }
}

/// Pages read out of the creator's guest-physical space to hold a
/// `CellConfig` blob — generous enough for a config with a handful of
/// memory regions and PCI devices without growing unbounded.
const CONFIG_WINDOW_PAGES: usize = 2;

/// Dispatch a decoded hypercall, returning the value to place in the
/// guest's return register: the errno on failure (per spec.md §7), or a
/// non-negative success value (0 for start/destroy/set-loadable, the
/// encoded `CellState` ordinal for get_state, the requested counter for
/// hypervisor/cpu info).
pub fn dispatch(call: Hypercall, requester_index: u16) -> i64 {
    match call {
        Hypercall::Disable => HvError::Perm.errno() as i64,

        Hypercall::CellCreate { config_address } => {
            let mut mgr = CELL_MANAGER.lock();
            let root = mgr.root();
            let ptr = {
                let Some(root_cell) = mgr.get(root) else {
                    return HvError::Invalid.errno() as i64;
                };
                let Some(paging) = root_cell.paging_root.as_ref() else {
                    return HvError::Invalid.errno() as i64;
                };
                // The creator's physical CPU id isn't threaded through the
                // hypercall interface yet, so this always reads through
                // CPU 0's temporary window — safe here because cell
                // creation is already serialized under `CELL_MANAGER`'s
                // lock, so no other CPU can be mid-`get_guest_pages` on it.
                match paging.get_guest_pages(0, config_address, CONFIG_WINDOW_PAGES, 0) {
                    Ok(p) => p,
                    Err(e) => return e.errno() as i64,
                }
            };
            let bytes = unsafe { core::slice::from_raw_parts(ptr, CONFIG_WINDOW_PAGES * 4096) };
            let config = match CellConfig::parse(bytes) {
                Ok(c) => c,
                Err(e) => return e.errno() as i64,
            };
            match mgr.create_from_config(&config) {
                Ok(_) => 0,
                Err(e) => e.errno() as i64,
            }
        }

        Hypercall::CellStart { index } => {
            if index != requester_index {
                return HvError::Perm.errno() as i64;
            }
            let mut mgr = CELL_MANAGER.lock();
            let handle = match mgr.find_by_index(index) {
                Ok(h) => h,
                Err(e) => return e.errno() as i64,
            };
            match mgr.start(handle) {
                Ok(()) => 0,
                Err(e) => e.errno() as i64,
            }
        }

        Hypercall::CellSetLoadable { index } => {
            let mut mgr = CELL_MANAGER.lock();
            let handle = match mgr.find_by_index(index) {
                Ok(h) => h,
                Err(e) => return e.errno() as i64,
            };
            match mgr.set_loadable(handle) {
                Ok(()) => 0,
                Err(e) => e.errno() as i64,
            }
        }

        Hypercall::CellDestroy { index } => {
            let mut mgr = CELL_MANAGER.lock();
            let handle = match mgr.find_by_index(index) {
                Ok(h) => h,
                Err(e) => return e.errno() as i64,
            };
            match mgr.destroy(handle) {
                Ok(()) => 0,
                Err(e) => e.errno() as i64,
            }
        }

        Hypercall::HypervisorGetInfo { selector } => {
            let mgr = CELL_MANAGER.lock();
            match selector {
                info::MEM_POOL_TOTAL => pool_stat(&crate::mm::pool::MEM_POOL, |s| s.0),
                info::MEM_POOL_USED => pool_stat(&crate::mm::pool::MEM_POOL, |s| s.1),
                info::REMAP_POOL_TOTAL => pool_stat(&crate::mm::pool::REMAP_POOL, |s| s.0),
                info::REMAP_POOL_USED => pool_stat(&crate::mm::pool::REMAP_POOL, |s| s.1),
                info::NUM_CELLS => mgr.cell_count() as i64,
                _ => HvError::Invalid.errno() as i64,
            }
        }

        Hypercall::CellGetState { index } => {
            let mgr = CELL_MANAGER.lock();
            let handle = match mgr.find_by_index(index) {
                Ok(h) => h,
                Err(e) => return e.errno() as i64,
            };
            match mgr.get(handle) {
                Some(cell) => state_ordinal(cell.state) as i64,
                None => HvError::NotFound.errno() as i64,
            }
        }

        Hypercall::CpuGetInfo { cpu_id } => {
            let mgr = CELL_MANAGER.lock();
            let requester = match mgr.find_by_index(requester_index) {
                Ok(h) => h,
                Err(e) => return e.errno() as i64,
            };
            let Some((owner, stats)) = mgr.find_by_cpu(cpu_id) else {
                return HvError::NotFound.errno() as i64;
            };
            if !mgr.is_root(requester) && owner != requester {
                return HvError::Perm.errno() as i64;
            }
            stats.vmexits as i64
        }

        Hypercall::DebugConsolePutc { ch } => {
            let mgr = CELL_MANAGER.lock();
            let requester = match mgr.find_by_index(requester_index) {
                Ok(h) => h,
                Err(e) => return e.errno() as i64,
            };
            let Some(cell) = mgr.get(requester) else {
                return HvError::NotFound.errno() as i64;
            };
            if cell.console == 0 {
                return HvError::Perm.errno() as i64;
            }
            drop(mgr);
            crate::serial_print!("{}", ch as char);
            0
        }
    }
}

fn pool_stat(pool: &spin::Mutex<Option<crate::mm::pool::PagePool>>, pick: impl Fn((usize, usize)) -> usize) -> i64 {
    pool.lock().as_ref().map(|p| pick(p.stats()) as i64).unwrap_or(0)
}

fn state_ordinal(state: crate::cell::CellState) -> u32 {
    use crate::cell::CellState::*;
    match state {
        ShutDown => 0,
        Running => 1,
        RunningLocked => 2,
        Failed => 3,
        FailedCommRev => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_numbers() {
        assert_eq!(decode(code::DISABLE, 0, 0), Some(Hypercall::Disable));
        assert_eq!(
            decode(code::CELL_CREATE, 0x1000, 0),
            Some(Hypercall::CellCreate { config_address: 0x1000 })
        );
        assert_eq!(decode(code::CELL_START, 5, 0), Some(Hypercall::CellStart { index: 5 }));
        assert_eq!(
            decode(code::CELL_SET_LOADABLE, 5, 0),
            Some(Hypercall::CellSetLoadable { index: 5 })
        );
        assert_eq!(decode(code::CELL_DESTROY, 5, 0), Some(Hypercall::CellDestroy { index: 5 }));
        assert_eq!(
            decode(code::HYPERVISOR_GET_INFO, info::NUM_CELLS as u64, 0),
            Some(Hypercall::HypervisorGetInfo { selector: info::NUM_CELLS })
        );
        assert_eq!(decode(code::CELL_GET_STATE, 5, 0), Some(Hypercall::CellGetState { index: 5 }));
        assert_eq!(decode(code::CPU_GET_INFO, 2, 0), Some(Hypercall::CpuGetInfo { cpu_id: 2 }));
        assert_eq!(decode(code::DEBUG_CONSOLE_PUTC, b'x' as u64, 0), Some(Hypercall::DebugConsolePutc { ch: b'x' }));
        assert_eq!(decode(999, 0, 0), None);
    }

    #[test]
    fn hypervisor_get_info_reports_cell_count() {
        let mut mgr = CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(alloc::vec![0]);
        }
        drop(mgr);
        let requester = 0;
        let result = dispatch(Hypercall::HypervisorGetInfo { selector: info::NUM_CELLS }, requester);
        assert!(result >= 1);
    }

    #[test]
    fn debug_console_putc_is_permitted_for_root() {
        let mut mgr = CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(alloc::vec![0]);
        }
        drop(mgr);
        let result = dispatch(Hypercall::DebugConsolePutc { ch: b'A' }, 0);
        assert_eq!(result, 0);
    }

    #[test]
    fn cpu_get_info_for_unowned_cpu_is_not_found() {
        let mut mgr = CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(alloc::vec![0]);
        }
        drop(mgr);
        let result = dispatch(Hypercall::CpuGetInfo { cpu_id: 7_777_777 }, 0);
        assert_eq!(result, HvError::NotFound.errno() as i64);
    }
}
