//! Fatal-error handling: `panic_stop` and `panic_park`.
//!
//! Grounded on the teacher's fatal-path convention (log via
//! `serial_println!`, then halt) in `hypervisor::mod`'s error handling and
//! `examples/original_source/hypervisor/control.c`'s `panic_in_progress`/
//! `panic_cpu` globals, generalized into the two-flavor contract the
//! external spec requires: a hypervisor-wide invariant violation stops
//! every CPU, while a single cell's fault only parks that cell's CPUs and
//! marks it FAILED, leaving the rest of the system running.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

static PANIC_IN_PROGRESS: AtomicBool = AtomicBool::new(false);
static PANIC_CPU: AtomicU32 = AtomicU32::new(u32::MAX);

/// Hypervisor-wide fatal invariant violation: halt every CPU. Only the
/// first caller wins the race to log; the rest spin forever so the first
/// CPU's log line isn't interleaved with others.
pub fn panic_stop(cpu_id: u32, reason: &str) -> ! {
    if PANIC_IN_PROGRESS.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
        PANIC_CPU.store(cpu_id, Ordering::SeqCst);
        crate::serial_println!("[PANIC] cpu={} {}", cpu_id, reason);
    }
    loop {
        core::hint::spin_loop();
    }
}

/// Cell-attributable fault: mark the owning cell FAILED and park only its
/// CPUs, leaving the rest of the hypervisor and other cells running.
pub fn panic_park(cell: crate::cell::arena::CellHandle, cpu_id: u32, reason: &str) -> ! {
    crate::serial_println!("[CELL-FAIL] cpu={} cell_index={} {}", cpu_id, cell.index, reason);
    crate::cell::CELL_MANAGER.lock().mark_failed(cell);
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_cpu_starts_unset() {
        assert_eq!(PANIC_CPU.load(Ordering::SeqCst), u32::MAX);
    }
}
