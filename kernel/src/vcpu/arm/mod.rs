//! ARM EL2 vCPU core.
//!
//! Grounded on `hypervisor::arm_hv::trap_handler` (ESR_EL2 exception-class
//! decoding) and `hypervisor::arm_hv::esr_class` (the EC values this module
//! maps onto [`super::ExitReason`]). Stage-2 takes the place of EPT/NPT.

use crate::vcpu::ExitReason;
use crate::mm::paging::PagingStructure;
use crate::hypervisor::arm_hv::{esr_class, trap_handler::esr};

pub struct ArmVcpu {
    pub cpu_id: u32,
    pub stage2: PagingStructure,
}

impl ArmVcpu {
    pub fn new(cpu_id: u32, stage2: PagingStructure) -> Self {
        ArmVcpu { cpu_id, stage2 }
    }

    /// Translate ESR_EL2's exception class field into the
    /// architecture-neutral classification the dispatcher uses. `ctx`
    /// carries whatever fields the trapping EC actually populates (HPFAR
    /// for data aborts, the trapped system register for MSR/MRS traps).
    pub fn classify_exit(&self, esr_el2: u64, ctx: ExitContext) -> ExitReason {
        classify_esr(esr_el2, ctx)
    }
}

/// Raw per-exit data the caller has already pulled from ESR_EL2/HPFAR/the
/// trapped register before classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitContext {
    pub hpfar: Option<u64>,
    /// Set when the trapped system register is CPACR_EL1 or SCTLR_EL1 —
    /// the two registers this hypervisor treats like x86's CR0/CR4.
    pub cr_num: u8,
    pub cr_value: u64,
}

fn classify_esr(esr_el2: u64, ctx: ExitContext) -> ExitReason {
    match esr::ec(esr_el2) {
        esr_class::DATA_ABORT_LOWER => ExitReason::Mmio { address: ctx.hpfar.unwrap_or(0) },
        esr_class::HVC64 => ExitReason::Hypercall,
        esr_class::SMC64 => ExitReason::Hypercall,
        esr_class::MSR_MRS => ExitReason::ControlRegisterAccess { cr: ctx.cr_num, new_value: ctx.cr_value },
        esr_class::WFX => ExitReason::TimerOrMaintenance,
        esr_class::INST_ABORT_LOWER => ExitReason::DebugOrAlignmentCheck,
        other => ExitReason::Unknown(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esr_with_ec(ec: u32) -> u64 {
        (ec as u64) << 26
    }

    #[test]
    fn data_abort_carries_hpfar_as_mmio_address() {
        let ctx = ExitContext { hpfar: Some(0x0900_0000), ..Default::default() };
        let reason = classify_esr(esr_with_ec(esr_class::DATA_ABORT_LOWER), ctx);
        assert_eq!(reason, ExitReason::Mmio { address: 0x0900_0000 });
    }

    #[test]
    fn hvc_classifies_as_hypercall() {
        assert_eq!(classify_esr(esr_with_ec(esr_class::HVC64), ExitContext::default()), ExitReason::Hypercall);
    }

    #[test]
    fn unrecognized_ec_is_unknown() {
        let reason = classify_esr(esr_with_ec(0x3F), ExitContext::default());
        assert_eq!(reason, ExitReason::Unknown(0x3F));
    }

    #[test]
    fn msr_mrs_carries_the_trapped_register_value() {
        let ctx = ExitContext { cr_num: 0, cr_value: 0x1, ..Default::default() };
        let reason = classify_esr(esr_with_ec(esr_class::MSR_MRS), ctx);
        assert_eq!(reason, ExitReason::ControlRegisterAccess { cr: 0, new_value: 0x1 });
    }
}
