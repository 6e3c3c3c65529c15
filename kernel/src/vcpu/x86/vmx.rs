//! Intel VMX vCPU core.
//!
//! Grounded on `hypervisor::vmx` (VMXON/VMXOFF, capability detection) and
//! `hypervisor::vmcs::exit_reason` (the basic exit reason encoding this
//! module translates into [`super::super::ExitReason`]). The VMCS itself
//! is addressed by physical pointer exactly as the teacher's `vmptrld`
//! does; this module only owns the classification, not the VMX asm.

use crate::vcpu::ExitReason;
use crate::mm::paging::PagingStructure;

/// One guest CPU running under VMX. `vmcs_phys` is the physical address of
/// this core's VMCS region, loaded with `vmptrld` before every entry.
pub struct VmxVcpu {
    pub cpu_id: u32,
    pub vmcs_phys: u64,
    pub ept: PagingStructure,
}

/// Raw per-exit data the VMCS exit-qualification fields already carry, read
/// by the caller before classification — this module only maps exit codes
/// onto [`ExitReason`], it never touches the VMCS itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitContext {
    pub guest_phys_addr: Option<u64>,
    pub cr_num: u8,
    pub cr_value: u64,
    pub msr_num: u32,
    pub msr_is_write: bool,
    pub msr_value: u64,
    pub port: u16,
    pub port_is_write: bool,
    pub xcr0_value: u64,
    /// Interrupt/exception vector from VM-exit interruption-information,
    /// valid only when `basic_reason == EXCEPTION_NMI`.
    pub exception_vector: Option<u8>,
}

impl VmxVcpu {
    pub fn new(cpu_id: u32, vmcs_phys: u64, ept: PagingStructure) -> Self {
        VmxVcpu { cpu_id, vmcs_phys, ept }
    }

    /// Translate a basic VM-exit reason (VMCS field 0x4402, low 16 bits)
    /// into the architecture-neutral classification the dispatcher uses.
    pub fn classify_exit(&self, basic_reason: u32, ctx: ExitContext) -> ExitReason {
        classify_basic_reason(basic_reason, ctx)
    }
}

fn classify_basic_reason(basic_reason: u32, ctx: ExitContext) -> ExitReason {
    use crate::hypervisor::vmcs::exit_reason as r;
    match basic_reason {
        r::CPUID => ExitReason::Cpuid,
        r::CR_ACCESS => ExitReason::ControlRegisterAccess { cr: ctx.cr_num, new_value: ctx.cr_value },
        r::RDMSR | r::WRMSR => ExitReason::MsrAccess {
            msr: ctx.msr_num,
            is_write: ctx.msr_is_write,
            value: ctx.msr_value,
        },
        r::IO_INSTRUCTION => ExitReason::IoPort { port: ctx.port, is_write: ctx.port_is_write },
        r::VMCALL => ExitReason::Hypercall,
        r::EXTERNAL_INTERRUPT | r::NMI_WINDOW | r::INTERRUPT_WINDOW | r::PREEMPTION_TIMER => {
            ExitReason::TimerOrMaintenance
        }
        // #DB (vector 1) and #AC (vector 17) are re-injected to the guest
        // rather than handled as a generic NMI.
        r::EXCEPTION_NMI if matches!(ctx.exception_vector, Some(1) | Some(17)) => {
            ExitReason::DebugOrAlignmentCheck
        }
        r::EXCEPTION_NMI => ExitReason::Nmi,
        r::EPT_VIOLATION => ExitReason::Mmio { address: ctx.guest_phys_addr.unwrap_or(0) },
        r::XSETBV => ExitReason::Xsetbv { value: ctx.xcr0_value },
        other => ExitReason::Unknown(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpuid_exit_classifies_as_cpuid() {
        assert_eq!(classify_basic_reason(10, ExitContext::default()), ExitReason::Cpuid);
    }

    #[test]
    fn ept_violation_carries_guest_phys_addr() {
        let ctx = ExitContext { guest_phys_addr: Some(0xDEAD_0000), ..Default::default() };
        let reason = classify_basic_reason(48, ctx);
        assert_eq!(reason, ExitReason::Mmio { address: 0xDEAD_0000 });
    }

    #[test]
    fn vmcall_classifies_as_hypercall() {
        assert_eq!(classify_basic_reason(18, ExitContext::default()), ExitReason::Hypercall);
    }

    #[test]
    fn unrecognized_reason_is_unknown() {
        assert_eq!(classify_basic_reason(9999, ExitContext::default()), ExitReason::Unknown(9999));
    }

    #[test]
    fn debug_exception_vector_is_reinjected_not_nmi() {
        let ctx = ExitContext { exception_vector: Some(1), ..Default::default() };
        assert_eq!(classify_basic_reason(0, ctx), ExitReason::DebugOrAlignmentCheck);
    }

    #[test]
    fn other_exception_vector_classifies_as_nmi() {
        let ctx = ExitContext { exception_vector: Some(14), ..Default::default() };
        assert_eq!(classify_basic_reason(0, ctx), ExitReason::Nmi);
    }

    #[test]
    fn xsetbv_carries_the_requested_xcr0_value() {
        let ctx = ExitContext { xcr0_value: 0b111, ..Default::default() };
        assert_eq!(classify_basic_reason(55, ctx), ExitReason::Xsetbv { value: 0b111 });
    }

    #[test]
    fn cr_access_carries_register_and_value() {
        let ctx = ExitContext { cr_num: 4, cr_value: 0x2000, ..Default::default() };
        let reason = classify_basic_reason(28, ctx);
        assert_eq!(reason, ExitReason::ControlRegisterAccess { cr: 4, new_value: 0x2000 });
    }
}
