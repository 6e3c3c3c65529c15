//! AMD SVM vCPU core.
//!
//! Grounded on `hypervisor::svm_vm` (VMRUN loop, guest register save/
//! restore) and `hypervisor::svm::SvmExitCode` (the intercept code this
//! module maps onto [`super::super::ExitReason`]). NPT takes the place of
//! EPT as the stage-2 table format.

use crate::vcpu::ExitReason;
use crate::mm::paging::PagingStructure;
use crate::hypervisor::svm::SvmExitCode;

pub struct SvmVcpu {
    pub cpu_id: u32,
    pub vmcb_phys: u64,
    pub npt: PagingStructure,
}

/// Raw per-exit data the caller has already pulled from the VMCB's guest
/// register save area before classification — this module only maps
/// intercept codes onto [`ExitReason`], it never reads the VMCB itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitContext {
    pub fault_gpa: Option<u64>,
    pub cr_num: u8,
    pub cr_value: u64,
    pub msr_num: u32,
    pub msr_is_write: bool,
    pub msr_value: u64,
    pub port: u16,
    pub port_is_write: bool,
    pub xcr0_value: u64,
}

impl SvmVcpu {
    pub fn new(cpu_id: u32, vmcb_phys: u64, npt: PagingStructure) -> Self {
        SvmVcpu { cpu_id, vmcb_phys, npt }
    }

    pub fn classify_exit(&self, code: SvmExitCode, ctx: ExitContext) -> ExitReason {
        classify_exit_code(code, ctx)
    }
}

fn classify_exit_code(code: SvmExitCode, ctx: ExitContext) -> ExitReason {
    match code {
        SvmExitCode::Cpuid => ExitReason::Cpuid,
        SvmExitCode::ReadCr0 | SvmExitCode::WriteCr0 => {
            ExitReason::ControlRegisterAccess { cr: 0, new_value: ctx.cr_value }
        }
        SvmExitCode::ReadCr4 | SvmExitCode::WriteCr4 => {
            ExitReason::ControlRegisterAccess { cr: 4, new_value: ctx.cr_value }
        }
        SvmExitCode::ReadCr3 | SvmExitCode::WriteCr3 => {
            ExitReason::ControlRegisterAccess { cr: 3, new_value: ctx.cr_value }
        }
        SvmExitCode::MsrRead | SvmExitCode::MsrWrite => ExitReason::MsrAccess {
            msr: ctx.msr_num,
            is_write: ctx.msr_is_write,
            value: ctx.msr_value,
        },
        SvmExitCode::IoioIn | SvmExitCode::IoioOut => {
            ExitReason::IoPort { port: ctx.port, is_write: ctx.port_is_write }
        }
        SvmExitCode::Xsetbv => ExitReason::Xsetbv { value: ctx.xcr0_value },
        SvmExitCode::Vmmcall => ExitReason::Hypercall,
        SvmExitCode::Intr | SvmExitCode::Vintr => ExitReason::TimerOrMaintenance,
        SvmExitCode::Nmi => ExitReason::Nmi,
        SvmExitCode::NpfFault => ExitReason::Mmio { address: ctx.fault_gpa.unwrap_or(0) },
        other => ExitReason::Unknown(other as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vmmcall_classifies_as_hypercall() {
        assert_eq!(classify_exit_code(SvmExitCode::Vmmcall, ExitContext::default()), ExitReason::Hypercall);
    }

    #[test]
    fn npf_fault_carries_guest_phys_addr() {
        let ctx = ExitContext { fault_gpa: Some(0xBEEF_0000), ..Default::default() };
        let reason = classify_exit_code(SvmExitCode::NpfFault, ctx);
        assert_eq!(reason, ExitReason::Mmio { address: 0xBEEF_0000 });
    }

    #[test]
    fn cr_write_classifies_as_control_register_access() {
        let ctx = ExitContext { cr_value: 0x2000, ..Default::default() };
        assert_eq!(
            classify_exit_code(SvmExitCode::WriteCr4, ctx),
            ExitReason::ControlRegisterAccess { cr: 4, new_value: 0x2000 }
        );
    }

    #[test]
    fn msr_write_carries_number_and_value() {
        let ctx = ExitContext { msr_num: 0xC000_0080, msr_is_write: true, msr_value: 0x901, ..Default::default() };
        let reason = classify_exit_code(SvmExitCode::MsrWrite, ctx);
        assert_eq!(reason, ExitReason::MsrAccess { msr: 0xC000_0080, is_write: true, value: 0x901 });
    }

    #[test]
    fn xsetbv_carries_requested_value() {
        let ctx = ExitContext { xcr0_value: 0b111, ..Default::default() };
        assert_eq!(classify_exit_code(SvmExitCode::Xsetbv, ctx), ExitReason::Xsetbv { value: 0b111 });
    }
}
