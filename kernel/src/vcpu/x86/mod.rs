//! x86 vCPU cores: one module per hardware virtualization extension.
//!
//! Both [`vmx::VmxVcpu`] and [`svm::SvmVcpu`] translate their own raw exit
//! code into the shared [`super::ExitReason`] and otherwise know nothing
//! about each other; [`super::VcpuCore`] is the only place that picks
//! between them, decided once at boot from the vendor string the way the
//! teacher's `hypervisor::mod::CpuVendor` detection already does.

pub mod vmx;
pub mod svm;
