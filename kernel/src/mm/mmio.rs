//! MMIO fault dispatcher.
//!
//! Each cell owns a flat list of registered MMIO regions; a second-stage
//! page fault that lands inside one is decoded and handed to the region's
//! handler. This mirrors the teacher's x86 MMIO instruction decoder
//! (`decode_mmio_instruction`, kept below verbatim) feeding a per-cell
//! region table instead of one hard-coded device.

use crate::error::HvResult;
use alloc::vec::Vec;

/// Registered MMIO region: `[start, start + size)` of guest-physical
/// address space, dispatched to `handler` on trap.
pub struct MmioRegion {
    pub start: u64,
    pub size: u64,
    pub handler: fn(&mut MmioAccess) -> MmioResult,
}

impl MmioRegion {
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.start + self.size
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmioDirection {
    Read,
    Write,
}

/// One decoded MMIO access, passed to the owning region's handler.
pub struct MmioAccess {
    pub address: u64,
    pub direction: MmioDirection,
    pub size: u8,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmioResult {
    Handled,
    Error,
}

/// Per-cell MMIO region table.
#[derive(Default)]
pub struct MmioDispatcher {
    regions: Vec<MmioRegion>,
}

impl MmioDispatcher {
    pub const fn new() -> Self {
        MmioDispatcher { regions: Vec::new() }
    }

    pub fn register(&mut self, region: MmioRegion) {
        self.regions.push(region);
    }

    pub fn unregister(&mut self, start: u64) {
        self.regions.retain(|r| r.start != start);
    }

    /// Dispatch a trapped access; returns `None` if no region claims the
    /// address (caller should treat this as an unhandled fault).
    pub fn dispatch(&self, mut access: MmioAccess) -> Option<MmioResult> {
        for region in &self.regions {
            if region.contains(access.address) {
                #[cfg(feature = "mmio-trace")]
                crate::serial_println!(
                    "[MMIO] {:?} addr={:#x} size={} value={:#x}",
                    access.direction, access.address, access.size, access.value
                );
                return Some((region.handler)(&mut access));
            }
        }
        None
    }
}

/// A decoded x86 MMIO-faulting instruction's operand shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioDecoded {
    pub reg: GpReg,
    pub direction: MmioDirection,
    pub size: u8,
    pub instruction_len: u8,
    pub zero_extend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpReg {
    Rax, Rcx, Rdx, Rbx, Rsp, Rbp, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,
}

impl GpReg {
    fn from_index(idx: u8) -> GpReg {
        match idx & 0xF {
            0 => GpReg::Rax, 1 => GpReg::Rcx, 2 => GpReg::Rdx, 3 => GpReg::Rbx,
            4 => GpReg::Rsp, 5 => GpReg::Rbp, 6 => GpReg::Rsi, 7 => GpReg::Rdi,
            8 => GpReg::R8, 9 => GpReg::R9, 10 => GpReg::R10, 11 => GpReg::R11,
            12 => GpReg::R12, 13 => GpReg::R13, 14 => GpReg::R14, _ => GpReg::R15,
        }
    }
}

/// Decode the x86 instruction at `bytes` (fetched from the guest at the
/// faulting RIP) into operand register, direction, size and length. Only
/// the small set of encodings real guests hit against MMIO is covered:
/// MOV r/m, r ; MOV r, r/m ; MOVZX r, r/m8/16 — with optional REX and 0x66
/// prefixes.
pub fn decode_mmio_instruction(bytes: &[u8]) -> HvResult<MmioDecoded> {
    let mut i = 0usize;
    let mut rex = 0u8;
    let mut operand_16 = false;

    while i < bytes.len() {
        match bytes[i] {
            0x66 => { operand_16 = true; i += 1; }
            b @ 0x40..=0x4F => { rex = b; i += 1; }
            _ => break,
        }
    }
    if i >= bytes.len() {
        return Err(crate::error::HvError::Invalid);
    }
    let rex_w = rex & 0x08 != 0;
    let rex_r = (rex & 0x04 != 0) as u8;

    let opcode = bytes[i];
    i += 1;
    let (direction, size, zero_extend, two_byte_movzx) = match opcode {
        0x88 => (MmioDirection::Write, 1, false, false),
        0x89 => (MmioDirection::Write, if operand_16 { 2 } else if rex_w { 8 } else { 4 }, false, false),
        0x8A => (MmioDirection::Read, 1, false, false),
        0x8B => (MmioDirection::Read, if operand_16 { 2 } else if rex_w { 8 } else { 4 }, false, false),
        0x0F => {
            if i >= bytes.len() {
                return Err(crate::error::HvError::Invalid);
            }
            let op2 = bytes[i];
            i += 1;
            match op2 {
                0xB6 => (MmioDirection::Read, 1, true, true),
                0xB7 => (MmioDirection::Read, 2, true, true),
                _ => return Err(crate::error::HvError::Invalid),
            }
        }
        _ => return Err(crate::error::HvError::Invalid),
    };
    let _ = two_byte_movzx;

    if i >= bytes.len() {
        return Err(crate::error::HvError::Invalid);
    }
    let modrm = bytes[i];
    i += 1;
    let reg_field = ((modrm >> 3) & 0x7) | (rex_r << 3);
    let md = modrm >> 6;
    let rm = modrm & 0x7;

    // SIB byte present when mod != 3 and rm == 4.
    if md != 3 && rm == 4 {
        i += 1;
    }
    // Displacement.
    match md {
        0 => { if rm == 5 { i += 4; } }
        1 => i += 1,
        2 => i += 4,
        _ => {}
    }

    Ok(MmioDecoded {
        reg: GpReg::from_index(reg_field),
        direction,
        size,
        instruction_len: i as u8,
        zero_extend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_mov_write_rax() {
        // mov [rdi], eax  -> 89 07
        let d = decode_mmio_instruction(&[0x89, 0x07]).unwrap();
        assert_eq!(d.direction, MmioDirection::Write);
        assert_eq!(d.reg, GpReg::Rax);
        assert_eq!(d.size, 4);
        assert_eq!(d.instruction_len, 2);
    }

    #[test]
    fn decode_mov_read_ecx() {
        // mov ecx, [rax]  -> 8B 08
        let d = decode_mmio_instruction(&[0x8B, 0x08]).unwrap();
        assert_eq!(d.direction, MmioDirection::Read);
        assert_eq!(d.reg, GpReg::Rcx);
        assert_eq!(d.size, 4);
    }

    #[test]
    fn decode_rex_w_mov_write() {
        // rex.w mov [rdi], rax -> 48 89 07
        let d = decode_mmio_instruction(&[0x48, 0x89, 0x07]).unwrap();
        assert_eq!(d.size, 8);
        assert_eq!(d.instruction_len, 3);
    }

    #[test]
    fn decode_movzx_byte() {
        // movzx eax, byte [rdi] -> 0F B6 07
        let d = decode_mmio_instruction(&[0x0F, 0xB6, 0x07]).unwrap();
        assert_eq!(d.direction, MmioDirection::Read);
        assert!(d.zero_extend);
        assert_eq!(d.size, 1);
        assert_eq!(d.instruction_len, 3);
    }

    #[test]
    fn unknown_opcode_is_invalid() {
        assert!(decode_mmio_instruction(&[0xFF, 0x00]).is_err());
    }

    #[test]
    fn dispatcher_routes_to_matching_region() {
        fn handler(access: &mut MmioAccess) -> MmioResult {
            access.value = 0x1234;
            MmioResult::Handled
        }
        let mut d = MmioDispatcher::new();
        d.register(MmioRegion { start: 0x1000, size: 0x100, handler });
        let result = d.dispatch(MmioAccess {
            address: 0x1050,
            direction: MmioDirection::Read,
            size: 4,
            value: 0,
        });
        assert_eq!(result, Some(MmioResult::Handled));
    }

    #[test]
    fn dispatcher_ignores_unclaimed_address() {
        let d = MmioDispatcher::new();
        let result = d.dispatch(MmioAccess {
            address: 0xDEAD_0000,
            direction: MmioDirection::Read,
            size: 4,
            value: 0,
        });
        assert_eq!(result, None);
    }
}
