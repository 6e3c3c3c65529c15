//! System configuration blob (the immutable, platform-wide record passed
//! to `hypervisor_init`).

use crate::error::{HvError, HvResult};

const SYSTEM_SIGNATURE: [u8; 8] = *b"JHSYSCFG";
const SUPPORTED_REVISION: u16 = 14;

pub const FLAG_DEBUG_CONSOLE: u32 = 1 << 0;
pub const FLAG_VIRTUAL_DEBUG_CONSOLE: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub phys_start: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugConsole {
    pub address: u64,
    pub size: u32,
    pub console_type: u8,
    pub flags: u8,
}

/// Parsed system configuration. Raw wire layout is {signature[8],
/// revision u16, flags u32, hypervisor_memory{phys_start u64, size u64},
/// debug_console{address u64, size u32, type u8, flags u8}, platform_info
/// (opaque here — IOMMU/APIC/GIC base addresses are consumed by the
/// relevant `iommu`/`irqchip` constructor directly from the raw bytes at
/// init time), root_cell byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemConfig {
    pub revision: u16,
    pub flags: u32,
    pub hypervisor_memory: MemoryRange,
    pub debug_console: DebugConsole,
}

/// Fixed-header length in bytes; the root-cell descriptor parsed by
/// [`super::cell::CellConfig::parse`] starts immediately after it.
pub const HEADER_LEN: usize = 8 + 2 + 4 + 16 + 14;

impl SystemConfig {
    /// Validate signature + revision, then parse the fixed header. The
    /// root-cell descriptor that follows is handed to
    /// [`super::cell::CellConfig::parse`] separately by the caller, since
    /// its own length depends on its own header fields.
    pub fn parse(bytes: &[u8]) -> HvResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(HvError::Invalid);
        }
        if bytes[0..8] != SYSTEM_SIGNATURE {
            return Err(HvError::Invalid);
        }
        let revision = u16::from_le_bytes([bytes[8], bytes[9]]);
        if revision != SUPPORTED_REVISION {
            return Err(HvError::Invalid);
        }
        let flags = u32::from_le_bytes(bytes[10..14].try_into().unwrap());
        let hv_phys_start = u64::from_le_bytes(bytes[14..22].try_into().unwrap());
        let hv_size = u64::from_le_bytes(bytes[22..30].try_into().unwrap());
        let dc_address = u64::from_le_bytes(bytes[30..38].try_into().unwrap());
        let dc_size = u32::from_le_bytes(bytes[38..42].try_into().unwrap());
        let dc_type = bytes[42];
        let dc_flags = bytes[43];

        Ok(SystemConfig {
            revision,
            flags,
            hypervisor_memory: MemoryRange { phys_start: hv_phys_start, size: hv_size },
            debug_console: DebugConsole {
                address: dc_address,
                size: dc_size,
                console_type: dc_type,
                flags: dc_flags,
            },
        })
    }

    pub fn has_debug_console(&self) -> bool {
        self.flags & FLAG_DEBUG_CONSOLE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn sample_bytes(revision: u16, flags: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&SYSTEM_SIGNATURE);
        v.extend_from_slice(&revision.to_le_bytes());
        v.extend_from_slice(&flags.to_le_bytes());
        v.extend_from_slice(&0x1000u64.to_le_bytes()); // hv phys_start
        v.extend_from_slice(&0x400000u64.to_le_bytes()); // hv size
        v.extend_from_slice(&0x3F8u64.to_le_bytes()); // debug console address
        v.extend_from_slice(&8u32.to_le_bytes()); // debug console size
        v.push(0); // type
        v.push(0); // flags
        v
    }

    #[test]
    fn parses_well_formed_header() {
        let bytes = sample_bytes(SUPPORTED_REVISION, FLAG_DEBUG_CONSOLE);
        let cfg = SystemConfig::parse(&bytes).unwrap();
        assert_eq!(cfg.revision, SUPPORTED_REVISION);
        assert_eq!(cfg.hypervisor_memory.size, 0x400000);
        assert!(cfg.has_debug_console());
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = sample_bytes(SUPPORTED_REVISION, 0);
        bytes[0] = b'X';
        assert!(matches!(SystemConfig::parse(&bytes), Err(HvError::Invalid)));
    }

    #[test]
    fn rejects_mismatched_revision() {
        let bytes = sample_bytes(SUPPORTED_REVISION + 1, 0);
        assert!(matches!(SystemConfig::parse(&bytes), Err(HvError::Invalid)));
    }

    #[test]
    fn rejects_truncated_buffer() {
        let bytes = sample_bytes(SUPPORTED_REVISION, 0);
        assert!(matches!(SystemConfig::parse(&bytes[..10]), Err(HvError::Invalid)));
    }
}
