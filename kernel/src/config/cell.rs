//! Cell configuration blob: a fixed header followed by the variable-length
//! arrays (memory regions, IRQ chips, PCI devices) named by the header's
//! counts, in the fixed order spec.md §6 describes. No pointers are
//! embedded; offsets are implied by array order and element size.

use crate::error::{HvError, HvResult};
use alloc::string::String;
use alloc::vec::Vec;

const CELL_SIGNATURE: [u8; 8] = *b"JHCELCFG";
const SUPPORTED_REVISION: u16 = 14;
const NAME_LEN: usize = 32;

// signature(8) + revision(2) + id(4) + name(32) + flags(4) + num_cpus(4) +
// 7 count fields(28) + vpci_irq_base(4) + cpu_reset_address(8) +
// msg_reply_timeout_ms(4) + console(4)
const HEADER_LEN: usize = 8 + 2 + 4 + NAME_LEN + 4 + 4 + 7 * 4 + 4 + 8 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub phys_start: u64,
    pub virt_start: u64,
    pub size: u64,
    pub flags: u32,
}

pub mod region_flags {
    pub const READ: u32 = 1 << 0;
    pub const WRITE: u32 = 1 << 1;
    pub const EXECUTE: u32 = 1 << 2;
    pub const DMA: u32 = 1 << 3;
    pub const IO: u32 = 1 << 4;
    pub const COMM_REGION: u32 = 1 << 5;
    pub const LOADABLE: u32 = 1 << 6;
    pub const ROOTSHARED: u32 = 1 << 7;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqChipRecord {
    pub address: u64,
    pub id: u32,
    pub pin_base: u32,
    pub pin_bitmap: [u32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PciDeviceType {
    Device,
    Bridge,
    IvShmem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciDeviceRecord {
    pub device_type: PciDeviceType,
    pub domain: u16,
    pub bdf: u16,
    pub iommu_index: u8,
    pub bar_mask: [u32; 6],
    pub caps_start: u16,
    pub num_caps: u16,
    pub num_msi_vectors: u8,
    pub msi_64bits: bool,
    pub num_msix_vectors: u16,
    pub msix_region_size: u32,
    pub msix_address: u64,
    pub shmem_region_index: Option<u16>,
    pub shmem_protocol: u16,
}

#[derive(Debug, Clone)]
pub struct CellConfig {
    pub id: u32,
    pub name: String,
    pub flags: u32,
    pub num_cpus: u32,
    pub vpci_irq_base: u32,
    pub cpu_reset_address: u64,
    pub msg_reply_timeout_ms: u32,
    pub console: u32,
    pub memory_regions: Vec<MemoryRegion>,
    pub irqchips: Vec<IrqChipRecord>,
    pub pci_devices: Vec<PciDeviceRecord>,
    /// Bitmap over physical CPU ids, `ceil(num_cpus/8)` bytes, trailing the
    /// PCI device array. Bit `n` set means CPU `n` is assigned to this cell.
    pub cpu_set: Vec<u8>,
}

impl CellConfig {
    /// Expand `cpu_set` into the physical CPU ids it names, in ascending
    /// order — the `Vec<u32>` shape `CellManager::create` takes.
    pub fn cpu_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for (byte_idx, byte) in self.cpu_set.iter().enumerate() {
            for bit in 0..8u32 {
                if byte & (1 << bit) != 0 {
                    ids.push(byte_idx as u32 * 8 + bit);
                }
            }
        }
        ids
    }
}

struct Counts {
    num_memory_regions: u32,
    num_cache_regions: u32,
    num_irqchips: u32,
    num_pio_regions: u32,
    num_pci_devices: u32,
    num_pci_caps: u32,
    num_stream_ids: u32,
}

impl CellConfig {
    /// Parse signature + fixed header, then the `num_memory_regions`,
    /// `num_irqchips`, and `num_pci_devices` arrays in that order.
    /// `num_cache_regions`, `num_pio_regions`, `num_pci_caps`, and
    /// `num_stream_ids` are counted and length-checked but their payloads
    /// are architecture/cache-controller specific and not modeled here.
    pub fn parse(bytes: &[u8]) -> HvResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(HvError::Invalid);
        }
        if bytes[0..8] != CELL_SIGNATURE {
            return Err(HvError::Invalid);
        }
        let revision = u16::from_le_bytes([bytes[8], bytes[9]]);
        if revision != SUPPORTED_REVISION {
            return Err(HvError::Invalid);
        }
        let id = u32::from_le_bytes(bytes[10..14].try_into().unwrap());
        let name_bytes = &bytes[14..14 + NAME_LEN];
        let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        let name = core::str::from_utf8(&name_bytes[..name_end])
            .map_err(|_| HvError::Invalid)?;

        let mut off = 14 + NAME_LEN;
        let flags = read_u32(bytes, &mut off)?;
        let num_cpus = read_u32(bytes, &mut off)?;
        let counts = Counts {
            num_memory_regions: read_u32(bytes, &mut off)?,
            num_cache_regions: read_u32(bytes, &mut off)?,
            num_irqchips: read_u32(bytes, &mut off)?,
            num_pio_regions: read_u32(bytes, &mut off)?,
            num_pci_devices: read_u32(bytes, &mut off)?,
            num_pci_caps: read_u32(bytes, &mut off)?,
            num_stream_ids: read_u32(bytes, &mut off)?,
        };
        let vpci_irq_base = read_u32(bytes, &mut off)?;
        let cpu_reset_address = read_u64(bytes, &mut off)?;
        let msg_reply_timeout_ms = read_u32(bytes, &mut off)?;
        let console = read_u32(bytes, &mut off)?;

        // Sanity bound: absurd counts would overflow the temporary mapping
        // window used to stage a configuration, per E2BIG in the error
        // handling design.
        const MAX_RECORDS: u32 = 4096;
        if counts.num_memory_regions > MAX_RECORDS
            || counts.num_irqchips > MAX_RECORDS
            || counts.num_pci_devices > MAX_RECORDS
        {
            return Err(HvError::TooBig);
        }
        let _ = (counts.num_cache_regions, counts.num_pio_regions, counts.num_pci_caps, counts.num_stream_ids);

        let mut memory_regions = Vec::with_capacity(counts.num_memory_regions as usize);
        for _ in 0..counts.num_memory_regions {
            memory_regions.push(MemoryRegion {
                phys_start: read_u64(bytes, &mut off)?,
                virt_start: read_u64(bytes, &mut off)?,
                size: read_u64(bytes, &mut off)?,
                flags: read_u32(bytes, &mut off)?,
            });
        }

        let mut irqchips = Vec::with_capacity(counts.num_irqchips as usize);
        for _ in 0..counts.num_irqchips {
            irqchips.push(IrqChipRecord {
                address: read_u64(bytes, &mut off)?,
                id: read_u32(bytes, &mut off)?,
                pin_base: read_u32(bytes, &mut off)?,
                pin_bitmap: [
                    read_u32(bytes, &mut off)?,
                    read_u32(bytes, &mut off)?,
                    read_u32(bytes, &mut off)?,
                    read_u32(bytes, &mut off)?,
                ],
            });
        }

        let mut pci_devices = Vec::with_capacity(counts.num_pci_devices as usize);
        for _ in 0..counts.num_pci_devices {
            let raw_type = read_u8(bytes, &mut off)?;
            let device_type = match raw_type {
                0 => PciDeviceType::Device,
                1 => PciDeviceType::Bridge,
                2 => PciDeviceType::IvShmem,
                _ => return Err(HvError::Invalid),
            };
            let domain = read_u16(bytes, &mut off)?;
            let bdf = read_u16(bytes, &mut off)?;
            let iommu_index = read_u8(bytes, &mut off)?;
            let mut bar_mask = [0u32; 6];
            for m in bar_mask.iter_mut() {
                *m = read_u32(bytes, &mut off)?;
            }
            let caps_start = read_u16(bytes, &mut off)?;
            let num_caps = read_u16(bytes, &mut off)?;
            let num_msi_vectors = read_u8(bytes, &mut off)?;
            let msi_64bits = read_u8(bytes, &mut off)? != 0;
            let num_msix_vectors = read_u16(bytes, &mut off)?;
            let msix_region_size = read_u32(bytes, &mut off)?;
            let msix_address = read_u64(bytes, &mut off)?;
            let shmem_region_raw = read_u16(bytes, &mut off)?;
            let shmem_protocol = read_u16(bytes, &mut off)?;
            pci_devices.push(PciDeviceRecord {
                device_type,
                domain,
                bdf,
                iommu_index,
                bar_mask,
                caps_start,
                num_caps,
                num_msi_vectors,
                msi_64bits,
                num_msix_vectors,
                msix_region_size,
                msix_address,
                shmem_region_index: if shmem_region_raw == u16::MAX { None } else { Some(shmem_region_raw) },
                shmem_protocol,
            });
        }

        let cpu_set_bytes = ((num_cpus as usize) + 7) / 8;
        let cpu_set = bytes
            .get(off..off + cpu_set_bytes)
            .ok_or(HvError::Invalid)?
            .to_vec();
        off += cpu_set_bytes;
        let _ = off;

        Ok(CellConfig {
            id,
            name: String::from(name),
            flags,
            num_cpus,
            vpci_irq_base,
            cpu_reset_address,
            msg_reply_timeout_ms,
            console,
            memory_regions,
            irqchips,
            pci_devices,
            cpu_set,
        })
    }
}

fn read_u8(bytes: &[u8], off: &mut usize) -> HvResult<u8> {
    let b = *bytes.get(*off).ok_or(HvError::Invalid)?;
    *off += 1;
    Ok(b)
}

fn read_u16(bytes: &[u8], off: &mut usize) -> HvResult<u16> {
    let slice = bytes.get(*off..*off + 2).ok_or(HvError::Invalid)?;
    *off += 2;
    Ok(u16::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u32(bytes: &[u8], off: &mut usize) -> HvResult<u32> {
    let slice = bytes.get(*off..*off + 4).ok_or(HvError::Invalid)?;
    *off += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u64(bytes: &[u8], off: &mut usize) -> HvResult<u64> {
    let slice = bytes.get(*off..*off + 8).ok_or(HvError::Invalid)?;
    *off += 8;
    Ok(u64::from_le_bytes(slice.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(num_mem: u32, num_irq: u32, num_pci: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&CELL_SIGNATURE);
        v.extend_from_slice(&SUPPORTED_REVISION.to_le_bytes());
        v.extend_from_slice(&7u32.to_le_bytes()); // id
        let mut name = [0u8; NAME_LEN];
        name[..4].copy_from_slice(b"test");
        v.extend_from_slice(&name);
        v.extend_from_slice(&0u32.to_le_bytes()); // flags
        v.extend_from_slice(&1u32.to_le_bytes()); // num_cpus
        v.extend_from_slice(&num_mem.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes()); // cache regions
        v.extend_from_slice(&num_irq.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes()); // pio regions
        v.extend_from_slice(&num_pci.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes()); // pci caps
        v.extend_from_slice(&0u32.to_le_bytes()); // stream ids
        v.extend_from_slice(&32u32.to_le_bytes()); // vpci irq base
        v.extend_from_slice(&0u64.to_le_bytes()); // cpu reset addr
        v.extend_from_slice(&1000u32.to_le_bytes()); // msg reply timeout
        v.extend_from_slice(&0u32.to_le_bytes()); // console
        v.push(0b0000_0010); // cpu_set: CPU 1 assigned (num_cpus above is 1 bit wide here)
        v
    }

    #[test]
    fn parses_header_only_config() {
        let bytes = header(0, 0, 0);
        let cfg = CellConfig::parse(&bytes).unwrap();
        assert_eq!(cfg.id, 7);
        assert_eq!(cfg.name, "test");
        assert!(cfg.memory_regions.is_empty());
    }

    #[test]
    fn parses_one_memory_region() {
        let mut bytes = header(1, 0, 0);
        bytes.extend_from_slice(&0x1000u64.to_le_bytes());
        bytes.extend_from_slice(&0x2000u64.to_le_bytes());
        bytes.extend_from_slice(&0x1000u64.to_le_bytes());
        bytes.extend_from_slice(&region_flags::READ.to_le_bytes());
        let cfg = CellConfig::parse(&bytes).unwrap();
        assert_eq!(cfg.memory_regions.len(), 1);
        assert_eq!(cfg.memory_regions[0].flags, region_flags::READ);
    }

    #[test]
    fn rejects_oversized_counts() {
        let bytes = header(1_000_000, 0, 0);
        assert!(matches!(CellConfig::parse(&bytes), Err(HvError::TooBig)));
    }

    #[test]
    fn rejects_truncated_array_payload() {
        // Claims one memory region but doesn't supply its bytes.
        let bytes = header(1, 0, 0);
        assert!(matches!(CellConfig::parse(&bytes), Err(HvError::Invalid)));
    }

    #[test]
    fn cpu_set_bitmap_expands_to_ids() {
        let bytes = header(0, 0, 0);
        let cfg = CellConfig::parse(&bytes).unwrap();
        assert_eq!(cfg.cpu_ids(), alloc::vec![1]);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = header(0, 0, 0);
        bytes[0] = b'Q';
        assert!(matches!(CellConfig::parse(&bytes), Err(HvError::Invalid)));
    }
}
