//! Second-stage / IOMMU paging engine.
//!
//! A single walker generic over [`PagingFormat`], a tagged-variant sum type
//! covering every page-table shape the hypervisor needs to build: the two
//! CPU-visible second-stage formats (Intel EPT, AMD NPT) and the ARM
//! stage-2 format, plus the VT-d IOMMU context-table format. Each format
//! only differs in level count, entry width and per-level shift/mask —
//! the walk/create/destroy logic itself is shared, grounded on the
//! teacher's `hypervisor::ept::EptManager` (level-indexed table allocation)
//! generalized from "always 4 EPT levels" to "N levels of whatever format".

use crate::error::{HvError, HvResult};
use crate::mm::pool;
use alloc::vec::Vec;
use spin::Mutex;

/// One page-table entry, architecture width is always 64 bits across every
/// format this hypervisor supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct PagingEntry(pub u64);

pub mod flags {
    pub const PRESENT: u64 = 1 << 0;
    pub const WRITABLE: u64 = 1 << 1;
    pub const EXECUTABLE: u64 = 1 << 2;
    pub const LARGE: u64 = 1 << 7;
}

impl PagingEntry {
    pub const EMPTY: PagingEntry = PagingEntry(0);

    pub fn new_table(phys: u64) -> Self {
        PagingEntry((phys & !0xFFF) | flags::PRESENT | flags::WRITABLE | flags::EXECUTABLE)
    }

    pub fn new_page(phys: u64, writable: bool, executable: bool, large: bool) -> Self {
        let mut bits = (phys & !0xFFF) | flags::PRESENT;
        if writable {
            bits |= flags::WRITABLE;
        }
        if executable {
            bits |= flags::EXECUTABLE;
        }
        if large {
            bits |= flags::LARGE;
        }
        PagingEntry(bits)
    }

    pub fn is_present(&self) -> bool {
        self.0 & flags::PRESENT != 0
    }

    pub fn is_large(&self) -> bool {
        self.0 & flags::LARGE != 0
    }

    pub fn phys_addr(&self) -> u64 {
        self.0 & !0xFFF
    }
}

/// One page-table level: 512 entries, 4 KiB, naturally page-aligned.
#[repr(C, align(4096))]
pub struct Table {
    pub entries: [PagingEntry; 512],
}

impl Table {
    pub const fn empty() -> Self {
        Table { entries: [PagingEntry::EMPTY; 512] }
    }
}

/// Tagged-variant description of a paging format: number of levels and the
/// bit shift separating each level's index within a virtual/guest-physical
/// address. Replaces a C-style vtable of per-format callbacks with a plain
/// enum match inside the generic walker below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagingFormat {
    /// Intel Extended Page Tables, 4 levels, 9 bits/level.
    Ept,
    /// AMD Nested Page Tables, 4 levels, 9 bits/level (same shape as EPT,
    /// distinguished so cache-coherency and large-page-size defaults don't
    /// leak across vendors).
    Npt,
    /// ARMv8 stage-2 translation, up to 4 levels depending on concatenated
    /// start level; this hypervisor always uses the full 4-level form.
    ArmStage2,
    /// Intel VT-d second-level page table (I/O page table), same 4-level,
    /// 9-bit-per-level shape as EPT but walked by DMA hardware that may
    /// not snoop the CPU cache.
    VtdSecondLevel,
}

impl PagingFormat {
    pub const fn levels(self) -> u32 {
        4
    }

    pub const fn bits_per_level(self) -> u32 {
        9
    }

    /// Whether table updates must be cache-flushed for the walking hardware
    /// to observe them (true for DMA-engine-walked formats).
    pub const fn requires_cache_flush(self) -> bool {
        matches!(self, PagingFormat::VtdSecondLevel)
    }

    fn index(self, addr: u64, level: u32) -> usize {
        let shift = 12 + (self.levels() - 1 - level) * self.bits_per_level();
        ((addr >> shift) & 0x1FF) as usize
    }

    /// The span a single leaf entry at `level` covers, or 0 if this level
    /// can't hold a hugepage leaf (the final, 4 KiB level isn't a
    /// "hugepage" level; the top level is too coarse to ever back with one
    /// contiguous allocation).
    pub const fn page_size(self, level: u32) -> u64 {
        let depth_from_leaf = self.levels() - 1 - level;
        match depth_from_leaf {
            1 => 4096 * 512,       // 2 MiB
            2 => 4096 * 512 * 512, // 1 GiB
            _ => 0,
        }
    }
}

/// Owns the full page-table tree for one address space (a cell's
/// second-stage tables, or one VT-d domain's I/O page tables).
pub struct PagingStructure {
    pub format: PagingFormat,
    root_phys: u64,
    /// Every table physical page we've allocated, so `destroy` can free
    /// them all without re-walking the tree.
    allocated: Vec<u64>,
}

impl PagingStructure {
    pub fn create(format: PagingFormat) -> HvResult<Self> {
        let root_phys = pool::mem_alloc_pages(1)?;
        zero_table(root_phys);
        Ok(PagingStructure { format, root_phys, allocated: alloc::vec![root_phys] })
    }

    pub fn root_phys(&self) -> u64 {
        self.root_phys
    }

    pub fn destroy(mut self) {
        for phys in self.allocated.drain(..) {
            pool::mem_free_pages(phys, 1);
        }
    }

    /// Map `size` bytes of `phys` at guest-physical `gpa`, using the
    /// largest hugepage leaf that fits at each step and splitting
    /// intermediate large leaves as needed. `size` must be a multiple of
    /// 4 KiB; `gpa`/`phys` must share the alignment of whatever leaf size
    /// ends up covering them.
    pub fn map(&mut self, gpa: u64, phys: u64, size: u64, writable: bool, executable: bool) -> HvResult<()> {
        if size == 0 || size % 4096 != 0 || gpa % 4096 != 0 || phys % 4096 != 0 {
            return Err(HvError::Invalid);
        }
        let mut off = 0u64;
        while off < size {
            let remaining = size - off;
            let level = self.largest_leaf_level(gpa + off, phys + off, remaining);
            let leaf_size = self.leaf_size(level);
            self.map_leaf(gpa + off, phys + off, level, writable, executable)?;
            off += leaf_size;
        }
        Ok(())
    }

    /// The leaf-table span at `level` (4 KiB for the bottom level, the
    /// format's hugepage size otherwise).
    fn leaf_size(&self, level: u32) -> u64 {
        let hp = self.format.page_size(level);
        if hp != 0 { hp } else { 4096 }
    }

    /// Deepest level (closest to the leaf) whose page size still fits
    /// within `remaining` and whose span both `gpa` and `phys` are aligned
    /// to — i.e. the largest hugepage we can place here without spilling
    /// past the requested region.
    fn largest_leaf_level(&self, gpa: u64, phys: u64, remaining: u64) -> u32 {
        let levels = self.format.levels();
        for level in 0..levels - 1 {
            let size = self.format.page_size(level);
            if size != 0 && size <= remaining && gpa % size == 0 && phys % size == 0 {
                return level;
            }
        }
        levels - 1
    }

    /// Walk from the root down to (but not including) `target_level`,
    /// allocating intermediate tables on demand and splitting any large
    /// leaf found along the way, then write the leaf entry at
    /// `target_level`.
    fn map_leaf(&mut self, gpa: u64, phys: u64, target_level: u32, writable: bool, executable: bool) -> HvResult<()> {
        let mut table_phys = self.root_phys;
        for level in 0..target_level {
            let idx = self.format.index(gpa, level);
            let entry = read_entry(table_phys, idx);
            table_phys = if entry.is_present() && entry.is_large() {
                self.split_leaf(table_phys, idx, level)?
            } else if entry.is_present() {
                entry.phys_addr()
            } else {
                let next = pool::mem_alloc_pages(1)?;
                zero_table(next);
                self.allocated.push(next);
                write_entry(table_phys, idx, PagingEntry::new_table(next));
                self.flush_if_needed();
                next
            };
        }
        let idx = self.format.index(gpa, target_level);
        let large = self.format.page_size(target_level) != 0;
        write_entry(table_phys, idx, PagingEntry::new_page(phys, writable, executable, large));
        self.flush_if_needed();
        Ok(())
    }

    /// Replace the large leaf at `(table_phys, idx)` (covering
    /// `page_size(level)` bytes) with a fresh table of 512 entries one
    /// level finer, each reproducing the original leaf's mapping and
    /// permissions over its slice of the original span. Costs exactly one
    /// freshly-allocated page; `ENOMEM` leaves the original large leaf
    /// intact.
    fn split_leaf(&mut self, table_phys: u64, idx: usize, level: u32) -> HvResult<u64> {
        let entry = read_entry(table_phys, idx);
        let base_phys = entry.phys_addr();
        let writable = entry.0 & flags::WRITABLE != 0;
        let executable = entry.0 & flags::EXECUTABLE != 0;
        let next = pool::mem_alloc_pages(1)?;
        zero_table(next);
        let child_size = self.leaf_size(level + 1);
        let child_large = self.format.page_size(level + 1) != 0;
        for i in 0..512u64 {
            let child_phys = base_phys + i * child_size;
            write_entry(next, i as usize, PagingEntry::new_page(child_phys, writable, executable, child_large));
        }
        self.allocated.push(next);
        write_entry(table_phys, idx, PagingEntry::new_table(next));
        self.flush_if_needed();
        Ok(next)
    }

    /// Remove the mapping covering `gpa`'s page, if any, splitting any
    /// hugepage leaf found along the way down to 4 KiB granularity first.
    /// `ENOMEM` during a required split leaves the mapping untouched.
    pub fn unmap_page(&mut self, gpa: u64) -> HvResult<()> {
        let levels = self.format.levels();
        let mut table_phys = self.root_phys;
        for level in 0..levels - 1 {
            let idx = self.format.index(gpa, level);
            let entry = read_entry(table_phys, idx);
            if !entry.is_present() {
                return Ok(());
            }
            table_phys = if entry.is_large() { self.split_leaf(table_phys, idx, level)? } else { entry.phys_addr() };
        }
        let leaf_idx = self.format.index(gpa, levels - 1);
        write_entry(table_phys, leaf_idx, PagingEntry::EMPTY);
        self.flush_if_needed();
        Ok(())
    }

    /// Resolve `gpa` to the backing physical address, or `None` if
    /// unmapped, stopping at whichever level holds the terminal (leaf or
    /// hugepage) entry.
    pub fn translate(&self, gpa: u64) -> Option<u64> {
        self.walk_terminal(gpa).map(|(phys, level)| {
            let mask = self.leaf_size(level) - 1;
            (phys & !mask) | (gpa & mask)
        })
    }

    /// `virt2phys`: like [`translate`], but additionally requires every
    /// level from the root down to the terminal entry to carry all of
    /// `required_flags` (a mask of [`flags::WRITABLE`]/[`flags::EXECUTABLE`]).
    /// Returns `None` if any level lacks a requested access bit — the
    /// permission-checked counterpart `translate` doesn't provide.
    pub fn virt2phys(&self, gpa: u64, required_flags: u64) -> Option<u64> {
        let levels = self.format.levels();
        let mut table_phys = self.root_phys;
        for level in 0..levels - 1 {
            let idx = self.format.index(gpa, level);
            let entry = read_entry(table_phys, idx);
            if !entry.is_present() || entry.0 & required_flags != required_flags {
                return None;
            }
            if entry.is_large() {
                let mask = self.leaf_size(level) - 1;
                return Some((entry.phys_addr() & !mask) | (gpa & mask));
            }
            table_phys = entry.phys_addr();
        }
        let leaf_idx = self.format.index(gpa, levels - 1);
        let entry = read_entry(table_phys, leaf_idx);
        if !entry.is_present() || entry.0 & required_flags != required_flags {
            return None;
        }
        Some(entry.phys_addr() | (gpa & 0xFFF))
    }

    /// Walk down to whichever level holds the terminal entry for `gpa`,
    /// returning its raw (unmasked-offset) physical address and the level
    /// it was found at.
    fn walk_terminal(&self, gpa: u64) -> Option<(u64, u32)> {
        let levels = self.format.levels();
        let mut table_phys = self.root_phys;
        for level in 0..levels - 1 {
            let idx = self.format.index(gpa, level);
            let entry = read_entry(table_phys, idx);
            if !entry.is_present() {
                return None;
            }
            if entry.is_large() {
                return Some((entry.phys_addr(), level));
            }
            table_phys = entry.phys_addr();
        }
        let leaf_idx = self.format.index(gpa, levels - 1);
        let entry = read_entry(table_phys, leaf_idx);
        entry.is_present().then(|| (entry.phys_addr(), levels - 1))
    }

    /// Translate `n` consecutive guest-physical pages starting at `gpa`
    /// through this cell's stage-2 table, requiring `required_flags` at
    /// every level, and copy them into `cpu_id`'s temporary window so the
    /// hypervisor can dereference them as one contiguous run — grounded on
    /// the nested-translation contract: the backing guest pages need not be
    /// physically contiguous, but the window the hypervisor reads through
    /// always is. The returned pointer is only valid until the next
    /// `get_guest_pages` call on the same CPU, which reuses the same slots.
    pub fn get_guest_pages(&self, cpu_id: u32, gpa: u64, n: usize, required_flags: u64) -> HvResult<*mut u8> {
        if n == 0 || n > NUM_TEMPORARY_PAGES || gpa % 4096 != 0 {
            return Err(HvError::Invalid);
        }
        let window_phys = temporary_window(cpu_id)?;
        for i in 0..n {
            let page_gpa = gpa + (i as u64) * 4096;
            let phys = self.virt2phys(page_gpa, required_flags).ok_or(HvError::Invalid)?;
            unsafe {
                core::ptr::copy_nonoverlapping(
                    (phys + crate::memory::hhdm_offset()) as *const u8,
                    (window_phys + crate::memory::hhdm_offset() + (i as u64) * 4096) as *mut u8,
                    4096,
                );
            }
        }
        Ok((window_phys + crate::memory::hhdm_offset()) as *mut u8)
    }

    fn flush_if_needed(&self) {
        if self.format.requires_cache_flush() {
            // DMA-visible formats need an explicit flush before the IOMMU
            // is told to continue; the CPU-visible formats rely on the
            // vCPU core's TLB invalidation on the next VM entry instead.
            crate::arch::cache_flush_range(self.root_phys, 4096);
        }
    }
}

/// Slots in each CPU's nested-guest-page temporary window.
pub const NUM_TEMPORARY_PAGES: usize = 2;
const MAX_CPUS: usize = 64;

/// Lazily-allocated, per-CPU contiguous physical run backing that CPU's
/// temporary window. Allocated once on first use and reused for every
/// later `get_guest_pages` call on that CPU.
static TEMPORARY_WINDOWS: [Mutex<Option<u64>>; MAX_CPUS] = {
    const INIT: Mutex<Option<u64>> = Mutex::new(None);
    [INIT; MAX_CPUS]
};

fn temporary_window(cpu_id: u32) -> HvResult<u64> {
    let slot = &TEMPORARY_WINDOWS[(cpu_id as usize).min(MAX_CPUS - 1)];
    let mut window = slot.lock();
    if let Some(phys) = *window {
        return Ok(phys);
    }
    let phys = pool::mem_alloc_pages(NUM_TEMPORARY_PAGES)?;
    *window = Some(phys);
    Ok(phys)
}

fn table_virt(phys: u64) -> *mut Table {
    (phys + crate::memory::hhdm_offset()) as *mut Table
}

fn zero_table(phys: u64) {
    unsafe {
        core::ptr::write_bytes(table_virt(phys), 0, 1);
    }
}

fn read_entry(table_phys: u64, idx: usize) -> PagingEntry {
    unsafe { (*table_virt(table_phys)).entries[idx] }
}

fn write_entry(table_phys: u64, idx: usize, entry: PagingEntry) {
    unsafe {
        (*table_virt(table_phys)).entries[idx] = entry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_level_shapes() {
        assert_eq!(PagingFormat::Ept.levels(), 4);
        assert_eq!(PagingFormat::ArmStage2.levels(), 4);
        assert!(PagingFormat::VtdSecondLevel.requires_cache_flush());
        assert!(!PagingFormat::Ept.requires_cache_flush());
    }

    #[test]
    fn index_extraction_is_per_level_distinct() {
        let fmt = PagingFormat::Ept;
        let addr = 0x1_2345_6000u64;
        let i0 = fmt.index(addr, 0);
        let i3 = fmt.index(addr, 3);
        assert!(i0 < 512 && i3 < 512);
    }

    #[test]
    fn page_size_is_zero_at_leaf_and_top_levels() {
        let fmt = PagingFormat::Ept;
        assert_eq!(fmt.page_size(3), 0); // leaf: plain 4 KiB, not a hugepage level
        assert_eq!(fmt.page_size(0), 0); // top level: too coarse
        assert_eq!(fmt.page_size(2), 2 * 1024 * 1024);
        assert_eq!(fmt.page_size(1), 1024 * 1024 * 1024);
    }

    fn with_pool<T>(pages: usize, f: impl FnOnce() -> T) -> T {
        pool::init(0x1000_0000, pages, 0x2000_0000, pages);
        f()
    }

    #[test]
    fn map_then_translate_round_trips() {
        with_pool(64, || {
            let mut pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            pg.map(0x2000, 0x5000, 4096, true, false).unwrap();
            assert_eq!(pg.translate(0x2000), Some(0x5000));
            assert_eq!(pg.translate(0x2fff), Some(0x5fff));
        });
    }

    #[test]
    fn virt2phys_rejects_missing_required_flags() {
        with_pool(64, || {
            let mut pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            pg.map(0x3000, 0x6000, 4096, false, false).unwrap();
            assert_eq!(pg.virt2phys(0x3000, flags::WRITABLE), None);
            assert_eq!(pg.virt2phys(0x3000, 0), Some(0x6000));
        });
    }

    #[test]
    fn virt2phys_unmapped_is_none() {
        with_pool(64, || {
            let pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            assert_eq!(pg.virt2phys(0x9000, 0), None);
        });
    }

    #[test]
    fn hugepage_map_creates_a_large_leaf() {
        with_pool(4096, || {
            let mut pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            let two_mib = 2 * 1024 * 1024;
            pg.map(two_mib, two_mib, two_mib as u64, true, true).unwrap();
            assert_eq!(pg.translate(two_mib as u64 + 0x1234), Some(two_mib as u64 + 0x1234));
        });
    }

    #[test]
    fn get_guest_pages_copies_through_the_temporary_window() {
        with_pool(64, || {
            let mut pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            pg.map(0x4000, 0x7000, 4096, true, false).unwrap();
            unsafe {
                core::ptr::write_bytes((0x7000u64 + crate::memory::hhdm_offset()) as *mut u8, 0xAB, 4096);
            }
            let ptr = pg.get_guest_pages(0, 0x4000, 1, 0).unwrap();
            assert_eq!(unsafe { *ptr }, 0xAB);
        });
    }

    #[test]
    fn get_guest_pages_rejects_too_many_pages() {
        with_pool(64, || {
            let pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            assert_eq!(pg.get_guest_pages(0, 0x4000, NUM_TEMPORARY_PAGES + 1, 0), Err(HvError::Invalid));
        });
    }

    #[test]
    fn get_guest_pages_rejects_missing_required_flags() {
        with_pool(64, || {
            let mut pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            pg.map(0x4000, 0x7000, 4096, false, false).unwrap();
            assert_eq!(pg.get_guest_pages(0, 0x4000, 1, flags::WRITABLE), Err(HvError::Invalid));
        });
    }

    #[test]
    fn unmap_splits_a_hugepage_down_to_one_subpage() {
        with_pool(4096, || {
            let mut pg = PagingStructure::create(PagingFormat::Ept).unwrap();
            let two_mib = 2 * 1024 * 1024;
            pg.map(two_mib, two_mib, two_mib as u64, true, false).unwrap();
            pg.unmap_page(two_mib as u64).unwrap();
            assert_eq!(pg.translate(two_mib as u64), None);
            // The rest of the hugepage's former range must still resolve.
            assert_eq!(pg.translate(two_mib as u64 + 4096), Some(two_mib as u64 + 4096));
        });
    }
}
