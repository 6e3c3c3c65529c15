//! Cell manager: lifecycle state machine, hypercall interface, and the
//! global cell arena.
//!
//! Grounded on `hypervisor::vm` (Intel VM create/start/stop lifecycle) and
//! `hypervisor::isolation` (boundary-violation bookkeeping, generalized
//! here from "EPT violation against the one guest" to "any cell touching
//! memory/MMIO/PCI outside what its configuration grants"). The state
//! machine and hypercall set mirror `examples/original_source/hypervisor/control.c`.

pub mod arena;
pub mod comm;
pub mod panic;

use crate::config::cell::{CellConfig, IrqChipRecord, MemoryRegion, PciDeviceRecord};
use crate::error::{HvError, HvResult};
use crate::iommu::Domain;
use crate::mm::mmio::MmioDispatcher;
use crate::mm::paging::{PagingFormat, PagingStructure};
use alloc::string::String;
use alloc::vec::Vec;
use spin::Mutex;

pub use arena::{CellArena, CellHandle, MAX_CELLS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    ShutDown,
    Running,
    RunningLocked,
    Failed,
    FailedCommRev,
}

/// Per-CPU fault/stat counters, incremented by the vCPU exit loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerCpuStats {
    pub vmexits: u64,
    pub mmio_accesses: u64,
    pub hypercalls: u64,
    pub boundary_violations: u64,
}

/// A cell: the root aggregate described in `examples/original_source/driver/cell.h`,
/// expanded here with the per-arch paging root, IOMMU domain, and comm-page
/// the original keeps in separate `struct cell`-adjacent allocations.
pub struct Cell {
    pub id: u32,
    pub name: String,
    pub state: CellState,
    pub cpu_set: Vec<u32>,
    pub mmio: MmioDispatcher,
    pub memory_regions: Vec<MemoryRegion>,
    pub pci_devices: Vec<PciDeviceRecord>,
    pub irqchips: Vec<IrqChipRecord>,
    /// The cell's second-stage (EPT/NPT/stage-2) page-table root. `None`
    /// until `attach_paging` is called, which the create path does once the
    /// platform's format is known.
    pub paging_root: Option<PagingStructure>,
    /// The cell's IOMMU translation domain, if the platform has an IOMMU
    /// and the cell owns any DMA-capable device.
    pub iommu_domain: Option<Domain>,
    pub comm: comm::CommRegion,
    pub loadable: bool,
    pub stats: Vec<PerCpuStats>,
    /// The configuration's `console` field; nonzero gates
    /// `DEBUG_CONSOLE_PUTC` for this cell.
    pub console: u32,
}

impl Cell {
    pub fn new(id: u32, name: String, cpu_set: Vec<u32>) -> Self {
        let n = cpu_set.len();
        Cell {
            id,
            name,
            state: CellState::ShutDown,
            cpu_set,
            mmio: MmioDispatcher::new(),
            memory_regions: Vec::new(),
            pci_devices: Vec::new(),
            irqchips: Vec::new(),
            paging_root: None,
            iommu_domain: None,
            comm: comm::CommRegion::new(CellState::ShutDown),
            loadable: false,
            stats: alloc::vec![PerCpuStats::default(); n],
            console: 0,
        }
    }

    #[cfg(test)]
    pub fn new_for_test(name: &'static str) -> Self {
        Cell::new(0, String::from(name), alloc::vec![0])
    }

    pub fn owns_cpu(&self, cpu_id: u32) -> bool {
        self.cpu_set.contains(&cpu_id)
    }

    /// Allocate this cell's second-stage paging root in `format`. Replaces
    /// any existing root (freeing its pages first) rather than leaking it.
    pub fn attach_paging(&mut self, format: PagingFormat) -> HvResult<()> {
        if let Some(old) = self.paging_root.take() {
            old.destroy();
        }
        self.paging_root = Some(PagingStructure::create(format)?);
        Ok(())
    }

    /// Allocate this cell's IOMMU domain, indexed by its arena slot so the
    /// platform's IOMMU unit can attribute faults back to this cell.
    pub fn attach_iommu_domain(&mut self, cell_index: u16, format: PagingFormat) -> HvResult<()> {
        if let Some(old) = self.iommu_domain.take() {
            old.destroy();
        }
        self.iommu_domain = Some(Domain::new(cell_index, format)?);
        Ok(())
    }
}

pub struct CellManager {
    arena: CellArena,
    root: Option<CellHandle>,
}

impl CellManager {
    pub const fn new() -> Self {
        CellManager { arena: CellArena::new(), root: None }
    }

    pub fn init_root(&mut self, cpu_set: Vec<u32>) -> CellHandle {
        let mut cell = Cell::new(0, String::from("root"), cpu_set);
        cell.state = CellState::Running;
        cell.comm.cell_state = CellState::Running;
        cell.console = 1;
        let handle = self.arena.insert(cell).expect("root cell must fit in arena");
        self.root = Some(handle);
        handle
    }

    pub fn root(&self) -> CellHandle {
        self.root.expect("root cell not initialized")
    }

    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    pub fn is_root(&self, handle: CellHandle) -> bool {
        self.root == Some(handle)
    }

    /// Find the cell owning `cpu_id` and its stats slot, if any.
    pub fn find_by_cpu(&self, cpu_id: u32) -> Option<(CellHandle, &PerCpuStats)> {
        self.arena.iter().find_map(|(h, c)| {
            c.cpu_set.iter().position(|&id| id == cpu_id).map(|pos| (h, &c.stats[pos]))
        })
    }

    /// `cell_create`: register a new cell in SHUT_DOWN state, carving its
    /// CPUs out of the root cell's current set. B2: a duplicate `id` fails
    /// with EEXIST. B1: a `cpu_set` that isn't a subset of the root cell's
    /// *current* set (CPUs already carved out by an earlier create are no
    /// longer in it) fails with EBUSY. Also EBUSY while any other non-root
    /// cell holds RUNNING_LOCKED, matching `cell_reconfig_ok` in the
    /// original.
    pub fn create(&mut self, id: u32, name: String, cpu_set: Vec<u32>) -> HvResult<CellHandle> {
        if !self.reconfig_ok(None) {
            return Err(HvError::Busy);
        }
        if self.arena.iter().any(|(_, c)| c.id == id) {
            return Err(HvError::Exists);
        }
        let root = self.root.ok_or(HvError::Invalid)?;
        let root_cell = self.arena.get(root).ok_or(HvError::Invalid)?;
        if !cpu_set.iter().all(|c| root_cell.owns_cpu(*c)) {
            return Err(HvError::Busy);
        }
        self.carve_cpus_from_root(&cpu_set);
        let cell = Cell::new(id, name, cpu_set);
        self.arena.insert(cell).ok_or(HvError::NoMemory)
    }

    /// `cell_create` driven directly from a parsed configuration blob:
    /// expands the wire-format CPU bitmap and copies the memory-region,
    /// PCI-device, and IRQ-chip arrays onto the new cell.
    pub fn create_from_config(&mut self, config: &CellConfig) -> HvResult<CellHandle> {
        let handle = self.create(config.id, config.name.clone(), config.cpu_ids())?;
        if let Some(cell) = self.arena.get_mut(handle) {
            cell.memory_regions = config.memory_regions.clone();
            cell.pci_devices = config.pci_devices.clone();
            cell.irqchips = config.irqchips.clone();
            cell.console = config.console;
        }
        Ok(handle)
    }

    /// Remove `cpus` from the root cell's set (and the matching per-CPU
    /// stats slots), if a root is initialized. No-op for any CPU the root
    /// doesn't currently own.
    fn carve_cpus_from_root(&mut self, cpus: &[u32]) {
        let Some(root) = self.root else { return };
        let Some(root_cell) = self.arena.get_mut(root) else { return };
        for &cpu in cpus {
            if let Some(pos) = root_cell.cpu_set.iter().position(|&c| c == cpu) {
                root_cell.cpu_set.remove(pos);
                if pos < root_cell.stats.len() {
                    root_cell.stats.remove(pos);
                }
            }
        }
    }

    /// Return `cpus` to the root cell's set, appending a fresh stats slot
    /// for each — the counterpart to `carve_cpus_from_root`, run on
    /// `destroy`.
    fn return_cpus_to_root(&mut self, cpus: &[u32]) {
        let Some(root) = self.root else { return };
        let Some(root_cell) = self.arena.get_mut(root) else { return };
        for &cpu in cpus {
            if !root_cell.cpu_set.contains(&cpu) {
                root_cell.cpu_set.push(cpu);
                root_cell.stats.push(PerCpuStats::default());
            }
        }
    }

    /// `cell_start`: SHUT_DOWN -> RUNNING. Any other state is rejected.
    pub fn start(&mut self, handle: CellHandle) -> HvResult<()> {
        let cell = self.arena.get_mut(handle).ok_or(HvError::NotFound)?;
        if cell.state != CellState::ShutDown {
            return Err(HvError::Invalid);
        }
        cell.state = CellState::Running;
        cell.loadable = false;
        Ok(())
    }

    /// `cell_set_loadable`: marks the cell eligible for the loader CLI to
    /// write LOADABLE regions into it. Only a SHUT_DOWN cell may be set
    /// loadable — once started, `start` clears the flag again.
    pub fn set_loadable(&mut self, handle: CellHandle) -> HvResult<()> {
        let cell = self.arena.get_mut(handle).ok_or(HvError::NotFound)?;
        if cell.state != CellState::ShutDown {
            return Err(HvError::Invalid);
        }
        cell.loadable = true;
        Ok(())
    }

    /// `cell_destroy`: any state except RUNNING_LOCKED may be torn down;
    /// a locked cell must finish its in-flight reconfiguration first. Tears
    /// down the cell's paging root and IOMMU domain (freeing their pages
    /// back to the pool) and returns its CPUs to the root cell's set.
    pub fn destroy(&mut self, handle: CellHandle) -> HvResult<()> {
        if Some(handle) == self.root {
            return Err(HvError::Invalid);
        }
        {
            let cell = self.arena.get(handle).ok_or(HvError::NotFound)?;
            if cell.state == CellState::RunningLocked {
                return Err(HvError::Busy);
            }
        }
        let cell = self.arena.remove(handle).ok_or(HvError::NotFound)?;
        self.return_cpus_to_root(&cell.cpu_set);
        if let Some(paging_root) = cell.paging_root {
            paging_root.destroy();
        }
        if let Some(domain) = cell.iommu_domain {
            domain.destroy();
        }
        Ok(())
    }

    /// Lock a running cell ahead of a reconfiguration that touches it
    /// directly (its own memory/IRQ layout is about to change).
    pub fn lock_for_reconfig(&mut self, handle: CellHandle) -> HvResult<()> {
        let cell = self.arena.get_mut(handle).ok_or(HvError::NotFound)?;
        if cell.state != CellState::Running {
            return Err(HvError::Invalid);
        }
        cell.state = CellState::RunningLocked;
        Ok(())
    }

    pub fn unlock_after_reconfig(&mut self, handle: CellHandle) -> HvResult<()> {
        let cell = self.arena.get_mut(handle).ok_or(HvError::NotFound)?;
        if cell.state != CellState::RunningLocked {
            return Err(HvError::Invalid);
        }
        cell.state = CellState::Running;
        Ok(())
    }

    pub fn mark_failed(&mut self, handle: CellHandle) {
        if let Some(cell) = self.arena.get_mut(handle) {
            cell.state = CellState::Failed;
        }
    }

    /// True unless some *other* non-root cell currently holds
    /// RUNNING_LOCKED — mirrors `cell_reconfig_ok`.
    fn reconfig_ok(&self, excluded: Option<CellHandle>) -> bool {
        for (handle, cell) in self.arena.iter() {
            if Some(handle) != self.root && Some(handle) != excluded && cell.state == CellState::RunningLocked {
                return false;
            }
        }
        true
    }

    pub fn get(&self, handle: CellHandle) -> Option<&Cell> {
        self.arena.get(handle)
    }

    pub fn get_mut(&mut self, handle: CellHandle) -> Option<&mut Cell> {
        self.arena.get_mut(handle)
    }

    pub fn cpu_is_owned(&self, cpu_id: u32) -> bool {
        self.arena.iter().any(|(_, c)| c.owns_cpu(cpu_id))
    }

    /// Total number of live cells, root included — `num_cells` in
    /// `HYPERVISOR_GET_INFO`.
    pub fn cell_count(&self) -> usize {
        self.arena.len()
    }

    /// Resolve a wire-visible cell index to its current handle.
    pub fn find_by_index(&self, index: u16) -> HvResult<CellHandle> {
        self.arena.handle_at(index).ok_or(HvError::NotFound)
    }
}

impl Default for CellManager {
    fn default() -> Self {
        Self::new()
    }
}

pub static CELL_MANAGER: Mutex<CellManager> = Mutex::new(CellManager::new());

/// Whether `cpu_id` belongs to any currently-registered cell. Used by the
/// IOMMU interrupt-remap validator to reject targets naming an unowned
/// CPU.
pub fn cpu_is_owned(cpu_id: u32) -> bool {
    CELL_MANAGER.lock().cpu_is_owned(cpu_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_start_transitions_to_running() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1]);
        let h = mgr.create(1, String::from("guest"), alloc::vec![1]).unwrap();
        assert_eq!(mgr.get(h).unwrap().state, CellState::ShutDown);
        mgr.start(h).unwrap();
        assert_eq!(mgr.get(h).unwrap().state, CellState::Running);
    }

    #[test]
    fn starting_a_running_cell_fails() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1]);
        let h = mgr.create(1, String::from("guest"), alloc::vec![1]).unwrap();
        mgr.start(h).unwrap();
        assert_eq!(mgr.start(h), Err(HvError::Invalid));
    }

    #[test]
    fn create_carves_cpus_out_of_root_so_a_second_grant_is_busy() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1]);
        mgr.create(1, String::from("a"), alloc::vec![1]).unwrap();
        // CPU 1 is no longer in root's current set, so granting it again
        // fails EBUSY, not EEXIST (duplicate *id* is the EEXIST case).
        assert_eq!(mgr.create(2, String::from("b"), alloc::vec![1]), Err(HvError::Busy));
    }

    #[test]
    fn create_rejects_duplicate_cell_id() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1, 2]);
        mgr.create(1, String::from("a"), alloc::vec![1]).unwrap();
        assert_eq!(mgr.create(1, String::from("b"), alloc::vec![2]), Err(HvError::Exists));
    }

    #[test]
    fn destroy_of_locked_cell_is_busy() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1]);
        let h = mgr.create(1, String::from("guest"), alloc::vec![1]).unwrap();
        mgr.start(h).unwrap();
        mgr.lock_for_reconfig(h).unwrap();
        assert_eq!(mgr.destroy(h), Err(HvError::Busy));
        mgr.unlock_after_reconfig(h).unwrap();
        assert!(mgr.destroy(h).is_ok());
    }

    #[test]
    fn destroy_returns_cpus_to_root() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1]);
        let h = mgr.create(1, String::from("a"), alloc::vec![1]).unwrap();
        assert!(!mgr.get(mgr.root()).unwrap().owns_cpu(1));
        mgr.destroy(h).unwrap();
        assert!(mgr.get(mgr.root()).unwrap().owns_cpu(1));
    }

    #[test]
    fn create_rejected_while_another_cell_locked() {
        let mut mgr = CellManager::new();
        mgr.init_root(alloc::vec![0, 1, 2]);
        let h = mgr.create(1, String::from("a"), alloc::vec![1]).unwrap();
        mgr.start(h).unwrap();
        mgr.lock_for_reconfig(h).unwrap();
        assert_eq!(mgr.create(2, String::from("b"), alloc::vec![2]), Err(HvError::Busy));
    }

    #[test]
    fn root_cell_cannot_be_destroyed() {
        let mut mgr = CellManager::new();
        let root = mgr.init_root(alloc::vec![0]);
        assert_eq!(mgr.destroy(root), Err(HvError::Invalid));
    }
}
