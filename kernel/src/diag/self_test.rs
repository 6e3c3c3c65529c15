use crate::cell::{CellManager, CellState};
use crate::error::HvError;
use crate::iommu::vtd::VtdUnit;
use crate::iommu::{IommuUnit, IrqTarget};
use crate::ivshmem::registry::LinkRegistry;
use crate::mm::pool::PagePool;
use crate::pci::{Bdf, PciModerator};
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// Outcome of one cross-module check.
struct TestResult {
    name: &'static str,
    passed: bool,
    detail: Option<String>,
}

/// Run every cross-module scenario check and return (passed, failed, log).
pub fn run_all() -> (usize, usize, Vec<String>) {
    let results: Vec<TestResult> = vec![
        p1_cell_cpu_sets_remain_disjoint(),
        scenario2_create_against_locked_cell_is_busy(),
        b1_regranting_an_owned_cpu_is_busy(),
        b2_duplicate_cell_id_is_exist(),
        p5_destroyed_cell_releases_its_cpus(),
        r2_repeated_get_state_is_idempotent(),
        p3_alloc_free_round_trip_restores_pool(),
        b3_pool_exhaustion_returns_enomem(),
        b5_bar_write_masked_bits_never_take_guest_value(),
        p6_ivshmem_peer_never_refers_to_detached_endpoint(),
        p4_remap_target_cpu_must_be_owned(),
    ];

    let mut passed = 0usize;
    let mut failed = 0usize;
    let mut log = Vec::new();
    for r in &results {
        if r.passed {
            passed += 1;
            log.push(format!("  [PASS] {}", r.name));
        } else {
            failed += 1;
            if let Some(ref detail) = r.detail {
                log.push(format!("  [FAIL] {} — {}", r.name, detail));
            } else {
                log.push(format!("  [FAIL] {}", r.name));
            }
        }
    }
    (passed, failed, log)
}

fn p1_cell_cpu_sets_remain_disjoint() -> TestResult {
    let mut mgr = CellManager::new();
    mgr.init_root(vec![0, 1, 2, 3, 4]);
    let a = mgr.create(1, String::from("a"), vec![1, 2]).unwrap();
    let b = mgr.create(2, String::from("b"), vec![3, 4]).unwrap();
    let set_a = &mgr.get(a).unwrap().cpu_set;
    let set_b = &mgr.get(b).unwrap().cpu_set;
    let overlap = set_a.iter().any(|c| set_b.contains(c));
    TestResult {
        name: "P1: distinct cells' CPU sets stay disjoint",
        passed: !overlap,
        detail: if overlap { Some(format!("{:?} intersects {:?}", set_a, set_b)) } else { None },
    }
}

fn scenario2_create_against_locked_cell_is_busy() -> TestResult {
    let mut mgr = CellManager::new();
    mgr.init_root(vec![0, 1, 2]);
    let a = mgr.create(1, String::from("a"), vec![1]).unwrap();
    mgr.start(a).unwrap();
    mgr.lock_for_reconfig(a).unwrap();
    let result = mgr.create(2, String::from("b"), vec![2]);
    let passed = result == Err(HvError::Busy);
    TestResult {
        name: "Scenario 2: cell create while another cell is reconfig-locked is EBUSY",
        passed,
        detail: if passed { None } else { Some(format!("{:?}", result)) },
    }
}

fn b1_regranting_an_owned_cpu_is_busy() -> TestResult {
    let mut mgr = CellManager::new();
    mgr.init_root(vec![0, 1]);
    mgr.create(1, String::from("a"), vec![1]).unwrap();
    // CPU 1 was carved out of root on the first create, so it's no longer
    // a subset of root's current set — EBUSY, not EEXIST.
    let result = mgr.create(2, String::from("b"), vec![1]);
    let passed = result == Err(HvError::Busy);
    TestResult {
        name: "B1: granting a CPU no longer in the root cell's current set fails EBUSY",
        passed,
        detail: if passed { None } else { Some(format!("{:?}", result)) },
    }
}

fn b2_duplicate_cell_id_is_exist() -> TestResult {
    let mut mgr = CellManager::new();
    mgr.init_root(vec![0, 1, 2]);
    mgr.create(1, String::from("a"), vec![1]).unwrap();
    let result = mgr.create(1, String::from("b"), vec![2]);
    let passed = result == Err(HvError::Exists);
    TestResult {
        name: "B2: a cell id equal to an existing cell's fails EEXIST",
        passed,
        detail: if passed { None } else { Some(format!("{:?}", result)) },
    }
}

fn p5_destroyed_cell_releases_its_cpus() -> TestResult {
    let mut mgr = CellManager::new();
    mgr.init_root(vec![0, 1]);
    let a = mgr.create(1, String::from("a"), vec![1]).unwrap();
    mgr.destroy(a).unwrap();
    let owned_by_anyone = mgr.cpu_is_owned(1);
    // and the CPU is available for a fresh grant
    let regrant = mgr.create(2, String::from("b"), vec![1]);
    let passed = !owned_by_anyone && regrant.is_ok();
    TestResult {
        name: "P5: destroying a cell frees its CPUs for re-grant",
        passed,
        detail: if passed { None } else { Some(format!("owned={} regrant={:?}", owned_by_anyone, regrant)) },
    }
}

fn r2_repeated_get_state_is_idempotent() -> TestResult {
    let mut mgr = CellManager::new();
    mgr.init_root(vec![0, 1]);
    let a = mgr.create(1, String::from("a"), vec![1]).unwrap();
    mgr.start(a).unwrap();
    let first = mgr.get(a).unwrap().state;
    let second = mgr.get(a).unwrap().state;
    let passed = first == second && first == CellState::Running;
    TestResult {
        name: "R2: back-to-back CELL_GET_STATE with no mutation returns identical values",
        passed,
        detail: if passed { None } else { Some(format!("{:?} then {:?}", first, second)) },
    }
}

fn p3_alloc_free_round_trip_restores_pool() -> TestResult {
    let mut pool = PagePool::new(0x2000_0000, 32);
    let before = pool.stats();
    let a = pool.alloc_pages(5).unwrap();
    let b = pool.alloc_pages(3).unwrap();
    pool.free_pages(a, 5);
    pool.free_pages(b, 3);
    let after = pool.stats();
    let passed = before == after;
    TestResult {
        name: "P3: alloc(n) then free(n) restores the pool to its prior state",
        passed,
        detail: if passed { None } else { Some(format!("{:?} != {:?}", before, after)) },
    }
}

fn b3_pool_exhaustion_returns_enomem() -> TestResult {
    let mut pool = PagePool::new(0, 4);
    pool.alloc_pages(4).unwrap();
    let result = pool.alloc_pages(1);
    let passed = result == Err(HvError::NoMemory);
    TestResult {
        name: "B3: allocating N+1 pages from an N-page pool returns ENOMEM",
        passed,
        detail: if passed { None } else { Some(format!("{:?}", result)) },
    }
}

fn b5_bar_write_masked_bits_never_take_guest_value() -> TestResult {
    let mut m = PciModerator::new();
    let bdf = Bdf::new(0, 6, 0);
    // 0x1000-byte BAR: low 12 bits are fixed by bar_mask and must never
    // reflect anything the guest writes.
    m.add_device(bdf, [0x1000, 0, 0, 0, 0, 0], None).unwrap();
    m.assign(bdf, 1).unwrap();
    m.write_config(bdf, 1, 0x10, 0xDEAD_0FFF).unwrap();
    let first = m.read_config(bdf, 0x10).unwrap();
    m.write_config(bdf, 1, 0x10, 0xBEEF_0AAA).unwrap();
    let second = m.read_config(bdf, 0x10).unwrap();
    let passed = first & 0xFFF == 0 && second & 0xFFF == 0;
    TestResult {
        name: "B5: BAR bits fixed by bar_mask are never settable by the guest",
        passed,
        detail: if passed { None } else { Some(format!("{:#x} then {:#x}", first, second)) },
    }
}

fn p6_ivshmem_peer_never_refers_to_detached_endpoint() -> TestResult {
    let mut reg = LinkRegistry::new();
    let h = reg.create(0xfb80_0000, 0x1_0000).unwrap();
    let bdf_a = Bdf::new(0, 7, 0);
    let bdf_b = Bdf::new(0, 8, 0);
    reg.attach(h, bdf_a).unwrap();
    reg.attach(h, bdf_b).unwrap();
    reg.detach(h, bdf_b);
    let peer_of_a = reg.peer_of(h, 0);
    let passed = peer_of_a.is_none();
    TestResult {
        name: "P6: a detached endpoint's slot is never reported as its former peer's live pointer",
        passed,
        detail: if passed { None } else { Some(format!("{:?}", peer_of_a)) },
    }
}

fn p4_remap_target_cpu_must_be_owned() -> TestResult {
    // `map_interrupt`'s target check reads the live, process-wide
    // CellManager (not a test-local instance), so this scenario must
    // populate it for real and clean up after itself.
    const TEST_CPU: u32 = 2_000_000;
    const UNOWNED_CPU: u32 = 2_000_001;
    const TEST_CELL_ID: u32 = 0xFFFF_0000;
    {
        let mut mgr = crate::cell::CELL_MANAGER.lock();
        if !mgr.has_root() {
            mgr.init_root(vec![0]);
        }
        // Grant TEST_CPU to the root cell first so the create below sees
        // it as a valid subset — this self-test's CPU ids are otherwise
        // unreachable, out-of-range values no real cell ever claims.
        let root = mgr.root();
        if let Some(root_cell) = mgr.get_mut(root) {
            if !root_cell.owns_cpu(TEST_CPU) {
                root_cell.cpu_set.push(TEST_CPU);
                root_cell.stats.push(crate::cell::PerCpuStats::default());
            }
        }
    }
    let cell = {
        let mut mgr = crate::cell::CELL_MANAGER.lock();
        mgr.create(TEST_CELL_ID, String::from("p4-self-test"), vec![TEST_CPU]).unwrap()
    };

    let mut unit = IommuUnit::VtD(VtdUnit::new(0));
    let owned_target = IrqTarget { vector: 48, cpu_id: TEST_CPU, logical: false };
    let accepted = unit.map_interrupt(0x0800, owned_target);
    let unowned_target = IrqTarget { vector: 48, cpu_id: UNOWNED_CPU, logical: false };
    let rejected = unit.map_interrupt(0x0801, unowned_target);

    // The accepted call must have actually written a retrievable IRTE,
    // not merely returned Ok — otherwise this would pass on a no-op.
    let IommuUnit::VtD(ref vtd) = unit else { unreachable!() };
    let stored = accepted.ok().and_then(|idx| vtd.irte(idx));

    crate::cell::CELL_MANAGER.lock().destroy(cell).ok();

    let passed = accepted.is_ok() && stored == Some((0x0800, owned_target)) && rejected == Err(HvError::Invalid);
    TestResult {
        name: "P4: an IRTE target naming a CPU outside every cell's set is rejected",
        passed,
        detail: if passed {
            None
        } else {
            Some(format!("accepted={:?} stored={:?} rejected={:?}", accepted, stored, rejected))
        },
    }
}
