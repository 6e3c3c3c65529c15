//! IRQ-chip abstraction.
//!
//! Wraps whichever physical interrupt controller the platform has (local
//! APIC on x86, GICv2/v3 on ARM) behind one injection entry point, backed
//! by a per-CPU [`pending::PendingIrqRing`] for cross-CPU delivery. vCPU
//! exit handlers call [`IrqChip::inject`] when they decide an interrupt
//! belongs to a CPU other than the one that's currently trapped; the
//! target CPU drains its ring on its own next VM-entry path, so injection
//! never blocks the sending CPU on the receiving one.

pub mod lapic;
pub mod gic;
pub mod pending;

use crate::error::HvResult;
use pending::PendingIrqRing;
use spin::Mutex;

const MAX_CPUS: usize = 64;

/// The platform's single local interrupt controller, built once during
/// [`crate::boot::hypervisor_init`] from the arch-appropriate [`ChipKind`].
pub static IRQCHIP: Mutex<Option<IrqChip>> = Mutex::new(None);

pub enum ChipKind {
    LocalApic,
    Gic(gic::GicVersion),
}

pub struct IrqChip {
    pub kind: ChipKind,
    rings: [PendingIrqRing; MAX_CPUS],
}

impl IrqChip {
    pub fn new(kind: ChipKind) -> Self {
        const INIT: PendingIrqRing = PendingIrqRing::new();
        IrqChip { kind, rings: [INIT; MAX_CPUS] }
    }

    /// Queue `vector` for delivery to `target_cpu`. Returns an error if the
    /// target's ring is full — the caller should fall back to sending a
    /// maintenance interrupt so the target re-polls instead of dropping
    /// the vector silently.
    pub fn inject(&self, target_cpu: usize, vector: u8) -> HvResult<()> {
        let ring = self.rings.get(target_cpu).ok_or(crate::error::HvError::Invalid)?;
        if ring.push(vector) {
            Ok(())
        } else {
            Err(crate::error::HvError::Busy)
        }
    }

    /// Drain this CPU's own pending ring — called from the vCPU exit loop
    /// right before VM-entry.
    pub fn drain_self(&self, cpu_id: usize) -> Option<u8> {
        self.rings.get(cpu_id)?.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_then_drain_round_trips() {
        let chip = IrqChip::new(ChipKind::LocalApic);
        chip.inject(3, 0x40).unwrap();
        assert_eq!(chip.drain_self(3), Some(0x40));
        assert_eq!(chip.drain_self(3), None);
    }

    #[test]
    fn inject_out_of_range_cpu_is_invalid() {
        let chip = IrqChip::new(ChipKind::LocalApic);
        assert!(chip.inject(MAX_CPUS + 1, 0x40).is_err());
    }
}
