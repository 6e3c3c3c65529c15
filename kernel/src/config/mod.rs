//! System and cell configuration blobs.
//!
//! Grounded on the ACPI table parsers' idiom (`acpi::tables::SdtHeader`,
//! `acpi::madt`): a fixed `#[repr(C, packed)]` header validated by
//! signature and checksum/revision before any field is trusted, followed
//! by fixed-size or implied-offset variable-length arrays. Nothing here
//! touches the page pool or any global state — parsing is pure, so
//! `#[test]` can exercise it directly on byte slices.

pub mod system;
pub mod cell;

pub use cell::{CellConfig, MemoryRegion, IrqChipRecord, PciDeviceRecord, PciDeviceType};
pub use system::SystemConfig;
