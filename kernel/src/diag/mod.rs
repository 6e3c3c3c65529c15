//! Cross-module self-tests.
//!
//! Each hypervisor module proves its own unit-level behavior in its own
//! `#[cfg(test)]` block; this module instead exercises the properties that
//! only show up once several modules are wired together (a cell's CPU set
//! against the IOMMU's interrupt-remap validator, a destroyed cell's
//! ownership reverting, a PCI BAR write surviving a hand-over). Grounded on
//! `hypervisor::tests::run_all_tests`'s aggregator shape: a flat list of
//! named checks, each producing pass/fail plus an optional detail string,
//! tallied and logged.

pub mod self_test;

pub use self_test::run_all;
