//! Memory management: physical page pool, second-stage paging engine, and
//! the MMIO fault dispatcher built on top of it.

pub mod pool;
pub mod paging;
pub mod mmio;

pub use paging::{PagingFormat, PagingStructure};
pub use pool::PagePool;
