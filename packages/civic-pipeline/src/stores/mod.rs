//! Manifest store implementations.

mod memory;

pub use memory::MemoryManifestStore;
