//! Storage adapters for Lapboard

pub mod dataset;
pub mod demo;
pub mod memory;

pub use dataset::Dataset;
pub use demo::demo_dataset;
pub use memory::MemoryStore;
