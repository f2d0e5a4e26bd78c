//! Global memory allocator configuration.
//!
//! The pipelines allocate and release large chunk buffers continuously;
//! `mimalloc` keeps fragmentation low under that pattern.

use mimalloc::MiMalloc;

/// The global allocator instance, replacing the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
