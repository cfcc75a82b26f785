//! System hardware detection.
//!
//! Used to size the memory tier when it is configured as a fraction of
//! total memory.

mod hardware;

pub use hardware::{detect_total_memory, memory_fraction};
