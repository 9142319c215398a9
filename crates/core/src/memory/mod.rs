//! The memory subsystem: backing store, tagged cache, and replacement
//! policies (spec §3 "Cache"/"Memory", §4.4 "Memory Subsystem").

/// The tagged, set-associative cache.
pub mod cache;
/// Cache replacement policies.
pub mod policies;
/// Flat backing store plus cache, exposing `MemResult`-returning operations.
pub mod subsystem;

pub use cache::{Cache, LineView};
pub use policies::ReplacementPolicyWrapper;
pub use subsystem::{ByteResult, MemResult, MemorySubsystem, WordResult, MEM_SIZE, PROTECTED_FILL, PROTECTED_START};
