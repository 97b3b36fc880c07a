//! DROVER Storage - Stores and Registry Boundary
//!
//! Defines the storage abstraction for the dispatch engine: the read-only
//! device registry boundary, the build store, and the execution store that
//! owns per-device result tables and race-free aggregate counters.
//!
//! The in-memory implementations here model the external persistence
//! collaborator; a database-backed deployment swaps them behind the same
//! traits.

pub mod builds;
pub mod executions;
pub mod registry;

pub use builds::{BuildStore, InMemoryBuildStore, NewBuild};
pub use executions::{ApplyOutcome, ExecutionCounters, ExecutionRecord, ExecutionStore};
pub use registry::{DeviceRegistry, InMemoryDeviceRegistry};
