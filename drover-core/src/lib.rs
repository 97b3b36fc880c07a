//! DROVER Core - Entity Types
//!
//! Pure data structures and pure functions for the fleet dispatch engine.
//! All other crates depend on this. This crate contains no I/O: entities,
//! enums, identifiers, the cohort function, the declarative device filter,
//! and the error taxonomy live here.

pub mod cohort;
pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod filter;
pub mod identity;
pub mod transport;

pub use cohort::{cohort, eligible};
pub use config::RetryConfig;
pub use entities::{
    Build, CounterSnapshot, DeviceRecord, DeviceResult, DeviceStatusUpdate, Execution,
    ExecutionReport, Manifest, PromoteOutcome, ResolvedTargets, RollbackOutcome, TargetPreview,
};
pub use enums::{
    BuildState, DeviceResultStatus, ExecutionMode, ExecutionStatus, StatusParseError, TargetSpec,
};
pub use error::{
    DispatchError, DroverError, DroverResult, RolloutError, StorageError, TargetError,
    TransportError, ValidationError,
};
pub use filter::DeviceFilter;
pub use identity::{
    checksum_hex, compute_checksum, new_build_id, new_execution_id, BuildId, Checksum, DeviceId,
    ExecutionId, Timestamp,
};
pub use transport::{DeviceStatusSource, PushTransport, StatusSourceError};
