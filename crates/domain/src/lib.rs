//! Domain layer - Pure business logic with no external dependencies
//!
//! This crate contains:
//! - Entities (Device, Rule)
//! - Value Objects (DeviceStatus, Condition, Action, SemVer)
//! - Error types
//!
//! Principles:
//! - No dependencies on infrastructure
//! - Serialized field order is the wire order
//! - Testable in isolation

pub mod device;
pub mod error;
pub mod rule;
pub mod semver;

// Re-export commonly used types
pub use device::{Device, DeviceStatus};
pub use error::DomainError;
pub use rule::{Action, Condition, Rule};
pub use semver::SemVer;
