//! Application layer - Gateway business state and workflows

pub mod device;
pub mod rules;

pub use device::DeviceRegistry;
pub use rules::engine::RuleEngine;
pub use rules::executor::{ActionExecutor, LoggingActionExecutor};
