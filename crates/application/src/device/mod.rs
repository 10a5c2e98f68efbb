pub mod bootstrap;
pub mod registry;

pub use registry::DeviceRegistry;

/// Default command topic for an actuator: `<prefix>cmd/{id}`.
pub fn default_command_topic(prefix: &str, device_id: &str) -> String {
    format!("{prefix}cmd/{device_id}")
}

/// Default telemetry topic for a sensor: `<prefix>telemetry/{id}`.
pub fn default_telemetry_topic(prefix: &str, device_id: &str) -> String {
    format!("{prefix}telemetry/{device_id}")
}

/// Default state-report topic for an actuator: `<prefix>state/{id}`.
pub fn default_state_topic(prefix: &str, device_id: &str) -> String {
    format!("{prefix}state/{device_id}")
}
