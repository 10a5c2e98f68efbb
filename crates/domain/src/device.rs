use serde::{Deserialize, Serialize};

/// Runtime status of a device, refreshed by telemetry arrivals.
///
/// Field declaration order is the JSON emission order exposed by the
/// device API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub online: bool,
    pub last_seen_ms: i64,
    pub last_topic: String,
    pub last_payload: String,
}

/// A field device known to the gateway, either declared in configuration
/// or discovered from MQTT topic traffic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    /// "sensor", "actuator" or "unknown" for discovered devices.
    pub kind: String,
    /// Transport the device speaks, e.g. "mqtt".
    pub transport: String,
    #[serde(default)]
    pub telemetry_topic: String,
    #[serde(default)]
    pub command_topic: String,
    #[serde(default)]
    pub status: DeviceStatus,
}

impl Device {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, transport: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            transport: transport.into(),
            ..Default::default()
        }
    }

    pub fn with_telemetry_topic(mut self, topic: impl Into<String>) -> Self {
        self.telemetry_topic = topic.into();
        self
    }

    pub fn with_command_topic(mut self, topic: impl Into<String>) -> Self {
        self.command_topic = topic.into();
        self
    }
}
