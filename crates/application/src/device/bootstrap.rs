//! Device bootstrap from the flattened auxiliary config files.

use domain::Device;
use infrastructure::ConfigMap;
use tracing::{debug, warn};

use super::{DeviceRegistry, default_command_topic, default_state_topic, default_telemetry_topic};

/// Register every `sensors[i]` and `actuators[i]` entry of `cfg`.
/// Sensors get a defaulted telemetry topic, actuators a command topic
/// plus a state-report telemetry topic. Returns how many devices were
/// registered.
pub fn register_configured_devices(
    cfg: &ConfigMap,
    topic_prefix: &str,
    registry: &mut DeviceRegistry,
) -> usize {
    let mut registered = 0;

    for i in 0.. {
        let Some(id) = cfg.get_string(&format!("sensors[{i}].id")).filter(|s| !s.is_empty())
        else {
            break;
        };
        let transport = cfg.get_string_or(&format!("sensors[{i}].protocol"), "mqtt");
        let device = Device::new(id.clone(), "sensor", transport)
            .with_telemetry_topic(default_telemetry_topic(topic_prefix, &id));

        match registry.register(device) {
            Ok(()) => {
                debug!(id = %id, "sensor registered from config");
                registered += 1;
            }
            Err(e) => warn!(id = %id, error = %e, "skipping configured sensor"),
        }
    }

    for i in 0.. {
        let Some(id) = cfg
            .get_string(&format!("actuators[{i}].id"))
            .filter(|s| !s.is_empty())
        else {
            break;
        };
        let transport = cfg.get_string_or(&format!("actuators[{i}].protocol"), "mqtt");
        let device = Device::new(id.clone(), "actuator", transport)
            .with_command_topic(default_command_topic(topic_prefix, &id))
            .with_telemetry_topic(default_state_topic(topic_prefix, &id));

        match registry.register(device) {
            Ok(()) => {
                debug!(id = %id, "actuator registered from config");
                registered += 1;
            }
            Err(e) => warn!(id = %id, error = %e, "skipping configured actuator"),
        }
    }

    registered
}
