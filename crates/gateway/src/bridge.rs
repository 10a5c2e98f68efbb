//! MQTT → gateway bridge: the per-message policy.
//!
//! A single task consumes the client's inbound channel, so the steps of
//! the policy run in arrival order for every message: registry upsert,
//! then rule evaluation (which may publish), then the WebSocket
//! broadcast.

use std::sync::Arc;

use application::device::default_command_topic;
use application::rules::executor::ActionExecutor;
use application::rules::loader::parse_f64_strict;
use async_trait::async_trait;
use domain::{Action, Rule};
use infrastructure::{Level, MqttMessage};
use tracing::warn;

use crate::state::AppState;
use crate::ws::MqttTrafficEvent;

/// Consume inbound MQTT messages until the channel closes.
pub async fn run(state: Arc<AppState>, mut rx: tokio::sync::broadcast::Receiver<MqttMessage>) {
    loop {
        match rx.recv().await {
            Ok(msg) => handle_mqtt_message(&state, &msg).await,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "mqtt bridge lagged, messages dropped");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub async fn handle_mqtt_message(state: &Arc<AppState>, msg: &MqttMessage) {
    let payload = String::from_utf8_lossy(&msg.payload).to_string();
    let now_ms = chrono::Utc::now().timestamp_millis();

    let device_id = state
        .registry
        .write()
        .unwrap()
        .upsert_mqtt_device_from_topic(&msg.topic, &payload, now_ms);

    if let (Some(device_id), Some(value)) = (device_id, parse_sensor_value(&payload)) {
        let exec = RuleActionExecutor { state };
        state.rules.on_sensor_value(&device_id, value, &exec).await;
    }

    let event = MqttTrafficEvent::new(&msg.topic, &payload);
    if let Ok(text) = serde_json::to_string(&event) {
        state.broadcast_text(&text);
    }
}

/// Strict float payload, else the JSON `$.value` number.
pub fn parse_sensor_value(payload: &str) -> Option<f64> {
    if let Some(value) = parse_f64_strict(payload) {
        return Some(value);
    }
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()?
        .get("value")?
        .as_f64()
}

/// Executes rule actions against the live wiring: actuator commands go
/// out over MQTT, log actions land in the gateway log file.
struct RuleActionExecutor<'a> {
    state: &'a Arc<AppState>,
}

#[async_trait]
impl ActionExecutor for RuleActionExecutor<'_> {
    async fn execute(&self, rule: &Rule, action: &Action) {
        match action {
            Action::ActuatorSet { actuator_id, value } => {
                let topic = {
                    let registry = self.state.registry.read().unwrap();
                    registry
                        .command_topic(actuator_id)
                        .unwrap_or_else(|| {
                            default_command_topic(&self.state.topic_prefix, actuator_id)
                        })
                };

                if let Some(mqtt) = &self.state.mqtt {
                    if mqtt.is_connected() {
                        if let Err(e) = mqtt
                            .publish(&topic, value, rumqttc::QoS::AtMostOnce, false)
                            .await
                        {
                            warn!(rule = %rule.id, topic = %topic, error = %e, "actuator publish failed");
                        }
                    }
                }
            }
            Action::Log { level, message } => {
                let level = Level::parse(level).unwrap_or(Level::Info);
                let message = if message.is_empty() {
                    format!("rule_fired: {}", rule.id)
                } else {
                    message.clone()
                };
                self.state.logger.log(level, "rule", &message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_value_strict_float() {
        assert_eq!(parse_sensor_value("21.5"), Some(21.5));
        assert_eq!(parse_sensor_value(" 30 \n"), Some(30.0));
        assert_eq!(parse_sensor_value("-4"), Some(-4.0));
    }

    #[test]
    fn test_parse_sensor_value_json_field() {
        assert_eq!(parse_sensor_value(r#"{"value": 26.1, "unit":"C"}"#), Some(26.1));
        assert_eq!(parse_sensor_value(r#"{"value": "26.1"}"#), None);
        assert_eq!(parse_sensor_value(r#"{"reading": 1}"#), None);
    }

    #[test]
    fn test_parse_sensor_value_garbage() {
        assert_eq!(parse_sensor_value("on"), None);
        assert_eq!(parse_sensor_value(""), None);
        assert_eq!(parse_sensor_value("21.5C"), None);
    }
}
