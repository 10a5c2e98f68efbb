use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use application::{DeviceRegistry, RuleEngine};
use infrastructure::{FileLogger, MqttPublisher};
use tokio::sync::broadcast;

/// Shared gateway state behind the HTTP/WS handlers and the MQTT bridge.
///
/// The registry lock only ever guards short synchronous sections; the
/// single bridge task is the only telemetry-path writer.
pub struct AppState {
    pub registry: RwLock<DeviceRegistry>,
    pub rules: RuleEngine,
    pub mqtt: Option<Arc<dyn MqttPublisher>>,
    pub ws_tx: broadcast::Sender<String>,
    pub logger: Arc<FileLogger>,
    pub version: String,
    pub topic_prefix: String,
    pub automation_rules_file: PathBuf,
    pub alarm_rules_file: PathBuf,
}

impl AppState {
    pub fn new(
        mqtt: Option<Arc<dyn MqttPublisher>>,
        logger: Arc<FileLogger>,
        version: String,
        topic_prefix: String,
        automation_rules_file: PathBuf,
        alarm_rules_file: PathBuf,
    ) -> Self {
        let (ws_tx, _) = broadcast::channel(100);
        Self {
            registry: RwLock::new(DeviceRegistry::new()),
            rules: RuleEngine::new(),
            mqtt,
            ws_tx,
            logger,
            version,
            topic_prefix,
            automation_rules_file,
            alarm_rules_file,
        }
    }

    /// Send a text frame to every live WebSocket peer.
    pub fn broadcast_text(&self, text: &str) {
        let _ = self.ws_tx.send(text.to_string());
    }
}
