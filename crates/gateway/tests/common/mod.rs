#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use gateway::state::AppState;
use infrastructure::{FileLogger, MqttPublisher};
use rumqttc::QoS;

/// Recording stand-in for the MQTT session.
pub struct MockPublisher {
    connected: AtomicBool,
    pub published: std::sync::Mutex<Vec<PublishedMessage>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

impl MockPublisher {
    pub fn new(connected: bool) -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(connected),
            published: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MqttPublisher for MockPublisher {
    async fn publish(&self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<()> {
        if !self.is_connected() {
            return Err(anyhow!("mqtt not connected"));
        }
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos: qos as u8,
            retain,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Gateway state wired against the mock publisher and a temp directory
/// for the log and rule files.
pub struct TestContext {
    pub state: Arc<AppState>,
    pub publisher: Arc<MockPublisher>,
    pub dir: tempfile::TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    pub fn with_prefix(topic_prefix: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let publisher = MockPublisher::new(true);
        let logger = Arc::new(FileLogger::new(dir.path().join("iotgw.log")));
        logger.set_level(infrastructure::Level::Trace);

        let state = Arc::new(AppState::new(
            Some(publisher.clone()),
            logger,
            "1.2.3".to_string(),
            topic_prefix.to_string(),
            dir.path().join("automation-rules.yaml"),
            dir.path().join("alarm-rules.yaml"),
        ));

        Self {
            state,
            publisher,
            dir,
        }
    }

    pub fn log_contents(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("iotgw.log")).unwrap_or_default()
    }
}
