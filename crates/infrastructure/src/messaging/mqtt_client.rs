use anyhow::{Result, anyhow};
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task;
use tracing::{error, info, warn};

/// Broker session settings, resolved from the gateway configuration.
#[derive(Clone, Debug)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keepalive_sec: u64,
    pub clean_session: bool,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "iotgw".to_string(),
            username: None,
            password: None,
            keepalive_sec: 30,
            clean_session: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish seam used by HTTP handlers and the rule executor; tests
/// substitute a recording mock.
#[async_trait::async_trait]
pub trait MqttPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<()>;
    fn is_connected(&self) -> bool;
}

#[derive(Clone)]
pub struct MqttClient {
    client: AsyncClient,
    tx: broadcast::Sender<MqttMessage>,
    connected: Arc<AtomicBool>,
    // Only the most recently requested subscription survives a reconnect.
    pending_sub: Arc<Mutex<Option<(String, QoS)>>>,
}

impl MqttClient {
    pub async fn new(settings: &MqttSettings) -> Result<Self> {
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keepalive_sec));
        options.set_clean_session(settings.clean_session);
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);
        let (tx, _) = broadcast::channel(250);
        let tx_clone = tx.clone();
        let connected = Arc::new(AtomicBool::new(false));
        let connected_clone = connected.clone();

        let pending_sub: Arc<Mutex<Option<(String, QoS)>>> = Arc::new(Mutex::new(None));
        let pending_clone = pending_sub.clone();
        let client_clone = client.clone();

        // Spawn a task to handle the event loop
        task::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(notification) => match notification {
                        Event::Incoming(Packet::Publish(publish)) => {
                            let msg = MqttMessage {
                                topic: publish.topic,
                                payload: publish.payload.to_vec(),
                            };
                            // Send errors only mean no bridge is listening yet.
                            let _ = tx_clone.send(msg);
                        }
                        Event::Incoming(Packet::ConnAck(ack)) => {
                            if ack.code == ConnectReturnCode::Success {
                                info!("MQTT connected");
                                connected_clone.store(true, Ordering::Relaxed);

                                let pending = pending_clone.lock().unwrap().clone();
                                if let Some((topic, qos)) = pending {
                                    if let Err(e) = client_clone.subscribe(&topic, qos).await {
                                        error!("Failed to subscribe to {}: {}", topic, e);
                                    } else {
                                        info!("MQTT subscribed: {}", topic);
                                    }
                                }
                            } else {
                                error!("MQTT connack refused: {:?}", ack.code);
                                connected_clone.store(false, Ordering::Relaxed);
                            }
                        }
                        Event::Outgoing(rumqttc::Outgoing::Disconnect) => {
                            warn!("MQTT session closing");
                            connected_clone.store(false, Ordering::Relaxed);
                        }
                        _ => {}
                    },
                    Err(e) => {
                        error!("MQTT connection error: {:?}", e);
                        connected_clone.store(false, Ordering::Relaxed);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            tx,
            connected,
            pending_sub,
        })
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<MqttMessage> {
        self.tx.subscribe()
    }

    /// Remember `topic` as the pending subscription (replacing any
    /// previous one) and subscribe immediately when the session is open.
    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        if topic.is_empty() {
            return Err(anyhow!("empty subscription topic"));
        }
        *self.pending_sub.lock().unwrap() = Some((topic.to_string(), qos));

        if !self.is_connected() {
            return Ok(());
        }
        self.client
            .subscribe(topic, qos)
            .await
            .map_err(|e| anyhow!("Failed to subscribe to topic {}: {}", topic, e))?;
        info!("MQTT subscribed: {}", topic);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MqttPublisher for MqttClient {
    /// Fails closed while the session is down; there is no publish queue.
    async fn publish(&self, topic: &str, payload: &str, qos: QoS, retain: bool) -> Result<()> {
        if topic.is_empty() {
            return Err(anyhow!("empty publish topic"));
        }
        if !self.is_connected() {
            return Err(anyhow!("mqtt not connected"));
        }
        self.client
            .publish(topic, qos, retain, payload.as_bytes())
            .await
            .map_err(|e| anyhow!("Failed to publish MQTT message: {}", e))?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
