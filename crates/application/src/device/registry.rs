//! In-memory device registry with topic reverse indexes.
//!
//! Devices arrive from bootstrap configuration and from on-the-fly MQTT
//! discovery; they are mutated by telemetry arrivals and never deleted
//! at runtime. All mutation funnels through `register` and the upsert
//! operations so the reverse indexes stay consistent with the devices
//! that own the topics.

use std::collections::HashMap;

use domain::{Device, DomainError};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    by_id: HashMap<String, Device>,
    tele_by_topic: HashMap<String, String>,
    cmd_by_topic: HashMap<String, String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a device. An existing device keeps its runtime
    /// `status`; its descriptive fields and topics are replaced. Reverse
    /// indexes gain entries for the new non-empty topics; entries for the
    /// previous topics are left in place (historical behavior).
    pub fn register(&mut self, device: Device) -> Result<(), DomainError> {
        if device.id.is_empty() {
            return Err(DomainError::InvalidDeviceId("empty id".to_string()));
        }
        let id = device.id.clone();

        match self.by_id.get_mut(&id) {
            Some(existing) => {
                existing.kind = device.kind;
                existing.transport = device.transport;
                existing.telemetry_topic = device.telemetry_topic;
                existing.command_topic = device.command_topic;
            }
            None => {
                self.by_id.insert(id.clone(), device);
            }
        }

        let stored = &self.by_id[&id];
        if !stored.telemetry_topic.is_empty() {
            self.tele_by_topic
                .insert(stored.telemetry_topic.clone(), id.clone());
        }
        if !stored.command_topic.is_empty() {
            self.cmd_by_topic
                .insert(stored.command_topic.clone(), id.clone());
        }
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Device> {
        self.by_id.get(id).cloned()
    }

    /// Snapshot sorted ascending by id for deterministic API output.
    pub fn list(&self) -> Vec<Device> {
        let mut out: Vec<Device> = self.by_id.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Mark the owning device of `topic` online and stamp its last-seen
    /// state. Returns the device id on an index hit.
    pub fn update_from_telemetry_topic(
        &mut self,
        topic: &str,
        payload: &str,
        now_ms: i64,
    ) -> Option<String> {
        let id = self.tele_by_topic.get(topic)?.clone();
        let device = self.by_id.get_mut(&id)?;
        device.status.online = true;
        device.status.last_seen_ms = now_ms;
        device.status.last_payload = payload.to_string();
        device.status.last_topic = topic.to_string();
        Some(id)
    }

    /// Resolve or discover the device behind an MQTT telemetry topic.
    ///
    /// On an index miss the id is guessed from the final `/` segment of
    /// the topic: an unknown id is inserted as a minimal
    /// `{kind:"unknown", transport:"mqtt"}` device, a known id has its
    /// telemetry topic moved (old reverse entry removed first). Either
    /// way the telemetry update then runs against the fresh index.
    pub fn upsert_mqtt_device_from_topic(
        &mut self,
        topic: &str,
        payload: &str,
        now_ms: i64,
    ) -> Option<String> {
        if let Some(id) = self.update_from_telemetry_topic(topic, payload, now_ms) {
            return Some(id);
        }

        let guessed_id = last_path_segment(topic)?;

        if !self.has(&guessed_id) {
            let device = Device::new(guessed_id.clone(), "unknown", "mqtt")
                .with_telemetry_topic(topic);
            self.register(device).ok()?;
        } else if let Some(device) = self.by_id.get_mut(&guessed_id) {
            if !device.telemetry_topic.is_empty() {
                self.tele_by_topic.remove(&device.telemetry_topic);
            }
            device.telemetry_topic = topic.to_string();
            self.tele_by_topic
                .insert(topic.to_string(), guessed_id.clone());
        }

        self.update_from_telemetry_topic(topic, payload, now_ms)
    }

    pub fn command_topic(&self, device_id: &str) -> Option<String> {
        self.by_id
            .get(device_id)
            .map(|d| d.command_topic.clone())
            .filter(|t| !t.is_empty())
    }

    pub fn telemetry_topic(&self, device_id: &str) -> Option<String> {
        self.by_id
            .get(device_id)
            .map(|d| d.telemetry_topic.clone())
            .filter(|t| !t.is_empty())
    }

    /// JSON array of all devices in id order, stable field order.
    pub fn to_json_list(&self) -> String {
        serde_json::to_string(&self.list()).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn to_json_one(&self, id: &str) -> Option<String> {
        let device = self.get(id)?;
        serde_json::to_string(&device).ok()
    }
}

/// Substring after the final `/`; empty when the topic ends in `/`.
fn last_path_segment(topic: &str) -> Option<String> {
    if topic.is_empty() {
        return None;
    }
    let segment = match topic.rfind('/') {
        Some(pos) => &topic[pos + 1..],
        None => topic,
    };
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}
