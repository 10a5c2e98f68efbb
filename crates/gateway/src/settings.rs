//! Resolution of runtime settings from the flat config map, including
//! the legacy key fallbacks (`listen.*`, `broker.*`, `client.*`,
//! `topics.prefix`) older deployments still carry.

use std::path::PathBuf;

use infrastructure::{ConfigMap, Level, MqttSettings};

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
    pub ws_path: String,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub http: HttpSettings,
    pub mqtt_enabled: bool,
    pub mqtt: MqttSettings,
    /// Explicit subscription, else `<prefix>#` when a prefix is set.
    pub sub_topic: Option<String>,
    pub topic_prefix: String,
    pub config_root: PathBuf,
    pub log_file: Option<String>,
    pub log_level: Option<Level>,
}

impl GatewaySettings {
    pub fn from_config(cfg: &ConfigMap) -> Self {
        let host = first_string(cfg, &["network.http_api.host", "listen.host"])
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = first_i64(cfg, &["network.http_api.port", "listen.port"]).unwrap_or(8000);
        let ws_path = first_string(cfg, &["network.websocket.path", "listen.path"])
            .unwrap_or_else(|| "/ws".to_string());

        let topic_prefix = first_string(cfg, &["mqtt.topic_prefix", "topics.prefix"])
            .unwrap_or_default();

        let mqtt = MqttSettings {
            host: first_string(cfg, &["mqtt.broker_host", "broker.host"])
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: first_i64(cfg, &["mqtt.broker_port", "broker.port"]).unwrap_or(1883) as u16,
            client_id: first_string(cfg, &["mqtt.client_id", "client.id"])
                .unwrap_or_else(|| "iotgw".to_string()),
            username: first_string(cfg, &["mqtt.username", "client.username"]),
            password: first_string(cfg, &["mqtt.password", "client.password"]),
            keepalive_sec: first_i64(cfg, &["mqtt.keepalive_sec", "client.keepalive_sec"])
                .unwrap_or(30) as u64,
            clean_session: first_bool(cfg, &["mqtt.clean_session", "client.clean_session"])
                .unwrap_or(true),
        };

        let sub_topic = cfg
            .get_string("mqtt.sub_topic")
            .filter(|s| !s.is_empty())
            .or_else(|| {
                if topic_prefix.is_empty() {
                    None
                } else {
                    Some(format!("{topic_prefix}#"))
                }
            });

        Self {
            http: HttpSettings {
                host,
                port: port as u16,
                ws_path: normalize_path(&ws_path),
            },
            mqtt_enabled: cfg.get_bool_or("mqtt.enabled", false),
            mqtt,
            sub_topic,
            topic_prefix,
            config_root: PathBuf::from(cfg.get_string_or("paths.config_root", "config")),
            log_file: cfg.get_string("paths.log_file").filter(|s| !s.is_empty()),
            log_level: cfg.get_string("logging.level").and_then(|s| Level::parse(&s)),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    pub fn sensors_file(&self) -> PathBuf {
        self.config_root.join("devices/sensors.yaml")
    }

    pub fn actuators_file(&self) -> PathBuf {
        self.config_root.join("devices/actuators.yaml")
    }

    pub fn automation_rules_file(&self) -> PathBuf {
        self.config_root.join("rules/automation-rules.yaml")
    }

    pub fn alarm_rules_file(&self) -> PathBuf {
        self.config_root.join("rules/alarm-rules.yaml")
    }
}

fn first_string(cfg: &ConfigMap, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| cfg.get_string(k).filter(|s| !s.is_empty()))
}

fn first_i64(cfg: &ConfigMap, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|k| cfg.get_i64(k))
}

fn first_bool(cfg: &ConfigMap, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| cfg.get_bool(k))
}

fn normalize_path(p: &str) -> String {
    if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_config() {
        let settings = GatewaySettings::from_config(&ConfigMap::new());

        assert_eq!(settings.listen_addr(), "0.0.0.0:8000");
        assert_eq!(settings.http.ws_path, "/ws");
        assert!(!settings.mqtt_enabled);
        assert_eq!(settings.mqtt.host, "127.0.0.1");
        assert_eq!(settings.mqtt.port, 1883);
        assert_eq!(settings.mqtt.keepalive_sec, 30);
        assert!(settings.mqtt.clean_session);
        assert!(settings.sub_topic.is_none());
        assert_eq!(settings.topic_prefix, "");
        assert_eq!(settings.config_root, PathBuf::from("config"));
    }

    #[test]
    fn test_modern_keys_win_over_legacy() {
        let mut cfg = ConfigMap::new();
        cfg.set("network.http_api.host", "10.0.0.1");
        cfg.set("network.http_api.port", "9000");
        cfg.set("listen.host", "ignored");
        cfg.set("listen.port", "1");
        cfg.set("mqtt.broker_host", "broker.example");
        cfg.set("broker.host", "legacy.example");

        let settings = GatewaySettings::from_config(&cfg);
        assert_eq!(settings.listen_addr(), "10.0.0.1:9000");
        assert_eq!(settings.mqtt.host, "broker.example");
    }

    #[test]
    fn test_legacy_keys_fill_gaps() {
        let mut cfg = ConfigMap::new();
        cfg.set("listen.host", "127.0.0.1");
        cfg.set("listen.port", "8080");
        cfg.set("listen.path", "feed");
        cfg.set("broker.host", "legacy.example");
        cfg.set("broker.port", "2883");
        cfg.set("client.id", "gw-7");
        cfg.set("client.keepalive_sec", "60");
        cfg.set("client.clean_session", "no");

        let settings = GatewaySettings::from_config(&cfg);
        assert_eq!(settings.listen_addr(), "127.0.0.1:8080");
        // relative WS paths are rooted
        assert_eq!(settings.http.ws_path, "/feed");
        assert_eq!(settings.mqtt.host, "legacy.example");
        assert_eq!(settings.mqtt.port, 2883);
        assert_eq!(settings.mqtt.client_id, "gw-7");
        assert_eq!(settings.mqtt.keepalive_sec, 60);
        assert!(!settings.mqtt.clean_session);
    }

    #[test]
    fn test_sub_topic_falls_back_to_prefix_wildcard() {
        let mut cfg = ConfigMap::new();
        cfg.set("topics.prefix", "site42/");
        let settings = GatewaySettings::from_config(&cfg);
        assert_eq!(settings.sub_topic.as_deref(), Some("site42/#"));

        cfg.set("mqtt.sub_topic", "site42/telemetry/#");
        let settings = GatewaySettings::from_config(&cfg);
        assert_eq!(settings.sub_topic.as_deref(), Some("site42/telemetry/#"));
    }

    #[test]
    fn test_log_overrides_surface_only_when_present() {
        let mut cfg = ConfigMap::new();
        assert!(GatewaySettings::from_config(&cfg).log_file.is_none());

        cfg.set("paths.log_file", "var/log/gw.log");
        cfg.set("logging.level", "warning");
        let settings = GatewaySettings::from_config(&cfg);
        assert_eq!(settings.log_file.as_deref(), Some("var/log/gw.log"));
        assert_eq!(settings.log_level, Some(Level::Warn));
    }
}
