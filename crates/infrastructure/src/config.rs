//! Flat dotted-key configuration map.
//!
//! YAML trees and `key=value` files are both projected onto a single
//! `key -> string` namespace: mapping members join with `.`, sequence
//! indices render as `name[i]`. Consumers index by canonical paths, so
//! the tree is intentionally never exposed.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Clone)]
pub struct ConfigMap {
    data: HashMap<String, String>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML file and merge its flattened scalars, last write wins.
    pub fn load_yaml_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let root: serde_yaml::Value = serde_yaml::from_str(&text)?;
        self.flatten_yaml(&root, "");
        Ok(())
    }

    /// Parse a `key=value` file. `#` starts a comment to end-of-line;
    /// lines without `=` or with an empty key are skipped; key and value
    /// are trimmed.
    pub fn load_kv_file(&mut self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path)?;
        for raw in text.lines() {
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let Some(eq) = line.find('=') else { continue };
            let key = line[..eq].trim();
            if key.is_empty() {
                continue;
            }
            let value = line[eq + 1..].trim();
            self.data.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|s| parse_i64_strict(s))
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(|s| parse_bool_token(s))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    fn flatten_yaml(&mut self, node: &serde_yaml::Value, prefix: &str) {
        use serde_yaml::Value;

        match node {
            Value::Null => {}
            Value::Bool(b) => {
                if !prefix.is_empty() {
                    self.data.insert(prefix.to_string(), b.to_string());
                }
            }
            Value::Number(n) => {
                if !prefix.is_empty() {
                    self.data.insert(prefix.to_string(), n.to_string());
                }
            }
            Value::String(s) => {
                if !prefix.is_empty() {
                    self.data.insert(prefix.to_string(), s.clone());
                }
            }
            Value::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.flatten_yaml(item, &format!("{prefix}[{i}]"));
                }
            }
            Value::Mapping(map) => {
                for (key, value) in map {
                    let Some(name) = scalar_key(key) else { continue };
                    let next = if prefix.is_empty() {
                        name
                    } else {
                        format!("{prefix}.{name}")
                    };
                    self.flatten_yaml(value, &next);
                }
            }
            Value::Tagged(tagged) => self.flatten_yaml(&tagged.value, prefix),
        }
    }
}

fn scalar_key(key: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Optional leading `-`, then at least one ASCII digit, nothing else.
pub fn parse_i64_strict(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = digits.parse::<i64>().ok()?;
    Some(if negative { -value } else { value })
}

/// Case-insensitive `1/true/yes/on` and `0/false/no/off`.
pub fn parse_bool_token(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn validate_required_keys(cfg: &ConfigMap, required_keys: &[&str]) -> Vec<String> {
    required_keys
        .iter()
        .filter(|k| !cfg.has(k))
        .map(|k| format!("missing config key: {k}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_i64_strict() {
        assert_eq!(parse_i64_strict("1883"), Some(1883));
        assert_eq!(parse_i64_strict("-42"), Some(-42));
        assert_eq!(parse_i64_strict(""), None);
        assert_eq!(parse_i64_strict("-"), None);
        assert_eq!(parse_i64_strict("0x10"), None);
        assert_eq!(parse_i64_strict("12 "), None);
        assert_eq!(parse_i64_strict("+7"), None);
    }

    #[test]
    fn test_parse_bool_token() {
        for t in ["1", "true", "YES", "On"] {
            assert_eq!(parse_bool_token(t), Some(true), "{t}");
        }
        for f in ["0", "false", "No", "OFF"] {
            assert_eq!(parse_bool_token(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool_token("enabled"), None);
        assert_eq!(parse_bool_token(""), None);
    }

    #[test]
    fn test_validate_required_keys() {
        let mut cfg = ConfigMap::new();
        cfg.set("mqtt.broker_host", "localhost");
        let errors = validate_required_keys(&cfg, &["mqtt.broker_host", "mqtt.broker_port"]);
        assert_eq!(errors, vec!["missing config key: mqtt.broker_port"]);
    }
}
