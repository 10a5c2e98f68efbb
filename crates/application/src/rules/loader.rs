//! Rule-file loader.
//!
//! Rule files are YAML read through the flat config projection, walking
//! `<category>_rules[i]` until the first index without an id. Individual
//! malformed entries are skipped field-wise; a missing or unparsable
//! file is an error the caller may ignore.

use std::path::Path;

use domain::{Action, Condition, Rule};
use infrastructure::config::{ConfigError, ConfigMap};
use tracing::debug;

/// Load `<category>_rules` from `path`, tagging each rule with the
/// category ("automation" or "alarm").
pub fn load_rules_from_file(path: impl AsRef<Path>, category: &str) -> Result<Vec<Rule>, ConfigError> {
    let mut cfg = ConfigMap::new();
    cfg.load_yaml_file(path)?;

    let key = format!("{category}_rules");
    let mut rules = Vec::new();

    for i in 0.. {
        let base = format!("{key}[{i}].");
        let Some(id) = cfg.get_string(&format!("{base}id")).filter(|s| !s.is_empty()) else {
            break;
        };

        let mut rule = Rule {
            id,
            category: category.to_string(),
            enabled: cfg.get_bool_or(&format!("{base}enabled"), true),
            when: Condition {
                sensor_id: cfg.get_string_or(&format!("{base}when.sensor_id"), ""),
                op: cfg.get_string_or(&format!("{base}when.op"), ""),
                value: 0.0,
            },
            then: Vec::new(),
        };
        if let Some(raw) = cfg.get_string(&format!("{base}when.value")) {
            if let Some(value) = parse_f64_strict(&raw) {
                rule.when.value = value;
            }
        }

        for j in 0.. {
            let abase = format!("{base}then[{j}].");
            let Some(kind) = cfg.get_string(&format!("{abase}type")).filter(|s| !s.is_empty())
            else {
                break;
            };
            let action = match kind.as_str() {
                "actuator_set" => Action::ActuatorSet {
                    actuator_id: cfg.get_string_or(&format!("{abase}actuator_id"), ""),
                    value: cfg.get_string_or(&format!("{abase}value"), ""),
                },
                "log" => Action::Log {
                    level: cfg.get_string_or(&format!("{abase}level"), ""),
                    message: cfg.get_string_or(&format!("{abase}message"), ""),
                },
                other => {
                    debug!(rule = %rule.id, action_type = %other, "skipping unknown action type");
                    continue;
                }
            };
            rule.then.push(action);
        }

        rules.push(rule);
    }

    Ok(rules)
}

/// Whole-string f64 parse, surrounding ASCII whitespace allowed.
pub fn parse_f64_strict(s: &str) -> Option<f64> {
    let trimmed = s.trim_matches([' ', '\t', '\r', '\n']);
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}
