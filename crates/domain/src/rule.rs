use serde::{Deserialize, Serialize};

/// Condition over a single sensor value.
///
/// The operator is carried as written in the rule file and matched
/// case-insensitively; `=` and `==` both mean equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    pub sensor_id: String,
    pub op: String,
    pub value: f64,
}

impl Condition {
    /// Equality is exact IEEE-754 comparison on f64.
    pub fn matches(&self, value: f64) -> bool {
        match self.op.to_ascii_lowercase().as_str() {
            ">" => value > self.value,
            ">=" => value >= self.value,
            "<" => value < self.value,
            "<=" => value <= self.value,
            "==" | "=" => value == self.value,
            "!=" => value != self.value,
            _ => false,
        }
    }
}

/// Response operation of a rule. The action set is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Publish `value` to the actuator's command topic.
    ActuatorSet { actuator_id: String, value: String },
    /// Emit `message` to the gateway log at `level`.
    Log { level: String, message: String },
}

/// Declarative automation or alarm rule. Rules are evaluated in
/// insertion order; actions run in list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    /// "automation" or "alarm", set by the file the rule was loaded from.
    pub category: String,
    pub enabled: bool,
    pub when: Condition,
    pub then: Vec<Action>,
}
