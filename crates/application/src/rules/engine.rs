//! Reactive rule engine.
//!
//! Rules live in insertion order; evaluation walks them in that order on
//! every sensor value and runs all actions of a matching rule before
//! moving to the next one.

use domain::Rule;
use tokio::sync::Mutex;
use tracing::info;

use super::executor::ActionExecutor;

#[derive(Default)]
pub struct RuleEngine {
    rules: Mutex<Vec<Rule>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clear(&self) {
        self.rules.lock().await.clear();
    }

    /// Append, keeping insertion order as evaluation order.
    pub async fn add_rules(&self, rules: Vec<Rule>) {
        self.rules.lock().await.extend(rules);
    }

    /// Swap the whole rule base in one step (the reload path).
    pub async fn replace(&self, rules: Vec<Rule>) {
        let count = rules.len();
        *self.rules.lock().await = rules;
        info!(count, "rule base replaced");
    }

    /// Snapshot in evaluation order.
    pub async fn rules(&self) -> Vec<Rule> {
        self.rules.lock().await.clone()
    }

    /// Toggle the first rule with `rule_id`; reports whether one was found.
    pub async fn set_enabled(&self, rule_id: &str, enabled: bool) -> bool {
        let mut rules = self.rules.lock().await;
        match rules.iter_mut().find(|r| r.id == rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub async fn has_rule(&self, rule_id: &str) -> bool {
        self.rules.lock().await.iter().any(|r| r.id == rule_id)
    }

    /// Evaluate `value` for `sensor_id` against every enabled rule, in
    /// order, dispatching each action of a matching rule through `exec`
    /// before the next rule is considered.
    pub async fn on_sensor_value(&self, sensor_id: &str, value: f64, exec: &dyn ActionExecutor) {
        let rules = self.rules.lock().await;
        for rule in rules.iter() {
            if !rule.enabled || rule.when.sensor_id != sensor_id {
                continue;
            }
            if !rule.when.matches(value) {
                continue;
            }
            for action in &rule.then {
                exec.execute(rule, action).await;
            }
        }
    }
}
