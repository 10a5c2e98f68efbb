use async_trait::async_trait;
use domain::{Action, Rule};
use tracing::info;

/// Runs the actions of a fired rule. The engine itself performs no
/// actions; the executor decides what `actuator_set` and `log` mean in
/// the current wiring.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, rule: &Rule, action: &Action);
}

/// Default executor that only traces what would happen.
pub struct LoggingActionExecutor;

#[async_trait]
impl ActionExecutor for LoggingActionExecutor {
    async fn execute(&self, rule: &Rule, action: &Action) {
        match action {
            Action::ActuatorSet { actuator_id, value } => {
                info!(rule = %rule.id, actuator = %actuator_id, value = %value, "actuator_set action");
            }
            Action::Log { level, message } => {
                info!(rule = %rule.id, level = %level, message = %message, "log action");
            }
        }
    }
}
