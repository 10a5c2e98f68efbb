//! REST surface of the gateway.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use application::device::default_command_topic;
use application::rules::loader::load_rules_from_file;

use crate::state::AppState;

pub fn create_router(state: Arc<AppState>, ws_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/version", get(version))
        .route("/api/devices", get(list_devices))
        .route("/api/devices/{id}", get(get_device))
        .route("/api/rules", get(list_rules))
        .route("/api/rules/reload", post(reload_rules))
        .route("/api/rules/{id}/enable", post(enable_rule))
        .route("/api/rules/{id}/disable", post(disable_rule))
        .route("/api/actuators/{id}/set", post(set_actuator))
        .route(ws_path, get(crate::ws::ws_handler))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "version": state.version }))
}

async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let devices = state.registry.read().unwrap().list();
    Json(devices)
}

async fn get_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.registry.read().unwrap().get(&id) {
        Some(device) => (StatusCode::OK, Json(device)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "device_not_found" })),
        )
            .into_response(),
    }
}

/// Flat rule summary in engine order.
#[derive(serde::Serialize)]
struct RuleSummary {
    id: String,
    category: String,
    enabled: bool,
    sensor_id: String,
    op: String,
    value: f64,
}

async fn list_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rules = state.rules.rules().await;
    let summaries: Vec<RuleSummary> = rules
        .into_iter()
        .map(|r| RuleSummary {
            id: r.id,
            category: r.category,
            enabled: r.enabled,
            sensor_id: r.when.sensor_id,
            op: r.when.op,
            value: r.when.value,
        })
        .collect();
    Json(summaries)
}

async fn reload_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut rules = Vec::new();
    match load_rules_from_file(&state.automation_rules_file, "automation") {
        Ok(mut loaded) => rules.append(&mut loaded),
        Err(e) => debug!(error = %e, "automation rules not reloaded"),
    }
    match load_rules_from_file(&state.alarm_rules_file, "alarm") {
        Ok(mut loaded) => rules.append(&mut loaded),
        Err(e) => debug!(error = %e, "alarm rules not reloaded"),
    }
    state.rules.replace(rules).await;
    Json(json!({ "ok": true }))
}

async fn enable_rule(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    toggle_rule(&state, &id, true).await
}

async fn disable_rule(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    toggle_rule(&state, &id, false).await
}

async fn toggle_rule(state: &AppState, id: &str, enabled: bool) -> axum::response::Response {
    let ok = !id.is_empty() && state.rules.set_enabled(id, enabled).await;
    let status = if ok { StatusCode::OK } else { StatusCode::NOT_FOUND };
    (status, Json(json!({ "ok": ok }))).into_response()
}

async fn set_actuator(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    if id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing_id" }))).into_response();
    }

    let value = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| coerce_value(v.get("value")));
    let Some(value) = value else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing_value" })),
        )
            .into_response();
    };

    let cmd_topic = state
        .registry
        .read()
        .unwrap()
        .command_topic(&id)
        .unwrap_or_else(|| default_command_topic(&state.topic_prefix, &id));

    let mut ok = false;
    if let Some(mqtt) = &state.mqtt {
        if mqtt.is_connected() {
            ok = mqtt
                .publish(&cmd_topic, &value, rumqttc::QoS::AtMostOnce, false)
                .await
                .is_ok();
        }
    }

    let status = if ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "ok": ok }))).into_response()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not_found" })))
}

/// Body `value` field: numbers are rendered through [`format_number`],
/// strings pass through unchanged.
fn coerce_value(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64().map(format_number),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Integer string when within 1e-9 of an integer, else a minimal decimal
/// with trailing zeros and a trailing dot stripped.
pub fn format_number(v: f64) -> String {
    let rounded = v.round();
    if (v - rounded).abs() < 1e-9 {
        return format!("{}", rounded as i64);
    }
    let mut s = format!("{v:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s.is_empty() { "0".to_string() } else { s }
}
