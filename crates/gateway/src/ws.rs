//! WebSocket hub: every peer receives the broadcast feed; inbound text
//! frames are publish requests.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::state::AppState;

/// Live MQTT traffic pushed to every dashboard.
#[derive(Serialize)]
pub struct MqttTrafficEvent<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub topic: &'a str,
    pub payload: &'a str,
}

impl<'a> MqttTrafficEvent<'a> {
    pub fn new(topic: &'a str, payload: &'a str) -> Self {
        Self {
            kind: "mqtt_msg",
            topic,
            payload,
        }
    }
}

#[derive(Serialize)]
struct PubAck {
    #[serde(rename = "type")]
    kind: &'static str,
    ok: bool,
}

#[derive(Serialize)]
struct WsError {
    #[serde(rename = "type")]
    kind: &'static str,
    error: &'static str,
}

fn pub_ack(ok: bool) -> String {
    serde_json::to_string(&PubAck { kind: "mqtt_pub_ack", ok }).unwrap_or_default()
}

fn ws_error(error: &'static str) -> String {
    serde_json::to_string(&WsError { kind: "error", error }).unwrap_or_default()
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| peer_loop(socket, state))
}

/// One task per peer: forwards the broadcast feed and answers inbound
/// publish frames on the same socket.
async fn peer_loop(mut socket: WebSocket, state: Arc<AppState>) {
    let mut feed = state.ws_tx.subscribe();
    debug!("websocket peer connected");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_frame(&state, text.as_str()).await;
                        if socket.send(Message::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            outbound = feed.recv() => {
                match outbound {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "websocket peer lagged behind the feed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("websocket peer disconnected");
}

/// `{topic, payload?}` frames publish to MQTT (QoS 0, retain false).
pub async fn handle_text_frame(state: &AppState, text: &str) -> String {
    let Ok(frame) = serde_json::from_str::<serde_json::Value>(text) else {
        return ws_error("missing_topic");
    };
    let Some(topic) = frame
        .get("topic")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
    else {
        return ws_error("missing_topic");
    };

    let payload = match frame.get("payload") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let Some(mqtt) = &state.mqtt else {
        return ws_error("mqtt_not_connected");
    };
    if !mqtt.is_connected() {
        return ws_error("mqtt_not_connected");
    }

    let ok = mqtt
        .publish(topic, &payload, rumqttc::QoS::AtMostOnce, false)
        .await
        .is_ok();
    pub_ack(ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traffic_event_shape() {
        let event = MqttTrafficEvent::new("sensors/temp01", "21.5");
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"mqtt_msg","topic":"sensors/temp01","payload":"21.5"}"#
        );
    }

    #[test]
    fn test_reply_shapes() {
        assert_eq!(pub_ack(true), r#"{"type":"mqtt_pub_ack","ok":true}"#);
        assert_eq!(
            ws_error("missing_topic"),
            r#"{"type":"error","error":"missing_topic"}"#
        );
    }
}
