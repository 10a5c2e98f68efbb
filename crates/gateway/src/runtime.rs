//! Gateway runtime: startup sequence, service wiring, main loop.

use std::sync::Arc;
use std::time::Duration;

use application::device::bootstrap::register_configured_devices;
use application::rules::loader::load_rules_from_file;
use infrastructure::config::validate_required_keys;
use infrastructure::{ConfigMap, FileLogger, Level, MqttClient, MqttPublisher, UpdateManager, UpdateOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api;
use crate::bridge;
use crate::settings::GatewaySettings;
use crate::state::AppState;

/// Parsed command line, defaults already applied.
#[derive(Debug, Clone)]
pub struct GatewayArgs {
    pub config_yaml: String,
    pub log_file: String,
    pub log_level: String,
    pub print_version: bool,
    pub set_version: Option<String>,
}

/// Run the gateway to completion. Returns the process exit code: 0 on a
/// clean shutdown or version query, 2 when `--set-version` fails.
/// Startup failures of individual services are logged and survived.
pub async fn run(args: GatewayArgs) -> i32 {
    // 1. Shutdown flag: signals cancel the token, the main loop observes it
    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    // 2. Root configuration; it may override the CLI log defaults
    let mut cfg = ConfigMap::new();
    if let Err(e) = cfg.load_yaml_file(&args.config_yaml) {
        warn!(path = %args.config_yaml, error = %e, "root config not loaded");
    }
    let settings = GatewaySettings::from_config(&cfg);

    // 3. File logger
    let log_file = settings.log_file.clone().unwrap_or_else(|| args.log_file.clone());
    if let Some(parent) = std::path::Path::new(&log_file).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    let logger = Arc::new(FileLogger::new(&log_file));
    if let Some(level) = settings.log_level.or_else(|| Level::parse(&args.log_level)) {
        logger.set_level(level);
    }

    // 4. Version state; --set-version / --print-version short-circuit
    let update_mgr = UpdateManager::new(UpdateOptions::default());
    if let Some(version) = &args.set_version {
        if let Err(e) = update_mgr.set_current_version(version) {
            eprintln!("failed to set version: {e}");
            return 2;
        }
        if !args.print_version {
            return 0;
        }
    }
    if args.print_version {
        println!("{}", update_mgr.current_version_or("unknown"));
        return 0;
    }

    let version = update_mgr.current_version_or("unknown");
    logger.log(Level::Info, "", "iotgw starting");
    logger.log(Level::Info, "", &format!("log_file={log_file}"));
    logger.log(Level::Info, "", &format!("current_version={version}"));
    info!(version = %version, listen = %settings.listen_addr(), "gateway starting");

    // 5. MQTT session (optional); the attempt is non-blocking, the
    //    session opens in the background
    let mqtt_client = if settings.mqtt_enabled {
        if !cfg.has("broker.host") {
            for missing in validate_required_keys(&cfg, &["mqtt.broker_host"]) {
                logger.log(Level::Warn, "config", &missing);
            }
        }
        match MqttClient::new(&settings.mqtt).await {
            Ok(client) => {
                if let Some(topic) = &settings.sub_topic {
                    if let Err(e) = client.subscribe(topic, rumqttc::QoS::AtMostOnce).await {
                        warn!(topic = %topic, error = %e, "initial subscribe failed");
                    }
                }
                Some(client)
            }
            Err(e) => {
                logger.log(Level::Error, "mqtt", &format!("connect failed: {e}"));
                error!(error = %e, "mqtt connect failed");
                None
            }
        }
    } else {
        None
    };

    // 6. Shared state for the handlers and the bridge
    let state = Arc::new(AppState::new(
        mqtt_client
            .clone()
            .map(|c| Arc::new(c) as Arc<dyn MqttPublisher>),
        logger.clone(),
        version,
        settings.topic_prefix.clone(),
        settings.automation_rules_file(),
        settings.alarm_rules_file(),
    ));

    // 7. Web server; a failed bind is logged and the process stays up
    let router = api::create_router(state.clone(), &settings.http.ws_path);
    match tokio::net::TcpListener::bind(settings.listen_addr()).await {
        Ok(listener) => {
            info!(addr = %settings.listen_addr(), ws_path = %settings.http.ws_path, "web server listening");
            let server_shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router)
                    .with_graceful_shutdown(server_shutdown.cancelled_owned())
                    .await
                {
                    error!(error = %e, "web server stopped");
                }
            });
        }
        Err(e) => {
            logger.log(
                Level::Error,
                "web",
                &format!("failed to listen on {}: {e}", settings.listen_addr()),
            );
            error!(addr = %settings.listen_addr(), error = %e, "web listen failed");
        }
    }

    // 8. Bootstrap devices from the auxiliary config files
    let mut device_cfg = ConfigMap::new();
    for path in [settings.sensors_file(), settings.actuators_file()] {
        if let Err(e) = device_cfg.load_yaml_file(&path) {
            debug!(path = %path.display(), error = %e, "device config not loaded");
        }
    }
    let registered = {
        let mut registry = state.registry.write().unwrap();
        register_configured_devices(&device_cfg, &settings.topic_prefix, &mut registry)
    };
    info!(count = registered, "devices registered from config");

    // 9. Rule base
    let mut rules = Vec::new();
    for (path, category) in [
        (settings.automation_rules_file(), "automation"),
        (settings.alarm_rules_file(), "alarm"),
    ] {
        match load_rules_from_file(&path, category) {
            Ok(mut loaded) => rules.append(&mut loaded),
            Err(e) => debug!(path = %path.display(), error = %e, "rule file not loaded"),
        }
    }
    info!(count = rules.len(), "rules loaded");
    state.rules.replace(rules).await;

    // 10. Bridge inbound MQTT into the message policy
    if let Some(client) = &mqtt_client {
        let rx = client.subscribe_messages();
        tokio::spawn(bridge::run(state.clone(), rx));
    }

    // 11. Main loop: heartbeat until shutdown
    let mut heartbeat = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = heartbeat.tick() => {
                logger.log(Level::Debug, "", "heartbeat");
                logger.flush();
            }
        }
    }

    logger.log(Level::Info, "", "iotgw stopping");
    logger.flush();
    info!("gateway stopped");
    0
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(_) => std::future::pending().await,
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }
        info!("shutdown signal received");
        shutdown.cancel();
    });
}
