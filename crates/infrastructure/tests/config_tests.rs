use std::io::Write;

use infrastructure::config::ConfigMap;

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_yaml_flattening_of_nested_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "flat.yaml",
        "a:\n  b:\n    - x\n    - y\n",
    );

    let mut cfg = ConfigMap::new();
    cfg.load_yaml_file(&path).unwrap();

    assert_eq!(cfg.len(), 2);
    assert_eq!(cfg.get_string("a.b[0]").as_deref(), Some("x"));
    assert_eq!(cfg.get_string("a.b[1]").as_deref(), Some("y"));
}

#[test]
fn test_yaml_sequence_of_sequences_nests_indices() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "nested.yaml", "a:\n  - - first\n    - second\n");

    let mut cfg = ConfigMap::new();
    cfg.load_yaml_file(&path).unwrap();

    assert_eq!(cfg.get_string("a[0][0]").as_deref(), Some("first"));
    assert_eq!(cfg.get_string("a[0][1]").as_deref(), Some("second"));
}

#[test]
fn test_yaml_scalars_keep_source_rendering() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "types.yaml",
        "mqtt:\n  enabled: true\n  broker_port: 1883\n  topic_prefix: site42/\n  comment: ~\n",
    );

    let mut cfg = ConfigMap::new();
    cfg.load_yaml_file(&path).unwrap();

    assert_eq!(cfg.get_string("mqtt.enabled").as_deref(), Some("true"));
    assert_eq!(cfg.get_bool("mqtt.enabled"), Some(true));
    assert_eq!(cfg.get_i64("mqtt.broker_port"), Some(1883));
    assert_eq!(cfg.get_string("mqtt.topic_prefix").as_deref(), Some("site42/"));
    // null is not a scalar entry
    assert!(!cfg.has("mqtt.comment"));
}

#[test]
fn test_yaml_device_array_projection() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "devices.yaml",
        "sensors:\n  - id: temp01\n    protocol: mqtt\n  - id: hum01\nactuators:\n  - id: fan01\n    protocol: mqtt\n",
    );

    let mut cfg = ConfigMap::new();
    cfg.load_yaml_file(&path).unwrap();

    assert_eq!(cfg.get_string("sensors[0].id").as_deref(), Some("temp01"));
    assert_eq!(cfg.get_string("sensors[0].protocol").as_deref(), Some("mqtt"));
    assert_eq!(cfg.get_string("sensors[1].id").as_deref(), Some("hum01"));
    assert_eq!(cfg.get_string("actuators[0].id").as_deref(), Some("fan01"));
}

#[test]
fn test_kv_file_comments_and_junk_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "gw.kv",
        "# full line comment\nlog_file = logs/iotgw.log # trailing comment\n  = missing key\nno equals here\nlog_level=debug\n",
    );

    let mut cfg = ConfigMap::new();
    cfg.load_kv_file(&path).unwrap();

    assert_eq!(cfg.len(), 2);
    assert_eq!(cfg.get_string("log_file").as_deref(), Some("logs/iotgw.log"));
    assert_eq!(cfg.get_string("log_level").as_deref(), Some("debug"));
}

#[test]
fn test_merge_is_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_file(&dir, "first.yaml", "listen:\n  port: 8000\n  host: 0.0.0.0\n");
    let second = write_file(&dir, "second.yaml", "listen:\n  port: 9000\n");

    let mut cfg = ConfigMap::new();
    cfg.load_yaml_file(&first).unwrap();
    cfg.load_yaml_file(&second).unwrap();

    assert_eq!(cfg.get_i64("listen.port"), Some(9000));
    assert_eq!(cfg.get_string("listen.host").as_deref(), Some("0.0.0.0"));
}

#[test]
fn test_load_reports_errors_instead_of_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = ConfigMap::new();

    assert!(cfg.load_yaml_file(dir.path().join("absent.yaml")).is_err());

    let bad = write_file(&dir, "bad.yaml", "a: [unclosed\n");
    assert!(cfg.load_yaml_file(&bad).is_err());
    assert!(cfg.is_empty());
}
