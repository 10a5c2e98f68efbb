use std::fs;
use std::path::PathBuf;

use infrastructure::update::{UpdateManager, UpdateOptions};

fn manager_in(dir: &tempfile::TempDir) -> UpdateManager {
    UpdateManager::new(UpdateOptions {
        state_dir: dir.path().join("data/update"),
        ..Default::default()
    })
}

#[test]
fn test_current_version_defaults_then_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);

    assert_eq!(mgr.current_version_or("unknown"), "0.0.0");

    mgr.set_current_version(" 1.2.3 \n").unwrap();
    assert_eq!(mgr.current_version_or("unknown"), "1.2.3");
    assert_eq!(
        fs::read_to_string(mgr.current_version_file()).unwrap(),
        "1.2.3"
    );
}

#[test]
fn test_is_update_available_gates_on_semver() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);
    mgr.set_current_version("1.2.3").unwrap();

    assert!(mgr.is_update_available("1.2.4"));
    assert!(mgr.is_update_available("2.0.0-alpha"));
    assert!(!mgr.is_update_available("1.2.3"));
    assert!(!mgr.is_update_available("not-a-version"));
}

#[test]
fn test_is_update_available_prerelease_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);
    mgr.set_current_version("2.0.0-alpha").unwrap();

    assert!(mgr.is_update_available("2.0.0"));
    assert!(mgr.is_update_available("2.0.0-alpha.1"));
    assert!(!mgr.is_update_available("1.9.9"));
}

#[test]
fn test_stage_and_apply_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);
    mgr.set_current_version("1.0.0").unwrap();

    let pkg = dir.path().join("fw.bin");
    fs::write(&pkg, b"payload").unwrap();

    mgr.stage_package(&pkg, "1.1.0", "", |_, _| true).unwrap();

    let staged = mgr.staged().expect("staged metadata present");
    assert_eq!(staged.version, "1.1.0");
    assert!(staged.package_path.ends_with("update_1.1.0.pkg"));
    assert!(staged.package_path.is_file());
    assert!(staged.staged_at_unix_ms > 0);

    let applied_paths: std::cell::RefCell<Vec<PathBuf>> = std::cell::RefCell::new(Vec::new());
    let applied = mgr
        .apply_staged(|p| {
            applied_paths.borrow_mut().push(p.to_path_buf());
            true
        })
        .unwrap();

    assert_eq!(applied, "1.1.0");
    assert_eq!(applied_paths.into_inner(), vec![staged.package_path.clone()]);
    assert_eq!(mgr.current_version_or("unknown"), "1.1.0");
    assert!(mgr.staged().is_none());

    let history: Vec<_> = fs::read_dir(mgr.history_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(
        history,
        vec![format!("applied_{}.kv", staged.staged_at_unix_ms)]
    );
}

#[test]
fn test_stage_rejects_checksum_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);

    let pkg = dir.path().join("fw.bin");
    fs::write(&pkg, b"payload").unwrap();

    let result = mgr.stage_package(&pkg, "1.1.0", "deadbeef", |_, _| false);
    assert!(result.is_err());
    assert!(mgr.staged().is_none());
}

#[test]
fn test_apply_without_staged_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);
    assert!(mgr.apply_staged(|_| true).is_err());
}

#[test]
fn test_staged_metadata_ignores_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = manager_in(&dir);
    fs::create_dir_all(mgr.state_dir()).unwrap();
    fs::write(
        mgr.staged_meta_file(),
        "version=2.0.0\npackage_path=/tmp/p.pkg\nsha256=\nstaged_at_unix_ms=1700000000000\nfuture_field=x\n",
    )
    .unwrap();

    let staged = mgr.staged().unwrap();
    assert_eq!(staged.version, "2.0.0");
    assert_eq!(staged.staged_at_unix_ms, 1_700_000_000_000);
    assert_eq!(staged.sha256_hex, "");
}
