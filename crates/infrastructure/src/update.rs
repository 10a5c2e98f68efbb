//! Staged-update state under `data/update/`.
//!
//! Layout: `current_version.txt` (sole source of the running version),
//! `staged.kv` (key=value metadata for a pending install),
//! `staging/*.pkg` and `history/applied_<staged_at_ms>.kv`. Every write
//! goes through a `.tmp` sibling followed by rename, with a
//! remove-then-rename fallback for platforms that refuse to overwrite.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use domain::SemVer;
use tracing::info;

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub state_dir: PathBuf,
    pub current_version_file: Option<PathBuf>,
    pub default_current_version: String,
    pub allow_non_semver: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("data/update"),
            current_version_file: None,
            default_current_version: "0.0.0".to_string(),
            allow_non_semver: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StagedUpdate {
    pub version: String,
    pub package_path: PathBuf,
    pub sha256_hex: String,
    pub staged_at_unix_ms: i64,
}

pub struct UpdateManager {
    opt: UpdateOptions,
}

impl UpdateManager {
    pub fn new(opt: UpdateOptions) -> Self {
        Self { opt }
    }

    pub fn state_dir(&self) -> &Path {
        &self.opt.state_dir
    }

    pub fn current_version_file(&self) -> PathBuf {
        self.opt
            .current_version_file
            .clone()
            .unwrap_or_else(|| self.opt.state_dir.join("current_version.txt"))
    }

    pub fn staged_meta_file(&self) -> PathBuf {
        self.opt.state_dir.join("staged.kv")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.opt.state_dir.join("staging")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.opt.state_dir.join("history")
    }

    pub fn current_version(&self) -> Option<String> {
        if let Some(v) = read_trimmed(&self.current_version_file()) {
            return Some(v);
        }
        if !self.opt.default_current_version.is_empty() {
            return Some(self.opt.default_current_version.clone());
        }
        None
    }

    pub fn current_version_or(&self, default: &str) -> String {
        self.current_version().unwrap_or_else(|| default.to_string())
    }

    pub fn set_current_version(&self, version: &str) -> Result<()> {
        write_text_file_atomic(&self.current_version_file(), version.trim())
    }

    /// A candidate is installable when it parses as a strictly newer
    /// SemVer; with `allow_non_semver`, any differing string qualifies.
    pub fn is_update_available(&self, candidate: &str) -> bool {
        let Some(current) = self.current_version() else {
            return true;
        };
        if let (Some(cur), Some(cand)) = (SemVer::parse(&current), SemVer::parse(candidate)) {
            return cur.compare(&cand) == std::cmp::Ordering::Less;
        }
        if self.opt.allow_non_semver {
            return candidate != current;
        }
        false
    }

    pub fn staged(&self) -> Option<StagedUpdate> {
        let meta = read_trimmed(&self.staged_meta_file())?;

        let mut staged = StagedUpdate::default();
        for line in meta.lines() {
            let line = line.trim();
            let Some(eq) = line.find('=') else { continue };
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();
            match key {
                "version" => staged.version = value.to_string(),
                "package_path" => staged.package_path = PathBuf::from(value),
                "sha256" => staged.sha256_hex = value.to_string(),
                "staged_at_unix_ms" => {
                    staged.staged_at_unix_ms = value.parse().unwrap_or_default();
                }
                _ => {}
            }
        }

        if staged.version.is_empty() || staged.package_path.as_os_str().is_empty() {
            return None;
        }
        Some(staged)
    }

    pub fn clear_staged(&self) -> Result<()> {
        remove_file_if_exists(&self.staged_meta_file())
    }

    /// Copy the package into the staging area and record its metadata.
    /// When a checksum is expected, `verify_sha256` must confirm it.
    pub fn stage_package(
        &self,
        package_path: &Path,
        target_version: &str,
        expected_sha256_hex: &str,
        verify_sha256: impl Fn(&Path, &str) -> bool,
    ) -> Result<()> {
        fs::create_dir_all(self.staging_dir())?;

        if !package_path.is_file() {
            bail!("package is not a regular file: {}", package_path.display());
        }
        if !expected_sha256_hex.is_empty() && !verify_sha256(package_path, expected_sha256_hex) {
            bail!("package checksum mismatch: {}", package_path.display());
        }

        let safe_version = sanitize_filename(target_version.trim());
        if safe_version.is_empty() {
            bail!("target version sanitizes to an empty file name");
        }
        let staged_pkg = self.staging_dir().join(format!("update_{safe_version}.pkg"));
        copy_file_atomic(package_path, &staged_pkg)?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let meta = format!(
            "version={}\npackage_path={}\nsha256={}\nstaged_at_unix_ms={}\n",
            target_version.trim(),
            staged_pkg.display(),
            expected_sha256_hex,
            now_ms
        );
        write_text_file_atomic(&self.staged_meta_file(), &meta)?;

        info!("update staged: {}", staged_pkg.display());
        Ok(())
    }

    /// Run `apply_fn` on the staged package, promote its version and move
    /// the metadata into history. Returns the applied version.
    pub fn apply_staged(&self, apply_fn: impl Fn(&Path) -> bool) -> Result<String> {
        let staged = self.staged().context("no staged update")?;
        if !staged.package_path.is_file() {
            bail!("staged package missing: {}", staged.package_path.display());
        }
        if !apply_fn(&staged.package_path) {
            bail!("apply hook rejected package");
        }

        self.set_current_version(&staged.version)?;

        fs::create_dir_all(self.history_dir())?;
        let history_meta = self
            .history_dir()
            .join(format!("applied_{}.kv", staged.staged_at_unix_ms));
        let meta = format!(
            "version={}\npackage_path={}\nsha256={}\napplied_at_unix_ms={}\n",
            staged.version,
            staged.package_path.display(),
            staged.sha256_hex,
            chrono::Utc::now().timestamp_millis()
        );
        let _ = write_text_file_atomic(&history_meta, &meta);
        let _ = self.clear_staged();

        info!("update applied: {}", staged.version);
        Ok(staged.version)
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `content` to a `.tmp` sibling, flush, then rename over `path`.
pub fn write_text_file_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = tmp_sibling(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
    }
    rename_with_fallback(&tmp, path)
}

fn copy_file_atomic(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_sibling(to);
    fs::copy(from, &tmp)
        .with_context(|| format!("copying {} to {}", from.display(), tmp.display()))?;
    rename_with_fallback(&tmp, to)
}

fn rename_with_fallback(tmp: &Path, path: &Path) -> Result<()> {
    if fs::rename(tmp, path).is_ok() {
        return Ok(());
    }
    remove_file_if_exists(path)?;
    if fs::rename(tmp, path).is_ok() {
        return Ok(());
    }
    let _ = remove_file_if_exists(tmp);
    bail!("failed to rename {} into place", path.display())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

fn sanitize_filename(s: &str) -> String {
    let mut out: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    while out.ends_with('.') || out.ends_with(' ') {
        out.pop();
    }
    out
}
