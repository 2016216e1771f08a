//! Engine configuration, usually stored as `taskchain.toml`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::types::Status;

/// Engine configuration (TOML).
///
/// Missing fields default to values that only halt on failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Statuses that make a strict invocation return its fault.
    pub task_halt: Vec<Status>,

    /// Member statuses that stop a batch and are thrown into its result.
    pub batch_halt: Vec<Status>,

    /// Locale name handed to an external translator.
    pub locale: String,

    /// Install the tracing result logger.
    pub log_results: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            task_halt: vec![Status::Failed],
            batch_halt: vec![Status::Failed],
            locale: "en".to_string(),
            log_results: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.task_halt.contains(&Status::Success) {
            return Err(anyhow!("task_halt cannot contain success"));
        }
        if self.batch_halt.contains(&Status::Success) {
            return Err(anyhow!("batch_halt cannot contain success"));
        }
        if self.locale.trim().is_empty() {
            return Err(anyhow!("locale must be non-empty"));
        }
        Ok(())
    }

    pub fn halts_task(&self, status: Status) -> bool {
        self.task_halt.contains(&status)
    }

    pub fn halts_batch(&self, status: Status) -> bool {
        self.batch_halt.contains(&status)
    }

    /// Parse and validate TOML. `origin` names the source in errors.
    pub fn from_toml(contents: &str, origin: &str) -> Result<Self> {
        let cfg: EngineConfig =
            toml::from_str(contents).with_context(|| format!("parse engine config {origin}"))?;
        cfg.validate()
            .with_context(|| format!("invalid engine config {origin}"))?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> Result<String> {
        self.validate()?;
        let mut text = toml::to_string_pretty(self).context("serialize engine config")?;
        text.push('\n');
        Ok(text)
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                debug!(path = %path.display(), "loading engine config");
                Self::from_toml(&contents, &path.display().to_string())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("read engine config {}", path.display())),
        }
    }

    /// Write to `path` through a uniquely named sibling, then rename over
    /// the target so readers never see a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_toml()?;
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("create config directory {}", dir.display()))?;

        let staging = dir.join(format!(".taskchain-{}.toml", Uuid::new_v4()));
        if let Err(err) = fs::write(&staging, text) {
            return Err(err).with_context(|| format!("stage engine config {}", staging.display()));
        }
        if let Err(err) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(err).with_context(|| format!("install engine config {}", path.display()));
        }
        debug!(path = %path.display(), "saved engine config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = EngineConfig::load(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("taskchain.toml");
        let cfg = EngineConfig {
            task_halt: vec![Status::Skipped, Status::Failed],
            locale: "fr".to_string(),
            ..EngineConfig::default()
        };
        cfg.save(&path).expect("save");
        assert_eq!(EngineConfig::load(&path).expect("load"), cfg);

        let leftovers: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name() != "taskchain.toml")
            .collect();
        assert!(leftovers.is_empty(), "staging file left behind");
    }

    #[test]
    fn save_rejects_invalid_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("taskchain.toml");
        let cfg = EngineConfig {
            locale: " ".to_string(),
            ..EngineConfig::default()
        };
        assert!(cfg.save(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let cfg = EngineConfig::from_toml("batch_halt = [\"skipped\", \"failed\"]\n", "inline").expect("parse");
        assert_eq!(cfg.batch_halt, vec![Status::Skipped, Status::Failed]);
        assert_eq!(cfg.task_halt, vec![Status::Failed]);
        assert!(cfg.log_results);
    }

    #[test]
    fn success_cannot_halt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("taskchain.toml");
        fs::write(&path, "task_halt = [\"success\"]\n").expect("write");
        let err = EngineConfig::load(&path).expect_err("invalid");
        assert!(err.to_string().starts_with("invalid engine config"));
        assert!(format!("{err:#}").contains("task_halt cannot contain success"));
    }

    #[test]
    fn unknown_status_is_a_parse_error() {
        let err = EngineConfig::from_toml("task_halt = [\"exploded\"]\n", "inline").expect_err("invalid");
        assert_eq!(err.to_string(), "parse engine config inline");
    }
}
