use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.json";

/// Per-invocation client settings read from `config.json`. The file lives
/// next to the executable; the current directory is checked as a fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        let path = locate_config()
            .ok_or_else(|| Error::Config(format!("{CONFIG_FILE} not found in {}", search_dirs())))?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|err| Error::Config(format!("invalid {}: {err}", path.display())))
    }
}

fn locate_config() -> Option<PathBuf> {
    for dir in candidate_dirs() {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            dirs.push(dir.to_path_buf());
        }
    }
    if let Ok(cwd) = env::current_dir() {
        dirs.push(cwd);
    }
    dirs
}

fn search_dirs() -> String {
    let dirs: Vec<String> = candidate_dirs()
        .iter()
        .map(|d| d.display().to_string())
        .collect();
    dirs.join(" or ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_optional_fields() {
        let cfg: ClientConfig =
            serde_json::from_str(r#"{"base_url":"https://api.example.com","token":"t"}"#).unwrap();
        assert!(!cfg.read_only);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.timeout, 30);
    }

    #[test]
    fn read_only_and_retries_come_from_file() {
        let cfg: ClientConfig = serde_json::from_str(
            r#"{"base_url":"u","token":"t","read_only":true,"max_retries":1,"timeout":5}"#,
        )
        .unwrap();
        assert!(cfg.read_only);
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.timeout, 5);
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let path = std::env::temp_dir().join("singularity-config-test.json");
        fs::write(&path, r#"{"base_url":"u"}"#).unwrap();
        let err = ClientConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
        fs::remove_file(&path).ok();
    }
}
