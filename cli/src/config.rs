//! TOML-plus-environment configuration loading for the CLI binary.
//!
//! Mirrors `hi-youichi-loom`'s `config` crate: a TOML file supplies an
//! `[env]` table of defaults, applied to the process environment only for
//! keys not already set there, so an operator's real environment always
//! wins. [`MissionConfig::from_env`](vantage_mission::MissionConfig::from_env)
//! and [`RoleTable::from_env`](vantage_dispatch::RoleTable::from_env) are the
//! actual consumers of those variables; this module only decides what lands
//! in the environment before they run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// Loads `path` (if it exists) and applies its `[env]` table to the process
/// environment, skipping any key the environment already defines.
///
/// Absence of the file is not an error — the CLI runs fine from environment
/// variables alone.
pub fn load_and_apply(path: &Path) -> Result<(), ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
    };
    let parsed: FileConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    for (key, value) in parsed.env {
        if std::env::var(&key).is_err() {
            // SAFETY: single-threaded at startup, before any task touches the environment.
            unsafe { std::env::set_var(key, value) };
        }
    }
    Ok(())
}

/// Default config file search path: `./vantage.toml`, falling back to
/// `$XDG_CONFIG_HOME/vantage/config.toml` (via `dirs::config_dir`).
#[must_use]
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from("vantage.toml");
    if local.exists() {
        return local;
    }
    dirs::config_dir().map_or(local, |dir| dir.join("vantage").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        assert!(load_and_apply(Path::new("/nonexistent/vantage-config-test.toml")).is_ok());
    }

    #[test]
    fn existing_env_var_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vantage.toml");
        std::fs::write(&path, "[env]\nVANTAGE_CONFIG_TEST_KEY = \"from_file\"\n").unwrap();

        unsafe { std::env::set_var("VANTAGE_CONFIG_TEST_KEY", "from_env") };
        load_and_apply(&path).unwrap();
        assert_eq!(std::env::var("VANTAGE_CONFIG_TEST_KEY").as_deref(), Ok("from_env"));
        unsafe { std::env::remove_var("VANTAGE_CONFIG_TEST_KEY") };
    }

    #[test]
    fn unset_env_var_is_filled_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vantage.toml");
        std::fs::write(&path, "[env]\nVANTAGE_CONFIG_TEST_KEY_2 = \"from_file\"\n").unwrap();

        unsafe { std::env::remove_var("VANTAGE_CONFIG_TEST_KEY_2") };
        load_and_apply(&path).unwrap();
        assert_eq!(std::env::var("VANTAGE_CONFIG_TEST_KEY_2").as_deref(), Ok("from_file"));
        unsafe { std::env::remove_var("VANTAGE_CONFIG_TEST_KEY_2") };
    }
}
