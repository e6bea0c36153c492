//! Configuration loading
//!
//! A missing or malformed config file never fails startup; it degrades to
//! defaults.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Roots scanned for ABI artifacts (foundry out/, hardhat artifacts/)
    #[serde(default)]
    pub abi_paths: Vec<String>,

    /// Override for the ABI cache database location
    #[serde(default)]
    pub cache_path: Option<String>,

    /// Default chain id for contract-scoped lookups
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// Skip remote lookups (OpenChain/Sourcify) entirely
    #[serde(default)]
    pub offline: bool,
}

impl Config {
    pub fn scan_roots(&self) -> Vec<PathBuf> {
        self.abi_paths.iter().map(PathBuf::from).collect()
    }

    pub fn cache_db_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Some(PathBuf::from(path));
        }
        abi_db_path()
    }
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    toml::from_str::<Config>(&content).unwrap_or_default()
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("ABIDEX_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("abidex").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("abidex").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "abidex", "abidex")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("abidex"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("abidex"));
    }
    directories::ProjectDirs::from("io", "abidex", "abidex")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

pub fn abi_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("abis.sqlite3"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_missing_fields() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.abi_paths.is_empty());
        assert!(config.cache_path.is_none());
        assert!(config.chain_id.is_none());
        assert!(!config.offline);
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            abi_paths = ["/tmp/project-a", "/tmp/project-b"]
            cache_path = "/tmp/abidex.sqlite3"
            chain_id = 10
            offline = true
            "#,
        )
        .unwrap();

        assert_eq!(config.scan_roots().len(), 2);
        assert_eq!(config.cache_db_path(), Some(PathBuf::from("/tmp/abidex.sqlite3")));
        assert_eq!(config.chain_id, Some(10));
        assert!(config.offline);
    }
}
