use std::path::{Path, PathBuf};

use anyhow::Context;
use scene_core::{UserId, CALLBACK_DATA_LIMIT};
use serde::{Deserialize, Serialize};
use tracing::warn;

const CONFIG_FILE_PATH: &str = "scene-console.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Directory of the JSON scene records.
    pub data_dir: PathBuf,
    /// User simulated at startup.
    pub user_id: UserId,
    pub callback_limit: usize,
    /// Users that get the admin button on every page.
    pub admin_ids: Vec<UserId>,
    /// Print the raw callback data next to each button.
    pub show_callbacks: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("scene-data"),
            user_id: 1,
            callback_limit: CALLBACK_DATA_LIMIT,
            admin_ids: Vec::new(),
            show_callbacks: false,
        }
    }
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Comma separated ids; entries that are not numbers are skipped.
fn parse_id_list(value: &str) -> Vec<UserId> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("ignoring invalid user id {:?}", part);
                None
            }
        })
        .collect()
}

impl ConsoleConfig {
    /// Load from `path`, or from `scene-console.toml` when present, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_PATH).exists() => {
                Self::from_file(Path::new(CONFIG_FILE_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SCENE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(user) = lookup("SCENE_USER_ID") {
            match user.trim().parse() {
                Ok(user) => self.user_id = user,
                Err(_) => warn!("ignoring invalid SCENE_USER_ID {:?}", user),
            }
        }
        if let Some(limit) = lookup("SCENE_CALLBACK_LIMIT") {
            match limit.trim().parse() {
                Ok(limit) => self.callback_limit = limit,
                Err(_) => warn!("ignoring invalid SCENE_CALLBACK_LIMIT {:?}", limit),
            }
        }
        if let Some(ids) = lookup("ADMIN_IDS") {
            self.admin_ids = parse_id_list(&ids);
        }
        if let Some(show) = lookup("SCENE_SHOW_CALLBACKS") {
            self.show_callbacks = parse_bool_env(&show);
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_bool_env_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
        for value in ["0", "false", "off", ""] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn parses_id_lists() {
        assert_eq!(parse_id_list("1, 2,,x, 30"), vec![1, 2, 30]);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = ConsoleConfig::default();
        config.apply_env(env(&[
            ("SCENE_DATA_DIR", "/tmp/scenes"),
            ("SCENE_USER_ID", "42"),
            ("SCENE_CALLBACK_LIMIT", "128"),
            ("ADMIN_IDS", "42,7"),
            ("SCENE_SHOW_CALLBACKS", "yes"),
        ]));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/scenes"));
        assert_eq!(config.user_id, 42);
        assert_eq!(config.callback_limit, 128);
        assert!(config.is_admin(7));
        assert!(!config.is_admin(1));
        assert!(config.show_callbacks);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = ConsoleConfig::default();
        config.apply_env(env(&[("SCENE_USER_ID", "abc"), ("SCENE_CALLBACK_LIMIT", "-1")]));
        assert_eq!(config, ConsoleConfig::default());
    }

    #[test]
    fn reads_partial_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("console.toml");
        std::fs::write(&path, "user_id = 5\nadmin_ids = [5]\n").unwrap();

        let config = ConsoleConfig::from_file(&path).unwrap();
        assert_eq!(config.user_id, 5);
        assert_eq!(config.admin_ids, vec![5]);
        assert_eq!(config.callback_limit, CALLBACK_DATA_LIMIT);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ConsoleConfig::from_file(&dir.path().join("absent.toml")).is_err());
    }
}
