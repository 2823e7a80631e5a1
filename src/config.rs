use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const GITHUB_TOKEN: &str = "GitProviders:GitHub:Token";
pub const GITHUB_BASE_URL: &str = "GitProviders:GitHub:BaseUrl";
pub const GITHUB_STRICT_SCHEMA: &str = "GitProviders:GitHub:StrictResponseSchema";
pub const BITBUCKET_USERNAME: &str = "GitProviders:Bitbucket:Username";
pub const BITBUCKET_APP_PASSWORD: &str = "GitProviders:Bitbucket:AppPassword";
pub const BITBUCKET_BASE_URL: &str = "GitProviders:Bitbucket:BaseUrl";

/// Only environment variables under this prefix are folded into the config.
const ENV_PREFIX: &str = "GitProviders__";

/// Key-value configuration queried by colon-separated keys such as
/// `GitProviders:GitHub:Token`. Returns `None` when the key is unset.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Value parsed as a boolean flag; anything other than `true`/`1` is false.
    fn flag(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false)
    }
}

/// Configuration loaded from `config.toml` with environment overrides.
///
/// TOML tables map onto key segments, so `[GitProviders.GitHub] Token = ".."`
/// answers `GitProviders:GitHub:Token`.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(contents).context("Failed to parse config.toml")?;
        let mut values = HashMap::new();
        flatten_table("", &table, &mut values);
        Ok(Self { values })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Fold `GitProviders__GitHub__Token`-style variables over the file values.
    pub fn with_env_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if name.starts_with(ENV_PREFIX) {
                self.values.insert(name.replace("__", ":"), value);
            }
        }
        self
    }
}

impl ConfigSource for AppConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut HashMap<String, String>) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}:{name}")
        };
        match value {
            toml::Value::Table(inner) => flatten_table(&key, inner, out),
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            // Arrays have no colon-key equivalent
            toml::Value::Array(_) => {}
            other => {
                out.insert(key, other.to_string());
            }
        }
    }
}

/// In-memory configuration, for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfig {
    values: HashMap<String, String>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MemoryConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("ISSUE_BRIDGE_CONFIG") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".issue-bridge")
        .join("config.toml")
}

pub fn load_config() -> Result<AppConfig> {
    let path = config_path();
    let config = AppConfig::from_file(&path)?.with_env_overrides(std::env::vars());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[GitProviders.GitHub]
Token = "ghp_file"
StrictResponseSchema = true

[GitProviders.Bitbucket]
Username = "octo"
AppPassword = "secret"
"#;

    #[test]
    fn toml_tables_map_to_colon_keys() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.get(GITHUB_TOKEN).as_deref(), Some("ghp_file"));
        assert_eq!(config.get(BITBUCKET_USERNAME).as_deref(), Some("octo"));
        assert_eq!(config.get(BITBUCKET_APP_PASSWORD).as_deref(), Some("secret"));
        assert_eq!(config.get(GITHUB_BASE_URL), None);
    }

    #[test]
    fn non_string_scalars_become_strings() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.get(GITHUB_STRICT_SCHEMA).as_deref(), Some("true"));
        assert!(config.flag(GITHUB_STRICT_SCHEMA));
        assert!(!config.flag(GITHUB_BASE_URL));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let config = AppConfig::from_toml_str(SAMPLE)
            .unwrap()
            .with_env_overrides(vec![
                ("GitProviders__GitHub__Token".to_string(), "ghp_env".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ]);
        assert_eq!(config.get(GITHUB_TOKEN).as_deref(), Some("ghp_env"));
        assert_eq!(config.get("HOME"), None);
    }

    #[test]
    fn missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.get(GITHUB_TOKEN), None);
    }

    #[test]
    fn reads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.get(GITHUB_TOKEN).as_deref(), Some("ghp_file"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(AppConfig::from_toml_str("[GitProviders\nToken =").is_err());
    }

    #[test]
    fn memory_config_returns_set_values() {
        let config = MemoryConfig::new().set(GITHUB_TOKEN, "t");
        assert_eq!(config.get(GITHUB_TOKEN).as_deref(), Some("t"));
        assert_eq!(config.get(BITBUCKET_USERNAME), None);
    }
}
