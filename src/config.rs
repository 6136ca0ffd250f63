use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File names of the artifacts kept under `[state].dir`.
pub const STORE_FILE_NAME: &str = "vault_state.sqlite";
pub const EMBEDDINGS_FILE_NAME: &str = "vault_embeddings.npy";
pub const FILE_MAP_FILE_NAME: &str = "vault_file_map.json";
pub const SYNC_STATE_FILE_NAME: &str = "sync_state.json";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub vault: VaultConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub auto_update: AutoUpdateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("~/.config/vault-index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutoUpdateConfig {
    #[serde(default = "default_auto_update_enabled")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Minimum `added + modified` from one scan before a rebuild is considered.
    #[serde(default = "default_rebuild_threshold")]
    pub rebuild_threshold: u64,
}

impl Default for AutoUpdateConfig {
    fn default() -> Self {
        Self {
            enabled: default_auto_update_enabled(),
            interval_secs: default_interval_secs(),
            rebuild_threshold: default_rebuild_threshold(),
        }
    }
}

fn default_auto_update_enabled() -> bool {
    true
}
fn default_interval_secs() -> u64 {
    3600
}
fn default_rebuild_threshold() -> u64 {
    1
}

impl Config {
    /// Absolute state directory, with a leading `~` expanded.
    pub fn state_dir(&self) -> PathBuf {
        expand_home(&self.state.dir)
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir().join(STORE_FILE_NAME)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.state_dir().join(EMBEDDINGS_FILE_NAME)
    }

    pub fn file_map_path(&self) -> PathBuf {
        self.state_dir().join(FILE_MAP_FILE_NAME)
    }

    pub fn sync_state_path(&self) -> PathBuf {
        self.state_dir().join(SYNC_STATE_FILE_NAME)
    }

    pub fn vault_root(&self) -> PathBuf {
        expand_home(&self.vault.root)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.vault.include_globs.is_empty() {
        anyhow::bail!("vault.include_globs must not be empty");
    }

    if config.auto_update.rebuild_threshold < 1 {
        anyhow::bail!("auto_update.rebuild_threshold must be >= 1");
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "disabled" | "hash" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[vault]\nroot = \"/notes\"\n").unwrap();
        assert_eq!(config.vault.include_globs, vec!["**/*.md".to_string()]);
        assert!(config.auto_update.enabled);
        assert_eq!(config.auto_update.interval_secs, 3600);
        assert_eq!(config.auto_update.rebuild_threshold, 1);
        assert_eq!(config.embedding.provider, "disabled");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_artifact_paths_share_state_dir() {
        let config = parse("[vault]\nroot = \"/notes\"\n[state]\ndir = \"/tmp/vidx\"\n").unwrap();
        assert_eq!(
            config.store_path(),
            PathBuf::from("/tmp/vidx").join(STORE_FILE_NAME)
        );
        assert_eq!(
            config.embeddings_path(),
            PathBuf::from("/tmp/vidx").join(EMBEDDINGS_FILE_NAME)
        );
        assert_eq!(
            config.file_map_path(),
            PathBuf::from("/tmp/vidx").join(FILE_MAP_FILE_NAME)
        );
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = parse("[vault]\nroot = \"/notes\"\n[auto_update]\nrebuild_threshold = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("rebuild_threshold"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        let err = parse("[vault]\nroot = \"/notes\"\n[embedding]\nprovider = \"openai\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[vault]\nroot = \"/notes\"\n[embedding]\nprovider = \"magic\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse(include_str!("../config/vidx.example.toml")).unwrap();
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.embedding.dims, Some(384));
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_home(Path::new("~/.config/vault-index")),
                home.join(".config/vault-index")
            );
        }
        assert_eq!(expand_home(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
