use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub staging: StagingConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Staging area for fetched files. One directory per process; emptied
/// before and after every ingestion request.
#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,
    /// Skip token verification and act as `dev_subject`. Local use only.
    #[serde(default)]
    pub bypass_mode: bool,
    #[serde(default = "default_dev_subject")]
    pub dev_subject: String,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}
fn default_dev_subject() -> String {
    "dev".to_string()
}

/// Where the tenant credentials blob lives and how long a resolved copy
/// may be reused before re-reading it.
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    /// Path to the credentials JSON blob (see [`crate::credentials::Credentials`]).
    pub parameter_path: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Deploy-stage prefix prepended to allocated namespaces (e.g. `"dev-"`).
    #[serde(default)]
    pub stage_prefix: String,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_document_count")]
    pub default_document_count: i64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            default_document_count: default_document_count(),
        }
    }
}

fn default_max_attempts() -> u32 {
    4
}
fn default_document_count() -> i64 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }
    if config.chat.max_attempts == 0 {
        anyhow::bail!("chat.max_attempts must be >= 1");
    }
    if config.chat.default_document_count < 1 {
        anyhow::bail!("chat.default_document_count must be >= 1");
    }
    if config.credentials.parameter_path.is_empty() {
        anyhow::bail!("credentials.parameter_path must be set");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
            [staging]
            dir = "/tmp/docshelf-staging"

            [server]
            bind = "127.0.0.1:8080"

            [auth]
            jwt_secret = "secret"

            [credentials]
            parameter_path = "/etc/docshelf/credentials.json"
        "#
        .to_string()
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(&base_toml()).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.chat.max_attempts, 4);
        assert_eq!(config.auth.jwt_algorithm, "HS256");
        assert_eq!(config.credentials.cache_ttl_secs, 300);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let toml = format!("{}\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n", base_toml());
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(validate(&config).is_err());
    }
}
