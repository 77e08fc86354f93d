//! Configuration management for markerd.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/markerd/config.json`
//! 2. Environment variable: `MARKERD_CONFIG_CONTENT`
//! 3. Project config: `markerd.json` or `markerd.jsonc` in the working directory
//! 4. Environment overrides: `GITHUB_TOKEN`, `PORT`, `MARKERD_LOG_LEVEL`
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use markerd_snapshot::{DEFAULT_ID_FIELD, DEFAULT_MAX_SNAPSHOTS};
use markerd_sync::{GitHubConfig, DEFAULT_API_URL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

const DEFAULT_CURRENT_PATH: &str = "data/markers.json";
const DEFAULT_BACKUP_DIR: &str = "markers-backups";
const DEFAULT_OWNER: &str = "Tomplan";
const DEFAULT_REPO: &str = "VakantiebeursMap";
const DEFAULT_REMOTE_PATH: &str = "markers.json";
const DEFAULT_BRANCH: &str = "development";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONFLICT_RETRIES: u32 = 1;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Where the current document and its backups live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Backup retention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionConfig>,

    /// Remote mirror.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,

    /// HTTP server settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

/// Storage settings. Relative paths resolve against the config's directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_path: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Record field used as identifier when diffing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_snapshots: Option<usize>,
}

/// GitHub mirror settings. The mirror is off while no token is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    /// File path inside the repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// How many times a conflicting push is refetched and retried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/markerd/`
    /// 2. `MARKERD_CONFIG_CONTENT` environment variable
    /// 3. Project config from `project_dir`
    /// 4. Environment overrides
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = markerd_util::path::config_dir() {
            for name in &["config.json", "markerd.json", "markerd.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        if let Ok(content) = std::env::var("MARKERD_CONFIG_CONTENT") {
            config = config.merge(Self::parse_jsonc(&content, "<env>")?);
        }

        if let Some(dir) = project_dir {
            for name in &["markerd.jsonc", "markerd.json"] {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;

        Ok((config, sources))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Apply environment overrides looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
            self.remote.get_or_insert_with(RemoteConfig::default).token = Some(token);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.get_or_insert_with(ServerConfig::default).port = Some(port);
        }
        if let Some(level) = lookup("MARKERD_LOG_LEVEL") {
            self.log_level = Some(level);
        }
    }

    /// Reject settings that can never work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(id_field) = self.storage.as_ref().and_then(|s| s.id_field.as_deref()) {
            if id_field.is_empty() {
                return Err(ConfigError::Validation {
                    message: "storage.id_field must not be empty".to_string(),
                });
            }
        }
        if let Some(path) = self.storage.as_ref().and_then(|s| s.current_path.as_ref()) {
            if path.file_name().is_none() {
                return Err(ConfigError::Validation {
                    message: format!("storage.current_path {} has no file name", path.display()),
                });
            }
        }
        Ok(())
    }

    /// Path of the current document, resolved against `base`.
    pub fn current_path(&self, base: &Path) -> PathBuf {
        let path = self
            .storage
            .as_ref()
            .and_then(|s| s.current_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CURRENT_PATH));
        markerd_util::path::resolve(base, &path)
    }

    /// Backup directory, resolved against `base`.
    pub fn backup_dir(&self, base: &Path) -> PathBuf {
        let path = self
            .storage
            .as_ref()
            .and_then(|s| s.backup_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        markerd_util::path::resolve(base, &path)
    }

    pub fn id_field(&self) -> &str {
        self.storage
            .as_ref()
            .and_then(|s| s.id_field.as_deref())
            .unwrap_or(DEFAULT_ID_FIELD)
    }

    pub fn max_snapshots(&self) -> usize {
        self.retention
            .as_ref()
            .and_then(|r| r.max_snapshots)
            .unwrap_or(DEFAULT_MAX_SNAPSHOTS)
    }

    pub fn conflict_retries(&self) -> u32 {
        self.remote
            .as_ref()
            .and_then(|r| r.conflict_retries)
            .unwrap_or(DEFAULT_CONFLICT_RETRIES)
    }

    /// GitHub settings, or `None` when the mirror is disabled or has no token.
    pub fn github(&self) -> Option<GitHubConfig> {
        let remote = self.remote.as_ref()?;
        if remote.enabled == Some(false) {
            return None;
        }
        let token = remote.token.clone().filter(|t| !t.is_empty())?;

        Some(GitHubConfig {
            owner: remote.owner.clone().unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            repo: remote.repo.clone().unwrap_or_else(|| DEFAULT_REPO.to_string()),
            path: remote
                .path
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_PATH.to_string()),
            branch: remote
                .branch
                .clone()
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            token,
            api_url: remote
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(remote.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }

    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        let server = self.server.clone().unwrap_or_default();
        format!(
            "{}:{}",
            server.host.as_deref().unwrap_or(DEFAULT_HOST),
            server.port.unwrap_or(DEFAULT_PORT)
        )
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip `//` and `/* */` comments outside of strings.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if in_string {
                match c {
                    '\\' => escape_next = true,
                    '"' => in_string = false,
                    _ => {}
                }
                result.push(c);
                continue;
            }

            match (c, chars.peek()) {
                ('"', _) => {
                    in_string = true;
                    result.push(c);
                }
                ('/', Some('/')) => {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                }
                ('/', Some('*')) => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Preserve newlines for error reporting
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                }
                _ => result.push(c),
            }
        }

        result
    }

    /// Substitute `{env:VAR}` and `{file:path}` references.
    ///
    /// File references resolve relative to the config file.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = content.to_string();

        for cap in var_regex().captures_iter(content) {
            let (Some(full), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2)) else {
                continue;
            };

            let replacement = match kind.as_str() {
                "env" => std::env::var(value.as_str()).map_err(|_| ConfigError::EnvVarNotFound {
                    name: value.as_str().to_string(),
                })?,
                "file" => {
                    let file_path = config_dir.join(value.as_str());
                    std::fs::read_to_string(&file_path)
                        .map(|v| v.trim().to_string())
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                }
                _ => continue,
            };

            result = result.replace(full.as_str(), &replacement);
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            schema: other.schema.or(self.schema),
            log_level: other.log_level.or(self.log_level),
            storage: merge_section(self.storage, other.storage, |base, other| StorageConfig {
                current_path: other.current_path.or(base.current_path),
                backup_dir: other.backup_dir.or(base.backup_dir),
                id_field: other.id_field.or(base.id_field),
            }),
            retention: merge_section(self.retention, other.retention, |base, other| {
                RetentionConfig {
                    max_snapshots: other.max_snapshots.or(base.max_snapshots),
                }
            }),
            remote: merge_section(self.remote, other.remote, |base, other| RemoteConfig {
                enabled: other.enabled.or(base.enabled),
                owner: other.owner.or(base.owner),
                repo: other.repo.or(base.repo),
                path: other.path.or(base.path),
                branch: other.branch.or(base.branch),
                token: other.token.or(base.token),
                api_url: other.api_url.or(base.api_url),
                timeout_secs: other.timeout_secs.or(base.timeout_secs),
                conflict_retries: other.conflict_retries.or(base.conflict_retries),
            }),
            server: merge_section(self.server, other.server, |base, other| ServerConfig {
                host: other.host.or(base.host),
                port: other.port.or(base.port),
            }),
        }
    }
}

fn merge_section<T>(base: Option<T>, other: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (base, other) {
        (Some(base), Some(other)) => Some(merge(base, other)),
        (base, other) => other.or(base),
    }
}
