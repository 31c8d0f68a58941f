//! Configuration management.
//!
//! Settings are layered, highest first:
//! 1. CLI flags
//! 2. Environment variables (`JIRA_*`, `NOTIFY_*`, `ENABLE_NOTIFY`)
//! 3. `~/.jira-mirror/config.json`
//! 4. Defaults
//!
//! The mirror database lives at `~/.jira-mirror/data/mirror.db` unless
//! `--db` or `JIRA_MIRROR_DB` says otherwise.

use crate::error::{Error, Result};
use crate::projection::mappings::CustomFields;
use crate::sync::SyncOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_JOB_NAME: &str = "Jira Connector";

/// Get the global mirror directory (`~/.jira-mirror`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".jira-mirror"))
}

/// Default config file location.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("config.json"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `JIRA_MIRROR_DB` environment variable
/// 3. Global location: `~/.jira-mirror/data/mirror.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("JIRA_MIRROR_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("mirror.db"))
}

/// Contents of `config.json`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
    pub project_category: Option<String>,
    pub page_size: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub notify: NotifyFileConfig,
    pub custom_fields: CustomFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotifyFileConfig {
    pub enabled: Option<bool>,
    pub webhook_url: Option<String>,
    pub job_name: Option<String>,
}

/// Load the config file.
///
/// A missing file at the default location yields defaults; a missing file
/// that was named explicitly is an error.
///
/// # Errors
///
/// Returns `Config` if the file cannot be read or parsed.
pub fn load_file(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(FileConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })
}

/// Jira connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraCredentials {
    pub base_url: String,
    pub user: String,
    pub token: String,
}

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifySettings {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub job_name: String,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub token: Option<String>,
    pub project_category: Option<String>,
    pub page_size: u32,
    pub timeout: Duration,
    pub notify: NotifySettings,
    pub custom_fields: CustomFields,
}

impl MirrorConfig {
    /// Load from the config file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Config` for unreadable files or invalid values.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let file = load_file(config_path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Layer an environment lookup over file settings.
    ///
    /// # Errors
    ///
    /// Returns `Config` when a numeric setting does not parse or is zero.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let page_size = match var("JIRA_PAGE_SIZE") {
            Some(raw) => parse_positive::<u32>("JIRA_PAGE_SIZE", &raw)?,
            None => file.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        };
        if page_size == 0 {
            return Err(Error::Config("pageSize must be positive".into()));
        }

        let timeout_secs = match var("JIRA_TIMEOUT_SECS") {
            Some(raw) => parse_positive::<u64>("JIRA_TIMEOUT_SECS", &raw)?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        if timeout_secs == 0 {
            return Err(Error::Config("timeoutSecs must be positive".into()));
        }

        let notify = NotifySettings {
            enabled: var("ENABLE_NOTIFY")
                .map(|v| is_truthy(&v))
                .or(file.notify.enabled)
                .unwrap_or(false),
            webhook_url: var("NOTIFY_WEBHOOK_URL").or(file.notify.webhook_url),
            job_name: var("NOTIFY_JOB_NAME")
                .or(file.notify.job_name)
                .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
        };

        Ok(Self {
            url: var("JIRA_URL").or(file.url).map(|u| expand_site_url(&u)),
            user: var("JIRA_USER").or(file.user),
            token: var("JIRA_TOKEN").or(file.token),
            project_category: var("JIRA_PROJECT_CATEGORY").or(file.project_category),
            page_size,
            timeout: Duration::from_secs(timeout_secs),
            notify,
            custom_fields: file.custom_fields,
        })
    }

    /// Connection settings required by `sync`.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming every missing setting.
    pub fn credentials(&self) -> Result<JiraCredentials> {
        let missing: Vec<&str> = [
            ("JIRA_URL", &self.url),
            ("JIRA_USER", &self.user),
            ("JIRA_TOKEN", &self.token),
        ]
        .iter()
        .filter(|(_, v)| v.is_none())
        .map(|(k, _)| *k)
        .collect();

        match (&self.url, &self.user, &self.token) {
            (Some(url), Some(user), Some(token)) => Ok(JiraCredentials {
                base_url: url.clone(),
                user: user.clone(),
                token: token.clone(),
            }),
            _ => Err(Error::Config(format!(
                "missing Jira settings: {}",
                missing.join(", ")
            ))),
        }
    }

    /// Engine options for one run.
    #[must_use]
    pub fn sync_options(&self, skip_history: bool) -> SyncOptions {
        SyncOptions {
            page_size: self.page_size,
            project_category: self.project_category.clone(),
            custom_fields: self.custom_fields.clone(),
            skip_history,
        }
    }
}

/// Expand a bare site name (`acme`) to its Atlassian Cloud URL.
#[must_use]
pub fn expand_site_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        raw.to_string()
    } else if raw.contains('.') {
        format!("https://{raw}")
    } else {
        format!("https://{raw}.atlassian.net")
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    raw.trim()
        .parse::<T>()
        .ok()
        .filter(|n| *n != T::default())
        .ok_or_else(|| Error::Config(format!("{key} must be a positive integer, got '{raw}'")))
}
