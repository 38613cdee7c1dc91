use crate::error::{IimError, Result};
use crate::fields::{FieldMap, IncidentField};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ENV_URL: &str = "JIRA_URL";
pub const ENV_USERNAME: &str = "JIRA_USERNAME";
pub const ENV_TOKEN: &str = "JIRA_PASSWORD";
pub const ENV_PROJECT: &str = "JIRA_PROJECT";

pub const DEFAULT_PROJECT: &str = "IIM";
pub const SETTINGS_FILE: &str = "iim.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "incident_overviews";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// FileConfig
// ---------------------------------------------------------------------------

/// Optional `iim.yaml`: per-instance knobs that are not secrets.
///
/// ```yaml
/// project: IIM
/// output_dir: incident_overviews
/// fields:
///   severity: customfield_10319
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| IimError::InvalidSetting {
            name: "config file",
            reason: format!("{}: {e}", path.display()),
        })?;
        let cfg: FileConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `explicit` (which must exist), else `./iim.yaml` when present,
    /// else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default = Path::new(SETTINGS_FILE);
        if default.exists() {
            return Self::load(default);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (key, id) in &self.fields {
            if key.parse::<IncidentField>().is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("unknown field '{key}' in fields"),
                });
            }
            if id.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("empty tracker field id for '{key}'"),
                });
            }
        }

        if let Some(project) = &self.project {
            if !project_key_re().is_match(project) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("invalid project key '{project}'"),
                });
            }
        }

        if matches!(&self.output_dir, Some(dir) if dir.as_os_str().is_empty()) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("empty output_dir, using '{DEFAULT_OUTPUT_DIR}'"),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

static PROJECT_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn project_key_re() -> &'static Regex {
    PROJECT_KEY_RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9]+$").unwrap())
}

/// Everything an entry point needs before its first tracker call.
#[derive(Clone)]
pub struct Settings {
    pub base_url: String,
    pub username: String,
    pub token: String,
    pub project: String,
    pub output_dir: PathBuf,
    pub fields: FieldMap,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .field("project", &self.project)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env(file: &FileConfig) -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), file)
    }

    /// Read settings through `lookup`. Values are trimmed and an empty value
    /// counts as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>, file: &FileConfig) -> Result<Self> {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(IimError::MissingSetting(name));

        let base_url = normalize_base_url(&require(ENV_URL)?)?;
        let username = require(ENV_USERNAME)?;
        let token = require(ENV_TOKEN)?;

        let project = get(ENV_PROJECT)
            .or_else(|| file.project.clone())
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        if !project_key_re().is_match(&project) {
            return Err(IimError::InvalidSetting {
                name: ENV_PROJECT,
                reason: format!("'{project}' is not a project key"),
            });
        }

        let output_dir = file
            .output_dir
            .clone()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let fields = FieldMap::with_overrides(&file.fields).map_err(|e| IimError::InvalidSetting {
            name: "fields",
            reason: e.to_string(),
        })?;

        Ok(Self {
            base_url,
            username,
            token,
            project,
            output_dir,
            fields,
        })
    }

    /// Browse URL for one issue.
    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.base_url)
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|e| IimError::InvalidSetting {
        name: ENV_URL,
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(IimError::InvalidSetting {
            name: ENV_URL,
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

/// Seed the environment from `.env` when one exists. Variables already set
/// in the environment win.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
