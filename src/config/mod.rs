// FlowCompare — Deployment configuration
// License: Apache-2.0

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEPLOYMENT_DIR: &str = "deployment";
pub const CONFIG_FILE: &str = "config.json";
pub const AWS_CONFIG_FILE: &str = "aws_config.json";
pub const GITHUB_CONFIG_FILE: &str = "github_config.json";
pub const REPO_CONFIG_FILE: &str = "repo_config.json";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_FLOW_PATH: &str = "imports/resources/flows";
pub const DEFAULT_ENVIRONMENT: &str = "dev";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{file} not found; run `flowcompare {step}` first")]
    Missing { file: String, step: &'static str },
}

// ---------------------------------------------------------------------------
// Deployment config (deployment/config.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub github_token: String,
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub aws_account_id: String,
    #[serde(default = "default_region")]
    pub aws_region: String,
    #[serde(default = "default_flow_path")]
    pub contact_flow_path: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            repo_owner: String::new(),
            repo_name: String::new(),
            aws_account_id: String::new(),
            aws_region: default_region(),
            contact_flow_path: default_flow_path(),
            environment: default_environment(),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}
fn default_flow_path() -> String {
    DEFAULT_FLOW_PATH.to_string()
}
fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

/// Outcome of [`DeploymentConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

impl DeploymentConfig {
    /// Load from a JSON file and apply `FLOWCOMPARE_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: DeploymentConfig = serde_json::from_str(&contents)?;
        config.apply_env_overrides();
        config.normalize();
        Ok(config)
    }

    /// Apply environment variable overrides (prefix: FLOWCOMPARE_)
    pub fn apply_env_overrides(&mut self) {
        let fields: [(&str, &mut String); 7] = [
            ("FLOWCOMPARE_GITHUB_TOKEN", &mut self.github_token),
            ("FLOWCOMPARE_REPO_OWNER", &mut self.repo_owner),
            ("FLOWCOMPARE_REPO_NAME", &mut self.repo_name),
            ("FLOWCOMPARE_AWS_ACCOUNT_ID", &mut self.aws_account_id),
            ("FLOWCOMPARE_AWS_REGION", &mut self.aws_region),
            ("FLOWCOMPARE_CONTACT_FLOW_PATH", &mut self.contact_flow_path),
            ("FLOWCOMPARE_ENVIRONMENT", &mut self.environment),
        ];
        for (var, slot) in fields {
            if let Ok(v) = std::env::var(var) {
                if !v.trim().is_empty() {
                    *slot = v.trim().to_string();
                }
            }
        }
    }

    /// Rewrite the flow path the way GitHub reports repository paths.
    pub fn normalize(&mut self) {
        self.contact_flow_path = normalize_flow_path(&self.contact_flow_path);
    }

    /// Check required fields and formats.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.github_token.is_empty() {
            report.errors.push("GitHub token is required".into());
        }
        if self.repo_owner.is_empty() {
            report.errors.push("Repository owner is required".into());
        }
        if self.repo_name.is_empty() {
            report.errors.push("Repository name is required".into());
        }
        if self.aws_account_id.is_empty() {
            report.errors.push("AWS Account ID is required".into());
        }

        if !self.aws_account_id.is_empty() {
            if !self.aws_account_id.chars().all(|c| c.is_ascii_digit()) {
                report.errors.push("AWS Account ID must be numeric".into());
            } else if self.aws_account_id.len() != 12 {
                report
                    .warnings
                    .push("AWS Account IDs are normally 12 digits long".into());
            }
        }

        let name_re = Regex::new(r"^[A-Za-z0-9_.-]+$").expect("static regex");
        if !self.repo_name.is_empty() && !name_re.is_match(&self.repo_name) {
            report.errors.push(format!(
                "Repository name '{}' contains characters GitHub does not allow",
                self.repo_name
            ));
        }

        let flow_path = Path::new(&self.contact_flow_path);
        if self.contact_flow_path.is_empty()
            || flow_path.is_absolute()
            || self
                .contact_flow_path
                .split('/')
                .any(|segment| segment == "." || segment == "..")
        {
            report.errors.push(
                "Contact flow path must be a relative path inside the repository".into(),
            );
        }

        if self.aws_region != DEFAULT_REGION {
            report
                .warnings
                .push("Bedrock inference profiles are optimized for us-east-1".into());
            report
                .recommendations
                .push("Consider using us-east-1 for better performance".into());
        }

        report
    }

    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}

/// Drop `.` segments, repeated and trailing slashes: `./flows/` → `flows`.
/// A leading `/` is kept so absolute paths still fail validation.
pub fn normalize_flow_path(path: &str) -> String {
    let path = path.trim();
    let relative = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if path.starts_with('/') {
        format!("/{}", relative)
    } else {
        relative
    }
}

// ---------------------------------------------------------------------------
// Step outputs
// ---------------------------------------------------------------------------

/// Written by `flowcompare aws`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AwsOutputs {
    pub oidc_provider_arn: String,
    pub role_arn: String,
    pub role_name: String,
}

/// Written by `flowcompare github`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubOutputs {
    pub workflow_path: String,
    pub sample_flow_path: String,
    pub setup_complete: bool,
}

/// Written by `flowcompare create-repo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoConfig {
    pub github_token: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub repo_url: String,
    pub clone_url: String,
}

// ---------------------------------------------------------------------------
// deployment/ directory
// ---------------------------------------------------------------------------

/// Files under `<root>/deployment/`.
#[derive(Debug, Clone)]
pub struct DeploymentDir {
    root: PathBuf,
}

impl DeploymentDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(DEPLOYMENT_DIR)
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir().join(file)
    }

    pub fn exists(&self, file: &str) -> bool {
        self.path(file).exists()
    }

    /// Write a record as pretty JSON, creating `deployment/` when needed.
    pub fn save<T: Serialize>(&self, file: &str, value: &T) -> Result<PathBuf, ConfigError> {
        std::fs::create_dir_all(self.dir())?;
        let path = self.path(file);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)?;
        tracing::debug!(path = %path.display(), "Saved deployment record");
        Ok(path)
    }

    fn load<T: DeserializeOwned>(&self, file: &str, step: &'static str) -> Result<T, ConfigError> {
        let path = self.path(file);
        if !path.exists() {
            return Err(ConfigError::Missing {
                file: format!("{}/{}", DEPLOYMENT_DIR, file),
                step,
            });
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn load_config(&self) -> Result<DeploymentConfig, ConfigError> {
        let mut config: DeploymentConfig = self.load(CONFIG_FILE, "init")?;
        config.apply_env_overrides();
        config.normalize();
        Ok(config)
    }

    pub fn load_aws(&self) -> Result<AwsOutputs, ConfigError> {
        self.load(AWS_CONFIG_FILE, "aws")
    }

    pub fn load_github(&self) -> Result<GitHubOutputs, ConfigError> {
        self.load(GITHUB_CONFIG_FILE, "github")
    }

    pub fn load_repo(&self) -> Result<RepoConfig, ConfigError> {
        self.load(REPO_CONFIG_FILE, "create-repo")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
