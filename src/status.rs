// FlowCompare — Deployment status and preflight checks

use crate::config::{
    DeploymentConfig, DeploymentDir, AWS_CONFIG_FILE, CONFIG_FILE, GITHUB_CONFIG_FILE,
};
use crate::flow::{list_flow_files, ContactFlow};
use crate::github::{missing_scopes, GitHubClient, REQUIRED_SCOPES};
use crate::workflow::{WORKFLOW_DIR, WORKFLOW_FILE};
use std::path::Path;

/// IAM actions the `aws` step needs from the operator's credentials.
pub const REQUIRED_IAM_ACTIONS: [&str; 6] = [
    "iam:CreateRole",
    "iam:CreatePolicy",
    "iam:AttachRolePolicy",
    "iam:CreateOpenIDConnectProvider",
    "bedrock-runtime:InvokeModel",
    "sts:GetCallerIdentity",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub state: CheckState,
    pub detail: String,
    pub remedy: Option<String>,
}

impl Check {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            state: CheckState::Pass,
            detail: detail.into(),
            remedy: None,
        }
    }

    fn warn(name: &'static str, detail: impl Into<String>, remedy: impl Into<String>) -> Self {
        Self {
            name,
            state: CheckState::Warn,
            detail: detail.into(),
            remedy: Some(remedy.into()),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, remedy: impl Into<String>) -> Self {
        Self {
            name,
            state: CheckState::Fail,
            detail: detail.into(),
            remedy: Some(remedy.into()),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.state {
            CheckState::Pass => "✅",
            CheckState::Warn => "⚠️ ",
            CheckState::Fail => "❌",
        }
    }
}

/// Which deployment records exist.
pub fn record_checks(dir: &DeploymentDir) -> Vec<Check> {
    [
        (CONFIG_FILE, "init"),
        (AWS_CONFIG_FILE, "aws"),
        (GITHUB_CONFIG_FILE, "github"),
    ]
    .into_iter()
    .map(|(file, step)| {
        let path = dir.path(file);
        if path.exists() {
            Check::pass("Config", path.display().to_string())
        } else {
            Check::fail(
                "Config",
                format!("{} not found", path.display()),
                format!("Run `flowcompare {}`", step),
            )
        }
    })
    .collect()
}

/// `git`, `gh` and `aws` on PATH; only git is mandatory.
pub fn tool_checks(on_path: impl Fn(&str) -> bool) -> Vec<Check> {
    let mut checks = Vec::new();
    for (program, required) in [("git", true), ("gh", false), ("aws", false)] {
        let check = if on_path(program) {
            Check::pass("Tools", format!("{} found", program))
        } else if required {
            Check::fail(
                "Tools",
                format!("{} not found on PATH", program),
                format!("Install {} and re-run", program),
            )
        } else {
            Check::warn(
                "Tools",
                format!("{} not found on PATH", program),
                format!("Install the {} CLI for the manual steps of the guide", program),
            )
        };
        checks.push(check);
    }
    checks
}

/// Structural checks of every flow file under the configured path.
pub fn flow_checks(root: &Path, cfg: &DeploymentConfig) -> Vec<Check> {
    let dir = root.join(&cfg.contact_flow_path);
    let files = match list_flow_files(&dir) {
        Ok(f) => f,
        Err(e) => {
            return vec![Check::fail(
                "Flows",
                format!("cannot list {}: {}", dir.display(), e),
                "Check the contact_flow_path setting",
            )]
        }
    };
    if files.is_empty() {
        return vec![Check::warn(
            "Flows",
            format!("no flow files in {}", cfg.contact_flow_path),
            "Add exported contact flow JSON files; the workflow only runs when they change",
        )];
    }

    files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            match ContactFlow::load(path) {
                Ok(flow) => {
                    let issues = flow.check();
                    if issues.is_empty() {
                        Check::pass("Flows", format!("{} ({} actions)", name, flow.actions.len()))
                    } else {
                        let detail = issues
                            .iter()
                            .map(|i| i.to_string())
                            .collect::<Vec<_>>()
                            .join("; ");
                        Check::warn("Flows", format!("{}: {}", name, detail), "Re-export the flow from Amazon Connect")
                    }
                }
                Err(e) => Check::fail("Flows", format!("{}: {}", name, e), "Fix or re-export the flow JSON"),
            }
        })
        .collect()
}

pub fn workflow_check(root: &Path, cfg: &DeploymentConfig) -> Check {
    let path = root.join(WORKFLOW_DIR).join(WORKFLOW_FILE);
    if path.exists() {
        Check::pass("Workflow", path.display().to_string())
    } else {
        Check::fail(
            "Workflow",
            "workflow file missing; pushes will not trigger comparisons",
            format!(
                "Run `flowcompare github`, commit {}/{} and push changes under {}",
                WORKFLOW_DIR, WORKFLOW_FILE, cfg.contact_flow_path
            ),
        )
    }
}

/// Token validity and `repo`/`workflow` scopes.
pub async fn token_check(gh: &GitHubClient) -> Check {
    match gh.token_scopes().await {
        Ok((user, scopes)) => {
            let missing = missing_scopes(&scopes, &REQUIRED_SCOPES);
            if scopes.is_empty() {
                // Fine-grained tokens report no scopes.
                Check::pass("GitHub", format!("authenticated as {}", user.login))
            } else if missing.is_empty() {
                Check::pass(
                    "GitHub",
                    format!("authenticated as {} (scopes: {})", user.login, scopes.join(", ")),
                )
            } else {
                Check::fail(
                    "GitHub",
                    format!("token lacks scopes: {}", missing.join(", ")),
                    "Create a token with `repo` and `workflow` scopes and update FLOW_COMPARE_PAT",
                )
            }
        }
        Err(e) if e.is_unauthorized() => Check::fail(
            "GitHub",
            "token rejected (expired or revoked)",
            "Generate a new token at https://github.com/settings/tokens and update FLOW_COMPARE_PAT",
        ),
        Err(e) => Check::warn("GitHub", e.to_string(), "Check network access to the GitHub API"),
    }
}

/// Guidance for AWS permission errors during the `aws` step.
pub fn iam_remedy() -> String {
    format!(
        "Ensure your AWS credentials allow: {}",
        REQUIRED_IAM_ACTIONS.join(", ")
    )
}
