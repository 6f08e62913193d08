// FlowCompare — GitHub Actions workflow rendering

use crate::config::DeploymentConfig;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

pub const WORKFLOW_DIR: &str = ".github/workflows";
pub const WORKFLOW_FILE: &str = "compare-flows.yml";
pub const COMPARE_ACTION: &str = "aws-samples/connect-contact-flow-comparison-github-action@main";
pub const PAT_SECRET: &str = "FLOW_COMPARE_PAT";
pub const FLOW_PATH_VARIABLE: &str = "CONTACT_FLOW_PATH";
pub const ACCOUNT_VARIABLE: &str = "ACCOUNT";

#[derive(Debug, Serialize)]
struct Workflow {
    name: String,
    on: Triggers,
    concurrency: Concurrency,
    permissions: Permissions,
    jobs: Jobs,
}

#[derive(Debug, Serialize)]
struct Triggers {
    push: PushTrigger,
}

#[derive(Debug, Serialize)]
struct PushTrigger {
    paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Concurrency {
    group: String,
    #[serde(rename = "cancel-in-progress")]
    cancel_in_progress: bool,
}

#[derive(Debug, Serialize)]
struct Permissions {
    #[serde(rename = "id-token")]
    id_token: String,
    contents: String,
}

#[derive(Debug, Serialize)]
struct Jobs {
    compare_flows: Job,
}

#[derive(Debug, Serialize)]
struct Job {
    name: String,
    #[serde(rename = "runs-on")]
    runs_on: String,
    environment: String,
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    uses: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    env: Option<Mapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    with: Option<Mapping>,
}

fn mapping<const N: usize>(pairs: [(&str, Value); N]) -> Mapping {
    let mut map = Mapping::new();
    for (k, v) in pairs {
        map.insert(Value::String(k.to_string()), v);
    }
    map
}

fn expr(inner: &str) -> Value {
    Value::String(format!("${{{{ {} }}}}", inner))
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

/// Render the comparison workflow for this deployment.
pub fn render(cfg: &DeploymentConfig, role_arn: &str) -> Result<String, serde_yaml::Error> {
    let workflow = Workflow {
        name: "Contact Flows Comparison Action".into(),
        on: Triggers {
            push: PushTrigger {
                paths: vec![format!(
                    "{}/**",
                    cfg.contact_flow_path.trim_end_matches('/')
                )],
            },
        },
        concurrency: Concurrency {
            group: "${{ github.workflow }}-${{ github.ref }}".into(),
            cancel_in_progress: true,
        },
        permissions: Permissions {
            id_token: "write".into(),
            contents: "read".into(),
        },
        jobs: Jobs {
            compare_flows: Job {
                name: "compare".into(),
                runs_on: "ubuntu-latest".into(),
                environment: cfg.environment.clone(),
                steps: vec![
                    Step {
                        name: None,
                        uses: "actions/checkout@v4".into(),
                        env: None,
                        // current and previous commit
                        with: Some(mapping([("fetch-depth", Value::Number(2.into()))])),
                    },
                    Step {
                        name: Some("Configure AWS Credentials".into()),
                        uses: "aws-actions/configure-aws-credentials@v4".into(),
                        env: None,
                        with: Some(mapping([
                            ("role-to-assume", text(role_arn)),
                            ("aws-region", text(&cfg.aws_region)),
                        ])),
                    },
                    Step {
                        name: Some("Run Compare Action".into()),
                        uses: COMPARE_ACTION.into(),
                        env: Some(mapping([("ENVIRONMENT", text(&cfg.environment))])),
                        with: Some(mapping([
                            ("github_pat", expr(&format!("secrets.{}", PAT_SECRET))),
                            ("repo_owner", text(&cfg.repo_owner)),
                            ("repo", text(&cfg.repo_name)),
                            ("commit_sha", expr("github.sha")),
                            ("contact_flow_path", expr(&format!("vars.{}", FLOW_PATH_VARIABLE))),
                        ])),
                    },
                ],
            },
        },
    };

    let body = serde_yaml::to_string(&workflow)?;
    Ok(format!(
        "# Generated by flowcompare. Re-run `flowcompare github` to regenerate.\n{}",
        body
    ))
}

/// Write the workflow under `<root>/.github/workflows/`; returns the repo-relative path.
pub fn write(root: &Path, cfg: &DeploymentConfig, role_arn: &str) -> anyhow::Result<PathBuf> {
    let relative = Path::new(WORKFLOW_DIR).join(WORKFLOW_FILE);
    let target = root.join(&relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, render(cfg, role_arn)?)?;
    tracing::info!(path = %target.display(), "Workflow file written");
    Ok(relative)
}
