// FlowCompare — Repository, secret and variable setup

use super::{GitHubClient, GitHubError, NewRepository, Repository, Upsert};
use crate::aws::Existence;
use crate::config::DeploymentConfig;
use crate::workflow::{ACCOUNT_VARIABLE, FLOW_PATH_VARIABLE, PAT_SECRET};

pub const DEFAULT_DESCRIPTION: &str = "Amazon Connect Contact Flow Comparison Repository";

/// Per-item outcome of [`configure_actions`].
#[derive(Debug, Clone)]
pub struct ActionsSetupReport {
    pub repository: String,
    pub secrets: Vec<(String, Upsert)>,
    pub variables: Vec<(String, Upsert)>,
    /// Items that could not be set; setup carries on past them.
    pub warnings: Vec<String>,
}

impl ActionsSetupReport {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Store the PAT secret and the flow-path/account variables on the repository.
///
/// Fails only when the repository itself is unreachable.
pub async fn configure_actions(
    gh: &GitHubClient,
    cfg: &DeploymentConfig,
) -> Result<ActionsSetupReport, GitHubError> {
    let repo = gh.get_repo(&cfg.repo_owner, &cfg.repo_name).await?;
    tracing::info!(repo = %repo.full_name, "Repository access confirmed");

    let mut report = ActionsSetupReport {
        repository: repo.full_name,
        secrets: Vec::new(),
        variables: Vec::new(),
        warnings: Vec::new(),
    };

    let secrets = [(PAT_SECRET, cfg.github_token.as_str())];
    for (name, value) in secrets {
        match gh
            .set_secret(&cfg.repo_owner, &cfg.repo_name, name, value)
            .await
        {
            Ok(outcome) => report.secrets.push((name.to_string(), outcome)),
            Err(e) => {
                tracing::warn!(secret = name, error = %e, "Could not set secret");
                report
                    .warnings
                    .push(format!("Could not set secret {}: {}", name, e));
            }
        }
    }

    let variables = [
        (FLOW_PATH_VARIABLE, cfg.contact_flow_path.as_str()),
        (ACCOUNT_VARIABLE, cfg.aws_account_id.as_str()),
    ];
    for (name, value) in variables {
        match gh
            .upsert_variable(&cfg.repo_owner, &cfg.repo_name, name, value)
            .await
        {
            Ok(outcome) => report.variables.push((name.to_string(), outcome)),
            Err(e) => {
                tracing::warn!(variable = name, error = %e, "Could not set variable");
                report
                    .warnings
                    .push(format!("Could not set variable {}: {}", name, e));
            }
        }
    }

    Ok(report)
}

/// Reuse `owner/name` when it exists, otherwise create it for the user.
pub async fn ensure_repository(
    gh: &GitHubClient,
    owner: &str,
    name: &str,
    description: &str,
    private: bool,
) -> Result<(Repository, Existence), GitHubError> {
    if let Some(existing) = gh.find_repo(owner, name).await? {
        tracing::info!(url = %existing.html_url, "Repository already exists");
        return Ok((existing, Existence::Existing));
    }

    let repo = gh
        .create_repo(&NewRepository {
            name: name.to_string(),
            description: description.to_string(),
            private,
            auto_init: true,
            gitignore_template: Some("Python".into()),
        })
        .await?;
    tracing::info!(url = %repo.html_url, "Repository created");
    Ok((repo, Existence::Created))
}

/// Settings page where secrets can be checked or set by hand.
pub fn secrets_settings_url(owner: &str, repo: &str) -> String {
    format!(
        "https://github.com/{}/{}/settings/secrets/actions",
        owner, repo
    )
}
