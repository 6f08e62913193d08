// FlowCompare — OIDC provider, role and policy provisioning

use super::policy;
use super::{CloudApi, Existence};
use crate::config::{AwsOutputs, DeploymentConfig};

/// What [`provision`] did, step by step.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub account_id: String,
    pub oidc_provider: Existence,
    pub role: Existence,
    pub policy: Existence,
    pub policy_arn: String,
    /// Set when the model probe failed; the role may not have propagated yet.
    pub bedrock_warning: Option<String>,
    pub outputs: AwsOutputs,
}

/// Reuse or create the OIDC provider, then the role and its policy.
pub async fn ensure_oidc_provider(
    api: &dyn CloudApi,
    account_id: &str,
) -> anyhow::Result<(String, Existence)> {
    let arn = policy::oidc_provider_arn(account_id);
    if api.oidc_provider_exists(&arn).await? {
        tracing::info!(arn = %arn, "OIDC provider already exists");
        return Ok((arn, Existence::Existing));
    }

    let created = api
        .create_oidc_provider(
            policy::OIDC_URL,
            &[policy::GITHUB_OIDC_THUMBPRINT.to_string()],
            &[policy::STS_AUDIENCE.to_string()],
        )
        .await?;
    tracing::info!(arn = %created, "OIDC provider created");
    Ok((created, Existence::Created))
}

/// Create the role and the permissions policy and attach one to the other.
/// Returns `(role_arn, role, policy, policy_arn)`.
pub async fn ensure_role(
    api: &dyn CloudApi,
    cfg: &DeploymentConfig,
    provider_arn: &str,
) -> anyhow::Result<(String, Existence, Existence, String)> {
    let role_name = policy::role_name(&cfg.environment);
    let trust = policy::trust_policy(provider_arn, &cfg.repo_owner, &cfg.repo_name);
    let role = api
        .create_role(
            &role_name,
            &serde_json::to_string(&trust)?,
            "Role for GitHub Actions Contact Flow Comparison",
        )
        .await?;
    tracing::info!(role = %role_name, state = role.label(), "IAM role ready");

    let policy_name = policy::policy_name(&cfg.environment);
    let permissions = policy::permissions_policy(&cfg.aws_region, &cfg.aws_account_id);
    let (policy_arn, policy_state) = match api
        .create_policy(
            &policy_name,
            &serde_json::to_string(&permissions)?,
            "Policy for Contact Flow Comparison GitHub Action",
        )
        .await?
    {
        Some(arn) => (arn, Existence::Created),
        None => (
            policy::policy_arn(&cfg.aws_account_id, &policy_name),
            Existence::Existing,
        ),
    };
    tracing::info!(policy = %policy_name, state = policy_state.label(), "IAM policy ready");

    api.attach_role_policy(&role_name, &policy_arn).await?;
    tracing::info!(role = %role_name, policy = %policy_arn, "Policy attached to role");

    Ok((
        policy::role_arn(&cfg.aws_account_id, &role_name),
        role,
        policy_state,
        policy_arn,
    ))
}

/// Send the probe request; errors come back as text, not failures.
pub async fn probe_bedrock(api: &dyn CloudApi, cfg: &DeploymentConfig) -> Option<String> {
    let model_id = policy::inference_profile_arn(&cfg.aws_region, &cfg.aws_account_id);
    let body = match serde_json::to_vec(&policy::bedrock_probe_body()) {
        Ok(b) => b,
        Err(e) => return Some(e.to_string()),
    };
    match api.invoke_model(&model_id, body).await {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!(model = %model_id, error = %e, "Bedrock probe failed");
            Some(format!("{:#}", e))
        }
    }
}

/// Full AWS step: identity check, OIDC provider, role, policy, model probe.
pub async fn provision(
    api: &dyn CloudApi,
    cfg: &DeploymentConfig,
) -> anyhow::Result<ProvisionReport> {
    let account_id = api.caller_account().await?;
    if account_id != cfg.aws_account_id {
        anyhow::bail!(
            "Account mismatch. Expected: {}, Got: {}",
            cfg.aws_account_id,
            account_id
        );
    }

    let (oidc_provider_arn, oidc_state) = ensure_oidc_provider(api, &account_id).await?;
    let (role_arn, role_state, policy_state, policy_arn) =
        ensure_role(api, cfg, &oidc_provider_arn).await?;
    let bedrock_warning = probe_bedrock(api, cfg).await;

    let role_name = policy::arn_resource_name(&role_arn).to_string();
    Ok(ProvisionReport {
        account_id,
        oidc_provider: oidc_state,
        role: role_state,
        policy: policy_state,
        policy_arn,
        bedrock_warning,
        outputs: AwsOutputs {
            oidc_provider_arn,
            role_arn,
            role_name,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeCloud {
        account: String,
        provider_exists: bool,
        role_exists: bool,
        policy_exists: bool,
        bedrock_denied: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeCloud {
        fn for_account(account: &str) -> Self {
            Self {
                account: account.into(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl CloudApi for FakeCloud {
        async fn caller_account(&self) -> anyhow::Result<String> {
            Ok(self.account.clone())
        }
        async fn oidc_provider_exists(&self, arn: &str) -> anyhow::Result<bool> {
            self.record(format!("get_oidc {}", arn));
            Ok(self.provider_exists)
        }
        async fn create_oidc_provider(
            &self,
            url: &str,
            thumbprints: &[String],
            client_ids: &[String],
        ) -> anyhow::Result<String> {
            self.record(format!("create_oidc {} {} {}", url, thumbprints[0], client_ids[0]));
            Ok(policy::oidc_provider_arn(&self.account))
        }
        async fn create_role(
            &self,
            name: &str,
            trust_policy: &str,
            _description: &str,
        ) -> anyhow::Result<Existence> {
            assert!(trust_policy.contains("AssumeRoleWithWebIdentity"));
            self.record(format!("create_role {}", name));
            Ok(if self.role_exists {
                Existence::Existing
            } else {
                Existence::Created
            })
        }
        async fn create_policy(
            &self,
            name: &str,
            _document: &str,
            _description: &str,
        ) -> anyhow::Result<Option<String>> {
            self.record(format!("create_policy {}", name));
            if self.policy_exists {
                Ok(None)
            } else {
                Ok(Some(format!("arn:aws:iam::{}:policy/{}-new", self.account, name)))
            }
        }
        async fn attach_role_policy(&self, role: &str, arn: &str) -> anyhow::Result<()> {
            self.record(format!("attach {} {}", role, arn));
            Ok(())
        }
        async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> anyhow::Result<()> {
            let body: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(body["max_tokens"], 10);
            self.record(format!("invoke {}", model_id));
            if self.bedrock_denied {
                anyhow::bail!("AccessDeniedException");
            }
            Ok(())
        }
    }

    fn cfg() -> DeploymentConfig {
        DeploymentConfig {
            github_token: "t".into(),
            repo_owner: "acme".into(),
            repo_name: "flows".into(),
            aws_account_id: "123456789012".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fresh_account_creates_everything() {
        let cloud = FakeCloud::for_account("123456789012");
        let report = provision(&cloud, &cfg()).await.unwrap();

        assert_eq!(report.oidc_provider, Existence::Created);
        assert_eq!(report.role, Existence::Created);
        assert_eq!(report.policy, Existence::Created);
        assert!(report.bedrock_warning.is_none());
        assert_eq!(
            report.outputs.role_arn,
            "arn:aws:iam::123456789012:role/GitHubActions-ContactFlowComparison-dev"
        );
        assert_eq!(report.outputs.role_name, "GitHubActions-ContactFlowComparison-dev");

        let calls = cloud.calls();
        assert!(calls[1].starts_with("create_oidc https://token.actions.githubusercontent.com"));
        assert!(calls.contains(&format!(
            "attach GitHubActions-ContactFlowComparison-dev {}",
            report.policy_arn
        )));
    }

    #[tokio::test]
    async fn test_existing_resources_are_reused() {
        let cloud = FakeCloud {
            provider_exists: true,
            role_exists: true,
            policy_exists: true,
            ..FakeCloud::for_account("123456789012")
        };
        let report = provision(&cloud, &cfg()).await.unwrap();

        assert_eq!(report.oidc_provider, Existence::Existing);
        assert_eq!(report.role, Existence::Existing);
        assert_eq!(report.policy, Existence::Existing);
        assert_eq!(
            report.policy_arn,
            "arn:aws:iam::123456789012:policy/ContactFlowComparisonPolicy-dev"
        );
        assert!(!cloud.calls().iter().any(|c| c.starts_with("create_oidc")));
        assert!(cloud.calls().iter().any(|c| c.starts_with("attach")));
    }

    #[tokio::test]
    async fn test_account_mismatch_stops_before_iam() {
        let cloud = FakeCloud::for_account("999999999999");
        let err = provision(&cloud, &cfg()).await.unwrap_err();
        assert!(err.to_string().contains("Account mismatch"));
        assert!(cloud.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bedrock_failure_is_only_a_warning() {
        let cloud = FakeCloud {
            bedrock_denied: true,
            ..FakeCloud::for_account("123456789012")
        };
        let report = provision(&cloud, &cfg()).await.unwrap();
        assert!(report
            .bedrock_warning
            .unwrap()
            .contains("AccessDeniedException"));
    }
}
