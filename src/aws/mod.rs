// FlowCompare — AWS provisioning

pub mod policy;
pub mod provision;
pub mod sdk;

use async_trait::async_trait;

/// Whether a resource was made by this run or found in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Created,
    Existing,
}

impl Existence {
    pub fn label(self) -> &'static str {
        match self {
            Existence::Created => "created",
            Existence::Existing => "already exists",
        }
    }
}

/// The IAM, STS and Bedrock calls provisioning makes.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Account id of the active credentials.
    async fn caller_account(&self) -> anyhow::Result<String>;

    /// `false` when IAM reports NoSuchEntity.
    async fn oidc_provider_exists(&self, arn: &str) -> anyhow::Result<bool>;

    /// Returns the new provider's ARN.
    async fn create_oidc_provider(
        &self,
        url: &str,
        thumbprints: &[String],
        client_ids: &[String],
    ) -> anyhow::Result<String>;

    async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> anyhow::Result<Existence>;

    /// `Some(arn)` when created, `None` when a policy with that name exists.
    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
    ) -> anyhow::Result<Option<String>>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> anyhow::Result<()>;

    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> anyhow::Result<()>;
}
