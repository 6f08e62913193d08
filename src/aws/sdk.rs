// FlowCompare — CloudApi backed by the AWS SDK

use super::{CloudApi, Existence};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime::primitives::Blob;

/// IAM, STS and Bedrock runtime clients sharing one credential chain.
pub struct SdkCloud {
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
    bedrock: aws_sdk_bedrockruntime::Client,
}

impl SdkCloud {
    /// Resolve credentials from the default chain (env, profile, SSO, IMDS).
    pub async fn connect(region: &str) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        tracing::debug!(region = %region, "AWS clients initialised");
        Self {
            iam: aws_sdk_iam::Client::new(&shared),
            sts: aws_sdk_sts::Client::new(&shared),
            bedrock: aws_sdk_bedrockruntime::Client::new(&shared),
        }
    }
}

#[async_trait]
impl CloudApi for SdkCloud {
    async fn caller_account(&self) -> anyhow::Result<String> {
        let identity = self.sts.get_caller_identity().send().await?;
        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("STS returned no account id"))
    }

    async fn oidc_provider_exists(&self, arn: &str) -> anyhow::Result<bool> {
        match self
            .iam
            .get_open_id_connect_provider()
            .open_id_connect_provider_arn(arn)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_no_such_entity_exception() {
                    Ok(false)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn create_oidc_provider(
        &self,
        url: &str,
        thumbprints: &[String],
        client_ids: &[String],
    ) -> anyhow::Result<String> {
        let out = self
            .iam
            .create_open_id_connect_provider()
            .url(url)
            .set_thumbprint_list(Some(thumbprints.to_vec()))
            .set_client_id_list(Some(client_ids.to_vec()))
            .send()
            .await?;
        out.open_id_connect_provider_arn()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("IAM returned no OIDC provider ARN"))
    }

    async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> anyhow::Result<Existence> {
        match self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description(description)
            .send()
            .await
        {
            Ok(_) => Ok(Existence::Created),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_entity_already_exists_exception() {
                    // Confirm it is readable with these credentials.
                    self.iam.get_role().role_name(name).send().await?;
                    Ok(Existence::Existing)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
    ) -> anyhow::Result<Option<String>> {
        match self
            .iam
            .create_policy()
            .policy_name(name)
            .policy_document(document)
            .description(description)
            .send()
            .await
        {
            Ok(out) => out
                .policy()
                .and_then(|p| p.arn())
                .map(|arn| Some(arn.to_string()))
                .ok_or_else(|| anyhow::anyhow!("IAM returned no policy ARN")),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_entity_already_exists_exception() {
                    Ok(None)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> anyhow::Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await?;
        Ok(())
    }

    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> anyhow::Result<()> {
        let out = self
            .bedrock
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await?;
        tracing::debug!(bytes = out.body().as_ref().len(), "Bedrock probe answered");
        Ok(())
    }
}
