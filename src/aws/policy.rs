// FlowCompare — IAM names, ARNs and policy documents

use serde_json::{json, Value};

pub const OIDC_HOST: &str = "token.actions.githubusercontent.com";
pub const OIDC_URL: &str = "https://token.actions.githubusercontent.com";
/// Certificate thumbprint GitHub publishes for its OIDC endpoint.
pub const GITHUB_OIDC_THUMBPRINT: &str = "6938fd4d98bab03faadb97b34396831e3780aea1";
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";
pub const INFERENCE_PROFILE: &str = "us.anthropic.claude-3-5-sonnet-20241022-v2:0";
pub const POLICY_VERSION: &str = "2012-10-17";

pub fn role_name(environment: &str) -> String {
    format!("GitHubActions-ContactFlowComparison-{}", environment)
}

pub fn policy_name(environment: &str) -> String {
    format!("ContactFlowComparisonPolicy-{}", environment)
}

pub fn oidc_provider_arn(account_id: &str) -> String {
    format!("arn:aws:iam::{}:oidc-provider/{}", account_id, OIDC_HOST)
}

pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{}:role/{}", account_id, role_name)
}

pub fn policy_arn(account_id: &str, policy_name: &str) -> String {
    format!("arn:aws:iam::{}:policy/{}", account_id, policy_name)
}

pub fn inference_profile_arn(region: &str, account_id: &str) -> String {
    format!(
        "arn:aws:bedrock:{}:{}:inference-profile/{}",
        region, account_id, INFERENCE_PROFILE
    )
}

/// Name part of an ARN (`.../role/Name` → `Name`).
pub fn arn_resource_name(arn: &str) -> &str {
    arn.rsplit('/').next().unwrap_or(arn)
}

/// Lets workflows of one repository assume the role through GitHub's OIDC provider.
pub fn trust_policy(provider_arn: &str, repo_owner: &str, repo_name: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "Federated": provider_arn },
                "Action": "sts:AssumeRoleWithWebIdentity",
                "Condition": {
                    "StringEquals": {
                        (format!("{}:aud", OIDC_HOST)): STS_AUDIENCE
                    },
                    "StringLike": {
                        (format!("{}:sub", OIDC_HOST)): format!("repo:{}/{}:*", repo_owner, repo_name)
                    }
                }
            }
        ]
    })
}

/// Model invocation on the inference profile plus identity lookup.
pub fn permissions_policy(region: &str, account_id: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Effect": "Allow",
                "Action": ["bedrock:InvokeModel", "bedrock-runtime:InvokeModel"],
                "Resource": inference_profile_arn(region, account_id)
            },
            {
                "Effect": "Allow",
                "Action": ["sts:GetCallerIdentity"],
                "Resource": "*"
            }
        ]
    })
}

/// Smallest useful Messages API request, used to confirm model access.
pub fn bedrock_probe_body() -> Value {
    json!({
        "anthropic_version": "bedrock-2023-05-31",
        "max_tokens": 10,
        "messages": [{ "role": "user", "content": "Hello" }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_environment() {
        assert_eq!(role_name("dev"), "GitHubActions-ContactFlowComparison-dev");
        assert_eq!(policy_name("prod"), "ContactFlowComparisonPolicy-prod");
    }

    #[test]
    fn test_arns() {
        assert_eq!(
            oidc_provider_arn("123456789012"),
            "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com"
        );
        assert_eq!(
            policy_arn("123456789012", "P"),
            "arn:aws:iam::123456789012:policy/P"
        );
        assert_eq!(
            inference_profile_arn("us-east-1", "123456789012"),
            "arn:aws:bedrock:us-east-1:123456789012:inference-profile/us.anthropic.claude-3-5-sonnet-20241022-v2:0"
        );
        assert_eq!(arn_resource_name("arn:aws:iam::1:role/MyRole"), "MyRole");
    }

    #[test]
    fn test_trust_policy_scopes_to_repository() {
        let doc = trust_policy("arn:provider", "acme", "flows");
        let stmt = &doc["Statement"][0];
        assert_eq!(stmt["Principal"]["Federated"], "arn:provider");
        assert_eq!(stmt["Action"], "sts:AssumeRoleWithWebIdentity");
        assert_eq!(
            stmt["Condition"]["StringEquals"]["token.actions.githubusercontent.com:aud"],
            "sts.amazonaws.com"
        );
        assert_eq!(
            stmt["Condition"]["StringLike"]["token.actions.githubusercontent.com:sub"],
            "repo:acme/flows:*"
        );
    }

    #[test]
    fn test_permissions_policy() {
        let doc = permissions_policy("us-west-2", "111122223333");
        let statements = doc["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 2);
        assert!(statements[0]["Action"]
            .as_array()
            .unwrap()
            .contains(&json!("bedrock-runtime:InvokeModel")));
        assert_eq!(
            statements[0]["Resource"],
            inference_profile_arn("us-west-2", "111122223333")
        );
        assert_eq!(statements[1]["Action"][0], "sts:GetCallerIdentity");
        assert_eq!(statements[1]["Resource"], "*");
    }
}
