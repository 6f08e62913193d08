use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::aead::OsRng;
use crypto_box::SecretKey;
use flowcompare::aws::Existence;
use flowcompare::config::DeploymentConfig;
use flowcompare::fetch::{fetch_changed_flows, EMPTY_FLOW};
use flowcompare::github::setup::{configure_actions, ensure_repository};
use flowcompare::github::{GitHubClient, Upsert};
use flowcompare::status::{token_check, CheckState};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GitHubClient {
    flowcompare::logger::init_test();
    GitHubClient::new("ghp_test", server.uri()).unwrap()
}

fn repo_json(owner: &str, name: &str) -> serde_json::Value {
    json!({
        "full_name": format!("{}/{}", owner, name),
        "html_url": format!("https://github.com/{}/{}", owner, name),
        "clone_url": format!("https://github.com/{}/{}.git", owner, name),
        "private": true
    })
}

fn content_json(text: &str) -> serde_json::Value {
    // GitHub wraps the payload; the client must strip the newlines.
    let encoded = STANDARD.encode(text);
    let (head, tail) = encoded.split_at(encoded.len() / 2);
    json!({ "content": format!("{}\n{}\n", head, tail), "encoding": "base64" })
}

fn deployment() -> DeploymentConfig {
    DeploymentConfig {
        github_token: "ghp_test".into(),
        repo_owner: "alice".into(),
        repo_name: "flows".into(),
        aws_account_id: "123456789012".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_requests_carry_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows"))
        .and(header("authorization", "Bearer ghp_test"))
        .and(header("x-github-api-version", "2022-11-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json("alice", "flows")))
        .expect(1)
        .mount(&server)
        .await;

    let repo = client(&server).get_repo("alice", "flows").await.unwrap();
    assert_eq!(repo.full_name, "alice/flows");
    assert!(repo.private);
}

#[tokio::test]
async fn test_find_repo_maps_404_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/secret"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Forbidden"})))
        .mount(&server)
        .await;

    let gh = client(&server);
    assert!(gh.find_repo("alice", "missing").await.unwrap().is_none());

    let err = gh.find_repo("alice", "secret").await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("Forbidden"));
}

#[tokio::test]
async fn test_ensure_repository_creates_when_absent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/new-flows"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .and(body_partial_json(json!({
            "name": "new-flows",
            "private": false,
            "auto_init": true,
            "gitignore_template": "Python"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(repo_json("alice", "new-flows")))
        .expect(1)
        .mount(&server)
        .await;

    let (repo, state) = ensure_repository(&client(&server), "alice", "new-flows", "desc", false)
        .await
        .unwrap();
    assert_eq!(state, Existence::Created);
    assert_eq!(repo.clone_url, "https://github.com/alice/new-flows.git");
}

#[tokio::test]
async fn test_ensure_repository_reuses_existing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json("alice", "flows")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (_, state) = ensure_repository(&client(&server), "alice", "flows", "desc", true)
        .await
        .unwrap();
    assert_eq!(state, Existence::Existing);
}

#[tokio::test]
async fn test_upsert_variable_updates_or_creates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/actions/variables/ACCOUNT"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"name": "ACCOUNT", "value": "old"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/repos/alice/flows/actions/variables/ACCOUNT"))
        .and(body_partial_json(json!({"value": "123456789012"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/actions/variables/CONTACT_FLOW_PATH"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/alice/flows/actions/variables"))
        .and(body_partial_json(json!({"name": "CONTACT_FLOW_PATH"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let gh = client(&server);
    let account = gh
        .upsert_variable("alice", "flows", "ACCOUNT", "123456789012")
        .await
        .unwrap();
    assert_eq!(account, Upsert::Updated);
    let flow_path = gh
        .upsert_variable("alice", "flows", "CONTACT_FLOW_PATH", "imports/resources/flows")
        .await
        .unwrap();
    assert_eq!(flow_path, Upsert::Created);
}

#[tokio::test]
async fn test_set_secret_seals_with_repository_key() {
    let server = MockServer::start().await;
    let secret_key = SecretKey::generate(&mut OsRng);
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/actions/secrets/public-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key_id": "568250167242549743",
            "key": STANDARD.encode(secret_key.public_key().as_bytes())
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/repos/alice/flows/actions/secrets/FLOW_COMPARE_PAT"))
        .and(body_partial_json(json!({"key_id": "568250167242549743"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server)
        .set_secret("alice", "flows", "FLOW_COMPARE_PAT", "ghp_secret_value")
        .await
        .unwrap();
    assert_eq!(outcome, Upsert::Created);

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&put.body).unwrap();
    let sealed = STANDARD
        .decode(body["encrypted_value"].as_str().unwrap())
        .unwrap();
    assert_eq!(secret_key.unseal(&sealed).unwrap(), b"ghp_secret_value");
}

#[tokio::test]
async fn test_configure_actions_collects_warnings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_json("alice", "flows")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/actions/secrets/public-key"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"message": "Resource not accessible by integration"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/actions/variables/CONTACT_FLOW_PATH"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/actions/variables/ACCOUNT"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/alice/flows/actions/variables"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let report = configure_actions(&client(&server), &deployment())
        .await
        .unwrap();
    assert_eq!(report.repository, "alice/flows");
    assert!(report.secrets.is_empty());
    assert_eq!(report.variables.len(), 2);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("FLOW_COMPARE_PAT"));
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_configure_actions_fails_without_repository() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = configure_actions(&client(&server), &deployment())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_fetch_changed_flows_saves_both_versions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/commits/c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "c2",
            "parents": [{"sha": "c1"}],
            "files": [
                {"filename": "imports/resources/flows/main.json", "status": "modified"},
                {"filename": "imports/resources/flows/new.json", "status": "added"},
                {"filename": "imports/resources/flows/old.json", "status": "removed"},
                {"filename": "README.md", "status": "modified"}
            ]
        })))
        .mount(&server)
        .await;

    let main_path = "/repos/alice/flows/contents/imports/resources/flows/main.json";
    let new_path = "/repos/alice/flows/contents/imports/resources/flows/new.json";
    Mock::given(method("GET"))
        .and(path(main_path))
        .and(query_param("ref", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json(r#"{"Version":"1"}"#)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(main_path))
        .and(query_param("ref", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json(r#"{"Version":"2"}"#)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(new_path))
        .and(query_param("ref", "c1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(new_path))
        .and(query_param("ref", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json(r#"{"Version":"new"}"#)))
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let saved = fetch_changed_flows(
        &client(&server),
        "alice",
        "flows",
        "c2",
        "imports/resources/flows",
        out.path(),
    )
    .await
    .unwrap();

    assert_eq!(saved.len(), 2);
    assert!(!saved[0].is_new);
    assert_eq!(
        std::fs::read_to_string(out.path().join("main_original.json")).unwrap(),
        r#"{"Version":"1"}"#
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("main_modified.json")).unwrap(),
        r#"{"Version":"2"}"#
    );
    assert!(saved[1].is_new);
    assert_eq!(
        std::fs::read_to_string(out.path().join("new_original.json")).unwrap(),
        EMPTY_FLOW
    );
}

#[tokio::test]
async fn test_token_check_reports_missing_scopes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-oauth-scopes", "repo, read:org")
                .set_body_json(json!({"login": "alice"})),
        )
        .mount(&server)
        .await;

    let check = token_check(&client(&server)).await;
    assert_eq!(check.state, CheckState::Fail);
    assert!(check.detail.contains("workflow"));
}

#[tokio::test]
async fn test_token_check_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
        .mount(&server)
        .await;

    let check = token_check(&client(&server)).await;
    assert_eq!(check.state, CheckState::Fail);
    assert!(check.detail.contains("rejected"));
}

#[tokio::test]
async fn test_token_scopes_parses_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-oauth-scopes", "repo, workflow")
                .set_body_json(json!({"login": "alice"})),
        )
        .mount(&server)
        .await;

    let (user, scopes) = client(&server).token_scopes().await.unwrap();
    assert_eq!(user.login, "alice");
    assert_eq!(scopes, vec!["repo", "workflow"]);
    assert_eq!(token_check(&client(&server)).await.state, CheckState::Pass);
}

#[tokio::test]
async fn test_fetch_encodes_reserved_characters_in_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/alice/flows/commits/c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "c2",
            "parents": [{"sha": "c1"}],
            "files": [{"filename": "flows/IVR #2.json", "status": "modified"}]
        })))
        .mount(&server)
        .await;

    let encoded = "/repos/alice/flows/contents/flows/IVR%20%232.json";
    Mock::given(method("GET"))
        .and(path(encoded))
        .and(query_param("ref", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json(r#"{"Version":"1"}"#)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(encoded))
        .and(query_param("ref", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(content_json(r#"{"Version":"2"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let out = tempfile::tempdir().unwrap();
    let saved = fetch_changed_flows(&client(&server), "alice", "flows", "c2", "flows", out.path())
        .await
        .unwrap();

    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].path, "flows/IVR #2.json");
    assert_eq!(
        std::fs::read_to_string(out.path().join("IVR #2_modified.json")).unwrap(),
        r#"{"Version":"2"}"#
    );
}
