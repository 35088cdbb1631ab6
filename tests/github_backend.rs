mod common;

use assert_matches::assert_matches;
use common::{error_json, repo_json, repo_page, user_json};
use ghmirror::discovery::{fetch_inventory, RepositorySource};
use ghmirror::{FetchError, GitHubClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// GitHub backend tests against a local mock of the REST API

async fn client_for(server: &MockServer) -> GitHubClient {
    GitHubClient::with_base_uri("test-token", &server.uri()).expect("Failed to create client")
}

#[tokio::test]
async fn test_authenticated_user() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json("octocat")))
        .expect(1)
        .mount(&server)
        .await;

    let user = client_for(&server).await.authenticated_user().await.unwrap();

    assert_eq!(user.login, "octocat");
    assert_eq!(user.id, 583231);
}

#[tokio::test]
async fn test_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_json("Bad credentials")))
        .mount(&server)
        .await;

    let result = client_for(&server).await.authenticated_user().await;

    assert_matches!(result, Err(FetchError::Unauthorized));
}

#[tokio::test]
async fn test_rate_limited_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(error_json("API rate limit exceeded")),
        )
        .mount(&server)
        .await;

    let result = client_for(&server).await.authenticated_user().await;

    assert_matches!(result, Err(FetchError::Forbidden));
}

#[tokio::test]
async fn test_inventory_follows_pages_until_short_page() {
    let server = MockServer::start().await;
    for (page, count) in [("1", 30), ("2", 30), ("3", 12)] {
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", page))
            .and(query_param("per_page", "30"))
            .and(query_param("affiliation", "owner"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_page(
                "octocat",
                &format!("p{}", page),
                count,
            )))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server).await;
    let inventory = fetch_inventory(&client, true).await.unwrap();

    assert_eq!(inventory.len(), 72);
    let first = inventory.get("p1-0").unwrap();
    assert_eq!(first.clone_url, "https://github.com/octocat/p1-0.git");
    assert_eq!(first.html_url.as_deref(), Some("https://github.com/octocat/p1-0"));
    assert_eq!(first.description.as_deref(), Some("The p1-0 project"));
    assert!(!first.is_fork);
}

#[tokio::test]
async fn test_inventory_stops_on_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_page("octocat", "r", 30)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let inventory = fetch_inventory(&client, false).await.unwrap();

    assert_eq!(inventory.len(), 30);
}

#[tokio::test]
async fn test_error_on_later_page_discards_inventory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_page("octocat", "r", 30)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(422).set_body_json(error_json("Validation Failed")))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = fetch_inventory(&client, true).await;

    assert_matches!(
        result,
        Err(FetchError::Status { status: 422, page: 2, message }) if message == "Validation Failed"
    );
}

#[tokio::test]
async fn test_single_repository_conversion() {
    let server = MockServer::start().await;
    let mut fork = repo_json("octocat", "forked");
    fork["fork"] = serde_json::json!(true);
    fork["description"] = serde_json::Value::Null;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([fork])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let inventory = fetch_inventory(&client, false).await.unwrap();

    let repo = inventory.get("forked").unwrap();
    assert!(repo.is_fork);
    assert_eq!(repo.description, None);
    assert_eq!(client.provider_name(), "GitHub");
}

#[tokio::test]
async fn test_page_beyond_addressable_range_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repo_page("octocat", "r", 30)))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client.list_page(256, 30, None).await;

    assert_matches!(result, Err(FetchError::TooManyPages(255)));
}
