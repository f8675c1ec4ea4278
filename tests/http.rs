mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use common::{BOB, TestRepo, hex};
use git_access::git::BackendKind;
use git_access::routes::create_router;

async fn get(repo: &TestRepo, uri: &str) -> (StatusCode, Value) {
    let app = create_router(repo.open(BackendKind::Native));
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn fixture() -> (TestRepo, String, String) {
    let repo = TestRepo::new();
    repo.write("README.md", "hello");
    repo.write("src/lib.rs", "pub fn f() {}");
    let first = repo.commit("Initial", 1_700_000_000);
    repo.write("src/lib.rs", "pub fn g() {}");
    let second = repo.commit_as(BOB, "Rename f to g", 1_700_000_100);
    repo.annotated_tag("v0.1", first, "First cut", 1_700_000_050);
    (repo, hex(first), hex(second))
}

#[tokio::test]
async fn repository_info() {
    let (repo, _, second) = fixture();
    let (status, body) = get(&repo, "/api/v1/repository").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "native");
    assert_eq!(body["default_branch"], "main");
    assert_eq!(body["head_commit"]["oid"], second);
    assert_eq!(body["commit_count"], 2);
}

#[tokio::test]
async fn tree_listing_with_last_commits() {
    let (repo, first, second) = fixture();
    let (status, body) = get(&repo, "/api/v1/repository/tree").await;
    assert_eq!(status, StatusCode::OK);

    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "src");
    assert_eq!(entries[0]["entry_type"], "directory");
    assert_eq!(entries[0]["last_commit"]["oid"], second);
    assert_eq!(entries[1]["name"], "README.md");
    assert_eq!(entries[1]["size"], 5);
    assert_eq!(entries[1]["last_commit"]["oid"], first);

    let (status, body) = get(&repo, &format!("/api/v1/repository/tree?rev={first}&path=src&include_last_commit=false")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["path"], "src/lib.rs");
    assert!(body[0]["last_commit"].is_null());
}

#[tokio::test]
async fn last_commit_and_missing_paths() {
    let (repo, first, _) = fixture();
    let (status, body) = get(&repo, "/api/v1/repository/last-commit?path=README.md").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["oid"], first);
    assert_eq!(body["author"]["name"], "Alice");

    let (status, body) = get(&repo, "/api/v1/repository/last-commit?path=nope.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope.txt"));

    let (status, _) = get(&repo, "/api/v1/repository/follow?path=README.md").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commits_and_search() {
    let (repo, first, second) = fixture();
    let (status, body) = get(&repo, "/api/v1/commits?page=1&page_size=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["has_more"], true);
    assert_eq!(body["commits"][0]["oid"], second);

    let (_, body) = get(&repo, "/api/v1/commits?page=2&page_size=1").await;
    assert_eq!(body["has_more"], false);
    assert_eq!(body["commits"][0]["oid"], first);

    let (status, body) = get(&repo, "/api/v1/commits/search?q=author:bob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["oid"], second);
}

#[tokio::test]
async fn branches_and_tags() {
    let (repo, first, _) = fixture();
    let (_, body) = get(&repo, "/api/v1/branches").await;
    assert_eq!(body[0]["name"], "main");
    assert_eq!(body[0]["is_default"], true);

    let (_, body) = get(&repo, "/api/v1/tags").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["tags"][0]["name"], "v0.1");
    assert_eq!(body["tags"][0]["annotated"], true);
    assert_eq!(body["tags"][0]["target"], first);
    assert_eq!(body["tags"][0]["message"], "First cut");
}
