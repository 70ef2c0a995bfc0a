use std::path::Path;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use git2::{Oid, Repository, Signature, Time};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use blame_viewer::git::GitRepository;
use blame_viewer::models::UNCOMMITTED_COMMIT_ID;
use blame_viewer::routes::{create_router, AppState};

/// `git blame` runs through the command line. Tests that need it report a
/// skip on stderr when it is not installed.
fn git_missing(test: &str) -> bool {
    let available = std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !available {
        eprintln!("skipping {}: git is not installed", test);
    }
    !available
}

fn commit(repo: &Repository, author: &str, seconds: i64, content: &str, message: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join("f.txt"), content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("f.txt")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let email = format!("{}@example.com", author.to_lowercase());
    let signature = Signature::new(author, &email, &Time::new(seconds, 60)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap()
}

struct Fixture {
    _dir: TempDir,
    state: AppState,
    first: Oid,
    second: Oid,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    repo.remote("origin", "https://github.com/owner/project.git").unwrap();
    let first = commit(&repo, "Ada", 1_700_000_000, "fn main() {\n    run(a);\n}\n", "Initial");
    let second = commit(
        &repo,
        "Bob",
        1_700_100_000,
        "fn main() {\n    run(a, b);\n}\n",
        "Pass b\n\nBecause b matters.\n",
    );

    let state = AppState::new(GitRepository::open(dir.path()).unwrap()).unwrap();
    Fixture {
        _dir: dir,
        state,
        first,
        second,
    }
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let response = create_router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn settled_blame(state: &AppState, uri: &str) -> Value {
    for _ in 0..250 {
        let (status, snapshot) = get(state, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", snapshot);
        if snapshot["status"] != "loading" {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("blame for {} did not finish", uri);
}

fn line<'a>(snapshot: &'a Value, number: usize) -> &'a Value {
    &snapshot["lines"][number - 1]
}

#[tokio::test]
async fn repository_info_includes_web_root() {
    let fixture = fixture();

    let (status, info) = get(&fixture.state, "/api/v1/repository").await;

    assert_eq!(status, StatusCode::OK);
    assert!(info["head_branch"].as_str().is_some());
    assert_eq!(info["head_commit"]["oid"], fixture.second.to_string());
    assert_eq!(info["head_commit"]["summary"], "Pass b");
    assert_eq!(info["web_root_url"], "https://github.com/owner/project");
}

#[tokio::test]
async fn blame_splits_edited_line() {
    if git_missing("blame_splits_edited_line") {
        return;
    }
    let fixture = fixture();

    let snapshot = settled_blame(&fixture.state, "/api/v1/blame?path=f.txt").await;

    assert_eq!(snapshot["status"], "complete", "{}", snapshot);
    assert_eq!(snapshot["line_count"], 3);
    assert_eq!(snapshot["resolved_count"], 3);
    assert_eq!(snapshot["blocks"].as_array().unwrap().len(), 3);

    let edited = line(&snapshot, 2);
    assert_eq!(edited["is_new"], false);
    let parts = edited["parts"].as_array().unwrap();
    let text: String = parts.iter().map(|p| p["text"].as_str().unwrap()).collect();
    assert_eq!(text, "    run(a, b);");
    assert!(parts.contains(&serde_json::json!({"text": ", b", "status": "new"})));

    assert_eq!(line(&snapshot, 1)["is_new"], true);
    assert_eq!(line(&snapshot, 3)["is_new"], true);

    let second = snapshot["commits"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == fixture.second.to_string())
        .unwrap();
    assert_eq!(second["author"]["name"], "Bob");
    assert_eq!(second["summary"], "Pass b");
    assert_eq!(second["author_date"], "2023-11-16T03:00:00+01:00");
    assert_eq!(
        second["web_url"],
        format!("https://github.com/owner/project/commit/{}", fixture.second)
    );
}

#[tokio::test]
async fn line_detail_points_at_parent_version() {
    if git_missing("line_detail_points_at_parent_version") {
        return;
    }
    let fixture = fixture();
    settled_blame(&fixture.state, "/api/v1/blame?path=f.txt").await;

    let (status, detail) = get(&fixture.state, "/api/v1/blame/line?path=f.txt&line=2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["commit"]["id"], fixture.second.to_string());
    assert_eq!(detail["block"]["start_line"], 2);
    assert_eq!(detail["previous"]["commit_id"], fixture.first.to_string());
    assert_eq!(detail["previous"]["file_name"], "f.txt");
    assert_eq!(detail["previous"]["line_number"], 2);

    let (status, detail) = get(&fixture.state, "/api/v1/blame/line?path=f.txt&line=1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["previous"].is_null());

    let (status, _) = get(&fixture.state, "/api/v1/blame/line?path=f.txt&line=9").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blame_at_earlier_commit() {
    if git_missing("blame_at_earlier_commit") {
        return;
    }
    let fixture = fixture();
    let uri = format!("/api/v1/blame?path=f.txt&commit={}", fixture.first);

    let snapshot = settled_blame(&fixture.state, &uri).await;

    assert_eq!(snapshot["status"], "complete", "{}", snapshot);
    assert_eq!(line(&snapshot, 2)["parts"][0]["text"], "    run(a);");
    let commits = snapshot["commits"].as_array().unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0]["id"], fixture.first.to_string());
}

#[tokio::test]
async fn commit_message_is_fetched_on_demand() {
    if git_missing("commit_message_is_fetched_on_demand") {
        return;
    }
    let fixture = fixture();
    let snapshot = settled_blame(&fixture.state, "/api/v1/blame?path=f.txt").await;
    let second = snapshot["commits"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == fixture.second.to_string())
        .unwrap();
    assert!(second["message"].is_null());

    let uri = format!("/api/v1/commits/{}/message?path=f.txt", fixture.second);
    let (status, message) = get(&fixture.state, &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(message["message"], "Pass b\n\nBecause b matters.");

    let (_, snapshot) = get(&fixture.state, "/api/v1/blame?path=f.txt").await;
    let second = snapshot["commits"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == fixture.second.to_string())
        .unwrap();
    assert_eq!(second["message"], "Pass b\n\nBecause b matters.");

    let (status, _) = get(&fixture.state, "/api/v1/commits/unknown/message?path=f.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uncommitted_edit_is_attributed_to_working_copy() {
    if git_missing("uncommitted_edit_is_attributed_to_working_copy") {
        return;
    }
    let fixture = fixture();
    let root = fixture.state.repo.root.clone();
    std::fs::write(root.join("f.txt"), "fn main() {\n    run(a, b);\n} // end\n").unwrap();

    let snapshot = settled_blame(&fixture.state, "/api/v1/blame?path=f.txt").await;

    assert_eq!(snapshot["status"], "complete", "{}", snapshot);
    assert_eq!(snapshot["blocks"][2]["commit_id"], UNCOMMITTED_COMMIT_ID);
    let text: String = line(&snapshot, 3)["parts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["text"].as_str().unwrap())
        .collect();
    assert_eq!(text, "} // end");
}

#[tokio::test]
async fn edited_working_copy_is_blamed_again() {
    if git_missing("edited_working_copy_is_blamed_again") {
        return;
    }
    let fixture = fixture();
    let before = settled_blame(&fixture.state, "/api/v1/blame?path=f.txt").await;
    assert_eq!(before["line_count"], 3);

    let root = fixture.state.repo.root.clone();
    std::fs::write(root.join("f.txt"), "fn main() {\n    run(a, b);\n}\n// tail\n").unwrap();
    let after = settled_blame(&fixture.state, "/api/v1/blame?path=f.txt").await;

    assert_eq!(after["status"], "complete", "{}", after);
    assert_eq!(after["line_count"], 4);
    assert_eq!(after["blocks"][3]["commit_id"], UNCOMMITTED_COMMIT_ID);

    let (status, detail) = get(&fixture.state, "/api/v1/blame/line?path=f.txt&line=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["line"]["parts"][0]["text"], "// tail");
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let fixture = fixture();

    let (status, body) = get(&fixture.state, "/api/v1/blame?path=../outside.txt").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid path"));

    let (status, _) = get(&fixture.state, "/api/v1/blame?path=missing.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
