mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use folio::cache::CacheStore;

use support::{CACHE_PREFIX, MemoryRepos, TestApp, bearer, json_body};

const AUTHOR: i64 = 10;
const STRANGER: i64 = 20;

fn category_cache_key() -> String {
    format!("{CACHE_PREFIX}:category")
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user_id));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    app.router
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response")
}

#[tokio::test]
async fn create_title_cases_and_returns_id() {
    let repos = MemoryRepos::new();
    let app = TestApp::new(repos.clone(), None);

    let response = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({"title": "python tips"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json_body(response).await;
    assert_eq!(body["message"], "New category successfully created");
    let id = body["id"].as_i64().expect("id");

    let stored = repos.category(id).expect("stored category");
    assert_eq!(stored.title, "Python Tips");
    assert_eq!(stored.author_id, AUTHOR);
    assert_eq!(stored.parent_id, None);
}

#[tokio::test]
async fn create_under_parent_from_body_or_path() {
    let repos = MemoryRepos::new();
    let parent = repos.seed_category("Languages", None, AUTHOR);
    let app = TestApp::new(repos.clone(), None);

    let from_body = send(
        &app,
        Method::POST,
        "/categories/",
        Some(STRANGER),
        Some(json!({"title": "rust", "parent": parent.id})),
    )
    .await;
    assert_eq!(from_body.status(), StatusCode::CREATED);
    let id = json_body(from_body).await["id"].as_i64().expect("id");
    assert_eq!(repos.category(id).expect("child").parent_id, Some(parent.id));

    let from_path = send(
        &app,
        Method::POST,
        &format!("/categories/{}/create/", parent.id),
        Some(STRANGER),
        Some(json!({"title": "go"})),
    )
    .await;
    assert_eq!(from_path.status(), StatusCode::CREATED);
    let id = json_body(from_path).await["id"].as_i64().expect("id");
    let child = repos.category(id).expect("child");
    assert_eq!(child.parent_id, Some(parent.id));
    assert_eq!(child.title, "Go");
}

#[tokio::test]
async fn create_requires_authentication() {
    let app = TestApp::new(MemoryRepos::new(), None);

    let response = send(
        &app,
        Method::POST,
        "/categories/",
        None,
        Some(json!({"title": "rust"})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_rejected_even_on_reads() {
    let app = TestApp::new(MemoryRepos::new(), None);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/categories/")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_validates_title_and_parent() {
    let app = TestApp::new(MemoryRepos::new(), None);

    let blank = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({"title": "   "})),
    )
    .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    let body = json_body(blank).await;
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["fields"]["title"].is_array());

    let too_long = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({"title": "x".repeat(101)})),
    )
    .await;
    assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);

    let missing_title = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({})),
    )
    .await;
    assert_eq!(missing_title.status(), StatusCode::BAD_REQUEST);

    let missing_parent = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({"title": "rust", "parent": 999})),
    )
    .await;
    assert_eq!(missing_parent.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_and_retrieve_return_trees() {
    let repos = MemoryRepos::new();
    let root = repos.seed_category("Root", None, AUTHOR);
    let child = repos.seed_category("Child", Some(root.id), AUTHOR);
    repos.seed_category("Leaf", Some(child.id), AUTHOR);
    repos.seed_category("Other", None, AUTHOR);
    let app = TestApp::new(repos, None);

    let list = send(&app, Method::GET, "/categories/", None, None).await;
    assert_eq!(list.status(), StatusCode::OK);
    let forest = json_body(list).await;
    assert_eq!(forest.as_array().expect("forest").len(), 2);
    assert_eq!(forest[0]["children"][0]["children"][0]["title"], "Leaf");

    let single = send(
        &app,
        Method::GET,
        &format!("/categories/{}/", child.id),
        None,
        None,
    )
    .await;
    assert_eq!(single.status(), StatusCode::OK);
    let tree = json_body(single).await;
    assert_eq!(tree["id"], child.id);
    assert_eq!(tree["children"].as_array().expect("children").len(), 1);

    let missing = send(&app, Method::GET, "/categories/999/", None, None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_invalidate_the_cached_listing() {
    let repos = MemoryRepos::new();
    let app = TestApp::new(repos, None);

    send(&app, Method::GET, "/categories/", None, None).await;
    assert!(
        app.cache
            .get(&category_cache_key())
            .await
            .expect("cache get")
            .is_some()
    );

    let created = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({"title": "fresh"})),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert!(
        app.cache
            .get(&category_cache_key())
            .await
            .expect("cache get")
            .is_none()
    );

    let list = send(&app, Method::GET, "/categories/", None, None).await;
    let forest = json_body(list).await;
    assert_eq!(forest[0]["title"], "Fresh");
}

#[tokio::test]
async fn only_the_author_may_update_or_delete() {
    let repos = MemoryRepos::new();
    let category = repos.seed_category("Mine", None, AUTHOR);
    let app = TestApp::new(repos.clone(), None);
    let uri = format!("/categories/{}/", category.id);

    let patch = send(
        &app,
        Method::PATCH,
        &uri,
        Some(STRANGER),
        Some(json!({"title": "theirs"})),
    )
    .await;
    assert_eq!(patch.status(), StatusCode::FORBIDDEN);

    let delete = send(&app, Method::DELETE, &uri, Some(STRANGER), None).await;
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    let anonymous = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(repos.category(category.id).expect("kept").title, "Mine");
}

#[tokio::test]
async fn update_renormalizes_title_and_moves_category() {
    let repos = MemoryRepos::new();
    let first = repos.seed_category("First", None, AUTHOR);
    let second = repos.seed_category("Second", None, AUTHOR);
    let leaf = repos.seed_category("Leaf", Some(first.id), AUTHOR);
    let app = TestApp::new(repos.clone(), None);

    let put = send(
        &app,
        Method::PUT,
        &format!("/categories/{}/", first.id),
        Some(AUTHOR),
        Some(json!({"title": "first steps", "parent": second.id})),
    )
    .await;
    assert_eq!(put.status(), StatusCode::OK);
    let body = json_body(put).await;
    assert_eq!(body["title"], "First Steps");
    assert_eq!(body["parent_id"], second.id);

    let moved_leaf = repos.category(leaf.id).expect("leaf");
    assert_eq!(
        moved_leaf.path,
        format!("/{}/{}/{}/", second.id, first.id, leaf.id)
    );

    let to_root = send(
        &app,
        Method::PATCH,
        &format!("/categories/{}/", first.id),
        Some(AUTHOR),
        Some(json!({"parent": null})),
    )
    .await;
    assert_eq!(to_root.status(), StatusCode::OK);
    let moved = repos.category(first.id).expect("first");
    assert_eq!(moved.parent_id, None);
    assert_eq!(moved.title, "First Steps");
}

#[tokio::test]
async fn put_requires_title() {
    let repos = MemoryRepos::new();
    let category = repos.seed_category("Mine", None, AUTHOR);
    let app = TestApp::new(repos, None);

    let response = send(
        &app,
        Method::PUT,
        &format!("/categories/{}/", category.id),
        Some(AUTHOR),
        Some(json!({"parent": null})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reparenting_under_a_descendant_is_rejected() {
    let repos = MemoryRepos::new();
    let root = repos.seed_category("Root", None, AUTHOR);
    let child = repos.seed_category("Child", Some(root.id), AUTHOR);
    let grandchild = repos.seed_category("Grandchild", Some(child.id), AUTHOR);
    let app = TestApp::new(repos.clone(), None);
    let uri = format!("/categories/{}/", root.id);

    for parent in [root.id, grandchild.id] {
        let response = send(
            &app,
            Method::PATCH,
            &uri,
            Some(AUTHOR),
            Some(json!({"parent": parent})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let missing = send(
        &app,
        Method::PATCH,
        &uri,
        Some(AUTHOR),
        Some(json!({"parent": 999})),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    assert_eq!(repos.category(root.id).expect("root").parent_id, None);
}

#[tokio::test]
async fn delete_cascades_to_descendants_and_posts() {
    let repos = MemoryRepos::new();
    let root = repos.seed_category("Root", None, AUTHOR);
    let child = repos.seed_category("Child", Some(root.id), AUTHOR);
    let keep = repos.seed_category("Keep", None, AUTHOR);
    repos.seed_post(root.id, AUTHOR, false);
    repos.seed_post(child.id, AUTHOR, true);
    let kept_post = repos.seed_post(keep.id, AUTHOR, false);
    let app = TestApp::new(repos.clone(), None);

    let response = send(
        &app,
        Method::DELETE,
        &format!("/categories/{}/", root.id),
        Some(AUTHOR),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(repos.category(root.id).is_none());
    assert!(repos.category(child.id).is_none());
    assert_eq!(repos.category_count(), 1);
    assert_eq!(repos.post_ids(), vec![kept_post]);

    let again = send(
        &app,
        Method::DELETE,
        &format!("/categories/{}/", root.id),
        Some(AUTHOR),
        None,
    )
    .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn title_that_grows_when_cased_is_rejected() {
    let repos = MemoryRepos::new();
    let app = TestApp::new(repos.clone(), None);

    let response = send(
        &app,
        Method::POST,
        "/categories/",
        Some(AUTHOR),
        Some(json!({"title": "ß ".repeat(50)})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(repos.category_count(), 0);
}

#[tokio::test]
async fn non_numeric_ids_get_a_json_error() {
    let app = TestApp::new(MemoryRepos::new(), None);

    for (method, uri, user) in [
        (Method::GET, "/categories/abc/", None),
        (Method::GET, "/categories/abc/posts/", None),
        (Method::PATCH, "/categories/abc/", Some(AUTHOR)),
        (Method::DELETE, "/categories/abc/", Some(AUTHOR)),
    ] {
        let body = (method == Method::PATCH).then(|| json!({"title": "x"}));
        let response = send(&app, method, uri, user, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "bad_request");
        assert!(body["error"]["message"].is_string());
    }

    let anonymous = send(&app, Method::DELETE, "/categories/abc/", None, None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}
