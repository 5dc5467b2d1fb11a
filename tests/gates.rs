//! End-to-end gate behaviour through the real router.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;

use posts_api::{
    app::build_router,
    config::Config,
    repos::{
        InMemoryPostStore, NewPost, PostChanges, PostOwnership, PostRow, PostStore, RepoError,
        ResourceStore,
    },
    services::auth::{Identity, JwtIssuer},
    state::AppState,
};

const SECRET: &str = "integration-test-secret";
const CLIENT: [u8; 4] = [198, 51, 100, 7];

fn config(extra: &[(&str, &str)]) -> Config {
    let mut vars: Vec<(String, String)> = vec![("JWT_SECRET".into(), SECRET.into())];
    vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    Config::from_lookup(move |key| {
        vars.iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .expect("test config")
}

fn app_with_store<S: PostStore + 'static>(store: Arc<S>, extra: &[(&str, &str)]) -> Router {
    let config = config(extra);
    build_router(AppState::new(store, &config), &config).expect("gate pipelines are valid")
}

fn app(extra: &[(&str, &str)]) -> (Router, Arc<InMemoryPostStore>) {
    let store = Arc::new(InMemoryPostStore::new());
    (app_with_store(store.clone(), extra), store)
}

fn token_for(id: &str, email: &str) -> String {
    JwtIssuer::new(SECRET.as_bytes(), 600)
        .issue(&Identity::new(id, email))
        .expect("Failed to issue test token")
}

fn request(
    method: Method,
    uri: &str,
    peer: [u8; 4],
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let mut req = builder.body(body).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40_000))));
    req
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn post_body(title: &str) -> Value {
    json!({ "title": title, "desc": "short", "content": "long", "img": null })
}

async fn seed(store: &InMemoryPostStore, owner_email: &str, owner_id: &str) -> i64 {
    store
        .create(NewPost {
            title: "seeded".into(),
            desc: "d".into(),
            img: None,
            content: "c".into(),
            owner_email: owner_email.into(),
            owner_id: owner_id.into(),
        })
        .await
        .unwrap()
        .post_id
}

#[tokio::test]
async fn optional_route_without_header_runs_anonymously() {
    let (router, _) = app(&[]);

    let (status, _, body) = send(&router, request(Method::GET, "/api/posts", CLIENT, None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn optional_route_swallows_bad_tokens() {
    let (router, _) = app(&[]);

    let (status, _, _) = send(
        &router,
        request(Method::GET, "/api/posts", CLIENT, Some("not.a.jwt"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn required_route_without_token_is_401() {
    let (router, _) = app(&[]);

    let (status, headers, body) = send(
        &router,
        request(Method::POST, "/api/posts", CLIENT, None, Some(post_body("x"))),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Access token required" }));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn foreign_signature_is_403() {
    let (router, _) = app(&[]);
    let foreign = JwtIssuer::new(b"someone-elses-secret", 600)
        .issue(&Identity::new("u1", "a@x.com"))
        .unwrap();

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/api/auth/me", CLIENT, Some(&foreign), None),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Invalid or expired token" }));
}

#[tokio::test]
async fn expired_token_is_403() {
    let (router, _) = app(&[]);
    let issued_at = Utc::now().timestamp() - 3600;
    let expired = JwtIssuer::new(SECRET.as_bytes(), 600)
        .issue_at(&Identity::new("u1", "a@x.com"), issued_at)
        .unwrap();

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/api/auth/me", CLIENT, Some(&expired), None),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Invalid or expired token" }));
}

#[tokio::test]
async fn me_returns_the_token_identity() {
    let (router, _) = app(&[]);
    // external issuers may use `sub` instead of `userId`
    let exp = Utc::now().timestamp() + 600;
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "u42", "email": "me@x.com", "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/api/auth/me", CLIENT, Some(&token), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": "u42", "email": "me@x.com" }));
}

#[tokio::test]
async fn created_post_is_stamped_with_the_token_owner() {
    let (router, _) = app(&[]);
    let token = token_for("u1", "a@x.com");

    let (status, _, body) = send(
        &router,
        request(Method::POST, "/api/posts", CLIENT, Some(&token), Some(post_body("hello"))),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "a@x.com");
    assert_eq!(body["userId"], "u1");
    assert_eq!(body["title"], "hello");
}

#[tokio::test]
async fn create_with_missing_fields_is_400() {
    let (router, _) = app(&[]);
    let token = token_for("u1", "a@x.com");

    let (status, _, body) = send(
        &router,
        request(
            Method::POST,
            "/api/posts",
            CLIENT,
            Some(&token),
            Some(json!({ "title": "only a title" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "error": "Missing required fields: title, desc, and content are required" })
    );
}

#[tokio::test]
async fn owner_matched_by_email_or_id_may_update() {
    let (router, store) = app(&[]);
    let post_id = seed(&store, "a@x.com", "u1").await;
    let uri = format!("/api/posts/{post_id}");

    let by_email = token_for("u2", "a@x.com");
    let (status, _, body) = send(
        &router,
        request(Method::PUT, &uri, CLIENT, Some(&by_email), Some(post_body("by email"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "by email");

    let by_id = token_for("u1", "b@x.com");
    let (status, _, body) = send(
        &router,
        request(Method::PUT, &uri, CLIENT, Some(&by_id), Some(post_body("by id"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "by id");
}

#[tokio::test]
async fn non_owner_is_forbidden_before_the_handler_runs() {
    let (router, store) = app(&[]);
    let post_id = seed(&store, "a@x.com", "u1").await;
    let stranger = token_for("u2", "b@x.com");

    // an invalid body would be a 400 if the handler ran
    let (status, _, body) = send(
        &router,
        request(
            Method::PUT,
            &format!("/api/posts/{post_id}"),
            CLIENT,
            Some(&stranger),
            Some(json!({})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({ "error": "Access denied. You can only modify your own posts." })
    );

    let (status, _, _) = send(
        &router,
        request(
            Method::DELETE,
            &format!("/api/posts/{post_id}"),
            CLIENT,
            Some(&stranger),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(store.get(post_id).await.unwrap().is_some());
}

#[tokio::test]
async fn owner_can_delete() {
    let (router, store) = app(&[]);
    let post_id = seed(&store, "a@x.com", "u1").await;
    let owner = token_for("u1", "a@x.com");

    let (status, _, body) = send(
        &router,
        request(
            Method::DELETE,
            &format!("/api/posts/{post_id}"),
            CLIENT,
            Some(&owner),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Post deleted successfully" }));
    assert!(store.get(post_id).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_post_is_404_not_403() {
    let (router, _) = app(&[]);
    let token = token_for("u2", "b@x.com");

    for method in [Method::PUT, Method::DELETE] {
        let (status, _, body) = send(
            &router,
            request(method, "/api/posts/999", CLIENT, Some(&token), Some(post_body("x"))),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Post not found" }));
    }

    let (status, _, _) = send(
        &router,
        request(Method::GET, "/api/posts/999", CLIENT, None, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ownership_check_needs_a_token() {
    let (router, store) = app(&[]);
    let post_id = seed(&store, "a@x.com", "u1").await;

    let (status, _, _) = send(
        &router,
        request(
            Method::DELETE,
            &format!("/api/posts/{post_id}"),
            CLIENT,
            None,
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

struct UnreachableStore;

fn pool_timed_out() -> RepoError {
    RepoError::Db(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl ResourceStore for UnreachableStore {
    async fn find_ownership(&self, _post_id: i64) -> Result<Option<PostOwnership>, RepoError> {
        Err(pool_timed_out())
    }
}

#[async_trait]
impl PostStore for UnreachableStore {
    async fn list(&self) -> Result<Vec<PostRow>, RepoError> {
        Err(pool_timed_out())
    }

    async fn create(&self, _post: NewPost) -> Result<PostRow, RepoError> {
        Err(pool_timed_out())
    }

    async fn get(&self, _post_id: i64) -> Result<Option<PostRow>, RepoError> {
        Err(pool_timed_out())
    }

    async fn update(
        &self,
        _post_id: i64,
        _changes: PostChanges,
    ) -> Result<Option<PostRow>, RepoError> {
        Err(pool_timed_out())
    }

    async fn delete(&self, _post_id: i64) -> Result<bool, RepoError> {
        Err(pool_timed_out())
    }
}

#[tokio::test]
async fn store_failure_during_ownership_check_is_500_without_detail() {
    let router = app_with_store(Arc::new(UnreachableStore), &[]);
    let token = token_for("u1", "a@x.com");

    let (status, _, body) = send(
        &router,
        request(Method::DELETE, "/api/posts/1", CLIENT, Some(&token), None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Authorization check failed" }));

    let (status, _, body) = send(&router, request(Method::GET, "/api/posts", CLIENT, None, None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to fetch posts" }));
}

#[tokio::test]
async fn client_over_quota_gets_429_with_retry_after() {
    let (router, _) = app(&[("RATE_LIMIT_MAX_REQUESTS", "3")]);

    for _ in 0..3 {
        let (status, _, _) = send(&router, request(Method::GET, "/api/posts", CLIENT, None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) =
        send(&router, request(Method::GET, "/api/posts", CLIENT, None, None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({ "error": "Too many requests. Please try again later." }));
    let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 900);

    // other clients are unaffected
    let (status, _, _) = send(
        &router,
        request(Method::GET, "/api/posts", [203, 0, 113, 5], None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // /health sits outside the gated API
    let (status, _, body) = send(&router, request(Method::GET, "/health", CLIENT, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Server is running!" }));
}

#[tokio::test]
async fn rate_limit_runs_before_authentication() {
    let (router, _) = app(&[("RATE_LIMIT_MAX_REQUESTS", "1")]);

    let (status, _, _) = send(&router, request(Method::GET, "/api/auth/me", CLIENT, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&router, request(Method::GET, "/api/auth/me", CLIENT, None, None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn spoofed_forwarded_for_does_not_reset_quota() {
    let (router, _) = app(&[("RATE_LIMIT_MAX_REQUESTS", "1")]);

    let mut first = request(Method::GET, "/api/posts", CLIENT, None, None);
    first
        .headers_mut()
        .insert("x-forwarded-for", "1.1.1.1".parse().unwrap());
    let mut second = request(Method::GET, "/api/posts", CLIENT, None, None);
    second
        .headers_mut()
        .insert("x-forwarded-for", "2.2.2.2".parse().unwrap());

    assert_eq!(send(&router, first).await.0, StatusCode::OK);
    assert_eq!(send(&router, second).await.0, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn trusted_proxy_hop_keys_on_forwarded_client() {
    let (router, _) = app(&[("RATE_LIMIT_MAX_REQUESTS", "1"), ("TRUSTED_PROXY_HOPS", "1")]);
    let proxy = [10, 0, 0, 2];

    let mut first = request(Method::GET, "/api/posts", proxy, None, None);
    first
        .headers_mut()
        .insert("x-forwarded-for", "1.1.1.1".parse().unwrap());
    let mut second = request(Method::GET, "/api/posts", proxy, None, None);
    second
        .headers_mut()
        .insert("x-forwarded-for", "2.2.2.2".parse().unwrap());

    assert_eq!(send(&router, first).await.0, StatusCode::OK);
    assert_eq!(send(&router, second).await.0, StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (router, _) = app(&[]);

    let (status, _, body) = send(&router, request(Method::GET, "/api/nope", CLIENT, None, None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Route not found" }));
}

#[tokio::test]
async fn malformed_json_body_is_a_json_400() {
    let (router, _) = app(&[]);
    let token = token_for("u1", "a@x.com");

    let mut req = request(Method::POST, "/api/posts", CLIENT, Some(&token), None);
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    *req.body_mut() = Body::from("{\"title\": ");

    let (status, _, body) = send(&router, req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Request body must be a JSON object" }));
}

#[tokio::test]
async fn mistyped_field_is_a_json_400() {
    let (router, store) = app(&[]);
    let post_id = seed(&store, "a@x.com", "u1").await;
    let owner = token_for("u1", "a@x.com");

    let (status, _, body) = send(
        &router,
        request(
            Method::PUT,
            &format!("/api/posts/{post_id}"),
            CLIENT,
            Some(&owner),
            Some(json!({ "title": 7, "desc": "d", "content": "c" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Request body must be a JSON object" }));
}

#[tokio::test]
async fn oversized_body_is_a_json_413() {
    let (router, _) = app(&[("BODY_LIMIT_BYTES", "64")]);
    let token = token_for("u1", "a@x.com");
    let long = "x".repeat(256);

    let (status, _, body) = send(
        &router,
        request(Method::POST, "/api/posts", CLIENT, Some(&token), Some(post_body(&long))),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body, json!({ "error": "Request body too large" }));
}

#[tokio::test]
async fn non_numeric_post_id_is_a_json_400() {
    let (router, _) = app(&[]);
    let token = token_for("u1", "a@x.com");

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/api/posts/abc", CLIENT, None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid post id" }));

    // the ownership gate reads the id too
    let (status, _, body) = send(
        &router,
        request(Method::DELETE, "/api/posts/abc", CLIENT, Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid post id" }));
}

#[tokio::test]
async fn user_id_claim_wins_over_sub() {
    let (router, _) = app(&[]);
    let exp = Utc::now().timestamp() + 600;
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "auth0|abc", "userId": 42, "email": "me@x.com", "exp": exp }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let (status, _, body) = send(
        &router,
        request(Method::GET, "/api/auth/me", CLIENT, Some(&token), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": "42", "email": "me@x.com" }));
}
