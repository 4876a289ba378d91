//! End-to-end behaviour of the gate and the normalizer behind an axum router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use axum::body::Body;
use axum::extract::State;
use axum::handler::Handler;
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

use pawpost_gate::auth::ValidationOptions;
use pawpost_gate::normalize::UnhandledFailure;
use pawpost_gate::{
    run_in_transaction, AuthorizationGate, Authorized, CredentialValidator, DomainError,
    GateConfig, HandlerFailure, PermissionTable, StorageSession,
};

const SECRET: &[u8] = b"pawpost-integration-secret";
const AUDIENCE: &str = "pawpost";

const CONFIG: &str = r#"
[auth]
audience = "pawpost"
algorithm = "HS256"
secret = "pawpost-integration-secret"

[permissions]
"GET /posts/" = "get:posts"
"POST /posts/" = "post:post"
"#;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn token(permissions: &[&str]) -> String {
    let claims = json!({
        "sub": "auth0|pet-owner",
        "aud": AUDIENCE,
        "exp": now() + 600,
        "permissions": permissions,
    });
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

#[derive(Default)]
struct PetSession {
    pending: Vec<String>,
    names: Vec<String>,
    rollbacks: usize,
}

impl PetSession {
    fn insert(&mut self, name: &str) -> Result<(), DomainError> {
        if self.names.iter().chain(&self.pending).any(|n| n == name) {
            return Err(DomainError::Integrity(format!(
                "duplicate key value violates unique constraint \"pet_name_key\": {name}"
            )));
        }
        self.pending.push(name.to_string());
        Ok(())
    }
}

impl StorageSession for PetSession {
    fn commit(&mut self) -> Result<(), DomainError> {
        self.names.append(&mut self.pending);
        Ok(())
    }

    fn rollback(&mut self) {
        self.rollbacks += 1;
        self.pending.clear();
    }
}

#[derive(Clone, Default)]
struct AppState {
    pets: Arc<Mutex<PetSession>>,
    list_calls: Arc<AtomicUsize>,
    create_calls: Arc<AtomicUsize>,
}

#[derive(Deserialize)]
struct NewPet {
    name: String,
    #[serde(default)]
    crash: bool,
}

async fn list_posts(State(state): State<AppState>, claims: Authorized) -> Json<Value> {
    state.list_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "posts": [],
        "total_posts": 0,
        "viewer": claims.subject(),
    }))
}

async fn create_post(State(state): State<AppState>, _claims: Authorized) -> StatusCode {
    state.create_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::CREATED
}

async fn create_pet(
    State(state): State<AppState>,
    Json(pet): Json<NewPet>,
) -> Result<StatusCode, HandlerFailure> {
    let mut session = state.pets.lock().unwrap();
    run_in_transaction(&mut *session, |s| {
        s.insert(&pet.name)?;
        if pet.crash {
            return Err(DomainError::Unclassified(anyhow!("lost connection to database")));
        }
        Ok(())
    })?;
    Ok(StatusCode::CREATED)
}

fn app(state: AppState) -> Router {
    let config: GateConfig = toml::from_str(CONFIG).unwrap();
    let validator = CredentialValidator::from_config(config.auth_config().unwrap()).unwrap();
    let gate = AuthorizationGate::new(validator);
    let table = PermissionTable::from_config(&config).unwrap();

    let list = gate.require(table.permission_for("GET /posts/").unwrap());
    let create = gate.require(table.permission_for("POST /posts/").unwrap());

    Router::new()
        .route(
            "/posts/",
            get(list_posts.layer(list)).post(create_post.layer(create)),
        )
        .route("/pets/", post(create_pet))
        .with_state(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Response) {
    let response = app.oneshot(request).await.unwrap();
    (response.status(), response)
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get_posts(authorization: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/posts/");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_pet(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/pets/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn missing_header_is_401_and_handler_never_runs() {
    let state = AppState::default();
    let (status, response) = send(app(state.clone()), get_posts(None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], 401);
    assert_eq!(body["title"], "Unauthorized");
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_header_is_401() {
    let state = AppState::default();
    let (status, _) = send(app(state.clone()), get_posts(Some(token(&["get:posts"])))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn granted_permission_invokes_handler_once_with_claims() {
    let state = AppState::default();
    let header = format!("Bearer {}", token(&["get:posts"]));
    let (status, response) = send(app(state.clone()), get_posts(Some(header))).await;

    assert_eq!(status, StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["viewer"], "auth0|pet-owner");
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_posts_token_cannot_create_posts() {
    let state = AppState::default();
    let request = Request::builder()
        .method("POST")
        .uri("/posts/")
        .header(AUTHORIZATION, format!("Bearer {}", token(&["get:posts"])))
        .body(Body::empty())
        .unwrap();

    let (status, response) = send(app(state.clone()), request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], 403);
    assert_eq!(body["title"], "Forbidden");
    assert!(body["description"].as_str().unwrap().contains("post:post"));
    assert_eq!(state.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn token_for_another_audience_is_rejected() {
    let state = AppState::default();
    let claims = json!({
        "sub": "auth0|pet-owner",
        "aud": "some-other-api",
        "exp": now() + 600,
        "permissions": ["get:posts"],
    });
    let foreign = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

    let (status, response) =
        send(app(state.clone()), get_posts(Some(format!("Bearer {foreign}")))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["description"], "Incorrect claims. Please check the audience and issuer.");
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn token_without_audience_is_rejected() {
    let state = AppState::default();
    let claims = json!({
        "sub": "auth0|pet-owner",
        "exp": now() + 600,
        "permissions": ["get:posts"],
    });
    let unscoped = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

    let (status, response) =
        send(app(state.clone()), get_posts(Some(format!("Bearer {unscoped}")))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], 401);
    assert_eq!(body["description"], "Incorrect claims. Please check the audience and issuer.");
    assert_eq!(state.list_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn duplicate_pet_is_422_and_rolled_back() {
    let state = AppState::default();

    let (status, _) = send(app(state.clone()), post_pet(json!({"name": "Biscuit"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, response) = send(app(state.clone()), post_pet(json!({"name": "Biscuit"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["code"], 422);
    assert_eq!(body["title"], "Unprocessable Entity");

    let pets = state.pets.lock().unwrap();
    assert_eq!(pets.rollbacks, 1);
    assert_eq!(pets.names, vec!["Biscuit"]);
    assert!(pets.pending.is_empty());
}

#[tokio::test]
async fn unclassified_failure_is_reraised_after_rollback() {
    let state = AppState::default();
    let (status, response) =
        send(app(state.clone()), post_pet(json!({"name": "Mochi", "crash": true}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let carried = response.extensions().get::<UnhandledFailure>().cloned().unwrap();
    assert_eq!(carried.0.to_string(), "lost connection to database");

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());

    let pets = state.pets.lock().unwrap();
    assert_eq!(pets.rollbacks, 1);
    assert!(pets.names.is_empty());
}

#[tokio::test]
async fn revalidating_a_token_yields_identical_claims() {
    let validator = CredentialValidator::with_secret(
        Algorithm::HS256,
        SECRET,
        ValidationOptions {
            audience: Some(AUDIENCE.to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    let header = format!("Bearer {}", token(&["get:posts", "post:post"]));

    let first = validator.validate(Some(&header)).await.unwrap();
    let second = validator.validate(Some(&header)).await.unwrap();
    assert_eq!(first, second);
    assert!(first.has_permission("post:post"));
}
