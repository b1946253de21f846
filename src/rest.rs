//! REST API layer using Axum (exposed on port 11111 by default)
//!
//! - `/register`, `/login`: accounts and bearer tokens.
//! - `/generate`: the quota-gated campaign generation request.
//! - `/usage`: the caller's current quota window.
//! - `/api-docs/openapi.json` and `/swagger-ui`: the OpenAPI document.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{bearer_token, hash_password, verify_password, IdentityResolver, JwtKeys};
use crate::draft::{CampaignDraft, Keywords, Sitelink};
use crate::error::{ApiError, ErrorBody};
use crate::models::{Identity, Plan, UsageProfile, User};
use crate::orchestrator::{GenerateError, Orchestrator};
use crate::quota;
use crate::storage::{Storage, StorageError};

pub const GENERATIONS_USED_HEADER: &str = "x-generations-used";
pub const GENERATIONS_LIMIT_HEADER: &str = "x-generations-limit";

const CREDENTIALS_SHAPE: &str = r#"{"email": "...", "password": "..."}"#;

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    storage: Storage,
    orchestrator: Arc<Orchestrator>,
    jwt: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(storage: Storage, orchestrator: Arc<Orchestrator>, jwt: Arc<JwtKeys>) -> Self {
        Self {
            storage,
            orchestrator,
            jwt,
        }
    }
}

/// Missing or `null` fields read as empty.
#[derive(Deserialize, Serialize, ToSchema)]
pub struct Credentials {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub email: String,
    pub plan: Plan,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct GenerateRequest {
    /// Free-text description of the business. Absent, `null` or blank means no prompt.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub plan: Plan,
    pub generations_used: u32,
    /// Absent for unlimited plans.
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub generation_reset_date: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        register_handler,
        login_handler,
        generate_handler,
        usage_handler,
        health_handler
    ),
    components(schemas(
        Credentials,
        RegisterResponse,
        LoginResponse,
        GenerateRequest,
        UsageResponse,
        HealthResponse,
        ErrorBody,
        CampaignDraft,
        Keywords,
        Sitelink,
        Plan
    )),
    modifiers(&BearerAuth),
    tags((name = "adcraft", description = "Google Ads campaign generation"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = state
        .jwt
        .resolve_identity(bearer_token(req.headers()))
        .await
        .map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer credential");
            ApiError::Unauthorized
        })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Create Axum router with the account, generation and usage endpoints
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let auth_routes = Router::new()
        .route("/usage", get(usage_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // /generate resolves its own credential so a blank prompt is rejected first
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/generate", post(generate_handler))
        .route("/health", get(health_handler))
        .merge(auth_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

/// Unwraps a JSON body, turning axum's plain-text rejection into an `ApiError`.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>, expected: &str) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            tracing::debug!(status = %rejection.status(), reason = %rejection.body_text(), "rejected request body");
            Err(ApiError::BadRequest(format!(
                "Send a JSON body (Content-Type: application/json) like {expected}."
            )))
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = Credentials,
    responses(
        (status = 201, description = "Account created on the free plan", body = RegisterResponse),
        (status = 400, description = "Email or password missing", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    ),
    tag = "adcraft"
)]
async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let payload = json_body(payload, CREDENTIALS_SHAPE)?;
    let email = normalize_email(payload.email.as_deref().unwrap_or_default());
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("Enter a valid email address.".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::BadRequest("Choose a password.".to_string()));
    }
    if state.storage.get_user(&email).map_err(ApiError::internal)?.is_some() {
        return Err(ApiError::Conflict("An account with this email already exists.".to_string()));
    }

    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::internal)?;

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        password_hash: hash,
    };
    let profile = UsageProfile::new(user.id.clone(), Plan::Free, Utc::now());
    match state.storage.create_user(&user, &profile) {
        Ok(()) => {}
        Err(StorageError::DuplicateUser(_)) => {
            return Err(ApiError::Conflict("An account with this email already exists.".to_string()));
        }
        Err(e) => return Err(ApiError::internal(e)),
    }
    state.storage.flush().await.map_err(ApiError::internal)?;
    tracing::info!(user_id = %user.id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            email: user.email,
            plan: profile.plan,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Bearer token issued", body = LoginResponse),
        (status = 401, description = "Wrong email or password", body = ErrorBody)
    ),
    tag = "adcraft"
)]
async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let payload = json_body(payload, CREDENTIALS_SHAPE)?;
    let user = state
        .storage
        .get_user(&normalize_email(payload.email.as_deref().unwrap_or_default()))
        .map_err(ApiError::internal)?
        .ok_or(ApiError::InvalidCredentials)?;

    let password = payload.password.unwrap_or_default();
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash).unwrap_or(false))
        .await
        .map_err(ApiError::internal)?;
    if !verified {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.jwt.create_jwt(&user.id).map_err(ApiError::internal)?;
    Ok(Json(LoginResponse { token }))
}

#[utoipa::path(
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Generated draft; usage in x-generations-used / x-generations-limit", body = CampaignDraft),
        (status = 400, description = "Prompt missing", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 429, description = "Monthly quota used up", body = ErrorBody),
        (status = 500, description = "Profile unavailable", body = ErrorBody),
        (status = 502, description = "Generation failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "adcraft"
)]
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = json_body(payload, r#"{"prompt": "..."}"#)?;
    let prompt = payload.prompt.unwrap_or_default();
    let generated = state
        .orchestrator
        .handle(bearer_token(&headers), &prompt)
        .await?;

    let mut response = Json(generated.draft).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(
        HeaderName::from_static(GENERATIONS_USED_HEADER),
        HeaderValue::from(generated.generations_used),
    );
    if let Some(limit) = generated.limit {
        response_headers.insert(
            HeaderName::from_static(GENERATIONS_LIMIT_HEADER),
            HeaderValue::from(limit),
        );
    }
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/usage",
    responses(
        (status = 200, description = "Current quota window", body = UsageResponse),
        (status = 401, description = "Not signed in", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "adcraft"
)]
async fn usage_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UsageResponse>, ApiError> {
    let profile = state
        .storage
        .get_profile(&identity.user_id)
        .map_err(GenerateError::ProfileUnavailable)?;

    // read-only view: a rolled-over window shows as fresh without being written
    let now = state.orchestrator.clock().now();
    let decision = quota::evaluate(now, &profile, state.orchestrator.limits());
    let generation_reset_date = if decision.reset_occurred {
        now
    } else {
        profile.generation_reset_date
    };

    Ok(Json(UsageResponse {
        plan: profile.plan,
        generations_used: decision.usage,
        limit: decision.limit,
        remaining: decision.remaining(),
        generation_reset_date,
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Server is up", body = HealthResponse)),
    tag = "adcraft"
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
