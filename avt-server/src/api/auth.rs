//! Session authentication
//!
//! Login issues an opaque token in the `avt_session` cookie. The guard
//! middleware resolves it once per request into an [`AuthContext`], checks
//! the caller's role and stores the context in the request extensions where
//! handlers pick it up with `Extension<AuthContext>`.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use avt_common::db::models::{NewUser, Role, User};
use avt_common::db::{sessions, users};

use crate::api::created;
use crate::error::{validated, ApiError, ApiResult};
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "avt_session";

/// Identity of the caller, resolved from the session cookie
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    /// Fail with 403 unless the caller holds one of `roles`
    pub fn require_any(&self, roles: &[Role]) -> ApiResult<()> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Role '{}' is not allowed to perform this action",
                self.role
            )))
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

impl From<&User> for AuthContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

/// Extract the session token from the `Cookie` header(s)
fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn session_cookie(token: &str, max_age: i64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE, token, max_age
    )
}

/// Resolve the session, check the role (empty `roles` = any) and run `next`
async fn authorize(
    state: &AppState,
    mut request: Request,
    next: Next,
    roles: &[Role],
) -> Result<Response, ApiError> {
    let token = session_token(request.headers()).ok_or(ApiError::Unauthorized)?;
    let user = sessions::resolve_session(&state.db, &token)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let context = AuthContext::from(&user);
    if !roles.is_empty() {
        if let Err(e) = context.require_any(roles) {
            warn!(
                user_id = context.user_id,
                role = %context.role,
                path = %request.uri().path(),
                "Role check failed"
            );
            return Err(e);
        }
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Any logged-in user
pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, &[]).await
}

pub async fn require_manager(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, &[Role::Manager]).await
}

pub async fn require_project_lead(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, &[Role::ProjectLead]).await
}

pub async fn require_consultant(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, request, next, &[Role::Consultant]).await
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: User,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let username = request.username.trim();
    if username.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    }

    let Some(user) = users::authenticate(&state.db, username, &request.password).await? else {
        warn!(username, "Failed login attempt");
        return Err(ApiError::Unauthorized);
    };

    let token = sessions::create_session(&state.db, user.id, state.session_ttl_seconds).await?;
    info!(user_id = user.id, role = %user.role, "User logged in");

    let cookie = session_cookie(&token, state.session_ttl_seconds);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            message: "Login successful".to_string(),
            user,
        }),
    ))
}

/// POST /api/auth/logout
///
/// Always succeeds; an unknown or missing session is simply cleared.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        sessions::delete_session(&state.db, &token).await?;
    }

    Ok((
        [(header::SET_COOKIE, session_cookie("", 0))],
        crate::api::message("Logged out"),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = users::get_user(&state.db, ctx.user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user))
}

/// POST /api/auth/register (manager only)
pub async fn register(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<crate::api::Created>)> {
    let Json(new_user) = payload?;
    validated(new_user.validate(state.password_min_length))?;

    let id = users::create_user(&state.db, &new_user).await?;
    info!(
        created_by = ctx.user_id,
        user_id = id,
        role = %new_user.role,
        "Registered user"
    );
    Ok(created(id))
}

/// Build authentication routes
pub fn routes(state: AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_authenticated,
        ));

    let manager = Router::new()
        .route("/register", post(register))
        .route_layer(middleware::from_fn_with_state(state, require_manager));

    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .merge(authenticated)
        .merge(manager)
}
