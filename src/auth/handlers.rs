use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, PublicUser,
            RegisterRequest, ResetPasswordRequest, VerifyEmailQuery,
        },
        error::AuthError,
        extractors::{AuthUser, Payload, SESSION_COOKIE},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/register", post(register))
        .route("/verify-email", get(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub async fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the auth route"))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .auth
        .register(&payload.email, &payload.password, &payload.name)
        .await?;
    Ok(Json(MessageResponse::new(
        "User registered successfully, check your email for the verification link",
    )))
}

#[instrument(skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.verify_email(&query.token).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Payload(payload): Payload<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.request_password_reset(&payload.email).await?;
    Ok(Json(MessageResponse::new(
        "Password reset link sent to your email",
    )))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Payload(payload): Payload<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .auth
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Payload(payload): Payload<LoginRequest>,
) -> Result<([(axum::http::HeaderName, HeaderValue); 1], Json<LoginResponse>), AuthError> {
    let token = state.auth.login(&payload.email, &payload.password).await?;
    let max_age = state.auth.keys().ttl.whole_seconds();
    let cookie = session_cookie(&token, max_age, state.config.cookie_secure())
        .map_err(|e| AuthError::Signing(e.to_string()))?;
    Ok(([(SET_COOKIE, cookie)], Json(LoginResponse { token })))
}

/// Sessions are stateless; clearing the cookie is all logout does.
pub async fn logout(
    State(state): State<AppState>,
) -> ([(axum::http::HeaderName, HeaderValue); 1], Json<MessageResponse>) {
    let cookie = session_cookie("", 0, state.config.cookie_secure())
        .unwrap_or_else(|_| HeaderValue::from_static("token=; Path=/; HttpOnly; Max-Age=0"));
    (
        [(SET_COOKIE, cookie)],
        Json(MessageResponse::new("Logged out")),
    )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state.auth.profile(user_id).await?;
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
        name: user.name,
        is_verified: user.is_verified,
    }))
}

fn session_cookie(
    token: &str,
    max_age: i64,
    secure: bool,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
