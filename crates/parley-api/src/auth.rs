use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use parley_db::models::{parse_timestamp, UserRow};
use parley_db::Database;
use parley_gateway::dispatcher::Dispatcher;
use parley_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserResponse};

use crate::error::{ApiError, ApiResult};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
}

/// Token lifetime: one day.
const TOKEN_TTL: chrono::Duration = chrono::Duration::days(1);

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("malformed email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }

    if state.db.get_user_by_email(&req.email)?.is_some() {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    state
        .db
        .create_user(&user_id.to_string(), &req.email, &req.name, &password_hash)?;

    let token = create_token(&state.jwt_secret, user_id, &req.name)?;

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user vanished after insert")))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user_response(&user)?,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    // Unknown email and wrong password produce the same error, so responses
    // cannot be used to enumerate accounts.
    let invalid = || ApiError::Authentication("invalid credentials".into());

    let user = state.db.get_user_by_email(&req.email)?.ok_or_else(invalid)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid())?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?;

    let token = create_token(&state.jwt_secret, user_id, &user.name)?;

    Ok(Json(AuthResponse {
        user: user_response(&user)?,
        token,
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;
    Ok(Json(user_response(&user)?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let users = state
        .db
        .list_users()?
        .iter()
        .map(user_response)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(users))
}

fn create_token(secret: &str, user_id: Uuid, name: &str) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + TOKEN_TTL).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token signing failed: {e}")))
}

/// The password column never leaves this function.
fn user_response(user: &UserRow) -> ApiResult<UserResponse> {
    Ok(UserResponse {
        id: user
            .id
            .parse()
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id: {e}")))?,
        email: user.email.clone(),
        name: user.name.clone(),
        created_at: parse_timestamp(&user.created_at),
    })
}

/// Cheap structural check: one '@', non-empty local part, dotted domain.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

#[cfg(test)]
mod tests {
    use super::is_valid_email;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada@.com")); // empty host
    }
}
