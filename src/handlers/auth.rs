use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    database::Database,
    error::AppError,
    middleware::CurrentUser,
    models::{LoginRequest, RegisterRequest, User, UserResponse},
    utils::{create_token, hash_password, verify_password},
};

pub async fn register(
    State(db): State<Database>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let body = body.normalized();
    let errors = body.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let password_hash = hash_password(&body.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&body.username)
    .bind(&body.email)
    .bind(&password_hash)
    .fetch_one(&db)
    .await
    .map_err(|e| AppError::unique(e, "Username or email already exists"))?;

    let token = create_token(user.id, user.email.clone())?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "User registered successfully",
            "data": {
                "token": token,
                "user": UserResponse::from(user),
            },
        })),
    ))
}

pub async fn login(
    State(db): State<Database>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let email = body.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE email = $1 AND is_active = true",
    )
    .bind(&email)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(&body.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = create_token(user.id, user.email.clone())?;

    // Update last login
    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .fetch_one(&db)
    .await?;

    Ok(Json(json!({
        "status": "success",
        "message": "Login successful",
        "data": {
            "token": token,
            "user": UserResponse::from(user),
        },
    })))
}

pub async fn me(
    State(db): State<Database>,
    current_user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(current_user.id)
        .fetch_optional(&db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": {
            "user": UserResponse::from(user),
        },
    })))
}
