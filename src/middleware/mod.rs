use axum::{async_trait, extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{database::Database, error::AppError, models::User, utils::verify_token};

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    // Item mutations are restricted to the creator or an admin.
    pub fn can_modify(&self, owner: Uuid) -> bool {
        self.is_admin() || self.id == owner
    }
}

#[async_trait]
impl FromRequestParts<Database> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, db: &Database) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized("Authentication required".to_string()))?;

        let claims = verify_token(bearer.token())?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account not found or deactivated".to_string()))?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "clerk".to_string(),
            email: "clerk@acme.com".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn admins_can_modify_anything() {
        let admin = user("admin");
        assert!(admin.can_modify(Uuid::new_v4()));
    }

    #[test]
    fn owners_can_modify_their_own_items() {
        let clerk = user("user");
        assert!(clerk.can_modify(clerk.id));
        assert!(!clerk.can_modify(Uuid::new_v4()));
    }
}
