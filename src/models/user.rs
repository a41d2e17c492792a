use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::FieldError;
use crate::models::is_valid_email;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.username.len() < 3 || self.username.len() > 30 {
            errors.push(FieldError::new(
                "username",
                "Username must be between 3 and 30 characters",
            ));
        } else if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            errors.push(FieldError::new(
                "username",
                "Username may contain only letters, numbers, underscores, hyphens, and periods",
            ));
        }

        if !is_valid_email(&self.email) {
            errors.push(FieldError::new("email", "Please enter a valid email"));
        }

        if self.password.len() < 6 {
            errors.push(FieldError::new(
                "password",
                "Password must be at least 6 characters",
            ));
        }

        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        let body = request("warehouse.clerk", "clerk@acme.com", "hunter22").normalized();
        assert!(body.validate().is_empty());
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        let body = request("  clerk  ", "  Clerk@Acme.COM ", "hunter22").normalized();
        assert_eq!(body.username, "clerk");
        assert_eq!(body.email, "clerk@acme.com");
    }

    #[test]
    fn short_username_is_rejected() {
        let errors = request("ab", "clerk@acme.com", "hunter22").validate();
        assert!(errors.iter().any(|e| e.field == "username"));
    }

    #[test]
    fn username_charset_is_enforced() {
        let errors = request("clerk!", "clerk@acme.com", "hunter22").validate();
        assert!(errors.iter().any(|e| e.field == "username"));
    }

    #[test]
    fn bad_email_and_short_password_are_both_reported() {
        let errors = request("clerk", "not-an-email", "abc").validate();
        assert!(errors.iter().any(|e| e.field == "email"));
        assert!(errors.iter().any(|e| e.field == "password"));
    }
}
