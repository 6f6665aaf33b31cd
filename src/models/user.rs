use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored user document. Never serialized to clients directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Denormalized public copy of a user, as shown on a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardMember {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl From<&User> for BoardMember {
    fn from(user: &User) -> Self {
        BoardMember {
            uid: user.user_id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "super::double_option")]
    pub display_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub photo_url: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: BoardMember,
}
