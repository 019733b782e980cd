use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Argon2 PHC string, never the plain password.
    pub password: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub name: String,
    pub upload_time: DateTime<Utc>,
    pub file_path: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Chat {
    pub id: i64,
    pub name: Option<String>,
    pub document_id: i64,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserCreate {
    #[validate(email(message = "value is not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// OAuth2 password-flow form sent to the login endpoint.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

impl Token {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

pub struct NewDocument {
    pub name: String,
    pub file_path: String,
    pub user_id: i64,
}

pub struct NewChat {
    pub name: Option<String>,
    pub document_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCreate {
    pub chat_id: i64,
    /// Ignored on input: messages posted by users are always stored as `human`.
    #[serde(default)]
    pub role: Option<Role>,
    pub content: String,
}

/// One replayed turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub role: Role,
    pub content: String,
}

#[cfg(test)]
impl HistoryMessage {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<HistoryMessage>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_user_create_validation() {
        let ok = UserCreate {
            email: "reader@pdfchat.xyz".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_email = UserCreate {
            email: "not-an-email".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let empty_password = UserCreate {
            email: "reader@pdfchat.xyz".to_string(),
            password: String::new(),
        };
        assert!(empty_password.validate().is_err());
    }

    #[test]
    fn test_history_message_uses_type_key() {
        let json = serde_json::to_value(HistoryMessage::ai("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ai", "content": "hello"}));
    }

    #[test]
    fn test_message_create_role_is_optional() {
        let msg: MessageCreate =
            serde_json::from_str(r#"{"chat_id": 3, "content": "what is this about?"}"#).unwrap();
        assert_eq!(msg.chat_id, 3);
        assert!(msg.role.is_none());
    }
}
