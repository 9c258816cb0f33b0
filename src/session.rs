use std::fmt;
use std::str::FromStr;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::ClientError;

/// Who is using the portal; gates which appointment actions are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    FrontDesk,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::FrontDesk => "front_desk",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::FrontDesk | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "front_desk" | "frontdesk" | "front-desk" => Ok(Role::FrontDesk),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Token and identity handed to the transport at construction time.
#[derive(Clone)]
pub struct SessionContext {
    pub access_token: String,
    pub user_id: i64,
    pub role: Role,
}

impl SessionContext {
    pub fn new(access_token: impl Into<String>, user_id: i64, role: Role) -> Self {
        Self {
            access_token: access_token.into(),
            user_id,
            role,
        }
    }

    pub fn auth_headers(&self) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|e| ClientError::Validation(format!("invalid access token: {e}")))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .finish()
    }
}
