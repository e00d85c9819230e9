use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{NayaError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Support,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Support => "support",
        }
    }

    /// A missing role means support; unknown names are rejected.
    pub fn parse_optional(raw: Option<&str>) -> Result<Self> {
        match raw {
            None => Ok(Role::Support),
            Some(raw) => raw.parse(),
        }
    }
}

impl FromStr for Role {
    type Err = NayaError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "admin" => Ok(Role::Admin),
            "support" => Ok(Role::Support),
            other => Err(NayaError::Serialization(format!("unknown role: {other}"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated back-office account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `None` when the token is unknown or expired.
    async fn user_for_token(&self, token: &str) -> Result<Option<Principal>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<Principal>>;
    /// Creates an account with a confirmed email.
    async fn create_user(&self, email: &str, password: &str) -> Result<Principal>;
}
