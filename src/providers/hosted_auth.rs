use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::BackendConfig;
use crate::error::{NayaError, Result};
use crate::interfaces::auth::{AuthProvider, Principal};
use crate::providers::rest_store::service_headers;

/// Auth provider backed by the hosted platform's `/auth/v1` admin API.
#[derive(Clone)]
pub struct HostedAuthProvider {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<Principal>,
}

impl HostedAuthProvider {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        }
    }

    pub fn from_backend(backend: &BackendConfig) -> Result<Self> {
        Ok(Self::new(&backend.url, backend.service_key()?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }
}

/// Pulls the human-readable message out of an auth error body.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl AuthProvider for HostedAuthProvider {
    async fn user_for_token(&self, token: &str) -> Result<Option<Principal>> {
        let response = self
            .http
            .get(self.url("user"))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| NayaError::Http(format!("auth lookup transport failed: {e}")))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NayaError::Http(format!(
                "auth lookup failed ({status}): {}",
                error_message(&body)
            )));
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let response = self
            .http
            .get(self.url("admin/users"))
            .headers(service_headers(&self.service_key))
            .send()
            .await
            .map_err(|e| NayaError::Http(format!("list users transport failed: {e}")))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NayaError::Http(format!(
                "list users failed ({status}): {}",
                error_message(&body)
            )));
        }
        let list: UserList = serde_json::from_str(&body)?;
        Ok(list.users.into_iter().find(|user| {
            user.email
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
        }))
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Principal> {
        let response = self
            .http
            .post(self.url("admin/users"))
            .headers(service_headers(&self.service_key))
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": true,
            }))
            .send()
            .await
            .map_err(|e| NayaError::Http(format!("create user transport failed: {e}")))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NayaError::Http(error_message(&body)));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_known_keys() {
        assert_eq!(
            error_message(r#"{"code":422,"msg":"A user with this email address has already been registered"}"#),
            "A user with this email address has already been registered"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"bad password"}"#),
            "bad password"
        );
        assert_eq!(error_message("  gateway down "), "gateway down");
    }
}
