//! Back-office account provisioning: `/create-user` for admins adding staff and
//! the idempotent `/create-admin` bootstrap.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{read_secret_env, BackendConfig};
use crate::error::{NayaError, Result};
use crate::interfaces::auth::{AuthProvider, Principal, Role};
use crate::interfaces::store::{Collection, ContentStore, ListQuery, Record};
use crate::providers::{HostedAuthProvider, RestContentStore};
use crate::relay::json_error;

pub const UNAUTHORIZED: &str = "Non autorisé";
pub const FORBIDDEN: &str = "Accès refusé";
pub const MISSING_CREDENTIALS: &str = "Email et mot de passe requis";
pub const ROLE_ASSIGNMENT_FAILED: &str = "Utilisateur créé mais erreur lors de l'attribution du rôle";
pub const USER_CREATED: &str = "Utilisateur créé avec succès";
pub const ADMIN_VERIFIED: &str = "Admin user created/verified successfully";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub email: String,
    pub password_env: String,
}

#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn ContentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub bootstrap: Option<AdminBootstrap>,
}

impl AdminState {
    pub fn new(store: Arc<dyn ContentStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            store,
            auth,
            bootstrap: None,
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: AdminBootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn from_backend(backend: &BackendConfig) -> Result<Self> {
        let store = RestContentStore::from_backend(backend)?;
        let auth = HostedAuthProvider::from_backend(backend)?;
        let bootstrap = backend.admin_email.as_ref().map(|email| AdminBootstrap {
            email: email.clone(),
            password_env: backend.admin_password_env.clone(),
        });
        Ok(Self {
            store: Arc::new(store),
            auth: Arc::new(auth),
            bootstrap,
        })
    }
}

pub fn routes(state: AdminState) -> Router {
    Router::new()
        .route("/create-user", post(create_user))
        .route("/create-admin", post(create_admin))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionResponse {
    success: bool,
    message: &'static str,
    user_id: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())?;
    let token = header.strip_prefix("Bearer ").unwrap_or("").trim();
    (!token.is_empty()).then_some(token)
}

async fn caller(state: &AdminState, headers: &HeaderMap) -> Option<Principal> {
    let token = bearer_token(headers)?;
    match state.auth.user_for_token(token).await {
        Ok(principal) => principal,
        Err(err) => {
            tracing::error!(error = %err, "token lookup failed");
            None
        }
    }
}

/// Whether `user_id` holds `role` in `user_roles`.
pub async fn has_role(store: &dyn ContentStore, user_id: &str, role: Role) -> Result<bool> {
    let query = ListQuery::new()
        .eq("user_id", user_id)
        .eq("role", role.as_str());
    Ok(!store.list(Collection::UserRoles, &query).await?.is_empty())
}

fn role_row(user_id: &str, role: Role) -> Record {
    let mut row = Record::new();
    row.insert("user_id".to_string(), Value::String(user_id.to_string()));
    row.insert("role".to_string(), Value::String(role.as_str().to_string()));
    row
}

async fn create_user(State(state): State<AdminState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(caller) = caller(&state, &headers).await else {
        return json_error(StatusCode::UNAUTHORIZED, UNAUTHORIZED);
    };

    match has_role(state.store.as_ref(), &caller.id, Role::Admin).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(caller = %caller.id, "create-user refused for non-admin");
            return json_error(StatusCode::FORBIDDEN, FORBIDDEN);
        }
        Err(err) => {
            tracing::error!(error = %err, "role lookup failed");
            return json_error(StatusCode::FORBIDDEN, FORBIDDEN);
        }
    }

    let request: CreateUserRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "create-user body is not JSON");
            return failure(NayaError::from(err));
        }
    };
    let email = request.email.as_deref().map(str::trim).unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, MISSING_CREDENTIALS);
    }
    let role = match Role::parse_optional(request.role.as_deref()) {
        Ok(role) => role,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, err.detail()),
    };

    let user = match state.auth.create_user(email, password).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(error = %err, "account creation rejected");
            return json_error(StatusCode::BAD_REQUEST, err.detail());
        }
    };

    if let Err(err) = state
        .store
        .create(Collection::UserRoles, role_row(&user.id, role))
        .await
    {
        tracing::error!(error = %err, user = %user.id, "role assignment failed");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, ROLE_ASSIGNMENT_FAILED);
    }

    tracing::info!(user = %user.id, role = %role, "back-office user created");
    (
        StatusCode::OK,
        Json(ProvisionResponse {
            success: true,
            message: USER_CREATED,
            user_id: user.id,
        }),
    )
        .into_response()
}

async fn create_admin(State(state): State<AdminState>) -> Response {
    match ensure_admin(&state).await {
        Ok(user_id) => (
            StatusCode::OK,
            Json(ProvisionResponse {
                success: true,
                message: ADMIN_VERIFIED,
                user_id,
            }),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "admin bootstrap failed");
            failure(err)
        }
    }
}

fn failure(err: NayaError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "error": err.detail() })),
    )
        .into_response()
}

/// Makes sure the bootstrap account exists and holds the admin role.
pub async fn ensure_admin(state: &AdminState) -> Result<String> {
    let bootstrap = state
        .bootstrap
        .as_ref()
        .ok_or_else(|| NayaError::Config("admin bootstrap is not configured".to_string()))?;

    let user = match state.auth.find_user_by_email(&bootstrap.email).await? {
        Some(user) => user,
        None => {
            let password = read_secret_env(&bootstrap.password_env)?;
            let user = state.auth.create_user(&bootstrap.email, &password).await?;
            tracing::info!(user = %user.id, "bootstrap admin account created");
            user
        }
    };

    if !has_role(state.store.as_ref(), &user.id, Role::Admin).await? {
        state
            .store
            .create(Collection::UserRoles, role_row(&user.id, Role::Admin))
            .await?;
    }
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(bearer_token(&headers), Some("tok-1"));
    }

    #[test]
    fn role_row_shape() {
        let row = role_row("u-1", Role::Support);
        assert_eq!(Value::Object(row), json!({"user_id": "u-1", "role": "support"}));
    }
}
