use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::{NayaError, Result};
use crate::interfaces::store::{Collection, ContentStore, ListQuery, Record};

/// Content store over the hosted platform's REST dialect (`/rest/v1/{table}`).
#[derive(Clone)]
pub struct RestContentStore {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestContentStore {
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

    fn request(&self, method: Method, collection: Collection) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}", self.base_url, collection.table());
        self.http
            .request(method, url)
            .headers(service_headers(&self.service_key))
    }

    async fn rows(&self, builder: RequestBuilder, context: &str) -> Result<Vec<Record>> {
        let response = builder
            .send()
            .await
            .map_err(|e| NayaError::Http(format!("{context} transport failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NayaError::Http(format!("{context} read failed: {e}")))?;
        if !status.is_success() {
            return Err(NayaError::Http(format!("{context} failed ({status}): {body}")));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body)
            .map_err(|e| NayaError::Serialization(format!("{context} decode failed: {e}")))
    }
}

pub(crate) fn service_headers(service_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(service_key) {
        headers.insert("apikey", value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {service_key}")) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}

/// Renders a JSON value the way the filter syntax expects: bare strings, JSON otherwise.
fn filter_literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    for (column, value) in &query.filters {
        params.push((column.clone(), format!("eq.{}", filter_literal(value))));
    }
    if query.active_only {
        params.push(("is_active".to_string(), "eq.true".to_string()));
    }
    if let Some((column, ascending)) = &query.order {
        let direction = if *ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{column}.{direction}")));
    }
    params
}

#[async_trait]
impl ContentStore for RestContentStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Vec<Record>> {
        let builder = self
            .request(Method::GET, collection)
            .query(&list_params(query));
        self.rows(builder, "list").await
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let builder = self
            .request(Method::GET, collection)
            .query(&[("select", "*")])
            .query(&id_filter(id));
        Ok(self.rows(builder, "get").await?.into_iter().next())
    }

    async fn create(&self, collection: Collection, record: Record) -> Result<Record> {
        let builder = self
            .request(Method::POST, collection)
            .header("Prefer", "return=representation")
            .json(&record);
        self.rows(builder, "insert")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NayaError::Runtime(format!("insert into {} returned no row", collection.table())))
    }

    async fn update(&self, collection: Collection, id: &str, patch: Record) -> Result<Record> {
        let builder = self
            .request(Method::PATCH, collection)
            .query(&id_filter(id))
            .header("Prefer", "return=representation")
            .json(&patch);
        self.rows(builder, "update")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| NayaError::Runtime(format!("{} {id} not found", collection.table())))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, collection)
            .query(&id_filter(id));
        self.rows(builder, "delete").await?;
        Ok(())
    }
}
