use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// A row as the hosted store returns it.
pub type Record = Map<String, Value>;

/// Tables of the site back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Announcements,
    ChatbotSettings,
    ContactInfo,
    Formations,
    Media,
    Opportunities,
    PageContents,
    Promotions,
    SiteSettings,
    UserRoles,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Announcements,
        Collection::ChatbotSettings,
        Collection::ContactInfo,
        Collection::Formations,
        Collection::Media,
        Collection::Opportunities,
        Collection::PageContents,
        Collection::Promotions,
        Collection::SiteSettings,
        Collection::UserRoles,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Announcements => "announcements",
            Collection::ChatbotSettings => "chatbot_settings",
            Collection::ContactInfo => "contact_info",
            Collection::Formations => "formations",
            Collection::Media => "media",
            Collection::Opportunities => "opportunities",
            Collection::PageContents => "page_contents",
            Collection::Promotions => "promotions",
            Collection::SiteSettings => "site_settings",
            Collection::UserRoles => "user_roles",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.table() == table)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub active_only: bool,
    /// Column and ascending flag.
    pub order: Option<(String, bool)>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some((column.into(), ascending));
        self
    }

    /// In-process equivalent of the REST filter dialect.
    pub fn matches(&self, record: &Record) -> bool {
        if self.active_only && record.get("is_active") != Some(&Value::Bool(true)) {
            return false;
        }
        self.filters
            .iter()
            .all(|(column, value)| record.get(column) == Some(value))
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Vec<Record>>;
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>>;
    async fn create(&self, collection: Collection, record: Record) -> Result<Record>;
    async fn update(&self, collection: Collection, id: &str, patch: Record) -> Result<Record>;
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}
