use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{NayaError, Result};
use crate::interfaces::store::{Collection, ContentStore, ListQuery, Record};

/// In-process store for local runs and tests.
#[derive(Default)]
pub struct MemoryContentStore {
    tables: RwLock<HashMap<Collection, Vec<Record>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.tables
            .read()
            .await
            .get(&collection)
            .map_or(0, Vec::len)
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

// Nulls and missing values sort last, like the REST dialect's default.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list(&self, collection: Collection, query: &ListQuery) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Record> = tables
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some((column, ascending)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                if *ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        Ok(rows)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|rows| rows.iter().find(|r| record_id(r) == Some(id)).cloned()))
    }

    async fn create(&self, collection: Collection, mut record: Record) -> Result<Record> {
        if record_id(&record).is_none() {
            record.insert(
                "id".to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
        let stamp = now();
        record
            .entry("created_at".to_string())
            .or_insert_with(|| stamp.clone());
        record.entry("updated_at".to_string()).or_insert(stamp);

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();
        if rows.iter().any(|r| record_id(r) == record_id(&record)) {
            return Err(NayaError::Runtime(format!(
                "duplicate id in {}",
                collection.table()
            )));
        }
        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Record) -> Result<Record> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|r| record_id(r) == Some(id)))
            .ok_or_else(|| NayaError::Runtime(format!("{} {id} not found", collection.table())))?;
        for (key, value) in patch {
            if key != "id" {
                row.insert(key, value);
            }
        }
        row.insert("updated_at".to_string(), now());
        Ok(row.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&collection) {
            rows.retain(|r| record_id(r) != Some(id));
        }
        Ok(())
    }
}
