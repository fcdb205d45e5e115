//! SQLite-backed [`DocumentStore`]
//!
//! Documents live in the `documents` table as JSON text. Filters are
//! translated to `json_each` lookups so that a condition on an array field
//! matches any element, the same way a document database matches `{tags: "new"}`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::init::{create_documents_table, init_database};
use super::store::{Collection, Document, DocumentId, DocumentStore, Filter, Update, ID_FIELD};
use crate::{Error, Result};

/// Document store over a SQLite connection pool
#[derive(Clone, Debug)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Open (or create) the database file and ensure the schema
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let pool = init_database(db_path).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, used by tests and demos.
    ///
    /// Limited to one connection: every `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        create_documents_table(&pool).await?;
        Ok(Self { pool })
    }

    /// `UPDATE ... WHERE id = (first match)`; the caller appends RETURNING if needed
    fn build_update<'a>(
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<QueryBuilder<'a, Sqlite>> {
        let mut qb = QueryBuilder::new("UPDATE documents SET body = ");
        push_update_expr(&mut qb, update)?;
        qb.push(" WHERE id = (SELECT id FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());
        push_filter(&mut qb, filter)?;
        qb.push(" ORDER BY rowid LIMIT 1)");
        Ok(qb)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        let mut qb = QueryBuilder::new("SELECT id, body FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());
        push_filter(&mut qb, filter)?;
        qb.push(" ORDER BY rowid");

        let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_document).collect()
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        let mut qb = QueryBuilder::new("SELECT id, body FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());
        push_filter(&mut qb, filter)?;
        qb.push(" ORDER BY rowid LIMIT 1");

        let row: Option<(String, String)> =
            qb.build_query_as().fetch_optional(&self.pool).await?;
        row.map(row_to_document).transpose()
    }

    async fn insert_one(&self, collection: Collection, mut document: Document) -> Result<DocumentId> {
        document.remove(ID_FIELD);
        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(&Value::Object(document))?;

        sqlx::query("INSERT INTO documents (id, collection, body) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(collection.as_str())
            .bind(body)
            .execute(&self.pool)
            .await?;

        debug!(%collection, id = %id, "Inserted document");
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64> {
        let mut qb = Self::build_update(collection, filter, update)?;
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find_one_and_update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>> {
        let mut qb = Self::build_update(collection, filter, update)?;
        qb.push(" RETURNING id, body");

        // One statement: SQLite takes the write lock before evaluating the
        // subquery, so the selected row cannot change before the update lands.
        let row: Option<(String, String)> =
            qb.build_query_as().fetch_optional(&self.pool).await?;
        row.map(row_to_document).transpose()
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let mut qb = QueryBuilder::new("DELETE FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());
        push_filter(&mut qb, filter)?;

        let result = qb.build().execute(&self.pool).await?;
        debug!(%collection, deleted = result.rows_affected(), "Deleted documents");
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_document((id, body): (String, String)) -> Result<Document> {
    let mut document = match serde_json::from_str::<Value>(&body)? {
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidInput(format!(
                "document {} is not an object: {}",
                id, other
            )))
        }
    };
    document.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(document)
}

/// `$.field` path for a top-level field name
fn json_path(field: &str) -> Result<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::InvalidInput(format!("invalid field name '{}'", field)));
    }
    Ok(format!("$.{}", field))
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &Filter) -> Result<()> {
    for (field, value) in filter.conditions() {
        if field == ID_FIELD {
            let id = value
                .as_str()
                .ok_or_else(|| Error::InvalidInput(format!("{} must be a string", ID_FIELD)))?;
            qb.push(" AND id = ");
            qb.push_bind(id.to_string());
        } else {
            // json_each yields the scalar itself for non-array fields
            qb.push(" AND EXISTS (SELECT 1 FROM json_each(documents.body, ");
            qb.push_bind(json_path(field)?);
            qb.push(") AS je WHERE je.value = ");
            push_scalar(qb, value)?;
            qb.push(")");
        }
    }
    Ok(())
}

fn push_scalar(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) -> Result<()> {
    match value {
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                qb.push_bind(f);
            } else {
                return Err(Error::InvalidInput(format!("unsupported number {}", n)));
            }
        }
        other => {
            return Err(Error::InvalidInput(format!(
                "filter values must be scalars, got {}",
                other
            )))
        }
    }
    Ok(())
}

fn push_update_expr(qb: &mut QueryBuilder<'_, Sqlite>, update: &Update) -> Result<()> {
    match update {
        Update::Set(fields) => {
            if fields.is_empty() {
                return Err(Error::InvalidInput("empty $set update".to_string()));
            }
            qb.push("json_set(body");
            for (field, value) in fields {
                if field == ID_FIELD {
                    return Err(Error::InvalidInput(format!("{} is immutable", ID_FIELD)));
                }
                qb.push(", ");
                qb.push_bind(json_path(field)?);
                qb.push(", json(");
                qb.push_bind(serde_json::to_string(value)?);
                qb.push(")");
            }
            qb.push(")");
        }
        Update::Increment(field, delta) => {
            let path = json_path(field)?;
            qb.push("json_set(body, ");
            qb.push_bind(path.clone());
            qb.push(", COALESCE(json_extract(body, ");
            qb.push_bind(path);
            qb.push("), 0) + ");
            qb.push_bind(*delta);
            qb.push(")");
        }
    }
    Ok(())
}
