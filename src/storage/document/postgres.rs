//! Persistent document store using PostgreSQL JSONB.
//!
//! Every collection is a table `(seq BIGSERIAL, id TEXT PRIMARY KEY, doc JSONB)`.
//! `seq` is the storage order; `doc` holds the whole document including `_id`.
//! Aggregation pipelines compile to nested sub-selects that carry `(seq, id, doc)`
//! through every stage, with sort stages renumbering `seq`.

use super::query::{Filter, Pipeline, Stage, Update};
use super::{
    ensure_document_id, into_document, validate_collection, Document, DocumentStore, StoreError,
    UpdateOutcome, ID_FIELD,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::{PgPool, QueryBuilder, Row};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to PostgreSQL document store");
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the backing table for a collection if it does not exist yet.
    pub async fn ensure_collection(&self, collection: &str) -> Result<(), StoreError> {
        validate_collection(collection)?;
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                seq BIGSERIAL,
                id TEXT PRIMARY KEY,
                doc JSONB NOT NULL
            )",
            collection
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        validate_collection(collection)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", collection))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let mut docs = self.find(collection, filter, Some(1)).await?;
        Ok(docs.pop())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<u32>,
    ) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        let mut qb = QueryBuilder::<Postgres>::new("SELECT s.doc FROM ");
        qb.push(collection).push(" s WHERE ");
        push_filter(&mut qb, "s", filter);
        qb.push(" ORDER BY s.seq");
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push(limit.to_string());
        }
        fetch_documents(&self.pool, qb).await
    }

    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<String, StoreError> {
        validate_collection(collection)?;
        let id = ensure_document_id(&mut doc);
        let result = sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2)",
            collection
        ))
        .bind(&id)
        .bind(JsonValue::Object(doc))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateId(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateOutcome, StoreError> {
        validate_collection(collection)?;
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
        qb.push(collection).push(" SET doc = ");
        match update {
            Update::Set(fields) => {
                qb.push("doc || ")
                    .push_bind(JsonValue::Object(fields.clone()))
                    .push("::jsonb");
            }
            Update::Push { field, value } => {
                qb.push("jsonb_set(doc, ARRAY[")
                    .push_bind(field.clone())
                    .push("]::text[], (CASE WHEN jsonb_typeof(doc -> ")
                    .push_bind(field.clone())
                    .push(") = 'array' THEN doc -> ")
                    .push_bind(field.clone())
                    .push(" ELSE '[]'::jsonb END) || jsonb_build_array(")
                    .push_bind(value.clone())
                    .push("::jsonb), true)");
            }
        }
        push_first_match(&mut qb, collection, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(UpdateOutcome {
            matched: result.rows_affected(),
        })
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        validate_collection(collection)?;
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM ");
        qb.push(collection);
        push_first_match(&mut qb, collection, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        for stage in pipeline.stages() {
            if let Stage::Lookup { from, .. } = stage {
                validate_collection(from)?;
            }
        }

        // Stage i wraps stage i-1, so prefixes are emitted outermost first and
        // suffixes innermost first. Binds are numbered in push order, which
        // matches the final text.
        let stages = pipeline.stages();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT t.doc FROM (");
        for stage in stages.iter().rev() {
            push_stage_prefix(&mut qb, stage);
        }
        qb.push("SELECT seq, id, doc FROM ").push(collection);
        for stage in stages {
            push_stage_suffix(&mut qb, stage);
        }
        qb.push(") t ORDER BY t.seq");
        debug!(collection, sql = qb.sql(), "Running aggregation pipeline");
        fetch_documents(&self.pool, qb).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

async fn fetch_documents(
    pool: &PgPool,
    mut qb: QueryBuilder<'_, Postgres>,
) -> Result<Vec<Document>, StoreError> {
    let rows = qb.build().fetch_all(pool).await?;
    let mut docs = Vec::with_capacity(rows.len());
    for row in rows {
        let value: JsonValue = row.try_get("doc")?;
        docs.push(into_document(value)?);
    }
    Ok(docs)
}

/// ` WHERE id = (first id matching filter)` so single-document writes touch one row.
fn push_first_match(qb: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    qb.push(" WHERE id = (SELECT s.id FROM ")
        .push(collection)
        .push(" s WHERE ");
    push_filter(qb, "s", filter);
    qb.push(" ORDER BY s.seq LIMIT 1)");
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, alias: &str, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq { field, value } => {
            if let (ID_FIELD, JsonValue::String(id)) = (field.as_str(), value) {
                qb.push(alias).push(".id = ").push_bind(id.clone());
            } else {
                qb.push("(")
                    .push(alias)
                    .push(".doc -> ")
                    .push_bind(field.clone())
                    .push(") = ")
                    .push_bind(value.clone())
                    .push("::jsonb");
            }
        }
        Filter::ContainsIgnoreCase { field, fragment } => {
            // Only string fields match, as in the memory store.
            qb.push("(CASE WHEN jsonb_typeof(")
                .push(alias)
                .push(".doc -> ")
                .push_bind(field.clone())
                .push(") = 'string' THEN strpos(lower(")
                .push(alias)
                .push(".doc ->> ")
                .push_bind(field.clone())
                .push("), lower(")
                .push_bind(fragment.clone())
                .push(")) > 0 ELSE FALSE END)");
        }
        Filter::GreaterThan { field, value } => {
            push_numeric_comparison(qb, alias, field, ">", *value);
        }
        Filter::LessThan { field, value } => {
            push_numeric_comparison(qb, alias, field, "<", *value);
        }
        Filter::And(filters) => {
            if filters.is_empty() {
                qb.push("TRUE");
                return;
            }
            qb.push("(");
            for (i, f) in filters.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_filter(qb, alias, f);
            }
            qb.push(")");
        }
        Filter::Not(inner) => {
            qb.push("NOT COALESCE((");
            push_filter(qb, alias, inner);
            qb.push("), FALSE)");
        }
    }
}

/// `field <op> value` for numeric fields; any other JSON type yields NULL (no match).
fn push_numeric_comparison(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    field: &str,
    op: &str,
    value: f64,
) {
    qb.push("(CASE WHEN jsonb_typeof(")
        .push(alias)
        .push(".doc -> ")
        .push_bind(field.to_string())
        .push(") = 'number' THEN (")
        .push(alias)
        .push(".doc ->> ")
        .push_bind(field.to_string())
        .push(")::numeric END) ")
        .push(op)
        .push(" ")
        .push_bind(value)
        .push("::float8::numeric");
}

fn push_stage_prefix(qb: &mut QueryBuilder<'_, Postgres>, stage: &Stage) {
    match stage {
        Stage::Match(_) | Stage::Limit(_) => {
            qb.push("SELECT s.seq, s.id, s.doc FROM (");
        }
        Stage::Lookup {
            from,
            local_field,
            as_field,
        } => {
            qb.push("SELECT s.seq, s.id, s.doc || jsonb_build_object(")
                .push_bind(as_field.clone())
                .push("::text, COALESCE((SELECT jsonb_agg(u.doc ORDER BY u.seq) FROM ")
                .push(from)
                .push(" u WHERE u.id = s.doc ->> ")
                .push_bind(local_field.clone())
                .push("), '[]'::jsonb)) AS doc FROM (");
        }
        Stage::Average {
            array_field,
            value_field,
            as_field,
            places,
        } => {
            qb.push("SELECT s.seq, s.id, s.doc || jsonb_build_object(")
                .push_bind(as_field.clone())
                .push("::text, COALESCE((SELECT round(avg((r.elem ->> ")
                .push_bind(value_field.clone())
                .push(")::numeric), ")
                .push(places.to_string())
                .push(") FROM jsonb_array_elements(CASE WHEN jsonb_typeof(s.doc -> ")
                .push_bind(array_field.clone())
                .push(") = 'array' THEN s.doc -> ")
                .push_bind(array_field.clone())
                .push(" ELSE '[]'::jsonb END) AS r(elem) WHERE jsonb_typeof(r.elem -> ")
                .push_bind(value_field.clone())
                .push(") = 'number'), 0)) AS doc FROM (");
        }
        Stage::Sort { field, descending } => {
            qb.push("SELECT row_number() OVER (ORDER BY (CASE WHEN jsonb_typeof(s.doc -> ")
                .push_bind(field.clone())
                .push(") = 'number' THEN (s.doc ->> ")
                .push_bind(field.clone())
                .push(")::numeric END) ")
                .push(if *descending { "DESC" } else { "ASC" })
                .push(" NULLS LAST, s.seq) AS seq, s.id, s.doc FROM (");
        }
    }
}

fn push_stage_suffix(qb: &mut QueryBuilder<'_, Postgres>, stage: &Stage) {
    match stage {
        Stage::Match(filter) => {
            qb.push(") s WHERE ");
            push_filter(qb, "s", filter);
        }
        Stage::Limit(n) => {
            qb.push(") s ORDER BY s.seq LIMIT ").push(n.to_string());
        }
        Stage::Lookup { .. } | Stage::Average { .. } | Stage::Sort { .. } => {
            qb.push(") s");
        }
    }
}
