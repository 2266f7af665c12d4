use std::fmt::Display;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgConnection;

use crate::projection::{ProjectionError, ViewTable};
use crate::store::StoreError;

const UNIQUE_VIOLATION: &str = "23505";

/// A [`ViewTable`] storing rows of type `V` as JSON documents in a Postgres table shaped
/// `(id text primary key, view jsonb)`.
///
/// Indexes are expression indexes over top-level fields of the document. Table and index names are
/// unqualified: they resolve through the `search_path`, which is what lets a rebuild fill a copy of
/// the table in a separate schema.
pub struct PgTable<V> {
    name: &'static str,
    unique: Vec<(&'static str, &'static str)>,
    indexes: Vec<(&'static str, &'static str)>,
    select: String,
    upsert: String,
    _view: PhantomData<fn() -> V>,
}

impl<V> PgTable<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            unique: vec![],
            indexes: vec![],
            select: format!(include_str!("sql/tables/select_view.sql"), name),
            upsert: format!(include_str!("sql/tables/upsert_view.sql"), name),
            _view: PhantomData,
        }
    }

    /// Adds a unique index named `{table}_{index}` over the `field` of the document.
    pub fn with_unique(mut self, index: &'static str, field: &'static str) -> Self {
        self.unique.push((index, field));
        self
    }

    /// Adds a plain index named `{table}_{index}` over the `field` of the document.
    pub fn with_index(mut self, index: &'static str, field: &'static str) -> Self {
        self.indexes.push((index, field));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> PgTableSchema {
        let mut migrations = vec![format!(include_str!("sql/tables/create_table.sql"), self.name)];
        migrations.extend(
            self.unique
                .iter()
                .map(|(index, field)| format!(include_str!("sql/tables/create_unique_index.sql"), self.name, index, field)),
        );
        migrations.extend(
            self.indexes
                .iter()
                .map(|(index, field)| format!(include_str!("sql/tables/create_index.sql"), self.name, index, field)),
        );

        PgTableSchema {
            name: self.name,
            migrations,
        }
    }

    fn unique_violation(&self, error: &sqlx::Error, view: &Value) -> Option<ProjectionError> {
        let sqlx::Error::Database(database_error) = error else {
            return None;
        };
        if database_error.code().as_deref() != Some(UNIQUE_VIOLATION) {
            return None;
        }
        let constraint = database_error.constraint()?;

        self.unique
            .iter()
            .find(|(index, _)| constraint == format!("{}_{}", self.name, index))
            .map(|(index, field)| ProjectionError::UniqueViolation {
                table: self.name.to_string(),
                index,
                value: match view.get(field) {
                    Some(Value::String(value)) => value.clone(),
                    Some(value) => value.to_string(),
                    None => String::new(),
                },
            })
    }
}

/// The DDL of a projection table, run by migrations and by rebuilds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTableSchema {
    pub name: &'static str,
    pub migrations: Vec<String>,
}

#[async_trait]
impl<K, V> ViewTable<K, V, PgConnection> for PgTable<V>
where
    K: Display + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static,
{
    async fn load(&self, key: &K, executor: &mut PgConnection) -> Result<Option<V>, StoreError> {
        let view: Option<Json<V>> = sqlx::query_scalar(&self.select)
            .bind(key.to_string())
            .fetch_optional(&mut *executor)
            .await?;

        Ok(view.map(|Json(view)| view))
    }

    async fn save(&self, key: &K, view: &V, executor: &mut PgConnection) -> Result<(), StoreError> {
        let view: Value = serde_json::to_value(view)?;

        let result = sqlx::query(&self.upsert)
            .bind(key.to_string())
            .bind(Json(&view))
            .execute(&mut *executor)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(error) => match self.unique_violation(&error, &view) {
                Some(violation) => Err(violation.into()),
                None => Err(error.into()),
            },
        }
    }
}
