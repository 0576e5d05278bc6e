use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use sqlx::postgres::{PgListener, PgPool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, warn};
use uuid::Uuid;

use super::{
    AuthGateway, ChangeCallback, ChangeEvent, ChangeFeed, ChangeKind, Condition, DataGateway,
    ErpError, EventMask, Filter, Identity, Query, ServiceResult, Session, SubscriptionHandle,
    Table,
};
use crate::security::{hash_password, verify_password};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
}

const UNDEFINED_FUNCTION: &str = "42883";
const UNDEFINED_TABLE: &str = "42P01";
const UNIQUE_VIOLATION: &str = "23505";

/// Gateway over a Postgres database.
///
/// Rows travel as JSONB so the typed layer above stays identical to the
/// in-memory backend.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    listeners: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    next_listener: Arc<AtomicU64>,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn identifier(name: &str) -> ServiceResult<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(ErpError::Validation(format!("invalid identifier `{name}`")))
    }
}

fn map_sqlx(err: sqlx::Error) -> ErpError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNDEFINED_FUNCTION) | Some(UNDEFINED_TABLE) => {
                return ErpError::Unavailable(db.message().to_string());
            }
            Some(UNIQUE_VIOLATION) => {
                return ErpError::Validation(db.message().to_string());
            }
            _ => {}
        }
    }
    error!(error = %err, "postgres operation failed");
    ErpError::Backend(err.to_string())
}

/// Renders `filter` as a WHERE clause whose placeholders start after `offset`.
fn where_clause(filter: &Filter, offset: usize) -> ServiceResult<(String, Vec<Value>)> {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();
    for condition in filter.conditions() {
        let column = identifier(condition.column())?;
        let position = offset + binds.len() + 1;
        match condition {
            Condition::Eq(_, value) => {
                clauses.push(format!("to_jsonb(t)->'{column}' = ${position}::jsonb"));
                binds.push(value.clone());
            }
            Condition::EqIgnoreCase(_, value) => {
                clauses.push(format!(
                    "lower(btrim(to_jsonb(t)->>'{column}')) = lower(btrim(${position}::jsonb #>> '{{}}'))"
                ));
                binds.push(Value::String(value.clone()));
            }
            Condition::In(_, values) => {
                clauses.push(format!(
                    "${position}::jsonb @> jsonb_build_array(to_jsonb(t)->'{column}')"
                ));
                binds.push(Value::Array(values.clone()));
            }
        }
    }
    if clauses.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!(" WHERE {}", clauses.join(" AND ")), binds))
    }
}

fn column_list(row: &Value) -> ServiceResult<String> {
    let Value::Object(fields) = row else {
        return Err(ErpError::Validation("row must be a JSON object".into()));
    };
    if fields.is_empty() {
        return Err(ErpError::Validation("row has no columns".into()));
    }
    let columns = fields
        .keys()
        .map(|key| identifier(key).map(str::to_string))
        .collect::<ServiceResult<Vec<_>>>()?;
    Ok(columns.join(", "))
}

#[async_trait]
impl DataGateway for PgBackend {
    async fn select(&self, table: Table, query: &Query) -> ServiceResult<Vec<Value>> {
        let (where_sql, binds) = where_clause(&query.filter, 0)?;
        let mut sql = format!("SELECT to_jsonb(t) FROM {} t{where_sql}", table.name());
        if let Some(order) = &query.order {
            let column = identifier(&order.column)?;
            let direction = if order.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY t.{column} {direction}"));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let mut statement = sqlx::query_scalar::<_, Value>(&sql);
        for bind in binds {
            statement = statement.bind(bind);
        }
        statement.fetch_all(&self.pool).await.map_err(map_sqlx)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> ServiceResult<Vec<Value>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let columns = column_list(&row)?;
            let sql = format!(
                "INSERT INTO {table} AS t ({columns}) \
                 SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
                 RETURNING to_jsonb(t.*)",
                table = table.name(),
            );
            let value = sqlx::query_scalar::<_, Value>(&sql)
                .bind(row)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx)?;
            inserted.push(value);
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(inserted)
    }

    async fn update(&self, table: Table, patch: Value, filter: &Filter) -> ServiceResult<usize> {
        if filter.is_empty() {
            return Err(ErpError::Validation(format!(
                "refusing unfiltered update of {table}"
            )));
        }
        let columns = column_list(&patch)?;
        let (where_sql, binds) = where_clause(filter, 1)?;
        let sql = format!(
            "UPDATE {table} AS t SET ({columns}) = \
             (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)){where_sql}",
            table = table.name(),
        );
        let mut statement = sqlx::query(&sql).bind(patch);
        for bind in binds {
            statement = statement.bind(bind);
        }
        let result = statement.execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(result.rows_affected() as usize)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> ServiceResult<()> {
        if filter.is_empty() {
            return Err(ErpError::Validation(format!(
                "refusing unfiltered delete from {table}"
            )));
        }
        let (where_sql, binds) = where_clause(filter, 0)?;
        let sql = format!("DELETE FROM {} AS t{where_sql}", table.name());
        let mut statement = sqlx::query(&sql);
        for bind in binds {
            statement = statement.bind(bind);
        }
        statement.execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn call(&self, procedure: &str, args: Value) -> ServiceResult<Value> {
        let procedure = identifier(procedure)?;
        let sql = format!("SELECT to_jsonb({procedure}($1::jsonb))");
        sqlx::query_scalar::<_, Value>(&sql)
            .bind(args)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl AuthGateway for PgBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let row: Option<(Uuid, String, String)> = sqlx::query_as(
            "SELECT id, email, password_hash FROM auth_users WHERE lower(email) = lower($1)",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        let Some((id, email, password_hash)) = row else {
            return Err(ErpError::InvalidCredentials);
        };
        if !verify_password(password, &password_hash) {
            return Err(ErpError::InvalidCredentials);
        }
        let token: Uuid = sqlx::query_scalar(
            "INSERT INTO auth_sessions (token, user_id) VALUES ($1, $2) RETURNING token",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(Session {
            access_token: token.to_string(),
            identity: Identity {
                id: id.to_string(),
                email,
            },
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<Identity> {
        let password_hash = hash_password(password)?;
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO auth_users (id, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(email.trim())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(Identity {
            id: id.to_string(),
            email: email.trim().to_string(),
        })
    }

    async fn sign_out(&self, access_token: &str) -> ServiceResult<()> {
        let Ok(token) = Uuid::parse_str(access_token) else {
            return Ok(());
        };
        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> ServiceResult<Option<Identity>> {
        let Ok(token) = Uuid::parse_str(access_token) else {
            return Ok(None);
        };
        let row: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT u.id, u.email FROM auth_sessions s \
             JOIN auth_users u ON u.id = s.user_id WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row.map(|(id, email)| Identity {
            id: id.to_string(),
            email,
        }))
    }
}

impl ChangeFeed for PgBackend {
    fn subscribe(
        &self,
        table: Table,
        mask: EventMask,
        callback: ChangeCallback,
    ) -> ServiceResult<SubscriptionHandle> {
        let pool = self.pool.clone();
        let channel = format!("{}_changes", table.name());
        let task = tokio::spawn(async move {
            let mut listener = match PgListener::connect_with(&pool).await {
                Ok(listener) => listener,
                Err(err) => {
                    error!(error = %err, channel, "change feed connect failed");
                    return;
                }
            };
            if let Err(err) = listener.listen(&channel).await {
                error!(error = %err, channel, "change feed listen failed");
                return;
            }
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        let Some(kind) = ChangeKind::from_operation(notification.payload()) else {
                            warn!(channel, payload = notification.payload(), "unknown change payload");
                            continue;
                        };
                        if mask.contains(kind) {
                            callback(ChangeEvent { table, kind });
                        }
                    }
                    Err(err) => {
                        error!(error = %err, channel, "change feed closed");
                        return;
                    }
                }
            }
        });

        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .map_err(|_| ErpError::Internal("listener registry poisoned".into()))?
            .insert(id, task);
        Ok(SubscriptionHandle(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Ok(mut listeners) = self.listeners.lock() {
            if let Some(task) = listeners.remove(&handle.0) {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifiers_are_whitelisted() {
        assert!(identifier("applied_at").is_ok());
        assert!(identifier("name; drop table admins").is_err());
        assert!(identifier("Name").is_err());
    }

    #[test]
    fn where_clause_numbers_placeholders_after_offset() {
        let filter = Filter::new()
            .eq("id", "a-1")
            .is_in("status", ["pending", "under_review"]);
        let (sql, binds) = where_clause(&filter, 1).unwrap();
        assert_eq!(
            sql,
            " WHERE to_jsonb(t)->'id' = $2::jsonb AND $3::jsonb @> jsonb_build_array(to_jsonb(t)->'status')"
        );
        assert_eq!(binds[1], json!(["pending", "under_review"]));
    }

    #[test]
    fn column_list_rejects_bad_keys() {
        assert_eq!(
            column_list(&json!({"name": "x", "email": "y"})).unwrap(),
            "email, name"
        );
        assert!(column_list(&json!({"bad key": 1})).is_err());
        assert!(column_list(&json!([1, 2])).is_err());
    }
}
