use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use crate::errors::{ErpError, ServiceResult};
pub use crate::models::Identity;

#[cfg(feature = "server")]
pub mod memory;
#[cfg(feature = "server")]
pub mod postgres;

#[cfg(feature = "server")]
pub use memory::InMemoryBackend;
#[cfg(feature = "server")]
pub use postgres::PgBackend;

/// Tables of the hosted store this system reads and writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Admins,
    Staff,
    ActiveStudents,
    PendingAdmissions,
    RejectedAdmissions,
    FeePayments,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Admins,
        Table::Staff,
        Table::ActiveStudents,
        Table::PendingAdmissions,
        Table::RejectedAdmissions,
        Table::FeePayments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Admins => "admins",
            Table::Staff => "staff",
            Table::ActiveStudents => "active_students",
            Table::PendingAdmissions => "pending_admissions",
            Table::RejectedAdmissions => "rejected_admissions",
            Table::FeePayments => "fee_payments",
        }
    }

    /// Columns the store stamps with the current time when an insert omits them.
    pub fn timestamp_defaults(&self) -> &'static [&'static str] {
        match self {
            Table::Admins | Table::Staff | Table::FeePayments => &["created_at", "updated_at"],
            Table::ActiveStudents => &["approved_at", "created_at", "updated_at"],
            Table::PendingAdmissions => &["applied_at"],
            Table::RejectedAdmissions => &["rejected_at"],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = ErpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|table| table.name() == value)
            .ok_or_else(|| ErpError::Validation(format!("unknown table `{value}`")))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    /// Text equality after trimming and lowercasing both sides.
    EqIgnoreCase(String, String),
    In(String, Vec<Value>),
}

impl Condition {
    pub fn column(&self) -> &str {
        match self {
            Condition::Eq(column, _)
            | Condition::EqIgnoreCase(column, _)
            | Condition::In(column, _) => column,
        }
    }

    fn matches(&self, row: &Value) -> bool {
        let field = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Condition::Eq(_, expected) => field == expected,
            Condition::EqIgnoreCase(_, expected) => field
                .as_str()
                .is_some_and(|text| text.trim().to_lowercase() == expected.trim().to_lowercase()),
            Condition::In(_, options) => options.contains(field),
        }
    }
}

/// AND-combined column predicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn eq_ignore_case(mut self, column: &str, value: &str) -> Self {
        self.conditions
            .push(Condition::EqIgnoreCase(column.to_string(), value.to_string()));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions.push(Condition::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.conditions.iter().all(|condition| condition.matches(row))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Row-level operations against the hosted relational store.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn select(&self, table: Table, query: &Query) -> ServiceResult<Vec<Value>>;
    async fn insert(&self, table: Table, rows: Vec<Value>) -> ServiceResult<Vec<Value>>;
    async fn update(&self, table: Table, patch: Value, filter: &Filter) -> ServiceResult<usize>;
    async fn delete(&self, table: Table, filter: &Filter) -> ServiceResult<()>;
    /// Invokes a server-side procedure. Backends without the procedure
    /// return [`ErpError::Unavailable`].
    async fn call(&self, procedure: &str, args: Value) -> ServiceResult<Value>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub identity: Identity,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Session>;
    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<Identity>;
    async fn sign_out(&self, access_token: &str) -> ServiceResult<()>;
    async fn current_user(&self, access_token: &str) -> ServiceResult<Option<Identity>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Parses the operation names emitted by Postgres triggers (`TG_OP`).
    pub fn from_operation(operation: &str) -> Option<Self> {
        match operation.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventMask {
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
}

impl EventMask {
    pub const ALL: EventMask = EventMask {
        insert: true,
        update: true,
        delete: true,
    };

    pub fn contains(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Push notifications for row changes.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(
        &self,
        table: Table,
        mask: EventMask,
        callback: ChangeCallback,
    ) -> ServiceResult<SubscriptionHandle>;
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

/// Everything the application needs from the hosted backend.
pub trait Backend: DataGateway + AuthGateway + ChangeFeed {}

impl<T: DataGateway + AuthGateway + ChangeFeed + ?Sized> Backend for T {}

pub async fn select_as<T, G>(gateway: &G, table: Table, query: &Query) -> ServiceResult<Vec<T>>
where
    T: DeserializeOwned,
    G: DataGateway + ?Sized,
{
    gateway
        .select(table, query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(ErpError::from))
        .collect()
}

pub async fn first_as<T, G>(gateway: &G, table: Table, filter: Filter) -> ServiceResult<Option<T>>
where
    T: DeserializeOwned,
    G: DataGateway + ?Sized,
{
    let query = Query::new().filter(filter).limit(1);
    Ok(select_as(gateway, table, &query).await?.into_iter().next())
}

pub async fn insert_one<P, T, G>(gateway: &G, table: Table, payload: &P) -> ServiceResult<T>
where
    P: Serialize,
    T: DeserializeOwned,
    G: DataGateway + ?Sized,
{
    let row = serde_json::to_value(payload)?;
    let inserted = gateway.insert(table, vec![row]).await?;
    let first = inserted
        .into_iter()
        .next()
        .ok_or_else(|| ErpError::Backend(format!("insert into {table} returned no row")))?;
    Ok(serde_json::from_value(first)?)
}
