use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{
    AuthGateway, ChangeCallback, ChangeEvent, ChangeFeed, ChangeKind, DataGateway, ErpError,
    EventMask, Filter, Identity, Query, ServiceResult, Session, SubscriptionHandle, Table,
};
use crate::admissions::APPROVE_PROCEDURE;
use crate::models::{DEFAULT_SEMESTER, academic_year_for};
use crate::security::{hash_password, verify_password};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Debug)]
struct StoredUser {
    id: String,
    email: String,
    password_hash: String,
}

struct Subscription {
    table: Table,
    mask: EventMask,
    callback: ChangeCallback,
}

struct InMemoryState {
    tables: HashMap<Table, Vec<Value>>,
    users: HashMap<String, StoredUser>,
    sessions: HashMap<String, Identity>,
    subscriptions: HashMap<u64, Subscription>,
    next_subscription: u64,
    rejected_table: bool,
    approve_procedure: bool,
    injected_failures: Vec<(Table, Operation)>,
}

impl Default for InMemoryState {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            users: HashMap::new(),
            sessions: HashMap::new(),
            subscriptions: HashMap::new(),
            next_subscription: 1,
            rejected_table: true,
            approve_procedure: true,
            injected_failures: Vec::new(),
        }
    }
}

impl InMemoryState {
    fn table(&self, table: Table) -> ServiceResult<&Vec<Value>> {
        self.ensure_exists(table)?;
        static EMPTY: Vec<Value> = Vec::new();
        Ok(self.tables.get(&table).unwrap_or(&EMPTY))
    }

    fn table_mut(&mut self, table: Table) -> ServiceResult<&mut Vec<Value>> {
        self.ensure_exists(table)?;
        Ok(self.tables.entry(table).or_default())
    }

    fn ensure_exists(&self, table: Table) -> ServiceResult<()> {
        if table == Table::RejectedAdmissions && !self.rejected_table {
            return Err(ErpError::Unavailable(format!(
                "relation \"{}\" does not exist",
                table.name()
            )));
        }
        Ok(())
    }

    fn take_failure(&mut self, table: Table, operation: Operation) -> ServiceResult<()> {
        if let Some(pos) = self
            .injected_failures
            .iter()
            .position(|entry| *entry == (table, operation))
        {
            self.injected_failures.remove(pos);
            return Err(ErpError::Backend(format!(
                "injected {operation:?} failure on {}",
                table.name()
            )));
        }
        Ok(())
    }

    fn create_user(&mut self, email: &str, password: &str) -> ServiceResult<Identity> {
        let key = email.trim().to_lowercase();
        if self.users.contains_key(&key) {
            return Err(ErpError::Validation(format!("{email} is already registered")));
        }
        let user = StoredUser {
            id: Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password_hash: hash_password(password)?,
        };
        let identity = Identity {
            id: user.id.clone(),
            email: user.email.clone(),
        };
        self.users.insert(key, user);
        Ok(identity)
    }

    fn listeners(&self, event: ChangeEvent) -> Vec<ChangeCallback> {
        self.subscriptions
            .values()
            .filter(|sub| sub.table == event.table && sub.mask.contains(event.kind))
            .map(|sub| sub.callback.clone())
            .collect()
    }
}

/// Process-local stand-in for the hosted backend.
///
/// Mirrors the store's defaults (generated ids, timestamp columns), keeps
/// argon2-hashed credentials, and runs the approval procedure atomically
/// under its lock.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_sample() -> ServiceResult<Self> {
        let backend = Self::new();
        let admin = backend.seed_user("admin@eduflow.edu", "admin123")?;
        let staff = backend.seed_user("staff@eduflow.edu", "staff123")?;
        let student = backend.seed_user("alex.johnson@eduflow.edu", "student123")?;

        backend.seed_rows(
            Table::Admins,
            vec![json!({
                "id": admin.id,
                "name": "Grace Hopper",
                "email": admin.email,
                "phone": "+1-555-0100",
                "department": "Administration",
            })],
        )?;
        backend.seed_rows(
            Table::Staff,
            vec![json!({
                "id": staff.id,
                "name": "Sarah Brown",
                "email": staff.email,
                "department": "Computer Science",
            })],
        )?;
        backend.seed_rows(
            Table::ActiveStudents,
            vec![
                json!({
                    "name": "Alex Johnson",
                    "email": student.email,
                    "phone": "+1-555-0142",
                    "course": "Computer Science",
                    "semester": "4",
                    "academic_year": "2023-2024",
                    "date_of_birth": "2003-05-14",
                    "address": "12 College Road",
                    "previous_qualification": "High School Diploma",
                    "documents_submitted": ["High School Transcript", "Identity Document"],
                    "approved_at": "2023-08-01T09:00:00+00:00",
                    "user_id": student.id,
                }),
                json!({
                    "name": "Maya Patel",
                    "email": "maya.patel@eduflow.edu",
                    "course": "Data Science",
                    "semester": "2",
                    "academic_year": "2023-2024",
                    "approved_at": "2024-01-10T09:00:00+00:00",
                }),
            ],
        )?;
        backend.seed_rows(
            Table::PendingAdmissions,
            vec![
                sample_admission("John Doe", "john.doe@example.com", "Computer Science", "pending", "2024-01-15T10:00:00+00:00"),
                sample_admission("Mike Johnson", "mike.johnson@example.com", "Mechanical Engineering", "under_review", "2024-01-13T10:00:00+00:00"),
                sample_admission("Sarah Wilson", "sarah.wilson@example.com", "Civil Engineering", "pending", "2024-01-12T10:00:00+00:00"),
                sample_admission("Jane Roe", "jane.roe@example.com", "Economics", "rejected", "2024-01-09T10:00:00+00:00"),
            ],
        )?;
        backend.seed_rows(
            Table::FeePayments,
            vec![
                sample_payment("Alex Johnson", "alex.johnson@eduflow.edu", "Computer Science", "4", "Tuition Fee", 85000.0, 85000.0, "paid", Some("RCP-2024-001"), "2024-01-01T08:00:00+00:00"),
                sample_payment("Alex Johnson", "alex.johnson@eduflow.edu", "Computer Science", "4", "Hostel Fee", 40000.0, 0.0, "pending", None, "2024-01-05T08:00:00+00:00"),
                sample_payment("Maya Patel", "maya.patel@eduflow.edu", "Data Science", "2", "Tuition Fee", 60000.0, 30000.0, "partial", Some("RCP-2024-002"), "2024-01-08T08:00:00+00:00"),
                sample_payment("Maya Patel", "maya.patel@eduflow.edu", "Data Science", "2", "Library Fee", 2000.0, 0.0, "overdue", None, "2023-11-20T08:00:00+00:00"),
            ],
        )?;
        Ok(backend)
    }

    /// Simulates a deployment where the `rejected_admissions` table was never created.
    pub fn without_rejected_table(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.rejected_table = false;
        }
        self
    }

    /// Simulates a deployment missing the `approve_admission` procedure.
    pub fn without_approve_procedure(self) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.approve_procedure = false;
        }
        self
    }

    /// Makes the next `operation` on `table` fail with a backend error.
    pub fn fail_next(&self, table: Table, operation: Operation) -> ServiceResult<()> {
        self.lock()?.injected_failures.push((table, operation));
        Ok(())
    }

    pub fn seed_user(&self, email: &str, password: &str) -> ServiceResult<Identity> {
        self.lock()?.create_user(email, password)
    }

    /// Inserts rows without firing change notifications.
    pub fn seed_rows(&self, table: Table, rows: Vec<Value>) -> ServiceResult<Vec<Value>> {
        let mut state = self.lock()?;
        let stored = state.table_mut(table)?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let row = with_defaults(table, row)?;
            stored.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    pub fn rows(&self, table: Table) -> ServiceResult<Vec<Value>> {
        Ok(self.lock()?.table(table)?.clone())
    }

    pub fn subscription_count(&self) -> ServiceResult<usize> {
        Ok(self.lock()?.subscriptions.len())
    }

    pub fn active_sessions(&self) -> ServiceResult<usize> {
        Ok(self.lock()?.sessions.len())
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|_| ErpError::Internal("in-memory state poisoned".into()))
    }

    /// Runs callbacks outside the lock so they may call back into the backend.
    fn publish(&self, events: &[ChangeEvent]) {
        for event in events {
            let listeners = match self.lock() {
                Ok(state) => state.listeners(*event),
                Err(_) => return,
            };
            for callback in listeners {
                callback(*event);
            }
        }
    }

    fn approve_admission(&self, args: &Value) -> ServiceResult<Value> {
        let admission_id = args
            .get("admission_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ErpError::Validation("admission_id is required".into()))?;
        let temp_password = args
            .get("temp_password")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut state = self.lock()?;
        let Some(admission) = state
            .table(Table::PendingAdmissions)?
            .iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(admission_id))
            .cloned()
        else {
            return Ok(json!({"success": false, "error": "admission not found"}));
        };
        let email = admission
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let duplicate = state
            .table(Table::ActiveStudents)?
            .iter()
            .filter_map(|row| row.get("email").and_then(Value::as_str))
            .any(|existing| existing.trim().to_lowercase() == email.trim().to_lowercase());
        if duplicate {
            return Ok(json!({"success": false, "error": "a student with this email already exists"}));
        }

        let existing = state
            .users
            .get(&email.to_lowercase())
            .map(|user| user.id.clone());
        let user_id = match existing {
            Some(id) => id,
            None => match state.create_user(&email, temp_password) {
                Ok(identity) => identity.id,
                Err(err) => return Ok(json!({"success": false, "error": err.to_string()})),
            },
        };

        let mut student = Map::new();
        for field in [
            "name",
            "email",
            "phone",
            "course",
            "date_of_birth",
            "address",
            "previous_qualification",
            "documents_submitted",
            "notes",
        ] {
            if let Some(value) = admission.get(field) {
                student.insert(field.to_string(), value.clone());
            }
        }
        let today = Utc::now().date_naive();
        student.insert("semester".into(), json!(DEFAULT_SEMESTER));
        student.insert("academic_year".into(), json!(academic_year_for(today)));
        student.insert("user_id".into(), json!(user_id));
        let student = with_defaults(Table::ActiveStudents, Value::Object(student))?;

        state.table_mut(Table::ActiveStudents)?.push(student);
        state
            .table_mut(Table::PendingAdmissions)?
            .retain(|row| row.get("id").and_then(Value::as_str) != Some(admission_id));
        drop(state);

        self.publish(&[
            ChangeEvent {
                table: Table::ActiveStudents,
                kind: ChangeKind::Insert,
            },
            ChangeEvent {
                table: Table::PendingAdmissions,
                kind: ChangeKind::Delete,
            },
        ]);
        Ok(json!({"success": true, "email": email, "temp_password": temp_password}))
    }
}

#[async_trait]
impl DataGateway for InMemoryBackend {
    async fn select(&self, table: Table, query: &Query) -> ServiceResult<Vec<Value>> {
        let mut state = self.lock()?;
        state.take_failure(table, Operation::Select)?;
        let mut rows: Vec<Value> = state
            .table(table)?
            .iter()
            .filter(|row| query.filter.matches(row))
            .cloned()
            .collect();
        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.descending { ordering.reverse() } else { ordering }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> ServiceResult<Vec<Value>> {
        let inserted = {
            let mut state = self.lock()?;
            state.take_failure(table, Operation::Insert)?;
            let rows = rows
                .into_iter()
                .map(|row| with_defaults(table, row))
                .collect::<ServiceResult<Vec<_>>>()?;
            state.table_mut(table)?.extend(rows.iter().cloned());
            rows
        };
        debug!(table = table.name(), count = inserted.len(), "in-memory insert");
        self.publish(&[ChangeEvent {
            table,
            kind: ChangeKind::Insert,
        }]);
        Ok(inserted)
    }

    async fn update(&self, table: Table, patch: Value, filter: &Filter) -> ServiceResult<usize> {
        let Value::Object(patch) = patch else {
            return Err(ErpError::Validation("update patch must be an object".into()));
        };
        let affected = {
            let mut state = self.lock()?;
            state.take_failure(table, Operation::Update)?;
            let mut affected = 0;
            for row in state.table_mut(table)?.iter_mut() {
                if !filter.matches(row) {
                    continue;
                }
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
            affected
        };
        if affected > 0 {
            self.publish(&[ChangeEvent {
                table,
                kind: ChangeKind::Update,
            }]);
        }
        Ok(affected)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> ServiceResult<()> {
        let removed = {
            let mut state = self.lock()?;
            state.take_failure(table, Operation::Delete)?;
            let rows = state.table_mut(table)?;
            let before = rows.len();
            rows.retain(|row| !filter.matches(row));
            before - rows.len()
        };
        if removed > 0 {
            self.publish(&[ChangeEvent {
                table,
                kind: ChangeKind::Delete,
            }]);
        }
        Ok(())
    }

    async fn call(&self, procedure: &str, args: Value) -> ServiceResult<Value> {
        let enabled = self.lock()?.approve_procedure;
        if procedure == APPROVE_PROCEDURE && enabled {
            return self.approve_admission(&args);
        }
        Err(ErpError::Unavailable(format!(
            "function {procedure}(jsonb) does not exist"
        )))
    }
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ServiceResult<Session> {
        let mut state = self.lock()?;
        let user = state
            .users
            .get(&email.trim().to_lowercase())
            .cloned()
            .ok_or(ErpError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(ErpError::InvalidCredentials);
        }
        let identity = Identity {
            id: user.id,
            email: user.email,
        };
        let access_token = Uuid::new_v4().to_string();
        state.sessions.insert(access_token.clone(), identity.clone());
        Ok(Session {
            access_token,
            identity,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> ServiceResult<Identity> {
        self.lock()?.create_user(email, password)
    }

    async fn sign_out(&self, access_token: &str) -> ServiceResult<()> {
        self.lock()?.sessions.remove(access_token);
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> ServiceResult<Option<Identity>> {
        Ok(self.lock()?.sessions.get(access_token).cloned())
    }
}

impl ChangeFeed for InMemoryBackend {
    fn subscribe(
        &self,
        table: Table,
        mask: EventMask,
        callback: ChangeCallback,
    ) -> ServiceResult<SubscriptionHandle> {
        let mut state = self.lock()?;
        let id = state.next_subscription;
        state.next_subscription += 1;
        state.subscriptions.insert(
            id,
            Subscription {
                table,
                mask,
                callback,
            },
        );
        Ok(SubscriptionHandle(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Ok(mut state) = self.lock() {
            state.subscriptions.remove(&handle.0);
        }
    }
}

fn with_defaults(table: Table, row: Value) -> ServiceResult<Value> {
    let Value::Object(mut fields) = row else {
        return Err(ErpError::Validation(format!(
            "rows for {} must be objects",
            table.name()
        )));
    };
    fields
        .entry("id")
        .or_insert_with(|| json!(Uuid::new_v4().to_string()));
    let now = Utc::now().to_rfc3339();
    for column in table.timestamp_defaults() {
        fields
            .entry(column.to_string())
            .or_insert_with(|| json!(now));
    }
    Ok(Value::Object(fields))
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sample_admission(name: &str, email: &str, course: &str, status: &str, applied_at: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "phone": "+1-555-0199",
        "course": course,
        "status": status,
        "date_of_birth": "2005-03-21",
        "address": "221 Park Avenue",
        "previous_qualification": "High School Diploma",
        "documents_submitted": ["High School Transcript", "Birth Certificate"],
        "notes": "",
        "applied_at": applied_at,
    })
}

#[allow(clippy::too_many_arguments)]
fn sample_payment(
    student_name: &str,
    student_email: &str,
    course: &str,
    semester: &str,
    fee_type: &str,
    amount: f64,
    paid_amount: f64,
    status: &str,
    receipt_number: Option<&str>,
    created_at: &str,
) -> Value {
    let due_date = NaiveDate::from_ymd_opt(2024, 2, 28).map(|d| d.to_string());
    json!({
        "student_id": student_email,
        "student_name": student_name,
        "student_email": student_email,
        "student_roll_no": format!("{}{}", course.chars().take(2).collect::<String>().to_uppercase(), 2024001),
        "course": course,
        "semester": semester,
        "academic_year": "2023-2024",
        "fee_type": fee_type,
        "fee_category": "Academic",
        "amount": amount,
        "paid_amount": paid_amount,
        "balance_amount": amount - paid_amount,
        "payment_status": status,
        "payment_method": if paid_amount > 0.0 { Some("Bank Transfer") } else { None },
        "payment_date": if paid_amount > 0.0 { Some("2024-01-15") } else { None },
        "due_date": due_date,
        "receipt_number": receipt_number,
        "created_at": created_at,
        "updated_at": created_at,
    })
}
