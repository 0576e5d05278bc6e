use axum::{
    Json, Router,
    extract::{Path, Query as QueryParams, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use chrono::Utc;
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::admissions::{self, ApplicationForm, RejectionMode};
use crate::auth::{AuthError, CurrentUser, TokenKeys};
use crate::dashboards;
use crate::errors::{ErpError, ErrorClass};
use crate::fees::{self, FeeFilter};
use crate::models::{Role, RoleProfile};
use crate::profile;
use crate::roles;
use crate::security::generate_temp_password;
use crate::services::{Backend, Query, Table};
use crate::shell::{self, PendingBadge, Route};
use crate::students::{self, Confirmation, DeleteOutcome, NewStudent};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub keys: TokenKeys,
    pub rejection_mode: RejectionMode,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, keys: TokenKeys, rejection_mode: RejectionMode) -> Self {
        Self {
            backend,
            keys,
            rejection_mode,
        }
    }
}

pub struct ApiError(pub ErpError);

impl From<ErpError> for ApiError {
    fn from(err: ErpError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Backend(inner) => Self(inner),
            AuthError::Signing => Self(ErpError::Internal("could not issue token".into())),
            _ => Self(ErpError::Unauthenticated),
        }
    }
}

pub fn status_for(err: &ErpError) -> StatusCode {
    match err {
        ErpError::InvalidCredentials | ErpError::NoRoleAssigned | ErpError::Unauthenticated => {
            StatusCode::UNAUTHORIZED
        }
        ErpError::Forbidden(_) => StatusCode::FORBIDDEN,
        ErpError::Validation(_) => StatusCode::BAD_REQUEST,
        ErpError::DuplicateEmail(_) => StatusCode::CONFLICT,
        ErpError::MissingReceiptNumber => StatusCode::UNPROCESSABLE_ENTITY,
        ErpError::ConfirmationRequired(_) => StatusCode::PRECONDITION_REQUIRED,
        ErpError::NotFound(_) => StatusCode::NOT_FOUND,
        ErpError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ErpError::Backend(_) => StatusCode::BAD_GATEWAY,
        ErpError::PartialFailure(_) | ErpError::Serialization(_) | ErpError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        if err.class() == ErrorClass::PartialFailure {
            error!(error = %err, "partial failure reported to client");
        } else if status.is_server_error() {
            warn!(error = %err, "request failed");
        }
        let partial = match &err {
            ErpError::PartialFailure(failure) => serde_json::to_value(failure).ok(),
            _ => None,
        };
        let body = json!({
            "error": err.to_string(),
            "class": err.class(),
            "severity": err.severity(),
            "partial": partial,
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn admin_only(user: &CurrentUser) -> ApiResult<()> {
    user.require(Role::Admin).map_err(ApiError::from)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/register-student", post(register_student))
        .route("/admissions/apply", post(apply))
        .route("/admissions/catalogue", get(catalogue))
        .route("/admissions", get(list_admissions))
        .route("/admissions/pending-count", get(pending_count))
        .route("/admissions/events", get(admission_events))
        .route("/admissions/:id/approve", post(approve_admission))
        .route("/admissions/:id/reject", post(reject_admission))
        .route("/fees", get(list_fees))
        .route("/fees/:id/receipt", get(receipt))
        .route("/students", get(list_students).post(create_student))
        .route("/students/:id", delete(delete_student))
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile_view))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let backend_status = match state
        .backend
        .select(Table::Admins, &Query::new().limit(1))
        .await
    {
        Ok(_) => json!({"status": "ok"}),
        Err(err) => {
            error!(error = %err, "backend connectivity check failed");
            json!({"status": "error", "message": err.to_string()})
        }
    };
    (
        StatusCode::OK,
        Json(json!({
            "service": "ok",
            "backend": backend_status,
            "timestamp": Utc::now()
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub profile: RoleProfile,
    pub home: String,
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let signed_in =
        roles::sign_in(state.backend.as_ref(), &credentials.email, &credentials.password).await?;
    let role = signed_in.profile.role();
    let token = state
        .keys
        .issue(&signed_in.session.identity, &signed_in.session.access_token, role)?;
    Ok(Json(LoginResponse {
        token,
        home: Route::home(role).path(),
        profile: signed_in.profile,
    }))
}

async fn logout(State(state): State<AppState>, user: CurrentUser) -> ApiResult<StatusCode> {
    state.backend.sign_out(&user.claims.session_id).await?;
    info!(user = %user.identity.id, "signed out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(user: CurrentUser) -> Json<Value> {
    let role = user.role();
    Json(json!({
        "identity": user.identity,
        "profile": user.profile,
        "home": Route::home(role).path(),
        "sidebar": shell::sidebar(role),
    }))
}

async fn register_student(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let identity = students::link_self_registration(
        state.backend.as_ref(),
        &credentials.email,
        &credentials.password,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({"identity": identity}))))
}

async fn apply(
    State(state): State<AppState>,
    Json(form): Json<ApplicationForm>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let admission =
        admissions::submit_application(state.backend.as_ref(), &form, Utc::now().date_naive())
            .await?;
    Ok((StatusCode::CREATED, Json(json!({"admission": admission}))))
}

async fn catalogue() -> Json<Value> {
    Json(json!({
        "courses": admissions::COURSES,
        "qualifications": admissions::QUALIFICATIONS,
        "documents": admissions::DOCUMENT_OPTIONS,
    }))
}

async fn list_admissions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<admissions::AdmissionView>>> {
    admin_only(&user)?;
    let rows = admissions::list_admissions(state.backend.as_ref()).await?;
    Ok(Json(rows.iter().map(admissions::view).collect()))
}

async fn pending_count(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Json<Value>> {
    admin_only(&user)?;
    let count = admissions::pending_count(state.backend.as_ref()).await?;
    Ok(Json(json!({"count": count})))
}

fn count_events(badge: PendingBadge<dyn Backend>) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = badge.count();
    stream::once(async move { initial })
        .chain(stream::unfold(badge, |mut badge| async move {
            let count = badge.next_change().await?;
            Some((count, badge))
        }))
        .map(|count| Ok(Event::default().event("pending-count").data(count.to_string())))
}

async fn admission_events(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    admin_only(&user)?;
    let badge = PendingBadge::subscribe(Arc::clone(&state.backend)).await?;
    Ok(Sse::new(count_events(badge)).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub temp_password: Option<String>,
}

async fn approve_admission(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Option<Json<ApproveRequest>>,
) -> ApiResult<Json<admissions::ApprovalOutcome>> {
    admin_only(&user)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let temp_password = request
        .temp_password
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(generate_temp_password);
    let backend = state.backend.as_ref();
    let admission = admissions::find_admission(backend, &id).await?;
    let outcome = admissions::approve(backend, &admission, &temp_password, &user.identity.id).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

async fn reject_admission(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> ApiResult<StatusCode> {
    admin_only(&user)?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let backend = state.backend.as_ref();
    let admission = admissions::find_admission(backend, &id).await?;
    admissions::reject(
        backend,
        &admission,
        request.reason.as_deref(),
        &user.identity.id,
        state.rejection_mode,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_fees(
    State(state): State<AppState>,
    user: CurrentUser,
    QueryParams(criteria): QueryParams<FeeFilter>,
) -> ApiResult<Json<Value>> {
    admin_only(&user)?;
    let rows = fees::fetch_payments(state.backend.as_ref()).await?;
    let filtered = fees::filter(&rows, &criteria);
    Ok(Json(json!({
        "totals": fees::aggregate(&filtered),
        "options": fees::filter_options(&rows),
        "rows": filtered,
    })))
}

async fn receipt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let payment = fees::find_payment(state.backend.as_ref(), &id).await?;
    let owns_payment = matches!(&user.profile, RoleProfile::Student(s) if s.email == payment.student_email);
    if user.role() != Role::Admin && !owns_payment {
        return Err(ErpError::Forbidden("receipt belongs to another student".into()).into());
    }
    let receipt = fees::generate_receipt(&payment)?;
    let disposition = format!("attachment; filename=\"{}\"", receipt.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, receipt.mime_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        receipt.body,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct StudentSearch {
    #[serde(default)]
    pub search: String,
}

async fn list_students(
    State(state): State<AppState>,
    user: CurrentUser,
    QueryParams(params): QueryParams<StudentSearch>,
) -> ApiResult<Json<Vec<crate::models::ActiveStudent>>> {
    admin_only(&user)?;
    let rows = students::list(state.backend.as_ref()).await?;
    Ok(Json(students::search(&rows, &params.search)))
}

async fn create_student(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(student): Json<NewStudent>,
) -> ApiResult<(StatusCode, Json<crate::models::ActiveStudent>)> {
    admin_only(&user)?;
    let created = students::create(state.backend.as_ref(), student, &user.identity.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub confirm: bool,
}

async fn delete_student(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Option<Json<DeleteRequest>>,
) -> ApiResult<StatusCode> {
    admin_only(&user)?;
    let confirmation = Confirmation::from(body.map(|Json(b)| b.confirm).unwrap_or(false));
    match students::delete(state.backend.as_ref(), &id, confirmation, &user.identity.id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::Cancelled => Err(ErpError::ConfirmationRequired(format!("student {id}")).into()),
    }
}

async fn dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<dashboards::Dashboard>> {
    let overview = dashboards::dashboard_for(state.backend.as_ref(), &user.profile).await?;
    Ok(Json(overview))
}

async fn profile_view(user: CurrentUser) -> Json<profile::ProfileView> {
    Json(profile::build(&user.profile, Some(&user.identity.email)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PartialFailure;

    #[test]
    fn errors_map_to_distinct_statuses() {
        assert_eq!(status_for(&ErpError::NoRoleAssigned), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&ErpError::DuplicateEmail("a@b.co".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&ErpError::PartialFailure(PartialFailure {
                operation: "approve".into(),
                inserted: true,
                deleted: false,
                cause: "timeout".into(),
            })),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&ErpError::Unavailable("no table".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
