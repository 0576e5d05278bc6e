use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use eduflow_erp::{
    admissions::RejectionMode,
    api::{AppState, router},
    auth::TokenKeys,
    services::{Table, memory::InMemoryBackend},
};

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

fn app_with(backend: InMemoryBackend, mode: RejectionMode) -> Router {
    let state = AppState::new(
        Arc::new(backend),
        TokenKeys::new("route-test-secret", Duration::from_secs(600)),
        mode,
    );
    router(state)
}

fn sample() -> InMemoryBackend {
    InMemoryBackend::new_with_sample().unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();
    Reply { status, headers, bytes }
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "login failed: {}", reply.text());
    reply.json()["token"].as_str().unwrap().to_string()
}

async fn admission_id(app: &Router, token: &str, name: &str) -> String {
    let reply = send(app, Method::GET, "/admissions", Some(token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    reply
        .json()
        .as_array()
        .unwrap()
        .iter()
        .find(|view| view["admission"]["name"] == name)
        .map(|view| view["admission"]["id"].as_str().unwrap().to_string())
        .unwrap()
}

#[tokio::test]
async fn health_reports_backend_status() {
    let app = app_with(sample(), RejectionMode::Archive);
    let reply = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["backend"]["status"], "ok");
}

#[tokio::test]
async fn login_routes_each_role_home() {
    let app = app_with(sample(), RejectionMode::Archive);
    for (email, password, role) in [
        ("admin@eduflow.edu", "admin123", "admin"),
        ("staff@eduflow.edu", "staff123", "staff"),
        ("alex.johnson@eduflow.edu", "student123", "student"),
    ] {
        let reply = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        assert_eq!(reply.status, StatusCode::OK);
        let body = reply.json();
        assert_eq!(body["profile"]["role"], role);
        assert_eq!(body["home"], format!("/{role}-dashboard/dashboard"));

        let token = body["token"].as_str().unwrap();
        let me = send(&app, Method::GET, "/auth/me", Some(token), None).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.json()["identity"]["email"], email);
    }
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app_with(sample(), RejectionMode::Archive);
    let reply = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "admin@eduflow.edu", "password": "nope-nope"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["class"], "auth");
}

#[tokio::test]
async fn login_without_role_is_rejected_and_signed_out() {
    let backend = sample();
    backend.seed_user("drifter@example.com", "drifter1").unwrap();
    let app = app_with(backend.clone(), RejectionMode::Archive);

    let reply = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "drifter@example.com", "password": "drifter1"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(backend.active_sessions().unwrap(), 0);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = app_with(sample(), RejectionMode::Archive);
    let token = login(&app, "staff@eduflow.edu", "staff123").await;

    let reply = send(&app, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let me = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_are_forbidden_to_other_roles() {
    let app = app_with(sample(), RejectionMode::Archive);
    let staff = login(&app, "staff@eduflow.edu", "staff123").await;
    let student = login(&app, "alex.johnson@eduflow.edu", "student123").await;

    for token in [&staff, &student] {
        for uri in ["/admissions", "/admissions/pending-count", "/fees", "/students"] {
            let reply = send(&app, Method::GET, uri, Some(token), None).await;
            assert_eq!(reply.status, StatusCode::FORBIDDEN, "{uri}");
        }
    }

    let anonymous = send(&app, Method::GET, "/admissions", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn approving_provisions_a_student_login() {
    let backend = sample();
    let app = app_with(backend.clone(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let count = send(&app, Method::GET, "/admissions/pending-count", Some(&admin), None).await;
    assert_eq!(count.json()["count"], 3);

    let id = admission_id(&app, &admin, "John Doe").await;
    let reply = send(
        &app,
        Method::POST,
        &format!("/admissions/{id}/approve"),
        Some(&admin),
        Some(json!({"temp_password": "welcome-42"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let outcome = reply.json();
    assert_eq!(outcome["outcome"], "provisioned");
    assert_eq!(outcome["email"], "john.doe@example.com");

    let count = send(&app, Method::GET, "/admissions/pending-count", Some(&admin), None).await;
    assert_eq!(count.json()["count"], 2);

    let student = login(&app, "john.doe@example.com", "welcome-42").await;
    let me = send(&app, Method::GET, "/auth/me", Some(&student), None).await;
    assert_eq!(me.json()["profile"]["profile"]["semester"], "1");
}

#[tokio::test]
async fn approval_without_procedure_migrates_the_record() {
    let backend = sample().without_approve_procedure();
    let app = app_with(backend.clone(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let id = admission_id(&app, &admin, "Sarah Wilson").await;
    let reply = send(&app, Method::POST, &format!("/admissions/{id}/approve"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text());
    let outcome = reply.json();
    assert_eq!(outcome["outcome"], "migrated");
    assert!(outcome["student"]["user_id"].is_null());

    let pending = backend.rows(Table::PendingAdmissions).unwrap();
    assert!(pending.iter().all(|row| row["id"] != id.as_str()));
}

#[tokio::test]
async fn rejected_applications_cannot_be_approved() {
    let app = app_with(sample(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let id = admission_id(&app, &admin, "Jane Roe").await;
    let reply = send(&app, Method::POST, &format!("/admissions/{id}/approve"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejecting_archives_by_default() {
    let backend = sample();
    let app = app_with(backend.clone(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let id = admission_id(&app, &admin, "Mike Johnson").await;
    let reply = send(
        &app,
        Method::POST,
        &format!("/admissions/{id}/reject"),
        Some(&admin),
        Some(json!({"reason": "Incomplete documents"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let archived = backend.rows(Table::RejectedAdmissions).unwrap();
    assert_eq!(archived.len(), 1);
    assert!(archived[0]["notes"].as_str().unwrap().contains("Rejection reason: Incomplete documents"));
    let pending = backend.rows(Table::PendingAdmissions).unwrap();
    assert!(pending.iter().all(|row| row["id"] != id.as_str()));
}

#[tokio::test]
async fn rejecting_in_place_keeps_the_row() {
    let backend = sample();
    let app = app_with(backend.clone(), RejectionMode::MarkInPlace);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let id = admission_id(&app, &admin, "Mike Johnson").await;
    let reply = send(&app, Method::POST, &format!("/admissions/{id}/reject"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let pending = backend.rows(Table::PendingAdmissions).unwrap();
    let row = pending.iter().find(|row| row["id"] == id.as_str()).unwrap();
    assert_eq!(row["status"], "rejected");
    assert!(backend.rows(Table::RejectedAdmissions).unwrap().is_empty());
}

#[tokio::test]
async fn archive_without_table_reports_unavailable() {
    let backend = sample().without_rejected_table();
    let app = app_with(backend, RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let id = admission_id(&app, &admin, "Mike Johnson").await;
    let reply = send(&app, Method::POST, &format!("/admissions/{id}/reject"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn public_application_lands_in_the_queue() {
    let app = app_with(sample(), RejectionMode::Archive);
    let form = json!({
        "name": "Nia Clarke",
        "email": "nia@example.com",
        "phone": "+44 20 7946 0000",
        "date_of_birth": "2000-02-01",
        "address": "4 Mill Lane",
        "course": "Physics",
        "previous_qualification": "A-Levels",
        "documents_submitted": ["Passport Copy"],
        "terms_accepted": true
    });
    let reply = send(&app, Method::POST, "/admissions/apply", None, Some(form.clone())).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    assert_eq!(reply.json()["admission"]["status"], "pending");

    let mut unaccepted = form;
    unaccepted["terms_accepted"] = json!(false);
    let reply = send(&app, Method::POST, "/admissions/apply", None, Some(unaccepted)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["error"].as_str().unwrap().contains("terms and conditions"));
}

#[tokio::test]
async fn fee_ledger_filters_and_totals() {
    let app = app_with(sample(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let all = send(&app, Method::GET, "/fees", Some(&admin), None).await.json();
    assert_eq!(all["rows"].as_array().unwrap().len(), 4);
    assert_eq!(all["totals"]["collected"], 115000.0);

    let data_science = send(&app, Method::GET, "/fees?course=Data%20Science&status=all", Some(&admin), None)
        .await
        .json();
    assert_eq!(data_science["rows"].as_array().unwrap().len(), 2);
    assert_eq!(data_science["options"]["courses"].as_array().unwrap().len(), 2);

    let searched = send(&app, Method::GET, "/fees?search=rcp-2024-001", Some(&admin), None)
        .await
        .json();
    assert_eq!(searched["rows"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn receipts_download_for_admin_and_owner_only() {
    let app = app_with(sample(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;
    let alex = login(&app, "alex.johnson@eduflow.edu", "student123").await;

    let ledger = send(&app, Method::GET, "/fees", Some(&admin), None).await.json();
    let id_of = |receipt: Option<&str>, email: &str| {
        ledger["rows"]
            .as_array()
            .unwrap()
            .iter()
            .find(|row| row["receipt_number"].as_str() == receipt && row["student_email"] == email)
            .map(|row| row["id"].as_str().unwrap().to_string())
            .unwrap()
    };
    let alex_paid = id_of(Some("RCP-2024-001"), "alex.johnson@eduflow.edu");
    let maya_partial = id_of(Some("RCP-2024-002"), "maya.patel@eduflow.edu");
    let alex_pending = id_of(None, "alex.johnson@eduflow.edu");

    let reply = send(&app, Method::GET, &format!("/fees/{alex_paid}/receipt"), Some(&alex), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"receipt_RCP-2024-001.txt\""
    );
    let body = reply.text();
    assert!(body.starts_with("EDUFLOW ERP - FEE RECEIPT"));
    assert!(body.contains("Payment Status: PAID"));

    let reply = send(&app, Method::GET, &format!("/fees/{maya_partial}/receipt"), Some(&alex), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(&app, Method::GET, &format!("/fees/{maya_partial}/receipt"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(&app, Method::GET, &format!("/fees/{alex_pending}/receipt"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn creating_a_duplicate_student_conflicts() {
    let app = app_with(sample(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let fresh = json!({"name": "Leo Park", "email": "leo.park@eduflow.edu", "course": "Mathematics"});
    let reply = send(&app, Method::POST, "/students", Some(&admin), Some(fresh)).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());
    assert_eq!(reply.json()["semester"], "1");

    let duplicate = json!({"name": "Maya P", "email": "maya.patel@eduflow.edu", "course": "Physics"});
    let reply = send(&app, Method::POST, "/students", Some(&admin), Some(duplicate)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let search = send(&app, Method::GET, "/students?search=leo", Some(&admin), None).await;
    assert_eq!(search.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_student_needs_confirmation() {
    let backend = sample();
    let app = app_with(backend.clone(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;

    let students = send(&app, Method::GET, "/students?search=maya", Some(&admin), None).await.json();
    let id = students[0]["id"].as_str().unwrap().to_string();

    let reply = send(&app, Method::DELETE, &format!("/students/{id}"), Some(&admin), None).await;
    assert_eq!(reply.status, StatusCode::PRECONDITION_REQUIRED);
    assert_eq!(backend.rows(Table::ActiveStudents).unwrap().len(), 2);

    let reply = send(
        &app,
        Method::DELETE,
        &format!("/students/{id}"),
        Some(&admin),
        Some(json!({"confirm": true})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(backend.rows(Table::ActiveStudents).unwrap().len(), 1);
}

#[tokio::test]
async fn self_registration_links_the_student_record() {
    let app = app_with(sample(), RejectionMode::Archive);
    let credentials = json!({"email": "maya.patel@eduflow.edu", "password": "maya-pass"});

    let reply = send(&app, Method::POST, "/auth/register-student", None, Some(credentials.clone())).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text());

    let token = login(&app, "maya.patel@eduflow.edu", "maya-pass").await;
    let dashboard = send(&app, Method::GET, "/dashboard", Some(&token), None).await.json();
    assert_eq!(dashboard["role"], "student");
    assert_eq!(dashboard["payments"].as_array().unwrap().len(), 2);

    let again = send(&app, Method::POST, "/auth/register-student", None, Some(credentials)).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboards_and_profiles_follow_the_role() {
    let app = app_with(sample(), RejectionMode::Archive);
    let admin = login(&app, "admin@eduflow.edu", "admin123").await;
    let staff = login(&app, "staff@eduflow.edu", "staff123").await;

    let overview = send(&app, Method::GET, "/dashboard", Some(&admin), None).await.json();
    assert_eq!(overview["role"], "admin");
    assert_eq!(overview["pending_admissions"], 3);
    assert_eq!(overview["total_students"], 2);

    let overview = send(&app, Method::GET, "/dashboard", Some(&staff), None).await.json();
    assert_eq!(overview["role"], "staff");

    let profile = send(&app, Method::GET, "/profile", Some(&staff), None).await.json();
    assert_eq!(profile["role_label"], "Staff");
    assert_eq!(profile["phone"], "Not provided");
    assert_eq!(profile["affiliation"]["label"], "Department");
}
