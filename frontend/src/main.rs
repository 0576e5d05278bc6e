use dioxus::prelude::*;
use eduflow_erp::admissions::{self, ApplicationForm};
use eduflow_erp::dashboards::{self, AttendanceSheet, AttendanceStatus};
use eduflow_erp::models::{ActiveStudent, FeePayment, PendingAdmission, Role, RoleProfile};
use eduflow_erp::shell::{self, Badge, Route, Section, StaleGuard};
use reqwasm::http::{Method, Request, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::{Blob, BlobPropertyBag, EventSource, HtmlAnchorElement, MessageEvent, Url};

const DEFAULT_API_BASE: &str = "http://127.0.0.1:3000";
const TOKEN_KEY: &str = "eduflow_token";
const API_BASE_KEY: &str = "eduflow_api_base";

fn main() {
    launch(App);
}

// ---------- Types ----------
#[derive(Clone, Debug, PartialEq, Deserialize)]
struct LoginResponse { token: String, profile: RoleProfile, home: String }
#[derive(Deserialize)]
struct MeResponse { profile: RoleProfile }
#[derive(Deserialize)]
struct ErrorBody { error: String }

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct AdmissionRow { admission: PendingAdmission, status_label: String, can_approve: bool, can_reject: bool }

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct Totals { collected: f64, pending: f64, overdue: f64 }
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct LedgerOptions { courses: Vec<String>, semesters: Vec<String> }
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct FeeLedger { rows: Vec<FeePayment>, totals: Totals, options: LedgerOptions }

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum ApprovalOutcome { Provisioned { email: String, temp_password: String }, Migrated { student: ActiveStudent } }

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct ProfileField { label: String, value: String }
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct StudentDetails { student_id: String, course: String, academic_year: String, semester: String, date_of_birth: Option<String>, address: Option<String>, previous_qualification: Option<String>, documents_submitted: Vec<String>, notes: Option<String> }
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct ProfileView { name: String, email: String, phone: String, role_label: String, affiliation: Option<ProfileField>, member_since: String, last_updated: String, student: Option<StudentDetails> }

#[derive(Serialize)]
struct Credentials { email: String, password: String }
#[derive(Serialize)]
struct RejectPayload { reason: Option<String> }
#[derive(Serialize)]
struct DeletePayload { confirm: bool }
#[derive(Clone, Debug, Default, Serialize)]
struct StudentPayload { name: String, email: String, phone: Option<String>, course: String, semester: Option<String> }

/// Signals shared by every panel.
#[derive(Clone)]
struct AppCtx {
    api_base: Signal<String>,
    token: Signal<String>,
    status: Signal<String>,
    pending: Signal<Option<usize>>,
    guard: StaleGuard,
}

impl AppCtx {
    fn creds(&self) -> (String, String) { (self.api_base.peek().clone(), self.token.peek().clone()) }
    fn notify(&self, message: impl Into<String>) { let mut status = self.status; status.set(message.into()); }
}

// ---------- Utilities ----------
fn window() -> Option<web_sys::Window> { web_sys::window() }
fn storage() -> Option<web_sys::Storage> { window().and_then(|win| win.local_storage().ok().flatten()) }
fn store(key: &str, value: &str) { if let Some(s) = storage() { let _ = if value.is_empty() { s.remove_item(key) } else { s.set_item(key, value) }; } }
fn load(key: &str) -> Option<String> { storage().and_then(|s| s.get_item(key).ok().flatten()).filter(|v| !v.is_empty()) }
fn current_path() -> String { window().and_then(|win| win.location().pathname().ok()).unwrap_or_else(|| "/".to_string()) }
fn push_path(path: &str) { if let Some(history) = window().and_then(|win| win.history().ok()) { let _ = history.push_state_with_url(&JsValue::NULL, "", Some(path)); } }
fn confirm(message: &str) -> bool { window().and_then(|win| win.confirm_with_message(message).ok()).unwrap_or(false) }
fn js_error(err: JsValue) -> String { err.as_string().unwrap_or_else(|| format!("{err:?}")) }
fn money(value: f64) -> String { format!("{value:.2}") }
fn or_dash(value: Option<&str>) -> String { value.filter(|v| !v.trim().is_empty()).unwrap_or("-").to_string() }

fn endpoint(base: &str, path: &str) -> String { format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/')) }

fn with_auth(req: Request, token: &str) -> Request {
    if token.trim().is_empty() { req } else { req.header("Authorization", &format!("Bearer {token}")) }
}

async fn read_reply<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    let status = resp.status();
    let text = resp.text().await.map_err(|e| format!("failed to read response: {e}"))?;
    if !resp.ok() {
        return Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {status}: {text}"),
        });
    }
    let text = if text.trim().is_empty() { "null".to_string() } else { text };
    serde_json::from_str(&text).map_err(|e| format!("unexpected response: {e}"))
}

async fn get_json<T: DeserializeOwned>(base: &str, path: &str, token: &str) -> Result<T, String> {
    let resp = with_auth(Request::get(&endpoint(base, path)), token).send().await.map_err(|e| format!("network error: {e}"))?;
    read_reply(resp).await
}

async fn send_json<T: DeserializeOwned, B: Serialize>(method: Method, base: &str, path: &str, token: &str, body: &B) -> Result<T, String> {
    let payload = serde_json::to_string(body).map_err(|e| format!("could not encode request: {e}"))?;
    let req = Request::new(&endpoint(base, path)).method(method).header("Content-Type", "application/json").body(payload);
    let resp = with_auth(req, token).send().await.map_err(|e| format!("network error: {e}"))?;
    read_reply(resp).await
}

fn save_text_file(file_name: &str, body: &str) -> Result<(), String> {
    let parts = js_sys::Array::of1(&JsValue::from_str(body));
    let options = BlobPropertyBag::new();
    options.set_type("text/plain");
    let blob = Blob::new_with_str_sequence_and_options(&parts, &options).map_err(js_error)?;
    let href = Url::create_object_url_with_blob(&blob).map_err(js_error)?;
    let document = window().and_then(|win| win.document()).ok_or("no document")?;
    let anchor: HtmlAnchorElement = document.create_element("a").map_err(js_error)?.dyn_into().map_err(|_| "not an anchor".to_string())?;
    anchor.set_href(&href);
    anchor.set_download(file_name);
    anchor.click();
    Url::revoke_object_url(&href).map_err(js_error)
}

async fn download_receipt(base: &str, token: &str, payment_id: &str) -> Result<String, String> {
    let resp = with_auth(Request::get(&endpoint(base, &format!("/fees/{payment_id}/receipt"))), token).send().await.map_err(|e| format!("network error: {e}"))?;
    let file_name = resp
        .headers()
        .get("content-disposition")
        .and_then(|value| value.split("filename=").nth(1).map(|name| name.trim_matches('"').to_string()))
        .unwrap_or_else(|| "receipt.txt".to_string());
    if !resp.ok() {
        return Err(read_reply::<Value>(resp).await.err().unwrap_or_else(|| "receipt unavailable".to_string()));
    }
    let body = resp.text().await.map_err(|e| format!("failed to read receipt: {e}"))?;
    save_text_file(&file_name, &body)?;
    Ok(file_name)
}

fn initial_route(role: Role) -> Route {
    match Route::parse(&current_path()) {
        Some(route) if route.role == role => route,
        _ => Route::home(role),
    }
}

/// Server-sent pending-admissions count; closes the stream when dropped.
struct LiveBadge {
    source: EventSource,
    _listener: Closure<dyn FnMut(MessageEvent)>,
}

impl LiveBadge {
    fn open(base: &str, token: &str, mut pending: Signal<Option<usize>>) -> Option<Self> {
        let path = format!("/admissions/events?access_token={}", js_sys::encode_uri_component(token));
        let source = EventSource::new(&endpoint(base, &path)).ok()?;
        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(count) = event.data().as_string().and_then(|data| data.trim().parse::<usize>().ok()) {
                pending.set(Some(count));
            }
        });
        source.add_event_listener_with_callback("pending-count", listener.as_ref().unchecked_ref()).ok()?;
        Some(Self { source, _listener: listener })
    }
}

impl Drop for LiveBadge {
    fn drop(&mut self) { self.source.close(); }
}

fn use_dashboard() -> Signal<Option<Value>> {
    let ctx = use_context::<AppCtx>();
    let mut data = use_signal(|| None::<Value>);
    use_hook(move || {
        let ticket = ctx.guard.begin();
        let (base, jwt) = ctx.creds();
        spawn(async move {
            match get_json::<Value>(&base, "/dashboard", &jwt).await {
                Ok(value) => { if let Some(value) = ticket.accept(value) { data.set(Some(value)); } }
                Err(err) => { if ticket.is_current() { ctx.notify(format!("Failed to load dashboard: {err}")); } }
            }
        });
    });
    data
}

fn field(value: &Value, key: &str) -> String {
    match &value[key] {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn amount(value: &Value, key: &str) -> String { money(value[key].as_f64().unwrap_or_default()) }
fn fee_totals(overview: &Value) -> (String, String, String) { let fees = &overview["fees"]; (amount(fees, "collected"), amount(fees, "pending"), amount(fees, "overdue")) }

fn badge_view(badge: Option<Badge>, pending: Option<usize>) -> Element {
    match badge {
        Some(Badge::PendingAdmissions) => match pending {
            Some(count) if count > 0 => rsx! { span { class: "badge", "{count}" } },
            _ => None,
        },
        Some(Badge::Label(text)) => rsx! { span { class: "badge badge--muted", "{text}" } },
        None => None,
    }
}

// ---------- App ----------
fn App() -> Element {
    let api_base = use_signal(|| load(API_BASE_KEY).unwrap_or_else(|| DEFAULT_API_BASE.to_string()));
    let mut token = use_signal(|| load(TOKEN_KEY).unwrap_or_default());
    let status = use_signal(|| "Ready".to_string());
    let mut pending = use_signal(|| None::<usize>);
    let guard = use_hook(StaleGuard::new);
    let ctx = use_context_provider(|| AppCtx { api_base, token, status, pending, guard });
    let mut profile = use_signal(|| None::<RoleProfile>);
    let mut route = use_signal(|| None::<Route>);
    let mut live = use_signal(|| None::<LiveBadge>);

    let restore_ctx = ctx.clone();
    use_future(move || {
        let ctx = restore_ctx.clone();
        async move {
            let (base, jwt) = ctx.creds();
            if jwt.is_empty() { return; }
            match get_json::<MeResponse>(&base, "/auth/me", &jwt).await {
                Ok(me) => {
                    route.set(Some(initial_route(me.profile.role())));
                    profile.set(Some(me.profile));
                }
                Err(err) => {
                    store(TOKEN_KEY, "");
                    token.set(String::new());
                    ctx.notify(format!("Please sign in again: {err}"));
                }
            }
        }
    });

    use_effect(move || {
        let is_admin = profile.read().as_ref().map(|p| p.role() == Role::Admin).unwrap_or(false);
        let jwt = token.read().clone();
        let base = api_base.peek().clone();
        live.set(if is_admin && !jwt.is_empty() { LiveBadge::open(&base, &jwt, pending) } else { None });
    });

    let logout_ctx = ctx.clone();
    let logout = move |_| {
        let ctx = logout_ctx.clone();
        let (base, jwt) = ctx.creds();
        spawn(async move {
            if let Err(err) = send_json::<(), _>(Method::POST, &base, "/auth/logout", &jwt, &json!({})).await {
                ctx.notify(format!("Signed out locally: {err}"));
            }
        });
        store(TOKEN_KEY, "");
        token.set(String::new());
        profile.set(None);
        route.set(None);
        pending.set(None);
        push_path("/");
    };

    let on_signed_in = move |resp: LoginResponse| {
        store(TOKEN_KEY, &resp.token);
        token.set(resp.token);
        let next = Route::parse(&resp.home).unwrap_or_else(|| Route::home(resp.profile.role()));
        push_path(&next.path());
        route.set(Some(next));
        profile.set(Some(resp.profile));
    };

    let navigate = move |next: Route| {
        push_path(&next.path());
        route.set(Some(next));
    };

    let current_profile = profile.read().clone();
    let current_route = *route.read();
    let account = current_profile.as_ref().map(|p| {
        let role_label = p.role().label();
        let name = p.name().to_string();
        rsx! {
            div { class: "nav-links",
                span { class: "pill", "{role_label}" }
                span { class: "muted", "{name}" }
                button { class: "ghost-btn", onclick: logout, "Sign out" }
            }
        }
    });

    rsx! {
        style { {STYLE} }
        div { class: "app-shell",
            nav { class: "top-nav",
                div { class: "brand",
                    span { class: "brand__dot" }
                    span { "EduFlow ERP" }
                    span { class: "brand__tag", "college" }
                }
                {account}
            }

            div { class: "status-bar", "{status.read()}" }

            {match (current_profile, current_route) {
                (Some(profile), Some(route)) => rsx! { Shell { profile, route, on_navigate: navigate } },
                _ => rsx! { Landing { on_signed_in } },
            }}
        }
    }
}

#[component]
fn Shell(profile: RoleProfile, route: Route, on_navigate: EventHandler<Route>) -> Element {
    let ctx = use_context::<AppCtx>();
    let role = profile.role();
    let pending = *ctx.pending.read();
    let body = match route.section {
        Section::Dashboard => rsx! { DashboardPanel { role } },
        Section::Admissions => rsx! { AdmissionsPanel {} },
        Section::StudentAccounts => rsx! { StudentsPanel {} },
        Section::Fees if role == Role::Admin => rsx! { FeesPanel {} },
        Section::Fees => rsx! { MyFeesPanel {} },
        Section::Attendance => rsx! { AttendancePanel {} },
        Section::Hostel => rsx! { HostelPanel { role } },
        Section::Exams => rsx! { ExamsPanel { role } },
        Section::Reports => rsx! { ReportsPanel { role } },
        Section::Profile => rsx! { ProfilePanel {} },
        Section::Settings => rsx! { SettingsPanel {} },
    };

    rsx! {
        div { class: "layout",
            aside { class: "sidebar",
                for item in shell::sidebar(role).iter() {
                    button {
                        key: "{item.section.slug()}",
                        class: if item.section == route.section { "nav-link active" } else { "nav-link" },
                        onclick: move |_| on_navigate.call(Route::resolve(role, Some(item.section.slug()))),
                        span { "{item.label}" }
                        {badge_view(item.badge, pending)}
                    }
                }
            }
            main { class: "content", {body} }
        }
    }
}

// ---------- Sign-in, self-registration, public application ----------
#[component]
fn Landing(on_signed_in: EventHandler<LoginResponse>) -> Element {
    let ctx = use_context::<AppCtx>();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut mode = use_signal(|| "login");

    let submit_ctx = ctx.clone();
    let submit = move |_| {
        let ctx = submit_ctx.clone();
        let (base, _) = ctx.creds();
        let body = Credentials { email: email.read().trim().to_string(), password: password.read().clone() };
        if body.email.is_empty() || body.password.is_empty() {
            ctx.notify("Please enter your email and password");
            return;
        }
        let registering = *mode.read() == "register";
        spawn(async move {
            if registering {
                ctx.notify("Creating your account...");
                if let Err(err) = send_json::<Value, _>(Method::POST, &base, "/auth/register-student", "", &body).await {
                    ctx.notify(format!("Registration failed: {err}"));
                    return;
                }
            }
            ctx.notify("Signing in...");
            match send_json::<LoginResponse, _>(Method::POST, &base, "/auth/login", "", &body).await {
                Ok(resp) => {
                    ctx.notify(format!("Welcome, {}", resp.profile.name()));
                    on_signed_in.call(resp);
                }
                Err(err) => ctx.notify(format!("Sign-in failed: {err}")),
            }
        });
    };

    let current_mode = *mode.read();
    rsx! {
        section { class: "hero",
            div { class: "hero__copy",
                span { class: "pill", "College administration" }
                h1 { "EduFlow ERP" }
                p { "Admissions, student accounts, fees and campus services for administrators, staff and students." }
                div { class: "hero__actions",
                    button { class: if current_mode == "login" { "" } else { "ghost-btn" }, onclick: move |_| mode.set("login"), "Sign in" }
                    button { class: if current_mode == "register" { "" } else { "ghost-btn" }, onclick: move |_| mode.set("register"), "Student registration" }
                    button { class: if current_mode == "apply" { "" } else { "ghost-btn" }, onclick: move |_| mode.set("apply"), "Apply for admission" }
                }
            }
            if current_mode == "apply" {
                div { class: "hero__panel", ApplicationPanel {} }
            } else {
                div { class: "hero__panel",
                    label { "Email" }
                    input { r#type: "email", value: "{email.read()}", oninput: move |evt| email.set(evt.value()) }
                    label { "Password" }
                    input { r#type: "password", value: "{password.read()}", oninput: move |evt| password.set(evt.value()) }
                    if current_mode == "register" {
                        p { class: "muted", "Use the email the admissions office holds for you." }
                    }
                    div { class: "actions",
                        button { onclick: submit, if current_mode == "register" { "Register and sign in" } else { "Sign in" } }
                    }
                }
            }
        }
    }
}

#[component]
fn ApplicationPanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut form = use_signal(ApplicationForm::default);
    let mut dob = use_signal(String::new);
    let mut submitted = use_signal(|| false);

    let submit = move |_| {
        let ctx = ctx.clone();
        let mut application = form.read().clone();
        application.date_of_birth = chrono::NaiveDate::parse_from_str(dob.read().trim(), "%Y-%m-%d").ok();
        let today = chrono::Local::now().date_naive();
        if let Err(err) = admissions::validate_application(&application, today) {
            ctx.notify(err.to_string());
            return;
        }
        let (base, _) = ctx.creds();
        spawn(async move {
            ctx.notify("Submitting application...");
            match send_json::<Value, _>(Method::POST, &base, "/admissions/apply", "", &application).await {
                Ok(_) => { submitted.set(true); ctx.notify("Application submitted. The admissions office will be in touch."); }
                Err(err) => ctx.notify(format!("Submission failed: {err}")),
            }
        });
    };

    if *submitted.read() {
        return rsx! { p { "Thank you! Your application is pending review." } };
    }

    let current = form.read().clone();
    rsx! {
        div { class: "stack",
            input { placeholder: "Full name", value: "{current.name}", oninput: move |evt| form.write().name = evt.value() }
            input { placeholder: "Email", value: "{current.email}", oninput: move |evt| form.write().email = evt.value() }
            input { placeholder: "Phone", value: "{current.phone}", oninput: move |evt| form.write().phone = evt.value() }
            input { r#type: "date", value: "{dob.read()}", oninput: move |evt| dob.set(evt.value()) }
            textarea { placeholder: "Address", rows: "2", value: "{current.address}", oninput: move |evt| form.write().address = evt.value() }
            select { value: "{current.course}", onchange: move |evt| form.write().course = evt.value(),
                option { value: "", "Select a course" }
                for course in admissions::COURSES.iter() { option { key: "{course}", value: "{course}", "{course}" } }
            }
            select { value: "{current.previous_qualification}", onchange: move |evt| form.write().previous_qualification = evt.value(),
                option { value: "", "Previous qualification" }
                for qualification in admissions::QUALIFICATIONS.iter() { option { key: "{qualification}", value: "{qualification}", "{qualification}" } }
            }
            div { class: "checks",
                for document in admissions::DOCUMENT_OPTIONS.iter() {
                    label { key: "{document}", class: "checkbox",
                        input {
                            r#type: "checkbox",
                            checked: current.documents_submitted.iter().any(|d| d == *document),
                            onchange: move |evt| {
                                let mut draft = form.write();
                                draft.documents_submitted.retain(|d| d.as_str() != *document);
                                if evt.checked() { draft.documents_submitted.push(document.to_string()); }
                            }
                        }
                        "{document}"
                    }
                }
            }
            textarea { placeholder: "Notes (optional)", rows: "2", value: "{current.notes}", oninput: move |evt| form.write().notes = evt.value() }
            label { class: "checkbox",
                input { r#type: "checkbox", checked: current.terms_accepted, onchange: move |evt| form.write().terms_accepted = evt.checked() }
                "I accept the terms and conditions"
            }
            button { onclick: submit, "Submit application" }
        }
    }
}

// ---------- Dashboards ----------
#[component]
fn DashboardPanel(role: Role) -> Element {
    let ctx = use_context::<AppCtx>();
    let data = use_dashboard();
    let Some(overview) = data.read().clone() else {
        return rsx! { section { class: "panel", p { class: "muted", "Loading dashboard..." } } };
    };
    let live_pending = *ctx.pending.read();

    match role {
        Role::Admin => {
            let pending = live_pending.map(|n| n.to_string()).unwrap_or_else(|| field(&overview, "pending_admissions"));
            let students = field(&overview, "total_students");
            let occupancy = field(&overview, "hostel_occupancy_percent");
            let (collected, due, overdue) = fee_totals(&overview);
            rsx! {
                section { class: "panel",
                    h2 { "Administration overview" }
                    div { class: "stat-row",
                        div { class: "stat-box", strong { "{students}" } span { "Students" } }
                        div { class: "stat-box", strong { "{pending}" } span { "Pending admissions" } }
                        div { class: "stat-box", strong { "{occupancy}%" } span { "Hostel occupancy" } }
                        div { class: "stat-box", strong { "{collected}" } span { "Fees collected" } }
                        div { class: "stat-box", strong { "{due}" } span { "Fees pending" } }
                        div { class: "stat-box", strong { "{overdue}" } span { "Fees overdue" } }
                    }
                }
            }
        }
        Role::Staff => {
            let summary = &overview["attendance_summary"];
            let (present, absent, late) = (field(summary, "present"), field(summary, "absent"), field(summary, "late"));
            rsx! {
                section { class: "panel",
                    h2 { "Today" }
                    ul { class: "list",
                        for session in dashboards::TODAYS_CLASSES.iter() {
                            li { key: "{session.subject}", class: "item",
                                strong { "{session.subject}" }
                                div { class: "meta", "{session.time} | Room {session.room} | {session.students} students" }
                            }
                        }
                    }
                    div { class: "stat-row",
                        div { class: "stat-box", strong { "{present}" } span { "Present" } }
                        div { class: "stat-box", strong { "{absent}" } span { "Absent" } }
                        div { class: "stat-box", strong { "{late}" } span { "Late" } }
                    }
                }
            }
        }
        Role::Student => {
            let (name, course, semester) = (field(&overview, "name"), field(&overview, "course"), field(&overview, "semester"));
            let (paid, due, overdue) = fee_totals(&overview);
            rsx! {
                section { class: "panel",
                    h2 { "Welcome, {name}" }
                    p { class: "muted", "{course} | Semester {semester}" }
                    div { class: "stat-row",
                        div { class: "stat-box", strong { "{paid}" } span { "Paid" } }
                        div { class: "stat-box", strong { "{due}" } span { "Due" } }
                        div { class: "stat-box", strong { "{overdue}" } span { "Overdue" } }
                    }
                    h4 { "Upcoming exams" }
                    ul { class: "list",
                        for exam in dashboards::EXAM_SCHEDULE.iter() {
                            li { key: "{exam.subject}", class: "item", strong { "{exam.subject}" } div { class: "meta", "{exam.date} {exam.time} | {exam.room}" } }
                        }
                    }
                }
            }
        }
    }
}

#[component]
fn HostelPanel(role: Role) -> Element {
    if role == Role::Student {
        let hostel = dashboards::STUDENT_HOSTEL;
        return rsx! {
            section { class: "panel",
                h2 { "My hostel" }
                div { class: "stat", span { "Room" } strong { "{hostel.room_number}" } }
                div { class: "stat", span { "Roommate" } strong { "{hostel.roommate}" } }
                div { class: "stat", span { "Warden" } strong { "{hostel.warden}" } }
                div { class: "stat", span { "Check-in" } strong { "{hostel.check_in}" } }
                div { class: "stat", span { "Monthly rent" } strong { "{hostel.monthly_rent}" } }
            }
        };
    }
    let occupancy = dashboards::occupancy_percent(dashboards::HOSTEL_ROOMS);
    rsx! {
        section { class: "panel",
            div { class: "panel__header", h2 { "Hostel rooms" } span { class: "muted", "{occupancy}% occupied" } }
            ul { class: "list",
                for room in dashboards::HOSTEL_ROOMS.iter() {
                    li { key: "{room.number}", class: "item",
                        strong { "Room {room.number}" }
                        div { class: "meta", "{room.occupancy}/{room.capacity} | {room.status()}" }
                    }
                }
            }
        }
    }
}

#[component]
fn ExamsPanel(role: Role) -> Element {
    match role {
        Role::Staff => rsx! {
            section { class: "panel",
                h2 { "Invigilation duties" }
                ul { class: "list",
                    for duty in dashboards::UPCOMING_INVIGILATION.iter() {
                        li { key: "{duty.subject}", class: "item", strong { "{duty.subject}" } div { class: "meta", "{duty.date} {duty.time} | {duty.duration}" } }
                    }
                }
            }
        },
        _ => rsx! {
            section { class: "panel",
                h2 { "Exam schedule" }
                ul { class: "list",
                    for exam in dashboards::EXAM_SCHEDULE.iter() {
                        li { key: "{exam.subject}", class: "item", strong { "{exam.subject}" } div { class: "meta", "{exam.date} {exam.time} | {exam.room}" } }
                    }
                }
                if role == Role::Student {
                    h3 { "Recent results" }
                    ul { class: "list",
                        for result in dashboards::RECENT_RESULTS.iter() {
                            li { key: "{result.subject}", class: "item", strong { "{result.subject}: {result.grade}" } div { class: "meta", "{result.marks}/{result.max_marks} | {result.date}" } }
                        }
                    }
                }
            }
        },
    }
}

#[component]
fn AttendancePanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut sheet = use_signal(AttendanceSheet::sample);
    let summary = sheet.read().summary();
    let entries = sheet.read().entries.clone();

    rsx! {
        section { class: "panel",
            div { class: "panel__header", h2 { "Attendance" } span { class: "muted", "Present {summary.present} | Absent {summary.absent} | Late {summary.late}" } }
            ul { class: "list",
                { entries.into_iter().map(|entry| {
                    let time = entry.time.clone().unwrap_or_default();
                    let buttons = [AttendanceStatus::Present, AttendanceStatus::Late, AttendanceStatus::Absent].map(|status| {
                        let roll_no = entry.roll_no.clone();
                        let ctx = ctx.clone();
                        rsx! {
                            button {
                                class: "ghost-btn",
                                onclick: move |_| {
                                    let now = chrono::Local::now().format("%I:%M %p").to_string();
                                    if let Err(err) = sheet.write().mark(&roll_no, status, Some(&now)) { ctx.notify(err.to_string()); }
                                },
                                "{status:?}"
                            }
                        }
                    });
                    rsx! {
                        li { key: "{entry.roll_no}", class: "item",
                            strong { "{entry.name} ({entry.roll_no})" }
                            div { class: "meta", "{entry.status:?} {time}" }
                            div { class: "actions", {buttons.into_iter()} }
                        }
                    }
                })}
            }
        }
    }
}

#[component]
fn ReportsPanel(role: Role) -> Element {
    rsx! {
        section { class: "panel",
            h2 { "Reports" }
            div { class: "grid two",
                for report in dashboards::reports(role).iter() {
                    div { key: "{report.title}", class: "card-ghost", strong { "{report.title}" } p { class: "muted", "{report.description}" } }
                }
            }
        }
    }
}

// ---------- Admissions ----------
#[component]
fn AdmissionsPanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut rows = use_signal(Vec::<AdmissionRow>::new);
    let mut reasons = use_signal(std::collections::HashMap::<String, String>::new);
    let mut reload = use_signal(|| 0u32);
    let pending = ctx.pending;

    let load_ctx = ctx.clone();
    use_effect(move || {
        let _ = reload.read();
        let _ = pending.read();
        let ctx = load_ctx.clone();
        let ticket = ctx.guard.begin();
        let (base, jwt) = ctx.creds();
        spawn(async move {
            match get_json::<Vec<AdmissionRow>>(&base, "/admissions", &jwt).await {
                Ok(list) => { if let Some(list) = ticket.accept(list) { rows.set(list); } }
                Err(err) => { if ticket.is_current() { rows.set(Vec::new()); ctx.notify(format!("Could not load admissions: {err}")); } }
            }
        });
    });

    let list = rows.read().clone();
    rsx! {
        section { class: "panel",
            div { class: "panel__header",
                h2 { "Admissions" }
                button { class: "ghost-btn", onclick: move |_| reload += 1, "Refresh" }
            }
            if list.is_empty() {
                p { class: "muted", "No applications." }
            }
            ul { class: "list",
                { list.into_iter().map(|row| {
                    let id = row.admission.id.clone();
                    let applied = row.admission.applied_at.format("%Y-%m-%d").to_string();
                    let qualification = or_dash(row.admission.previous_qualification.as_deref());
                    let documents = row.admission.documents_submitted.join(", ");
                    let reason = reasons.read().get(&id).cloned().unwrap_or_default();
                    let approve_ctx = ctx.clone();
                    let approve_id = id.clone();
                    let reject_ctx = ctx.clone();
                    let reject_id = id.clone();
                    let reason_id = id.clone();
                    rsx! {
                        li { key: "{id}", class: "item",
                            strong { "{row.admission.name}" }
                            div { class: "meta", "{row.admission.email} | {row.admission.course} | {row.status_label} | applied {applied}" }
                            div { class: "meta", "Qualification: {qualification} | Documents: {documents}" }
                            if row.can_reject {
                                input {
                                    placeholder: "Rejection reason (optional)",
                                    value: "{reason}",
                                    oninput: move |evt: FormEvent| { reasons.write().insert(reason_id.clone(), evt.value()); }
                                }
                            }
                            div { class: "actions",
                                if row.can_approve {
                                    button {
                                        onclick: move |_| {
                                            let ctx = approve_ctx.clone();
                                            let id = approve_id.clone();
                                            let (base, jwt) = ctx.creds();
                                            spawn(async move {
                                                match send_json::<ApprovalOutcome, _>(Method::POST, &base, &format!("/admissions/{id}/approve"), &jwt, &json!({})).await {
                                                    Ok(ApprovalOutcome::Provisioned { email, temp_password }) => ctx.notify(format!("Approved. Login {email} with temporary password {temp_password}")),
                                                    Ok(ApprovalOutcome::Migrated { student }) => ctx.notify(format!("Approved {}. The student can now register with {}", student.name, student.email)),
                                                    Err(err) => ctx.notify(format!("Approval failed: {err}")),
                                                }
                                                reload += 1;
                                            });
                                        },
                                        "Approve"
                                    }
                                }
                                if row.can_reject {
                                    button {
                                        class: "ghost-btn",
                                        onclick: move |_| {
                                            let ctx = reject_ctx.clone();
                                            let id = reject_id.clone();
                                            let reason = reasons.read().get(&id).cloned().filter(|r| !r.trim().is_empty());
                                            let (base, jwt) = ctx.creds();
                                            spawn(async move {
                                                match send_json::<(), _>(Method::POST, &base, &format!("/admissions/{id}/reject"), &jwt, &RejectPayload { reason }).await {
                                                    Ok(()) => ctx.notify("Application rejected"),
                                                    Err(err) => ctx.notify(format!("Rejection failed: {err}")),
                                                }
                                                reload += 1;
                                            });
                                        },
                                        "Reject"
                                    }
                                }
                            }
                        }
                    }
                })}
            }
        }
    }
}

// ---------- Student accounts ----------
#[component]
fn StudentsPanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut rows = use_signal(Vec::<ActiveStudent>::new);
    let mut search = use_signal(String::new);
    let mut draft = use_signal(StudentPayload::default);
    let mut reload = use_signal(|| 0u32);

    let load_ctx = ctx.clone();
    use_effect(move || {
        let _ = reload.read();
        let term = search.read().trim().to_string();
        let ctx = load_ctx.clone();
        let ticket = ctx.guard.begin();
        let (base, jwt) = ctx.creds();
        spawn(async move {
            let path = format!("/students?search={}", js_sys::encode_uri_component(&term));
            match get_json::<Vec<ActiveStudent>>(&base, &path, &jwt).await {
                Ok(list) => { if let Some(list) = ticket.accept(list) { rows.set(list); } }
                Err(err) => { if ticket.is_current() { rows.set(Vec::new()); ctx.notify(format!("Could not load students: {err}")); } }
            }
        });
    });

    let create_ctx = ctx.clone();
    let create = move |_| {
        let ctx = create_ctx.clone();
        let payload = draft.read().clone();
        if payload.name.trim().is_empty() || payload.course.trim().is_empty() || !admissions::is_valid_email(payload.email.trim()) {
            ctx.notify("Name, a valid email and a course are required");
            return;
        }
        let (base, jwt) = ctx.creds();
        spawn(async move {
            match send_json::<ActiveStudent, _>(Method::POST, &base, "/students", &jwt, &payload).await {
                Ok(student) => { ctx.notify(format!("Created {}", student.name)); draft.set(StudentPayload::default()); reload += 1; }
                Err(err) => ctx.notify(format!("Could not create student: {err}")),
            }
        });
    };

    let current = draft.read().clone();
    let list = rows.read().clone();
    rsx! {
        section { class: "panel",
            h2 { "Student accounts" }
            input { placeholder: "Search by name, email or course", value: "{search.read()}", oninput: move |evt| search.set(evt.value()) }
            ul { class: "list",
                { list.into_iter().map(|student| {
                    let ctx = ctx.clone();
                    let id = student.id.clone();
                    let name = student.name.clone();
                    let linked = if student.user_id.is_some() { "Login linked" } else { "Awaiting self-registration" };
                    rsx! {
                        li { key: "{student.id}", class: "item",
                            strong { "{student.name}" }
                            div { class: "meta", "{student.email} | {student.course} | Semester {student.semester} | {student.academic_year}" }
                            div { class: "meta", "{linked}" }
                            button {
                                class: "ghost-btn",
                                onclick: move |_| {
                                    if !confirm(&format!("Delete {name}? This cannot be undone.")) { return; }
                                    let ctx = ctx.clone();
                                    let id = id.clone();
                                    let (base, jwt) = ctx.creds();
                                    spawn(async move {
                                        match send_json::<(), _>(Method::DELETE, &base, &format!("/students/{id}"), &jwt, &DeletePayload { confirm: true }).await {
                                            Ok(()) => { ctx.notify("Student deleted"); reload += 1; }
                                            Err(err) => ctx.notify(format!("Delete failed: {err}")),
                                        }
                                    });
                                },
                                "Delete"
                            }
                        }
                    }
                })}
            }
        }
        section { class: "panel",
            h3 { "Add student" }
            div { class: "grid two",
                input { placeholder: "Name", value: "{current.name}", oninput: move |evt| draft.write().name = evt.value() }
                input { placeholder: "Email", value: "{current.email}", oninput: move |evt| draft.write().email = evt.value() }
                input { placeholder: "Phone", value: "{current.phone.clone().unwrap_or_default()}", oninput: move |evt| draft.write().phone = Some(evt.value()).filter(|v| !v.is_empty()) }
                select { value: "{current.course}", onchange: move |evt| draft.write().course = evt.value(),
                    option { value: "", "Course" }
                    for course in admissions::COURSES.iter() { option { key: "{course}", value: "{course}", "{course}" } }
                }
                input { placeholder: "Semester (default 1)", value: "{current.semester.clone().unwrap_or_default()}", oninput: move |evt| draft.write().semester = Some(evt.value()).filter(|v| !v.is_empty()) }
            }
            div { class: "actions", button { onclick: create, "Create" } }
        }
    }
}

// ---------- Fees ----------
fn payment_rows(rows: Vec<FeePayment>, ctx: AppCtx) -> Element {
    rsx! {
        ul { class: "list",
            { rows.into_iter().map(|payment| {
                let amounts = format!(
                    "Amount {} | Paid {} | Balance {} | {}",
                    money(payment.amount),
                    money(payment.paid_amount),
                    money(payment.balance_amount),
                    payment.payment_status.as_str()
                );
                let ctx = ctx.clone();
                let id = payment.id.clone();
                let receipt = payment.receipt_number.is_some().then(|| rsx! {
                    button {
                        class: "ghost-btn",
                        onclick: move |_| {
                            let ctx = ctx.clone();
                            let id = id.clone();
                            let (base, jwt) = ctx.creds();
                            spawn(async move {
                                match download_receipt(&base, &jwt, &id).await {
                                    Ok(file) => ctx.notify(format!("Downloaded {file}")),
                                    Err(err) => ctx.notify(format!("Receipt unavailable: {err}")),
                                }
                            });
                        },
                        "Receipt"
                    }
                });
                rsx! {
                    li { key: "{payment.id}", class: "item",
                        strong { "{payment.student_name} | {payment.fee_type}" }
                        div { class: "meta", "{payment.course} | Semester {payment.semester} | Due {payment.due_date}" }
                        div { class: "meta", "{amounts}" }
                        {receipt}
                    }
                }
            })}
        }
    }
}

#[component]
fn FeesPanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut ledger = use_signal(FeeLedger::default);
    let mut search = use_signal(String::new);
    let mut status = use_signal(|| "all".to_string());
    let mut course = use_signal(|| "all".to_string());
    let mut semester = use_signal(|| "all".to_string());

    let load_ctx = ctx.clone();
    use_effect(move || {
        let query = format!(
            "/fees?search={}&status={}&course={}&semester={}",
            js_sys::encode_uri_component(search.read().trim()),
            js_sys::encode_uri_component(&status.read()),
            js_sys::encode_uri_component(&course.read()),
            js_sys::encode_uri_component(&semester.read()),
        );
        let ctx = load_ctx.clone();
        let ticket = ctx.guard.begin();
        let (base, jwt) = ctx.creds();
        spawn(async move {
            match get_json::<FeeLedger>(&base, &query, &jwt).await {
                Ok(data) => { if let Some(data) = ticket.accept(data) { ledger.set(data); } }
                Err(err) => { if ticket.is_current() { ctx.notify(format!("Could not load fees: {err}")); } }
            }
        });
    });

    let data = ledger.read().clone();
    rsx! {
        section { class: "panel",
            h2 { "Fee management" }
            div { class: "stat-row",
                div { class: "stat-box", strong { "{money(data.totals.collected)}" } span { "Collected" } }
                div { class: "stat-box", strong { "{money(data.totals.pending)}" } span { "Pending" } }
                div { class: "stat-box", strong { "{money(data.totals.overdue)}" } span { "Overdue" } }
            }
            div { class: "grid two",
                input { placeholder: "Search name, email, roll or receipt", value: "{search.read()}", oninput: move |evt| search.set(evt.value()) }
                select { value: "{status.read()}", onchange: move |evt| status.set(evt.value()),
                    for value in ["all", "paid", "pending", "partial", "overdue", "cancelled"] { option { key: "{value}", value: "{value}", "{value}" } }
                }
                select { value: "{course.read()}", onchange: move |evt| course.set(evt.value()),
                    option { value: "all", "All courses" }
                    for value in data.options.courses.iter() { option { key: "{value}", value: "{value}", "{value}" } }
                }
                select { value: "{semester.read()}", onchange: move |evt| semester.set(evt.value()),
                    option { value: "all", "All semesters" }
                    for value in data.options.semesters.iter() { option { key: "{value}", value: "{value}", "Semester {value}" } }
                }
            }
            {payment_rows(data.rows, ctx.clone())}
        }
    }
}

#[component]
fn MyFeesPanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let data = use_dashboard();
    let Some(overview) = data.read().clone() else {
        return rsx! { section { class: "panel", p { class: "muted", "Loading fees..." } } };
    };
    let payments: Vec<FeePayment> = serde_json::from_value(overview["payments"].clone()).unwrap_or_default();
    let (paid, due, overdue) = fee_totals(&overview);
    rsx! {
        section { class: "panel",
            h2 { "My fees" }
            div { class: "stat-row",
                div { class: "stat-box", strong { "{paid}" } span { "Paid" } }
                div { class: "stat-box", strong { "{due}" } span { "Due" } }
                div { class: "stat-box", strong { "{overdue}" } span { "Overdue" } }
            }
            {payment_rows(payments, ctx.clone())}
        }
    }
}

// ---------- Profile & settings ----------
#[component]
fn ProfilePanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut view = use_signal(|| None::<ProfileView>);
    use_hook(move || {
        let ticket = ctx.guard.begin();
        let (base, jwt) = ctx.creds();
        spawn(async move {
            match get_json::<ProfileView>(&base, "/profile", &jwt).await {
                Ok(profile) => { if let Some(profile) = ticket.accept(profile) { view.set(Some(profile)); } }
                Err(err) => { if ticket.is_current() { ctx.notify(format!("Could not load profile: {err}")); } }
            }
        });
    });

    let Some(profile) = view.read().clone() else {
        return rsx! { section { class: "panel", p { class: "muted", "Loading profile..." } } };
    };
    let affiliation = profile.affiliation.clone().map(|field| rsx! {
        div { class: "stat", span { "{field.label}" } strong { "{field.value}" } }
    });
    let academic = profile.student.clone().map(|student| {
        let date_of_birth = or_dash(student.date_of_birth.as_deref());
        let address = or_dash(student.address.as_deref());
        let qualification = or_dash(student.previous_qualification.as_deref());
        let documents = student.documents_submitted.join(", ");
        let notes = or_dash(student.notes.as_deref());
        rsx! {
            h3 { "Academic details" }
            div { class: "stat", span { "Student ID" } strong { "{student.student_id}" } }
            div { class: "stat", span { "Course" } strong { "{student.course}" } }
            div { class: "stat", span { "Academic year" } strong { "{student.academic_year} | Semester {student.semester}" } }
            div { class: "stat", span { "Date of birth" } strong { "{date_of_birth}" } }
            div { class: "stat", span { "Address" } strong { "{address}" } }
            div { class: "stat", span { "Previous qualification" } strong { "{qualification}" } }
            div { class: "stat", span { "Documents" } strong { "{documents}" } }
            div { class: "stat", span { "Notes" } strong { "{notes}" } }
        }
    });
    rsx! {
        section { class: "panel",
            div { class: "panel__header", h2 { "{profile.name}" } span { class: "pill", "{profile.role_label}" } }
            div { class: "stat", span { "Email" } strong { "{profile.email}" } }
            div { class: "stat", span { "Phone" } strong { "{profile.phone}" } }
            {affiliation}
            div { class: "stat", span { "Member since" } strong { "{profile.member_since}" } }
            div { class: "stat", span { "Last updated" } strong { "{profile.last_updated}" } }
            {academic}
        }
    }
}

#[component]
fn SettingsPanel() -> Element {
    let ctx = use_context::<AppCtx>();
    let mut api_base = ctx.api_base;
    rsx! {
        section { class: "panel",
            h2 { "Settings" }
            label { "API base" }
            input { value: "{api_base.read()}", oninput: move |evt| api_base.set(evt.value()) }
            div { class: "actions",
                button { onclick: move |_| { store(API_BASE_KEY, &api_base.read()); ctx.notify("API base saved"); }, "Save" }
                button { class: "ghost-btn", onclick: move |_| { api_base.set(DEFAULT_API_BASE.to_string()); store(API_BASE_KEY, ""); }, "Reset" }
            }
        }
    }
}

// ---------- Styles ----------
const STYLE: &str = r#"
:root { --bg: #0f1420; --panel: #151c2b; --muted: #9aa7bf; --text: #e9eef7; --accent: #2fb37f; --accent2: #3d8bfd; --border: rgba(255,255,255,0.08); --radius: 14px; }
* { box-sizing: border-box; }
body { margin: 0; background: radial-gradient(circle at 18% 20%, rgba(47,179,127,0.08), transparent 26%), radial-gradient(circle at 82% 12%, rgba(61,139,253,0.12), transparent 24%), var(--bg); color: var(--text); font-family: "Inter", system-ui, -apple-system, sans-serif; }
.app-shell { max-width: 1200px; margin: 0 auto; padding: 18px 18px 36px; display: flex; flex-direction: column; gap: 14px; }
.top-nav { position: sticky; top: 0; z-index: 10; display: flex; align-items: center; justify-content: space-between; padding: 10px 14px; border: 1px solid var(--border); background: rgba(15,20,32,0.9); backdrop-filter: blur(8px); border-radius: 14px; }
.brand { display: flex; align-items: center; gap: 10px; font-weight: 800; letter-spacing: 0.4px; text-transform: uppercase; }
.brand__dot { width: 10px; height: 10px; border-radius: 50%; background: var(--accent); }
.brand__tag { padding: 2px 8px; border-radius: 999px; background: rgba(61,139,253,0.15); color: #9dc3ff; font-size: 12px; }
.nav-links { display: flex; gap: 8px; align-items: center; }
.nav-link { display: flex; justify-content: space-between; align-items: center; width: 100%; padding: 8px 12px; border-radius: 10px; border: 1px solid var(--border); background: rgba(255,255,255,0.03); color: var(--text); font-weight: 600; cursor: pointer; }
.nav-link.active { background: linear-gradient(120deg, var(--accent), var(--accent2)); color: #0b0e15; }
.status-bar { border: 1px dashed var(--border); border-radius: 12px; padding: 10px 12px; color: var(--muted); }
.layout { display: grid; grid-template-columns: 220px 1fr; gap: 14px; }
.sidebar { display: flex; flex-direction: column; gap: 6px; }
.content { display: flex; flex-direction: column; gap: 14px; }
.badge { padding: 1px 8px; border-radius: 999px; background: #e5484d; color: #fff; font-size: 12px; }
.badge--muted { background: rgba(255,255,255,0.15); }
.hero { display: grid; grid-template-columns: 1.2fr 1fr; gap: 18px; padding: 20px; border-radius: 16px; border: 1px solid var(--border); background: var(--panel); }
.hero__copy h1 { margin: 6px 0 8px; font-size: 28px; }
.hero__copy p { margin: 0 0 12px; color: var(--muted); }
.hero__actions { display: flex; gap: 10px; flex-wrap: wrap; }
.hero__panel { background: rgba(255,255,255,0.04); border: 1px solid var(--border); border-radius: 12px; padding: 14px; display: flex; flex-direction: column; gap: 10px; }
.stat { display: flex; justify-content: space-between; gap: 12px; color: var(--muted); padding: 4px 0; }
.stat strong { color: var(--text); }
.stat-row { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 8px; margin: 8px 0; }
.stat-box { background: rgba(0,0,0,0.25); border: 1px solid var(--border); border-radius: 10px; padding: 10px; text-align: center; }
.stat-box strong { font-size: 20px; display: block; color: #8fe3bf; }
.pill { display: inline-block; padding: 4px 10px; border-radius: 999px; background: rgba(47,179,127,0.15); color: #8fe3bf; font-weight: 700; text-transform: uppercase; font-size: 12px; }
.ghost-btn { padding: 9px 12px; border-radius: 10px; border: 1px solid var(--border); background: transparent; color: var(--text); cursor: pointer; }
.panel { background: var(--panel); border: 1px solid var(--border); border-radius: var(--radius); padding: 16px; }
.panel h2, .panel h3, .panel h4 { margin: 0 0 10px; }
.panel__header { display: flex; align-items: baseline; justify-content: space-between; gap: 10px; }
.muted { color: var(--muted); font-size: 13px; }
.grid { display: grid; gap: 12px; }
.grid.two { grid-template-columns: repeat(auto-fit, minmax(260px, 1fr)); }
label { display: block; margin-top: 6px; font-weight: 700; }
input, textarea, select { width: 100%; margin-top: 6px; padding: 10px 12px; border-radius: 10px; border: 1px solid var(--border); background: rgba(255,255,255,0.04); color: var(--text); }
.actions { display: flex; gap: 10px; flex-wrap: wrap; margin-top: 12px; }
button { padding: 10px 14px; border: none; border-radius: 10px; background: linear-gradient(120deg, var(--accent), var(--accent2)); color: #0b0e13; font-weight: 800; cursor: pointer; }
.card-ghost { background: rgba(255,255,255,0.02); border: 1px dashed var(--border); border-radius: 12px; padding: 12px; }
.checks { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); }
.checkbox { display: flex; align-items: center; gap: 8px; font-weight: 500; }
.checkbox input { width: auto; margin: 0; }
.stack { display: flex; flex-direction: column; gap: 8px; }
.list { list-style: none; padding: 0; margin: 12px 0 0 0; display: flex; flex-direction: column; gap: 10px; }
.item { background: rgba(255,255,255,0.03); border: 1px solid var(--border); padding: 10px 12px; border-radius: 12px; }
.meta { color: var(--muted); font-size: 13px; margin-top: 4px; }
@media (max-width: 900px) { .hero, .layout { grid-template-columns: 1fr; } }
"#;
