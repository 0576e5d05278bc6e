use chrono::{Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::errors::{ErpError, Notice, PartialFailure, ServiceResult, ensure};
use crate::logging::audit;
use crate::models::{
    ActiveStudent, AdmissionStatus, DEFAULT_SEMESTER, NewActiveStudent, NewPendingAdmission,
    PendingAdmission, RejectedAdmission, academic_year_for,
};
use crate::services::{DataGateway, Filter, Query, Table, insert_one, select_as};

/// Server-side procedure that provisions the login and moves the record atomically.
pub const APPROVE_PROCEDURE: &str = "approve_admission";

pub const COURSES: &[&str] = &[
    "Computer Science",
    "Electronics Engineering",
    "Mechanical Engineering",
    "Civil Engineering",
    "Electrical Engineering",
    "Information Technology",
    "Data Science",
    "Software Engineering",
    "Cybersecurity",
    "Artificial Intelligence",
    "Business Administration",
    "Economics",
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "Psychology",
    "English Literature",
    "History",
    "Political Science",
];

pub const QUALIFICATIONS: &[&str] = &[
    "High School Diploma",
    "Associate Degree",
    "Bachelor's Degree",
    "Master's Degree",
    "GED (General Educational Development)",
    "International Baccalaureate (IB)",
    "A-Levels",
    "O-Levels",
    "Other",
];

pub const DOCUMENT_OPTIONS: &[&str] = &[
    "High School Transcript",
    "Birth Certificate",
    "Identity Document",
    "Passport Copy",
    "Medical Certificate",
    "Character Certificate",
    "Previous Academic Records",
    "Recommendation Letter",
    "Statement of Purpose",
    "Portfolio (if applicable)",
];

pub const MIN_APPLICANT_AGE: i32 = 16;
pub const MAX_APPLICANT_AGE: i32 = 100;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// How a rejection is recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionMode {
    /// Copy into `rejected_admissions`, then delete the pending row.
    #[default]
    Archive,
    /// Set `status = rejected` on the pending row.
    MarkInPlace,
}

impl FromStr for RejectionMode {
    type Err = ErpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "archive" => Ok(RejectionMode::Archive),
            "mark" | "mark_in_place" => Ok(RejectionMode::MarkInPlace),
            other => Err(ErpError::Validation(format!(
                "unknown rejection mode `{other}` (expected archive or mark)"
            ))),
        }
    }
}

fn queue_filter() -> Filter {
    Filter::new().is_in(
        "status",
        [
            AdmissionStatus::Pending.as_str(),
            AdmissionStatus::UnderReview.as_str(),
            AdmissionStatus::Rejected.as_str(),
        ],
    )
}

fn actionable_filter() -> Filter {
    Filter::new().is_in(
        "status",
        [
            AdmissionStatus::Pending.as_str(),
            AdmissionStatus::UnderReview.as_str(),
        ],
    )
}

/// Applications awaiting or past review, newest first.
pub async fn list_admissions<G>(gateway: &G) -> ServiceResult<Vec<PendingAdmission>>
where
    G: DataGateway + ?Sized,
{
    let query = Query::new()
        .filter(queue_filter())
        .order_by("applied_at", true);
    select_as(gateway, Table::PendingAdmissions, &query).await
}

/// Like [`list_admissions`], but a read failure yields an empty list and a notice.
pub async fn load_admissions_or_empty<G>(gateway: &G) -> (Vec<PendingAdmission>, Option<Notice>)
where
    G: DataGateway + ?Sized,
{
    match list_admissions(gateway).await {
        Ok(rows) => (rows, None),
        Err(err) => {
            warn!(error = %err, "failed to load admissions");
            (Vec::new(), Some(err.notice("Could not load admissions")))
        }
    }
}

pub async fn pending_count<G>(gateway: &G) -> ServiceResult<usize>
where
    G: DataGateway + ?Sized,
{
    let query = Query::new().filter(actionable_filter());
    Ok(gateway.select(Table::PendingAdmissions, &query).await?.len())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Migrated {
    pub student: ActiveStudent,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// Login created by the approval procedure.
    Provisioned { email: String, temp_password: String },
    /// Record moved without a login; the student self-registers later.
    Migrated { student: ActiveStudent },
}

#[derive(Debug, Deserialize)]
struct ProcedureReply {
    success: bool,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    temp_password: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn student_from(admission: &PendingAdmission, today: NaiveDate) -> NewActiveStudent {
    NewActiveStudent {
        name: admission.name.clone(),
        email: admission.email.clone(),
        phone: admission.phone.clone(),
        course: admission.course.clone(),
        semester: DEFAULT_SEMESTER.to_string(),
        academic_year: academic_year_for(today),
        date_of_birth: admission.date_of_birth,
        address: admission.address.clone(),
        previous_qualification: admission.previous_qualification.clone(),
        documents_submitted: Some(admission.documents_submitted.clone()),
        notes: admission.notes.clone(),
        approved_at: Utc::now(),
    }
}

/// Two-step move of an admission into `active_students`.
///
/// Inserts the student (without `user_id`), then deletes the pending row.
/// The error reports which of the two steps took effect.
pub async fn migrate<G>(gateway: &G, admission: &PendingAdmission) -> Result<Migrated, PartialFailure>
where
    G: DataGateway + ?Sized,
{
    let payload = student_from(admission, Utc::now().date_naive());
    let student: ActiveStudent = match insert_one(gateway, Table::ActiveStudents, &payload).await {
        Ok(student) => student,
        Err(err) => {
            return Err(PartialFailure {
                operation: "approve".into(),
                inserted: false,
                deleted: false,
                cause: err.to_string(),
            });
        }
    };
    let by_id = Filter::new().eq("id", admission.id.as_str());
    if let Err(err) = gateway.delete(Table::PendingAdmissions, &by_id).await {
        error!(admission = %admission.id, student = %student.id, error = %err,
            "student inserted but pending admission not removed");
        return Err(PartialFailure {
            operation: "approve".into(),
            inserted: true,
            deleted: false,
            cause: err.to_string(),
        });
    }
    Ok(Migrated { student })
}

async fn email_taken<G>(gateway: &G, email: &str) -> ServiceResult<bool>
where
    G: DataGateway + ?Sized,
{
    let query = Query::new()
        .filter(Filter::new().eq_ignore_case("email", email))
        .limit(1);
    Ok(!gateway.select(Table::ActiveStudents, &query).await?.is_empty())
}

/// Approves an application.
///
/// Prefers the transactional procedure; when the backend does not offer it,
/// falls back to [`migrate`] and reports partial failure explicitly.
pub async fn approve<G>(
    gateway: &G,
    admission: &PendingAdmission,
    temp_password: &str,
    reviewer: &str,
) -> ServiceResult<ApprovalOutcome>
where
    G: DataGateway + ?Sized,
{
    ensure(
        admission.status.is_actionable(),
        ErpError::Validation("rejected applications cannot be approved".into()),
    )?;

    let args = json!({
        "admission_id": admission.id,
        "temp_password": temp_password,
        "reviewed_by": reviewer,
    });
    match gateway.call(APPROVE_PROCEDURE, args).await {
        Ok(value) => {
            let reply: ProcedureReply = serde_json::from_value(value)?;
            if !reply.success {
                let reason = reply.error.unwrap_or_else(|| "approval was not applied".into());
                return Err(ErpError::Validation(reason));
            }
            let email = reply.email.unwrap_or_else(|| admission.email.clone());
            audit("admission.approve", reviewer, &json!({"admission": admission.id, "email": email}));
            info!(admission = %admission.id, "admission approved with login");
            Ok(ApprovalOutcome::Provisioned {
                email,
                temp_password: reply
                    .temp_password
                    .unwrap_or_else(|| temp_password.to_string()),
            })
        }
        Err(ErpError::Unavailable(reason)) => {
            warn!(%reason, "approval procedure unavailable, migrating without login");
            if email_taken(gateway, &admission.email).await? {
                return Err(ErpError::DuplicateEmail(admission.email.clone()));
            }
            match migrate(gateway, admission).await {
                Ok(Migrated { student }) => {
                    audit(
                        "admission.approve",
                        reviewer,
                        &json!({"admission": admission.id, "student": student.id}),
                    );
                    Ok(ApprovalOutcome::Migrated { student })
                }
                Err(failure) if failure.is_partial() => Err(ErpError::PartialFailure(failure)),
                Err(failure) => Err(ErpError::Backend(failure.cause)),
            }
        }
        Err(err) => Err(err),
    }
}

fn rejection_notes(existing: Option<&str>, reason: Option<&str>) -> Option<String> {
    let existing = existing.map(str::trim).filter(|s| !s.is_empty());
    let reason = reason.map(str::trim).filter(|s| !s.is_empty());
    match (existing, reason) {
        (Some(notes), Some(reason)) => Some(format!("{notes}\n\nRejection reason: {reason}")),
        (None, Some(reason)) => Some(format!("Rejection reason: {reason}")),
        (Some(notes), None) => Some(notes.to_string()),
        (None, None) => None,
    }
}

/// Rejects an application, removing it from the actionable queue.
pub async fn reject<G>(
    gateway: &G,
    admission: &PendingAdmission,
    reason: Option<&str>,
    reviewer: &str,
    mode: RejectionMode,
) -> ServiceResult<()>
where
    G: DataGateway + ?Sized,
{
    ensure(
        admission.status.is_actionable(),
        ErpError::Validation("application is already rejected".into()),
    )?;
    let by_id = Filter::new().eq("id", admission.id.as_str());
    let notes = rejection_notes(admission.notes.as_deref(), reason);

    match mode {
        RejectionMode::Archive => {
            let record = RejectedAdmission {
                id: None,
                name: admission.name.clone(),
                email: admission.email.clone(),
                phone: admission.phone.clone(),
                course: admission.course.clone(),
                date_of_birth: admission.date_of_birth,
                address: admission.address.clone(),
                previous_qualification: admission.previous_qualification.clone(),
                documents_submitted: admission.documents_submitted.clone(),
                notes,
                applied_at: admission.applied_at,
                rejected_at: Utc::now(),
                rejected_by: reviewer.to_string(),
            };
            let _: RejectedAdmission =
                insert_one(gateway, Table::RejectedAdmissions, &record).await?;
            if let Err(err) = gateway.delete(Table::PendingAdmissions, &by_id).await {
                error!(admission = %admission.id, error = %err,
                    "rejection archived but pending admission not removed");
                return Err(ErpError::PartialFailure(PartialFailure {
                    operation: "reject".into(),
                    inserted: true,
                    deleted: false,
                    cause: err.to_string(),
                }));
            }
        }
        RejectionMode::MarkInPlace => {
            let patch = json!({
                "status": AdmissionStatus::Rejected.as_str(),
                "notes": notes,
                "reviewed_by": reviewer,
                "reviewed_at": Utc::now(),
            });
            let affected = gateway
                .update(Table::PendingAdmissions, patch, &by_id)
                .await?;
            ensure(affected > 0, ErpError::NotFound(format!("admission {}", admission.id)))?;
        }
    }
    audit(
        "admission.reject",
        reviewer,
        &json!({"admission": admission.id, "mode": mode, "reason": reason}),
    );
    Ok(())
}

/// Detail presentation of an application with the actions its status allows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdmissionView {
    pub admission: PendingAdmission,
    pub status_label: &'static str,
    pub can_approve: bool,
    pub can_reject: bool,
}

pub fn view(admission: &PendingAdmission) -> AdmissionView {
    let actionable = admission.status.is_actionable();
    AdmissionView {
        admission: admission.clone(),
        status_label: match admission.status {
            AdmissionStatus::Pending => "Pending",
            AdmissionStatus::UnderReview => "Under Review",
            AdmissionStatus::Rejected => "Rejected",
        },
        can_approve: actionable,
        can_reject: actionable,
    }
}

pub async fn find_admission<G>(gateway: &G, id: &str) -> ServiceResult<PendingAdmission>
where
    G: DataGateway + ?Sized,
{
    crate::services::first_as(gateway, Table::PendingAdmissions, Filter::new().eq("id", id))
        .await?
        .ok_or_else(|| ErpError::NotFound(format!("admission {id}")))
}

/// Public admission form as submitted by an applicant.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub course: String,
    pub previous_qualification: String,
    #[serde(default)]
    pub documents_submitted: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub terms_accepted: bool,
}

fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

fn required(value: &str, message: &str) -> ServiceResult<()> {
    ensure(!value.trim().is_empty(), ErpError::Validation(message.into()))
}

/// Checks the form field by field, in display order, and builds the insert payload.
pub fn validate_application(form: &ApplicationForm, today: NaiveDate) -> ServiceResult<NewPendingAdmission> {
    required(&form.name, "Please enter your full name")?;
    required(&form.email, "Please enter your email address")?;
    ensure(
        is_valid_email(form.email.trim()),
        ErpError::Validation("Please enter a valid email address".into()),
    )?;
    required(&form.phone, "Please enter your phone number")?;
    let date_of_birth = form
        .date_of_birth
        .ok_or_else(|| ErpError::Validation("Please enter your date of birth".into()))?;
    ensure(
        date_of_birth <= today,
        ErpError::Validation("Date of birth cannot be in the future".into()),
    )?;
    let age = age_on(date_of_birth, today);
    ensure(
        (MIN_APPLICANT_AGE..=MAX_APPLICANT_AGE).contains(&age),
        ErpError::Validation(format!(
            "Age must be between {MIN_APPLICANT_AGE} and {MAX_APPLICANT_AGE} years"
        )),
    )?;
    required(&form.address, "Please enter your address")?;
    required(&form.course, "Please select a course")?;
    required(&form.previous_qualification, "Please select your previous qualification")?;
    ensure(
        form.terms_accepted,
        ErpError::Validation("Please accept the terms and conditions".into()),
    )?;

    Ok(NewPendingAdmission {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        course: form.course.clone(),
        status: AdmissionStatus::Pending,
        date_of_birth,
        address: form.address.trim().to_string(),
        previous_qualification: form.previous_qualification.clone(),
        documents_submitted: form.documents_submitted.clone(),
        notes: form.notes.trim().to_string(),
    })
}

/// Validates and stores a public application with status `pending`.
pub async fn submit_application<G>(
    gateway: &G,
    form: &ApplicationForm,
    today: NaiveDate,
) -> ServiceResult<PendingAdmission>
where
    G: DataGateway + ?Sized,
{
    let payload = validate_application(form, today)?;
    let admission: PendingAdmission =
        insert_one(gateway, Table::PendingAdmissions, &payload).await?;
    info!(admission = %admission.id, course = %admission.course, "application submitted");
    Ok(admission)
}
