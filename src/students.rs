use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::admissions::is_valid_email;
use crate::errors::{ErpError, PartialFailure, ServiceResult, ensure};
use crate::logging::audit;
use crate::models::{ActiveStudent, DEFAULT_SEMESTER, NewActiveStudent, academic_year_for};
use crate::services::{
    AuthGateway, DataGateway, Filter, Identity, Query, Table, insert_one, select_as,
};

/// Account created by an administrator; no login is attached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub course: String,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewStudent {
    fn validate(&self) -> ServiceResult<()> {
        ensure(
            !self.name.trim().is_empty(),
            ErpError::Validation("name is required".into()),
        )?;
        ensure(
            !self.email.trim().is_empty(),
            ErpError::Validation("email is required".into()),
        )?;
        ensure(
            !self.course.trim().is_empty(),
            ErpError::Validation("course is required".into()),
        )
    }

    fn into_record(self, today: NaiveDate) -> NewActiveStudent {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        NewActiveStudent {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: non_empty(self.phone),
            course: self.course.trim().to_string(),
            semester: non_empty(self.semester).unwrap_or_else(|| DEFAULT_SEMESTER.to_string()),
            academic_year: non_empty(self.academic_year)
                .unwrap_or_else(|| academic_year_for(today)),
            date_of_birth: self.date_of_birth,
            address: non_empty(self.address),
            previous_qualification: None,
            documents_submitted: None,
            notes: non_empty(self.notes),
            approved_at: Utc::now(),
        }
    }
}

async fn find_by_email<G>(gateway: &G, email: &str) -> ServiceResult<Option<ActiveStudent>>
where
    G: DataGateway + ?Sized,
{
    crate::services::first_as(gateway, Table::ActiveStudents, Filter::new().eq_ignore_case("email", email))
        .await
}

/// Creates a student record after validating and checking for a duplicate email.
pub async fn create<G>(gateway: &G, student: NewStudent, actor: &str) -> ServiceResult<ActiveStudent>
where
    G: DataGateway + ?Sized,
{
    student.validate()?;
    let email = student.email.trim().to_string();
    if find_by_email(gateway, &email).await?.is_some() {
        return Err(ErpError::DuplicateEmail(email));
    }
    let record = student.into_record(Utc::now().date_naive());
    let created: ActiveStudent = insert_one(gateway, Table::ActiveStudents, &record).await?;
    audit("student.create", actor, &json!({"student": created.id, "email": created.email}));
    Ok(created)
}

pub async fn list<G>(gateway: &G) -> ServiceResult<Vec<ActiveStudent>>
where
    G: DataGateway + ?Sized,
{
    let query = Query::new().order_by("approved_at", true);
    select_as(gateway, Table::ActiveStudents, &query).await
}

/// Case-insensitive substring match on name, email or course.
pub fn search(rows: &[ActiveStudent], term: &str) -> Vec<ActiveStudent> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&term)
                || s.email.to_lowercase().contains(&term)
                || s.course.to_lowercase().contains(&term)
        })
        .cloned()
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Declined
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
}

/// Deletes a student record. Fee payments referencing it are left as they are.
pub async fn delete<G>(
    gateway: &G,
    id: &str,
    confirmation: Confirmation,
    actor: &str,
) -> ServiceResult<DeleteOutcome>
where
    G: DataGateway + ?Sized,
{
    if confirmation == Confirmation::Declined {
        return Ok(DeleteOutcome::Cancelled);
    }
    gateway
        .delete(Table::ActiveStudents, &Filter::new().eq("id", id))
        .await?;
    audit("student.delete", actor, &json!({"student": id}));
    Ok(DeleteOutcome::Deleted)
}

/// Self-registration: creates a login and links it to the student record
/// that carries the same email.
///
/// A login left unlinked by an earlier attempt is reused once the password
/// matches, so a failed link can be retried.
pub async fn link_self_registration<B>(
    backend: &B,
    email: &str,
    password: &str,
) -> ServiceResult<Identity>
where
    B: DataGateway + AuthGateway + ?Sized,
{
    let email = email.trim();
    ensure(
        is_valid_email(email),
        ErpError::Validation("Please enter a valid email address".into()),
    )?;
    let student = find_by_email(backend, email).await?.ok_or_else(|| {
        ErpError::Validation(format!("no student record found for {email}; contact the admissions office"))
    })?;
    ensure(
        student.user_id.is_none(),
        ErpError::Validation(format!("{email} is already registered")),
    )?;

    let identity = match backend.sign_up(email, password).await {
        Ok(identity) => identity,
        Err(ErpError::Validation(reason)) => existing_login(backend, email, password)
            .await
            .ok_or(ErpError::Validation(reason))?,
        Err(err) => return Err(err),
    };
    if let Err(err) = backend
        .update(
            Table::ActiveStudents,
            json!({"user_id": identity.id}),
            &Filter::new().eq("id", student.id.as_str()),
        )
        .await
    {
        error!(student = %student.id, user = %identity.id, error = %err,
            "login created but student record not linked");
        return Err(ErpError::PartialFailure(PartialFailure {
            operation: "register".into(),
            inserted: true,
            deleted: false,
            cause: err.to_string(),
        }));
    }
    info!(student = %student.id, user = %identity.id, "student account linked");
    Ok(identity)
}

/// Identity of an already created login, proven by signing in with `password`.
async fn existing_login<B>(backend: &B, email: &str, password: &str) -> Option<Identity>
where
    B: AuthGateway + ?Sized,
{
    let session = backend.sign_in(email, password).await.ok()?;
    if let Err(err) = backend.sign_out(&session.access_token).await {
        error!(error = %err, "failed to end verification session");
    }
    Some(session.identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, email: &str, course: &str) -> ActiveStudent {
        ActiveStudent {
            id: format!("s-{name}"),
            name: name.into(),
            email: email.into(),
            phone: None,
            course: course.into(),
            semester: "1".into(),
            academic_year: "2024-2025".into(),
            date_of_birth: None,
            address: None,
            previous_qualification: None,
            documents_submitted: None,
            notes: None,
            approved_at: Utc::now(),
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn search_covers_name_email_and_course() {
        let rows = vec![
            student("Ines", "ines@college.edu", "Physics"),
            student("Omar", "omar@college.edu", "Data Science"),
        ];
        assert_eq!(search(&rows, "PHYS").len(), 1);
        assert_eq!(search(&rows, "omar@").len(), 1);
        assert_eq!(search(&rows, "college").len(), 2);
        assert_eq!(search(&rows, "").len(), 2);
    }

    #[test]
    fn blank_fields_fail_before_any_call() {
        let missing_course = NewStudent {
            name: "Ines".into(),
            email: "ines@college.edu".into(),
            ..NewStudent::default()
        };
        assert!(matches!(missing_course.validate(), Err(ErpError::Validation(_))));
    }

    #[test]
    fn defaults_fill_semester_and_year() {
        let record = NewStudent {
            name: " Ines ".into(),
            email: "ines@college.edu".into(),
            course: "Physics".into(),
            semester: Some("  ".into()),
            ..NewStudent::default()
        }
        .into_record(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(record.name, "Ines");
        assert_eq!(record.semester, DEFAULT_SEMESTER);
        assert_eq!(record.academic_year, "2025-2026");
    }

    #[cfg(feature = "server")]
    mod backend {
        use super::*;
        use crate::roles::sign_in;
        use crate::models::Role;
        use crate::services::InMemoryBackend;
        use crate::services::memory::Operation;

        fn new_student(email: &str) -> NewStudent {
            NewStudent {
                name: "Lena Ortiz".into(),
                email: email.into(),
                course: "Mathematics".into(),
                ..NewStudent::default()
            }
        }

        #[tokio::test]
        async fn duplicate_email_leaves_count_unchanged() {
            let backend = InMemoryBackend::new_with_sample().unwrap();
            create(&backend, new_student("lena@eduflow.edu"), "admin").await.unwrap();
            let before = list(&backend).await.unwrap().len();
            let err = create(&backend, new_student("lena@eduflow.edu"), "admin")
                .await
                .unwrap_err();
            assert!(matches!(err, ErpError::DuplicateEmail(_)));
            assert_eq!(list(&backend).await.unwrap().len(), before);
        }

        #[tokio::test]
        async fn duplicate_email_check_ignores_case() {
            let backend = InMemoryBackend::new_with_sample().unwrap();
            let before = list(&backend).await.unwrap().len();
            let err = create(&backend, new_student("Maya.Patel@EduFlow.edu"), "admin")
                .await
                .unwrap_err();
            assert!(matches!(err, ErpError::DuplicateEmail(_)));
            assert_eq!(list(&backend).await.unwrap().len(), before);
        }

        #[tokio::test]
        async fn declined_delete_keeps_the_record() {
            let backend = InMemoryBackend::new_with_sample().unwrap();
            let created = create(&backend, new_student("lena@eduflow.edu"), "admin").await.unwrap();
            let before = list(&backend).await.unwrap().len();
            let outcome = delete(&backend, &created.id, Confirmation::Declined, "admin")
                .await
                .unwrap();
            assert_eq!(outcome, DeleteOutcome::Cancelled);
            assert_eq!(list(&backend).await.unwrap().len(), before);

            let outcome = delete(&backend, &created.id, Confirmation::Confirmed, "admin")
                .await
                .unwrap();
            assert_eq!(outcome, DeleteOutcome::Deleted);
            assert_eq!(list(&backend).await.unwrap().len(), before - 1);
        }

        #[tokio::test]
        async fn self_registration_links_and_resolves_as_student() {
            let backend = InMemoryBackend::new_with_sample().unwrap();
            link_self_registration(&backend, "maya.patel@eduflow.edu", "maya-pass")
                .await
                .unwrap();
            let signed_in = sign_in(&backend, "maya.patel@eduflow.edu", "maya-pass")
                .await
                .unwrap();
            assert_eq!(signed_in.profile.role(), Role::Student);

            let again = link_self_registration(&backend, "maya.patel@eduflow.edu", "maya-pass").await;
            assert!(matches!(again, Err(ErpError::Validation(_))));
        }

        #[tokio::test]
        async fn failed_link_is_partial_and_can_be_retried() {
            let backend = InMemoryBackend::new_with_sample().unwrap();
            backend.fail_next(Table::ActiveStudents, Operation::Update).unwrap();
            let err = link_self_registration(&backend, "maya.patel@eduflow.edu", "maya-pass")
                .await
                .unwrap_err();
            match &err {
                ErpError::PartialFailure(failure) => {
                    assert_eq!(failure.operation, "register");
                    assert!(failure.is_partial());
                }
                other => panic!("expected partial failure, got {other:?}"),
            }
            assert!(matches!(
                sign_in(&backend, "maya.patel@eduflow.edu", "maya-pass").await,
                Err(ErpError::NoRoleAssigned)
            ));

            let wrong_password =
                link_self_registration(&backend, "maya.patel@eduflow.edu", "guess-1234").await;
            assert!(matches!(wrong_password, Err(ErpError::Validation(_))));

            let retried = link_self_registration(&backend, "maya.patel@eduflow.edu", "maya-pass")
                .await
                .unwrap();
            let signed_in = sign_in(&backend, "maya.patel@eduflow.edu", "maya-pass")
                .await
                .unwrap();
            assert_eq!(signed_in.session.identity.id, retried.id);
            assert_eq!(signed_in.profile.role(), Role::Student);
            assert_eq!(backend.active_sessions().unwrap(), 1);
        }

        #[tokio::test]
        async fn registration_without_record_creates_nothing() {
            let backend = InMemoryBackend::new_with_sample().unwrap();
            let err = link_self_registration(&backend, "stranger@eduflow.edu", "whatever1")
                .await
                .unwrap_err();
            assert!(matches!(err, ErpError::Validation(_)));
            assert!(backend.sign_in("stranger@eduflow.edu", "whatever1").await.is_err());
        }
    }
}
