use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ErpError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Student => "student",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Staff => "Staff",
            Role::Student => "Student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ErpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "student" => Ok(Role::Student),
            other => Err(ErpError::Validation(format!("unknown role `{other}`"))),
        }
    }
}

/// An authenticated principal issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type StaffRecord = AdminRecord;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveStudent {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub course: String,
    pub semester: String,
    pub academic_year: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub previous_qualification: Option<String>,
    #[serde(default)]
    pub documents_submitted: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    pub approved_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for `active_students`; ids and timestamps come from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewActiveStudent {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub course: String,
    pub semester: String,
    pub academic_year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_qualification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents_submitted: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub approved_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    Pending,
    UnderReview,
    Rejected,
}

impl AdmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionStatus::Pending => "pending",
            AdmissionStatus::UnderReview => "under_review",
            AdmissionStatus::Rejected => "rejected",
        }
    }

    /// Pending and under-review applications still await a decision.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, AdmissionStatus::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingAdmission {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub course: String,
    pub status: AdmissionStatus,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub previous_qualification: Option<String>,
    #[serde(default)]
    pub documents_submitted: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewPendingAdmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub status: AdmissionStatus,
    pub date_of_birth: NaiveDate,
    pub address: String,
    pub previous_qualification: String,
    pub documents_submitted: Vec<String>,
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedAdmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub course: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub previous_qualification: Option<String>,
    #[serde(default)]
    pub documents_submitted: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub applied_at: DateTime<Utc>,
    pub rejected_at: DateTime<Utc>,
    pub rejected_by: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Partial,
    Overdue,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Overdue => "overdue",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeePayment {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    #[serde(default)]
    pub student_roll_no: Option<String>,
    pub course: String,
    pub semester: String,
    pub academic_year: String,
    pub fee_type: String,
    pub fee_category: String,
    pub amount: f64,
    pub paid_amount: f64,
    pub balance_amount: f64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resolved profile of a signed-in identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "profile", rename_all = "lowercase")]
pub enum RoleProfile {
    Admin(AdminRecord),
    Staff(StaffRecord),
    Student(ActiveStudent),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Admin(_) => Role::Admin,
            RoleProfile::Staff(_) => Role::Staff,
            RoleProfile::Student(_) => Role::Student,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RoleProfile::Admin(record) | RoleProfile::Staff(record) => &record.name,
            RoleProfile::Student(student) => &student.name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            RoleProfile::Admin(record) | RoleProfile::Staff(record) => &record.email,
            RoleProfile::Student(student) => &student.email,
        }
    }
}

pub const DEFAULT_SEMESTER: &str = "1";

/// Academic year label in effect on `today`, e.g. `2024-2025`.
pub fn academic_year_for(today: NaiveDate) -> String {
    format!("{}-{}", today.year(), today.year() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_profile_serializes_tagged() {
        let now = Utc::now();
        let profile = RoleProfile::Staff(AdminRecord {
            id: "s-1".into(),
            name: "Priya".into(),
            email: "priya@college.edu".into(),
            phone: None,
            department: Some("Physics".into()),
            created_at: now,
            updated_at: now,
        });
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["role"], "staff");
        assert_eq!(value["profile"]["department"], "Physics");
        assert_eq!(profile.role(), Role::Staff);
    }

    #[test]
    fn pending_admission_tolerates_missing_optionals() {
        let row = json!({
            "id": "a-1",
            "name": "Ravi",
            "email": "ravi@example.com",
            "course": "Physics",
            "status": "under_review",
            "applied_at": "2024-01-15T10:00:00+00:00"
        });
        let admission: PendingAdmission = serde_json::from_value(row).unwrap();
        assert_eq!(admission.status, AdmissionStatus::UnderReview);
        assert!(admission.documents_submitted.is_empty());
        assert!(admission.status.is_actionable());
    }

    #[test]
    fn academic_year_spans_two_calendar_years() {
        let day = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        assert_eq!(academic_year_for(day), "2024-2025");
    }
}
