use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ActiveStudent, RoleProfile};

pub const NOT_PROVIDED: &str = "Not provided";
pub const UNKNOWN_DATE: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileField {
    pub label: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudentDetails {
    pub student_id: String,
    pub course: String,
    pub academic_year: String,
    pub semester: String,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub previous_qualification: Option<String>,
    pub documents_submitted: Vec<String>,
    pub notes: Option<String>,
}

/// What the profile section shows for the signed-in user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role_label: &'static str,
    /// `Course` for students, `Department` otherwise; absent when empty.
    pub affiliation: Option<ProfileField>,
    pub member_since: String,
    pub last_updated: String,
    pub student: Option<StudentDetails>,
}

fn or_not_provided(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_PROVIDED)
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn date_label(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

fn student_details(student: &ActiveStudent) -> StudentDetails {
    StudentDetails {
        student_id: student.id.clone(),
        course: student.course.clone(),
        academic_year: student.academic_year.clone(),
        semester: student.semester.clone(),
        date_of_birth: student.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
        address: non_empty(student.address.as_deref()),
        previous_qualification: non_empty(student.previous_qualification.as_deref()),
        documents_submitted: student.documents_submitted.clone().unwrap_or_default(),
        notes: non_empty(student.notes.as_deref()),
    }
}

/// Builds the view; `login_email` is the identity's address, which wins
/// over the one stored on the role record.
pub fn build(profile: &RoleProfile, login_email: Option<&str>) -> ProfileView {
    let role_label = profile.role().label();
    let email = or_not_provided(login_email.or(Some(profile.email())));
    match profile {
        RoleProfile::Admin(record) | RoleProfile::Staff(record) => ProfileView {
            name: or_not_provided(Some(&record.name)),
            email,
            phone: or_not_provided(record.phone.as_deref()),
            role_label,
            affiliation: non_empty(record.department.as_deref()).map(|value| ProfileField {
                label: "Department",
                value,
            }),
            member_since: date_label(Some(record.created_at)),
            last_updated: date_label(Some(record.updated_at)),
            student: None,
        },
        RoleProfile::Student(student) => ProfileView {
            name: or_not_provided(Some(&student.name)),
            email,
            phone: or_not_provided(student.phone.as_deref()),
            role_label,
            affiliation: non_empty(Some(&student.course)).map(|value| ProfileField {
                label: "Course",
                value,
            }),
            member_since: date_label(student.created_at.or(Some(student.approved_at))),
            last_updated: date_label(student.updated_at),
            student: Some(student_details(student)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdminRecord;
    use chrono::TimeZone;

    #[test]
    fn missing_fields_read_not_provided() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let record = AdminRecord {
            id: "st-1".into(),
            name: "Sarah Brown".into(),
            email: "staff@eduflow.edu".into(),
            phone: None,
            department: Some("  ".into()),
            created_at: at,
            updated_at: at,
        };
        let view = build(&RoleProfile::Staff(record), None);
        assert_eq!(view.phone, NOT_PROVIDED);
        assert_eq!(view.email, "staff@eduflow.edu");
        assert_eq!(view.role_label, "Staff");
        assert!(view.affiliation.is_none());
        assert_eq!(view.member_since, "2024-01-02");
        assert!(view.student.is_none());
    }

    #[test]
    fn students_carry_academic_details() {
        let at = Utc.with_ymd_and_hms(2023, 8, 1, 9, 0, 0).unwrap();
        let student = ActiveStudent {
            id: "s-9".into(),
            name: "Alex Johnson".into(),
            email: "alex@old.edu".into(),
            phone: Some("+1-555-0142".into()),
            course: "Computer Science".into(),
            semester: "4".into(),
            academic_year: "2023-2024".into(),
            date_of_birth: None,
            address: None,
            previous_qualification: Some("A-Levels".into()),
            documents_submitted: None,
            notes: None,
            approved_at: at,
            user_id: Some("u-1".into()),
            created_at: None,
            updated_at: None,
        };
        let view = build(&RoleProfile::Student(student), Some("alex.johnson@eduflow.edu"));
        assert_eq!(view.email, "alex.johnson@eduflow.edu");
        assert_eq!(view.affiliation.unwrap().label, "Course");
        assert_eq!(view.member_since, "2023-08-01");
        assert_eq!(view.last_updated, UNKNOWN_DATE);
        let details = view.student.unwrap();
        assert_eq!(details.semester, "4");
        assert!(details.documents_submitted.is_empty());
    }
}
