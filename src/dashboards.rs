use serde::{Deserialize, Serialize};

use crate::admissions::pending_count;
use crate::errors::{ErpError, ServiceResult};
use crate::fees::{self, FeeFilter, FeeTotals};
use crate::models::{ActiveStudent, FeePayment, Role, RoleProfile};
use crate::services::{DataGateway, Filter, Query, Table, select_as};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HostelRoom {
    pub number: &'static str,
    pub occupancy: u32,
    pub capacity: u32,
}

impl HostelRoom {
    pub fn is_full(&self) -> bool {
        self.occupancy >= self.capacity
    }

    pub fn status(&self) -> &'static str {
        if self.is_full() { "Full" } else { "Available" }
    }
}

pub const HOSTEL_ROOMS: &[HostelRoom] = &[
    HostelRoom { number: "101", occupancy: 4, capacity: 4 },
    HostelRoom { number: "102", occupancy: 3, capacity: 4 },
    HostelRoom { number: "103", occupancy: 2, capacity: 4 },
    HostelRoom { number: "104", occupancy: 4, capacity: 4 },
    HostelRoom { number: "105", occupancy: 1, capacity: 4 },
    HostelRoom { number: "106", occupancy: 4, capacity: 4 },
];

/// Occupied beds as a whole percentage of capacity.
pub fn occupancy_percent(rooms: &[HostelRoom]) -> u32 {
    let capacity: u32 = rooms.iter().map(|r| r.capacity).sum();
    if capacity == 0 {
        return 0;
    }
    let occupied: u32 = rooms.iter().map(|r| r.occupancy.min(r.capacity)).sum();
    (occupied * 100 + capacity / 2) / capacity
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HostelAssignment {
    pub room_number: &'static str,
    pub roommate: &'static str,
    pub warden: &'static str,
    pub check_in: &'static str,
    pub monthly_rent: u32,
}

pub const STUDENT_HOSTEL: HostelAssignment = HostelAssignment {
    room_number: "H-Block 205",
    roommate: "Mike Wilson",
    warden: "Mrs. Sarah Brown",
    check_in: "2023-08-15",
    monthly_rent: 8000,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExamSlot {
    pub subject: &'static str,
    pub date: &'static str,
    pub time: &'static str,
    pub room: &'static str,
}

pub const EXAM_SCHEDULE: &[ExamSlot] = &[
    ExamSlot { subject: "Data Structures", date: "2024-02-15", time: "10:00 AM", room: "CS-101" },
    ExamSlot { subject: "Database Systems", date: "2024-02-18", time: "02:00 PM", room: "CS-102" },
    ExamSlot { subject: "Web Development", date: "2024-02-22", time: "10:00 AM", room: "CS-103" },
    ExamSlot { subject: "Software Engineering", date: "2024-02-25", time: "02:00 PM", room: "CS-104" },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct InvigilationDuty {
    pub subject: &'static str,
    pub date: &'static str,
    pub time: &'static str,
    pub duration: &'static str,
}

pub const UPCOMING_INVIGILATION: &[InvigilationDuty] = &[
    InvigilationDuty { subject: "Data Structures", date: "2024-02-15", time: "10:00 AM", duration: "3 hours" },
    InvigilationDuty { subject: "Database Systems", date: "2024-02-18", time: "02:00 PM", duration: "2 hours" },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExamResult {
    pub subject: &'static str,
    pub marks: u32,
    pub max_marks: u32,
    pub grade: &'static str,
    pub date: &'static str,
}

pub const RECENT_RESULTS: &[ExamResult] = &[
    ExamResult { subject: "Operating Systems", marks: 85, max_marks: 100, grade: "A", date: "2024-01-20" },
    ExamResult { subject: "Computer Networks", marks: 78, max_marks: 100, grade: "B+", date: "2024-01-18" },
    ExamResult { subject: "Algorithm Design", marks: 92, max_marks: 100, grade: "A+", date: "2024-01-15" },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ClassSession {
    pub subject: &'static str,
    pub time: &'static str,
    pub room: &'static str,
    pub students: u32,
}

pub const TODAYS_CLASSES: &[ClassSession] = &[
    ClassSession { subject: "Data Structures", time: "09:00 AM", room: "CS-101", students: 45 },
    ClassSession { subject: "Database Systems", time: "11:00 AM", room: "CS-102", students: 40 },
    ClassSession { subject: "Web Development", time: "02:00 PM", room: "CS-103", students: 38 },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttendanceEntry {
    pub name: String,
    pub roll_no: String,
    pub status: AttendanceStatus,
    pub time: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

/// One class register. Marks live in memory only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttendanceSheet {
    pub entries: Vec<AttendanceEntry>,
}

impl AttendanceSheet {
    pub fn sample() -> Self {
        let entry = |name: &str, roll_no: &str, status, time: Option<&str>| AttendanceEntry {
            name: name.to_string(),
            roll_no: roll_no.to_string(),
            status,
            time: time.map(str::to_string),
        };
        Self {
            entries: vec![
                entry("John Doe", "CS001", AttendanceStatus::Present, Some("09:15 AM")),
                entry("Jane Smith", "CS002", AttendanceStatus::Absent, None),
                entry("Mike Johnson", "CS003", AttendanceStatus::Present, Some("09:20 AM")),
                entry("Sarah Wilson", "CS004", AttendanceStatus::Late, Some("09:45 AM")),
                entry("Alex Brown", "CS005", AttendanceStatus::Present, Some("09:10 AM")),
            ],
        }
    }

    pub fn mark(&mut self, roll_no: &str, status: AttendanceStatus, time: Option<&str>) -> ServiceResult<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.roll_no == roll_no)
            .ok_or_else(|| ErpError::NotFound(format!("roll number {roll_no}")))?;
        entry.status = status;
        entry.time = match status {
            AttendanceStatus::Absent => None,
            _ => time.map(str::to_string),
        };
        Ok(())
    }

    pub fn summary(&self) -> AttendanceSummary {
        self.entries
            .iter()
            .fold(AttendanceSummary::default(), |mut acc, e| {
                match e.status {
                    AttendanceStatus::Present => acc.present += 1,
                    AttendanceStatus::Absent => acc.absent += 1,
                    AttendanceStatus::Late => acc.late += 1,
                }
                acc
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReportCard {
    pub title: &'static str,
    pub description: &'static str,
}

const ADMIN_REPORTS: &[ReportCard] = &[
    ReportCard { title: "Student Report", description: "Complete student database" },
    ReportCard { title: "Fee Collection", description: "Financial reports" },
    ReportCard { title: "Academic Report", description: "Exam and grade reports" },
    ReportCard { title: "Hostel Report", description: "Occupancy and maintenance" },
    ReportCard { title: "Staff Report", description: "Employee information" },
    ReportCard { title: "Attendance Report", description: "Student attendance data" },
];

const STAFF_REPORTS: &[ReportCard] = &[
    ReportCard { title: "Attendance Report", description: "Student attendance records" },
    ReportCard { title: "Grade Report", description: "Exam results and grades" },
    ReportCard { title: "Class Performance", description: "Overall class analytics" },
];

pub fn reports(role: Role) -> &'static [ReportCard] {
    match role {
        Role::Admin => ADMIN_REPORTS,
        Role::Staff => STAFF_REPORTS,
        Role::Student => &[],
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminOverview {
    pub total_students: usize,
    pub pending_admissions: usize,
    pub hostel_occupancy_percent: u32,
    pub fees: FeeTotals,
    pub hostel_rooms: &'static [HostelRoom],
    pub reports: &'static [ReportCard],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StaffOverview {
    pub classes: &'static [ClassSession],
    pub invigilation: &'static [InvigilationDuty],
    pub attendance: AttendanceSheet,
    pub attendance_summary: AttendanceSummary,
    pub reports: &'static [ReportCard],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudentOverview {
    pub name: String,
    pub course: String,
    pub semester: String,
    pub fees: FeeTotals,
    pub payments: Vec<FeePayment>,
    pub hostel: HostelAssignment,
    pub exams: &'static [ExamSlot],
    pub results: &'static [ExamResult],
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
    Admin(AdminOverview),
    Staff(StaffOverview),
    Student(StudentOverview),
}

pub async fn admin_overview<G>(gateway: &G) -> ServiceResult<AdminOverview>
where
    G: DataGateway + ?Sized,
{
    let total_students = gateway.select(Table::ActiveStudents, &Query::new()).await?.len();
    let pending_admissions = pending_count(gateway).await?;
    let payments = fees::fetch_payments(gateway).await?;
    Ok(AdminOverview {
        total_students,
        pending_admissions,
        hostel_occupancy_percent: occupancy_percent(HOSTEL_ROOMS),
        fees: fees::aggregate(&fees::filter(&payments, &FeeFilter::default())),
        hostel_rooms: HOSTEL_ROOMS,
        reports: reports(Role::Admin),
    })
}

pub fn staff_overview() -> StaffOverview {
    let attendance = AttendanceSheet::sample();
    StaffOverview {
        attendance_summary: attendance.summary(),
        attendance,
        classes: TODAYS_CLASSES,
        invigilation: UPCOMING_INVIGILATION,
        reports: reports(Role::Staff),
    }
}

/// A student's own ledger plus the static timetable data.
pub async fn student_overview<G>(gateway: &G, student: &ActiveStudent) -> ServiceResult<StudentOverview>
where
    G: DataGateway + ?Sized,
{
    let query = Query::new()
        .filter(Filter::new().eq("student_email", student.email.as_str()))
        .order_by("created_at", true);
    let payments: Vec<FeePayment> = select_as(gateway, Table::FeePayments, &query).await?;
    Ok(StudentOverview {
        name: student.name.clone(),
        course: student.course.clone(),
        semester: student.semester.clone(),
        fees: fees::aggregate(&payments),
        payments,
        hostel: STUDENT_HOSTEL,
        exams: EXAM_SCHEDULE,
        results: RECENT_RESULTS,
    })
}

pub async fn dashboard_for<G>(gateway: &G, profile: &RoleProfile) -> ServiceResult<Dashboard>
where
    G: DataGateway + ?Sized,
{
    Ok(match profile {
        RoleProfile::Admin(_) => Dashboard::Admin(admin_overview(gateway).await?),
        RoleProfile::Staff(_) => Dashboard::Staff(staff_overview()),
        RoleProfile::Student(student) => Dashboard::Student(student_overview(gateway, student).await?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_rounds_to_whole_percent() {
        // 18 of 24 beds
        assert_eq!(occupancy_percent(HOSTEL_ROOMS), 75);
        assert_eq!(occupancy_percent(&[]), 0);
        assert_eq!(HOSTEL_ROOMS.iter().filter(|r| r.is_full()).count(), 3);
    }

    #[test]
    fn marking_attendance_updates_summary() {
        let mut sheet = AttendanceSheet::sample();
        assert_eq!(
            sheet.summary(),
            AttendanceSummary { present: 3, absent: 1, late: 1 }
        );
        sheet.mark("CS002", AttendanceStatus::Late, Some("09:50 AM")).unwrap();
        sheet.mark("CS001", AttendanceStatus::Absent, Some("09:15 AM")).unwrap();
        assert_eq!(
            sheet.summary(),
            AttendanceSummary { present: 2, absent: 1, late: 2 }
        );
        assert_eq!(sheet.entries[0].time, None);
        assert!(matches!(
            sheet.mark("XX999", AttendanceStatus::Present, None),
            Err(ErpError::NotFound(_))
        ));
    }

    #[test]
    fn students_get_no_report_cards() {
        assert!(reports(Role::Student).is_empty());
        assert_eq!(reports(Role::Admin).len(), 6);
    }

    #[cfg(feature = "server")]
    #[tokio::test]
    async fn overviews_read_live_data() {
        use crate::roles::sign_in;
        use crate::services::InMemoryBackend;

        let backend = InMemoryBackend::new_with_sample().unwrap();
        let admin = admin_overview(&backend).await.unwrap();
        assert_eq!(admin.total_students, 2);
        assert_eq!(admin.pending_admissions, 3);
        assert_eq!(admin.fees.collected, 85000.0);

        let alex = sign_in(&backend, "alex.johnson@eduflow.edu", "student123").await.unwrap();
        let Dashboard::Student(overview) = dashboard_for(&backend, &alex.profile).await.unwrap() else {
            panic!("expected student dashboard");
        };
        assert_eq!(overview.payments.len(), 2);
        assert_eq!(overview.fees.pending, 40000.0);
    }
}
