use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, unbounded};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::admissions::pending_count;
use crate::errors::ServiceResult;
use crate::models::Role;
use crate::services::{ChangeEvent, ChangeFeed, DataGateway, EventMask, SubscriptionHandle, Table};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Dashboard,
    Admissions,
    StudentAccounts,
    Attendance,
    Fees,
    Hostel,
    Exams,
    Reports,
    Profile,
    Settings,
}

impl Section {
    pub const ALL: [Section; 10] = [
        Section::Dashboard,
        Section::Admissions,
        Section::StudentAccounts,
        Section::Attendance,
        Section::Fees,
        Section::Hostel,
        Section::Exams,
        Section::Reports,
        Section::Profile,
        Section::Settings,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Section::Dashboard => "dashboard",
            Section::Admissions => "admissions",
            Section::StudentAccounts => "student-accounts",
            Section::Attendance => "attendance",
            Section::Fees => "fees",
            Section::Hostel => "hostel",
            Section::Exams => "exams",
            Section::Reports => "reports",
            Section::Profile => "profile",
            Section::Settings => "settings",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| s.slug() == slug)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Badge {
    /// Live count of actionable admissions.
    PendingAdmissions,
    Label(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SidebarItem {
    pub section: Section,
    pub label: &'static str,
    pub badge: Option<Badge>,
}

const fn item(section: Section, label: &'static str) -> SidebarItem {
    SidebarItem {
        section,
        label,
        badge: None,
    }
}

const ADMIN_SIDEBAR: &[SidebarItem] = &[
    item(Section::Dashboard, "Dashboard"),
    SidebarItem {
        section: Section::Admissions,
        label: "Admissions",
        badge: Some(Badge::PendingAdmissions),
    },
    item(Section::StudentAccounts, "Student Accounts"),
    item(Section::Fees, "Fee Management"),
    item(Section::Hostel, "Hostel"),
    item(Section::Exams, "Exams"),
    item(Section::Reports, "Reports"),
    item(Section::Profile, "Profile"),
    item(Section::Settings, "Settings"),
];

const STAFF_SIDEBAR: &[SidebarItem] = &[
    item(Section::Dashboard, "Dashboard"),
    item(Section::Attendance, "Attendance"),
    item(Section::Exams, "Exams"),
    item(Section::Reports, "Reports"),
    item(Section::Profile, "Profile"),
    item(Section::Settings, "Settings"),
];

const STUDENT_SIDEBAR: &[SidebarItem] = &[
    item(Section::Dashboard, "Dashboard"),
    SidebarItem {
        section: Section::Fees,
        label: "Fees",
        badge: Some(Badge::Label("Due")),
    },
    item(Section::Hostel, "Hostel"),
    item(Section::Exams, "Exams"),
    item(Section::Profile, "Profile"),
];

pub fn sidebar(role: Role) -> &'static [SidebarItem] {
    match role {
        Role::Admin => ADMIN_SIDEBAR,
        Role::Staff => STAFF_SIDEBAR,
        Role::Student => STUDENT_SIDEBAR,
    }
}

pub fn allows(role: Role, section: Section) -> bool {
    sidebar(role).iter().any(|item| item.section == section)
}

/// A role-scoped location, `/{role}-dashboard/{section}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub role: Role,
    pub section: Section,
}

impl Route {
    pub fn home(role: Role) -> Self {
        Self {
            role,
            section: Section::Dashboard,
        }
    }

    /// Builds a route, falling back to the dashboard when the section is
    /// missing, unknown, or not offered to the role.
    pub fn resolve(role: Role, section: Option<&str>) -> Self {
        let section = section
            .and_then(Section::from_slug)
            .filter(|s| allows(role, *s))
            .unwrap_or(Section::Dashboard);
        Self { role, section }
    }

    pub fn parse(path: &str) -> Option<Self> {
        let mut parts = path.trim_matches('/').split('/');
        let role = parts.next()?.strip_suffix("-dashboard")?.parse::<Role>().ok()?;
        Some(Self::resolve(role, parts.next().filter(|s| !s.is_empty())))
    }

    pub fn path(&self) -> String {
        format!("/{}-dashboard/{}", self.role.as_str(), self.section.slug())
    }
}

/// Live count of actionable admissions, refreshed on every change event
/// for `pending_admissions`. Unsubscribes when dropped.
pub struct PendingBadge<B: DataGateway + ChangeFeed + ?Sized> {
    backend: Arc<B>,
    handle: SubscriptionHandle,
    events: UnboundedReceiver<()>,
    count: AtomicUsize,
}

impl<B: DataGateway + ChangeFeed + ?Sized> PendingBadge<B> {
    pub async fn subscribe(backend: Arc<B>) -> ServiceResult<Self> {
        let (sender, events) = unbounded();
        let handle = backend.subscribe(
            Table::PendingAdmissions,
            EventMask::ALL,
            Arc::new(move |event: ChangeEvent| {
                debug!(?event, "pending admissions changed");
                let _ = sender.unbounded_send(());
            }),
        )?;
        let count = match pending_count(&*backend).await {
            Ok(count) => count,
            Err(err) => {
                backend.unsubscribe(handle);
                return Err(err);
            }
        };
        Ok(Self {
            backend,
            handle,
            events,
            count: AtomicUsize::new(count),
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Waits for the next change and returns the refetched count. Events that
    /// queued up meanwhile are folded into a single refetch.
    pub async fn next_change(&mut self) -> Option<usize> {
        self.events.next().await?;
        while let Ok(Some(())) = self.events.try_next() {}
        let backend = Arc::clone(&self.backend);
        match pending_count(&*backend).await {
            Ok(count) => {
                self.count.store(count, Ordering::SeqCst);
                Some(count)
            }
            Err(err) => {
                warn!(error = %err, "pending badge refresh failed");
                Some(self.count())
            }
        }
    }
}

impl<B: DataGateway + ChangeFeed + ?Sized> Drop for PendingBadge<B> {
    fn drop(&mut self) {
        self.backend.unsubscribe(self.handle);
    }
}

/// Generation counter used to drop responses that arrive after navigation.
#[derive(Clone, Debug, Default)]
pub struct StaleGuard {
    generation: Arc<AtomicU64>,
}

#[derive(Clone, Debug)]
pub struct Ticket {
    generation: u64,
    guard: StaleGuard,
}

impl StaleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation; tickets from earlier ones become stale.
    pub fn begin(&self) -> Ticket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            generation,
            guard: self.clone(),
        }
    }
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.guard.generation.load(Ordering::SeqCst) == self.generation
    }

    pub fn accept<T>(&self, value: T) -> Option<T> {
        self.is_current().then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_fall_back_to_dashboard() {
        let route = Route::parse("/staff-dashboard/student-accounts").unwrap();
        assert_eq!(route.section, Section::Dashboard);
        let route = Route::parse("/admin-dashboard/nope").unwrap();
        assert_eq!(route.section, Section::Dashboard);
        let route = Route::parse("/student-dashboard").unwrap();
        assert_eq!(route, Route::home(Role::Student));
        assert!(Route::parse("/teacher-dashboard/fees").is_none());
    }

    #[test]
    fn route_paths_round_trip() {
        let route = Route::resolve(Role::Admin, Some("student-accounts"));
        assert_eq!(route.path(), "/admin-dashboard/student-accounts");
        assert_eq!(Route::parse(&route.path()), Some(route));
        assert_eq!(Route::resolve(Role::Staff, Some("attendance")).section, Section::Attendance);
        assert_eq!(Route::resolve(Role::Admin, Some("attendance")).section, Section::Dashboard);
    }

    #[test]
    fn only_admins_get_the_live_badge() {
        let live = |role| {
            sidebar(role)
                .iter()
                .any(|item| item.badge == Some(Badge::PendingAdmissions))
        };
        assert!(live(Role::Admin));
        assert!(!live(Role::Staff));
        assert!(!live(Role::Student));
        assert_eq!(sidebar(Role::Student).len(), 5);
    }

    #[test]
    fn stale_tickets_are_rejected() {
        let guard = StaleGuard::new();
        let first = guard.begin();
        assert_eq!(first.accept(1), Some(1));
        let second = guard.begin();
        assert_eq!(first.accept(1), None);
        assert!(second.is_current());
    }

    #[cfg(feature = "server")]
    #[tokio::test]
    async fn badge_follows_inserts_and_unsubscribes_on_drop() {
        use crate::services::{DataGateway, InMemoryBackend};
        use serde_json::json;

        let backend = Arc::new(InMemoryBackend::new_with_sample().unwrap());
        let mut badge = PendingBadge::subscribe(backend.clone()).await.unwrap();
        assert_eq!(badge.count(), 3);

        backend
            .insert(
                Table::PendingAdmissions,
                vec![json!({"name": "Eve", "email": "eve@example.com", "course": "Biology", "status": "pending"})],
            )
            .await
            .unwrap();
        assert_eq!(badge.next_change().await, Some(4));

        assert_eq!(backend.subscription_count().unwrap(), 1);
        drop(badge);
        assert_eq!(backend.subscription_count().unwrap(), 0);
    }
}
