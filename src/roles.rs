use tracing::{info, warn};

use crate::errors::{ErpError, ServiceResult};
use crate::models::{ActiveStudent, AdminRecord, Identity, RoleProfile, StaffRecord};
use crate::services::{AuthGateway, DataGateway, Filter, Session, Table, first_as};

/// A session together with the role it resolved to.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SignedIn {
    pub session: Session,
    pub profile: RoleProfile,
}

/// Looks the identity up in `admins`, `staff`, then `active_students`.
///
/// Admins and staff are keyed by the identity id itself; students carry it
/// in `user_id`. The first table with a row wins.
pub async fn resolve_role<G>(gateway: &G, identity: &Identity) -> ServiceResult<RoleProfile>
where
    G: DataGateway + ?Sized,
{
    let by_id = Filter::new().eq("id", identity.id.as_str());
    if let Some(admin) = first_as::<AdminRecord, _>(gateway, Table::Admins, by_id.clone()).await? {
        return Ok(RoleProfile::Admin(admin));
    }
    if let Some(staff) = first_as::<StaffRecord, _>(gateway, Table::Staff, by_id).await? {
        return Ok(RoleProfile::Staff(staff));
    }
    let by_user = Filter::new().eq("user_id", identity.id.as_str());
    if let Some(student) =
        first_as::<ActiveStudent, _>(gateway, Table::ActiveStudents, by_user).await?
    {
        return Ok(RoleProfile::Student(student));
    }
    Err(ErpError::NoRoleAssigned)
}

/// Signs in and resolves the role. A session whose role cannot be resolved
/// is signed out before the error is returned.
pub async fn sign_in<B>(backend: &B, email: &str, password: &str) -> ServiceResult<SignedIn>
where
    B: DataGateway + AuthGateway + ?Sized,
{
    let session = backend.sign_in(email, password).await?;
    match resolve_role(backend, &session.identity).await {
        Ok(profile) => {
            info!(user = %session.identity.id, role = %profile.role(), "signed in");
            Ok(SignedIn { session, profile })
        }
        Err(err) => {
            warn!(user = %session.identity.id, error = %err, "role resolution failed, signing out");
            if let Err(sign_out_err) = backend.sign_out(&session.access_token).await {
                warn!(error = %sign_out_err, "sign-out after failed resolution also failed");
            }
            Err(err)
        }
    }
}

/// Resolves the role behind an existing access token.
pub async fn current_profile<B>(
    backend: &B,
    access_token: &str,
) -> ServiceResult<(Identity, RoleProfile)>
where
    B: DataGateway + AuthGateway + ?Sized,
{
    let identity = backend
        .current_user(access_token)
        .await?
        .ok_or(ErpError::Unauthenticated)?;
    let profile = resolve_role(backend, &identity).await?;
    Ok((identity, profile))
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::InMemoryBackend;
    use serde_json::json;

    #[tokio::test]
    async fn sample_users_resolve_to_their_roles() {
        let backend = InMemoryBackend::new_with_sample().unwrap();
        for (email, password, role) in [
            ("admin@eduflow.edu", "admin123", Role::Admin),
            ("staff@eduflow.edu", "staff123", Role::Staff),
            ("alex.johnson@eduflow.edu", "student123", Role::Student),
        ] {
            let signed_in = sign_in(&backend, email, password).await.unwrap();
            assert_eq!(signed_in.profile.role(), role);
        }
    }

    #[tokio::test]
    async fn admin_wins_over_staff() {
        let backend = InMemoryBackend::new();
        let identity = backend.seed_user("dual@eduflow.edu", "dual-role").unwrap();
        for table in [Table::Staff, Table::Admins] {
            backend
                .seed_rows(
                    table,
                    vec![json!({"id": identity.id, "name": "Dual", "email": identity.email})],
                )
                .unwrap();
        }
        let profile = resolve_role(&backend, &identity).await.unwrap();
        assert_eq!(profile.role(), Role::Admin);
    }

    #[tokio::test]
    async fn student_is_matched_by_user_id_not_id() {
        let backend = InMemoryBackend::new();
        let identity = backend.seed_user("sam@eduflow.edu", "secret12").unwrap();
        backend
            .seed_rows(
                Table::ActiveStudents,
                vec![json!({
                    "id": identity.id,
                    "name": "Sam",
                    "email": identity.email,
                    "course": "Physics",
                    "semester": "1",
                    "academic_year": "2024-2025",
                })],
            )
            .unwrap();
        assert!(matches!(
            resolve_role(&backend, &identity).await,
            Err(ErpError::NoRoleAssigned)
        ));
    }

    #[tokio::test]
    async fn roleless_sign_in_leaves_no_session() {
        let backend = InMemoryBackend::new();
        backend.seed_user("ghost@eduflow.edu", "boo-boo").unwrap();
        let err = sign_in(&backend, "ghost@eduflow.edu", "boo-boo")
            .await
            .unwrap_err();
        assert!(matches!(err, ErpError::NoRoleAssigned));
        assert!(err.clears_session());
        assert_eq!(backend.active_sessions().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated() {
        let backend = InMemoryBackend::new_with_sample().unwrap();
        assert!(matches!(
            current_profile(&backend, "not-a-token").await,
            Err(ErpError::Unauthenticated)
        ));
    }
}
