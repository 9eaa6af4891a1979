//! Ownership enforcement.

use vlogkit_models::{Project, User};
use vlogkit_store::Store;

use crate::error::{ApiError, ApiResult};

/// Load a project and require that `user` owns it.
///
/// A missing project and a project owned by someone else produce the same
/// generic response, so a non-owner cannot learn whether the id exists.
pub async fn require_project_owner(
    store: &Store,
    project_id: i64,
    user: &User,
) -> ApiResult<Project> {
    match store.get_project(project_id).await? {
        Some(project) if project.user_id == user.id => Ok(project),
        _ => Err(ApiError::not_found("project not found or not accessible")),
    }
}

/// Require that a user-scoped route targets the caller's own id.
pub fn require_self(user: &User, target_id: i64) -> ApiResult<()> {
    if user.id == target_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("cannot access another user's data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Store, User, User, Project) {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let alice = store
            .create_user("alice", "alice@example.com", "h")
            .await
            .unwrap();
        let bob = store
            .create_user("bob", "bob@example.com", "h")
            .await
            .unwrap();
        let project = store.create_project(alice.id, "trip", "").await.unwrap();
        (store, alice, bob, project)
    }

    #[tokio::test]
    async fn owner_can_access_project() {
        let (store, alice, _, project) = seeded().await;
        let got = require_project_owner(&store, project.id, &alice)
            .await
            .unwrap();
        assert_eq!(got.id, project.id);
    }

    #[tokio::test]
    async fn non_owner_gets_the_same_response_as_missing() {
        let (store, _, bob, project) = seeded().await;

        let unowned = require_project_owner(&store, project.id, &bob)
            .await
            .unwrap_err();
        let missing = require_project_owner(&store, 9999, &bob).await.unwrap_err();

        assert_eq!(unowned.detail(), missing.detail());
        assert!(matches!(unowned, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn self_check() {
        let (_, alice, bob, _) = seeded().await;
        assert!(require_self(&alice, alice.id).is_ok());
        assert!(matches!(
            require_self(&alice, bob.id),
            Err(ApiError::Forbidden(_))
        ));
    }
}
