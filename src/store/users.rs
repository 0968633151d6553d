use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Capability;
use crate::database::models::User;
use crate::database::query::SqlParam;
use crate::database::repository::Repository;
use crate::store::{AppContext, StoreError};

struct Cached {
    organization_id: Uuid,
    users: Vec<User>,
}

/// Directory of users in the current organization. The cache records which
/// organization it was loaded for; a session bound to a different one misses.
pub struct UserStore {
    ctx: AppContext,
    cache: RwLock<Option<Cached>>,
}

impl UserStore {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, cache: RwLock::new(None) }
    }

    pub async fn fetch_all(&self) -> Result<Vec<User>, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.organization_id == organization_id {
                return Ok(cached.users.clone());
            }
        }

        let members: Repository<crate::database::models::OrganizationMember> =
            Repository::new("organization_members", self.ctx.pool.clone());
        let memberships = members
            .select_any(&[("organization_id", SqlParam::Uuid(organization_id))], None)
            .await?;

        let users_repo: Repository<User> = Repository::new("users", self.ctx.pool.clone());
        let mut users = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(user) = users_repo
                .select_optional(&[("id", SqlParam::Uuid(membership.user_id))])
                .await?
            {
                users.push(user);
            }
        }

        *self.cache.write().await = Some(Cached { organization_id, users: users.clone() });
        Ok(users)
    }

    pub async fn fetch_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.organization_id == organization_id {
                if let Some(found) = cached.users.iter().find(|u| u.id == id) {
                    return Ok(found.clone());
                }
            }
        }

        let users_repo: Repository<User> = Repository::new("users", self.ctx.pool.clone());
        users_repo
            .select_optional(&[("id", SqlParam::Uuid(id))])
            .await?
            .ok_or_else(|| StoreError::NotFound("User".to_string()))
    }

    pub async fn clear(&self) {
        *self.cache.write().await = None;
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, organization_id: Uuid, users: Vec<User>) {
        *self.cache.write().await = Some(Cached { organization_id, users });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::test_support::offline_context;
    use chrono::Utc;

    fn user(id: Uuid, email: &str) -> User {
        User {
            id,
            email: email.to_string(),
            name: None,
            preferences: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn warm_cache_short_circuits() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = UserStore::new(ctx);
        let id = Uuid::new_v4();
        store.seed_cache(org, vec![user(id, "a@example.com")]).await;

        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
        assert_eq!(store.fetch_by_id(id).await.unwrap().email, "a@example.com");
    }

    #[tokio::test]
    async fn cache_for_another_org_is_not_reused() {
        let ctx = offline_context(Role::Admin, Some(Uuid::new_v4())).await;
        let store = UserStore::new(ctx);
        store.seed_cache(Uuid::new_v4(), vec![user(Uuid::new_v4(), "a@example.com")]).await;

        // The cached directory belongs to a different organization; serving
        // it would leak another tenant's members. The forced reload fails
        // against the offline backend.
        assert!(store.fetch_all().await.is_err());
    }

    #[tokio::test]
    async fn cold_cache_requires_the_backend() {
        let ctx = offline_context(Role::Admin, Some(Uuid::new_v4())).await;
        let store = UserStore::new(ctx);
        assert!(store.fetch_all().await.is_err());
    }

    #[tokio::test]
    async fn unknown_role_cannot_read_the_directory() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::None, Some(org)).await;
        let store = UserStore::new(ctx);
        store.seed_cache(org, vec![user(Uuid::new_v4(), "a@example.com")]).await;

        assert!(matches!(
            store.fetch_all().await,
            Err(StoreError::Denied("view"))
        ));
    }
}
