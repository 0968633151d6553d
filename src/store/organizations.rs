use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Capability;
use crate::database::models::Organization;
use crate::database::query::SqlParam;
use crate::database::repository::Repository;
use crate::notify::NotificationKind;
use crate::store::{AppContext, StoreError};

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
}

/// Organizations visible to the current user. Creation is the one operation
/// reserved to the platform operator role.
pub struct OrganizationStore {
    ctx: AppContext,
    cache: RwLock<Option<Vec<Organization>>>,
}

impl OrganizationStore {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, cache: RwLock::new(None) }
    }

    fn repo(&self) -> Repository<Organization> {
        Repository::new("organizations", self.ctx.pool.clone())
    }

    pub async fn fetch_all(&self) -> Result<Vec<Organization>, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        if let Some(organizations) = self.cache.read().await.as_ref() {
            return Ok(organizations.clone());
        }

        let organizations = self.repo().select_any(&[], Some(("name", true))).await?;
        *self.cache.write().await = Some(organizations.clone());
        Ok(organizations)
    }

    pub async fn fetch_by_id(&self, id: Uuid) -> Result<Organization, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        if let Some(organizations) = self.cache.read().await.as_ref() {
            if let Some(found) = organizations.iter().find(|o| o.id == id) {
                return Ok(found.clone());
            }
        }

        self.repo()
            .select_optional(&[("id", SqlParam::Uuid(id))])
            .await?
            .ok_or_else(|| StoreError::NotFound("Organization".to_string()))
    }

    pub async fn add(&self, new: NewOrganization) -> Result<Organization, StoreError> {
        self.ctx.require_capability(Capability::ManageOrganizations).await?;

        if new.name.trim().is_empty() {
            return Err(StoreError::Validation("Organization name is required".to_string()));
        }
        let owner_id = match self.ctx.session.user_id().await {
            Some(id) => id,
            None => {
                return Err(StoreError::Validation(
                    "No user on the current session".to_string(),
                ))
            }
        };

        let created = self
            .repo()
            .insert_returning(vec![
                ("name".to_string(), SqlParam::Text(new.name)),
                ("owner_id".to_string(), SqlParam::Uuid(owner_id)),
            ])
            .await?;

        if let Some(organizations) = self.cache.write().await.as_mut() {
            organizations.push(created.clone());
        }
        self.ctx.notifier.push(
            NotificationKind::Success,
            format!("Organization \"{}\" created.", created.name),
        );
        Ok(created)
    }

    pub async fn clear(&self) {
        *self.cache.write().await = None;
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, organizations: Vec<Organization>) {
        *self.cache.write().await = Some(organizations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::test_support::offline_context;
    use chrono::Utc;

    fn organization(name: &str) -> Organization {
        Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn admin_cannot_create_organizations() {
        let ctx = offline_context(Role::Admin, Some(Uuid::new_v4())).await;
        let store = OrganizationStore::new(ctx);

        let err =
            store.add(NewOrganization { name: "Acme".to_string() }).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied("manage organizations")));
    }

    #[tokio::test]
    async fn super_admin_passes_the_gate() {
        let ctx = offline_context(Role::SuperAdmin, Some(Uuid::new_v4())).await;
        let store = OrganizationStore::new(ctx);

        // The gate passes; creation then fails at the offline backend.
        let err =
            store.add(NewOrganization { name: "Acme".to_string() }).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn unknown_role_cannot_list_organizations() {
        let ctx = offline_context(Role::None, Some(Uuid::new_v4())).await;
        let store = OrganizationStore::new(ctx);
        store.seed_cache(vec![organization("Acme")]).await;

        assert!(matches!(
            store.fetch_all().await,
            Err(StoreError::Denied("view"))
        ));
    }

    #[tokio::test]
    async fn warm_cache_answers_lookups() {
        let ctx = offline_context(Role::SuperAdmin, Some(Uuid::new_v4())).await;
        let store = OrganizationStore::new(ctx);
        let org = organization("Acme");
        let id = org.id;
        store.seed_cache(vec![org]).await;

        assert_eq!(store.fetch_all().await.unwrap().len(), 1);
        assert_eq!(store.fetch_by_id(id).await.unwrap().name, "Acme");
    }
}
