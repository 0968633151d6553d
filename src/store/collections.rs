use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Capability;
use crate::database::manager::DatabaseError;
use crate::database::models::{Collection, NewCollection};
use crate::database::query::SqlParam;
use crate::database::repository::Repository;
use crate::notify::NotificationKind;
use crate::store::{AppContext, StoreError};

struct Cached {
    organization_id: Uuid,
    collections: Vec<Collection>,
}

/// Collections for the current organization, cached in memory. The cache is
/// keyed on the organization it was loaded for; switching organizations
/// invalidates it implicitly.
pub struct CollectionStore {
    ctx: AppContext,
    cache: RwLock<Option<Cached>>,
}

impl CollectionStore {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, cache: RwLock::new(None) }
    }

    fn repo(&self) -> Repository<Collection> {
        Repository::new("collections", self.ctx.pool.clone())
    }

    /// All collections for the session's organization, ordered by position.
    /// Answered from cache when already loaded for this organization.
    pub async fn fetch_for_current_org(&self) -> Result<Vec<Collection>, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.organization_id == organization_id {
                return Ok(cached.collections.clone());
            }
        }

        let collections = self
            .repo()
            .select_any(
                &[("organization_id", SqlParam::Uuid(organization_id))],
                Some(("position", true)),
            )
            .await?;

        *self.cache.write().await =
            Some(Cached { organization_id, collections: collections.clone() });
        Ok(collections)
    }

    pub async fn fetch_by_id(&self, id: i64) -> Result<Collection, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.organization_id == organization_id {
                if let Some(found) = cached.collections.iter().find(|c| c.id == id) {
                    return Ok(found.clone());
                }
            }
        }

        self.repo()
            .select_optional(&[
                ("id", SqlParam::Int(id)),
                ("organization_id", SqlParam::Uuid(organization_id)),
            ])
            .await?
            .ok_or_else(|| StoreError::NotFound("Collection".to_string()))
    }

    /// Resolve a collection by slug within the current organization. A
    /// missing row is an ordinary `None` outcome, reported to the user but
    /// never conflated with a query failure.
    pub async fn fetch_by_slug(&self, slug: &str) -> Result<Option<Collection>, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.organization_id == organization_id {
                if let Some(found) = cached.collections.iter().find(|c| c.slug == slug) {
                    return Ok(Some(found.clone()));
                }
            }
        }

        let found = self
            .repo()
            .select_optional(&[
                ("slug", SqlParam::Text(slug.to_string())),
                ("organization_id", SqlParam::Uuid(organization_id)),
            ])
            .await?;

        if found.is_none() {
            self.ctx
                .notifier
                .push(NotificationKind::Error, format!("Collection \"{}\" was not found.", slug));
        }
        Ok(found)
    }

    /// Whether a slug is already taken in the current organization. Only a
    /// confirmed empty result maps to `false`; any query failure propagates.
    pub async fn slug_exists(&self, slug: &str) -> Result<bool, StoreError> {
        let organization_id = self.ctx.require_organization().await?;

        let found: Option<Collection> = self
            .repo()
            .select_optional(&[
                ("slug", SqlParam::Text(slug.to_string())),
                ("organization_id", SqlParam::Uuid(organization_id)),
            ])
            .await?;
        Ok(found.is_some())
    }

    pub async fn add(&self, new: NewCollection) -> Result<Collection, StoreError> {
        self.ctx.require_capability(Capability::AddCollections).await?;
        let organization_id = self.ctx.require_organization().await?;

        if new.name.trim().is_empty() || new.slug.trim().is_empty() {
            return Err(StoreError::Validation(
                "Collection name and slug are required".to_string(),
            ));
        }
        if self.slug_exists(&new.slug).await? {
            return Err(StoreError::Validation(format!(
                "A collection with the slug \"{}\" already exists",
                new.slug
            )));
        }

        let created = self
            .repo()
            .insert_returning(vec![
                ("name".to_string(), SqlParam::Text(new.name)),
                ("slug".to_string(), SqlParam::Text(new.slug)),
                ("description".to_string(), new.description.into()),
                ("is_hidden".to_string(), SqlParam::Bool(new.is_hidden)),
                ("position".to_string(), SqlParam::Int(new.position as i64)),
                ("organization_id".to_string(), SqlParam::Uuid(organization_id)),
            ])
            .await?;

        if let Some(cached) = self.cache.write().await.as_mut() {
            if cached.organization_id == organization_id {
                cached.collections.push(created.clone());
            }
        }
        self.ctx.notifier.push(
            NotificationKind::Success,
            format!("Collection \"{}\" created.", created.name),
        );
        Ok(created)
    }

    pub async fn update(&self, id: i64, new: NewCollection) -> Result<Collection, StoreError> {
        self.ctx.require_capability(Capability::Edit).await?;
        let organization_id = self.ctx.require_organization().await?;

        let updated = self
            .repo()
            .update_returning(
                vec![
                    ("name".to_string(), SqlParam::Text(new.name)),
                    ("slug".to_string(), SqlParam::Text(new.slug)),
                    ("description".to_string(), new.description.into()),
                    ("is_hidden".to_string(), SqlParam::Bool(new.is_hidden)),
                ],
                &[
                    ("id", SqlParam::Int(id)),
                    ("organization_id", SqlParam::Uuid(organization_id)),
                ],
            )
            .await
            .map_err(not_found_as("Collection"))?;

        self.replace_cached(&updated).await;
        Ok(updated)
    }

    pub async fn toggle_visibility(&self, id: i64) -> Result<Collection, StoreError> {
        self.ctx.require_capability(Capability::Edit).await?;
        let current = self.fetch_by_id(id).await?;

        let updated = self
            .repo()
            .update_returning(
                vec![("is_hidden".to_string(), SqlParam::Bool(!current.is_hidden))],
                &[("id", SqlParam::Int(id))],
            )
            .await
            .map_err(not_found_as("Collection"))?;

        self.replace_cached(&updated).await;
        Ok(updated)
    }

    /// Persist a new ordering as a single bulk upsert; the whole batch
    /// succeeds or fails together.
    pub async fn reposition(&self, positions: &[(i64, i32)]) -> Result<(), StoreError> {
        self.ctx.require_capability(Capability::Edit).await?;
        if positions.is_empty() {
            return Ok(());
        }

        // The upsert writes by id alone, so every id must be confirmed to
        // belong to this organization first.
        let known = self.fetch_for_current_org().await?;
        if positions.iter().any(|(id, _)| !known.iter().any(|c| c.id == *id)) {
            return Err(StoreError::Validation(
                "Unknown collection in the new ordering".to_string(),
            ));
        }

        let rows = positions
            .iter()
            .map(|(id, position)| {
                vec![
                    ("id".to_string(), SqlParam::Int(*id)),
                    ("position".to_string(), SqlParam::Int(*position as i64)),
                ]
            })
            .collect();
        self.repo().upsert_many(rows, "id").await?;

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_mut() {
            for collection in cached.collections.iter_mut() {
                if let Some((_, position)) = positions.iter().find(|(id, _)| *id == collection.id)
                {
                    collection.position = *position;
                }
            }
            cached.collections.sort_by_key(|c| c.position);
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.ctx.require_capability(Capability::Delete).await?;
        let organization_id = self.ctx.require_organization().await?;

        let content: Repository<crate::database::models::ContentItem> =
            Repository::new("content_items", self.ctx.pool.clone());
        content.delete_where(&[("collection_id", SqlParam::Int(id))]).await?;

        let fields: Repository<crate::database::models::Field> =
            Repository::new("fields", self.ctx.pool.clone());
        fields.delete_where(&[("collection_id", SqlParam::Int(id))]).await?;

        let deleted = self
            .repo()
            .delete_where(&[
                ("id", SqlParam::Int(id)),
                ("organization_id", SqlParam::Uuid(organization_id)),
            ])
            .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound("Collection".to_string()));
        }

        if let Some(cached) = self.cache.write().await.as_mut() {
            cached.collections.retain(|c| c.id != id);
        }
        self.ctx.notifier.push(NotificationKind::Success, "Collection deleted.");
        Ok(())
    }

    pub async fn content_count(&self, collection_id: i64) -> Result<i64, StoreError> {
        let items: Repository<crate::database::models::ContentItem> =
            Repository::new("content_items", self.ctx.pool.clone());
        Ok(items.count(&[("collection_id", SqlParam::Int(collection_id))]).await?)
    }

    pub async fn clear(&self) {
        *self.cache.write().await = None;
    }

    /// Swap exactly the matching cache entry for the fresh row.
    async fn replace_cached(&self, updated: &Collection) {
        if let Some(cached) = self.cache.write().await.as_mut() {
            if let Some(slot) =
                cached.collections.iter_mut().find(|c| c.id == updated.id)
            {
                *slot = updated.clone();
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, organization_id: Uuid, collections: Vec<Collection>) {
        *self.cache.write().await = Some(Cached { organization_id, collections });
    }
}

fn not_found_as(what: &str) -> impl Fn(DatabaseError) -> StoreError + '_ {
    move |err| match err {
        DatabaseError::NotFound(_) => StoreError::NotFound(what.to_string()),
        other => StoreError::Database(other),
    }
}
