use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::Capability;
use crate::database::models::{writable_columns, Blog, Contact, FixedResource, Lead, Task};
use crate::database::query::SqlParam;
use crate::database::repository::Repository;
use crate::notify::NotificationKind;
use crate::store::{AppContext, StoreError};

pub type BlogStore = ResourceStore<Blog>;
pub type LeadStore = ResourceStore<Lead>;
pub type ContactStore = ResourceStore<Contact>;
pub type TaskStore = ResourceStore<Task>;

struct Cached<T> {
    organization_id: Uuid,
    rows: Vec<T>,
}

/// One store shape shared by the flat resources (blogs, leads, contacts,
/// tasks). Rows for the current organization are cached until explicitly
/// refreshed or cleared.
pub struct ResourceStore<T: FixedResource> {
    ctx: AppContext,
    cache: RwLock<Option<Cached<T>>>,
}

impl<T: FixedResource> ResourceStore<T> {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx, cache: RwLock::new(None) }
    }

    fn repo(&self) -> Repository<T> {
        Repository::new(T::TABLE, self.ctx.pool.clone())
    }

    pub async fn fetch_all(&self, force_refresh: bool) -> Result<Vec<T>, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if !force_refresh {
            if let Some(cached) = self.cache.read().await.as_ref() {
                if cached.organization_id == organization_id {
                    return Ok(cached.rows.clone());
                }
            }
        }

        let rows = self
            .repo()
            .select_any(&[("organization_id", SqlParam::Uuid(organization_id))], None)
            .await?;

        *self.cache.write().await = Some(Cached { organization_id, rows: rows.clone() });
        Ok(rows)
    }

    pub async fn fetch_by_id(&self, id: i64) -> Result<T, StoreError> {
        self.ctx.require_capability(Capability::View).await?;
        let organization_id = self.ctx.require_organization().await?;

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.organization_id == organization_id {
                if let Some(found) = cached.rows.iter().find(|row| row.id() == id) {
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
            .ok_or_else(|| StoreError::NotFound(noun_title(T::NOUN)))
    }

    pub async fn insert(&self, payload: Map<String, Value>) -> Result<T, StoreError> {
        self.ctx.require_capability(Capability::AddContent).await?;
        let organization_id = self.ctx.require_organization().await?;
        require_fields::<T>(&payload)?;

        let mut row = writable_columns::<T>(&payload);
        row.push(("organization_id".to_string(), SqlParam::Uuid(organization_id)));

        let created = self.repo().insert_returning(row).await?;

        if let Some(cached) = self.cache.write().await.as_mut() {
            if cached.organization_id == organization_id {
                cached.rows.push(created.clone());
            }
        }
        self.ctx
            .notifier
            .push(NotificationKind::Success, format!("{} created.", noun_title(T::NOUN)));
        Ok(created)
    }

    pub async fn update(&self, id: i64, payload: Map<String, Value>) -> Result<T, StoreError> {
        self.ctx.require_capability(Capability::Edit).await?;
        let organization_id = self.ctx.require_organization().await?;

        let changes = writable_columns::<T>(&payload);
        if changes.is_empty() {
            return Err(StoreError::Validation("No editable fields in payload".to_string()));
        }

        let updated = self
            .repo()
            .update_returning(
                changes,
                &[
                    ("id", SqlParam::Int(id)),
                    ("organization_id", SqlParam::Uuid(organization_id)),
                ],
            )
            .await
            .map_err(|err| match err {
                crate::database::manager::DatabaseError::NotFound(_) => {
                    StoreError::NotFound(noun_title(T::NOUN))
                }
                other => StoreError::Database(other),
            })?;

        // Exactly the matching cache entry is replaced; every other row is
        // left untouched.
        if let Some(cached) = self.cache.write().await.as_mut() {
            if let Some(slot) = cached.rows.iter_mut().find(|row| row.id() == id) {
                *slot = updated.clone();
            }
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.ctx.require_capability(Capability::Delete).await?;
        let organization_id = self.ctx.require_organization().await?;

        let deleted = self
            .repo()
            .delete_where(&[
                ("id", SqlParam::Int(id)),
                ("organization_id", SqlParam::Uuid(organization_id)),
            ])
            .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound(noun_title(T::NOUN)));
        }

        if let Some(cached) = self.cache.write().await.as_mut() {
            cached.rows.retain(|row| row.id() != id);
        }
        self.ctx
            .notifier
            .push(NotificationKind::Success, format!("{} deleted.", noun_title(T::NOUN)));
        Ok(())
    }

    pub async fn clear(&self) {
        *self.cache.write().await = None;
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, organization_id: Uuid, rows: Vec<T>) {
        *self.cache.write().await = Some(Cached { organization_id, rows });
    }
}

fn require_fields<T: FixedResource>(payload: &Map<String, Value>) -> Result<(), StoreError> {
    let missing: Vec<&str> = T::REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            matches!(payload.get(*field), None | Some(Value::Null))
                || payload.get(*field).and_then(Value::as_str).is_some_and(str::is_empty)
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

fn noun_title(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::test_support::offline_context;
    use chrono::Utc;
    use serde_json::json;

    fn blog(id: i64, title: &str, org: Uuid) -> Blog {
        Blog {
            id,
            title: title.to_string(),
            description: None,
            category: None,
            content: "body".to_string(),
            tags: None,
            slug: title.to_lowercase(),
            status: "draft".to_string(),
            organization_id: org,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn cache_is_honoured_until_force_refresh() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = BlogStore::new(ctx);
        store.seed_cache(org, vec![blog(1, "First", org)]).await;

        let rows = store.fetch_all(false).await.unwrap();
        assert_eq!(rows.len(), 1);

        // A forced refresh bypasses the cache and hits the offline backend.
        assert!(store.fetch_all(true).await.is_err());
    }

    #[tokio::test]
    async fn unknown_role_cannot_read_even_with_a_warm_cache() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::None, Some(org)).await;
        let store = BlogStore::new(ctx.clone());
        store.seed_cache(org, vec![blog(1, "First", org)]).await;

        let err = store.fetch_all(false).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied("view")));
        assert!(matches!(
            store.fetch_by_id(1).await,
            Err(StoreError::Denied("view"))
        ));
        assert_eq!(ctx.notifier.active().len(), 2);
    }

    #[tokio::test]
    async fn insert_rejects_missing_required_fields_before_any_query() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = BlogStore::new(ctx);

        let payload = json!({"title": "Hello", "content": ""});
        let err = store.insert(payload.as_object().unwrap().clone()).await.unwrap_err();
        match err {
            StoreError::Validation(message) => {
                assert!(message.contains("content"));
                assert!(message.contains("slug"));
                assert!(!message.contains("title"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn viewer_is_denied_insert_before_any_query() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Viewer, Some(org)).await;
        let store = TaskStore::new(ctx);

        let payload = json!({"title": "Do the thing"});
        let err = store.insert(payload.as_object().unwrap().clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));
    }

    #[tokio::test]
    async fn fetch_by_id_prefers_the_cache() {
        let org = Uuid::new_v4();
        let ctx = offline_context(Role::Admin, Some(org)).await;
        let store = BlogStore::new(ctx);
        store.seed_cache(org, vec![blog(1, "First", org), blog(2, "Second", org)]).await;

        assert_eq!(store.fetch_by_id(2).await.unwrap().title, "Second");
    }
}
