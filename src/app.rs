use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::config;
use crate::database::models::{Blog, Contact, Lead, Task};
use crate::handlers::{protected, public};
use crate::identity::{IdentityProvider, PgIdentityProvider};
use crate::middleware::route_guard;
use crate::notify::Notifier;
use crate::session::SessionState;
use crate::store::{
    AppContext, BlogStore, CollectionStore, ContactStore, ContentStore, FieldStore, LeadStore,
    OrganizationStore, ResourceStore, TaskStore, UserStore,
};

/// Everything the handlers reach for: the shared context plus one store per
/// resource family.
#[derive(Clone)]
pub struct AppState {
    pub ctx: AppContext,
    pub collections: Arc<CollectionStore>,
    pub fields: Arc<FieldStore>,
    pub content: Arc<ContentStore>,
    pub blogs: Arc<BlogStore>,
    pub leads: Arc<LeadStore>,
    pub contacts: Arc<ContactStore>,
    pub tasks: Arc<TaskStore>,
    pub users: Arc<UserStore>,
    pub organizations: Arc<OrganizationStore>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(PgIdentityProvider::new(pool.clone()));
        Self::with_identity(pool, identity)
    }

    pub fn with_identity(pool: PgPool, identity: Arc<dyn IdentityProvider>) -> Self {
        let notifier = Arc::new(Notifier::new());
        let session =
            Arc::new(SessionState::new(pool.clone(), identity, notifier.clone()));
        let ctx = AppContext::new(pool, session, notifier);

        Self {
            collections: Arc::new(CollectionStore::new(ctx.clone())),
            fields: Arc::new(FieldStore::new(ctx.clone())),
            content: Arc::new(ContentStore::new(ctx.clone())),
            blogs: Arc::new(BlogStore::new(ctx.clone())),
            leads: Arc::new(LeadStore::new(ctx.clone())),
            contacts: Arc::new(ContactStore::new(ctx.clone())),
            tasks: Arc::new(TaskStore::new(ctx.clone())),
            users: Arc::new(UserStore::new(ctx.clone())),
            organizations: Arc::new(OrganizationStore::new(ctx.clone())),
            ctx,
        }
    }

    /// Drop every cached row, for logout and organization switches.
    pub async fn clear_caches(&self) {
        self.collections.clear().await;
        self.fields.clear().await;
        self.content.reset().await;
        self.blogs.clear().await;
        self.leads.clear().await;
        self.contacts.clear().await;
        self.tasks.clear().await;
        self.users.clear().await;
        self.organizations.clear().await;
    }
}

/// Store lookup by resource type, so the flat-resource handlers stay generic.
pub trait HasResourceStore<T: crate::database::models::FixedResource> {
    fn resource_store(&self) -> &ResourceStore<T>;
}

impl HasResourceStore<Blog> for AppState {
    fn resource_store(&self) -> &ResourceStore<Blog> {
        &self.blogs
    }
}

impl HasResourceStore<Lead> for AppState {
    fn resource_store(&self) -> &ResourceStore<Lead> {
        &self.leads
    }
}

impl HasResourceStore<Contact> for AppState {
    fn resource_store(&self) -> &ResourceStore<Contact> {
        &self.contacts
    }
}

impl HasResourceStore<Task> for AppState {
    fn resource_store(&self) -> &ResourceStore<Task> {
        &self.tasks
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(public::status::root))
        .route("/health", get(public::status::health))
        .route("/auth/login", post(public::auth::login))
        .route(
            "/auth/session",
            get(protected::session::get).delete(protected::session::logout),
        )
        .merge(collection_routes())
        .merge(resource_routes())
        .merge(account_routes())
        .layer(from_fn_with_state(state.clone(), route_guard))
        .layer(cors_layer())
        .layer(DefaultBodyLimit::max(config().api.max_request_size_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cross-origin policy from configuration: disabled entirely, open to any
/// origin when the list contains "*", or restricted to the listed origins.
fn cors_layer() -> CorsLayer {
    let security = &config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parse_cors_origins(&security.cors_origins)))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn parse_cors_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect()
}

fn collection_routes() -> Router<AppState> {
    use protected::{collections, content, fields};

    Router::new()
        .route("/api/collections", get(collections::list).post(collections::create))
        // Static segment registered ahead of the :slug matcher.
        .route("/api/collections/positions", put(collections::reposition))
        .route(
            "/api/collections/:slug",
            get(collections::get).put(collections::update).delete(collections::delete),
        )
        .route(
            "/api/collections/:slug/visibility",
            patch(collections::toggle_visibility),
        )
        .route(
            "/api/collections/:slug/fields",
            get(fields::list).post(fields::create).put(fields::update),
        )
        .route(
            "/api/collections/:slug/content",
            get(content::list).post(content::create),
        )
        .route(
            "/api/collections/:slug/content/:id",
            get(content::get).put(content::update),
        )
}

fn resource_routes() -> Router<AppState> {
    use protected::resources;

    fn routes_for<T>(base: &str, router: Router<AppState>) -> Router<AppState>
    where
        T: crate::database::models::FixedResource,
        AppState: HasResourceStore<T>,
    {
        router
            .route(base, get(resources::list::<T>).post(resources::create::<T>))
            .route(
                &format!("{}/:id", base),
                get(resources::get::<T>)
                    .put(resources::update::<T>)
                    .delete(resources::delete::<T>),
            )
    }

    let mut router = Router::new();
    router = routes_for::<Blog>("/api/blogs", router);
    router = routes_for::<Lead>("/api/leads", router);
    router = routes_for::<Contact>("/api/contacts", router);
    router = routes_for::<Task>("/api/tasks", router);
    router
}

fn account_routes() -> Router<AppState> {
    use protected::{notifications, organizations, profile, users};

    Router::new()
        .route(
            "/api/organizations",
            get(organizations::list).post(organizations::create),
        )
        .route("/api/organizations/:id", get(organizations::get))
        .route("/api/users", get(users::list))
        .route("/api/users/:id", get(users::get))
        .route("/api/profile", put(profile::save))
        .route("/api/profile/theme", post(profile::toggle_theme))
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/:id", delete(notifications::dismiss))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cors_origins_are_dropped() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "not a header\nvalue".to_string(),
            "https://app.example.com".to_string(),
        ];
        let parsed = parse_cors_origins(&origins);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], "http://localhost:3000");
    }
}
