use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::app::AppState;

/// Paths reachable without a session.
const PUBLIC_PATHS: &[&str] = &["/", "/health", "/auth/login"];

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.starts_with("/docs")
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Route guard applied to everything outside the public allowlist. An
/// already-authenticated session passes straight through; otherwise the
/// bearer token is exchanged for a session. Failure redirects to the login
/// route rather than answering the request.
pub async fn route_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_public(request.uri().path()) {
        return next.run(request).await;
    }

    if state.ctx.session.is_authenticated().await {
        return next.run(request).await;
    }

    let token = match bearer_token(request.headers()) {
        Some(token) => token,
        None => return Redirect::to("/auth/login").into_response(),
    };

    match state.ctx.session.hydrate_with_token(&token).await {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::debug!("session hydration from token failed: {}", err);
            Redirect::to("/auth/login").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn allowlist_covers_docs_subtree() {
        assert!(is_public("/"));
        assert!(is_public("/health"));
        assert!(is_public("/auth/login"));
        assert!(is_public("/docs"));
        assert!(is_public("/docs/collections"));
        assert!(!is_public("/api/collections"));
        assert!(!is_public("/auth/logout"));
    }

    #[test]
    fn bearer_extraction_rejects_malformed_headers() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer token-123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("token-123"));
    }
}
