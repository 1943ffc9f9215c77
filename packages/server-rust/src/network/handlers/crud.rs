//! REST endpoints over a [`CrudService`].
//!
//! `crud_router::<E, C, U, R>()` mounts:
//!
//! | method | path    | operation                    | auth |
//! |--------|---------|------------------------------|------|
//! | POST   | `/`     | create, 201 + response       | yes  |
//! | GET    | `/`     | list (`?skip=&limit=`)       | no   |
//! | GET    | `/{id}` | get by id (read-through cache) | no |
//! | PATCH  | `/{id}` | partial update               | yes  |
//! | DELETE | `/{id}` | delete, 204                  | yes  |

use std::marker::PhantomData;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use common_core::{CreateMessage, CrudError, Entity, EntityId, Page, UpdateMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiError, AppState};
use crate::auth::CurrentUser;
use crate::cache::{CacheClient, CacheEpochs};
use crate::service::CrudService;

/// Routes for one entity type, to be nested under its collection path.
pub fn crud_router<E, C, U, R>() -> Router<AppState>
where
    E: Entity,
    C: CreateMessage<E> + DeserializeOwned + 'static,
    U: UpdateMessage + DeserializeOwned + 'static,
    R: From<E> + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            get(Endpoints::<E, C, U, R>::list).post(Endpoints::<E, C, U, R>::create),
        )
        .route(
            "/{id}",
            get(Endpoints::<E, C, U, R>::get_one)
                .patch(Endpoints::<E, C, U, R>::update)
                .delete(Endpoints::<E, C, U, R>::delete),
        )
}

struct Endpoints<E, C, U, R>(PhantomData<fn(E, C, U) -> R>);

impl<E, C, U, R> Endpoints<E, C, U, R>
where
    E: Entity,
    C: CreateMessage<E> + DeserializeOwned + 'static,
    U: UpdateMessage + DeserializeOwned + 'static,
    R: From<E> + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn service(state: &AppState, path: &str) -> Result<CrudService<E, C, U, R>, ApiError> {
        state
            .factory
            .service::<E, C, U, R>()
            .await
            .map_err(|e| ApiError::new(CrudError::Store(anyhow::Error::new(e)), path))
    }

    fn cache_key(id: EntityId) -> String {
        format!("{}:{id}", E::COLLECTION)
    }

    async fn invalidate(state: &AppState, id: EntityId) {
        invalidate_key(&*state.cache, &state.cache_epochs, &Self::cache_key(id)).await;
    }

    async fn create(
        State(state): State<AppState>,
        OriginalUri(uri): OriginalUri,
        CurrentUser(user): CurrentUser,
        payload: Result<Json<C>, JsonRejection>,
    ) -> Result<(StatusCode, Json<R>), ApiError> {
        let path = uri.path();
        let Json(data) = payload.map_err(|e| ApiError::rejected(e.body_text(), path))?;
        tracing::debug!(caller = %user.id, resource = E::RESOURCE, "create requested");

        let service = Self::service(&state, path).await?;
        let created = service
            .create(data)
            .await
            .map_err(|e| ApiError::new(e, path))?;
        Ok((StatusCode::CREATED, Json(created)))
    }

    async fn list(
        State(state): State<AppState>,
        OriginalUri(uri): OriginalUri,
        query: Result<Query<Page>, QueryRejection>,
    ) -> Result<Json<Vec<R>>, ApiError> {
        let path = uri.path();
        let Query(page) = query.map_err(|e| ApiError::rejected(e.body_text(), path))?;

        let service = Self::service(&state, path).await?;
        let items = service
            .get_all(page)
            .await
            .map_err(|e| ApiError::new(e, path))?;
        Ok(Json(items))
    }

    async fn get_one(
        State(state): State<AppState>,
        OriginalUri(uri): OriginalUri,
        id: Result<Path<String>, PathRejection>,
    ) -> Result<Json<R>, ApiError> {
        let path = uri.path();
        let id = parse_id(id, path)?;
        let key = Self::cache_key(id);

        match state.cache.get_json::<R>(&key).await {
            Ok(Some(cached)) => return Ok(Json(cached)),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, %key, "cache read failed"),
        }

        let epoch = state.cache_epochs.current(&key);
        let service = Self::service(&state, path).await?;
        let found = service
            .get_by_id(id)
            .await
            .map_err(|e| ApiError::new(e, path))?;

        if state.cache_epochs.current(&key) == epoch {
            if let Err(e) = state
                .cache
                .set_json(&key, &found, Some(state.cache_ttl))
                .await
            {
                tracing::warn!(error = %e, %key, "cache write failed");
            }
            // A write that landed between the check and the fill already
            // deleted the key; drop what was just stored.
            if state.cache_epochs.current(&key) != epoch {
                if let Err(e) = state.cache.delete(&key).await {
                    tracing::warn!(error = %e, %key, "cache invalidation failed");
                }
            }
        }
        Ok(Json(found))
    }

    async fn update(
        State(state): State<AppState>,
        OriginalUri(uri): OriginalUri,
        CurrentUser(user): CurrentUser,
        id: Result<Path<String>, PathRejection>,
        payload: Result<Json<U>, JsonRejection>,
    ) -> Result<Json<R>, ApiError> {
        let path = uri.path();
        let id = parse_id(id, path)?;
        let Json(data) = payload.map_err(|e| ApiError::rejected(e.body_text(), path))?;
        tracing::debug!(caller = %user.id, resource = E::RESOURCE, %id, "update requested");

        let service = Self::service(&state, path).await?;
        let result = service.update(id, data).await;
        Self::invalidate(&state, id).await;
        result.map(Json).map_err(|e| ApiError::new(e, path))
    }

    async fn delete(
        State(state): State<AppState>,
        OriginalUri(uri): OriginalUri,
        CurrentUser(user): CurrentUser,
        id: Result<Path<String>, PathRejection>,
    ) -> Result<StatusCode, ApiError> {
        let path = uri.path();
        let id = parse_id(id, path)?;
        tracing::debug!(caller = %user.id, resource = E::RESOURCE, %id, "delete requested");

        let service = Self::service(&state, path).await?;
        let result = service.delete(id).await;
        Self::invalidate(&state, id).await;
        result
            .map(|_| StatusCode::NO_CONTENT)
            .map_err(|e| ApiError::new(e, path))
    }
}

/// Drops `key` from the cache after a write.
///
/// The epoch moves first so that lookups already in flight skip their fill.
pub(crate) async fn invalidate_key(cache: &dyn CacheClient, epochs: &CacheEpochs, key: &str) {
    epochs.bump(key);
    if let Err(e) = cache.delete(key).await {
        tracing::warn!(error = %e, %key, "cache invalidation failed");
    }
}

fn parse_id(id: Result<Path<String>, PathRejection>, path: &str) -> Result<EntityId, ApiError> {
    let Path(raw) = id.map_err(|e| ApiError::rejected(e.body_text(), path))?;
    raw.parse::<EntityId>().map_err(|e| ApiError::new(e, path))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::network::handlers::test_state;
    use crate::service::RepositoryFactory;
    use crate::test_support::{CreateWidget, UpdateWidget, Widget, WidgetResponse};

    async fn app() -> (Router, String) {
        let (state, _db) = test_state();
        state.factory.register::<Widget>().await.unwrap();
        let token = state.tokens.issue("user-1", &["editor"], None).unwrap();
        let router = Router::new()
            .nest(
                "/widgets",
                crud_router::<Widget, CreateWidget, UpdateWidget, WidgetResponse>(),
            )
            .with_state(state);
        (router, token)
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn full_lifecycle_over_http() {
        let (router, token) = app().await;

        let (status, created) = call(
            &router,
            "POST",
            "/widgets",
            Some(&token),
            Some(json!({"name": "Widget"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Widget");
        assert!(created["updated_at"].is_null());
        let id = created["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(&router, "GET", &format!("/widgets/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, updated) = call(
            &router,
            "PATCH",
            &format!("/widgets/{id}"),
            Some(&token),
            Some(json!({"name": "Widget-2"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Widget-2");
        assert_eq!(updated["created_at"], created["created_at"]);

        // The cached lookup was invalidated by the update.
        let (_, fetched) = call(&router, "GET", &format!("/widgets/{id}"), None, None).await;
        assert_eq!(fetched["name"], "Widget-2");

        let (status, _) = call(&router, "DELETE", &format!("/widgets/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&router, "GET", &format!("/widgets/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFoundError");
        assert_eq!(body["message"], format!("Widget {id} not found"));
        assert_eq!(body["path"], format!("/widgets/{id}"));
    }

    #[tokio::test]
    async fn mutations_require_a_bearer_token() {
        let (router, _token) = app().await;
        let (status, body) = call(
            &router,
            "POST",
            "/widgets",
            None,
            Some(json!({"name": "Widget"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UnauthorizedError");

        let (status, body) = call(
            &router,
            "POST",
            "/widgets",
            Some("garbage"),
            Some(json!({"name": "Widget"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].as_str().unwrap().starts_with("Invalid token: "));
    }

    #[tokio::test]
    async fn malformed_body_is_unprocessable() {
        let (router, token) = app().await;
        let (status, body) = call(
            &router,
            "POST",
            "/widgets",
            Some(&token),
            Some(json!({"quantity": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["path"], "/widgets");
    }

    #[tokio::test]
    async fn invalid_id_is_bad_request() {
        let (router, _token) = app().await;
        let (status, body) = call(&router, "GET", "/widgets/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");
    }

    #[tokio::test]
    async fn duplicate_unique_field_is_bad_request() {
        let (router, token) = app().await;
        let widget = json!({"name": "A", "sku": "sku-1"});
        let (status, _) = call(&router, "POST", "/widgets", Some(&token), Some(widget.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&router, "POST", "/widgets", Some(&token), Some(widget)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Database constraint violation: "));
    }

    #[tokio::test]
    async fn list_honors_skip_and_limit() {
        let (router, token) = app().await;
        for i in 0..5 {
            call(
                &router,
                "POST",
                "/widgets",
                Some(&token),
                Some(json!({"name": format!("w{i}")})),
            )
            .await;
        }

        let (status, page) = call(&router, "GET", "/widgets?skip=3&limit=10", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page.as_array().unwrap().len(), 2);

        let (status, _) = call(&router, "GET", "/widgets?limit=0", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&router, "GET", "/widgets?skip=-1", None, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn patch_with_null_clears_only_that_field() {
        let (router, token) = app().await;
        let (_, created) = call(
            &router,
            "POST",
            "/widgets",
            Some(&token),
            Some(json!({"name": "A", "sku": "s-1", "description": "d"})),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, updated) = call(
            &router,
            "PATCH",
            &format!("/widgets/{id}"),
            Some(&token),
            Some(json!({"description": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(updated["description"].is_null());
        assert_eq!(updated["sku"], "s-1");
        assert_eq!(updated["name"], "A");
    }

    #[tokio::test]
    async fn patch_unknown_id_is_not_found() {
        let (router, token) = app().await;
        let id = EntityId::new_v4();
        let (status, body) = call(
            &router,
            "PATCH",
            &format!("/widgets/{id}"),
            Some(&token),
            Some(json!({"name": "B"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains(&id.to_string()));
    }

    /// Cache whose first fill is preceded by a PATCH of the same widget,
    /// landing between the lookup's store read and its cache write.
    struct RacingCache {
        inner: MemoryCache,
        factory: RepositoryFactory,
        epochs: Arc<CacheEpochs>,
        raced: AtomicBool,
    }

    #[async_trait::async_trait]
    impl CacheClient for RacingCache {
        async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let id: EntityId = key.strip_prefix("widgets:").unwrap().parse().unwrap();
                let service = self
                    .factory
                    .service::<Widget, CreateWidget, UpdateWidget, WidgetResponse>()
                    .await
                    .unwrap();
                service
                    .update(
                        id,
                        UpdateWidget {
                            name: Some("NEW".to_string()),
                            ..UpdateWidget::default()
                        },
                    )
                    .await
                    .unwrap();
                invalidate_key(&self.inner, &self.epochs, key).await;
            }
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> anyhow::Result<bool> {
            self.inner.exists(key).await
        }
    }

    #[tokio::test]
    async fn lookup_racing_an_update_does_not_cache_the_old_value() {
        let (mut state, _db) = test_state();
        state.factory.register::<Widget>().await.unwrap();
        state.cache = Arc::new(RacingCache {
            inner: MemoryCache::default(),
            factory: state.factory.clone(),
            epochs: Arc::clone(&state.cache_epochs),
            raced: AtomicBool::new(false),
        });
        let token = state.tokens.issue("user-1", &["editor"], None).unwrap();
        let router = Router::new()
            .nest(
                "/widgets",
                crud_router::<Widget, CreateWidget, UpdateWidget, WidgetResponse>(),
            )
            .with_state(state);

        let (_, created) = call(
            &router,
            "POST",
            "/widgets",
            Some(&token),
            Some(json!({"name": "OLD"})),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        // This lookup read "OLD" before the update committed.
        let (status, first) = call(&router, "GET", &format!("/widgets/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["name"], "OLD");

        let (_, second) = call(&router, "GET", &format!("/widgets/{id}"), None, None).await;
        assert_eq!(second["name"], "NEW");
    }
}
