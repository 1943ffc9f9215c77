//! Health, liveness, and readiness endpoint handlers.
//!
//! These handlers expose server health information for orchestrators
//! (Kubernetes, load balancers) and operational monitoring.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;

/// Returns detailed health information as JSON.
///
/// Always returns 200 -- the `status` field in the response body reports
/// whether the store is reachable.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store_ok = match state.factory.database().ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "store ping failed");
            false
        }
    };
    let uptime_secs = state.start_time.elapsed().as_secs();

    Json(json!({
        "status": if store_ok { "healthy" } else { "degraded" },
        "service": &*state.service_name,
        "store": if store_ok { "ok" } else { "unavailable" },
        "uptime_secs": uptime_secs,
    }))
}

/// Kubernetes liveness probe -- always returns 200 OK.
///
/// The liveness probe only checks whether the process is running and
/// responsive. It intentionally does not check downstream dependencies,
/// because a failed liveness probe triggers a pod restart.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe -- returns 200 when the store answers a ping,
/// 503 otherwise.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.factory.database().ping().await.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::test_state;
    use crate::storage::MemoryDatabase;
    use crate::traits::Database;

    #[tokio::test]
    async fn health_handler_returns_json_with_all_fields() {
        let (state, _db) = test_state();

        let response = health_handler(State(state)).await;
        let json = response.0;

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "test-service");
        assert_eq!(json["store"], "ok");
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_handler_reports_degraded_store() {
        let (state, db) = test_state();
        db.close().await.unwrap();

        let response = health_handler(State(state)).await;
        assert_eq!(response.0["status"], "degraded");
        assert_eq!(response.0["store"], "unavailable");
    }

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        let status = liveness_handler().await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_handler_returns_200_when_store_answers() {
        let (state, _db) = test_state();
        let status = readiness_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_handler_returns_503_when_store_is_closed() {
        let (state, db): (AppState, MemoryDatabase) = test_state();
        db.close().await.unwrap();

        let status = readiness_handler(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
