//! `/health` and `/metrics` handlers (SPEC_FULL.md §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use serde::Serialize;

use crate::state::AppState;

const ERROR_WINDOW_MINUTES: i64 = 5;
const ERROR_THRESHOLD: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum OverallStatus {
    Ok,
    Degraded,
    Critical,
}

#[derive(Debug, Serialize)]
struct HealthDetails {
    circuit_breaker: &'static str,
    db: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: OverallStatus,
    details: HealthDetails,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();

    let (db_status, db_ok) = match state.store.daily_cost(now - Duration::days(1), now).await {
        Ok(_) => ("OK".to_string(), true),
        Err(e) => (e.to_string(), false),
    };

    let recent_errors = state
        .store
        .recent_error_count(now - Duration::minutes(ERROR_WINDOW_MINUTES))
        .await
        .unwrap_or(0);
    let circuit_open = recent_errors >= ERROR_THRESHOLD;
    let circuit_breaker = if circuit_open { "OPEN" } else { "CLOSED" };

    let status = if !db_ok {
        OverallStatus::Critical
    } else if circuit_open {
        OverallStatus::Degraded
    } else {
        OverallStatus::Ok
    };

    let http_status = match status {
        OverallStatus::Ok => StatusCode::OK,
        OverallStatus::Degraded => StatusCode::OK,
        OverallStatus::Critical => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            details: HealthDetails {
                circuit_breaker,
                db: db_status,
            },
        }),
    )
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let (day_start, day_end) = vestnik_common::time::day_bounds_utc(now, state.timezone);

    let daily_cost = state.store.daily_cost(day_start, day_end).await.unwrap_or(0.0);
    let recent_errors = state
        .store
        .recent_error_count(now - Duration::minutes(ERROR_WINDOW_MINUTES))
        .await
        .unwrap_or(0);
    let circuit_open = if recent_errors >= ERROR_THRESHOLD { 1 } else { 0 };

    let body = format!(
        "# HELP vestnik_llm_daily_cost_usd Total LLM spend for the current application day.\n\
         # TYPE vestnik_llm_daily_cost_usd gauge\n\
         vestnik_llm_daily_cost_usd {daily_cost}\n\
         # HELP vestnik_llm_recent_errors Non-ok LLM usage entries in the trailing {ERROR_WINDOW_MINUTES} minutes.\n\
         # TYPE vestnik_llm_recent_errors gauge\n\
         vestnik_llm_recent_errors {recent_errors}\n\
         # HELP vestnik_circuit_breaker_open Whether the LLM circuit breaker is currently open (1) or closed (0).\n\
         # TYPE vestnik_circuit_breaker_open gauge\n\
         vestnik_circuit_breaker_open {circuit_open}\n"
    );

    ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;
    use vestnik_store::Store;

    async fn test_state() -> AppState {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        AppState::new(store, chrono_tz::Europe::Moscow)
    }

    #[tokio::test]
    async fn health_reports_ok_with_no_usage_history() {
        let state = test_state().await;
        let router = crate::router::build_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "OK");
        assert_eq!(parsed["details"]["circuit_breaker"], "CLOSED");
        assert_eq!(parsed["details"]["db"], "OK");
    }

    #[tokio::test]
    async fn health_degrades_once_error_threshold_is_crossed() {
        let state = test_state().await;
        for _ in 0..ERROR_THRESHOLD {
            state
                .store
                .record_usage(vestnik_store::usage::NewUsageEntry {
                    at: Utc::now(),
                    provider: "openai".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    prompt_tokens: 0,
                    completion_tokens: 0,
                    cost: 0.0,
                    latency_ms: 0,
                    status: "error".to_string(),
                    error_category: Some("LLM_API_ERROR".to_string()),
                    context_tag: None,
                })
                .await
                .unwrap();
        }

        let router = crate::router::build_router(state);
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "DEGRADED");
        assert_eq!(parsed["details"]["circuit_breaker"], "OPEN");
    }

    #[tokio::test]
    async fn metrics_body_contains_expected_gauge_names() {
        let state = test_state().await;
        let router = crate::router::build_router(state);
        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("vestnik_llm_daily_cost_usd"));
        assert!(text.contains("vestnik_llm_recent_errors"));
        assert!(text.contains("vestnik_circuit_breaker_open"));
    }
}
