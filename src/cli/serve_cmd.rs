use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::core::config::{AppConfig, CheckOverrides};
use crate::core::pipeline;

#[derive(Clone)]
struct ServeState {
    config: Arc<AppConfig>,
    provider: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckQuery {
    provider: Option<String>,
}

/// One check per request. 200 with the result on success, 500 with
/// `{"error": ...}` otherwise.
async fn handle_check(
    State(state): State<ServeState>,
    Query(query): Query<CheckQuery>,
) -> impl IntoResponse {
    let provider = query.provider.or_else(|| state.provider.clone());
    let result =
        pipeline::check_selected(&state.config, provider.as_deref(), CheckOverrides::default())
            .await;

    if result.success {
        (StatusCode::OK, Json(serde_json::json!(result)))
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": result.error })),
        )
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

fn router(config: AppConfig, provider: Option<String>) -> Router {
    let state = ServeState {
        config: Arc::new(config),
        provider,
    };
    Router::new()
        .route("/check", get(handle_check).post(handle_check))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Serve checks over HTTP until the process is stopped.
pub async fn run(bind: &str, config: AppConfig, provider: Option<String>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %listener.local_addr()?, "Cost check server listening");
    axum::serve(listener, router(config, provider))
        .await
        .context("HTTP server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    async fn spawn(config: AppConfig, provider: Option<String>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(config, provider)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let base = spawn(AppConfig::default(), None).await;
        let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    #[serial]
    async fn failed_check_is_500_with_error() {
        std::env::remove_var("COSTWATCH_PROVIDER");
        std::env::remove_var("COSTWATCH_SECRET_PROJECT");
        std::env::remove_var("SLACK_WEBHOOK_URL");
        let base = spawn(AppConfig::default(), None).await;

        let resp = reqwest::Client::new()
            .post(format!("{}/check", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("No provider selected"));
    }

    #[tokio::test]
    #[serial]
    async fn query_provider_overrides_default() {
        std::env::remove_var("COSTWATCH_SECRET_PROJECT");
        std::env::remove_var("SLACK_WEBHOOK_URL");
        let base = spawn(AppConfig::default(), Some("aws".into())).await;

        let resp = reqwest::get(format!("{}/check?provider=nowhere", base))
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("nowhere"));
    }
}
