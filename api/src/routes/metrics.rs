//! Prometheus exposition endpoint.

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

/// Content type of the Prometheus text exposition format.
const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Creates the exposition routes.
pub fn metrics_routes(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .with_state(state)
}

/// Renders the current value of every registered metric.
async fn scrape(State(state): State<AppState>) -> impl IntoResponse {
    match state.render() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {e}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use prometheus::{IntGauge, Registry};
    use shared::config::Target;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(Registry::new(), Target::new("grafana", "loki"))
    }

    async fn get_metrics(state: AppState) -> (StatusCode, String, String) {
        let response = metrics_routes(state)
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_scrape_returns_text_format() {
        let state = state();
        let gauge = IntGauge::new("rate_limit_remaining", "Remaining calls").unwrap();
        state.registry().register(Box::new(gauge.clone())).unwrap();
        gauge.set(4999);

        let (status, content_type, body) = get_metrics(state).await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains("rate_limit_remaining 4999"));
    }

    #[tokio::test]
    async fn test_scrape_empty_registry() {
        let (status, _, body) = get_metrics(state()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }
}
