//! HTTP endpoint
//!
//! Serves the unified record and the per-concern views over the same
//! [`Aggregator`]. Every route answers GET only.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::aggregate::{today, AggregateError, Aggregator};
use crate::data::{OzoneCategory, PollenLevels, UnifiedWeatherRecord, UvCategory};

/// Errors that can stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal fault surfaced as a 500 response
#[derive(Debug)]
pub struct ApiError(AggregateError);

impl From<AggregateError> for ApiError {
    fn from(e: AggregateError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Body of `GET /api/pollen`
#[derive(Debug, Serialize)]
pub struct PollenResponse {
    pub region: String,
    pub date: NaiveDate,
    pub pollen: PollenLevels,
    pub estimated: bool,
}

/// Body of `GET /api/gefahrenindizes`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardResponse {
    pub region: String,
    pub date: NaiveDate,
    pub uv_index: Option<f64>,
    pub uv_category: Option<UvCategory>,
    pub ozone_micrograms_m3: Option<f64>,
    pub ozone_category: Option<OzoneCategory>,
    pub estimated: bool,
}

/// Build the router
pub fn router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/api/biowetter", get(biowetter).fallback(method_not_allowed))
        .route("/api/pollen", get(pollen).fallback(method_not_allowed))
        .route("/api/gefahrenindizes", get(hazard_indices).fallback(method_not_allowed))
        .route("/health", get(health).fallback(method_not_allowed))
        .with_state(aggregator)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(aggregator: Aggregator, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::info!("Listening on http://{}", listener.local_addr().unwrap_or(addr));

    axum::serve(listener, router(Arc::new(aggregator)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn biowetter(
    State(aggregator): State<Arc<Aggregator>>,
) -> Result<Json<UnifiedWeatherRecord>, ApiError> {
    let record = aggregator.try_build_record().await?;
    Ok(Json(record))
}

async fn pollen(State(aggregator): State<Arc<Aggregator>>) -> Result<Json<PollenResponse>, ApiError> {
    let date = today();
    let reading = aggregator.pollen_at(date).await?;

    Ok(Json(PollenResponse {
        region: aggregator.config().region.name.clone(),
        date,
        pollen: reading.levels,
        estimated: reading.estimated,
    }))
}

async fn hazard_indices(
    State(aggregator): State<Arc<Aggregator>>,
) -> Result<Json<HazardResponse>, ApiError> {
    let date = today();
    let reading = aggregator.hazards_at(date).await?;

    Ok(Json(HazardResponse {
        region: aggregator.config().region.name.clone(),
        date,
        uv_index: reading.uv_index,
        uv_category: reading.uv_category(),
        ozone_micrograms_m3: reading.ozone,
        ozone_category: reading.ozone_category(),
        estimated: reading.estimated,
    }))
}

async fn health() -> &'static str {
    "OK"
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            error: "Method not allowed".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EndpointConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_router(server: &MockServer) -> Router {
        let url = |p: &str| format!("{}{}", server.uri(), p);
        let config = Config {
            endpoints: EndpointConfig {
                weather: vec![url("/weather.json")],
                pollen: vec![url("/pollen.json")],
                uv: vec![url("/uv.json")],
                ozone: vec![url("/ozon.json")],
                hazard_indices: vec![],
            },
            ..Config::default()
        };
        router(Arc::new(Aggregator::new(config)))
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        let response = router.oneshot(request).await.expect("Router should respond");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        (status, body.to_vec())
    }

    fn json(body: &[u8]) -> Value {
        serde_json::from_slice(body).expect("Body should be JSON")
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        let (status, body) = send(test_router(&server), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_non_get_is_rejected() {
        let server = MockServer::start().await;

        for uri in ["/api/biowetter", "/api/pollen", "/api/gefahrenindizes"] {
            let (status, body) = send(test_router(&server), Method::POST, uri).await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(json(&body), serde_json::json!({"error": "Method not allowed"}));
        }
    }

    #[tokio::test]
    async fn test_biowetter_outage_still_answers_ok() {
        let server = MockServer::start().await;

        let (status, body) = send(test_router(&server), Method::GET, "/api/biowetter").await;
        assert_eq!(status, StatusCode::OK);

        let record = json(&body);
        assert_eq!(record["region"], "Wiesbaden");
        assert_eq!(record["stressLevel"], "Moderate");
        assert_eq!(record["warningNotice"], "Hinweis: Fallback-Daten werden angezeigt.");
        assert!(record["pollen"].is_null());
        assert!(record["uvIndex"].is_null());
        assert!(record["temperatureC"].is_null());
    }

    #[tokio::test]
    async fn test_biowetter_live_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"warnings": [{"Name": "Wiesbaden", "Belastung": "niedrig", "Datum": "2024-05-02"}]}"#,
            ))
            .mount(&server)
            .await;

        let (status, body) = send(test_router(&server), Method::GET, "/api/biowetter").await;
        assert_eq!(status, StatusCode::OK);

        let record = json(&body);
        assert_eq!(record["date"], "2024-05-02");
        assert_eq!(record["stressLevel"], "Low");
        assert_eq!(record["feeling"], "Sehr angenehm");
        assert!(record["warningNotice"].is_null());
        assert!(record["pollen"].is_object());
        assert_eq!(record["pollenEstimated"], true);
    }

    #[tokio::test]
    async fn test_pollen_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pollen.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"region": "Hessen", "Birke": 3, "Erle": "2"}]"#,
            ))
            .mount(&server)
            .await;

        let (status, body) = send(test_router(&server), Method::GET, "/api/pollen").await;
        assert_eq!(status, StatusCode::OK);

        let response = json(&body);
        assert_eq!(response["region"], "Wiesbaden");
        assert_eq!(response["pollen"], serde_json::json!({"Birke": 3, "Erle": 2}));
        assert_eq!(response["estimated"], false);
        assert_eq!(response["date"], today().format("%Y-%m-%d").to_string());
    }

    #[tokio::test]
    async fn test_hazard_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uv.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"UVIndex": "10.5"}"#))
            .mount(&server)
            .await;

        let (status, body) = send(test_router(&server), Method::GET, "/api/gefahrenindizes").await;
        assert_eq!(status, StatusCode::OK);

        let response = json(&body);
        assert_eq!(response["uvIndex"], 10.5);
        assert_eq!(response["uvCategory"], "ExtremeHigh");
        assert!(response["ozoneMicrogramsM3"].is_null());
        assert!(response["ozoneCategory"].is_null());
        assert_eq!(response["estimated"], false);
    }

    #[tokio::test]
    async fn test_api_error_is_500_json() {
        let response = ApiError(AggregateError::Panicked("boom".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        assert_eq!(json(&body), serde_json::json!({"error": "Pipeline panicked: boom"}));
    }
}
