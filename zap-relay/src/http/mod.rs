//! HTTP endpoints for zap-relay.
//!
//! One router serves the station ingress route, the admin dump and
//! summary, the mail relay, health checks and metrics. Station routes
//! are open (the station id check happens in the relay pipeline); the
//! admin routes want the configured bearer token.

pub mod health;
pub mod mail;
mod metrics;
pub mod zapdata;

use crate::server::ZapRelay;
use axum::routing::get;
use axum::{Extension, Router};
use std::sync::Arc;

pub use health::HealthStatus;

/// Build the HTTP router with all endpoints.
pub fn build_router(relay: Arc<ZapRelay>) -> Router {
    Router::new()
        .route(
            "/api/v1/zapdata",
            get(zapdata::dump_handler).post(zapdata::ingress_handler),
        )
        .route("/api/v1/zapdata/summary", get(zapdata::summary_handler))
        .route(
            "/api/v1/mail",
            get(mail::mail_handler).post(mail::mail_handler),
        )
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(Extension(relay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::settings;
    use crate::storage::{NewZapRecord, RecordStore, SqliteStorage};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    const ADMIN_TOKEN: &str = "test-admin-token";

    async fn test_relay() -> Arc<ZapRelay> {
        let mut config = Config::default();
        config.server.admin_token = Some(ADMIN_TOKEN.to_string());
        let storage = SqliteStorage::in_memory().await.unwrap();
        Arc::new(ZapRelay::new(config, storage).unwrap())
    }

    fn post_report(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/zapdata")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin_get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn ingress_relays_and_returns_primary_response() {
        let relay = test_relay().await;
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/hook")
            .match_body("statusEventCount=0&norelay")
            .with_status(200)
            .with_body("ACK")
            .create_async()
            .await;
        relay
            .storage()
            .set_setting(settings::PRIMARY_URL, &format!("{}/hook", server.url()))
            .await
            .unwrap();

        let app = build_router(relay);
        let response = app.oneshot(post_report("statusEventCount=0")).await.unwrap();

        hook.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ACK");
    }

    #[tokio::test]
    async fn ingress_short_circuits_norelay_reports() {
        let relay = test_relay().await;
        let app = build_router(relay.clone());

        let response = app.oneshot(post_report("a=1&norelay")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            "ignoring request with norelay param\n"
        );
        let rows = relay.storage().recent_records(None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn ingress_rejects_wrong_station_id() {
        let relay = test_relay().await;
        relay
            .storage()
            .set_setting(settings::REQUIRED_STATION_ID, "main-rack")
            .await
            .unwrap();

        let app = build_router(relay.clone());
        let response = app
            .oneshot(post_report("StationId=other&statusEventCount=0"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "incorrect station id");
        assert!(relay.storage().recent_records(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dump_requires_the_admin_token() {
        let relay = test_relay().await;
        let app = build_router(relay);

        let bare = Request::builder()
            .uri("/api/v1/zapdata")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(bare).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/api/v1/zapdata")
            .header("authorization", "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_endpoints_stay_locked_without_a_configured_token() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let relay = Arc::new(ZapRelay::new(Config::default(), storage).unwrap());
        let app = build_router(relay);

        let request = Request::builder()
            .uri("/api/v1/zapdata")
            .header("authorization", "Bearer anything")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dump_lists_records_newest_first() {
        let relay = test_relay().await;
        for i in 1..=3 {
            relay
                .storage()
                .insert_record(NewZapRecord {
                    request_time: format!("2025-06-01 08:0{i}:00"),
                    request_body: format!("n={i}"),
                    ..NewZapRecord::default()
                })
                .await
                .unwrap();
        }

        let app = build_router(relay);
        let response = app
            .oneshot(admin_get("/api/v1/zapdata?max_count=2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        let first = body.find("\"n=3\"").expect("newest record in dump");
        let second = body.find("\"n=2\"").expect("second record in dump");
        assert!(first < second);
        assert!(!body.contains("\"n=1\""));
    }

    #[tokio::test]
    async fn summary_returns_parsed_event_times() {
        let relay = test_relay().await;
        relay
            .storage()
            .insert_record(NewZapRecord {
                request_time: "2023-11-14 15:20:00".to_string(),
                request_body: "statusEventCount=1&DateTime0=1700000000&BatteryVoltage0=3.99"
                    .to_string(),
                ..NewZapRecord::default()
            })
            .await
            .unwrap();

        let app = build_router(relay);
        let response = app
            .oneshot(admin_get("/api/v1/zapdata/summary"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let rows: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(rows[0]["first_event"], "2023-11-14 15:13:20");
        assert_eq!(rows[0]["summary"]["battery_voltages"][0], 3.99);
    }

    #[tokio::test]
    async fn mail_route_reports_when_not_configured() {
        let relay = test_relay().await;
        let app = build_router(relay);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/mail?cid=abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            "subscription relay not configured"
        );
    }

    #[tokio::test]
    async fn mail_route_relays_query_parameters() {
        let relay = test_relay().await;
        let mut server = mockito::Server::new_async().await;
        let hook = server
            .mock("POST", "/mail")
            .match_body("cid=abc123&resub=1")
            .with_status(200)
            .with_body("<p>Thanks!</p>")
            .create_async()
            .await;
        relay
            .storage()
            .set_setting(settings::PRIMARY_URL, &format!("{}/mail", server.url()))
            .await
            .unwrap();
        relay
            .storage()
            .set_setting(settings::MAIL_RELAY, "primary")
            .await
            .unwrap();

        let app = build_router(relay);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/mail?cid=abc123&resub=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        hook.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("text/html")
        );
        assert_eq!(body_string(response).await, "<p>Thanks!</p>");
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let relay = test_relay().await;
        let app = build_router(relay);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_counters() {
        let relay = test_relay().await;
        let app = build_router(relay);

        let report = app
            .clone()
            .oneshot(post_report("a=1&norelay"))
            .await
            .unwrap();
        assert_eq!(report.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("zap_relay_norelay_total 1"));
        assert!(body.contains("zap_relay_records 1"));
    }
}
