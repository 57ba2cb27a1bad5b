//! Mailing-list relay endpoint.

use crate::relay;
use crate::server::ZapRelay;
use crate::settings::RelaySettings;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::collections::HashMap;
use std::sync::Arc;

/// Proxy a subscription request through the configured relay leg.
///
/// Registered for GET and POST: the shop site links subscribers here
/// with `cid` (and optionally `resub`) in the query string, but a form
/// post works too. Body values win over query values. Responses are
/// served as HTML since that is what the destination sends back for a
/// person to read.
pub async fn mail_handler(
    Extension(relay): Extension<Arc<ZapRelay>>,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let mut params = query;
    params.extend(zap_telemetry::decode_form(&body));

    let settings = match RelaySettings::load(relay.storage()).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("failed to load relay settings: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response = relay::handle_mail(&relay, &settings, &params).await;
    let status = StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "text/html")],
        response.body,
    )
        .into_response()
}
