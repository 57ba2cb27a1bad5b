//! Station ingress and admin data endpoints.

use crate::relay;
use crate::server::ZapRelay;
use crate::settings::RelaySettings;
use crate::storage::ZapRecord;
use axum::extract::Query;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use zap_telemetry::ZapSummary;

/// Rows shown by the summary endpoint when no cap is given.
const DEFAULT_SUMMARY_ROWS: i64 = 10;

/// Query parameters for the dump and summary endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct DumpParams {
    /// Row cap. Kept as text so hand-edited URLs degrade instead of 400ing.
    max_count: Option<String>,
    /// Only return rows older than this id, for paging.
    before_id: Option<String>,
}

impl DumpParams {
    fn limit(&self) -> Option<i64> {
        parse_positive(self.max_count.as_deref())
    }

    fn before_id(&self) -> Option<i64> {
        parse_positive(self.before_id.as_deref())
    }
}

fn parse_positive(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.parse().ok()).filter(|n| *n > 0)
}

/// Station report ingress.
///
/// The response body and status mirror the primary destination's
/// result, so the box can retry on failure.
pub async fn ingress_handler(
    Extension(relay): Extension<Arc<ZapRelay>>,
    body: String,
) -> Response {
    let settings = match RelaySettings::load(relay.storage()).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("failed to load relay settings: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let response = relay::handle_zapdata(&relay, &settings, &body).await;
    let status = StatusCode::from_u16(response.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.body).into_response()
}

/// Raw dump of recent exchanges, newest first.
///
/// Emits one pretty-printed JSON object per record, not a JSON array;
/// the output is meant for eyeballing in a browser tab.
pub async fn dump_handler(
    Extension(relay): Extension<Arc<ZapRelay>>,
    Query(params): Query<DumpParams>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    authorize_admin(&relay, &headers)?;

    let records = relay::list_recent(&relay, params.limit(), params.before_id())
        .await
        .map_err(|e| {
            tracing::error!("failed to read records: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut out = String::new();
    for record in &records {
        match serde_json::to_string_pretty(record) {
            Ok(json) => {
                out.push_str(&json);
                out.push('\n');
            }
            Err(e) => tracing::error!(id = record.id, "failed to encode record: {e}"),
        }
    }

    Ok(out.into_response())
}

/// One row of the admin summary.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    /// Record id.
    pub id: i64,
    /// Arrival time in the station's zone.
    pub request_time: String,
    /// Earliest event time in the report, when any parsed.
    pub first_event: Option<String>,
    /// Latest event time in the report, when any parsed.
    pub last_event: Option<String>,
    /// Parsed telemetry detail.
    pub summary: ZapSummary,
}

impl RecordSummary {
    fn build(record: &ZapRecord, tz: Tz) -> Self {
        let summary = zap_telemetry::summarize(&record.request_body, tz);
        let event_times = summary
            .event_times
            .iter()
            .chain(summary.bike_event_times.iter());
        let first_event = event_times.clone().min().cloned();
        let last_event = event_times.max().cloned();

        Self {
            id: record.id,
            request_time: record.request_time.clone(),
            first_event,
            last_event,
            summary,
        }
    }
}

/// Per-record telemetry summaries for the admin view.
///
/// Defaults to the ten most recent reports.
pub async fn summary_handler(
    Extension(relay): Extension<Arc<ZapRelay>>,
    Query(params): Query<DumpParams>,
    headers: HeaderMap,
) -> Result<Json<Vec<RecordSummary>>, StatusCode> {
    authorize_admin(&relay, &headers)?;

    let limit = params.limit().or(Some(DEFAULT_SUMMARY_ROWS));
    let records = relay::list_recent(&relay, limit, params.before_id())
        .await
        .map_err(|e| {
            tracing::error!("failed to read records: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let timezone = relay.timezone();
    let summaries = records
        .iter()
        .map(|record| RecordSummary::build(record, timezone))
        .collect();

    Ok(Json(summaries))
}

/// Check the bearer token on an admin request.
///
/// With no `admin_token` configured the admin endpoints stay locked.
pub(crate) fn authorize_admin(relay: &ZapRelay, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(expected) = relay.config().server.admin_token.as_deref() else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
