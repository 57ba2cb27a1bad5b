//! Relay pipeline for station reports.
//!
//! One invocation per inbound request, terminal at the first matching
//! exit: authenticate, short-circuit relayed echoes, fan out to the
//! configured destinations, record the exchange, sweep expired rows.
//! No step here raises; every outcome is a status/body pair.

use crate::error::StorageError;
use crate::forward::ForwardReply;
use crate::server::ZapRelay;
use crate::settings::{MailRelay, RelaySettings};
use crate::storage::{NewZapRecord, RecordStore, ZapRecord};
use std::collections::HashMap;
use std::sync::atomic::Ordering;

/// Days of exchange history kept by the retention sweep.
pub const RETENTION_DAYS: i64 = 365;

/// Marker appended to relayed bodies so echoes are recorded, not re-relayed.
pub const NORELAY_PARAM: &str = "norelay";

/// Status and body for the device-facing response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZapResponse {
    /// HTTP status code.
    pub code: u16,
    /// Response body.
    pub body: String,
}

impl ZapResponse {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            code: 200,
            body: body.into(),
        }
    }
}

/// Process one inbound station report.
///
/// The returned response is exactly what the device sees. When a
/// primary destination is configured its result is proxied back
/// unchanged, so the box's own status-code-driven retry logic works
/// end to end; otherwise the device gets an empty success.
///
/// The best-effort destination is recorded but never shapes the
/// response, and storage failures are logged without changing a
/// response that was already decided.
pub async fn handle_zapdata(
    relay: &ZapRelay,
    settings: &RelaySettings,
    raw_body: &str,
) -> ZapResponse {
    let metrics = relay.metrics();
    metrics.zapdata_requests_total.fetch_add(1, Ordering::Relaxed);

    let fields = zap_telemetry::decode_form(raw_body);

    if let Some(required) = settings.required_station_id.as_deref() {
        let station = fields.get(relay.config().device.station_field.as_str());
        if station.map(String::as_str) != Some(required) {
            metrics.auth_failures_total.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(?station, "rejecting report with missing or wrong station id");
            return ZapResponse {
                code: 400,
                body: "incorrect station id".to_string(),
            };
        }
    }

    let mut record = NewZapRecord {
        request_time: relay.current_request_time(),
        request_body: raw_body.to_string(),
        ..NewZapRecord::default()
    };

    // Record but don't relay echoes of our own fan-out.
    if fields.contains_key(NORELAY_PARAM) {
        metrics.norelay_total.fetch_add(1, Ordering::Relaxed);
        insert_record(relay, record).await;
        return ZapResponse::ok("ignoring request with norelay param\n");
    }

    metrics.relayed_total.fetch_add(1, Ordering::Relaxed);
    let relay_body = format!("{raw_body}&{NORELAY_PARAM}");
    let mut response = ZapResponse::ok("");

    if let Some(primary_url) = settings.primary_url.as_deref() {
        let reply = relay.forward().post(primary_url, relay_body.clone()).await;
        track_forward_result(relay, "primary", primary_url, &reply);
        response = ZapResponse {
            code: reply.code,
            body: reply.body.clone(),
        };
        record.primary_response_code = Some(reply.code);
        record.primary_response_body = Some(reply.body);
    }

    if let Some(besteffort_url) = settings.besteffort_url.as_deref() {
        let reply = relay.forward().post(besteffort_url, relay_body).await;
        track_forward_result(relay, "besteffort", besteffort_url, &reply);
        record.besteffort_response_code = Some(reply.code);
        record.besteffort_response_body = Some(reply.body);
    }

    insert_record(relay, record).await;
    prune_expired(relay).await;

    response
}

/// Most recent exchanges, newest first.
pub async fn list_recent(
    relay: &ZapRelay,
    limit: Option<i64>,
    before_id: Option<i64>,
) -> Result<Vec<ZapRecord>, StorageError> {
    relay.storage().recent_records(limit, before_id).await
}

/// Relay a mailing-list subscription request through the configured leg.
///
/// The mail route proxies small `cid`/`resub` forms from the shop site
/// to whichever destination manages the list. No loop prevention, no
/// recording: a degenerate one-shot relay whose response is passed
/// through for the shop page to display.
pub async fn handle_mail(
    relay: &ZapRelay,
    settings: &RelaySettings,
    params: &HashMap<String, String>,
) -> ZapResponse {
    relay
        .metrics()
        .mail_requests_total
        .fetch_add(1, Ordering::Relaxed);

    if settings.mail_relay == MailRelay::None {
        return ZapResponse::ok("subscription relay not configured");
    }
    let Some(url) = settings.mail_url() else {
        return ZapResponse::ok(format!(
            "no {} endpoint configured",
            settings.mail_relay.name()
        ));
    };

    let Some(cid) = params.get("cid").filter(|v| !v.is_empty()) else {
        return ZapResponse::ok("missing 'cid' parameter");
    };

    let mut body = format!("cid={cid}");
    if params.get("resub").is_some_and(|v| !v.is_empty()) {
        body.push_str("&resub=1");
    }

    let reply = relay.forward().post(url, body).await;
    ZapResponse {
        code: reply.code,
        body: reply.body,
    }
}

async fn insert_record(relay: &ZapRelay, record: NewZapRecord) {
    match relay.storage().insert_record(record).await {
        Ok(id) => {
            relay
                .metrics()
                .records_inserted_total
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!(id, "recorded exchange");
        }
        Err(e) => tracing::error!("failed to record exchange: {e}"),
    }
}

/// Drop records older than [`RETENTION_DAYS`], measured in the
/// station's zone against `request_time`.
///
/// Runs inline after a full relay. Failures are logged and swallowed;
/// the sweep must never affect the device-facing response.
async fn prune_expired(relay: &ZapRelay) {
    let cutoff = (chrono::Utc::now().with_timezone(&relay.timezone())
        - chrono::Duration::days(RETENTION_DAYS))
    .format(zap_telemetry::EVENT_TIME_FORMAT)
    .to_string();

    match relay.storage().prune_records_before(&cutoff).await {
        Ok(0) => {}
        Ok(pruned) => {
            relay
                .metrics()
                .records_pruned_total
                .fetch_add(pruned, Ordering::Relaxed);
            tracing::info!(pruned, "retention sweep removed expired records");
        }
        Err(e) => tracing::warn!("retention sweep failed: {e}"),
    }
}

fn track_forward_result(relay: &ZapRelay, leg: &str, url: &str, reply: &ForwardReply) {
    if reply.code >= 400 {
        relay
            .metrics()
            .forward_failures_total
            .fetch_add(1, Ordering::Relaxed);
        tracing::warn!(leg, url, code = reply.code, "destination reported failure");
    } else {
        tracing::debug!(leg, url, code = reply.code, "destination accepted relay");
    }
}
