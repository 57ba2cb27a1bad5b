//! Prometheus metrics endpoint.

use crate::server::ZapRelay;
use crate::storage::RecordStore;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<ZapRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Counters — monotonic since startup
    let zapdata_requests = m.zapdata_requests_total.load(Ordering::Relaxed);
    let relayed = m.relayed_total.load(Ordering::Relaxed);
    let norelay = m.norelay_total.load(Ordering::Relaxed);
    let auth_failures = m.auth_failures_total.load(Ordering::Relaxed);
    let forward_failures = m.forward_failures_total.load(Ordering::Relaxed);
    let inserted = m.records_inserted_total.load(Ordering::Relaxed);
    let pruned = m.records_pruned_total.load(Ordering::Relaxed);
    let mail_requests = m.mail_requests_total.load(Ordering::Relaxed);

    // Storage stats (async queries — best effort)
    let records = relay.storage().record_count().await.unwrap_or(0);
    let last_record_id = relay.storage().last_record_id().await.unwrap_or(0);

    let body = format!(
        r#"# HELP zap_relay_info Server information
# TYPE zap_relay_info gauge
zap_relay_info{{version="{version}"}} 1

# HELP zap_relay_records Exchange records currently stored
# TYPE zap_relay_records gauge
zap_relay_records {records}

# HELP zap_relay_last_record_id Highest record id in the store
# TYPE zap_relay_last_record_id gauge
zap_relay_last_record_id {last_record_id}

# HELP zap_relay_zapdata_requests_total Total station reports received
# TYPE zap_relay_zapdata_requests_total counter
zap_relay_zapdata_requests_total {zapdata_requests}

# HELP zap_relay_relayed_total Total reports that took the full relay path
# TYPE zap_relay_relayed_total counter
zap_relay_relayed_total {relayed}

# HELP zap_relay_norelay_total Total reports short-circuited by the no-relay marker
# TYPE zap_relay_norelay_total counter
zap_relay_norelay_total {norelay}

# HELP zap_relay_auth_failures_total Total reports rejected by the station id check
# TYPE zap_relay_auth_failures_total counter
zap_relay_auth_failures_total {auth_failures}

# HELP zap_relay_forward_failures_total Total destination replies at or above 400
# TYPE zap_relay_forward_failures_total counter
zap_relay_forward_failures_total {forward_failures}

# HELP zap_relay_records_inserted_total Total exchange records written
# TYPE zap_relay_records_inserted_total counter
zap_relay_records_inserted_total {inserted}

# HELP zap_relay_records_pruned_total Total records removed by the retention sweep
# TYPE zap_relay_records_pruned_total counter
zap_relay_records_pruned_total {pruned}

# HELP zap_relay_mail_requests_total Total mail relay requests received
# TYPE zap_relay_mail_requests_total counter
zap_relay_mail_requests_total {mail_requests}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
