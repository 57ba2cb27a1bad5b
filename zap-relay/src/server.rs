//! Shared relay state and operational counters.

use crate::config::Config;
use crate::error::RelayError;
use crate::forward::ForwardClient;
use crate::storage::SqliteStorage;
use chrono_tz::Tz;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Incremented via `AtomicU64`, no locks needed.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total station reports received on the ingress route.
    pub zapdata_requests_total: AtomicU64,
    /// Total reports that took the full relay path.
    pub relayed_total: AtomicU64,
    /// Total reports short-circuited by the no-relay marker.
    pub norelay_total: AtomicU64,
    /// Total reports rejected for a missing or wrong station id.
    pub auth_failures_total: AtomicU64,
    /// Total destination replies that were, or were normalized to, >= 400.
    pub forward_failures_total: AtomicU64,
    /// Total exchange records written.
    pub records_inserted_total: AtomicU64,
    /// Total records removed by the retention sweep.
    pub records_pruned_total: AtomicU64,
    /// Total mail relay requests received.
    pub mail_requests_total: AtomicU64,
}

/// Main relay state shared across request handlers.
pub struct ZapRelay {
    config: Config,
    /// Zone the stations report event times in.
    timezone: Tz,
    storage: Arc<SqliteStorage>,
    forward: ForwardClient,
    metrics: RelayMetrics,
}

impl std::fmt::Debug for ZapRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZapRelay")
            .field("config", &self.config)
            .field("timezone", &self.timezone)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ZapRelay {
    /// Create relay state from a config and an opened store.
    pub fn new(config: Config, storage: SqliteStorage) -> Result<Self, RelayError> {
        let timezone = config.device.timezone()?;
        let forward = ForwardClient::new(Duration::from_secs(config.forward.timeout_secs))?;
        Ok(Self {
            config,
            timezone,
            storage: Arc::new(storage),
            forward,
            metrics: RelayMetrics::default(),
        })
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Zone used to render request and event times.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Get access to the storage layer.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get access to the outbound client.
    pub fn forward(&self) -> &ForwardClient {
        &self.forward
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Current civil time in the station's zone, in record format.
    pub fn current_request_time(&self) -> String {
        chrono::Utc::now()
            .with_timezone(&self.timezone)
            .format(zap_telemetry::EVENT_TIME_FORMAT)
            .to_string()
    }
}
