//! Runtime counters and the `/gateway/status` snapshot.
use super::*;

#[derive(Debug, Default)]
pub(super) struct GatewayRuntimeCounters {
    active_connections: AtomicU64,
    total_connections: AtomicU64,
    auth_failures: AtomicU64,
    relay_cycles_completed: AtomicU64,
    upstream_failures: AtomicU64,
    format_errors: AtomicU64,
}

impl GatewayRuntimeCounters {
    /// Counts a connection as active until the returned guard drops.
    pub(super) fn track_connection(&self) -> ActiveConnectionGuard<'_> {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ActiveConnectionGuard { counters: self }
    }

    pub(super) fn note_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn note_relay_cycle_completed(&self) {
        self.relay_cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn note_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn note_format_error(&self) {
        self.format_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }
}

pub(super) struct ActiveConnectionGuard<'a> {
    counters: &'a GatewayRuntimeCounters,
}

impl Drop for ActiveConnectionGuard<'_> {
    fn drop(&mut self) {
        self.counters
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(super) struct GatewayStatusReport {
    pub(super) active_connections: u64,
    pub(super) total_connections: u64,
    pub(super) auth_failures: u64,
    pub(super) relay_cycles_completed: u64,
    pub(super) upstream_failures: u64,
    pub(super) format_errors: u64,
    pub(super) model: String,
    pub(super) allow_listed_subjects: usize,
    pub(super) ws_heartbeat_interval_seconds: u64,
    pub(super) generated_unix_ms: u64,
}

impl GatewayStatusReport {
    pub(super) fn collect(state: &GatewayServerState) -> Self {
        let counters = &state.counters;
        Self {
            active_connections: counters.active_connections(),
            total_connections: counters.total_connections.load(Ordering::Relaxed),
            auth_failures: counters.auth_failures.load(Ordering::Relaxed),
            relay_cycles_completed: counters.relay_cycles_completed.load(Ordering::Relaxed),
            upstream_failures: counters.upstream_failures.load(Ordering::Relaxed),
            format_errors: counters.format_errors.load(Ordering::Relaxed),
            model: state.config.model.clone(),
            allow_listed_subjects: state.config.allow_list.len(),
            ws_heartbeat_interval_seconds: state.config.ws_heartbeat_interval_seconds,
            generated_unix_ms: relay_core::unix_now_millis(),
        }
    }
}
