use std::{collections::HashMap, fmt::Write as _, sync::atomic::Ordering};

use super::core::{MetricsState, METRICS_STATE};

pub(crate) const CHECK_OUTCOME_GRANTED: &str = "granted";
pub(crate) const CHECK_OUTCOME_DENIED: &str = "denied";
pub(crate) const CHECK_OUTCOME_ERROR: &str = "error";

pub(crate) fn metrics_state() -> &'static MetricsState {
    METRICS_STATE.get_or_init(MetricsState::default)
}

pub(crate) fn render_metrics() -> String {
    let permission_checks = metrics_state()
        .permission_checks
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone());
    let cache_evictions = metrics_state()
        .cache_evictions
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone());
    let notifications = metrics_state()
        .notifications
        .lock()
        .map_or_else(|_| HashMap::new(), |guard| guard.clone());

    let mut output = String::new();
    output.push_str(
        "# HELP orbit_permission_checks_total Count of single-bit permission checks by outcome\n",
    );
    output.push_str("# TYPE orbit_permission_checks_total counter\n");
    let mut check_entries: Vec<_> = permission_checks.into_iter().collect();
    check_entries.sort_by_key(|(outcome, _)| *outcome);
    for (outcome, value) in check_entries {
        let _ = writeln!(
            output,
            "orbit_permission_checks_total{{outcome=\"{outcome}\"}} {value}"
        );
    }

    output.push_str(
        "# HELP orbit_flatten_computations_total Count of flattened nodes computed on cache miss\n",
    );
    output.push_str("# TYPE orbit_flatten_computations_total counter\n");
    let _ = writeln!(
        output,
        "orbit_flatten_computations_total {}",
        metrics_state().flatten_computations.load(Ordering::Relaxed)
    );

    output.push_str(
        "# HELP orbit_flatten_cache_hits_total Count of flattened nodes served from cache\n",
    );
    output.push_str("# TYPE orbit_flatten_cache_hits_total counter\n");
    let _ = writeln!(
        output,
        "orbit_flatten_cache_hits_total {}",
        metrics_state().flatten_cache_hits.load(Ordering::Relaxed)
    );

    output.push_str(
        "# HELP orbit_cache_evictions_total Count of evicted flattened nodes by change reason\n",
    );
    output.push_str("# TYPE orbit_cache_evictions_total counter\n");
    let mut eviction_entries: Vec<_> = cache_evictions.into_iter().collect();
    eviction_entries.sort_by_key(|(reason, _)| *reason);
    for (reason, value) in eviction_entries {
        let _ = writeln!(
            output,
            "orbit_cache_evictions_total{{reason=\"{reason}\"}} {value}"
        );
    }

    output.push_str(
        "# HELP orbit_notifications_total Count of change notifications published or applied by type\n",
    );
    output.push_str("# TYPE orbit_notifications_total counter\n");
    let mut notification_entries: Vec<_> = notifications.into_iter().collect();
    notification_entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (event_type, value) in notification_entries {
        let _ = writeln!(
            output,
            "orbit_notifications_total{{event_type=\"{event_type}\"}} {value}"
        );
    }

    output
}

pub(crate) fn record_permission_check(outcome: &'static str) {
    if let Ok(mut counters) = metrics_state().permission_checks.lock() {
        let entry = counters.entry(outcome).or_insert(0);
        *entry += 1;
    }
}

pub(crate) fn record_flatten_computation() {
    metrics_state()
        .flatten_computations
        .fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_flatten_cache_hit() {
    metrics_state()
        .flatten_cache_hits
        .fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_cache_eviction(reason: &'static str, evicted: usize) {
    if let Ok(mut counters) = metrics_state().cache_evictions.lock() {
        let entry = counters.entry(reason).or_insert(0);
        *entry += u64::try_from(evicted).unwrap_or(u64::MAX);
    }
}

pub(crate) fn record_notification(event_type: &str) {
    if let Ok(mut counters) = metrics_state().notifications.lock() {
        let entry = counters.entry(event_type.to_owned()).or_insert(0);
        *entry += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        metrics_state, record_cache_eviction, record_notification, record_permission_check,
        render_metrics, CHECK_OUTCOME_DENIED,
    };

    #[test]
    fn eviction_counts_accumulate_per_reason() {
        let before = metrics_state()
            .cache_evictions
            .lock()
            .expect("eviction metrics mutex should not be poisoned")
            .get("channel_changed")
            .copied()
            .unwrap_or(0);
        record_cache_eviction("channel_changed", 3);

        let after = metrics_state()
            .cache_evictions
            .lock()
            .expect("eviction metrics mutex should not be poisoned")
            .get("channel_changed")
            .copied();
        assert!(after.unwrap_or(0) >= before + 3);
    }

    #[test]
    fn rendered_metrics_expose_every_family() {
        record_permission_check(CHECK_OUTCOME_DENIED);
        record_notification("node_changed");
        let text = render_metrics();
        assert!(text.contains("orbit_permission_checks_total{outcome=\"denied\"}"));
        assert!(text.contains("# TYPE orbit_flatten_computations_total counter"));
        assert!(text.contains("# TYPE orbit_flatten_cache_hits_total counter"));
        assert!(text.contains("# TYPE orbit_cache_evictions_total counter"));
        assert!(text.contains("orbit_notifications_total{event_type=\"node_changed\"}"));
    }
}
