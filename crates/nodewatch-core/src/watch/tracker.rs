//! Notification gating across poll cycles

use std::collections::HashSet;

use crate::models::Severity;
use crate::store::SeenSet;

use super::feed::AlertView;

/// Maximum number of toasts raised by a single poll cycle
pub const TOAST_CAP_PER_SYNC: usize = 5;

/// An ephemeral notification for a newly observed alert
#[derive(Debug, Clone)]
pub struct Toast {
    /// Notification text
    pub message: String,
    /// Severity of the underlying alert
    pub severity: Severity,
}

/// Decides which alerts in a poll cycle deserve a toast
///
/// Tracks which fingerprints have already been announced in this session.
/// The first sync after construction primes the tracker without announcing
/// anything, so a restart never replays old alerts; the persisted seen-set
/// suppresses alerts the user viewed in earlier sessions.
#[derive(Debug)]
pub struct NotificationTracker {
    notified: HashSet<String>,
    primed: bool,
    toast_cap: usize,
}

impl Default for NotificationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationTracker {
    /// Create a tracker with the default per-cycle toast cap
    pub fn new() -> Self {
        Self::with_toast_cap(TOAST_CAP_PER_SYNC)
    }

    /// Create a tracker with a custom per-cycle toast cap
    pub fn with_toast_cap(toast_cap: usize) -> Self {
        Self {
            notified: HashSet::new(),
            primed: false,
            toast_cap,
        }
    }

    /// Absorb a poll cycle's alerts and return the toasts to raise
    ///
    /// Every fingerprint is recorded as announced whether or not it produced
    /// a toast, so an alert suppressed by the cap or the seen-set is never
    /// announced later.
    pub fn sync(&mut self, alerts: &[AlertView], seen: &SeenSet) -> Vec<Toast> {
        if !self.primed {
            self.primed = true;
            for alert in alerts {
                self.notified.insert(alert.fingerprint.clone());
            }
            return Vec::new();
        }

        let mut toasts = Vec::new();
        for alert in alerts {
            if !self.notified.insert(alert.fingerprint.clone()) {
                continue;
            }
            if seen.contains(&alert.fingerprint) {
                continue;
            }
            if toasts.len() < self.toast_cap {
                toasts.push(Toast {
                    message: format!("ALERT: {} - {}", alert.machine_name, alert.status_label()),
                    severity: alert.severity,
                });
            }
        }
        toasts
    }

    /// Alerts in the current set the user has not yet seen
    pub fn unread_count(alerts: &[AlertView], seen: &SeenSet) -> usize {
        alerts
            .iter()
            .filter(|alert| !seen.contains(&alert.fingerprint))
            .count()
    }
}

/// Record every loaded alert as seen, e.g. when the notification panel opens
pub fn mark_seen(alerts: &[AlertView], seen: &mut SeenSet) {
    for alert in alerts {
        seen.insert(&alert.fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn view(alert_id: i64, machine_id: i64) -> AlertView {
        AlertView {
            fingerprint: format!("alert:{alert_id}:{machine_id}"),
            alert_id,
            machine_id,
            machine_name: format!("Node {machine_id}"),
            severity: Severity::Warning,
            ratio: Some(1.3),
            triggered_at: None,
            acknowledged_by: None,
            resolver_name: None,
            comments: None,
            reading_id: None,
        }
    }

    fn views(count: i64) -> Vec<AlertView> {
        (0..count).map(|i| view(i, 1)).collect()
    }

    #[test]
    fn first_sync_emits_no_toasts_but_counts_unread() {
        let mut tracker = NotificationTracker::new();
        let seen = SeenSet::new(100);
        let alerts = views(3);

        let toasts = tracker.sync(&alerts, &seen);

        assert!(toasts.is_empty());
        assert_eq!(NotificationTracker::unread_count(&alerts, &seen), 3);
    }

    #[test]
    fn new_alert_after_first_sync_toasts_once() {
        let mut tracker = NotificationTracker::new();
        let seen = SeenSet::new(100);
        let mut alerts = views(1);

        tracker.sync(&alerts, &seen);

        alerts.push(view(9, 1));
        let toasts = tracker.sync(&alerts, &seen);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "ALERT: Node 1 - Warning");

        // Same set again: already announced.
        assert!(tracker.sync(&alerts, &seen).is_empty());
    }

    #[test]
    fn seen_alerts_never_toast() {
        let mut tracker = NotificationTracker::new();
        let mut seen = SeenSet::new(100);
        tracker.sync(&[], &seen);

        let alerts = views(2);
        mark_seen(&alerts, &mut seen);

        assert!(tracker.sync(&alerts, &seen).is_empty());
        assert_eq!(NotificationTracker::unread_count(&alerts, &seen), 0);
    }

    #[test]
    fn toasts_are_capped_per_cycle() {
        let mut tracker = NotificationTracker::new();
        let seen = SeenSet::new(100);
        tracker.sync(&[], &seen);

        let toasts = tracker.sync(&views(12), &seen);
        assert_eq!(toasts.len(), TOAST_CAP_PER_SYNC);

        // The capped-out alerts were still recorded as announced.
        assert!(tracker.sync(&views(12), &seen).is_empty());
    }

    #[test]
    fn opening_the_panel_drives_unread_to_zero() {
        let mut seen = SeenSet::new(100);
        let alerts = views(5);
        assert_eq!(NotificationTracker::unread_count(&alerts, &seen), 5);

        mark_seen(&alerts, &mut seen);

        assert_eq!(NotificationTracker::unread_count(&alerts, &seen), 0);
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn critical_severity_carries_through_to_the_toast() {
        let mut tracker = NotificationTracker::new();
        let seen = SeenSet::new(100);
        tracker.sync(&[], &seen);

        let mut alert = view(1, 4);
        alert.severity = Severity::Critical;
        let toasts = tracker.sync(&[alert], &seen);

        assert_eq!(toasts[0].severity, Severity::Critical);
        assert_eq!(toasts[0].message, "ALERT: Node 4 - Critical");
    }
}
