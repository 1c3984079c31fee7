//! Alert data models

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pattern for pulling a ratio out of free-text messages such as
/// "Mixing ratio critical: 1.834".
static MESSAGE_RATIO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*([0-9]+(?:\.[0-9]+)?)").expect("valid ratio pattern"));

/// Alert severity level derived from the measured ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Within tolerance
    #[default]
    Normal,
    /// Outside tolerance, not yet critical
    Warning,
    /// Requires immediate attention
    Critical,
}

impl Severity {
    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ratio thresholds used to classify alert severity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    /// Ratio at or above which an alert is a warning
    pub warning: f64,
    /// Ratio at or above which an alert is critical
    pub critical: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            warning: 1.2,
            critical: 1.5,
        }
    }
}

impl StatusThresholds {
    /// Classify a ratio value
    pub fn classify(&self, ratio: f64) -> Severity {
        if ratio >= self.critical {
            Severity::Critical
        } else if ratio >= self.warning {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

/// Machine record embedded in an alert by some backend versions
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddedMachine {
    /// Machine display name
    pub name: Option<String>,
}

/// An anomaly alert as returned by the backend
///
/// The backend has gone through a few schema revisions, so several fields
/// accept historical aliases and everything optional defaults to absent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Alert {
    /// Alert identifier
    pub alert_id: i64,

    /// Machine that triggered the alert
    pub machine_id: i64,

    /// Alert classification string, e.g. "mixing_ratio_high"
    pub alert_type: Option<String>,

    /// Free-text detail message
    pub message: Option<String>,

    /// Measured mixing ratio
    #[serde(alias = "calculated_ratio", alias = "alert_ratio")]
    pub ratio: Option<f64>,

    /// Sensor reading the alert was derived from
    pub reading_id: Option<i64>,

    /// When the anomaly was detected
    #[serde(alias = "timestamp")]
    pub triggered_at: Option<DateTime<Utc>>,

    /// User that acknowledged the alert, if any
    pub acknowledged_by: Option<i64>,

    /// Acknowledgment note
    pub comments: Option<String>,

    /// Machine name as embedded by older backend versions
    #[serde(rename = "Machine")]
    pub machine: Option<EmbeddedMachine>,

    /// Machine name as a flat field, another historical shape
    pub machine_name: Option<String>,
}

impl Alert {
    /// Deterministic de-duplication key for this alert
    pub fn fingerprint(&self) -> String {
        format!("alert:{}:{}", self.alert_id, self.machine_id)
    }

    /// Whether the alert has been acknowledged
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_by.is_some()
    }

    /// The ratio to display and classify by
    ///
    /// A missing or zero ratio field falls back to extracting a number from
    /// the message text, since older backends only report it there.
    pub fn effective_ratio(&self) -> Option<f64> {
        match self.ratio {
            Some(r) if r != 0.0 => Some(r),
            _ => self.message.as_deref().and_then(parse_message_ratio),
        }
    }

    /// Derive the severity of this alert
    ///
    /// When no ratio can be recovered at all, an alert typed "high" or "low"
    /// still rates at least a warning: it would not exist otherwise.
    pub fn severity(&self, thresholds: &StatusThresholds) -> Severity {
        let severity = self
            .effective_ratio()
            .map(|r| thresholds.classify(r))
            .unwrap_or_default();

        if severity == Severity::Normal {
            if let Some(kind) = &self.alert_type {
                if kind.contains("high") || kind.contains("low") {
                    return Severity::Warning;
                }
            }
        }

        severity
    }
}

/// Extract a ratio value from free-text such as "Mixing ratio Critical: 1.234"
fn parse_message_ratio(message: &str) -> Option<f64> {
    MESSAGE_RATIO
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn alert(ratio: Option<f64>) -> Alert {
        Alert {
            alert_id: 7,
            machine_id: 3,
            ratio,
            ..Alert::default()
        }
    }

    #[rstest]
    #[case(0.9, Severity::Normal)]
    #[case(1.2, Severity::Warning)]
    #[case(1.49, Severity::Warning)]
    #[case(1.5, Severity::Critical)]
    #[case(1.8, Severity::Critical)]
    fn classifies_ratio_against_default_thresholds(#[case] ratio: f64, #[case] expected: Severity) {
        let thresholds = StatusThresholds::default();
        assert_eq!(alert(Some(ratio)).severity(&thresholds), expected);
    }

    #[test]
    fn ratio_above_critical_threshold_is_critical() {
        let thresholds = StatusThresholds {
            warning: 1.2,
            critical: 1.75,
        };
        assert_eq!(alert(Some(1.8)).severity(&thresholds), Severity::Critical);
    }

    #[test]
    fn missing_ratio_parsed_from_message() {
        let mut a = alert(None);
        a.message = Some("Mixing ratio Critical: 1.834".to_string());
        assert_eq!(a.effective_ratio(), Some(1.834));
    }

    #[test]
    fn zero_ratio_falls_back_to_message() {
        let mut a = alert(Some(0.0));
        a.message = Some("deviation detected: 1.3".to_string());
        assert_eq!(a.effective_ratio(), Some(1.3));
    }

    #[test]
    fn message_without_number_yields_no_ratio() {
        let mut a = alert(None);
        a.message = Some("sensor offline".to_string());
        assert_eq!(a.effective_ratio(), None);
    }

    #[rstest]
    #[case("mixing_ratio_high")]
    #[case("flow_low")]
    fn typed_alert_without_ratio_is_at_least_warning(#[case] kind: &str) {
        let mut a = alert(None);
        a.alert_type = Some(kind.to_string());
        assert_eq!(a.severity(&StatusThresholds::default()), Severity::Warning);
    }

    #[test]
    fn untyped_alert_without_ratio_is_normal() {
        assert_eq!(alert(None).severity(&StatusThresholds::default()), Severity::Normal);
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(alert(None).fingerprint(), "alert:7:3");
    }

    #[test]
    fn accepts_historical_field_aliases() {
        let a: Alert = serde_json::from_value(serde_json::json!({
            "alert_id": 12,
            "machine_id": 4,
            "alert_ratio": 1.25,
            "timestamp": "2026-03-01T08:30:00Z",
            "Machine": { "name": "Mixer West" }
        }))
        .unwrap();

        assert_eq!(a.ratio, Some(1.25));
        assert!(a.triggered_at.is_some());
        assert_eq!(a.machine.unwrap().name.as_deref(), Some("Mixer West"));
    }
}
