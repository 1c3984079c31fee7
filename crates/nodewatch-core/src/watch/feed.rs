//! Alert feed assembly

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{fallback_machine_name, Alert, Machine, Severity, StatusThresholds, User};

/// An alert joined with machine and user metadata, ready for display
#[derive(Debug, Clone, Serialize)]
pub struct AlertView {
    /// De-duplication key
    pub fingerprint: String,

    /// Alert identifier
    pub alert_id: i64,

    /// Machine that triggered the alert
    pub machine_id: i64,

    /// Resolved machine name, or a generic label
    pub machine_name: String,

    /// Derived severity
    pub severity: Severity,

    /// Displayed ratio, if one could be recovered
    pub ratio: Option<f64>,

    /// When the anomaly was detected
    pub triggered_at: Option<DateTime<Utc>>,

    /// Acknowledging user id, if resolved
    pub acknowledged_by: Option<i64>,

    /// Acknowledging user name, if resolved
    pub resolver_name: Option<String>,

    /// Acknowledgment note
    pub comments: Option<String>,

    /// Originating sensor reading
    pub reading_id: Option<i64>,
}

impl AlertView {
    /// Whether the alert has been acknowledged
    pub fn is_resolved(&self) -> bool {
        self.acknowledged_by.is_some()
    }

    /// Display status: acknowledgment overrides the derived severity
    pub fn status_label(&self) -> &'static str {
        if self.is_resolved() {
            "Resolved"
        } else {
            self.severity.label()
        }
    }
}

/// Fetches alerts and joins them with machine and user metadata
pub struct AlertFeed {
    client: Arc<ApiClient>,
    thresholds: StatusThresholds,
}

impl AlertFeed {
    /// Create a feed over an API client
    pub fn new(client: Arc<ApiClient>, thresholds: StatusThresholds) -> Self {
        Self { client, thresholds }
    }

    /// Unresolved alerts visible to the viewer, newest first
    ///
    /// The machine list failing degrades to generic machine labels; the
    /// alert list failing fails the whole refresh so the caller keeps its
    /// previous state.
    pub async fn active(&self, viewer: &User) -> Result<Vec<AlertView>> {
        let viewer = self.resolve_scope(viewer).await;
        let (alerts, machines) = tokio::join!(self.client.alerts(), self.client.machines());

        let alerts = alerts?;
        let machines = machines.unwrap_or_else(|e| {
            warn!(error = %e, "machine list unavailable, using generic labels");
            Vec::new()
        });

        let mut views = self.assemble(alerts, &machines, &[], &viewer);
        views.retain(|view| !view.is_resolved());
        Ok(views)
    }

    /// All alerts visible to the viewer, resolved ones included, newest first
    pub async fn history(&self, viewer: &User) -> Result<Vec<AlertView>> {
        let viewer = self.resolve_scope(viewer).await;
        let (alerts, machines, users) = tokio::join!(
            self.client.alerts(),
            self.client.machines(),
            self.client.users()
        );

        let alerts = alerts?;
        let machines = machines.unwrap_or_else(|e| {
            warn!(error = %e, "machine list unavailable, using generic labels");
            Vec::new()
        });
        let users = users.unwrap_or_else(|e| {
            warn!(error = %e, "user list unavailable, using generic resolver labels");
            Vec::new()
        });

        Ok(self.assemble(alerts, &machines, &users, &viewer))
    }

    /// Fill in the viewer's machine assignment when the session record lacks
    /// it; a failed detail lookup is swallowed and scoping proceeds with what
    /// is known.
    async fn resolve_scope(&self, viewer: &User) -> User {
        let mut viewer = viewer.clone();
        if viewer.capability().full_visibility() || viewer.knows_assignment() {
            return viewer;
        }

        match self.client.user_detail(viewer.id).await {
            Ok(detail) => viewer.merge_detail(detail),
            Err(e) => debug!(user_id = viewer.id, error = %e, "user detail unavailable"),
        }
        viewer
    }

    fn assemble(
        &self,
        alerts: Vec<Alert>,
        machines: &[Machine],
        users: &[User],
        viewer: &User,
    ) -> Vec<AlertView> {
        let scope = if viewer.capability().full_visibility() {
            None
        } else {
            viewer.assigned_machine()
        };

        let mut views: Vec<AlertView> = alerts
            .into_iter()
            .filter(|alert| scope.map_or(true, |machine_id| alert.machine_id == machine_id))
            .map(|alert| self.view_of(alert, machines, users))
            .collect();

        views.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        views
    }

    fn view_of(&self, alert: Alert, machines: &[Machine], users: &[User]) -> AlertView {
        let machine_name = machines
            .iter()
            .find(|machine| machine.id == alert.machine_id)
            .and_then(|machine| machine.name.clone())
            .or_else(|| alert.machine.as_ref().and_then(|m| m.name.clone()))
            .or_else(|| alert.machine_name.clone())
            .unwrap_or_else(|| fallback_machine_name(alert.machine_id));

        let resolver_name = alert.acknowledged_by.map(|user_id| {
            users
                .iter()
                .find(|user| user.id == user_id)
                .and_then(|user| user.name.clone())
                .unwrap_or_else(|| format!("user:{user_id}"))
        });

        AlertView {
            fingerprint: alert.fingerprint(),
            severity: alert.severity(&self.thresholds),
            ratio: alert.effective_ratio(),
            alert_id: alert.alert_id,
            machine_id: alert.machine_id,
            machine_name,
            triggered_at: alert.triggered_at,
            acknowledged_by: alert.acknowledged_by,
            resolver_name,
            comments: alert.comments,
            reading_id: alert.reading_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed_for(server: &MockServer) -> AlertFeed {
        let client = ApiClient::new(&ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        })
        .unwrap();
        AlertFeed::new(Arc::new(client), StatusThresholds::default())
    }

    fn scoped_viewer(machine_id: i64) -> User {
        serde_json::from_value(json!({
            "id": 2,
            "name": "R. Vega",
            "rights": 2,
            "requested_machines": [{ "id": machine_id }],
        }))
        .unwrap()
    }

    fn admin_viewer() -> User {
        serde_json::from_value(json!({ "id": 1, "rights": 1 })).unwrap()
    }

    async fn mount_alerts(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_machines(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/machines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn sample_alerts() -> serde_json::Value {
        json!([
            {
                "alert_id": 1,
                "machine_id": 5,
                "ratio": 1.8,
                "triggered_at": "2026-03-01T08:00:00Z"
            },
            {
                "alert_id": 2,
                "machine_id": 6,
                "ratio": 1.3,
                "triggered_at": "2026-03-01T09:00:00Z"
            },
            {
                "alert_id": 3,
                "machine_id": 5,
                "ratio": 1.9,
                "triggered_at": "2026-03-01T07:00:00Z",
                "acknowledged_by": 42,
                "comments": "valve flushed"
            }
        ])
    }

    #[tokio::test]
    async fn scoped_viewer_never_sees_other_machines() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        mount_machines(&server, json!([{ "id": 5, "name": "Mixer West" }])).await;

        let views = feed_for(&server).active(&scoped_viewer(5)).await.unwrap();

        assert_eq!(views.len(), 1);
        assert!(views.iter().all(|view| view.machine_id == 5));
        assert_eq!(views[0].machine_name, "Mixer West");
    }

    #[tokio::test]
    async fn admin_sees_every_machine() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        mount_machines(&server, json!([])).await;

        let views = feed_for(&server).active(&admin_viewer()).await.unwrap();
        assert_eq!(views.len(), 2);
    }

    #[tokio::test]
    async fn active_drops_acknowledged_alerts() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        mount_machines(&server, json!([])).await;

        let views = feed_for(&server).active(&admin_viewer()).await.unwrap();
        assert!(views.iter().all(|view| !view.is_resolved()));
    }

    #[tokio::test]
    async fn machine_list_failure_degrades_to_generic_labels() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        Mock::given(method("GET"))
            .and(path("/machines"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let views = feed_for(&server).active(&scoped_viewer(5)).await.unwrap();
        assert_eq!(views[0].machine_name, "Node 5");
    }

    #[tokio::test]
    async fn alert_list_failure_fails_the_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alerts"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_machines(&server, json!([])).await;

        assert!(feed_for(&server).active(&admin_viewer()).await.is_err());
    }

    #[tokio::test]
    async fn newest_alerts_sort_first() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        mount_machines(&server, json!([])).await;

        let views = feed_for(&server).active(&admin_viewer()).await.unwrap();
        assert_eq!(views[0].alert_id, 2);
        assert_eq!(views[1].alert_id, 1);
    }

    #[tokio::test]
    async fn history_keeps_resolved_alerts_and_names_resolvers() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        mount_machines(&server, json!([])).await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 42, "name": "A. Khan" }
            ])))
            .mount(&server)
            .await;

        let views = feed_for(&server).history(&admin_viewer()).await.unwrap();
        assert_eq!(views.len(), 3);

        let resolved = views.iter().find(|view| view.alert_id == 3).unwrap();
        assert_eq!(resolved.status_label(), "Resolved");
        assert_eq!(resolved.resolver_name.as_deref(), Some("A. Khan"));
    }

    #[tokio::test]
    async fn resolved_label_overrides_severity() {
        let server = MockServer::start().await;
        mount_alerts(
            &server,
            json!([{
                "alert_id": 7,
                "machine_id": 3,
                "ratio": 1.8,
                "acknowledged_by": 42
            }]),
        )
        .await;
        mount_machines(&server, json!([])).await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let views = feed_for(&server).history(&admin_viewer()).await.unwrap();
        assert_eq!(views[0].severity, Severity::Critical);
        assert_eq!(views[0].status_label(), "Resolved");
        assert_eq!(views[0].resolver_name.as_deref(), Some("user:42"));
    }

    #[tokio::test]
    async fn unknown_assignment_is_resolved_through_user_detail() {
        let server = MockServer::start().await;
        mount_alerts(&server, sample_alerts()).await;
        mount_machines(&server, json!([])).await;
        Mock::given(method("GET"))
            .and(path("/users/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 2,
                "requested_machines": [{ "id": 5 }]
            })))
            .mount(&server)
            .await;

        let viewer: User = serde_json::from_value(json!({ "id": 2, "rights": 2 })).unwrap();
        let views = feed_for(&server).active(&viewer).await.unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].machine_id, 5);
    }
}
