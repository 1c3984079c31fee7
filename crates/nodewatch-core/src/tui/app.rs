//! Main TUI application state and logic

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::{ListState, TableState};
use tokio::sync::mpsc;
use tracing::{error, warn};
use tui_textarea::TextArea;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::Error;
use crate::models::User;
use crate::store::{SeenSet, SeenStore, StateStore};
use crate::watch::{mark_seen, AlertFeed, AlertView, NotificationTracker, Toast};

use super::event::{is_quit, key_match, Event, EventHandler};

/// Active view/tab in the TUI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTab {
    #[default]
    Alerts,
    Profile,
}

impl ActiveTab {
    pub fn next(self) -> Self {
        match self {
            Self::Alerts => Self::Profile,
            Self::Profile => Self::Alerts,
        }
    }

    pub fn prev(self) -> Self {
        // Two tabs: previous and next coincide.
        self.next()
    }

    pub fn index(self) -> usize {
        match self {
            Self::Alerts => 0,
            Self::Profile => 1,
        }
    }
}

/// Alerts list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertFilter {
    /// Unresolved alerts
    #[default]
    Active,
    /// Acknowledged alerts
    Resolved,
}

impl AlertFilter {
    pub fn toggle(self) -> Self {
        match self {
            Self::Active => Self::Resolved,
            Self::Resolved => Self::Active,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Resolved => "Resolved",
        }
    }
}

/// A toast with the instant it was raised
pub struct ActiveToast {
    pub toast: Toast,
    pub raised_at: Instant,
}

/// Acknowledgment dialog state
pub struct AckDialog {
    pub alert_id: i64,
    pub machine_name: String,
    pub input: TextArea<'static>,
    pub error: Option<String>,
}

/// Modal overlay state
pub enum Overlay {
    None,
    Bell,
    Ack(AckDialog),
    Help,
}

/// Main TUI application state
pub struct App {
    /// Whether the app should quit
    pub should_quit: bool,
    /// Active tab
    pub active_tab: ActiveTab,
    /// Alerts list filter
    pub filter: AlertFilter,
    /// Latest unresolved alerts (bell feed)
    pub feed: Vec<AlertView>,
    /// Latest full alert set (alerts view)
    pub history: Vec<AlertView>,
    /// Alerts fetched but not yet seen by the operator
    pub unread: usize,
    /// Toasts currently on screen
    pub toasts: Vec<ActiveToast>,
    /// Active modal overlay
    pub overlay: Overlay,
    /// Fingerprint highlighted after a bell jump
    pub highlight: Option<String>,
    /// Error banner on the alerts view
    pub error_banner: Option<String>,
    /// Alerts table state
    pub alerts_state: TableState,
    /// Bell panel list state
    pub bell_state: ListState,
    /// Whether at least one poll cycle has succeeded
    pub connected: bool,
    /// Last successful update time
    pub last_update: Instant,
    /// Poll cadence, displayed in the status bar
    pub poll_interval: Duration,
    /// How long a toast stays on screen
    pub toast_ttl: Duration,
    /// Maximum toasts kept on screen
    pub toast_limit: usize,
    /// Entries shown in the bell panel
    pub panel_limit: usize,

    viewer: User,
    status_message: Option<(String, Instant)>,
    tracker: NotificationTracker,
    seen: SeenSet,
    seen_store: SeenStore,
    feed_source: Arc<AlertFeed>,
    client: Arc<ApiClient>,
}

impl App {
    /// Create the dashboard application for an authenticated viewer
    pub fn new(
        config: &Config,
        client: Arc<ApiClient>,
        store: Arc<dyn StateStore>,
        viewer: User,
    ) -> Self {
        let seen_store = SeenStore::for_user(store, viewer.id, config.storage.seen_capacity);
        let feed_source = Arc::new(AlertFeed::new(client.clone(), config.status));

        Self {
            should_quit: false,
            active_tab: ActiveTab::default(),
            filter: AlertFilter::default(),
            feed: Vec::new(),
            history: Vec::new(),
            unread: 0,
            toasts: Vec::new(),
            overlay: Overlay::None,
            highlight: None,
            error_banner: None,
            alerts_state: TableState::default(),
            bell_state: ListState::default(),
            connected: false,
            last_update: Instant::now(),
            poll_interval: config.poll.interval,
            toast_ttl: config.tui.toast_ttl,
            toast_limit: config.tui.toast_limit,
            panel_limit: config.tui.panel_limit,
            viewer,
            status_message: None,
            tracker: NotificationTracker::new(),
            seen: SeenSet::new(config.storage.seen_capacity),
            seen_store,
            feed_source,
            client,
        }
    }

    /// The authenticated viewer
    pub fn viewer(&self) -> &User {
        &self.viewer
    }

    /// Alerts matching the current filter, display order
    pub fn displayed(&self) -> Vec<&AlertView> {
        self.history
            .iter()
            .filter(|view| match self.filter {
                AlertFilter::Active => !view.is_resolved(),
                AlertFilter::Resolved => view.is_resolved(),
            })
            .collect()
    }

    /// Set a status message that expires after 3 seconds
    pub fn set_status(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get current status message if not expired
    pub fn get_status(&self) -> Option<&str> {
        self.status_message.as_ref().and_then(|(msg, time)| {
            if time.elapsed() < Duration::from_secs(3) {
                Some(msg.as_str())
            } else {
                None
            }
        })
    }

    /// Absorb a bell-feed poll cycle
    pub fn on_feed(&mut self, views: Vec<AlertView>) {
        let now = Instant::now();
        for toast in self.tracker.sync(&views, &self.seen) {
            self.toasts.push(ActiveToast {
                toast,
                raised_at: now,
            });
        }
        if self.toasts.len() > self.toast_limit {
            let excess = self.toasts.len() - self.toast_limit;
            self.toasts.drain(..excess);
        }

        self.unread = NotificationTracker::unread_count(&views, &self.seen);
        self.feed = views;
        self.connected = true;
        self.last_update = now;
    }

    /// Absorb a history poll cycle
    pub fn on_feed_history(&mut self, views: Vec<AlertView>) {
        self.history = views;
        self.error_banner = None;
        self.connected = true;
        self.last_update = Instant::now();

        let len = self.displayed().len();
        match self.alerts_state.selected() {
            Some(_) if len == 0 => self.alerts_state.select(None),
            Some(i) if i >= len => self.alerts_state.select(Some(len - 1)),
            None if len > 0 => self.alerts_state.select(Some(0)),
            _ => {}
        }
    }

    /// Periodic housekeeping
    fn on_tick(&mut self) {
        let ttl = self.toast_ttl;
        self.toasts.retain(|toast| toast.raised_at.elapsed() < ttl);
    }

    /// Handle key events
    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key_match(key, KeyCode::Char('c'), KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match &self.overlay {
            Overlay::Ack(_) => self.handle_ack_key(key).await,
            Overlay::Bell => self.handle_bell_key(key),
            Overlay::Help => self.overlay = Overlay::None,
            Overlay::None => self.handle_global_key(key).await,
        }
    }

    async fn handle_global_key(&mut self, key: KeyEvent) {
        if is_quit(key) {
            self.should_quit = true;
            return;
        }

        match key.code {
            KeyCode::Char('?') => self.overlay = Overlay::Help,
            KeyCode::Tab => self.active_tab = self.active_tab.next(),
            KeyCode::BackTab => self.active_tab = self.active_tab.prev(),
            KeyCode::Char('1') => self.active_tab = ActiveTab::Alerts,
            KeyCode::Char('2') => self.active_tab = ActiveTab::Profile,
            KeyCode::Char('n') => self.open_bell().await,
            code => {
                if self.active_tab == ActiveTab::Alerts {
                    self.handle_alerts_key(code);
                }
            }
        }
    }

    fn handle_alerts_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('f') => {
                self.filter = self.filter.toggle();
                self.highlight = None;
                let len = self.displayed().len();
                self.alerts_state
                    .select(if len == 0 { None } else { Some(0) });
                return;
            }
            KeyCode::Char('a') => {
                self.open_ack();
                return;
            }
            _ => {}
        }

        let len = self.displayed().len();
        if len == 0 {
            return;
        }

        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                let i = self.alerts_state.selected().unwrap_or(0);
                self.alerts_state.select(Some(i.saturating_sub(1)));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let i = self.alerts_state.selected().unwrap_or(0);
                self.alerts_state.select(Some((i + 1).min(len - 1)));
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.alerts_state.select(Some(0));
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.alerts_state.select(Some(len - 1));
            }
            _ => {}
        }
    }

    /// Open the notification panel: everything currently loaded becomes seen
    async fn open_bell(&mut self) {
        mark_seen(&self.feed, &mut self.seen);
        if let Err(e) = self.seen_store.save(&self.seen).await {
            error!(error = %e, "failed to persist seen alerts");
        }
        self.unread = 0;
        self.bell_state
            .select(if self.feed.is_empty() { None } else { Some(0) });
        self.overlay = Overlay::Bell;
    }

    fn handle_bell_key(&mut self, key: KeyEvent) {
        let shown = self.feed.len().min(self.panel_limit);
        match key.code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => {
                self.overlay = Overlay::None;
            }
            KeyCode::Up | KeyCode::Char('k') if shown > 0 => {
                let i = self.bell_state.selected().unwrap_or(0);
                self.bell_state.select(Some(i.saturating_sub(1)));
            }
            KeyCode::Down | KeyCode::Char('j') if shown > 0 => {
                let i = self.bell_state.selected().unwrap_or(0);
                self.bell_state.select(Some((i + 1).min(shown - 1)));
            }
            KeyCode::Enter => {
                let fingerprint = self
                    .bell_state
                    .selected()
                    .and_then(|i| self.feed.get(i))
                    .map(|alert| alert.fingerprint.clone());
                if let Some(fingerprint) = fingerprint {
                    self.jump_to_alert(&fingerprint);
                }
            }
            _ => {}
        }
    }

    /// Deep-link from the bell panel to the alerts view
    fn jump_to_alert(&mut self, fingerprint: &str) {
        self.overlay = Overlay::None;
        self.active_tab = ActiveTab::Alerts;
        // Bell entries are unresolved by construction.
        self.filter = AlertFilter::Active;
        self.highlight = Some(fingerprint.to_string());

        let position = self
            .displayed()
            .iter()
            .position(|view| view.fingerprint == fingerprint);
        if let Some(position) = position {
            self.alerts_state.select(Some(position));
        }
    }

    fn open_ack(&mut self) {
        if !self.viewer.capability().can_acknowledge() {
            self.set_status("Your access level cannot resolve alerts".to_string());
            return;
        }

        let target = self
            .alerts_state
            .selected()
            .and_then(|i| self.displayed().get(i).copied().cloned());
        let Some(alert) = target else {
            return;
        };
        if alert.is_resolved() {
            self.set_status("Alert is already resolved".to_string());
            return;
        }

        let mut input = TextArea::default();
        input.set_placeholder_text("Correction details...");

        self.overlay = Overlay::Ack(AckDialog {
            alert_id: alert.alert_id,
            machine_name: alert.machine_name.clone(),
            input,
            error: None,
        });
    }

    async fn handle_ack_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.overlay = Overlay::None,
            KeyCode::Enter => self.submit_ack().await,
            _ => {
                if let Overlay::Ack(dialog) = &mut self.overlay {
                    dialog.input.input(tui_textarea::Input::from(key));
                }
            }
        }
    }

    /// Submit the acknowledgment dialog
    ///
    /// An empty note blocks submission without touching the network; a
    /// failed request keeps the dialog open with the underlying message.
    async fn submit_ack(&mut self) {
        let (alert_id, note) = match &self.overlay {
            Overlay::Ack(dialog) => (
                dialog.alert_id,
                dialog.input.lines().join("\n").trim().to_string(),
            ),
            _ => return,
        };

        if note.is_empty() {
            if let Overlay::Ack(dialog) = &mut self.overlay {
                dialog.error = Some("A resolution note is required.".to_string());
            }
            return;
        }

        match self.client.acknowledge_alert(alert_id, &note).await {
            Ok(()) => {
                self.overlay = Overlay::None;
                self.set_status(format!("Alert {alert_id} acknowledged"));
                self.refresh_now().await;
            }
            Err(e) => {
                if let Overlay::Ack(dialog) = &mut self.overlay {
                    dialog.error = Some(format!("Acknowledgment failed: {e}"));
                }
            }
        }
    }

    /// Refresh both alert sets outside the poll cadence
    async fn refresh_now(&mut self) {
        match self.feed_source.history(&self.viewer).await {
            Ok(views) => self.on_feed_history(views),
            Err(e) => {
                warn!(error = %e, "history refresh failed");
                self.error_banner = Some("Failed to load alerts.".to_string());
            }
        }
        match self.feed_source.active(&self.viewer).await {
            Ok(views) => self.on_feed(views),
            Err(e) => warn!(error = %e, "feed refresh failed"),
        }
    }

    /// Spawn the two background pollers
    ///
    /// Each pushes into the event channel on its own 15-second cadence; the
    /// tasks end once the channel closes on dashboard teardown. A failed
    /// bell-feed cycle is only logged; a failed history cycle additionally
    /// raises the alerts-view banner.
    fn spawn_pollers(&self, tx: mpsc::UnboundedSender<Event>) {
        let feed = self.feed_source.clone();
        let viewer = self.viewer.clone();
        let interval = self.poll_interval;
        let feed_tx = tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match feed.active(&viewer).await {
                    Ok(views) => {
                        if feed_tx.send(Event::FeedUpdated(views)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "alert feed refresh failed"),
                }
            }
        });

        let feed = self.feed_source.clone();
        let viewer = self.viewer.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let event = match feed.history(&viewer).await {
                    Ok(views) => Event::HistoryUpdated(views),
                    Err(e) => {
                        warn!(error = %e, "alert history refresh failed");
                        Event::FetchFailed("Failed to load alerts.".to_string())
                    }
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        });
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> crate::error::Result<()> {
        use crossterm::{
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        };
        use ratatui::{backend::CrosstermBackend, Terminal};
        use std::io;

        // Read-state from earlier sessions suppresses re-announcements.
        self.seen = self.seen_store.load().await;

        // Setup terminal
        enable_raw_mode().map_err(|e| Error::tui(e.to_string()))?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(|e| Error::tui(e.to_string()))?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).map_err(|e| Error::tui(e.to_string()))?;

        // Create event handler and pollers
        let mut events = EventHandler::new(250);
        events.start();
        self.spawn_pollers(events.sender());

        // Main loop
        while !self.should_quit {
            // Draw UI
            terminal
                .draw(|frame| super::ui::draw(frame, self))
                .map_err(|e| Error::tui(e.to_string()))?;

            // Handle events
            if let Some(event) = events.next().await {
                match event {
                    Event::Key(key) => self.handle_key(key).await,
                    Event::Tick => self.on_tick(),
                    Event::FeedUpdated(views) => self.on_feed(views),
                    Event::HistoryUpdated(views) => self.on_feed_history(views),
                    Event::FetchFailed(message) => self.error_banner = Some(message),
                    Event::Resize(_, _) | Event::Mouse(_) => {}
                }
            }
        }

        // Restore terminal
        disable_raw_mode().map_err(|e| Error::tui(e.to_string()))?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| Error::tui(e.to_string()))?;
        terminal
            .show_cursor()
            .map_err(|e| Error::tui(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::models::Severity;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn view(alert_id: i64, machine_id: i64, resolved: bool) -> AlertView {
        AlertView {
            fingerprint: format!("alert:{alert_id}:{machine_id}"),
            alert_id,
            machine_id,
            machine_name: format!("Node {machine_id}"),
            severity: Severity::Warning,
            ratio: Some(1.3),
            triggered_at: None,
            acknowledged_by: resolved.then_some(42),
            resolver_name: None,
            comments: None,
            reading_id: None,
        }
    }

    fn test_app() -> App {
        let config = Config::default();
        let client = Arc::new(ApiClient::new(&ApiConfig::default()).unwrap());
        let viewer: User =
            serde_json::from_value(json!({ "id": 2, "rights": 2, "requested_machines": [5] }))
                .unwrap();
        App::new(&config, client, Arc::new(MemoryStore::new()), viewer)
    }

    #[test]
    fn first_feed_counts_unread_without_toasts() {
        let mut app = test_app();
        app.on_feed(vec![view(1, 5, false), view(2, 5, false)]);

        assert_eq!(app.unread, 2);
        assert!(app.toasts.is_empty());
    }

    #[test]
    fn later_feed_raises_toasts_for_new_alerts() {
        let mut app = test_app();
        app.on_feed(vec![view(1, 5, false)]);
        app.on_feed(vec![view(1, 5, false), view(2, 5, false)]);

        assert_eq!(app.toasts.len(), 1);
        assert_eq!(app.unread, 2);
    }

    #[tokio::test]
    async fn opening_bell_marks_everything_seen() {
        let mut app = test_app();
        app.on_feed(vec![view(1, 5, false), view(2, 5, false)]);

        app.open_bell().await;

        assert_eq!(app.unread, 0);
        assert!(matches!(app.overlay, Overlay::Bell));

        // The same alerts stay read on the next cycle.
        app.on_feed(vec![view(1, 5, false), view(2, 5, false)]);
        assert_eq!(app.unread, 0);
    }

    #[test]
    fn filter_splits_active_and_resolved() {
        let mut app = test_app();
        app.on_feed_history(vec![view(1, 5, false), view(2, 5, true)]);

        assert_eq!(app.displayed().len(), 1);
        assert_eq!(app.displayed()[0].alert_id, 1);

        app.filter = app.filter.toggle();
        assert_eq!(app.displayed().len(), 1);
        assert_eq!(app.displayed()[0].alert_id, 2);
    }

    #[test]
    fn bell_jump_highlights_the_alert() {
        let mut app = test_app();
        app.on_feed(vec![view(1, 5, false), view(2, 5, false)]);
        app.on_feed_history(vec![view(1, 5, false), view(2, 5, false)]);

        app.jump_to_alert("alert:2:5");

        assert_eq!(app.active_tab, ActiveTab::Alerts);
        assert_eq!(app.highlight.as_deref(), Some("alert:2:5"));
        assert_eq!(app.alerts_state.selected(), Some(1));
    }

    #[tokio::test]
    async fn empty_note_blocks_submission() {
        let mut app = test_app();
        app.overlay = Overlay::Ack(AckDialog {
            alert_id: 7,
            machine_name: "Node 5".to_string(),
            input: TextArea::default(),
            error: None,
        });

        app.submit_ack().await;

        match &app.overlay {
            Overlay::Ack(dialog) => {
                assert_eq!(dialog.error.as_deref(), Some("A resolution note is required."));
            }
            _ => panic!("dialog should stay open"),
        }
    }

    #[test]
    fn read_only_viewer_cannot_open_ack_dialog() {
        let config = Config::default();
        let client = Arc::new(ApiClient::new(&ApiConfig::default()).unwrap());
        let viewer: User = serde_json::from_value(json!({ "id": 3, "rights": 4 })).unwrap();
        let mut app = App::new(&config, client, Arc::new(MemoryStore::new()), viewer);

        app.on_feed_history(vec![view(1, 5, false)]);
        app.alerts_state.select(Some(0));
        app.open_ack();

        assert!(matches!(app.overlay, Overlay::None));
    }
}
