//! Session state machine
//!
//! A session groups page views by recency: activity within the idle
//! window continues the stored session, a longer gap rolls it over into
//! a fresh one that remembers its predecessor for exactly one event
//! batch. All state round-trips through the key-value store so sessions
//! survive page loads.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use beacon_core::context::{PreviousSession, SessionProperties};
use beacon_store::{SharedStore, StoreOptions};

/// Idle gap after which a stored session rolls over, in milliseconds.
pub const MAX_SESSION_DURATION_MS: i64 = 1_800_000;

/// Store key for the current session id.
pub const SESSION_ID_KEY: &str = "psmSessionId";
/// Store key for the session start timestamp.
pub const SESSION_START_KEY: &str = "psmSessionStart";
/// Store key for the last activity timestamp.
pub const LAST_ACTIVE_KEY: &str = "psmLastActiveTimestamp";
/// Store key for the page load counter.
pub const PAGE_LOAD_ID_KEY: &str = "psmPageLoadId";

/// Computes and persists session state over a key-value store.
pub struct SessionEngine {
    store: SharedStore,
    options: StoreOptions,
    current: RwLock<SessionProperties>,
}

impl SessionEngine {
    /// Create an engine over `store`, writing with the given cookie
    /// scoping. No state is read or written until
    /// [`SessionEngine::establish`] runs.
    pub fn new(store: SharedStore, options: StoreOptions) -> Self {
        Self {
            store,
            options,
            current: RwLock::new(SessionProperties::default()),
        }
    }

    /// The most recently established snapshot.
    pub fn current(&self) -> SessionProperties {
        self.current.read().clone()
    }

    /// Establish the session for the current moment: continue the stored
    /// session when the idle gap allows it, otherwise start a new one.
    /// Persists the resulting state and returns the snapshot.
    ///
    /// `initial_page_load` marks the first establishment of a page
    /// lifetime; only that call advances the page load counter on a
    /// continued session.
    pub fn establish(&self, initial_page_load: bool) -> SessionProperties {
        let now = Utc::now();
        let now_iso = iso_millis(&now);

        let mut properties = SessionProperties {
            is_session_start: true,
            pageloadid: self.page_load_id(true, initial_page_load),
            previous_session: None,
            last_active_timestamp: now_iso.clone(),
            session_start: now_iso,
            session_duration: 0,
            sessionid: Uuid::new_v4().to_string(),
        };

        let stored_id = self.store.get(SESSION_ID_KEY);
        let stored_start = self.store.get(SESSION_START_KEY).and_then(parse_iso);
        let stored_last_active = self.store.get(LAST_ACTIVE_KEY).and_then(parse_iso);

        match (stored_id, stored_start, stored_last_active) {
            (Some(prev_id), Some(prev_start), Some(prev_last_active)) => {
                let idle_ms = now.timestamp_millis() - prev_last_active.timestamp_millis();

                if idle_ms > MAX_SESSION_DURATION_MS {
                    info!(
                        sessionid = %prev_id,
                        idle_seconds = idle_ms / 1000,
                        "session timed out, starting a new one"
                    );
                    properties.previous_session = Some(PreviousSession {
                        sessionid: prev_id,
                        session_duration: (prev_last_active.timestamp_millis()
                            - prev_start.timestamp_millis())
                            / 1000,
                        last_active_timestamp: iso_millis(&prev_last_active),
                        session_start: iso_millis(&prev_start),
                    });
                } else {
                    debug!(
                        sessionid = %prev_id,
                        idle_seconds = idle_ms / 1000,
                        "session still active, updating last active timestamp"
                    );
                    properties = SessionProperties {
                        is_session_start: false,
                        pageloadid: self.page_load_id(false, initial_page_load),
                        previous_session: None,
                        last_active_timestamp: iso_millis(&now),
                        session_start: iso_millis(&prev_start),
                        session_duration: (now.timestamp_millis()
                            - prev_start.timestamp_millis())
                            / 1000,
                        sessionid: prev_id,
                    };
                }
            }
            // Unreadable stored state starts fresh with no predecessor.
            _ => info!("creating new session"),
        }

        self.store
            .set(SESSION_ID_KEY, &properties.sessionid, &self.options);
        self.store.set(
            LAST_ACTIVE_KEY,
            &properties.last_active_timestamp,
            &self.options,
        );
        self.store
            .set(SESSION_START_KEY, &properties.session_start, &self.options);
        self.store.set(
            PAGE_LOAD_ID_KEY,
            &properties.pageloadid.to_string(),
            &self.options,
        );

        *self.current.write() = properties.clone();
        properties
    }

    /// Clear the one-batch fields after a submission: `isSessionStart`
    /// drops to false and the previous-session record is released.
    /// Idempotent.
    pub fn reset_new_session_fields(&self) {
        let mut current = self.current.write();
        current.is_session_start = false;
        current.previous_session = None;
    }

    /// Page load counter: 1 on session start; on a continued session the
    /// stored counter, advanced once per page lifetime. An unreadable
    /// stored counter restarts at 1.
    fn page_load_id(&self, session_start: bool, initial_page_load: bool) -> i64 {
        if session_start {
            return 1;
        }
        let stored = self
            .store
            .get(PAGE_LOAD_ID_KEY)
            .and_then(|s| s.trim().parse::<i64>().ok());
        match stored {
            Some(n) if initial_page_load => n + 1,
            Some(n) => n,
            None => 1,
        }
    }
}

fn iso_millis(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_iso(text: String) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
