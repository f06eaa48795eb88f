use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::schedule::forecast::RefreshMark;

/// Everything the scheduler components share: last poll/send instants,
/// currently active alert data, and the observed display state. One
/// process-wide instance, mutated only through [`SharedState`] accessors.
#[derive(Debug, Default)]
struct Session {
    last_forecast_mark: Option<RefreshMark>,
    last_alert_poll: Option<NaiveDateTime>,
    last_storm_poll: Option<DateTime<Utc>>,
    active_alert: Option<ActiveAlertState>,
    active_storms: BTreeSet<String>,
    display_active: Option<bool>,
    last_send_at: Option<NaiveDateTime>,
    last_send_crc: Option<u32>,
    resend_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAlertState {
    pub id: String,
    pub headline: String,
}

/// Cloneable handle over the session record. Every method acquires the lock,
/// mutates, and releases before returning; no lock is ever held across I/O.
/// The shutdown flag lives beside the lock so signal handlers and the
/// background poller can check it without contending for the mutex.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<Session>>,
    running: Arc<AtomicBool>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Session::default())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // A poisoned lock only means a panicking thread died mid-update;
        // the session data is still the best state we have.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn last_forecast_mark(&self) -> Option<RefreshMark> {
        self.lock().last_forecast_mark
    }

    /// Recorded when a refresh fires, success or not, so a refresh happens
    /// at most once per anchor hour.
    pub fn mark_forecast_fired(&self, mark: RefreshMark) {
        self.lock().last_forecast_mark = Some(mark);
    }

    pub fn last_alert_poll(&self) -> Option<NaiveDateTime> {
        self.lock().last_alert_poll
    }

    /// Updated unconditionally on every poll attempt, even failed ones, so
    /// a broken feed cannot cause a tight retry loop. Never moves backward.
    pub fn record_alert_poll(&self, at: NaiveDateTime) {
        let mut session = self.lock();
        session.last_alert_poll = Some(session.last_alert_poll.map_or(at, |prev| prev.max(at)));
    }

    pub fn last_storm_poll(&self) -> Option<DateTime<Utc>> {
        self.lock().last_storm_poll
    }

    pub fn record_storm_poll(&self, at: DateTime<Utc>) {
        let mut session = self.lock();
        session.last_storm_poll = Some(session.last_storm_poll.map_or(at, |prev| prev.max(at)));
    }

    pub fn active_alert(&self) -> Option<ActiveAlertState> {
        self.lock().active_alert.clone()
    }

    /// Replace the cached alert from a successful poll. `None` means the
    /// feed reported no matching entries, which is exactly when the cached
    /// id clears. Returns true when active/inactive status flipped, in
    /// which case an out-of-band resend is queued.
    pub fn update_active_alert(&self, alert: Option<ActiveAlertState>) -> bool {
        let mut session = self.lock();
        let transitioned = session.active_alert.is_some() != alert.is_some();
        session.active_alert = alert;
        if transitioned {
            session.resend_requested = true;
        }
        transitioned
    }

    pub fn active_storms(&self) -> BTreeSet<String> {
        self.lock().active_storms.clone()
    }

    /// Replace the cached storm set from a successful poll. Returns true
    /// when storms appeared or disappeared entirely; the resend flag is
    /// queued on that transition.
    pub fn update_active_storms(&self, storms: BTreeSet<String>) -> bool {
        let mut session = self.lock();
        let transitioned = session.active_storms.is_empty() != storms.is_empty();
        session.active_storms = storms;
        if transitioned {
            session.resend_requested = true;
        }
        transitioned
    }

    pub fn resend_requested(&self) -> bool {
        self.lock().resend_requested
    }

    pub fn request_resend(&self) {
        self.lock().resend_requested = true;
    }

    pub fn clear_resend_request(&self) {
        self.lock().resend_requested = false;
    }

    /// Record the observed window state; returns the previous observation
    /// so the loop can act on transitions.
    pub fn set_display_active(&self, active: bool) -> Option<bool> {
        let mut session = self.lock();
        session.display_active.replace(active)
    }

    pub fn display_active(&self) -> Option<bool> {
        self.lock().display_active
    }

    pub fn record_send(&self, at: NaiveDateTime, crc: u32) {
        let mut session = self.lock();
        session.last_send_at = Some(session.last_send_at.map_or(at, |prev| prev.max(at)));
        session.last_send_crc = Some(crc);
    }

    pub fn last_send(&self) -> Option<(NaiveDateTime, u32)> {
        let session = self.lock();
        match (session.last_send_at, session.last_send_crc) {
            (Some(at), Some(crc)) => Some((at, crc)),
            _ => None,
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
