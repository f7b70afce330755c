//! Admission-control sessions.
//!
//! A session is a client's claim on one of the training slots. The registry
//! itself never touches the filesystem: callers probe the progress record and
//! the cancel marker beforehand and hand the result in as an [`AppProbe`].

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::Serialize;
use tracing::info;

use crate::catalog::AppId;
use crate::config::TrainingLimits;
use crate::training::progress::ProgressRecord;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub client_id: String,
    pub app: AppId,
}

impl SessionKey {
    pub fn new(client_id: impl Into<String>, app: &AppId) -> Self {
        Self {
            client_id: client_id.into(),
            app: app.clone(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.client_id, self.app)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSession {
    pub client_id: String,
    pub app: AppId,
    pub started_at: DateTime<Utc>,
}

impl TrainingSession {
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.client_id.clone(), &self.app)
    }

    /// Start time on the local clock, `HH:MM:SS`.
    pub fn start_clock(&self) -> String {
        self.started_at
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

/// What the files said about an app at probe time.
#[derive(Debug, Clone)]
pub struct AppProbe {
    pub cancelled: bool,
    /// `Err` carries the read or parse failure.
    pub progress: Result<Option<ProgressRecord>, String>,
}

impl AppProbe {
    pub fn empty() -> Self {
        Self {
            cancelled: false,
            progress: Ok(None),
        }
    }

    pub fn with_progress(record: ProgressRecord) -> Self {
        Self {
            cancelled: false,
            progress: Ok(Some(record)),
        }
    }

    pub fn percent(&self) -> Option<f64> {
        match &self.progress {
            Ok(Some(record)) => Some(record.percent),
            _ => None,
        }
    }
}

/// Why the sweep dropped a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpiryReason {
    Cancelled,
    Completed,
    Stuck,
    NoProgress,
    Unreadable(String),
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryReason::Cancelled => write!(f, "cancelled"),
            ExpiryReason::Completed => write!(f, "completed"),
            ExpiryReason::Stuck => write!(f, "stuck"),
            ExpiryReason::NoProgress => write!(f, "no progress"),
            ExpiryReason::Unreadable(e) => write!(f, "unreadable progress: {}", e),
        }
    }
}

/// Decide whether `session` has expired.
///
/// - a cancel marker exists, or
/// - the progress record is at 100 %, or
/// - the session is older than the training timeout and the record's
///   timestamp is stale (a missing or unparseable timestamp counts as stale), or
/// - no record exists once the grace period has passed.
///
/// A probe that failed to read counts as expired.
pub fn expiry_reason(
    session: &TrainingSession,
    probe: &AppProbe,
    limits: &TrainingLimits,
    now: DateTime<Utc>,
) -> Option<ExpiryReason> {
    if probe.cancelled {
        return Some(ExpiryReason::Cancelled);
    }
    let age = now - session.started_at;
    match &probe.progress {
        Err(e) => Some(ExpiryReason::Unreadable(e.clone())),
        Ok(Some(record)) if record.is_complete() => Some(ExpiryReason::Completed),
        Ok(Some(record)) => {
            let stale = is_stale(record, limits.stale_progress, now);
            (age > limits.training_timeout && stale).then_some(ExpiryReason::Stuck)
        }
        Ok(None) => (age > limits.no_progress_grace).then_some(ExpiryReason::NoProgress),
    }
}

fn is_stale(record: &ProgressRecord, window: TimeDelta, now: DateTime<Utc>) -> bool {
    match record.parsed_timestamp() {
        Some(ts) => now - ts > window,
        None => true,
    }
}

/// How a fresh session for the requesting key looks.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    InProgress { percent: f64 },
    JustStarted,
    Initializing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub app_name: String,
    pub start_time: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// A live background task already trains this app, whoever asked.
    AlreadyRunning { percent: Option<f64> },
    /// This client already holds a fresh session for this app.
    SessionActive(SessionState),
    /// Every slot is taken.
    AtCapacity {
        max: usize,
        sessions: Vec<(AppId, String)>,
    },
}

impl Rejection {
    /// The app is being trained; the caller should poll instead of retrying.
    pub fn is_ongoing(&self) -> bool {
        matches!(
            self,
            Rejection::AlreadyRunning { .. } | Rejection::SessionActive(_)
        )
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::AlreadyRunning { percent: Some(p) } => write!(
                f,
                "Training masih berjalan di background ({:.1}%). Harap tunggu hingga selesai.",
                p
            ),
            Rejection::AlreadyRunning { percent: None } => {
                write!(f, "Training sedang berjalan di background. Harap tunggu.")
            }
            Rejection::SessionActive(SessionState::InProgress { percent }) => write!(
                f,
                "Training sedang berjalan ({:.1}%). Silakan tunggu atau refresh halaman untuk melihat progress.",
                percent
            ),
            Rejection::SessionActive(SessionState::JustStarted) => write!(
                f,
                "Training sedang berjalan dan baru saja dimulai. Silakan tunggu sebentar."
            ),
            Rejection::SessionActive(SessionState::Initializing) => write!(
                f,
                "Training sedang berjalan (sedang diinisialisasi). Silakan tunggu sebentar."
            ),
            Rejection::AtCapacity { max, sessions } => {
                let active: Vec<String> = sessions
                    .iter()
                    .map(|(app, clock)| format!("App: {} (dimulai {})", app, clock))
                    .collect();
                write!(
                    f,
                    "Maksimal {} training bersamaan. Sesi aktif: {}",
                    max,
                    active.join("; ")
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed,
    Rejected(Rejection),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }

    pub fn message(&self) -> String {
        match self {
            Admission::Allowed => "OK".to_string(),
            Admission::Rejected(r) => r.to_string(),
        }
    }
}

/// Active sessions keyed by `(client, app)`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionKey, TrainingSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// Sessions ordered by start time.
    pub fn snapshot(&self) -> Vec<TrainingSession> {
        let mut sessions: Vec<TrainingSession> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.app.cmp(&b.app))
        });
        sessions
    }

    /// Admission decision for `key`.
    ///
    /// `live_task` says whether the app already has a running task; `probe`
    /// is the app's on-disk state. A stale session for the same key is
    /// evicted on the way.
    pub fn admit_at(
        &mut self,
        key: &SessionKey,
        live_task: bool,
        probe: &AppProbe,
        limits: &TrainingLimits,
        now: DateTime<Utc>,
    ) -> Admission {
        if live_task {
            return Admission::Rejected(Rejection::AlreadyRunning {
                percent: probe.percent(),
            });
        }

        if let Some(existing) = self.sessions.get(key) {
            match Self::existing_state(existing, probe, limits, now) {
                Some(state) => return Admission::Rejected(Rejection::SessionActive(state)),
                None => {
                    self.sessions.remove(key);
                    info!(session = %key, "replaced finished or abandoned session");
                }
            }
        }

        if self.sessions.len() >= limits.max_concurrent {
            let sessions = self
                .snapshot()
                .into_iter()
                .map(|s| {
                    let clock = s.start_clock();
                    (s.app, clock)
                })
                .collect();
            return Admission::Rejected(Rejection::AtCapacity {
                max: limits.max_concurrent,
                sessions,
            });
        }

        Admission::Allowed
    }

    /// `Some(state)` while the existing session should keep its claim.
    fn existing_state(
        session: &TrainingSession,
        probe: &AppProbe,
        limits: &TrainingLimits,
        now: DateTime<Utc>,
    ) -> Option<SessionState> {
        if probe.cancelled {
            return None;
        }
        let past_grace = now - session.started_at > limits.no_progress_grace;
        match &probe.progress {
            Err(_) => None,
            Ok(Some(record)) if record.is_complete() => None,
            Ok(Some(record)) if record.percent > 0.0 => {
                // A record with no timestamp cannot prove staleness here.
                let stuck = record
                    .parsed_timestamp()
                    .is_some_and(|ts| now - ts > limits.stale_progress);
                (!stuck).then_some(SessionState::InProgress {
                    percent: record.percent,
                })
            }
            Ok(Some(_)) => (!past_grace).then_some(SessionState::JustStarted),
            Ok(None) => (!past_grace).then_some(SessionState::Initializing),
        }
    }

    /// Record a new session and return its key.
    pub fn start_at(&mut self, client_id: &str, app: &AppId, now: DateTime<Utc>) -> SessionKey {
        let key = SessionKey::new(client_id, app);
        self.sessions.insert(
            key.clone(),
            TrainingSession {
                client_id: client_id.to_string(),
                app: app.clone(),
                started_at: now,
            },
        );
        info!(session = %key, "started training session");
        key
    }

    /// Remove the session; a no-op when it is already gone.
    pub fn end(&mut self, key: &SessionKey) -> bool {
        let removed = self.sessions.remove(key).is_some();
        if removed {
            info!(session = %key, "ended training session");
        }
        removed
    }

    /// Remove `session` only if it is still the one that was probed.
    pub fn expire(&mut self, session: &TrainingSession, reason: &ExpiryReason) -> bool {
        let key = session.key();
        let same = self
            .sessions
            .get(&key)
            .is_some_and(|current| current.started_at == session.started_at);
        if same {
            self.sessions.remove(&key);
            info!(session = %key, reason = %reason, "cleaned up expired training session");
        }
        same
    }

    pub fn summaries_at(&self, now: DateTime<Utc>) -> Vec<SessionSummary> {
        self.snapshot()
            .into_iter()
            .map(|s| SessionSummary {
                app_name: s.app.to_string(),
                start_time: s.start_clock(),
                duration: format_duration(now - s.started_at),
            })
            .collect()
    }
}

/// `H:MM:SS`, whole seconds.
pub fn format_duration(delta: TimeDelta) -> String {
    let secs = delta.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
