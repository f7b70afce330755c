//! Admission, launch and bookkeeping of background training jobs.
//!
//! Both registries live behind one mutex so that the admission check and the
//! session insert happen atomically. The lock is never held across file I/O:
//! the sweep snapshots sessions, probes their files unlocked, then takes the
//! lock again to evict.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{AppId, Catalog};
use crate::charts::ChartStore;
use crate::config::{Config, ModelPolicy, TrainingLimits};
use crate::errors::StudioError;
use crate::layout::ArtifactLayout;
use crate::nlp::TopicPipeline;
use crate::training::cancel::CancelSignal;
use crate::training::job::TrainingJob;
use crate::training::progress::{ProgressRecord, ProgressStore};
use crate::training::session::{
    Admission, AppProbe, ExpiryReason, Rejection, SessionKey, SessionRegistry, SessionSummary,
    TrainingSession, expiry_reason,
};
use crate::training::threads::{TaskLiveness, TaskTicket, ThreadRegistry};

#[derive(Default)]
struct Ledger {
    sessions: SessionRegistry,
    threads: ThreadRegistry,
}

/// Stands in for a task between admission and spawn.
struct Reserved;

impl TaskLiveness for Reserved {
    fn is_finished(&self) -> bool {
        false
    }
}

/// Result of a start request.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingRequest {
    Started { session: String },
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatus {
    pub active_sessions: usize,
    pub max_sessions: usize,
    pub can_train: bool,
    pub sessions: Vec<SessionSummary>,
}

/// Ends the session and drops the task registration when the job is done,
/// however it ends.
struct JobGuard {
    ledger: Arc<Mutex<Ledger>>,
    key: SessionKey,
    ticket: TaskTicket,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        let mut ledger = self
            .ledger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ledger.sessions.end(&self.key);
        ledger.threads.unregister(&self.ticket);
    }
}

pub struct JobCoordinator {
    layout: ArtifactLayout,
    progress: Arc<ProgressStore>,
    cancel: CancelSignal,
    charts: ChartStore,
    catalog: Catalog,
    limits: TrainingLimits,
    policy: ModelPolicy,
    pipeline: TopicPipeline,
    ledger: Arc<Mutex<Ledger>>,
}

impl JobCoordinator {
    pub fn new(config: &Config, pipeline: TopicPipeline) -> Self {
        let layout = ArtifactLayout::new(&config.state_dir);
        Self {
            progress: Arc::new(ProgressStore::new(layout.clone())),
            cancel: CancelSignal::new(layout.clone()),
            charts: ChartStore::new(layout.clone()),
            catalog: config.catalog.clone(),
            limits: config.limits,
            policy: config.policy,
            pipeline,
            ledger: Arc::new(Mutex::new(Ledger::default())),
            layout,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn charts(&self) -> &ChartStore {
        &self.charts
    }

    pub fn limits(&self) -> &TrainingLimits {
        &self.limits
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>, StudioError> {
        self.ledger.lock().map_err(|_| StudioError::LockPoisoned)
    }

    fn probe(&self, app: &AppId) -> AppProbe {
        AppProbe {
            cancelled: self.cancel.is_cancelled(Some(app)),
            progress: self.progress.try_read(Some(app)).map_err(|e| e.to_string()),
        }
    }

    /// Evict expired sessions and clean their leftover markers.
    pub fn sweep(&self) -> Result<Vec<(TrainingSession, ExpiryReason)>, StudioError> {
        self.sweep_at(Utc::now())
    }

    pub(crate) fn sweep_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(TrainingSession, ExpiryReason)>, StudioError> {
        let (sessions, live_apps) = {
            let mut ledger = self.ledger()?;
            (ledger.sessions.snapshot(), ledger.threads.live_apps())
        };

        let verdicts: Vec<(TrainingSession, ExpiryReason)> = sessions
            .into_iter()
            .filter_map(|session| {
                let probe = self.probe(&session.app);
                expiry_reason(&session, &probe, &self.limits, now).map(|r| (session, r))
            })
            .collect();
        if verdicts.is_empty() {
            return Ok(verdicts);
        }

        let expired: Vec<(TrainingSession, ExpiryReason)> = {
            let mut ledger = self.ledger()?;
            verdicts
                .into_iter()
                .filter(|(session, reason)| ledger.sessions.expire(session, reason))
                .collect()
        };

        for (session, _) in &expired {
            self.clean_markers(&session.app, live_apps.contains(&session.app));
        }
        Ok(expired)
    }

    /// Drop a non-final progress record and the cancel marker so a retry
    /// starts clean. A live task keeps its marker until it sees it.
    fn clean_markers(&self, app: &AppId, task_alive: bool) {
        let stale_progress = match self.progress.try_read(Some(app)) {
            Ok(Some(record)) => !record.is_complete(),
            Ok(None) => false,
            Err(_) => true,
        };
        if stale_progress && let Err(e) = self.progress.remove(Some(app)) {
            warn!(app = %app, error = %e, "failed to remove stale progress");
        }
        if !task_alive && let Err(e) = self.cancel.clear(Some(app)) {
            warn!(app = %app, error = %e, "failed to remove cancel marker");
        }
    }

    /// Would `client_id` be allowed to train `app` right now?
    pub fn admit(&self, client_id: &str, app: &AppId) -> Result<Admission, StudioError> {
        self.admit_at(client_id, app, Utc::now())
    }

    pub(crate) fn admit_at(
        &self,
        client_id: &str,
        app: &AppId,
        now: DateTime<Utc>,
    ) -> Result<Admission, StudioError> {
        self.sweep_at(now)?;
        let probe = self.probe(app);
        let key = SessionKey::new(client_id, app);
        let mut ledger = self.ledger()?;
        let live = ledger.threads.is_alive(app);
        Ok(ledger
            .sessions
            .admit_at(&key, live, &probe, &self.limits, now))
    }

    /// Record a session without launching a job.
    pub fn start_session(&self, client_id: &str, app: &AppId) -> Result<SessionKey, StudioError> {
        self.start_session_at(client_id, app, Utc::now())
    }

    pub(crate) fn start_session_at(
        &self,
        client_id: &str,
        app: &AppId,
        at: DateTime<Utc>,
    ) -> Result<SessionKey, StudioError> {
        Ok(self.ledger()?.sessions.start_at(client_id, app, at))
    }

    pub fn end_session(&self, client_id: &str, app: &AppId) -> Result<bool, StudioError> {
        Ok(self.ledger()?.sessions.end(&SessionKey::new(client_id, app)))
    }

    /// Admit, purge old artifacts and launch a background job.
    ///
    /// Returns as soon as the job is spawned; its fate is only visible
    /// through the progress record.
    pub fn request_training(
        &self,
        client_id: &str,
        app: &AppId,
    ) -> Result<TrainingRequest, StudioError> {
        let entry = self.catalog.require(app)?.clone();
        let now = Utc::now();
        self.sweep_at(now)?;
        let probe = self.probe(app);
        let key = SessionKey::new(client_id, app);

        // Admission, session insert and slot reservation are one step.
        let ticket = {
            let mut ledger = self.ledger()?;
            let live = ledger.threads.is_alive(app);
            match ledger
                .sessions
                .admit_at(&key, live, &probe, &self.limits, now)
            {
                Admission::Rejected(rejection) => {
                    info!(session = %key, reason = %rejection, "training request rejected");
                    return Ok(TrainingRequest::Rejected(rejection));
                }
                Admission::Allowed => {}
            }
            ledger.sessions.start_at(client_id, app, now);
            let ticket = ledger.threads.ticket(app);
            ledger.threads.register(&ticket, Reserved);
            ticket
        };

        if let Err(e) = self.prepare_run(app) {
            let mut ledger = self
                .ledger
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            ledger.sessions.end(&key);
            ledger.threads.unregister(&ticket);
            return Err(StudioError::StartFailed(e.to_string()));
        }

        let job = TrainingJob {
            app: app.clone(),
            entry,
            layout: self.layout.clone(),
            progress: Arc::clone(&self.progress),
            cancel: self.cancel.clone(),
            pipeline: self.pipeline.clone(),
            policy: self.policy,
        };
        let guard = JobGuard {
            ledger: Arc::clone(&self.ledger),
            key: key.clone(),
            ticket: ticket.clone(),
        };

        {
            let mut ledger = self
                .ledger
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let handle = tokio::spawn(async move {
                let _guard = guard;
                job.run().await;
            });
            ledger.threads.register(&ticket, handle);
        }

        info!(session = %key, "training started");
        Ok(TrainingRequest::Started {
            session: key.to_string(),
        })
    }

    /// Purge the previous run's artifacts, reset progress, clear the marker.
    fn prepare_run(&self, app: &AppId) -> Result<(), StudioError> {
        let deleted = self.layout.purge(app)?;
        if !deleted.is_empty() {
            info!(app = %app, files = ?deleted, "purged previous artifacts");
        }
        self.progress.reset(Some(app))?;
        self.cancel.clear(Some(app))?;
        Ok(())
    }

    pub fn progress(&self, app: Option<&AppId>) -> ProgressRecord {
        self.progress.read(app)
    }

    pub fn progress_store(&self) -> &ProgressStore {
        &self.progress
    }

    /// Ask a job to stop at its next checkpoint. Without an app, every live
    /// job is asked and the global marker is dropped once fanned out.
    pub fn cancel(&self, app: Option<&AppId>) -> Result<Vec<AppId>, StudioError> {
        self.cancel.request_cancel(app)?;
        let targets = match app {
            Some(app) => vec![app.clone()],
            None => {
                let live = self.ledger()?.threads.live_apps();
                for app in &live {
                    self.cancel.request_cancel(Some(app))?;
                }
                self.cancel.clear(None)?;
                live
            }
        };
        info!(apps = ?targets, "cancellation requested");
        Ok(targets)
    }

    pub fn is_training(&self, app: &AppId) -> Result<bool, StudioError> {
        Ok(self.ledger()?.threads.is_alive(app))
    }

    pub fn status(&self) -> Result<TrainingStatus, StudioError> {
        let now = Utc::now();
        self.sweep_at(now)?;
        let ledger = self.ledger()?;
        let active = ledger.sessions.len();
        Ok(TrainingStatus {
            active_sessions: active,
            max_sessions: self.limits.max_concurrent,
            can_train: active < self.limits.max_concurrent,
            sessions: ledger.sessions.summaries_at(now),
        })
    }

    /// Delete every artifact of `app`; returns the removed paths.
    pub fn purge(&self, app: &AppId) -> Result<Vec<String>, StudioError> {
        let deleted = self.layout.purge(app)?;
        info!(app = %app, files = deleted.len(), "purged artifacts");
        Ok(deleted)
    }
}
