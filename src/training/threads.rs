//! One live background task per app.
//!
//! Not synchronized on its own; the coordinator keeps it behind the same
//! lock as the session registry.

use std::collections::HashMap;

use tracing::debug;

use crate::catalog::AppId;

/// Anything that can report whether the task behind it has finished.
pub trait TaskLiveness: Send {
    fn is_finished(&self) -> bool;
}

impl<T: Send> TaskLiveness for tokio::task::JoinHandle<T> {
    fn is_finished(&self) -> bool {
        tokio::task::JoinHandle::is_finished(self)
    }
}

/// Identifies one registration. The generation keeps a task that outlived
/// its registration from removing a newer task for the same app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTicket {
    pub app: AppId,
    pub generation: u64,
}

struct Entry {
    generation: u64,
    handle: Box<dyn TaskLiveness>,
}

#[derive(Default)]
pub struct ThreadRegistry {
    entries: HashMap<AppId, Entry>,
    next_generation: u64,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a ticket for a task that is about to be spawned.
    pub fn ticket(&mut self, app: &AppId) -> TaskTicket {
        self.next_generation += 1;
        TaskTicket {
            app: app.clone(),
            generation: self.next_generation,
        }
    }

    /// Record the live task for `ticket.app`.
    ///
    /// Callers must have checked [`is_alive`](Self::is_alive) first; an
    /// existing entry is replaced.
    pub fn register(&mut self, ticket: &TaskTicket, handle: impl TaskLiveness + 'static) {
        self.entries.insert(
            ticket.app.clone(),
            Entry {
                generation: ticket.generation,
                handle: Box::new(handle),
            },
        );
    }

    /// Whether a live task exists for `app`. A finished entry is dropped.
    pub fn is_alive(&mut self, app: &AppId) -> bool {
        match self.entries.get(app) {
            Some(entry) if !entry.handle.is_finished() => true,
            Some(_) => {
                self.entries.remove(app);
                debug!(app = %app, "cleaned up dead training task");
                false
            }
            None => false,
        }
    }

    /// Remove the registration made with `ticket`. Returns false when the
    /// entry is gone or belongs to a newer task.
    pub fn unregister(&mut self, ticket: &TaskTicket) -> bool {
        match self.entries.get(&ticket.app) {
            Some(entry) if entry.generation == ticket.generation => {
                self.entries.remove(&ticket.app);
                true
            }
            _ => false,
        }
    }

    /// Drop every finished entry and return the apps still running.
    pub fn live_apps(&mut self) -> Vec<AppId> {
        self.entries.retain(|_, entry| !entry.handle.is_finished());
        let mut apps: Vec<AppId> = self.entries.keys().cloned().collect();
        apps.sort();
        apps
    }

    pub fn contains(&self, app: &AppId) -> bool {
        self.entries.contains_key(app)
    }
}
