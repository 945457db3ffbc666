//! Core events and their listeners.

use std::fmt;
use std::sync::Arc;

use crate::app::Application;
use crate::error::Result;

/// Events emitted by the application during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Configuration values are declared and resolved.
    ConfigInited,
    /// The builder has been selected.
    BuilderInited,
    /// The environment is about to read sources.
    EnvBeforeRead,
    /// One source document was read.
    SourceRead,
    /// The build finished, successfully or not.
    BuildFinished,
}

impl Event {
    pub fn name(self) -> &'static str {
        match self {
            Event::ConfigInited => "config-inited",
            Event::BuilderInited => "builder-inited",
            Event::EnvBeforeRead => "env-before-read-docs",
            Event::SourceRead => "source-read",
            Event::BuildFinished => "build-finished",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback invoked when an event fires.
pub type Listener = Arc<dyn Fn(&mut Application) -> Result<()> + Send + Sync>;

/// Handle returned by [`EventManager::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    event: Event,
    priority: i32,
    listener: Listener,
}

/// Listener registry. Lower priority runs first; ties run in connection
/// order.
#[derive(Default)]
pub struct EventManager {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, event: Event, priority: i32, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration {
            id,
            event,
            priority,
            listener,
        });
        id
    }

    pub fn disconnect(&mut self, id: ListenerId) {
        self.registrations.retain(|r| r.id != id);
    }

    /// Listeners for `event` in call order.
    pub fn listeners(&self, event: Event) -> Vec<Listener> {
        let mut matching: Vec<&Registration> = self
            .registrations
            .iter()
            .filter(|r| r.event == event)
            .collect();
        matching.sort_by_key(|r| r.priority);
        matching.into_iter().map(|r| Arc::clone(&r.listener)).collect()
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventManager")
            .field("listeners", &self.registrations.len())
            .finish()
    }
}
