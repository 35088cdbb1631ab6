//! Sync event reporting
//!
//! The synchronizer describes what happened to each repository as a
//! [`SyncEvent`] and hands it to a [`Reporter`]. The default reporter writes
//! them through `tracing`; whichever subscriber the binary installs decides
//! where they end up.

use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::sync::{FailureKind, SyncAction};

/// Notable thing that happened while synchronizing one repository
///
/// Events never carry credentials: URLs are the plain clone URLs and
/// failure details are masked before they get here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Cloned {
        repository: String,
        clone_url: String,
    },
    Fetched {
        repository: String,
        changed: bool,
    },
    UrlCorrected {
        repository: String,
    },
    Failed {
        repository: String,
        action: SyncAction,
        kind: FailureKind,
        detail: String,
    },
}

/// Sink for sync events
pub trait Reporter: Send + Sync {
    fn report(&self, event: &SyncEvent);
}

/// Reporter that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Cloned {
                repository,
                clone_url,
            } => info!("Cloned repo {} from {}", repository, clone_url),
            SyncEvent::Fetched {
                repository,
                changed: true,
            } => info!("Fetched repo {} - new changes", repository),
            SyncEvent::Fetched {
                repository,
                changed: false,
            } => info!("Fetched repo {}", repository),
            SyncEvent::UrlCorrected { repository } => {
                info!("Repo url for {} is incorrect, altering", repository)
            }
            SyncEvent::Failed {
                repository,
                action,
                kind: FailureKind::Unknown,
                detail,
            } => error!(
                repository = %repository,
                "Unexpected failure during {}: {}",
                action,
                detail
            ),
            SyncEvent::Failed {
                repository,
                action,
                kind,
                detail,
            } => {
                warn!(repository = %repository, kind = ?kind, "{}", detail);
                error!("Failed to {} repo {} ({})", action, repository, kind);
            }
        }
    }
}

/// Reporter that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.report(&SyncEvent::UrlCorrected {
            repository: "a".to_string(),
        });
        reporter.report(&SyncEvent::Fetched {
            repository: "a".to_string(),
            changed: true,
        });

        assert_eq!(
            reporter.events(),
            vec![
                SyncEvent::UrlCorrected {
                    repository: "a".to_string()
                },
                SyncEvent::Fetched {
                    repository: "a".to_string(),
                    changed: true
                },
            ]
        );
    }

    #[test]
    fn test_tracing_reporter_handles_every_event() {
        let reporter = TracingReporter;
        reporter.report(&SyncEvent::Cloned {
            repository: "a".to_string(),
            clone_url: "https://github.com/u/a.git".to_string(),
        });
        reporter.report(&SyncEvent::Failed {
            repository: "a".to_string(),
            action: SyncAction::Fetch,
            kind: FailureKind::Unknown,
            detail: "boom".to_string(),
        });
        reporter.report(&SyncEvent::Failed {
            repository: "a".to_string(),
            action: SyncAction::Clone,
            kind: FailureKind::CommandFailed,
            detail: "exit 128".to_string(),
        });
    }
}
