//! Progress reporting for in-flight requests.
//!
//! Observers receive human-readable status lines. A failing observer is
//! logged and otherwise ignored; it never affects dispatch.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// One step of a request's progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Dispatched { role: String },
    Started { role: String },
    Succeeded { role: String },
    Failed { role: String, error: String },
    SynthesisStarted,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Dispatched { role } => write!(f, "🚀 Démarrage {role}..."),
            ProgressEvent::Started { role } => write!(f, "⚙️ {role} en cours..."),
            ProgressEvent::Succeeded { role } => write!(f, "✅ {role} terminé !"),
            ProgressEvent::Failed { role, error } => write!(f, "❌ Erreur {role} : {error}"),
            ProgressEvent::SynthesisStarted => write!(f, "📝 Résumé en cours..."),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("progress observer failed: {0}")]
pub struct ProgressError(pub String);

/// Receives status lines.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, status: &str) -> Result<(), ProgressError>;
}

impl<F> ProgressObserver for F
where
    F: Fn(&str) -> Result<(), ProgressError> + Send + Sync,
{
    fn on_progress(&self, status: &str) -> Result<(), ProgressError> {
        self(status)
    }
}

/// Forwards status lines into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver(pub UnboundedSender<String>);

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, status: &str) -> Result<(), ProgressError> {
        self.0
            .send(status.to_string())
            .map_err(|_| ProgressError("progress receiver dropped".to_string()))
    }
}

/// Cheap-to-clone handle shared by every task of a request.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ProgressReporter {
    pub fn new(observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    /// A reporter that drops every event.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn channel(sender: UnboundedSender<String>) -> Self {
        Self::new(Arc::new(ChannelObserver(sender)))
    }

    /// A reporter for one dispatched batch, cut off from this reporter's
    /// observer when the returned [`ProgressLink`] is dropped.
    ///
    /// Tasks abandoned at the deadline keep their reporter; once the link is
    /// gone their events are discarded and they no longer hold the observer
    /// (and with it, for example, a channel sender) alive.
    pub fn detachable(&self) -> (ProgressReporter, ProgressLink) {
        let relay = Arc::new(DetachableObserver {
            inner: Mutex::new(self.observer.clone()),
        });
        let reporter = ProgressReporter::new(relay.clone());
        (reporter, ProgressLink { relay })
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Err(e) = observer.on_progress(&event.to_string()) {
            warn!(error = %e, "progress observer rejected an event");
        }
    }
}

struct DetachableObserver {
    inner: Mutex<Option<Arc<dyn ProgressObserver>>>,
}

impl DetachableObserver {
    fn current(&self) -> Option<Arc<dyn ProgressObserver>> {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn disconnect(&self) {
        let released = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(released);
    }
}

impl ProgressObserver for DetachableObserver {
    fn on_progress(&self, status: &str) -> Result<(), ProgressError> {
        match self.current() {
            Some(observer) => observer.on_progress(status),
            None => Ok(()),
        }
    }
}

/// Keeps a [`ProgressReporter::detachable`] reporter connected.
pub struct ProgressLink {
    relay: Arc<DetachableObserver>,
}

impl fmt::Debug for ProgressLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressLink").finish_non_exhaustive()
    }
}

impl Drop for ProgressLink {
    fn drop(&mut self) {
        self.relay.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_status_lines() {
        let role = "🔍 Recherches".to_string();
        assert_eq!(
            ProgressEvent::Dispatched { role: role.clone() }.to_string(),
            "🚀 Démarrage 🔍 Recherches..."
        );
        assert_eq!(
            ProgressEvent::Started { role: role.clone() }.to_string(),
            "⚙️ 🔍 Recherches en cours..."
        );
        assert_eq!(
            ProgressEvent::Succeeded { role: role.clone() }.to_string(),
            "✅ 🔍 Recherches terminé !"
        );
        assert_eq!(
            ProgressEvent::Failed {
                role,
                error: "quota".to_string()
            }
            .to_string(),
            "❌ Erreur 🔍 Recherches : quota"
        );
        assert_eq!(
            ProgressEvent::SynthesisStarted.to_string(),
            "📝 Résumé en cours..."
        );
    }

    #[test]
    fn test_closure_observer_receives_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Arc::new(move |status: &str| {
            sink.lock().unwrap().push(status.to_string());
            Ok::<(), ProgressError>(())
        }));

        reporter.emit(ProgressEvent::SynthesisStarted);
        assert_eq!(*seen.lock().unwrap(), vec!["📝 Résumé en cours...".to_string()]);
    }

    #[test]
    fn test_dropped_channel_is_tolerated() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let reporter = ProgressReporter::channel(tx);
        reporter.emit(ProgressEvent::SynthesisStarted);
    }

    #[tokio::test]
    async fn test_dropping_link_releases_the_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = ProgressReporter::channel(tx);
        let (detached, link) = reporter.detachable();

        detached.emit(ProgressEvent::SynthesisStarted);
        drop(link);
        detached.emit(ProgressEvent::SynthesisStarted);
        drop(reporter);

        assert_eq!(rx.recv().await.as_deref(), Some("📝 Résumé en cours..."));
        assert_eq!(rx.recv().await, None);
        drop(detached);
    }
}
