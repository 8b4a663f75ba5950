//! Filesystem change notifier using notify
//!
//! Each subscription owns its own OS watch on the log's parent directory and
//! filters events down to the one file, so the watch survives the file being
//! replaced underneath it. Events are pushed into a per-subscription tokio
//! channel; the subscriber awaits them instead of polling.

use notify::event::{AccessKind, AccessMode, EventKind, ModifyKind};
use notify::{Event, PollWatcher, RecursiveMode, Watcher};
use runlog_core::{Error, NotifierBackend, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Activity on one watched log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Bytes were written to the log
    Grew,
    /// The path now names a new file (created or renamed into place).
    /// A hint only: the streamer confirms by comparing size and file identity.
    TruncatedOrReplaced,
    /// The log was unlinked or renamed away
    Removed,
    /// The watcher reported a failure; the watch stays armed
    WatchError(String),
}

/// Hands out independent subscriptions, one OS watch each
#[derive(Clone)]
pub struct ChangeNotifier {
    backend: NotifierBackend,
    active: Arc<AtomicUsize>,
}

impl ChangeNotifier {
    pub fn new(backend: NotifierBackend) -> Self {
        Self {
            backend,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of subscriptions that still hold an OS watch
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start watching `path`. The file itself need not exist, its directory must.
    pub fn subscribe(&self, path: &Path) -> Result<Subscription> {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::watch_setup(format!("Not a file path: {}", path.display())))?
            .to_os_string();

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        // Backends report canonical paths (FSEvents resolves symlinks), so match against one
        let dir = parent.canonicalize().map_err(|e| {
            Error::watch_setup(format!("Failed to resolve {}: {}", parent.display(), e))
        })?;
        let target = dir.join(file_name);

        let (tx, rx) = mpsc::unbounded_channel();
        let grew_pending = Arc::new(AtomicBool::new(false));
        let router = EventRouter {
            target: target.clone(),
            dir: dir.clone(),
            tx,
            grew_pending: Arc::clone(&grew_pending),
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.backend.poll_interval() {
            None => Box::new(
                notify::recommended_watcher(move |res: notify::Result<Event>| {
                    router.route(res)
                })
                .map_err(|e| Error::watch_setup(format!("Failed to create watcher: {}", e)))?,
            ),
            Some(interval) => Box::new(
                PollWatcher::new(
                    move |res: notify::Result<Event>| router.route(res),
                    notify::Config::default().with_poll_interval(interval),
                )
                .map_err(|e| Error::watch_setup(format!("Failed to create poll watcher: {}", e)))?,
            ),
        };

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch_setup(format!("Failed to watch {}: {}", dir.display(), e)))?;

        self.active.fetch_add(1, Ordering::SeqCst);
        debug!("Subscribed to changes of {}", target.display());

        Ok(Subscription {
            watcher: Some(watcher),
            rx,
            dir,
            path: target,
            grew_pending,
            active: Arc::clone(&self.active),
        })
    }
}

/// Runs on the notify thread: classifies raw events and forwards them
struct EventRouter {
    target: PathBuf,
    dir: PathBuf,
    tx: mpsc::UnboundedSender<ChangeEvent>,
    /// Set while a `Grew` sits unread in the channel; bursts of writes collapse into one
    grew_pending: Arc<AtomicBool>,
}

impl EventRouter {
    fn route(&self, res: notify::Result<Event>) {
        let change = match res {
            Ok(event) => match self.classify(&event) {
                Some(change) => change,
                None => return,
            },
            Err(e) => {
                warn!("Watch error on {}: {}", self.target.display(), e);
                ChangeEvent::WatchError(e.to_string())
            }
        };

        if change == ChangeEvent::Grew && self.grew_pending.swap(true, Ordering::AcqRel) {
            return;
        }

        // A closed receiver means the subscription is being torn down
        let _ = self.tx.send(change);
    }

    fn classify(&self, event: &Event) -> Option<ChangeEvent> {
        // Kernel queue overflowed: anything may have happened, make the streamer re-stat
        if event.need_rescan() {
            return Some(ChangeEvent::Grew);
        }

        if matches!(event.kind, EventKind::Remove(_)) && event.paths.iter().any(|p| *p == self.dir)
        {
            return Some(ChangeEvent::Removed);
        }

        if !event.paths.iter().any(|p| *p == self.target) {
            return None;
        }

        let change = match event.kind {
            EventKind::Remove(_) => ChangeEvent::Removed,
            EventKind::Create(_) => ChangeEvent::TruncatedOrReplaced,
            EventKind::Modify(ModifyKind::Name(_)) => {
                if self.target.exists() {
                    ChangeEvent::TruncatedOrReplaced
                } else {
                    ChangeEvent::Removed
                }
            }
            EventKind::Modify(_) => ChangeEvent::Grew,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeEvent::Grew,
            EventKind::Access(_) => return None,
            EventKind::Any | EventKind::Other => ChangeEvent::Grew,
        };

        Some(change)
    }
}

/// One subscriber's view of one log. Dropping it releases the OS watch.
pub struct Subscription {
    watcher: Option<Box<dyn Watcher + Send>>,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    dir: PathBuf,
    path: PathBuf,
    grew_pending: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    /// Wait for the next event. Cancel safe; returns `None` once unsubscribed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        if self.watcher.is_none() {
            return None;
        }

        let event = self.rx.recv().await?;
        if event == ChangeEvent::Grew {
            // Cleared before the caller re-stats, so later writes raise a fresh event
            self.grew_pending.store(false, Ordering::Release);
        }
        Some(event)
    }

    /// Release the OS watch. Safe to call more than once and after the file is gone.
    pub fn unsubscribe(&mut self) {
        let Some(mut watcher) = self.watcher.take() else {
            return;
        };

        if let Err(e) = watcher.unwatch(&self.dir) {
            debug!("Unwatch of {} failed: {}", self.dir.display(), e);
        }
        drop(watcher);
        self.rx.close();

        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!("Unsubscribed from changes of {}", self.path.display());
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Canonical path being watched
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
