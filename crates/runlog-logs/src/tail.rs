//! Live tail of one run's log
//!
//! A [`TailStreamer`] replays the backlog, then follows the file through
//! change events until the log is removed, the sink goes away, or its
//! cancellation token fires. Truncation and replacement are derived from the
//! reader's own position, not from the kind of event that woke it up.

use async_trait::async_trait;
use runlog_core::{Error, Result, RunId};
use runlog_watch::{ChangeEvent, ChangeNotifier, Subscription};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::reader::{FileState, LogReader};
use crate::store::RunLogStore;

/// Destination for streamed lines
#[async_trait]
pub trait LineSink: Send {
    /// Deliver one line (without terminator) and flush it to the client.
    /// An error means the receiving side is gone.
    async fn send_line(&mut self, line: String) -> Result<()>;
}

#[async_trait]
impl LineSink for mpsc::Sender<String> {
    async fn send_line(&mut self, line: String) -> Result<()> {
        self.send(line).await.map_err(|_| Error::SinkClosed)
    }
}

/// Where the streamer is in its lifecycle, traced on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailState {
    Draining,
    Waiting,
    Terminated,
}

/// Why a stream ended normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOutcome {
    Cancelled,
    Removed,
    SinkClosed,
}

/// Follows one run's log into a sink
pub struct TailStreamer<S> {
    run: RunId,
    reader: LogReader,
    subscription: Subscription,
    sink: S,
    cancel: CancellationToken,
    state: TailState,
    lines_sent: u64,
}

impl<S: LineSink> TailStreamer<S> {
    /// Open the log and register for its changes.
    ///
    /// Fails with `RunNotFound` for a missing log and `WatchSetup` when no watch
    /// can be established; nothing has been sent to the sink in either case.
    /// Subscribing before the backlog is read means no append can slip in
    /// between the two.
    pub async fn open(
        store: &RunLogStore,
        run: RunId,
        notifier: &ChangeNotifier,
        sink: S,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let reader = store.open_for_read(&run).await?;
        Self::follow_reader(run, reader, notifier, sink, cancel).await
    }

    /// Register for changes of an already opened log.
    ///
    /// A removal between opening and subscribing would never produce an
    /// event, so the path is checked once more with the watch in place.
    async fn follow_reader(
        run: RunId,
        reader: LogReader,
        notifier: &ChangeNotifier,
        sink: S,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let subscription = notifier.subscribe(reader.path())?;
        if reader.check().await? == FileState::Missing {
            debug!("{} was removed before its watch was in place", run);
            return Err(Error::RunNotFound(run.to_string()));
        }

        Ok(Self {
            run,
            reader,
            subscription,
            sink,
            cancel,
            state: TailState::Draining,
            lines_sent: 0,
        })
    }

    /// Stream until a terminal condition. The subscription and file handle are
    /// released before this returns.
    pub async fn run(mut self) -> Result<TailOutcome> {
        let outcome = self.stream().await;
        self.subscription.unsubscribe();
        self.set_state(TailState::Terminated);

        match &outcome {
            Ok(reason) => debug!(
                "Tail of {} ended ({:?}) after {} lines",
                self.run, reason, self.lines_sent
            ),
            Err(e) => warn!("Tail of {} failed: {}", self.run, e),
        }
        outcome
    }

    async fn stream(&mut self) -> Result<TailOutcome> {
        if let Some(outcome) = self.drain().await {
            return Ok(outcome);
        }

        loop {
            self.set_state(TailState::Waiting);

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(TailOutcome::Cancelled),
                event = self.subscription.next() => event,
            };

            if let Some(outcome) = self.on_event(event).await {
                return outcome;
            }
        }
    }

    /// React to one notification; `Some` ends the stream
    async fn on_event(&mut self, event: Option<ChangeEvent>) -> Option<Result<TailOutcome>> {
        match event {
            Some(ChangeEvent::Removed) => Some(Ok(TailOutcome::Removed)),
            Some(ChangeEvent::WatchError(e)) => {
                warn!("Watch error while following {}: {}", self.run, e);
                None
            }
            Some(ChangeEvent::Grew) | Some(ChangeEvent::TruncatedOrReplaced) => {
                self.on_activity().await.map(Ok)
            }
            None => Some(Err(Error::watch("change notifier closed"))),
        }
    }

    /// Re-stat the log and act on what changed
    async fn on_activity(&mut self) -> Option<TailOutcome> {
        let state = match self.reader.check().await {
            Ok(state) => state,
            Err(e) => {
                debug!("Stat of {} failed, waiting for next change: {}", self.run, e);
                return None;
            }
        };

        let restarted = match state {
            FileState::Unchanged | FileState::Missing => return None,
            FileState::Grew => Ok(()),
            FileState::Truncated => {
                debug!("{} was truncated, restarting from the top", self.run);
                self.reader.rewind().await
            }
            FileState::Replaced => {
                debug!("{} was replaced, restarting from the top", self.run);
                self.reader.reopen().await
            }
        };

        if let Err(e) = restarted {
            debug!("Could not restart {}: {}", self.run, e);
            return None;
        }
        self.drain().await
    }

    /// Send every complete line between the cursor and end of file
    async fn drain(&mut self) -> Option<TailOutcome> {
        self.set_state(TailState::Draining);

        loop {
            if self.cancel.is_cancelled() {
                return Some(TailOutcome::Cancelled);
            }

            let line = match self.reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    // Treated as "nothing new this round"; the next event retries
                    debug!("Read of {} failed: {}", self.run, e);
                    return None;
                }
            };

            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Some(TailOutcome::Cancelled),
                sent = self.sink.send_line(line) => sent,
            };
            if sent.is_err() {
                return Some(TailOutcome::SinkClosed);
            }
            self.lines_sent += 1;
        }
    }

    fn set_state(&mut self, state: TailState) {
        if self.state != state {
            trace!("Tail of {}: {:?} -> {:?}", self.run, self.state, state);
            self.state = state;
        }
    }
}
