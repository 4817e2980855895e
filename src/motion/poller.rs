//! Fixed-delay poll loop.
//!
//! Each cycle queries the source, feeds a successful result to the tracker
//! and dispatches any transition. The next cycle is scheduled only after the
//! previous one has finished, so there is never more than one query in
//! flight and the tracker is only touched from this task.

use super::{StateTracker, TransitionDispatcher, TransitionEvent};
use crate::input::MotionSource;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Drives the poll/compare/dispatch loop for one motion source.
pub struct MotionPoller<S> {
    source: S,
    tracker: StateTracker,
    dispatcher: TransitionDispatcher,
    interval: Duration,
    cancel: CancellationToken,
}

impl<S: MotionSource + 'static> MotionPoller<S> {
    pub fn new(
        source: S,
        dispatcher: TransitionDispatcher,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            tracker: StateTracker::new(),
            dispatcher,
            interval,
            cancel,
        }
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Run one cycle. Returns the transition it dispatched, if any.
    ///
    /// A failed query leaves the tracker and both sinks untouched.
    pub async fn poll_once(&mut self) -> Option<TransitionEvent> {
        let state = match self.source.query_motion_state().await {
            Ok(state) => state,
            Err(e) if e.is_malformed() => {
                warn!("[Poll] Unexpected camera response, keeping previous state: {}", e);
                return None;
            }
            Err(e) => {
                warn!("[Poll] Camera query failed, keeping previous state: {}", e);
                return None;
            }
        };

        debug!("[Poll] Camera reports {:?}", state);
        let event = self.tracker.observe(state)?;
        self.dispatcher.on_transition(event);
        Some(event)
    }

    /// Poll until cancelled. The first poll happens immediately.
    pub async fn run(mut self) {
        info!(
            "[Poll] Polling every {} ms, publishing to {}",
            self.interval.as_millis(),
            self.dispatcher.topic()
        );

        let cancel = self.cancel.clone();
        loop {
            // An in-flight query may be abandoned; a dispatch never is.
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.poll_once() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("[Poll] Stopped");
    }

    /// Spawn the loop on the runtime.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
