//! Appliance control loop
//!
//! Polls the trigger flags, runs one capture per observed event and owns
//! every device handle so teardown happens in one place, once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::Result;
use crate::capture::CapturePipeline;
use crate::hardware::Indicator;
use crate::trigger::{TriggerEvent, TriggerFlags};
use crate::voice::WakeWordMonitor;

/// Default trigger poll interval
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Not running
    Idle,
    /// Waiting for a trigger, LED pulsing
    Signaling,
    /// Pipeline running, LED solid
    Capturing,
    /// Stopped after an unrecoverable failure
    ErrorHalt,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Signaling => write!(f, "signaling"),
            Self::Capturing => write!(f, "capturing"),
            Self::ErrorHalt => write!(f, "error-halt"),
        }
    }
}

/// Owns the monitor, the indicator and the pipeline
pub struct Orchestrator {
    state: OrchestratorState,
    flags: Arc<TriggerFlags>,
    indicator: Indicator,
    monitor: Option<WakeWordMonitor>,
    pipeline: CapturePipeline,
    poll_interval: Duration,
    captures: usize,
    torn_down: bool,
}

impl Orchestrator {
    /// Assemble the appliance
    ///
    /// `monitor` may be `None` when only the button triggers captures.
    #[must_use]
    pub fn new(
        flags: Arc<TriggerFlags>,
        indicator: Indicator,
        monitor: Option<WakeWordMonitor>,
        pipeline: CapturePipeline,
    ) -> Self {
        Self {
            state: OrchestratorState::Idle,
            flags,
            indicator,
            monitor,
            pipeline,
            poll_interval: POLL_INTERVAL,
            captures: 0,
            torn_down: false,
        }
    }

    /// Set how often flags are checked
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub const fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Captures attempted so far
    #[must_use]
    pub const fn captures(&self) -> usize {
        self.captures
    }

    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Flags this loop consumes
    #[must_use]
    pub fn flags(&self) -> Arc<TriggerFlags> {
        Arc::clone(&self.flags)
    }

    /// Run until `shutdown_rx` fires or a fatal error occurs
    ///
    /// Teardown has run by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns the unrecoverable error that halted the loop
    pub async fn run(&mut self, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
        self.signal();
        tracing::info!(poll_ms = self.poll_interval.as_millis(), "ready for triggers");

        let result = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                () = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.poll_once() {
                        break Err(e);
                    }
                }
            }
        };

        self.teardown();
        result
    }

    /// Service at most one pending trigger
    ///
    /// Returns the event serviced, if any. Recoverable pipeline failures are
    /// logged and the loop returns to signaling.
    ///
    /// # Errors
    ///
    /// Returns the error after moving to [`OrchestratorState::ErrorHalt`] and
    /// tearing down when the failure is unrecoverable
    pub fn poll_once(&mut self) -> Result<Option<TriggerEvent>> {
        if self.torn_down {
            return Ok(None);
        }
        let Some(event) = self.flags.take_next() else {
            return Ok(None);
        };

        self.state = OrchestratorState::Capturing;
        self.indicator.on();
        self.captures += 1;
        tracing::info!(%event, capture = self.captures, "capture started");

        match self.pipeline.run(event) {
            Ok(outcome) => {
                tracing::info!(%event, ?outcome, "capture finished");
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(%event, error = %e, "unrecoverable failure, halting");
                self.state = OrchestratorState::ErrorHalt;
                self.teardown();
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(%event, error = %e, "capture failed");
            }
        }

        self.signal();
        Ok(Some(event))
    }

    /// Release the audio stream, the classifier and the indicator
    ///
    /// The camera is only held inside a capture, so it is already closed
    /// here. Later calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        self.indicator.shutdown();

        if self.state != OrchestratorState::ErrorHalt {
            self.state = OrchestratorState::Idle;
        }
        tracing::info!(state = %self.state, captures = self.captures, "teardown complete");
    }

    fn signal(&mut self) {
        self.state = OrchestratorState::Signaling;
        self.indicator.pulse();
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}
