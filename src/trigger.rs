//! Trigger flags shared between the audio callback, the button watcher and
//! the control loop
//!
//! Each event kind is a single atomic cell: raising an already pending kind
//! coalesces, consuming one kind never touches another.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

/// A request for the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    /// Recognize objects and print doodles of them
    PrintRequest,
    /// Print an edge-detected version of the frame
    EdgePrintRequest,
    /// Physical button press
    ManualRequest,
}

impl TriggerEvent {
    /// All kinds, in the order the control loop services them
    pub const ALL: [Self; 3] = [
        Self::ManualRequest,
        Self::PrintRequest,
        Self::EdgePrintRequest,
    ];

    const fn slot(self) -> usize {
        match self {
            Self::PrintRequest => 0,
            Self::EdgePrintRequest => 1,
            Self::ManualRequest => 2,
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrintRequest => write!(f, "print"),
            Self::EdgePrintRequest => write!(f, "edge-print"),
            Self::ManualRequest => write!(f, "manual"),
        }
    }
}

/// At-most-one-pending-per-kind flag set
#[derive(Debug, Default)]
pub struct TriggerFlags {
    pending: [AtomicBool; 3],
}

impl TriggerFlags {
    /// Create an empty flag set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `event` as pending
    ///
    /// Safe to call from any thread, never blocks.
    pub fn raise(&self, event: TriggerEvent) {
        self.pending[event.slot()].store(true, Ordering::SeqCst);
    }

    /// Consume `event` if pending
    ///
    /// Returns true exactly once per raise (or per run of coalesced raises).
    pub fn take(&self, event: TriggerEvent) -> bool {
        self.pending[event.slot()].swap(false, Ordering::SeqCst)
    }

    /// Consume the next pending event, if any
    pub fn take_next(&self) -> Option<TriggerEvent> {
        TriggerEvent::ALL.into_iter().find(|&event| self.take(event))
    }

    /// Check whether `event` is pending without consuming it
    #[must_use]
    pub fn is_pending(&self, event: TriggerEvent) -> bool {
        self.pending[event.slot()].load(Ordering::SeqCst)
    }
}
