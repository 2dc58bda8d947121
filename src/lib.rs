//! Sketchbooth - voice-triggered doodle camera
//!
//! Say a keyword (or press the button) and the booth photographs the scene,
//! recognizes the objects in it and prints a hand-drawn sketch of each one
//! where it stood. A second keyword prints an outline of the frame instead.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐
//! │  Microphone  │   │  Button  │
//! │ WakeWordMon. │   │  (gpio)  │
//! └──────┬───────┘   └────┬─────┘
//!        │   TriggerFlags │
//! ┌──────▼────────────────▼─────┐
//! │        Orchestrator         │──── LED
//! └──────────────┬──────────────┘
//!                │
//! ┌──────────────▼──────────────┐
//! │ CapturePipeline             │
//! │ camera → detector → sketch  │──── DrawingLookup
//! │        → printer            │
//! └─────────────────────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod drawing;
pub mod error;
pub mod hardware;
pub mod orchestrator;
pub mod trigger;
pub mod voice;

pub use capture::{CaptureOutcome, CapturePipeline, PipelineSettings};
pub use config::Config;
pub use drawing::{Drawing, DrawingLookup};
pub use error::{Error, Result};
pub use hardware::Indicator;
pub use orchestrator::{Orchestrator, OrchestratorState};
pub use trigger::{TriggerEvent, TriggerFlags};
pub use voice::WakeWordMonitor;
