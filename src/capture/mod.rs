//! Capture pipeline
//!
//! One invocation per trigger: take a picture, turn it into a print, send
//! it. The camera is held only for the duration of the shot; the printer is
//! held for the lifetime of the pipeline.

mod camera;
mod detector;
mod printer;
mod render;

use image::{GrayImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use camera::{Camera, CameraSession, CommandCamera};
pub use detector::{BoundingBox, CommandDetector, Detection, DetectionResult, ObjectDetector};
pub use printer::{CommandPrinter, Printer, SpoolPrinter};
pub use render::{EdgeSettings, compose_scene, edge_image, fit_width};

use crate::Result;
use crate::drawing::{DRAWINGS_PER_CATEGORY, DrawingLookup};
use crate::trigger::TriggerEvent;

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Frames thrown away so exposure can settle
    pub discard_frames: usize,
    /// Minimum detector score for an object to be drawn
    pub score_threshold: f32,
    /// Edge-print parameters
    pub edge: EdgeSettings,
    /// Printer width in pixels; `None` prints at camera resolution
    pub print_width: Option<u32>,
    /// Blank lines fed after each print
    pub feed_lines: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            discard_frames: 5,
            score_threshold: 0.5,
            edge: EdgeSettings::default(),
            print_width: Some(384),
            feed_lines: 3,
        }
    }
}

/// What a capture produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Doodles of the recognized objects were printed
    Printed {
        /// Number of objects drawn
        objects: usize,
    },
    /// Nothing scored above the threshold; the printer was not used
    NothingRecognized,
    /// The edge image was printed
    EdgePrinted,
}

/// Camera → detector → drawings → printer
pub struct CapturePipeline {
    camera: Box<dyn Camera>,
    detector: Box<dyn ObjectDetector>,
    drawings: DrawingLookup,
    printer: Box<dyn Printer>,
    settings: PipelineSettings,
    rng: StdRng,
}

impl CapturePipeline {
    /// Assemble a pipeline
    ///
    /// `drawings` must already be set up.
    #[must_use]
    pub fn new(
        camera: Box<dyn Camera>,
        detector: Box<dyn ObjectDetector>,
        drawings: DrawingLookup,
        printer: Box<dyn Printer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            camera,
            detector,
            drawings,
            printer,
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed seed for drawing selection
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Drawing lookup in use
    #[must_use]
    pub const fn drawings(&self) -> &DrawingLookup {
        &self.drawings
    }

    /// Run the capture `event` asks for
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the camera can't be opened (fatal), or
    /// the error that aborted this capture
    pub fn run(&mut self, event: TriggerEvent) -> Result<CaptureOutcome> {
        match event {
            TriggerEvent::PrintRequest | TriggerEvent::ManualRequest => self.recognition_print(),
            TriggerEvent::EdgePrintRequest => self.edge_print(),
        }
    }

    /// Print doodles of whatever the camera sees
    ///
    /// # Errors
    ///
    /// See [`CapturePipeline::run`]
    pub fn recognition_print(&mut self) -> Result<CaptureOutcome> {
        let frame = self.take_picture()?;
        let detections = self.detector.detect(&frame)?;

        let mut items = Vec::new();
        for detection in detections.above(self.settings.score_threshold) {
            let name = self
                .detector
                .class_name(detection.class_id)
                .map_or_else(|| detection.class_id.to_string(), ToString::to_string);
            let index = self.rng.gen_range(0..DRAWINGS_PER_CATEGORY);
            let drawing = self.drawings.get(&name, index)?;

            tracing::debug!(
                class = %name,
                category = self.drawings.resolve(&name),
                index,
                score = detection.score,
                "object recognized"
            );
            items.push((detection.bbox, drawing));
        }

        if items.is_empty() {
            tracing::info!(detections = detections.len(), "nothing recognized, skipping print");
            return Ok(CaptureOutcome::NothingRecognized);
        }

        let scene = compose_scene(frame.width(), frame.height(), &items);
        self.print(&scene)?;

        Ok(CaptureOutcome::Printed {
            objects: items.len(),
        })
    }

    /// Print the outline of whatever the camera sees
    ///
    /// # Errors
    ///
    /// See [`CapturePipeline::run`]
    pub fn edge_print(&mut self) -> Result<CaptureOutcome> {
        let frame = self.take_picture()?;
        let edges = edge_image(&frame, &self.settings.edge);
        self.print(&edges)?;
        Ok(CaptureOutcome::EdgePrinted)
    }

    fn take_picture(&mut self) -> Result<RgbImage> {
        let mut session = self.camera.open()?;
        for _ in 0..self.settings.discard_frames {
            session.grab()?;
        }
        let frame = session.read()?;
        drop(session);

        tracing::debug!(width = frame.width(), height = frame.height(), "frame captured");
        Ok(frame)
    }

    fn print(&mut self, image: &GrayImage) -> Result<()> {
        let image = match self.settings.print_width {
            Some(width) => fit_width(image, width),
            None => image.clone(),
        };

        self.printer.print_image(&image)?;
        self.printer.feed(self.settings.feed_lines)
    }
}
