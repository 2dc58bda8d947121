//! Shared test utilities
//!
//! Fakes for every device the appliance touches, plus a dataset fixture.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{GrayImage, Rgb, RgbImage};
use tempfile::TempDir;

use sketchbooth::capture::{
    BoundingBox, Camera, CameraSession, DetectionResult, ObjectDetector, Printer,
};
use sketchbooth::config::VoiceConfig;
use sketchbooth::hardware::LedDriver;
use sketchbooth::voice::{AudioStream, FrameProcessor, KeywordBinding, KeywordClassifier};
use sketchbooth::{
    CapturePipeline, DrawingLookup, Error, PipelineSettings, Result, TriggerEvent, TriggerFlags,
    WakeWordMonitor,
};

/// Ordered record of teardown-relevant calls across fakes
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    /// Position of the first occurrence of `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Call counters for the capture fakes
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub detects: AtomicUsize,
    pub prints: AtomicUsize,
    pub feeds: AtomicUsize,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn detects(&self) -> usize {
        self.detects.load(Ordering::SeqCst)
    }

    pub fn prints(&self) -> usize {
        self.prints.load(Ordering::SeqCst)
    }

    pub fn feeds(&self) -> usize {
        self.feeds.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// One scripted classifier call
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Detect(Option<usize>),
    Fail,
    Panic,
}

/// Classifier replaying a script of results, then reporting nothing
pub struct FakeClassifier {
    pub log: EventLog,
    pub script: VecDeque<Step>,
}

impl FakeClassifier {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            script: VecDeque::new(),
        }
    }

    pub fn with_script(self, script: &[Option<usize>]) -> Self {
        let steps: Vec<Step> = script.iter().copied().map(Step::Detect).collect();
        self.with_steps(&steps)
    }

    pub fn with_steps(mut self, steps: &[Step]) -> Self {
        self.script = steps.iter().copied().collect();
        self
    }
}

impl KeywordClassifier for FakeClassifier {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn frame_length(&self) -> usize {
        4
    }

    fn keyword_count(&self) -> usize {
        2
    }

    fn process(&mut self, _frame: &[i16]) -> Result<Option<usize>> {
        match self.script.pop_front() {
            Some(Step::Detect(result)) => Ok(result),
            Some(Step::Fail) => Err(Error::Detection("model rejected frame".to_string())),
            Some(Step::Panic) => panic!("classifier blew up"),
            None => Ok(None),
        }
    }
}

impl Drop for FakeClassifier {
    fn drop(&mut self) {
        self.log.push("classifier released");
    }
}

/// Stream that only records being closed
pub struct FakeStream {
    pub log: EventLog,
}

impl AudioStream for FakeStream {
    fn close(&mut self) {
        self.log.push("stream closed");
    }
}

/// Callback half handed to a fake stream, so tests can push samples
pub type ProcessorSlot = Arc<Mutex<Option<FrameProcessor>>>;

pub fn voice_config() -> VoiceConfig {
    VoiceConfig {
        keywords: vec![
            KeywordBinding {
                phrase: "snapshot".to_string(),
                event: TriggerEvent::PrintRequest,
            },
            KeywordBinding {
                phrase: "outline".to_string(),
                event: TriggerEvent::EdgePrintRequest,
            },
        ],
        ..VoiceConfig::default()
    }
}

/// Start a monitor on a fake stream
pub fn start_monitor(
    classifier: FakeClassifier,
    flags: &Arc<TriggerFlags>,
    log: &EventLog,
) -> (WakeWordMonitor, ProcessorSlot) {
    let slot: ProcessorSlot = Arc::new(Mutex::new(None));
    let stream_slot = Arc::clone(&slot);
    let stream_log = log.clone();

    let monitor = WakeWordMonitor::start_with(
        &voice_config(),
        Box::new(classifier),
        Arc::clone(flags),
        move |_, processor| {
            *stream_slot.lock().unwrap() = Some(processor);
            Ok(Box::new(FakeStream { log: stream_log }) as Box<dyn AudioStream>)
        },
    )
    .expect("failed to start monitor");

    (monitor, slot)
}

// ---------------------------------------------------------------------------
// Camera, detector, printer
// ---------------------------------------------------------------------------

/// Camera serving a flat grey frame
pub struct FakeCamera {
    pub counters: Arc<Counters>,
    pub fail_open: bool,
    pub frame: RgbImage,
    /// Raised once, while the first capture holds the camera
    pub raise_on_open: Option<(Arc<TriggerFlags>, TriggerEvent)>,
}

impl FakeCamera {
    pub fn new(counters: &Arc<Counters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            fail_open: false,
            frame: RgbImage::from_pixel(64, 48, Rgb([180, 180, 180])),
            raise_on_open: None,
        }
    }

    pub fn failing(counters: &Arc<Counters>) -> Self {
        Self {
            fail_open: true,
            ..Self::new(counters)
        }
    }
}

impl Camera for FakeCamera {
    fn open(&mut self) -> Result<Box<dyn CameraSession>> {
        if self.fail_open {
            return Err(Error::DeviceUnavailable("no camera".to_string()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        if let Some((flags, event)) = self.raise_on_open.take() {
            flags.raise(event);
        }

        Ok(Box::new(FakeSession {
            counters: Arc::clone(&self.counters),
            frame: self.frame.clone(),
        }))
    }
}

struct FakeSession {
    counters: Arc<Counters>,
    frame: RgbImage,
}

impl CameraSession for FakeSession {
    fn grab(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self) -> Result<RgbImage> {
        Ok(self.frame.clone())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Detector returning a fixed set of detections
pub struct FakeDetector {
    pub counters: Arc<Counters>,
    pub detections: Vec<(BoundingBox, u32, f32)>,
    pub names: HashMap<u32, String>,
    pub fail: bool,
}

impl FakeDetector {
    pub fn new(counters: &Arc<Counters>, detections: &[([f32; 4], u32, f32)]) -> Self {
        Self {
            counters: Arc::clone(counters),
            detections: detections
                .iter()
                .map(|&(bbox, class, score)| (BoundingBox::from(bbox), class, score))
                .collect(),
            names: coco_names(),
            fail: false,
        }
    }
}

impl ObjectDetector for FakeDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<DetectionResult> {
        self.counters.detects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Detection("model crashed".to_string()));
        }

        DetectionResult::from_parallel(
            self.detections.iter().map(|d| d.0).collect(),
            self.detections.iter().map(|d| d.1).collect(),
            self.detections.iter().map(|d| d.2).collect(),
        )
    }

    fn class_name(&self, class_id: u32) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }
}

/// Class ids used across the tests
pub fn coco_names() -> HashMap<u32, String> {
    [(1, "person"), (17, "cat"), (18, "dog"), (44, "bottle")]
        .into_iter()
        .map(|(id, name)| (id, name.to_string()))
        .collect()
}

/// Printer keeping every page in memory
pub struct FakePrinter {
    pub counters: Arc<Counters>,
    pub pages: Arc<Mutex<Vec<GrayImage>>>,
    pub fail: bool,
}

impl FakePrinter {
    pub fn new(counters: &Arc<Counters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            pages: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }
}

impl Printer for FakePrinter {
    fn print_image(&mut self, image: &GrayImage) -> Result<()> {
        if self.fail {
            return Err(Error::Printer("out of paper".to_string()));
        }
        self.counters.prints.fetch_add(1, Ordering::SeqCst);
        self.pages.lock().unwrap().push(image.clone());
        Ok(())
    }

    fn feed(&mut self, _lines: u32) -> Result<()> {
        self.counters.feeds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LED
// ---------------------------------------------------------------------------

/// LED driver writing every call to the event log
pub struct RecordingLed {
    pub log: EventLog,
}

impl LedDriver for RecordingLed {
    fn on(&mut self) {
        self.log.push("led on");
    }

    fn off(&mut self) {
        self.log.push("led off");
    }

    fn pulse(&mut self) {
        self.log.push("led pulse");
    }

    fn blink(&mut self, _on: Duration, _off: Duration) {
        self.log.push("led blink");
    }
}

impl Drop for RecordingLed {
    fn drop(&mut self) {
        self.log.push("led released");
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// A drawing line: one diagonal and one horizontal stroke
fn drawing_line(word: &str, variant: usize) -> String {
    let offset = variant % 50;
    format!(
        r#"{{"word":"{word}","countrycode":"US","drawing":[[[{offset},100,255],[0,128,255]],[[0,255],[{offset},{offset}]]]}}"#
    )
}

/// Write a dataset with 100 drawings per category and a label map
pub fn write_dataset(dir: &Path, categories: &[&str], aliases: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for category in categories {
        let lines: Vec<String> = (0..100).map(|i| drawing_line(category, i)).collect();
        std::fs::write(dir.join(format!("{category}.ndjson")), lines.join("\n") + "\n").unwrap();
    }

    let map: HashMap<&str, &str> = aliases.iter().copied().collect();
    std::fs::write(label_map_path(dir), serde_json::to_string(&map).unwrap()).unwrap();
}

pub fn label_map_path(dir: &Path) -> std::path::PathBuf {
    dir.join("label_mapping.json")
}

/// Dataset with dog, cat and scorpion, where "puppy" is an alias of dog
pub fn standard_dataset() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["cat", "dog", "scorpion"], &[("puppy", "dog")]);
    dir
}

/// Lookup over `dir`, already set up
pub fn lookup(dir: &Path) -> DrawingLookup {
    let mut drawings = DrawingLookup::new(dir, label_map_path(dir), "scorpion");
    drawings.setup().expect("failed to set up drawings");
    drawings
}

/// Pipeline over fakes, with no frames to discard
pub fn pipeline(
    dataset: &Path,
    camera: impl Camera + 'static,
    detector: FakeDetector,
    printer: FakePrinter,
) -> CapturePipeline {
    let settings = PipelineSettings {
        discard_frames: 0,
        print_width: None,
        ..PipelineSettings::default()
    };

    CapturePipeline::new(
        Box::new(camera),
        Box::new(detector),
        lookup(dataset),
        Box::new(printer),
        settings,
    )
    .with_seed(7)
}
