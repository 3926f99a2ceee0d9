//! Scripted stand-ins for the kiosk's collaborators.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use platewatch::capture::{capture_loop, Kiosk, ShutdownReason};
use platewatch::config::Config;
use platewatch::error::{AnalysisError, CameraError, SensorError, UploadError};
use platewatch::hardware::{Button, Camera, Scale, StatusLed};
use platewatch::reading::ItemResult;
use platewatch::state::StateStore;
use platewatch::upload::{Backend, UploadReading};
use platewatch::vision::Analyzer;

/// Config the loop tests run against: single scale sample, no warmup
/// frames, no green-lamp hold, so one fake step equals one cycle stage.
pub fn test_config() -> Config {
    Config::from_toml(
        r#"
        [device]
        serial = "kiosk-test"

        [scale]
        gain = 1.0
        offset = 0.0
        samples = 1
        sample_period_millis = 0

        [camera]
        warmup_frames = 0

        [capture]
        max_consecutive_failures = 2
        shutdown_grace_millis = 5000
        success_hold_millis = 0

        [upload]
        url = "http://localhost:1/unused"
        "#,
    )
    .unwrap()
}

pub fn verdict(name: &str, present: bool) -> ItemResult {
    ItemResult {
        name: name.into(),
        present,
        ingredients: Vec::new(),
    }
}

/// Polls `condition` until it holds or a deadline passes.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ---- button ----

/// Models the trigger as a level, the way the real line behaves: a pulse
/// nobody is listening for is simply gone.
pub struct FakeButton {
    level: watch::Sender<bool>,
    rx: tokio::sync::Mutex<watch::Receiver<bool>>,
    activations: AtomicUsize,
}

impl FakeButton {
    pub fn new() -> FakeButton {
        let (level, rx) = watch::channel(false);
        FakeButton {
            level,
            rx: tokio::sync::Mutex::new(rx),
            activations: AtomicUsize::new(0),
        }
    }

    pub fn set_level(&self, pressed: bool) {
        let _ = self.level.send(pressed);
    }

    /// How many rising edges the loop has consumed.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Presses, holds until the loop observes it, then releases.
    pub async fn press(&self) {
        let before = self.activations();
        self.set_level(true);
        wait_until("press to be observed", || self.activations() > before).await;
        self.set_level(false);
    }
}

#[async_trait]
impl Button for FakeButton {
    async fn wait_for_active(&self) {
        let mut rx = self.rx.lock().await;
        if rx.wait_for(|pressed| *pressed).await.is_err() {
            drop(rx);
            std::future::pending::<()>().await;
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    async fn wait_for_inactive(&self) {
        let mut rx = self.rx.lock().await;
        if rx.wait_for(|pressed| !*pressed).await.is_err() {
            drop(rx);
            std::future::pending::<()>().await;
        }
    }
}

// ---- scale ----

#[derive(Clone)]
pub enum ScaleStep {
    Value(f64),
    /// Succeeds after a pause, for cancellation-timing tests.
    SlowValue { grams: f64, delay_millis: u64 },
    Fail,
    /// Never resolves.
    Hang,
}

pub struct FakeScale {
    steps: Mutex<VecDeque<ScaleStep>>,
    default: ScaleStep,
    calls: AtomicUsize,
}

impl FakeScale {
    pub fn steady(grams: f64) -> FakeScale {
        FakeScale::script(Vec::new(), ScaleStep::Value(grams))
    }

    pub fn failing() -> FakeScale {
        FakeScale::script(Vec::new(), ScaleStep::Fail)
    }

    pub fn script(steps: Vec<ScaleStep>, default: ScaleStep) -> FakeScale {
        FakeScale {
            steps: Mutex::new(steps.into_iter().collect()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scale for FakeScale {
    async fn read_raw(&self) -> Result<f64, SensorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        match step {
            ScaleStep::Value(grams) => Ok(grams),
            ScaleStep::SlowValue { grams, delay_millis } => {
                tokio::time::sleep(Duration::from_millis(delay_millis)).await;
                Ok(grams)
            }
            ScaleStep::Fail => Err(SensorError::ReadFailed("fake scale failure".into())),
            ScaleStep::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

// ---- camera ----

#[derive(Clone)]
pub enum CamStep {
    Frame(Vec<u8>),
    Fail,
}

pub struct FakeCamera {
    steps: Mutex<VecDeque<CamStep>>,
    default: CamStep,
    grabs: AtomicUsize,
    releases: AtomicUsize,
}

impl FakeCamera {
    pub fn steady(frame: Vec<u8>) -> FakeCamera {
        FakeCamera::script(Vec::new(), CamStep::Frame(frame))
    }

    pub fn failing() -> FakeCamera {
        FakeCamera::script(Vec::new(), CamStep::Fail)
    }

    pub fn script(steps: Vec<CamStep>, default: CamStep) -> FakeCamera {
        FakeCamera {
            steps: Mutex::new(steps.into_iter().collect()),
            default,
            grabs: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn grab_frame(&self) -> Result<Vec<u8>, CameraError> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        match step {
            CamStep::Frame(bytes) => Ok(bytes),
            CamStep::Fail => Err(CameraError::GrabFailed("fake camera failure".into())),
        }
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// ---- analyzer ----

#[derive(Clone)]
pub enum AnalyzerStep {
    Items(Vec<ItemResult>),
    Fail,
}

pub struct FakeAnalyzer {
    steps: Mutex<VecDeque<AnalyzerStep>>,
    default: AnalyzerStep,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl FakeAnalyzer {
    pub fn steady(items: Vec<ItemResult>) -> FakeAnalyzer {
        FakeAnalyzer::script(Vec::new(), AnalyzerStep::Items(items))
    }

    pub fn failing() -> FakeAnalyzer {
        FakeAnalyzer::script(Vec::new(), AnalyzerStep::Fail)
    }

    pub fn script(steps: Vec<AnalyzerStep>, default: AnalyzerStep) -> FakeAnalyzer {
        FakeAnalyzer {
            steps: Mutex::new(steps.into_iter().collect()),
            default,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The frames handed to the analyzer, in call order.
    pub fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, jpeg: &[u8]) -> Result<Vec<ItemResult>, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(jpeg.to_vec());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        match step {
            AnalyzerStep::Items(items) => Ok(items),
            AnalyzerStep::Fail => Err(AnalysisError::EmptyResponse),
        }
    }
}

// ---- backend ----

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub weight: f64,
    pub image: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

pub struct FakeBackend {
    uploads: Mutex<Vec<RecordedUpload>>,
    reject: AtomicBool,
}

impl FakeBackend {
    pub fn accepting() -> FakeBackend {
        FakeBackend {
            uploads: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    pub fn rejecting() -> FakeBackend {
        let backend = FakeBackend::accepting();
        backend.reject.store(true, Ordering::SeqCst);
        backend
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn upload(&self, reading: &UploadReading) -> Result<(), UploadError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(UploadError::Rejected {
                status: 500,
                body: "fake backend rejection".into(),
            });
        }
        self.uploads.lock().unwrap().push(RecordedUpload {
            weight: reading.weight,
            image: reading.image.as_ref().clone(),
            captured_at: reading.captured_at,
        });
        Ok(())
    }
}

// ---- lamps ----

#[derive(Default)]
pub struct FakeLed {
    on: AtomicBool,
}

impl FakeLed {
    pub fn new() -> FakeLed {
        FakeLed::default()
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }
}

impl StatusLed for FakeLed {
    fn set(&self, on: bool) {
        self.on.store(on, Ordering::SeqCst);
    }
}

// ---- rig ----

/// One set of fakes plus the handles tests assert against.
pub struct TestRig {
    pub button: Arc<FakeButton>,
    pub scale: Arc<FakeScale>,
    pub camera: Arc<FakeCamera>,
    pub backend: Arc<FakeBackend>,
    pub analyzer: Option<Arc<FakeAnalyzer>>,
    pub red: Arc<FakeLed>,
    pub green: Arc<FakeLed>,
    pub store: StateStore,
}

impl TestRig {
    pub fn new(scale: FakeScale, camera: FakeCamera) -> TestRig {
        TestRig {
            button: Arc::new(FakeButton::new()),
            scale: Arc::new(scale),
            camera: Arc::new(camera),
            backend: Arc::new(FakeBackend::accepting()),
            analyzer: None,
            red: Arc::new(FakeLed::new()),
            green: Arc::new(FakeLed::new()),
            store: StateStore::new(),
        }
    }

    pub fn with_analyzer(mut self, analyzer: FakeAnalyzer) -> TestRig {
        self.analyzer = Some(Arc::new(analyzer));
        self
    }

    pub fn with_backend(mut self, backend: FakeBackend) -> TestRig {
        self.backend = Arc::new(backend);
        self
    }

    pub fn kiosk(&self) -> Kiosk {
        Kiosk {
            button: self.button.clone(),
            scale: self.scale.clone(),
            camera: self.camera.clone(),
            red_led: self.red.clone(),
            green_led: self.green.clone(),
            analyzer: self
                .analyzer
                .as_ref()
                .map(|analyzer| analyzer.clone() as Arc<dyn Analyzer>),
            backend: self.backend.clone(),
        }
    }

    /// Spawns the loop against this rig; returns its join handle and the
    /// token that stops it.
    pub fn spawn_loop(&self, config: Config) -> (JoinHandle<ShutdownReason>, CancellationToken) {
        let token = CancellationToken::new();
        let handle = tokio::spawn(capture_loop(
            self.kiosk(),
            self.store.clone(),
            Arc::new(config),
            token.clone(),
        ));
        (handle, token)
    }

    /// Presses the trigger and waits for the cycle counter to reach `n`.
    pub async fn press_and_finish_cycle(&self, n: u64) {
        self.button.press().await;
        let store = self.store.clone();
        wait_until("cycle to finish", move || store.snapshot().stats.cycles >= n).await;
    }
}
