use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use image_utility_bot::bot::{ConversationMachine, Dispatcher, SessionStore};
use image_utility_bot::imaging::{ForegroundExtractor, Pipeline, ProcessingSettings};
use image_utility_bot::transport::fake::FakeTransport;
use image_utility_bot::ProcessingError;
use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Extractor that keeps the left half of the image and clears the rest
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct HalfExtractor;

impl ForegroundExtractor for HalfExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<RgbaImage, ProcessingError> {
        let mut rgba = image.to_rgba8();
        let half = rgba.width() / 2;
        for (x, _, pixel) in rgba.enumerate_pixels_mut() {
            if x >= half {
                pixel.0[3] = 0;
            }
        }
        Ok(rgba)
    }
}

/// Extractor that holds its blocking thread until released
///
/// Behaves like [`HalfExtractor`] once the paired sender fires. Dropping the
/// sender fails the pending extraction instead of hanging the thread.
#[allow(dead_code)]
#[derive(Debug)]
pub struct GatedExtractor {
    started: AtomicBool,
    release: Mutex<mpsc::Receiver<()>>,
}

#[allow(dead_code)]
impl GatedExtractor {
    pub fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let extractor = Arc::new(Self {
            started: AtomicBool::new(false),
            release: Mutex::new(rx),
        });
        (extractor, tx)
    }

    /// Whether an extraction is currently waiting on the gate
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl ForegroundExtractor for GatedExtractor {
    fn extract(&self, image: &DynamicImage) -> Result<RgbaImage, ProcessingError> {
        self.started.store(true, Ordering::SeqCst);
        let released = self
            .release
            .lock()
            .map_err(|_| ProcessingError::ExtractionFailure("gate poisoned".into()))?
            .recv();
        released.map_err(|_| ProcessingError::ExtractionFailure("gate dropped".into()))?;
        HalfExtractor.extract(image)
    }
}

#[allow(dead_code)]
pub fn encoded(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).expect("failed to encode");
    out.into_inner()
}

#[allow(dead_code)]
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    encoded(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

#[allow(dead_code)]
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, jpeg_bytes(width, height)).expect("failed to write test image");
    path
}

/// Files left in `dir` whose names start with `prefix`
#[allow(dead_code)]
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with(prefix))
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[allow(dead_code)]
pub fn pipeline(dir: &Path) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(
        ProcessingSettings::new(dir),
        Arc::new(HalfExtractor),
    ))
}

#[allow(dead_code)]
pub fn machine(dir: &TempDir) -> (Arc<FakeTransport>, Arc<ConversationMachine>) {
    let transport = Arc::new(FakeTransport::new());
    let machine = Arc::new(ConversationMachine::new(
        transport.clone(),
        pipeline(dir.path()),
        SessionStore::new(),
        dir.path(),
    ));
    (transport, machine)
}

#[allow(dead_code)]
pub fn dispatcher(dir: &TempDir, idle: Duration) -> (Arc<FakeTransport>, Dispatcher) {
    let (transport, machine) = machine(dir);
    (transport, Dispatcher::new(machine, idle))
}

/// Dispatcher whose pipeline removes backgrounds with `extractor`
#[allow(dead_code)]
pub fn dispatcher_with(
    dir: &TempDir,
    extractor: Arc<dyn ForegroundExtractor>,
) -> (Arc<FakeTransport>, Dispatcher) {
    let transport = Arc::new(FakeTransport::new());
    let pipeline = Arc::new(Pipeline::new(ProcessingSettings::new(dir.path()), extractor));
    let machine = Arc::new(ConversationMachine::new(
        transport.clone(),
        pipeline,
        SessionStore::new(),
        dir.path(),
    ));
    (transport, Dispatcher::new(machine, Duration::from_secs(60)))
}

/// Poll `check` every 10ms for up to 5s
#[allow(dead_code)]
pub async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
