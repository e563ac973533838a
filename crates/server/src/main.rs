use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

use moodlens_core::annotation::frame_annotator::FrameAnnotator;
use moodlens_core::capture::domain::frame_source::FrameSource;
use moodlens_core::capture::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;
use moodlens_core::classification::domain::emotion_classifier::EmotionModel;
use moodlens_core::classification::infrastructure::onnx_emotion_classifier::OnnxEmotionClassifier;
use moodlens_core::detection::infrastructure::onnx_blazeface_locator::{
    LocatorConfig, OnnxBlazefaceLocator,
};
use moodlens_core::history::prediction_logger::PredictionLogger;
use moodlens_core::pipeline::frame_inference::{FrameInference, NoFaceMode};
use moodlens_core::pipeline::live_stream::LiveStream;
use moodlens_core::pipeline::stream_hub::{SourceFactory, StreamHub};
use moodlens_core::shared::constants::{
    BUNDLED_MODEL_DIR, DEFAULT_JPEG_QUALITY, DEFAULT_PORT, EMOTION_MODEL_NAME, FACE_MODEL_NAME,
};
use moodlens_core::shared::model_resolver::{self, ModelSource};
use moodlens_core::streaming::stream_encoder::StreamEncoder;

mod error;
mod payload;
mod routes;
mod state;
mod stream_bridge;

use state::AppState;

const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Facial emotion recognition over HTTP: live annotated webcam stream and
/// single-shot image classification.
#[derive(Parser)]
#[command(name = "moodlens")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Face detection model (ONNX). Looked up by name in the cache and
    /// bundled directories when omitted.
    #[arg(long, env = "MOODLENS_FACE_MODEL")]
    face_model: Option<PathBuf>,

    /// Download source for the face model when it is not found locally.
    #[arg(long, env = "MOODLENS_FACE_MODEL_URL")]
    face_model_url: Option<String>,

    /// Emotion classification model (ONNX).
    #[arg(long, env = "MOODLENS_EMOTION_MODEL")]
    emotion_model: Option<PathBuf>,

    /// Capture device or URL for the live stream.
    #[arg(long, env = "MOODLENS_CAMERA", default_value = "/dev/video0")]
    camera: String,

    /// Capture backend, e.g. v4l2, avfoundation or dshow.
    #[arg(long, env = "MOODLENS_CAMERA_FORMAT")]
    camera_format: Option<String>,

    /// What to classify when no face is found in an upload or frame.
    #[arg(long, value_enum, default_value_t = NoFaceArg::Empty)]
    no_face: NoFaceArg,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// JPEG quality of live stream frames (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY)]
    jpeg_quality: u8,

    /// TrueType font for live stream labels. System fonts are tried when omitted.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
    body_limit: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum NoFaceArg {
    /// Return no prediction.
    Empty,
    /// Classify the whole image as one face.
    WholeImage,
}

impl From<NoFaceArg> for NoFaceMode {
    fn from(arg: NoFaceArg) -> Self {
        match arg {
            NoFaceArg::Empty => NoFaceMode::Empty,
            NoFaceArg::WholeImage => NoFaceMode::WholeImage,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .map_err(|e| format!("Invalid listen address {}:{}: {e}", cli.host, cli.port))?;

    let state = build_state(&cli)?;
    let app = routes::router(state, cli.body_limit);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Listening on http://{addr}");
        axum::serve(listener, app).await
    })?;
    Ok(())
}

fn build_state(cli: &Cli) -> Result<AppState, Box<dyn std::error::Error>> {
    let bundled = Path::new(BUNDLED_MODEL_DIR);

    log::info!("Resolving model: {FACE_MODEL_NAME}");
    let face_path = model_resolver::resolve(
        &ModelSource {
            name: FACE_MODEL_NAME,
            explicit: cli.face_model.as_deref(),
            bundled_dir: Some(bundled),
            url: cli.face_model_url.as_deref(),
        },
        Some(Box::new(download_progress)),
    )?;
    let locator = OnnxBlazefaceLocator::new(
        &face_path,
        LocatorConfig {
            confidence: cli.confidence,
            ..LocatorConfig::default()
        },
    )?;

    let model = load_emotion_model(cli, bundled);
    let logger = Arc::new(PredictionLogger::new());
    let inference = Arc::new(
        FrameInference::new(Arc::new(locator), model, logger.clone())
            .with_no_face_mode(cli.no_face.into()),
    );

    let live = LiveStream::new(
        inference.clone(),
        FrameAnnotator::with_font_file(cli.font.as_deref()),
        StreamEncoder::new(cli.jpeg_quality),
    );
    let hub = StreamHub::new(live, camera_factory(cli));

    Ok(AppState::new(inference, logger, hub))
}

/// A missing or broken emotion model does not stop the server; inference
/// requests then fail with a "not loaded" error.
fn load_emotion_model(cli: &Cli, bundled: &Path) -> EmotionModel {
    log::info!("Resolving model: {EMOTION_MODEL_NAME}");
    let source = ModelSource {
        name: EMOTION_MODEL_NAME,
        explicit: cli.emotion_model.as_deref(),
        bundled_dir: Some(bundled),
        url: None,
    };
    let loaded = model_resolver::resolve(&source, None)
        .map_err(|e| e.to_string())
        .and_then(|path| OnnxEmotionClassifier::new(&path).map_err(|e| e.to_string()));
    match loaded {
        Ok(classifier) => EmotionModel::loaded(classifier),
        Err(reason) => {
            log::error!("Emotion model unavailable: {reason}");
            EmotionModel::unavailable(reason)
        }
    }
}

fn camera_factory(cli: &Cli) -> SourceFactory {
    let device = cli.camera.clone();
    let format = cli.camera_format.clone();
    Box::new(move || {
        let source = FfmpegCameraSource::open(&device, format.as_deref())?;
        Ok(Box::new(source) as Box<dyn FrameSource>)
    })
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !(1..=100).contains(&cli.jpeg_quality) {
        return Err(format!(
            "JPEG quality must be between 1 and 100, got {}",
            cli.jpeg_quality
        )
        .into());
    }
    if cli.body_limit == 0 {
        return Err("Body limit must be greater than zero".into());
    }
    for (flag, path) in [
        ("--face-model", &cli.face_model),
        ("--emotion-model", &cli.emotion_model),
        ("--font", &cli.font),
    ] {
        if let Some(path) = path {
            if !path.exists() {
                return Err(format!("{flag}: file not found: {}", path.display()).into());
            }
        }
    }
    if cli.camera.trim().is_empty() {
        return Err("Camera device must not be empty".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
