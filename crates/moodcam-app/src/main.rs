use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moodcam_core::{FaceBox, FaceDetector, OnnxEmotionClassifier};
use moodcam_hw::{Camera, Frame, FrameSource};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod gui;
mod journal;
mod overlay;
mod screenshot;
mod session;
mod settings;
mod stats;

use config::Config;
use session::{Analyzer, CameraOpener, Session};
use settings::{SettingsStore, KEYS};

#[derive(Parser)]
#[command(name = "moodcam", version, about = "Real-time webcam emotion detection")]
struct Cli {
    /// Without a subcommand the desktop window is opened.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in an image file and print their emotions as JSON
    Score {
        /// Image to analyze (PNG, JPEG, ...)
        image: PathBuf,
    },
    /// List V4L2 capture devices
    Cameras,
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Summarize the emotion journal
    Report {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print every setting
    Show,
    /// Restore defaults
    Reset,
    /// Change one setting
    Set { key: String, value: String },
}

#[derive(Serialize)]
struct ScoredFace {
    #[serde(rename = "box")]
    face: FaceBox,
    emotion: moodcam_core::Emotion,
    confidence: f32,
    description: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        None => run_gui(&config),
        Some(Commands::Score { image }) => score_image(&config, &image),
        Some(Commands::Cameras) => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}: {} ({}, {}) [{}]", dev.index, dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
        Some(Commands::Settings { action }) => manage_settings(&config, action),
        Some(Commands::Report { json }) => {
            let entries = journal::read_entries(&config.journal_path).with_context(|| {
                format!("reading journal {}", config.journal_path.display())
            })?;
            let report = journal::Report::from_entries(&entries);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Ok(())
        }
    }
}

fn load_settings(config: &Config) -> SettingsStore {
    SettingsStore::load(&config.settings_path).unwrap_or_else(|e| {
        tracing::warn!(
            path = %config.settings_path.display(),
            error = %e,
            "unusable settings file; using defaults"
        );
        SettingsStore::with_defaults(&config.settings_path)
    })
}

fn build_analyzer(config: &Config, store: &SettingsStore) -> Result<Analyzer> {
    let settings = store.settings();

    let detector_path = config.detector_model_path();
    let detector = FaceDetector::load(&detector_path, settings.detection_quality)
        .with_context(|| format!("loading face detector from {detector_path}"))?;
    tracing::info!(path = %detector_path, "SCRFD detector loaded");

    let emotion_path = config.emotion_model_path();
    let classifier = OnnxEmotionClassifier::load(&emotion_path, config.emotion_layout)
        .with_context(|| format!("loading emotion model from {emotion_path}"))?;
    tracing::info!(path = %emotion_path, "emotion classifier loaded");

    Ok(Analyzer::new(
        Box::new(detector),
        Box::new(classifier),
        settings.min_face_size,
    ))
}

fn run_gui(config: &Config) -> Result<()> {
    tracing::info!("moodcam starting");

    let store = load_settings(config);
    let analyzer = build_analyzer(config, &store)?;

    let device_override = config.camera_device.clone();
    let open_camera: CameraOpener = Box::new(move |index| {
        let camera = match &device_override {
            Some(path) => Camera::open(path)?,
            None => Camera::open_index(index)?,
        };
        tracing::info!(
            device = %camera.device_path,
            width = camera.width,
            height = camera.height,
            fourcc = ?camera.fourcc,
            "camera opened"
        );
        Ok(Box::new(camera) as Box<dyn FrameSource>)
    });

    let mut session = Session::new(open_camera, analyzer);
    if config.journal_enabled {
        tracing::info!(path = %config.journal_path.display(), "journal enabled");
        session = session.with_journal(journal::Journal::new(&config.journal_path));
    }

    let app = gui::MoodcamApp::new(session, store, config.screenshot_dir.clone());
    gui::run(app).map_err(|e| anyhow::anyhow!("gui: {e}"))?;

    tracing::info!("moodcam shutting down");
    Ok(())
}

fn score_image(config: &Config, path: &Path) -> Result<()> {
    let store = load_settings(config);
    let mut analyzer = build_analyzer(config, &store)?;

    let image = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    let frame = Frame::from_rgb(image.into_raw(), width, height)?;

    let faces: Vec<ScoredFace> = analyzer
        .analyze(&frame)?
        .into_iter()
        .map(|r| ScoredFace {
            face: r.face,
            emotion: r.assessment.emotion,
            confidence: r.assessment.confidence,
            description: r.assessment.emotion.describe(r.assessment.confidence),
        })
        .collect();

    tracing::info!(faces = faces.len(), "image scored");
    println!("{}", serde_json::to_string_pretty(&faces)?);
    Ok(())
}

fn manage_settings(config: &Config, action: SettingsAction) -> Result<()> {
    let mut store = SettingsStore::load(&config.settings_path)
        .with_context(|| format!("loading {}", config.settings_path.display()))?;

    match action {
        SettingsAction::Show => {}
        SettingsAction::Reset => {
            store.reset()?;
            println!("Settings reset to defaults");
        }
        SettingsAction::Set { key, value } => {
            store.set_from_str(&key, &value)?;
        }
    }

    println!("# {}", store.path().display());
    for key in KEYS {
        println!("{key} = {}", store.settings().get(key)?);
    }
    Ok(())
}
