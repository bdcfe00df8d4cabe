use moodcam_core::TensorLayout;
use std::path::PathBuf;

/// Process configuration, loaded from environment variables.
///
/// User-facing preferences live in [`crate::settings::Settings`]; this holds
/// paths and model choices that are fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path overriding the `camera_index` setting.
    pub camera_device: Option<String>,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// SCRFD model file name inside `model_dir`.
    pub detector_model: String,
    /// Emotion model file name inside `model_dir`.
    pub emotion_model: String,
    /// Input tensor layout of the emotion model.
    pub emotion_layout: TensorLayout,
    /// TOML file holding user settings.
    pub settings_path: PathBuf,
    /// Where screenshots are written.
    pub screenshot_dir: PathBuf,
    /// JSON-lines emotion journal.
    pub journal_path: PathBuf,
    /// Whether scored faces are appended to the journal. Off unless
    /// `MOODCAM_JOURNAL` is set, since every tick writes a line per face.
    pub journal_enabled: bool,
}

impl Config {
    /// Load configuration from `MOODCAM_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("MOODCAM_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| moodcam_core::default_model_dir());

        let config_dir = xdg_dir("XDG_CONFIG_HOME", ".config").join("moodcam");
        let data_dir = xdg_dir("XDG_DATA_HOME", ".local/share").join("moodcam");

        let emotion_layout = std::env::var("MOODCAM_EMOTION_LAYOUT")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(layout) => Some(layout),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring MOODCAM_EMOTION_LAYOUT");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            camera_device: std::env::var("MOODCAM_CAMERA_DEVICE").ok(),
            model_dir,
            detector_model: env_string("MOODCAM_DETECTOR_MODEL", "det_10g.onnx"),
            emotion_model: env_string("MOODCAM_EMOTION_MODEL", "emotion_fer2013.onnx"),
            emotion_layout,
            settings_path: env_path("MOODCAM_SETTINGS_PATH", config_dir.join("settings.toml")),
            screenshot_dir: env_path("MOODCAM_SCREENSHOT_DIR", PathBuf::from("screenshots")),
            journal_path: env_path("MOODCAM_JOURNAL_PATH", data_dir.join("journal.jsonl")),
            journal_enabled: env_bool("MOODCAM_JOURNAL", false),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(&self.detector_model)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the emotion classification model.
    pub fn emotion_model_path(&self) -> String {
        self.model_dir
            .join(&self.emotion_model)
            .to_string_lossy()
            .into_owned()
    }
}

fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    std::env::var(var).map(PathBuf::from).unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(home_relative)
    })
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| !matches!(v.as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(default)
}
