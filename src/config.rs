use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ingest::CameraConfig;
use crate::render::OverlayStyle;

const DEFAULT_CAMERA_URL: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "cpu";
const DEFAULT_THRESHOLD: f32 = 0.5;
const DEFAULT_OUT_DIR: &str = "overlay_out";

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    overlay: Option<OverlayStyleFile>,
    output: Option<OutputConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    threshold: Option<f32>,
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayStyleFile {
    stroke: Option<String>,
    stroke_weight: Option<f32>,
    text_fill: Option<String>,
    text_size: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub camera: CameraConfig,
    pub detector: DetectorSettings,
    pub overlay: OverlayStyle,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    /// Minimum confidence a backend reports.
    pub threshold: f32,
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
}

impl OverlayConfig {
    /// Load configuration from `path`, or from `LIVE_OVERLAY_CONFIG` when no path is
    /// given, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("LIVE_OVERLAY_CONFIG").ok().map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            url: camera_file
                .url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: camera_file.fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            threshold: detector_file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            model_path: detector_file.model_path,
            labels_path: detector_file.labels_path,
        };

        let style_file = file.overlay.unwrap_or_default();
        let defaults = OverlayStyle::default();
        let overlay = OverlayStyle {
            stroke: style_file.stroke.unwrap_or(defaults.stroke),
            stroke_weight: style_file.stroke_weight.unwrap_or(defaults.stroke_weight),
            text_fill: style_file.text_fill.unwrap_or(defaults.text_fill),
            text_size: style_file.text_size.unwrap_or(defaults.text_size),
        };

        let out_dir = file
            .output
            .and_then(|output| output.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR));

        Self {
            camera,
            detector,
            overlay,
            out_dir,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("LIVE_OVERLAY_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(fps) = std::env::var("LIVE_OVERLAY_FPS") {
            self.camera.target_fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("LIVE_OVERLAY_FPS must be a positive integer"))?;
        }
        if let Ok(backend) = std::env::var("LIVE_OVERLAY_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(threshold) = std::env::var("LIVE_OVERLAY_THRESHOLD") {
            self.detector.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("LIVE_OVERLAY_THRESHOLD must be a number in [0, 1]"))?;
        }
        if let Ok(dir) = std::env::var("LIVE_OVERLAY_OUT_DIR") {
            if !dir.trim().is_empty() {
                self.out_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera dimensions must be non-zero (got {}x{})",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera fps must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detector.threshold) {
            return Err(anyhow!(
                "detector threshold must be within [0, 1] (got {})",
                self.detector.threshold
            ));
        }
        if !(self.overlay.stroke_weight.is_finite() && self.overlay.stroke_weight > 0.0) {
            return Err(anyhow!("overlay stroke_weight must be positive"));
        }
        if !(self.overlay.text_size.is_finite() && self.overlay.text_size > 0.0) {
            return Err(anyhow!("overlay text_size must be positive"));
        }
        Ok(())
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self::from_file(OverlayConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
