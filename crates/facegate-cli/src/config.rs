use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "FACEGATE_CONFIG";

/// CLI configuration: defaults, then an optional TOML file, then
/// `FACEGATE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture resolution; the driver may negotiate another.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Directory containing the SCRFD and ArcFace ONNX files.
    pub model_dir: PathBuf,
    /// Root for the stores and display output unless overridden below.
    pub data_dir: PathBuf,
    pub images_dir: Option<PathBuf>,
    pub embeddings_dir: Option<PathBuf>,
    pub display_dir: Option<PathBuf>,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// Consecutive failed camera reads tolerated before a workflow aborts.
    pub capture_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            camera_device: "/dev/video0".to_string(),
            frame_width: 640,
            frame_height: 480,
            model_dir: data_dir.join("models"),
            data_dir,
            images_dir: None,
            embeddings_dir: None,
            display_dir: None,
            similarity_threshold: facegate_core::CosineMatcher::DEFAULT_THRESHOLD,
            capture_retries: 3,
        }
    }
}

impl Config {
    /// Load from `FACEGATE_CONFIG` (if set) and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Override fields from `FACEGATE_*` variables resolved through `lookup`.
    /// Unparseable numbers are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FACEGATE_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("FACEGATE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_IMAGES_DIR") {
            self.images_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FACEGATE_EMBEDDINGS_DIR") {
            self.embeddings_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FACEGATE_DISPLAY_DIR") {
            self.display_dir = Some(PathBuf::from(v));
        }
        parse_into(&lookup, "FACEGATE_SIMILARITY_THRESHOLD", &mut self.similarity_threshold);
        parse_into(&lookup, "FACEGATE_CAPTURE_RETRIES", &mut self.capture_retries);
        parse_into(&lookup, "FACEGATE_FRAME_WIDTH", &mut self.frame_width);
        parse_into(&lookup, "FACEGATE_FRAME_HEIGHT", &mut self.frame_height);
    }

    pub fn images_dir(&self) -> PathBuf {
        self.images_dir.clone().unwrap_or_else(|| self.data_dir.join("faces"))
    }

    pub fn embeddings_dir(&self) -> PathBuf {
        self.embeddings_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("embeddings"))
    }

    pub fn display_dir(&self) -> PathBuf {
        self.display_dir.clone().unwrap_or_else(|| self.data_dir.join("display"))
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}
