use std::path::{Path, PathBuf};
use std::fs;
use crate::common::error::Result;
use crate::camera::CapturedImage;
use crate::common::paths;

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        if enabled {
            fs::create_dir_all(base_dir.join("captures"))?;
            fs::create_dir_all(base_dir.join("charts"))?;
            fs::create_dir_all(base_dir.join("logs"))?;

            println!("📁 Development mode enabled - data will be saved to: {}",
                     base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log file for a session: `logs/` in dev mode, the user cache dir
    /// otherwise.
    pub fn log_file(&self) -> Option<PathBuf> {
        let dir = if self.enabled {
            Some(self.base_dir.join("logs"))
        } else {
            paths::user_log_dir()
        };
        dir.map(|d| d.join(paths::LOG_FILE_NAME))
    }

    /// Where the radar chart is written. Dev mode keeps one file per render.
    pub fn chart_path(&self, configured: &Path) -> PathBuf {
        if self.enabled {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
            self.base_dir.join("charts").join(format!("skin_radar_{}.svg", timestamp))
        } else {
            configured.to_path_buf()
        }
    }

    /// Keeps a copy of a gated capture. Outside dev mode captures stay in memory.
    pub fn save_capture(&self, image: &CapturedImage) -> Result<Option<PathBuf>> {
        if !self.enabled {
            return Ok(None);
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
        let path = self.base_dir.join("captures").join(format!("live_{}.jpg", timestamp));
        fs::write(&path, image.bytes())?;
        tracing::debug!("Saved capture to {}", path.display());
        Ok(Some(path))
    }
}
