//! Screen storage
//!
//! [`StorageAdapter`] is the capability the pipeline reads screens from and
//! archives artifacts to. [`FileStorage`] keeps PNG screenshots in folders
//! under one root:
//!
//! ```text
//! <path>/
//!   <approved_folder>/<name>.png      approved baselines
//!   <approved_folder>/<name>.json     optional per-screen comparator options
//!   <build_folder>/<name>.png         screens of the current build
//!   <archive_folder>/<build>/
//!     <approved_folder>/<name>.png
//!     <build_folder>/<name>.png
//!     <highlight_folder>/<name>.png
//! ```

use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{KoboldError, Result};
use crate::types::{Image, ScreenConfigOverride, ScreenName};

/// Storage backend for screens, screen configs, and archives
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn list_build_screen_names(&self) -> Result<Vec<ScreenName>>;

    async fn list_approved_screen_names(&self) -> Result<Vec<ScreenName>>;

    async fn load_approved_screen(&self, name: &str) -> Result<Image>;

    async fn load_build_screen(&self, name: &str) -> Result<Image>;

    /// A screen without a config yields an empty override.
    async fn load_screen_config(&self, name: &str) -> Result<ScreenConfigOverride>;

    async fn archive_approved_screen(&self, name: &str, image: &Image) -> Result<()>;

    async fn archive_build_screen(&self, name: &str, image: &Image) -> Result<()>;

    async fn archive_highlight_screen(&self, name: &str, image: &Image) -> Result<()>;
}

/// PNG screenshots on the local filesystem
#[derive(Debug, Clone)]
pub struct FileStorage {
    build: String,
    config: StorageConfig,
}

impl FileStorage {
    pub fn new(build: impl Into<String>, config: StorageConfig) -> Self {
        Self {
            build: build.into(),
            config,
        }
    }

    pub fn approved_dir(&self) -> PathBuf {
        self.config.path.join(&self.config.approved_folder)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.config.path.join(&self.config.build_folder)
    }

    /// Archive root of the current build
    pub fn archive_dir(&self) -> PathBuf {
        self.config.path.join(&self.config.archive_folder).join(&self.build)
    }

    fn screen_file(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.png", name))
    }

    async fn list_png_stems(dir: &Path) -> Result<Vec<ScreenName>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(name) = path.file_stem() {
                    names.push(name.to_string_lossy().to_string());
                }
            }
        }

        // read_dir order is platform dependent
        names.sort();
        Ok(names)
    }

    async fn load_png(kind: &str, path: &Path, name: &str) -> Result<Image> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KoboldError::ScreenNotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let image = image::load_from_memory(&data)?.to_rgba8();
        debug!("Loaded {} screen '{}' ({}x{})", kind, name, image.width(), image.height());
        Ok(image)
    }

    async fn write_png(path: PathBuf, image: &Image) -> Result<()> {
        let mut encoded = Cursor::new(Vec::new());
        image.write_to(&mut encoded, image::ImageOutputFormat::Png)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, encoded.into_inner()).await?;
        debug!("Archived {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FileStorage {
    async fn list_build_screen_names(&self) -> Result<Vec<ScreenName>> {
        Self::list_png_stems(&self.build_dir()).await
    }

    async fn list_approved_screen_names(&self) -> Result<Vec<ScreenName>> {
        Self::list_png_stems(&self.approved_dir()).await
    }

    async fn load_approved_screen(&self, name: &str) -> Result<Image> {
        Self::load_png("approved", &Self::screen_file(&self.approved_dir(), name), name).await
    }

    async fn load_build_screen(&self, name: &str) -> Result<Image> {
        Self::load_png("build", &Self::screen_file(&self.build_dir(), name), name).await
    }

    async fn load_screen_config(&self, name: &str) -> Result<ScreenConfigOverride> {
        let path = self.approved_dir().join(format!("{}.json", name));
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ScreenConfigOverride::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn archive_approved_screen(&self, name: &str, image: &Image) -> Result<()> {
        let dir = self.archive_dir().join(&self.config.approved_folder);
        Self::write_png(Self::screen_file(&dir, name), image).await
    }

    async fn archive_build_screen(&self, name: &str, image: &Image) -> Result<()> {
        let dir = self.archive_dir().join(&self.config.build_folder);
        Self::write_png(Self::screen_file(&dir, name), image).await
    }

    async fn archive_highlight_screen(&self, name: &str, image: &Image) -> Result<()> {
        let dir = self.archive_dir().join(&self.config.highlight_folder);
        Self::write_png(Self::screen_file(&dir, name), image).await
    }
}
