//! Debug-artifact sink that writes PNG files into a directory.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use sudolens_pipeline::{Artifact, ArtifactSink};

/// Writes each artifact to `<dir>/<stem>.png`, replacing earlier runs.
pub struct ArtifactDir {
    dir: PathBuf,
}

impl ArtifactDir {
    /// Create `dir` (and parents) if needed.
    pub fn create(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Where `artifact` is written.
    pub fn path_for(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(format!("{}.png", artifact.file_stem()))
    }
}

impl ArtifactSink for ArtifactDir {
    fn write(&mut self, artifact: Artifact, image: &DynamicImage) {
        let path = self.path_for(artifact);
        match image.save_with_format(&path, ImageFormat::Png) {
            Ok(()) => log::info!("wrote {}", path.display()),
            Err(e) => log::warn!("could not write {}: {e}", path.display()),
        }
    }
}
