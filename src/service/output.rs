//! Output artifact layout.
//!
//! Artifacts land under one base directory: folder runs mirror the source
//! tree under `repositories/`, single-file runs go flat under
//! `individual_files/`, and the processing cache lives in `.cache/`
//! alongside them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::lineage::SqlDependencies;

/// Where one run's artifacts are written.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base: PathBuf,
    kind: LayoutKind,
}

#[derive(Debug, Clone)]
enum LayoutKind {
    /// Flat directory for ad-hoc single files.
    IndividualFiles,
    /// Mirror of the scanned folder's structure.
    Repository { root: PathBuf },
}

impl OutputLayout {
    /// Layout for a single-file run.
    pub fn individual(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            kind: LayoutKind::IndividualFiles,
        }
    }

    /// Layout for a folder run rooted at `root`.
    pub fn repository(base: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            kind: LayoutKind::Repository { root: root.into() },
        }
    }

    /// The cache directory shared by both layouts.
    pub fn cache_dir(&self) -> PathBuf {
        self.base.join(".cache")
    }

    /// Artifact path for one source file.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        let name = artifact_name(source);
        match &self.kind {
            LayoutKind::IndividualFiles => self.base.join("individual_files").join(name),
            LayoutKind::Repository { root } => {
                let relative_dir = source
                    .parent()
                    .and_then(|dir| dir.strip_prefix(root).ok())
                    .unwrap_or_else(|| Path::new(""));
                self.base.join("repositories").join(relative_dir).join(name)
            }
        }
    }

    /// Serialize and write the artifact, creating parent directories.
    pub fn write_artifact(
        &self,
        source: &Path,
        deps: &SqlDependencies,
    ) -> io::Result<PathBuf> {
        let path = self.artifact_path(source);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml = deps
            .to_yaml()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(&path, yaml)?;
        Ok(path)
    }
}

/// `orders.sql` → `orders_dependencies.yaml` (likewise for `.jinja2`).
fn artifact_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    format!("{stem}_dependencies.yaml")
}
