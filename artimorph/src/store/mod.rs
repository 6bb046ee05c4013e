//! Durable local storage for downloaded models.
//!
//! Every model lives directly in the store directory under a name that
//! embeds a fresh UUID, so two downloads never collide:
//!
//! ```text
//! <models_dir>/
//!   3DModel_6f1c...e2.glb            committed model
//!   .3DModel_91ab...07.glb.partial   download in flight (hidden, skipped by list)
//!   chair.usdz                       imported model
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// File extensions recognised as model files.
pub const MODEL_EXTENSIONS: &[&str] = &["glb", "usdz", "gltf"];

/// Extension used when the asset URL does not name one.
pub const DEFAULT_MODEL_EXTENSION: &str = "glb";

/// Prefix of every downloaded model's file name.
pub const MODEL_FILE_PREFIX: &str = "3DModel_";

const STAGING_SUFFIX: &str = ".partial";

/// Errors from model store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create model directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid model name: {0}")]
    InvalidName(String),

    #[error("unsupported model extension: {0}")]
    UnsupportedExtension(String),

    #[error("model not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A download destination handed out by [`ModelStore::allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedModel {
    /// Hidden file the transfer writes into.
    pub staging: PathBuf,
    /// Final location after [`ModelStore::commit`].
    pub destination: PathBuf,
}

/// A model file found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

/// Directory of model files.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    /// Open the store, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::CreateDir {
            path: root.clone(),
            source,
        })?;
        debug!(root = %root.display(), "Model store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a unique destination for a new model.
    pub fn allocate(&self, ext: &str) -> Result<StagedModel, StoreError> {
        let ext = normalize_extension(ext)?;
        let name = format!("{}{}.{}", MODEL_FILE_PREFIX, Uuid::new_v4(), ext);
        Ok(StagedModel {
            staging: self.root.join(format!(".{}{}", name, STAGING_SUFFIX)),
            destination: self.root.join(name),
        })
    }

    /// Move a finished download into place.
    pub async fn commit(&self, staged: &StagedModel) -> Result<PathBuf, StoreError> {
        tokio::fs::rename(&staged.staging, &staged.destination).await?;
        info!(path = %staged.destination.display(), "Model saved");
        Ok(staged.destination.clone())
    }

    /// Remove a staging file left by a failed or cancelled download.
    pub async fn discard(&self, staged: &StagedModel) {
        match tokio::fs::remove_file(&staged.staging).await {
            Ok(()) => debug!(path = %staged.staging.display(), "Staging file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %staged.staging.display(), error = %e, "Failed to remove staging file"),
        }
    }

    /// Models in the store, most recently modified first.
    pub fn list(&self) -> Result<Vec<ModelEntry>, StoreError> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.ends_with(STAGING_SUFFIX) {
                continue;
            }
            let path = entry.path();
            if !has_model_extension(&path) {
                continue;
            }
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push(ModelEntry {
                name,
                path,
                size: metadata.len(),
                modified: DateTime::<Local>::from(modified),
            });
        }

        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    /// Delete a model by file name.
    pub fn remove(&self, name: &str) -> Result<PathBuf, StoreError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let path = self.root.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Model removed");
                Ok(path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Copy an external model file into the store.
    ///
    /// Keeps the original file name; on a collision the stem gets a
    /// `_<unix-seconds>` suffix.
    pub fn import(&self, source: &Path) -> Result<PathBuf, StoreError> {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| StoreError::UnsupportedExtension(source.display().to_string()))?;
        let ext = normalize_extension(ext)?;
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty() && !s.starts_with('.'))
            .ok_or_else(|| StoreError::InvalidName(source.display().to_string()))?;

        let mut reader = fs::File::open(source)?;
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        // Existing files are never overwritten: `create_new` claims the name
        // atomically and a taken name moves on to the next candidate.
        let mut attempt: u32 = 0;
        let (destination, mut file) = loop {
            let name = match attempt {
                0 => format!("{}.{}", stem, ext),
                1 => format!("{}_{}.{}", stem, secs, ext),
                n => format!("{}_{}_{}.{}", stem, secs, n - 1, ext),
            };
            let candidate = self.root.join(name);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(file) => break (candidate, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %candidate.display(), "Import name taken");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Err(e) = io::copy(&mut reader, &mut file) {
            drop(file);
            let _ = fs::remove_file(&destination);
            return Err(e.into());
        }

        info!(from = %source.display(), to = %destination.display(), "Model imported");
        Ok(destination)
    }
}

/// Model extension named by a URL path, if it is one we recognise.
pub fn extension_from_url(url: &reqwest::Url) -> Option<&'static str> {
    let last = url.path_segments()?.next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    MODEL_EXTENSIONS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(ext))
}

fn normalize_extension(ext: &str) -> Result<&'static str, StoreError> {
    let ext = ext.trim_start_matches('.');
    MODEL_EXTENSIONS
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(ext))
        .ok_or_else(|| StoreError::UnsupportedExtension(ext.to_string()))
}

fn has_model_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| normalize_extension(e).is_ok())
}

/// Default models directory: `<documents>/ArtiMorph/Models`.
///
/// Falls back to the data directory, then the current directory.
pub fn default_models_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::data_dir)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ArtiMorph")
        .join("Models")
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn store() -> (TempDir, ModelStore) {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::open(dir.path().join("Models")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_directory() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_allocate_names_are_unique() {
        let (_dir, store) = store();
        let a = store.allocate("glb").unwrap();
        let b = store.allocate("glb").unwrap();

        assert_ne!(a.destination, b.destination);
        let name = a.destination.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(MODEL_FILE_PREFIX));
        assert!(name.ends_with(".glb"));
        let staging = a.staging.file_name().unwrap().to_str().unwrap();
        assert!(staging.starts_with('.'));
        assert!(staging.ends_with(".partial"));
    }

    #[test]
    fn test_allocate_rejects_unknown_extension() {
        let (_dir, store) = store();
        assert!(matches!(
            store.allocate("exe"),
            Err(StoreError::UnsupportedExtension(_))
        ));
        assert!(store.allocate(".USDZ").is_ok());
    }

    #[tokio::test]
    async fn test_commit_moves_staging_into_place() {
        let (_dir, store) = store();
        let staged = store.allocate("glb").unwrap();
        std::fs::write(&staged.staging, b"glTF").unwrap();

        let path = store.commit(&staged).await.unwrap();

        assert_eq!(path, staged.destination);
        assert!(path.exists());
        assert!(!staged.staging.exists());
    }

    #[tokio::test]
    async fn test_discard_tolerates_missing_file() {
        let (_dir, store) = store();
        let staged = store.allocate("glb").unwrap();
        store.discard(&staged).await;

        std::fs::write(&staged.staging, b"partial").unwrap();
        store.discard(&staged).await;
        assert!(!staged.staging.exists());
    }

    #[test]
    fn test_list_newest_first_and_skips_non_models() {
        let (_dir, store) = store();
        let root = store.root();
        std::fs::write(root.join("old.glb"), b"a").unwrap();
        std::fs::write(root.join("new.usdz"), b"bb").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::write(root.join(".3DModel_x.glb.partial"), b"x").unwrap();
        std::fs::write(root.join(".hidden.glb"), b"x").unwrap();

        set_file_mtime(root.join("old.glb"), FileTime::from_unix_time(1_000_000, 0)).unwrap();
        set_file_mtime(root.join("new.usdz"), FileTime::from_unix_time(2_000_000, 0)).unwrap();

        let entries = store.list().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["new.usdz", "old.glb"]);
        assert_eq!(entries[0].size, 2);
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = store();
        std::fs::write(store.root().join("a.glb"), b"a").unwrap();

        store.remove("a.glb").unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(store.remove("a.glb"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_remove_rejects_paths() {
        let (_dir, store) = store();
        for name in ["../etc/passwd", "a/b.glb", "", ".3DModel_x.glb.partial"] {
            assert!(matches!(store.remove(name), Err(StoreError::InvalidName(_))));
        }
    }

    #[test]
    fn test_import_copies_and_avoids_collision() {
        let (dir, store) = store();
        let source = dir.path().join("chair.glb");
        std::fs::write(&source, b"chair").unwrap();

        let first = store.import(&source).unwrap();
        assert_eq!(first.file_name().unwrap(), "chair.glb");

        let second = store.import(&source).unwrap();
        let name = second.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("chair_"));
        assert!(name.ends_with(".glb"));

        // Same name again within the same second.
        let third = store.import(&source).unwrap();
        assert_ne!(third, first);
        assert_ne!(third, second);

        assert!(source.exists());
        assert_eq!(store.list().unwrap().len(), 3);
        for path in [&first, &second, &third] {
            assert_eq!(std::fs::read(path).unwrap(), b"chair");
        }
    }

    #[test]
    fn test_import_never_overwrites_existing_model() {
        let (dir, store) = store();
        std::fs::write(store.root().join("lamp.glb"), b"original").unwrap();
        let source = dir.path().join("lamp.glb");
        std::fs::write(&source, b"incoming").unwrap();

        let imported = store.import(&source).unwrap();

        assert_ne!(imported.file_name().unwrap(), "lamp.glb");
        assert_eq!(
            std::fs::read(store.root().join("lamp.glb")).unwrap(),
            b"original"
        );
        assert_eq!(std::fs::read(&imported).unwrap(), b"incoming");
    }

    #[test]
    fn test_import_rejects_non_models() {
        let (dir, store) = store();
        let source = dir.path().join("photo.png");
        std::fs::write(&source, b"png").unwrap();
        assert!(matches!(
            store.import(&source),
            Err(StoreError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn test_extension_from_url() {
        let url = reqwest::Url::parse("https://cdn.test/a/model.GLB?sig=1").unwrap();
        assert_eq!(extension_from_url(&url), Some("glb"));
        let url = reqwest::Url::parse("https://cdn.test/a/scene.usdz").unwrap();
        assert_eq!(extension_from_url(&url), Some("usdz"));
        let url = reqwest::Url::parse("https://cdn.test/download?id=7").unwrap();
        assert_eq!(extension_from_url(&url), None);
    }

    #[test]
    fn test_default_models_dir_shape() {
        let dir = default_models_dir();
        assert!(dir.ends_with("ArtiMorph/Models"));
    }
}
