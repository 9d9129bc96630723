//! Filesystem stores for reference images and embedding records.
//!
//! Both stores are flat directories keyed by display name
//! (`<name>.png`, `<name>.json`), created on first write. Each file is
//! written to a temporary sibling and renamed into place, so a single
//! artifact is never observed half-written. The image and the record are
//! still two separate writes.

use crate::types::EmbeddingRecord;
use image::{GrayImage, ImageFormat};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

const IMAGE_EXTENSION: &str = "png";
const RECORD_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("name {0:?} cannot be used as a file name")]
    InvalidName(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("corrupt record {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("image codec error for {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("no entry named {0:?}")]
    NotFound(String),
}

/// Reject names that would escape the store directory or collide with
/// path syntax. Empty, whitespace-only and duplicate names are allowed.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let unsafe_name = name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Directory of cropped grayscale reference images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{IMAGE_EXTENSION}"))
    }

    /// Write `image` under `name`, replacing any previous image.
    pub fn save(&self, name: &str, image: &GrayImage) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        let path = self.path_for(name);
        write_atomically(&self.dir, &path, |writer| {
            image
                .write_to(writer, ImageFormat::Png)
                .map_err(|source| StoreError::Image { path: path.clone(), source })
        })?;
        tracing::debug!(path = %path.display(), "saved reference image");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<GrayImage, StoreError> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let image = image::open(&path).map_err(|source| StoreError::Image { path, source })?;
        Ok(image.to_luma8())
    }

    /// Delete the image for `name`. Returns whether a file was removed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        validate_name(name)?;
        remove_if_exists(&self.path_for(name))
    }
}

/// A stored record as yielded by [`EmbeddingStore::scan`].
///
/// `name` comes from the file name; a record that fails to load is kept so
/// the caller can report it and move on.
#[derive(Debug)]
pub struct StoredEmbedding {
    pub name: String,
    pub path: PathBuf,
    pub record: Result<EmbeddingRecord, StoreError>,
}

/// Directory of JSON embedding records.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    dir: PathBuf,
}

impl EmbeddingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }

    /// Write `record` under its name, replacing any previous record.
    pub fn save(&self, record: &EmbeddingRecord) -> Result<PathBuf, StoreError> {
        validate_name(&record.name)?;
        let path = self.path_for(&record.name);
        write_atomically(&self.dir, &path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, record).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: format!("serialization failed: {e}"),
            })?;
            writer
                .write_all(b"\n")
                .map_err(|source| StoreError::Write { path: path.clone(), source })
        })?;
        tracing::debug!(path = %path.display(), dim = record.embedding.dim(), "saved embedding record");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<EmbeddingRecord, StoreError> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        read_record(&path)
    }

    /// Every record in the store, sorted by file name. A missing directory
    /// is an empty store.
    pub fn scan(&self) -> Result<Vec<StoredEmbedding>, StoreError> {
        Ok(self
            .record_paths()?
            .into_iter()
            .map(|(name, path)| {
                let record = read_record(&path);
                StoredEmbedding { name, path, record }
            })
            .collect())
    }

    /// Enrolled names, sorted.
    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.record_paths()?.into_iter().map(|(name, _)| name).collect())
    }

    /// Delete the record for `name`. Returns whether a file was removed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        validate_name(name)?;
        remove_if_exists(&self.path_for(name))
    }

    fn record_paths(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| StoreError::Read {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|s| s.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping record with non UTF-8 name");
                continue;
            };
            // `.json` belongs to the empty name.
            let Some(name) = name_from_file(file_name, RECORD_EXTENSION) else {
                continue;
            };
            found.push((name.to_string(), path.clone()));
        }

        found.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(found)
    }
}

/// The pair of stores written by one enrollment.
#[derive(Debug, Clone)]
pub struct FaceStore {
    pub images: ImageStore,
    pub embeddings: EmbeddingStore,
}

impl FaceStore {
    pub fn new(images_dir: impl Into<PathBuf>, embeddings_dir: impl Into<PathBuf>) -> Self {
        Self {
            images: ImageStore::new(images_dir),
            embeddings: EmbeddingStore::new(embeddings_dir),
        }
    }

    /// Remove both artifacts for `name`. Returns whether anything was removed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let image = self.images.remove(name)?;
        let record = self.embeddings.remove(name)?;
        Ok(image || record)
    }
}

/// Inverse of `path_for`: `"Ana.json"` -> `"Ana"`, `".json"` -> `""`.
fn name_from_file<'a>(file_name: &'a str, extension: &str) -> Option<&'a str> {
    file_name.strip_suffix(extension)?.strip_suffix('.')
}

fn read_record(path: &Path) -> Result<EmbeddingRecord, StoreError> {
    let data = fs::read(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Create `dir` if needed, let `fill` write into a temp file inside it, then
/// rename the temp file over `path`.
fn write_atomically<F>(dir: &Path, path: &Path, fill: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut BufWriter<&mut fs::File>) -> Result<(), StoreError>,
{
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(|source| StoreError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let file = tmp.as_file_mut();
        let mut writer = BufWriter::new(&mut *file);
        fill(&mut writer)?;
        writer.flush().map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use image::Luma;
    use tempfile::TempDir;

    fn record(name: &str, values: &[f32]) -> EmbeddingRecord {
        EmbeddingRecord::new(name, Embedding::new(values.to_vec()))
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Ana").is_ok());
        assert!(validate_name("").is_ok());
        assert!(validate_name("  ").is_ok());
        assert!(validate_name("José Luis").is_ok());
        for bad in [".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(matches!(validate_name(bad), Err(StoreError::InvalidName(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_record_store_creates_dir_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddingStore::new(tmp.path().join("embeddings"));

        store.save(&record("Ana", &[1.0, 0.0])).unwrap();
        store.save(&record("Ana", &[0.0, 1.0])).unwrap();

        assert_eq!(store.names().unwrap(), vec!["Ana".to_string()]);
        assert_eq!(store.load("Ana").unwrap().embedding.values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_scan_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddingStore::new(tmp.path().join("never-created"));
        assert!(store.scan().unwrap().is_empty());
    }

    #[test]
    fn test_scan_sorted_and_keeps_corrupt_entries() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddingStore::new(tmp.path());
        store.save(&record("Luis", &[1.0])).unwrap();
        store.save(&record("Ana", &[2.0])).unwrap();
        fs::write(tmp.path().join("Bea.json"), b"{ not json").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"ignored").unwrap();

        let scanned = store.scan().unwrap();
        let names: Vec<&str> = scanned.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bea", "Luis"]);
        assert!(scanned[0].record.is_ok());
        assert!(matches!(scanned[1].record, Err(StoreError::Corrupt { .. })));
        assert!(scanned[2].record.is_ok());
    }

    #[test]
    fn test_empty_name_is_listed_and_loaded() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddingStore::new(tmp.path());
        store.save(&record("", &[1.0, 0.0])).unwrap();
        store.save(&record("Ana", &[0.0, 1.0])).unwrap();

        assert_eq!(store.path_for(""), tmp.path().join(".json"));
        assert_eq!(store.names().unwrap(), vec![String::new(), "Ana".to_string()]);
        let scanned = store.scan().unwrap();
        assert_eq!(scanned[0].record.as_ref().unwrap().embedding.values, vec![1.0, 0.0]);
        assert!(store.remove("").unwrap());
        assert_eq!(store.names().unwrap(), vec!["Ana".to_string()]);
    }

    #[test]
    fn test_name_from_file() {
        assert_eq!(name_from_file("Ana.json", RECORD_EXTENSION), Some("Ana"));
        assert_eq!(name_from_file(".json", RECORD_EXTENSION), Some(""));
        assert_eq!(name_from_file("a.b.json", RECORD_EXTENSION), Some("a.b"));
        assert_eq!(name_from_file("json", RECORD_EXTENSION), None);
        assert_eq!(name_from_file("Ana.png", RECORD_EXTENSION), None);
        assert_eq!(name_from_file(".png", IMAGE_EXTENSION), Some(""));
    }

    #[test]
    fn test_image_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = ImageStore::new(tmp.path().join("faces"));
        let image = GrayImage::from_fn(4, 3, |x, y| Luma([(x * 10 + y) as u8]));

        let path = store.save("Ana", &image).unwrap();
        assert_eq!(path, tmp.path().join("faces").join("Ana.png"));
        assert_eq!(store.load("Ana").unwrap(), image);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FaceStore::new(tmp.path().join("faces"), tmp.path().join("embeddings"));
        assert!(matches!(store.images.load("ghost"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.embeddings.load("ghost"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_remove_both_artifacts() {
        let tmp = TempDir::new().unwrap();
        let store = FaceStore::new(tmp.path().join("faces"), tmp.path().join("embeddings"));
        store.images.save("Ana", &GrayImage::new(2, 2)).unwrap();
        store.embeddings.save(&record("Ana", &[1.0])).unwrap();

        assert!(store.remove("Ana").unwrap());
        assert!(!store.remove("Ana").unwrap());
        assert!(store.embeddings.names().unwrap().is_empty());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddingStore::new(tmp.path());
        store.save(&record("Ana", &[1.0])).unwrap();
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
