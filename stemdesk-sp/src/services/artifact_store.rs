//! Workspace layout, naming, eviction and bundling
//!
//! Artifact names are part of the external contract and must not change:
//! `merged_<c>.wav` → `denoised_merged_<c>.wav` → `denoised_merged_<c>_normalized.wav`,
//! speakers under `speakers/speaker_<label>.wav`, bundle at `all_separated_files.zip`.

use crate::models::{ComponentLabel, Scope, WorkspaceEntry};
use crate::services::audio_io::partial_path;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

pub const BUNDLE_FILE_NAME: &str = "all_separated_files.zip";
pub const SPEAKERS_DIR: &str = "speakers";
pub const SESSIONS_DIR: &str = "sessions";
pub const SPEAKER_PREFIX: &str = "speaker_";
const UPLOAD_PREFIX: &str = "upload_";

pub fn chunk_file_name(index: usize) -> String {
    format!("temp_chunk_{}.wav", index)
}

pub fn merged_file_name(label: ComponentLabel) -> String {
    format!("merged_{}.wav", label)
}

pub fn denoised_file_name(label: ComponentLabel) -> String {
    format!("denoised_merged_{}.wav", label)
}

/// `foo.wav` → `foo_normalized.wav`
pub fn normalized_file_name(name: &str) -> String {
    let stem = name.strip_suffix(".wav").unwrap_or_else(|| {
        Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name)
    });
    format!("{}_normalized.wav", stem)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("No separated files available to bundle")]
    NothingToBundle,

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for StoreError {
    fn from(e: zip::result::ZipError) -> Self {
        StoreError::Archive(e.to_string())
    }
}

/// Reject names that could escape the scope directory
pub fn validate_name(name: &str) -> Result<&str, StoreError> {
    let invalid = name.is_empty()
        || name.len() > 255
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Reduce a client-supplied file name to a safe basename
pub fn sanitize_upload_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').replace("..", "_");
    if cleaned.is_empty() {
        "audio".to_string()
    } else {
        cleaned
    }
}

/// The on-disk workspace
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a scope's artifacts
    pub fn dir(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Shared => self.root.clone(),
            Scope::Session(id) => self.root.join(SESSIONS_DIR).join(id.to_string()),
        }
    }

    pub fn speakers_dir(&self, scope: Scope) -> PathBuf {
        self.dir(scope).join(SPEAKERS_DIR)
    }

    /// Create a scope's directory if needed
    pub fn ensure_dir(&self, scope: Scope) -> Result<PathBuf, StoreError> {
        let dir = self.dir(scope);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Where an uploaded file is stored
    pub fn upload_path(&self, scope: Scope, raw_name: &str) -> PathBuf {
        self.dir(scope)
            .join(format!("{}{}", UPLOAD_PREFIX, sanitize_upload_name(raw_name)))
    }

    /// Path the fixed denoised artifact for `label` lives at
    pub fn denoised_path(&self, scope: Scope, label: ComponentLabel) -> PathBuf {
        self.dir(scope).join(denoised_file_name(label))
    }

    /// Map a client-supplied artifact name to an existing file
    ///
    /// Names starting with `speaker_` are looked up under `speakers/`.
    pub fn resolve(&self, scope: Scope, name: &str) -> Result<PathBuf, StoreError> {
        let name = validate_name(name)?;
        let path = if name.starts_with(SPEAKER_PREFIX) {
            self.speakers_dir(scope).join(name)
        } else {
            self.dir(scope).join(name)
        };

        if !path.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(path)
    }

    /// Top-level files of a scope
    pub fn list_entries(&self, scope: Scope) -> Result<Vec<WorkspaceEntry>, StoreError> {
        let dir = self.dir(scope);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(WorkspaceEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                last_modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Delete top-level files of a scope at least `max_age` old
    ///
    /// Directories are skipped; stale session directories are found by
    /// [`Self::stale_sessions`].
    pub fn evict_older_than(&self, scope: Scope, max_age: Duration) -> Result<Vec<PathBuf>, StoreError> {
        let now = SystemTime::now();
        let mut removed = Vec::new();

        for entry in self.list_entries(scope)? {
            let age = now
                .duration_since(SystemTime::from(entry.last_modified))
                .unwrap_or_default();
            if age < max_age {
                continue;
            }
            match std::fs::remove_file(&entry.path) {
                Ok(()) => {
                    debug!("Evicted {} (age {}s)", entry.path.display(), age.as_secs());
                    removed.push(entry.path);
                }
                Err(e) => warn!("Failed to evict {}: {}", entry.path.display(), e),
            }
        }

        if !removed.is_empty() {
            info!(scope = %scope, removed = removed.len(), "Evicted old workspace files");
        }
        Ok(removed)
    }

    /// Sessions whose newest file is at least `max_age` old
    ///
    /// Directories under `sessions/` that are not session ids are ignored.
    pub fn stale_sessions(&self, max_age: Duration) -> Result<Vec<Uuid>, StoreError> {
        let sessions = self.root.join(SESSIONS_DIR);
        if !sessions.is_dir() {
            return Ok(Vec::new());
        }

        let now = SystemTime::now();
        let mut stale = Vec::new();

        for entry in std::fs::read_dir(&sessions)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) else {
                continue;
            };

            let newest = WalkDir::new(entry.path())
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter_map(|m| m.modified().ok())
                .max();
            let age = newest
                .and_then(|t| now.duration_since(t).ok())
                .unwrap_or_default();
            if age >= max_age {
                stale.push(id);
            }
        }

        stale.sort();
        Ok(stale)
    }

    /// Delete a session directory and everything in it
    pub fn remove_session(&self, id: Uuid) -> Result<(), StoreError> {
        let dir = self.dir(Scope::Session(id));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            debug!("Removed session {}", dir.display());
        }
        Ok(())
    }

    /// Delete every `speaker_*` file left in a scope's speaker directory
    pub fn clear_speaker_files(&self, scope: Scope) -> Result<usize, StoreError> {
        clear_speaker_files_in(&self.speakers_dir(scope))
    }

    /// Zip the denoised components and speaker files of a scope
    ///
    /// Members are the existing `denoised_merged_<c>.wav` files at the archive root and
    /// every `.wav` under `speakers/` as `speakers/<name>.wav`.
    pub fn bundle(&self, scope: Scope) -> Result<PathBuf, StoreError> {
        let dir = self.dir(scope);
        let mut members: Vec<(String, PathBuf)> = ComponentLabel::ALL
            .into_iter()
            .map(|label| (denoised_file_name(label), self.denoised_path(scope, label)))
            .filter(|(_, path)| path.is_file())
            .collect();

        let speakers = self.speakers_dir(scope);
        if speakers.is_dir() {
            let mut speaker_files: Vec<PathBuf> = std::fs::read_dir(&speakers)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "wav"))
                .collect();
            speaker_files.sort();
            for path in speaker_files {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    members.push((format!("{}/{}", SPEAKERS_DIR, name), path.clone()));
                }
            }
        }

        if members.is_empty() {
            return Err(StoreError::NothingToBundle);
        }

        let output = dir.join(BUNDLE_FILE_NAME);
        let staging = partial_path(&output);
        if let Err(e) = write_archive(&staging, &members) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }
        std::fs::rename(&staging, &output)?;

        info!(scope = %scope, members = members.len(), "Bundled {}", output.display());
        Ok(output)
    }

    /// Delete everything under the workspace root
    pub fn purge_all(&self) -> Result<usize, StoreError> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut purged = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            let result = if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => purged += 1,
                Err(e) => warn!("Failed to purge {}: {}", path.display(), e),
            }
        }

        info!(purged, "Purged workspace {}", self.root.display());
        Ok(purged)
    }
}

/// Delete `speaker_*` files directly under `dir`
pub fn clear_speaker_files_in(dir: &Path) -> Result<usize, StoreError> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut cleared = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_speaker = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(SPEAKER_PREFIX));
        if is_speaker && entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
            cleared += 1;
        }
    }
    debug!(cleared, "Cleared previous speaker files");
    Ok(cleared)
}

fn write_archive(path: &Path, members: &[(String, PathBuf)]) -> Result<(), StoreError> {
    let file = File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, source) in members {
        zip.start_file(name.as_str(), options)?;
        let mut input = File::open(source)?;
        std::io::copy(&mut input, &mut zip)?;
    }

    zip.finish()?;
    Ok(())
}
