//! Pending and saved recordings

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::ports::{RecordStore, StoreError, TranscodeRequest, Transcoder};
use super::post_processor::ConversionError;
use crate::domain::error::ErrorKind;
use crate::domain::recording::{RecordingFormat, RecordingRecord, RecordingTags, CAPTURE_MP3_BITRATE_KBPS};

/// Catalog errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("No pending recording at index {0}")]
    PendingNotFound(usize),

    #[error("No saved recording at index {0}")]
    SavedNotFound(usize),

    #[error("{} is still being processed", .0.display())]
    Busy(PathBuf),

    #[error("Unsupported destination '{0}'. Valid extensions are: mp3, wav, flac")]
    UnsupportedDestination(String),

    #[error("{0}")]
    FileOp(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PendingNotFound(_) | Self::SavedNotFound(_) => ErrorKind::NotFound,
            Self::Busy(_) => ErrorKind::General,
            Self::UnsupportedDestination(_) => ErrorKind::Usage,
            Self::FileOp(_) => ErrorKind::FileOpFailed,
            Self::Conversion(e) => e.kind(),
            Self::Store(StoreError::Corrupt(_)) => ErrorKind::StoreCorrupt,
            Self::Store(_) => ErrorKind::FileOpFailed,
        }
    }
}

/// Extra work requested when saving a recording
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromoteOptions {
    pub tags: RecordingTags,
    /// MP3 bitrate override for re-encodes
    pub bitrate_kbps: Option<u32>,
}

/// File work for one promotion, detached from the catalog so it can run
/// in the background.
#[derive(Debug, Clone)]
pub struct PromotionJob {
    pub source: RecordingRecord,
    pub destination: PathBuf,
    pub destination_format: RecordingFormat,
    pub options: PromoteOptions,
}

/// A finished promotion
#[derive(Debug, Clone)]
pub struct Promoted {
    pub record: RecordingRecord,
    pub warnings: Vec<String>,
}

/// A removed history entry
#[derive(Debug, Clone)]
pub struct Removed {
    pub record: RecordingRecord,
    pub warnings: Vec<String>,
}

impl PromotionJob {
    /// Copy, move or re-encode the source into the destination.
    ///
    /// Returns warnings for best-effort steps that did not happen. The
    /// source is left in place when the job fails.
    pub async fn run(&self, transcoder: &dyn Transcoder) -> Result<Vec<String>, CatalogError> {
        let source = &self.source.file_path;
        let destination = &self.destination;
        if !source.exists() {
            return Err(CatalogError::FileOp(format!(
                "Source file not found: {}",
                source.display()
            )));
        }
        if source == destination {
            return Ok(Vec::new());
        }
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::FileOp(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let tags = self.options.tags.pairs();
        let reencode_mp3 = self.destination_format == RecordingFormat::Mp3
            && self.options.bitrate_kbps.is_some();
        let same_container = self.source.container() == Some(self.destination_format);

        if same_container && !reencode_mp3 {
            if tags.is_empty() {
                move_file(source, destination)?;
                return Ok(Vec::new());
            }
            return self.copy_with_tags(transcoder, &tags).await;
        }

        let bitrate = match self.destination_format {
            RecordingFormat::Mp3 => Some(self.options.bitrate_kbps.unwrap_or(CAPTURE_MP3_BITRATE_KBPS)),
            _ => None,
        };
        let mut request = TranscodeRequest::new(source, destination, self.destination_format.codec())
            .with_bitrate(bitrate);
        for (key, value) in &tags {
            request = request.with_metadata(*key, *value);
        }

        if let Err(e) = transcoder.transcode(&request).await {
            remove_partial(destination);
            return Err(ConversionError::from(e).into());
        }
        if !destination.exists() {
            return Err(ConversionError::Failed(format!(
                "converter produced no output at {}",
                destination.display()
            ))
            .into());
        }

        let mut warnings = Vec::new();
        if let Err(e) = std::fs::remove_file(source) {
            warn!(path = %source.display(), error = %e, "failed to remove converted source");
            warnings.push(format!("Could not remove {}: {}", source.display(), e));
        }
        Ok(warnings)
    }

    /// Same container with tags: stream copy through the converter, or a
    /// plain move without tags when that is impossible.
    async fn copy_with_tags(
        &self,
        transcoder: &dyn Transcoder,
        tags: &[(&'static str, &str)],
    ) -> Result<Vec<String>, CatalogError> {
        let source = &self.source.file_path;
        let destination = &self.destination;

        let mut request = TranscodeRequest::new(source, destination, "copy");
        for (key, value) in tags {
            request = request.with_metadata(*key, *value);
        }

        let failure = match transcoder.transcode(&request).await {
            Ok(()) if destination.exists() => None,
            Ok(()) => Some("converter produced no output".to_string()),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => {
                if let Err(e) = std::fs::remove_file(source) {
                    warn!(path = %source.display(), error = %e, "failed to remove tagged source");
                }
                Ok(Vec::new())
            }
            Some(reason) => {
                warn!(reason = %reason, "tags not written, saving untagged copy");
                remove_partial(destination);
                move_file(source, destination)?;
                Ok(vec![format!("Tags were not written: {}", reason)])
            }
        }
    }
}

/// Rename, falling back to copy and delete across filesystems
fn move_file(source: &Path, destination: &Path) -> Result<(), CatalogError> {
    if std::fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    std::fs::copy(source, destination).map_err(|e| {
        CatalogError::FileOp(format!(
            "Failed to copy {} to {}: {}",
            source.display(),
            destination.display(),
            e
        ))
    })?;
    if let Err(e) = std::fs::remove_file(source) {
        warn!(path = %source.display(), error = %e, "copied but could not remove source");
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

/// In-memory catalog of finished captures.
///
/// `pending` holds captures not yet saved; `saved` is the history and is
/// written through the record store on every change.
pub struct RecordingCatalog {
    store: Arc<dyn RecordStore>,
    pending: Vec<RecordingRecord>,
    saved: Vec<RecordingRecord>,
    busy: HashSet<PathBuf>,
}

impl RecordingCatalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            pending: Vec::new(),
            saved: Vec::new(),
            busy: HashSet::new(),
        }
    }

    /// Load the history, dropping entries whose file is gone.
    ///
    /// Returns how many entries were dropped. A corrupt store leaves the
    /// history empty and returns the error for the caller to surface.
    pub async fn load(&mut self) -> Result<usize, CatalogError> {
        match self.store.load().await {
            Ok(records) => {
                let total = records.len();
                self.saved = records
                    .into_iter()
                    .filter(|record| {
                        let exists = record.exists_on_disk();
                        if !exists {
                            debug!(path = %record.file_path.display(), "dropping history entry with missing file");
                        }
                        exists
                    })
                    .collect();
                let dropped = total - self.saved.len();
                info!(loaded = self.saved.len(), dropped, "history loaded");
                Ok(dropped)
            }
            Err(e) => {
                self.saved.clear();
                Err(e.into())
            }
        }
    }

    pub fn pending(&self) -> &[RecordingRecord] {
        &self.pending
    }

    pub fn saved(&self) -> &[RecordingRecord] {
        &self.saved
    }

    /// Append a finished capture to the pending list
    pub fn add(&mut self, record: RecordingRecord) {
        debug!(path = %record.file_path.display(), "recording pending");
        self.pending.push(record);
    }

    /// Mark a file as being rewritten in the background
    pub fn mark_busy(&mut self, path: &Path) {
        self.busy.insert(path.to_path_buf());
    }

    pub fn release(&mut self, path: &Path) {
        self.busy.remove(path);
    }

    pub fn is_busy(&self, path: &Path) -> bool {
        self.busy.contains(path)
    }

    /// Point the record at `from` to `to` instead.
    ///
    /// Returns false when no record matches.
    pub async fn repoint(&mut self, from: &Path, to: &Path) -> bool {
        if let Some(record) = self.pending.iter_mut().find(|r| r.points_at(from)) {
            record.file_path = to.to_path_buf();
            return true;
        }
        if let Some(record) = self.saved.iter_mut().find(|r| r.points_at(from)) {
            record.file_path = to.to_path_buf();
            if let Err(e) = self.persist().await {
                warn!(error = %e, "failed to save history");
            }
            return true;
        }
        false
    }

    /// Validate a promotion of pending entry `index` and reserve its file
    pub fn begin_promote(
        &mut self,
        index: usize,
        destination: PathBuf,
        options: PromoteOptions,
    ) -> Result<PromotionJob, CatalogError> {
        let source = self
            .pending
            .get(index)
            .cloned()
            .ok_or(CatalogError::PendingNotFound(index))?;
        if self.is_busy(&source.file_path) {
            return Err(CatalogError::Busy(source.file_path));
        }
        let destination_format = RecordingFormat::from_path(&destination).ok_or_else(|| {
            CatalogError::UnsupportedDestination(destination.display().to_string())
        })?;

        self.mark_busy(&source.file_path);
        Ok(PromotionJob {
            source,
            destination,
            destination_format,
            options,
        })
    }

    /// Apply the result of [`PromotionJob::run`].
    ///
    /// On success the record moves from pending to saved, pointing at the
    /// destination, and the history is written.
    pub async fn complete_promote(
        &mut self,
        job: PromotionJob,
        outcome: Result<Vec<String>, CatalogError>,
    ) -> Result<Promoted, CatalogError> {
        self.release(&job.source.file_path);
        let mut warnings = outcome?;

        if let Some(position) = self
            .pending
            .iter()
            .position(|r| r.points_at(&job.source.file_path))
        {
            self.pending.remove(position);
        }

        let mut record = job.source;
        record.file_path = job.destination;
        record.format = job.destination_format;
        record.date_added = Local::now();
        if !job.options.tags.is_empty() {
            record.tags = Some(job.options.tags);
        }
        self.saved.push(record.clone());
        info!(path = %record.file_path.display(), "recording saved");

        if let Err(e) = self.persist().await {
            warn!(error = %e, "failed to save history");
            warnings.push(e.to_string());
        }
        Ok(Promoted { record, warnings })
    }

    /// Save pending entry `index` to `destination` in one call
    pub async fn promote(
        &mut self,
        index: usize,
        destination: PathBuf,
        options: PromoteOptions,
        transcoder: &dyn Transcoder,
    ) -> Result<Promoted, CatalogError> {
        let job = self.begin_promote(index, destination, options)?;
        let outcome = job.run(transcoder).await;
        self.complete_promote(job, outcome).await
    }

    /// Remove history entry `index`, optionally deleting its file.
    ///
    /// The entry is removed even when the file cannot be deleted.
    pub async fn remove(&mut self, index: usize, delete_file: bool) -> Result<Removed, CatalogError> {
        if index >= self.saved.len() {
            return Err(CatalogError::SavedNotFound(index));
        }
        let record = self.saved.remove(index);
        let mut warnings = Vec::new();

        if let Err(e) = self.persist().await {
            warn!(error = %e, "failed to save history");
            warnings.push(e.to_string());
        }

        if delete_file {
            if !record.exists_on_disk() {
                warnings.push(format!(
                    "The entry was removed, but {} was already missing",
                    record.file_path.display()
                ));
            } else if let Err(e) = std::fs::remove_file(&record.file_path) {
                warn!(path = %record.file_path.display(), error = %e, "failed to delete recording");
                warnings.push(format!(
                    "The entry was removed, but the file could not be deleted: {}",
                    e
                ));
            }
        }

        Ok(Removed { record, warnings })
    }

    /// Write the saved list to the store
    pub async fn persist(&self) -> Result<(), CatalogError> {
        self.store.save(&self.saved).await?;
        Ok(())
    }
}
