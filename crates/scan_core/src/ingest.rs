//! Validation and session-scoped accumulation of candidate image files.
//!
//! Nothing in here touches the network. [`validate`] is a pure function of
//! its inputs; [`ImageIngestQueue`] layers accumulation across repeated
//! selections (several drag-and-drop actions, say) on top of it until the
//! staged set is committed or cleared.

use std::{collections::HashSet, fmt, sync::Arc};

pub const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    pub max_files: usize,
    pub max_size_bytes: u64,
}

impl IngestConfig {
    pub fn from_megabytes(max_files: usize, max_size_mb: u64) -> Self {
        Self {
            max_files,
            max_size_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_megabytes(20, 10)
    }
}

/// Identity used for de-duplication: a re-selected file with the same name
/// and size is the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content: Arc<[u8]>,
}

impl CandidateFile {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: content.len() as u64,
            content: content.into(),
        }
    }

    pub fn identity(&self) -> FileIdentity {
        FileIdentity {
            name: self.name.clone(),
            size_bytes: self.size_bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    NotAnImage,
    ExceedsSizeLimit { limit_bytes: u64 },
    /// The upload endpoint refused a file that passed local validation.
    ServerRejected(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NotAnImage => write!(f, "not an image"),
            RejectionReason::ExceedsSizeLimit { limit_bytes } => {
                write!(f, "exceeds size limit of {}MB", limit_bytes / BYTES_PER_MB)
            }
            RejectionReason::ServerRejected(detail) => write!(f, "rejected by server: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file_name: String,
    pub reason: RejectionReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.reason)
    }
}

/// Aggregate rejection for files that were individually valid but did not
/// fit under `max_files`. Never folded into the per-file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowRejection {
    pub limit: usize,
    pub dropped: Vec<String>,
}

impl fmt::Display for OverflowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} images are allowed; {} file(s) not added",
            self.limit,
            self.dropped.len()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub accepted: Vec<CandidateFile>,
    pub rejected: Vec<Rejection>,
    pub overflow: Option<OverflowRejection>,
    /// Names of files skipped because the same identity is already held.
    pub duplicates: Vec<String>,
}

impl ValidationOutcome {
    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty() || self.overflow.is_some()
    }
}

/// Partitions `files` into accepted files and itemized rejections.
///
/// `existing` is what the session already holds: it counts against
/// `max_files` and is used to drop re-selected duplicates. Files are checked
/// in input order; when the accepted set would exceed the remaining room the
/// tail is cut off and reported as one [`OverflowRejection`].
pub fn validate(
    files: impl IntoIterator<Item = CandidateFile>,
    existing: &[FileIdentity],
    config: &IngestConfig,
) -> ValidationOutcome {
    let mut seen: HashSet<FileIdentity> = existing.iter().cloned().collect();
    let room = config.max_files.saturating_sub(existing.len());
    let mut outcome = ValidationOutcome::default();

    for file in files {
        if !file.is_image() {
            outcome.rejected.push(Rejection {
                file_name: file.name,
                reason: RejectionReason::NotAnImage,
            });
            continue;
        }
        if file.size_bytes > config.max_size_bytes {
            outcome.rejected.push(Rejection {
                file_name: file.name,
                reason: RejectionReason::ExceedsSizeLimit {
                    limit_bytes: config.max_size_bytes,
                },
            });
            continue;
        }
        if !seen.insert(file.identity()) {
            outcome.duplicates.push(file.name);
            continue;
        }
        outcome.accepted.push(file);
    }

    if outcome.accepted.len() > room {
        let dropped = outcome
            .accepted
            .split_off(room)
            .into_iter()
            .map(|file| file.name)
            .collect();
        outcome.overflow = Some(OverflowRejection {
            limit: config.max_files,
            dropped,
        });
    }

    outcome
}

/// Staging area for files picked before an upload.
#[derive(Debug, Clone, Default)]
pub struct ImageIngestQueue {
    config: IngestConfig,
    committed: Vec<FileIdentity>,
    pending: Vec<CandidateFile>,
}

impl ImageIngestQueue {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config,
            committed: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Replaces the identities of files already stored server-side. They
    /// count against the file limit and are never staged twice.
    pub fn sync_committed(&mut self, identities: impl IntoIterator<Item = FileIdentity>) {
        self.committed = identities.into_iter().collect();
    }

    /// Validates `files` against everything committed or staged so far and
    /// appends the accepted ones.
    pub fn add(&mut self, files: impl IntoIterator<Item = CandidateFile>) -> ValidationOutcome {
        let existing: Vec<FileIdentity> = self
            .committed
            .iter()
            .cloned()
            .chain(self.pending.iter().map(CandidateFile::identity))
            .collect();
        let outcome = validate(files, &existing, &self.config);
        self.pending.extend(outcome.accepted.iter().cloned());
        outcome
    }

    pub fn remove(&mut self, index: usize) -> Option<CandidateFile> {
        if index < self.pending.len() {
            Some(self.pending.remove(index))
        } else {
            None
        }
    }

    pub fn pending(&self) -> &[CandidateFile] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
