//! Media Attachment Manager.
//!
//! Owns the upload policies of each entity kind and the file lifecycle around them:
//! accept, replace, detach by index and cascade delete. Files live in a
//! `StorageService`; only their relative paths are persisted on the records.

use axum::extract::Multipart;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use rand::{Rng, rngs::OsRng};
use serde_json::Value;
use std::{collections::HashMap, path::Path};
use thiserror::Error;

use crate::{
    errors::ApiError,
    models::{Employee, MediaAttachment, MediaKind, Marker, Publication, User},
    storage::{StorageError, StorageState},
};

const MB: usize = 1024 * 1024;

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mkv"];

const IMAGE_VIDEO_MIMES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/quicktime",
    "video/wmv",
    "video/flv",
    "video/webm",
    "video/mkv",
];
const IMAGE_VIDEO_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm",
    ".mkv",
];

/// UploadPolicy
///
/// Allow-lists, size cap and destination of one entity kind's uploads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadPolicy {
    pub label: &'static str,
    pub directory: &'static str,
    pub prefix: &'static str,
    pub max_bytes: usize,
    pub mime_types: &'static [&'static str],
    pub extensions: &'static [&'static str],
}

pub const PROFILE_IMAGE: UploadPolicy = UploadPolicy {
    label: "profile image",
    directory: "uploads/profiles",
    prefix: "profile",
    max_bytes: 5 * MB,
    mime_types: &[
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/bmp",
        "image/tiff",
        "image/svg+xml",
    ],
    extensions: &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".tiff", ".svg"],
};

pub const EMPLOYEE_DOCUMENT: UploadPolicy = UploadPolicy {
    label: "employee document",
    directory: "uploads/employees",
    prefix: "employee",
    max_bytes: 10 * MB,
    mime_types: &[
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/gif",
        "image/webp",
        "application/pdf",
    ],
    extensions: &[".pdf", ".jpg", ".jpeg", ".png", ".gif", ".webp"],
};

pub const PUBLICATION_MEDIA: UploadPolicy = UploadPolicy {
    label: "publication media",
    directory: "uploads/publications",
    prefix: "pub",
    max_bytes: 50 * MB,
    mime_types: IMAGE_VIDEO_MIMES,
    extensions: IMAGE_VIDEO_EXTENSIONS,
};

pub const MARKER_MEDIA: UploadPolicy = UploadPolicy {
    label: "marker media",
    directory: "uploads/markers",
    prefix: "marker",
    max_bytes: 50 * MB,
    mime_types: IMAGE_VIDEO_MIMES,
    extensions: IMAGE_VIDEO_EXTENSIONS,
};

impl UploadPolicy {
    /// Accepts when either the declared content type or the extension is allowed.
    pub fn allows(&self, content_type: Option<&str>, file_name: &str) -> bool {
        let mime_ok = content_type
            .map(|ct| ct.trim().to_ascii_lowercase())
            .is_some_and(|ct| self.mime_types.contains(&ct.as_str()));
        let ext = extension_of(file_name);
        mime_ok || (!ext.is_empty() && self.extensions.contains(&ext.as_str()))
    }
}

/// Lowercased extension including the dot, or an empty string.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Content type first, extension as fallback.
pub fn classify(content_type: Option<&str>, file_name: &str) -> MediaKind {
    let ct = content_type.unwrap_or_default().to_ascii_lowercase();
    if ct.starts_with("image/") {
        return MediaKind::Image;
    }
    if ct.starts_with("video/") {
        return MediaKind::Video;
    }
    if ct == "application/pdf" {
        return MediaKind::Document;
    }

    let ext = extension_of(file_name);
    if PROFILE_IMAGE.extensions.contains(&ext.as_str()) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Document
    }
}

/// `<prefix>-<unix millis>-<9 random digits><.ext>`
fn generate_file_name(policy: &UploadPolicy, original: &str) -> String {
    let suffix: u32 = OsRng.gen_range(0..1_000_000_000);
    format!(
        "{}-{}-{:09}{}",
        policy.prefix,
        Utc::now().timestamp_millis(),
        suffix,
        extension_of(original)
    )
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Unsupported file type for {label}: {file_name}")]
    UnsupportedType {
        label: &'static str,
        file_name: String,
    },
    #[error("File {file_name} exceeds the {max_mb} MB limit")]
    TooLarge { file_name: String, max_mb: usize },
    #[error("Too many files in field `{field}` (max {max})")]
    TooManyFiles { field: String, max: usize },
    #[error("Unexpected file field `{0}`")]
    UnexpectedField(String),
    #[error("Invalid media index")]
    IndexOutOfRange,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// IncomingFile
///
/// One file part of a multipart body, fully buffered.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// Relative to the storage root, e.g. `uploads/markers/marker-...png`.
    pub path: String,
    pub filename: String,
    pub kind: MediaKind,
}

impl From<StoredFile> for MediaAttachment {
    fn from(file: StoredFile) -> Self {
        MediaAttachment {
            kind: file.kind,
            path: file.path,
            filename: file.filename,
        }
    }
}

/// Something that references stored files and has to clean them up when it goes away.
pub trait MediaOwner {
    fn media_paths(&self) -> Vec<&str>;
}

impl MediaOwner for User {
    fn media_paths(&self) -> Vec<&str> {
        non_empty([self.profile_image.as_str()])
    }
}

impl MediaOwner for Employee {
    fn media_paths(&self) -> Vec<&str> {
        non_empty([self.face_image.as_str(), self.certificate.as_str()])
    }
}

impl MediaOwner for Publication {
    fn media_paths(&self) -> Vec<&str> {
        non_empty(self.media.iter().map(|m| m.path.as_str()))
    }
}

impl MediaOwner for Marker {
    fn media_paths(&self) -> Vec<&str> {
        non_empty(self.photos.iter().chain(self.videos.iter()).map(String::as_str))
    }
}

fn non_empty<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    paths.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Collection entries that point at a stored file.
pub trait MediaRef {
    fn media_path(&self) -> &str;
}

impl MediaRef for String {
    fn media_path(&self) -> &str {
        self
    }
}

impl MediaRef for MediaAttachment {
    fn media_path(&self) -> &str {
        &self.path
    }
}

/// MediaManager
///
/// Stateless facade over the shared storage service.
#[derive(Clone)]
pub struct MediaManager {
    storage: StorageState,
}

impl MediaManager {
    pub fn new(storage: StorageState) -> Self {
        Self { storage }
    }

    /// Policy check only; nothing is written.
    pub fn check(policy: &UploadPolicy, file: &IncomingFile) -> Result<(), MediaError> {
        if !policy.allows(file.content_type.as_deref(), &file.file_name) {
            return Err(MediaError::UnsupportedType {
                label: policy.label,
                file_name: file.file_name.clone(),
            });
        }
        if file.data.len() > policy.max_bytes {
            return Err(MediaError::TooLarge {
                file_name: file.file_name.clone(),
                max_mb: policy.max_bytes / MB,
            });
        }
        Ok(())
    }

    pub async fn accept(
        &self,
        policy: &UploadPolicy,
        file: IncomingFile,
    ) -> Result<StoredFile, MediaError> {
        Self::check(policy, &file)?;

        let kind = classify(file.content_type.as_deref(), &file.file_name);
        let filename = generate_file_name(policy, &file.file_name);
        let path = format!("{}/{}", policy.directory, filename);

        self.storage.write(&path, file.data).await?;
        tracing::debug!(path = %path, kind = kind.as_str(), "upload stored");

        Ok(StoredFile {
            path,
            filename,
            kind,
        })
    }

    /// Checks every file before writing any, so a rejected batch leaves no files behind.
    pub async fn accept_all(
        &self,
        policy: &UploadPolicy,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<StoredFile>, MediaError> {
        for file in &files {
            Self::check(policy, file)?;
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            stored.push(self.accept(policy, file).await?);
        }
        Ok(stored)
    }

    /// Best-effort removal: a missing file is fine, any other failure is logged.
    pub async fn remove(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        match self.storage.remove(path).await {
            Ok(true) => tracing::debug!(path, "file removed"),
            Ok(false) => tracing::debug!(path, "file already absent"),
            Err(e) => tracing::warn!(path, error = %e, "file removal failed"),
        }
    }

    /// Drops the file currently in `slot` (if any) and stores `new_path` in its place.
    pub async fn replace(&self, slot: &mut String, new_path: String) {
        if !slot.is_empty() {
            self.remove(slot).await;
        }
        *slot = new_path;
    }

    /// Removes the entry at `index` and its file. The index comes straight from the URL.
    pub async fn detach_at<T: MediaRef>(
        &self,
        items: &mut Vec<T>,
        index: &str,
    ) -> Result<T, MediaError> {
        let index = index
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|i| *i < items.len())
            .ok_or(MediaError::IndexOutOfRange)?;

        let removed = items.remove(index);
        self.remove(removed.media_path()).await;
        Ok(removed)
    }

    pub async fn cascade_delete(&self, owner: &impl MediaOwner) {
        for path in owner.media_paths() {
            self.remove(path).await;
        }
    }
}

// --- Multipart form reading ---

/// One file field a form accepts.
#[derive(Debug, Clone, Copy)]
pub struct FileField {
    pub name: &'static str,
    pub max_count: usize,
    pub policy: &'static UploadPolicy,
}

/// FormData
///
/// Text fields and buffered file parts of one multipart body.
#[derive(Debug, Default)]
pub struct FormData {
    texts: HashMap<String, String>,
    files: HashMap<String, Vec<IncomingFile>>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    /// Present and non-blank, trimmed.
    pub fn trimmed(&self, name: &str) -> Option<&str> {
        self.text(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn take_files(&mut self, name: &str) -> Vec<IncomingFile> {
        self.files.remove(name).unwrap_or_default()
    }

    pub fn take_file(&mut self, name: &str) -> Option<IncomingFile> {
        self.take_files(name).into_iter().next()
    }

    /// Text fields from a JSON object. Scalars are stringified, arrays of scalars are
    /// joined with commas, `null` and nested objects are dropped.
    pub fn from_json(object: serde_json::Map<String, Value>) -> Self {
        let texts = object
            .into_iter()
            .filter_map(|(name, value)| json_text(value).map(|text| (name, text)))
            .collect();
        Self {
            texts,
            files: HashMap::new(),
        }
    }
}

fn json_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Array(_) => None,
                    other => json_text(other),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

/// read_form
///
/// Buffers a multipart body. File parts are only accepted under the listed fields,
/// within their count, and are cut off as soon as they grow past the policy limit.
/// Type checks happen later in `MediaManager::check`. Empty file inputs (no name,
/// no bytes) are skipped.
pub async fn read_form(mut multipart: Multipart, fields: &[FileField]) -> Result<FormData, ApiError> {
    let mut form = FormData::default();

    while let Some(mut part) = multipart.next_field().await? {
        let name = part.name().unwrap_or_default().to_string();

        let Some(file_name) = part.file_name().map(str::to_string) else {
            let value = part.text().await?;
            form.texts.insert(name, value);
            continue;
        };

        let field = fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| MediaError::UnexpectedField(name.clone()))?;

        let content_type = part.content_type().map(str::to_string);
        let mut buffer = BytesMut::new();
        while let Some(chunk) = part.chunk().await? {
            buffer.extend_from_slice(&chunk);
            if buffer.len() > field.policy.max_bytes {
                return Err(MediaError::TooLarge {
                    file_name,
                    max_mb: field.policy.max_bytes / MB,
                }
                .into());
            }
        }

        if file_name.is_empty() && buffer.is_empty() {
            continue;
        }

        let slot = form.files.entry(name.clone()).or_default();
        if slot.len() >= field.max_count {
            return Err(MediaError::TooManyFiles {
                field: name,
                max: field.max_count,
            }
            .into());
        }

        slot.push(IncomingFile {
            field: name,
            file_name,
            content_type,
            data: buffer.freeze(),
        });
    }

    Ok(form)
}
