use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::{str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{PresignedUrlRequest, PresignedUrlResponse},
    policy::{self, Action, Resource},
};

/// Lifetime of a presigned upload URL.
pub const PRESIGN_TTL: Duration = Duration::from_secs(600);

/// StorageError
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not presign upload: {0}")]
    Presign(String),
    #[error("object storage unreachable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::StorageUnavailable(err.to_string())
    }
}

/// StorageService
///
/// Blob storage for course thumbnails and lesson videos. The service never
/// handles file bytes: clients upload straight to the bucket through a
/// presigned URL, and courses keep only the resulting object key.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if missing. Called at startup in `Env::Local` (MinIO).
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError>;

    /// Returns a time-limited PUT URL for `key`, bound to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3StorageClient
///
/// S3-compatible client (MinIO locally). Path-style addressing is forced since
/// MinIO does not serve virtual-host buckets.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        let exists = self
            .client
            .head_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .is_ok();
        if exists {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        tracing::info!(bucket = %self.bucket_name, "bucket created");
        Ok(())
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(PRESIGN_TTL).map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// UploadKind
///
/// The two media categories a course can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Thumbnail,
    Video,
}

impl UploadKind {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Thumbnail => &["jpg", "jpeg", "png", "gif"],
            UploadKind::Video => &["mp4", "mov", "avi", "mkv", "webm"],
        }
    }

    fn mime_prefix(&self) -> &'static str {
        match self {
            UploadKind::Thumbnail => "image/",
            UploadKind::Video => "video/",
        }
    }

    fn folder(&self) -> &'static str {
        match self {
            UploadKind::Thumbnail => "thumbnails",
            UploadKind::Video => "videos",
        }
    }
}

impl FromStr for UploadKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(UploadKind::Thumbnail),
            "video" => Ok(UploadKind::Video),
            other => Err(AppError::validation(format!(
                "unknown upload kind '{other}', expected 'thumbnail' or 'video'"
            ))),
        }
    }
}

/// object_key
///
/// Builds `<folder>/<uuid>.<ext>` for an upload. Only the extension of the
/// client's filename survives, lowercased and checked against the kind.
pub fn object_key(kind: UploadKind, filename: &str) -> Result<String, AppError> {
    let extension = std::path::Path::new(filename.trim())
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| AppError::validation("filename must have an extension"))?;

    if !kind.allowed_extensions().contains(&extension.as_str()) {
        return Err(AppError::validation(format!(
            "'.{extension}' is not allowed, expected one of: {}",
            kind.allowed_extensions().join(", ")
        )));
    }

    Ok(format!("{}/{}.{}", kind.folder(), Uuid::new_v4(), extension))
}

/// prepare_upload
///
/// Instructor/admin only. Validates the requested file and hands back a
/// presigned URL together with the key to store on the course or lesson.
pub async fn prepare_upload(
    storage: &dyn StorageService,
    actor: &AuthUser,
    kind: UploadKind,
    req: &PresignedUrlRequest,
) -> Result<PresignedUrlResponse, AppError> {
    policy::require(Some(actor), Action::UploadMedia, Resource::Nothing)?;

    let content_type = req.file_type.trim();
    if !content_type.starts_with(kind.mime_prefix()) {
        return Err(AppError::validation(format!(
            "file_type must be a {}* type",
            kind.mime_prefix()
        )));
    }
    let key = object_key(kind, &req.filename)?;

    let upload_url = storage
        .get_presigned_upload_url(&key, content_type)
        .await
        .map_err(|e| {
            tracing::error!(key = %key, "presign failed: {}", e);
            AppError::from(e)
        })?;

    tracing::debug!(actor = %actor.id, key = %key, "upload URL issued");
    Ok(PresignedUrlResponse {
        upload_url,
        resource_key: key,
    })
}

fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// In-process stand-in for `S3StorageClient` used by the test suite.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every call fails as if the bucket were unreachable.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable("mock storage offline".to_string()));
        }
        Ok(())
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable("mock storage offline".to_string()));
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

pub type StorageState = Arc<dyn StorageService>;
