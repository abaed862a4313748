//! Image uploads.
//!
//! Profile pictures are written to local disk under `UPLOAD_DIR/avatars/`
//! and served from `/uploads`. Catalog and banner images go to Cloudinary
//! through its signed upload API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use kirana_core::UserId;

use crate::config::CloudinaryConfig;

/// Largest accepted profile picture.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// Largest accepted catalog image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Most images in one admin upload.
pub const MAX_IMAGES_PER_UPLOAD: usize = 5;

/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

const AVATAR_SUBDIR: &str = "avatars";
const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Errors handling uploaded images.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was uploaded")]
    Missing,

    #[error("file is larger than {max} bytes")]
    TooLarge { max: usize },

    #[error("at most {max} files may be uploaded at once")]
    TooMany { max: usize },

    #[error("only JPEG, PNG and WebP images are accepted")]
    UnsupportedType,

    #[error("image hosting is not configured")]
    NotConfigured,

    #[error("failed to store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("image host request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("image host error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Accepted image formats, recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    /// Identify an image from its magic bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
            Some(Self::Webp)
        } else {
            None
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    /// MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// Check size and content type of an uploaded image.
///
/// The declared content type is ignored; only the bytes count.
///
/// # Errors
///
/// Returns `UploadError::Missing` for empty uploads,
/// `UploadError::TooLarge` above `max_bytes` and
/// `UploadError::UnsupportedType` for anything but JPEG, PNG or WebP.
pub fn validate_image(bytes: &[u8], max_bytes: usize) -> Result<ImageKind, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Missing);
    }
    if bytes.len() > max_bytes {
        return Err(UploadError::TooLarge { max: max_bytes });
    }
    ImageKind::sniff(bytes).ok_or(UploadError::UnsupportedType)
}

/// Local storage for profile pictures.
#[derive(Debug, Clone)]
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    /// Store avatars under `upload_dir/avatars`.
    #[must_use]
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            root: upload_dir.to_path_buf(),
        }
    }

    /// Directory served at [`PUBLIC_PREFIX`].
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and write an avatar, returning its public URL path.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`validate_image`] and
    /// `UploadError::Io` if the file cannot be written.
    #[instrument(skip(self, bytes), fields(user_id = %user_id, size = bytes.len()))]
    pub async fn save(&self, user_id: UserId, bytes: &[u8]) -> Result<String, UploadError> {
        let kind = validate_image(bytes, MAX_AVATAR_BYTES)?;

        let dir = self.root.join(AVATAR_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!("{user_id}-{}.{}", Uuid::new_v4().simple(), kind.extension());
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        info!(%file_name, "Avatar stored");
        Ok(format!("{PUBLIC_PREFIX}/{AVATAR_SUBDIR}/{file_name}"))
    }

    /// Delete a previously stored avatar. Foreign URLs are ignored.
    pub async fn remove(&self, public_url: &str) {
        let Some(path) = self.local_path(public_url) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "Failed to remove old avatar");
        }
    }

    fn local_path(&self, public_url: &str) -> Option<PathBuf> {
        let rest = public_url
            .strip_prefix(PUBLIC_PREFIX)?
            .strip_prefix('/')?
            .strip_prefix(AVATAR_SUBDIR)?
            .strip_prefix('/')?;
        // Only a bare file name, no traversal
        let name = Path::new(rest).file_name()?;
        (name == rest).then(|| self.root.join(AVATAR_SUBDIR).join(name))
    }
}

#[derive(Debug, Deserialize)]
struct CloudinaryUpload {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorBody {
    error: CloudinaryErrorMessage,
}

#[derive(Debug, Deserialize)]
struct CloudinaryErrorMessage {
    message: String,
}

/// Client for Cloudinary's signed upload API.
#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
    api_base: String,
}

impl CloudinaryClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            api_base: CLOUDINARY_API_BASE.to_owned(),
        }
    }

    /// Upload one validated image and return its HTTPS URL.
    ///
    /// # Errors
    ///
    /// Returns the validation errors of [`validate_image`],
    /// `UploadError::Request` on transport failure and `UploadError::Api`
    /// when Cloudinary rejects the upload.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, bytes: Vec<u8>) -> Result<String, UploadError> {
        let kind = validate_image(&bytes, MAX_IMAGE_BYTES)?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", &self.config.folder), ("timestamp", &timestamp)],
            self.config.api_secret.expose_secret(),
        );

        let file = Part::bytes(bytes)
            .file_name(format!("upload.{}", kind.extension()))
            .mime_str(kind.mime())?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("folder", self.config.folder.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let url = format!("{}/{}/image/upload", self.api_base, self.config.cloud_name);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<CloudinaryErrorBody>()
                .await
                .map_or_else(|_| "upload rejected".to_owned(), |b| b.error.message);
            return Err(UploadError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let uploaded: CloudinaryUpload = response.json().await?;
        info!(url = %uploaded.secure_url, "Image uploaded");
        Ok(uploaded.secure_url)
    }
}

/// Cloudinary request signature.
///
/// Parameters are sorted by name, joined as `k=v&k=v`, the API secret is
/// appended and the result hashed with SHA-256 (lower-case hex).
#[must_use]
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable_by_key(|(key, _)| *key);

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10];
    const WEBP: &[u8] = b"RIFF\x24\0\0\0WEBPVP8 ";

    #[test]
    fn test_sniff_known_formats() {
        assert_eq!(ImageKind::sniff(PNG), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(JPEG), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(WEBP), Some(ImageKind::Webp));
        assert_eq!(ImageKind::sniff(b"GIF89a"), None);
        assert_eq!(ImageKind::sniff(b"RIFF"), None);
    }

    #[test]
    fn test_validate_image_limits() {
        assert!(matches!(validate_image(&[], 10), Err(UploadError::Missing)));
        assert!(matches!(
            validate_image(PNG, 4),
            Err(UploadError::TooLarge { max: 4 })
        ));
        assert!(matches!(
            validate_image(b"<svg></svg>", 100),
            Err(UploadError::UnsupportedType)
        ));
        assert_eq!(validate_image(PNG, 100).unwrap(), ImageKind::Png);
    }

    #[test]
    fn test_sign_params_sorts_and_appends_secret() {
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"folder=kirana&timestamp=1700000000secret");
            hex::encode(hasher.finalize())
        };
        let a = sign_params(&[("timestamp", "1700000000"), ("folder", "kirana")], "secret");
        let b = sign_params(&[("folder", "kirana"), ("timestamp", "1700000000")], "secret");
        assert_eq!(a, expected);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_avatar_local_path_rejects_traversal() {
        let store = AvatarStore::new(Path::new("/srv/uploads"));
        assert_eq!(
            store.local_path("/uploads/avatars/1-abc.png"),
            Some(PathBuf::from("/srv/uploads/avatars/1-abc.png"))
        );
        assert_eq!(store.local_path("/uploads/avatars/../../etc/passwd"), None);
        assert_eq!(store.local_path("https://res.cloudinary.com/x.png"), None);
    }

    #[tokio::test]
    async fn test_avatar_save_writes_file() {
        let dir = std::env::temp_dir().join(format!("kirana-test-{}", Uuid::new_v4().simple()));
        let store = AvatarStore::new(&dir);

        let url = store.save(UserId::new(3), PNG).await.unwrap();
        assert!(url.starts_with("/uploads/avatars/3-"));
        assert!(url.ends_with(".png"));

        let path = store.local_path(&url).unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), PNG);

        store.remove(&url).await;
        assert!(!path.exists());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
