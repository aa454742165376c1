//! Post images: reading the multipart post form and storing uploads under the
//! media root in dated directories.

use crate::error::BlogError;
use crate::form::{FormErrors, PostFormData};
use actix_multipart::{Field, Multipart};
use actix_web::error::{ErrorBadRequest, ErrorPayloadTooLarge};
use actix_web::{web, Error};
use chrono::NaiveDateTime;
use futures_util::{StreamExt, TryStreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_TEXT_BYTES: usize = 256 * 1024;

const IMAGE_EXTENSIONS: [&str; 5] = ["gif", "jpeg", "jpg", "png", "webp"];
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file received with the post form. Nothing is written until the post is.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ImageUpload {
    /// Lower-cased extension, when it names a supported format.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn validate(&self, errors: &mut FormErrors) {
        if self.data.is_empty() {
            errors.add("image", "The submitted file is empty.");
        } else if self.extension().is_none() {
            errors.add(
                "image",
                format!(
                    "File extension is not allowed. Allowed extensions are: {}.",
                    IMAGE_EXTENSIONS.join(", ")
                ),
            );
        } else if !has_image_signature(&self.data) {
            errors.add("image", INVALID_IMAGE);
        }
    }
}

/// Leading bytes of the accepted formats.
fn has_image_signature(data: &[u8]) -> bool {
    data.starts_with(b"\x89PNG\r\n\x1a\n")
        || data.starts_with(b"\xff\xd8\xff")
        || data.starts_with(b"GIF87a")
        || data.starts_with(b"GIF89a")
        || (data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP")
}

/// Reads the post form. Text fields fill [`PostFormData`]; the `image` field
/// becomes an upload when a file was chosen.
pub async fn read_post_form(mut payload: Multipart) -> Result<PostFormData, Error> {
    let mut form = PostFormData::default();

    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = match disposition.get_name() {
            Some(name) => name.to_owned(),
            None => continue,
        };
        let filename = disposition.get_filename().map(str::to_owned);

        if name == "image" {
            let data = read_field(&mut field, MAX_IMAGE_BYTES).await?;
            // Browsers send an empty part with a blank filename when no file was chosen.
            match filename {
                Some(filename) if !filename.is_empty() => {
                    form.image = Some(ImageUpload { filename, data })
                }
                _ => {}
            }
        } else {
            let data = read_field(&mut field, MAX_TEXT_BYTES).await?;
            let value = String::from_utf8(data)
                .map_err(|_| ErrorBadRequest("Form fields must be UTF-8."))?;
            form.set_field(&name, value);
        }
    }

    Ok(form)
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, Error> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    while let Some(chunk) = field.next().await {
        let bytes = chunk.map_err(|e| {
            log::warn!("read_field: multipart read error: {}", e);
            ErrorBadRequest("Error reading upload data.")
        })?;
        if buf.len() + bytes.len() > limit {
            return Err(ErrorPayloadTooLarge("Upload is too large."));
        }
        buf.extend_from_slice(&bytes);
    }
    Ok(buf)
}

/// Directory uploads are written to. Served read-only under `/media/`.
#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `blog/YYYY/MM/DD/<uuid>.<ext>`, relative to the media root.
    pub fn relative_path(upload: &ImageUpload, now: NaiveDateTime) -> String {
        let ext = upload.extension().unwrap_or_else(|| "bin".to_owned());
        format!("blog/{}/{}.{}", now.format("%Y/%m/%d"), Uuid::new_v4(), ext)
    }

    /// Writes the upload and returns the path to store on the post.
    pub async fn save(&self, upload: &ImageUpload, now: NaiveDateTime) -> Result<String, BlogError> {
        let relative = Self::relative_path(upload, now);
        let target = self.root.join(&relative);
        let data = upload.data.clone();

        web::block(move || -> std::io::Result<()> {
            if let Some(dir) = target.parent() {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&target, data)
        })
        .await
        .map_err(|e| BlogError::Storage(e.to_string()))?
        .map_err(|e| BlogError::Storage(e.to_string()))?;

        log::info!("stored image {}", relative);
        Ok(relative)
    }
}
