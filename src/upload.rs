//! Image upload to the backend's itinerary extractor.

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::UploadError;
use crate::models::TripSession;

/// Multipart field the backend reads the image from.
pub const IMAGE_FIELD: &str = "image";

/// Sends one image to `POST {base}/api/upload-image` and decodes the
/// returned trip session.
///
/// Stateless: applying the result and guarding against overlapping uploads is
/// the job of [`SessionStore`](crate::session::SessionStore).
pub struct ItineraryUploader {
    url: String,
    client: reqwest::Client,
}

impl ItineraryUploader {
    pub fn new(config: &ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.upload_timeout)
            .build()
            .unwrap_or_default();
        Self {
            url: config.upload_url(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Upload `image` under `filename` and return the decoded session.
    ///
    /// # Returns
    /// - `Ok(TripSession)` on a 2xx response carrying a complete trip session.
    /// - `Err(UploadError::EmptyImage)` when `image` is empty; nothing is sent.
    /// - `Err(UploadError::Connect | Timeout)` on transport failure.
    /// - `Err(UploadError::Http)` on a non-2xx response.
    /// - `Err(UploadError::Decode | Invalid)` when the body is not a complete session.
    pub async fn upload(&self, image: Vec<u8>, filename: &str) -> Result<TripSession, UploadError> {
        if image.is_empty() {
            return Err(UploadError::EmptyImage {
                filename: filename.to_string(),
            });
        }

        let size = image.len();
        let mime = mime_for_filename(filename);
        let part = reqwest::multipart::Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| UploadError::Decode {
                detail: format!("invalid mime type {mime}: {e}"),
            })?;
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        info!(url = %self.url, filename, size, mime, "uploading itinerary image");
        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %self.url, "upload rejected");
            return Err(UploadError::Http {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        debug!(bytes = body.len(), "upload response received");
        let session = TripSession::decode(&body)?;
        info!(
            days = session.itinerary.len(),
            destinations = session.destinations.len(),
            "itinerary extracted"
        );
        Ok(session)
    }

    fn transport_error(&self, e: reqwest::Error) -> UploadError {
        if e.is_timeout() {
            UploadError::Timeout {
                url: self.url.clone(),
            }
        } else {
            UploadError::Connect {
                url: self.url.clone(),
                detail: e.to_string(),
            }
        }
    }
}

/// MIME type for an image file name, by extension.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
