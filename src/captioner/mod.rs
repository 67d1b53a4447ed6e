//! Client for the external captioning service.
//!
//! The service is an opaque collaborator reached over HTTP; this module
//! owns the wire shapes and converts its loose `status`-string responses
//! into typed outcomes at the boundary. No call is ever retried: a single
//! failed attempt surfaces to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptionerError {
    #[error("captioning service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Upstream(String),
}

/// Captions produced for one image, with the service-side path that later
/// regenerate/confirm calls refer back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionBatch {
    pub captions: Vec<String>,
    pub image_path: String,
}

/// One method per upstream endpoint. Implemented over HTTP in production
/// and by recording mocks in tests.
#[async_trait]
pub trait CaptionService: Send + Sync {
    async fn upload(&self, file_name: &str, content: Vec<u8>)
        -> Result<CaptionBatch, CaptionerError>;
    async fn fetch(&self, url: &str) -> Result<CaptionBatch, CaptionerError>;
    async fn regenerate(&self, image_path: &str) -> Result<Vec<String>, CaptionerError>;
    async fn translate(
        &self,
        captions: &[String],
        language: &str,
    ) -> Result<Vec<String>, CaptionerError>;
    async fn confirm(
        &self,
        selected_caption: &str,
        image_path: &str,
    ) -> Result<String, CaptionerError>;
}

// -------------------------------------------------------------------------
// Wire decoding
// -------------------------------------------------------------------------

/// Raw response shape shared by the captioning endpoints. Which fields are
/// populated depends on the endpoint and on whether the call succeeded.
#[derive(Debug, Deserialize)]
struct WireResponse {
    status: Option<String>,
    message: Option<String>,
    captions: Option<Vec<String>>,
    image_path: Option<String>,
    translated_captions: Option<Vec<String>>,
}

impl WireResponse {
    /// Reject anything the service did not mark as a success.
    fn require_success(self) -> Result<Self, CaptionerError> {
        match self.status.as_deref() {
            Some("success") => Ok(self),
            _ => Err(CaptionerError::Upstream(
                self.message
                    .unwrap_or_else(|| "Captioning service reported a failure".to_string()),
            )),
        }
    }

    fn into_batch(self) -> Result<CaptionBatch, CaptionerError> {
        let decoded = self.require_success()?;
        match (decoded.captions, decoded.image_path) {
            (Some(captions), Some(image_path)) => Ok(CaptionBatch {
                captions,
                image_path,
            }),
            _ => Err(CaptionerError::Upstream(
                "Captioning service response is missing captions or image_path".to_string(),
            )),
        }
    }

    fn into_captions(self) -> Result<Vec<String>, CaptionerError> {
        let decoded = self.require_success()?;
        decoded.captions.ok_or_else(|| {
            CaptionerError::Upstream("Captioning service response is missing captions".to_string())
        })
    }

    fn into_translations(self) -> Result<Vec<String>, CaptionerError> {
        let decoded = self.require_success()?;
        decoded.translated_captions.ok_or_else(|| {
            CaptionerError::Upstream(
                "Captioning service response is missing translated_captions".to_string(),
            )
        })
    }
}

// -------------------------------------------------------------------------
// HTTP implementation
// -------------------------------------------------------------------------

pub struct HttpCaptioner {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCaptioner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<WireResponse, CaptionerError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<WireResponse, CaptionerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionerError::Upstream(format!(
                "Captioning service returned {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CaptionService for HttpCaptioner {
    async fn upload(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<CaptionBatch, CaptionerError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await?.into_batch()
    }

    async fn fetch(&self, url: &str) -> Result<CaptionBatch, CaptionerError> {
        self.post_json("fetch", &json!({ "url": url }))
            .await?
            .into_batch()
    }

    async fn regenerate(&self, image_path: &str) -> Result<Vec<String>, CaptionerError> {
        self.post_json("regenerate", &json!({ "image_path": image_path }))
            .await?
            .into_captions()
    }

    async fn translate(
        &self,
        captions: &[String],
        language: &str,
    ) -> Result<Vec<String>, CaptionerError> {
        self.post_json(
            "translate",
            &json!({ "captions": captions, "language": language }),
        )
        .await?
        .into_translations()
    }

    async fn confirm(
        &self,
        selected_caption: &str,
        image_path: &str,
    ) -> Result<String, CaptionerError> {
        let response = self
            .client
            .post(self.url("confirm"))
            .json(&json!({
                "selected_caption": selected_caption,
                "image_path": image_path,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionerError::Upstream(format!(
                "Captioning service returned {}: {}",
                status, body
            )));
        }

        // Confirm responses carry only an informational message.
        #[derive(Deserialize)]
        struct ConfirmResponse {
            message: Option<String>,
        }
        let ack: ConfirmResponse = response.json().await?;
        Ok(ack
            .message
            .unwrap_or_else(|| "Caption confirmed".to_string()))
    }
}
