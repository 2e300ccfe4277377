use async_trait::async_trait;
use liveness_core::collaborators::{RemoteVerifyApi, RemoteVerifyOutcome};
use liveness_core::{CoreError, CoreResult};
use serde::Deserialize;

/// Response payload shape the optional remote verification service returns
/// (§6 `RemoteVerifyAPI`): `{status, code, message, details: {similarity,
/// spoof_label, occlusion_label}}`.
#[derive(Debug, Deserialize)]
struct RemoteVerifyResponse {
    status: String,
    code: u16,
    #[allow(dead_code)]
    message: String,
    details: RemoteVerifyDetails,
}

#[derive(Debug, Deserialize)]
struct RemoteVerifyDetails {
    #[serde(default)]
    similarity: f64,
    #[serde(default)]
    spoof_label: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    occlusion_label: Option<String>,
}

/// `reqwest`-backed multipart client for the optional remote verification
/// round-trip (§6). POSTs the aligned-face JPEG and maps the response code
/// per spec: 400/spoof_label="spoof" → Spoof, 404 → NotEnrolled, 407 →
/// Mismatch, 200/"success" → Match.
pub struct ReqwestRemoteVerifyApi {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestRemoteVerifyApi {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RemoteVerifyApi for ReqwestRemoteVerifyApi {
    async fn verify(&self, aligned_face_jpeg: &[u8]) -> CoreResult<RemoteVerifyOutcome> {
        let part = reqwest::multipart::Part::bytes(aligned_face_jpeg.to_vec())
            .file_name("face.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| CoreError::Collaborator(format!("building multipart body: {e}")))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoreError::Collaborator(format!("remote verify request failed: {e}")))?;

        let payload: RemoteVerifyResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Collaborator(format!("malformed remote verify response: {e}")))?;

        Ok(map_response(&payload))
    }
}

fn map_response(payload: &RemoteVerifyResponse) -> RemoteVerifyOutcome {
    match payload.code {
        400 if payload.details.spoof_label.as_deref() == Some("spoof") => RemoteVerifyOutcome::Spoof,
        404 => RemoteVerifyOutcome::NotEnrolled,
        407 => RemoteVerifyOutcome::Mismatch {
            similarity: payload.details.similarity,
        },
        200 if payload.status == "success" => RemoteVerifyOutcome::Match {
            similarity: payload.details.similarity,
        },
        _ => RemoteVerifyOutcome::Mismatch {
            similarity: payload.details.similarity,
        },
    }
}
